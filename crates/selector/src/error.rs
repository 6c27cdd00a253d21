//! Error types for selector parsing.

use thiserror::Error;

/// Errors produced while parsing a scope selector.
///
/// Offsets are byte offsets into the selector source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorSyntaxError {
	/// The selector contains no operands.
	#[error("empty selector")]
	Empty,

	/// A character that cannot start any selector token.
	#[error("unexpected character {ch:?} at offset {offset}")]
	UnexpectedChar {
		/// The offending character.
		ch: char,
		/// Byte offset of the character.
		offset: usize,
	},

	/// A token that is valid on its own but not at this position.
	#[error("unexpected `{token}` at offset {offset}")]
	UnexpectedToken {
		/// Source text of the token.
		token: String,
		/// Byte offset of the token.
		offset: usize,
	},

	/// Input ended while an operand was still expected.
	#[error("unexpected end of selector")]
	UnexpectedEnd,

	/// A `(` without its matching `)`.
	#[error("unclosed group opened at offset {offset}")]
	UnclosedGroup {
		/// Byte offset of the opening parenthesis.
		offset: usize,
	},
}

/// Result type for selector operations.
pub type Result<T> = std::result::Result<T, SelectorSyntaxError>;
