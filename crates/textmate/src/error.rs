//! Error and diagnostic types.

use std::path::PathBuf;

use loom_selector::SelectorSyntaxError;
use thiserror::Error;

/// Errors that can occur when loading a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
	/// No grammar is known under the requested scope name.
	#[error("grammar not found: {0}")]
	NotFound(String),

	/// The document is not valid grammar JSON.
	#[error("invalid grammar document: {0}")]
	Json(#[from] serde_json::Error),

	/// Error reading a grammar file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}

/// Result type for grammar loading.
pub type Result<T> = std::result::Result<T, GrammarError>;

/// A non-fatal problem found while compiling a grammar.
///
/// The offending rule never matches; the rest of the grammar compiles
/// normally. `location` is a slash-separated path into the grammar document,
/// e.g. `repository/strings/patterns/2/end`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarCompileError {
	/// A regex failed to compile.
	#[error("{location}: invalid regex {pattern:?}: {message}")]
	InvalidRegex {
		/// Document path of the regex.
		location: String,
		/// The regex as written.
		pattern: String,
		/// Message from the regex engine.
		message: String,
	},

	/// A rule's keys do not describe any rule kind.
	#[error("{location}: {reason}")]
	InvalidShape {
		/// Document path of the rule.
		location: String,
		/// What is wrong with the rule.
		reason: String,
	},

	/// A local include names no repository entry in scope.
	#[error("{location}: unresolved include {target:?}")]
	UnresolvedInclude {
		/// Document path of the include.
		location: String,
		/// The include as written, e.g. `#strings`.
		target: String,
	},

	/// An injection selector failed to parse.
	#[error("{location}: invalid selector {selector:?}: {error}")]
	InvalidSelector {
		/// Document path of the selector.
		location: String,
		/// The selector as written.
		selector: String,
		/// The parse error.
		error: SelectorSyntaxError,
	},
}

impl GrammarCompileError {
	/// Returns the document path of the offending pattern.
	pub fn location(&self) -> &str {
		match self {
			Self::InvalidRegex { location, .. }
			| Self::InvalidShape { location, .. }
			| Self::UnresolvedInclude { location, .. }
			| Self::InvalidSelector { location, .. } => location,
		}
	}
}
