//! Packed token metadata.
//!
//! Each token's style and classification packs into one `u32`:
//!
//! ```text
//! bits  0..=7   language id
//! bits  8..=9   standard token type
//! bit   10      reserved
//! bits 11..=14  font style
//! bits 15..=23  foreground color index
//! bits 24..=31  background color index
//! ```

use bitflags::bitflags;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Token, Tokenizer};
use crate::scope::Scope;
use crate::stack::RuleStack;

const LANGUAGE_ID_MASK: u32 = 0x0000_00FF;
const TOKEN_TYPE_MASK: u32 = 0x0000_0300;
const FONT_STYLE_MASK: u32 = 0x0000_7800;
const FOREGROUND_MASK: u32 = 0x00FF_8000;
const BACKGROUND_MASK: u32 = 0xFF00_0000;

const TOKEN_TYPE_OFFSET: u32 = 8;
const FONT_STYLE_OFFSET: u32 = 11;
const FOREGROUND_OFFSET: u32 = 15;
const BACKGROUND_OFFSET: u32 = 24;

static STANDARD_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(comment|string|regex|meta\.embedded)\b").unwrap());

bitflags! {
	/// Font style flags.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct FontStyle: u8 {
		const ITALIC = 1;
		const BOLD = 1 << 1;
		const UNDERLINE = 1 << 2;
		const STRIKETHROUGH = 1 << 3;
	}
}

/// Coarse token classification used by editors for bracket matching and
/// comment toggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StandardTokenType {
	#[default]
	Other = 0,
	Comment = 1,
	String = 2,
	RegEx = 3,
}

impl StandardTokenType {
	/// Classifies a scope stack by its innermost `comment`, `string`, `regex`
	/// or `meta.embedded` scope. Embedded code resets to [`Other`](Self::Other).
	pub fn from_scopes(scopes: &[Scope]) -> Self {
		for scope in scopes.iter().rev() {
			if let Some(m) = STANDARD_TYPE.captures(scope) {
				return match &m[1] {
					"comment" => Self::Comment,
					"string" => Self::String,
					"regex" => Self::RegEx,
					_ => Self::Other,
				};
			}
		}
		Self::Other
	}

	fn from_bits(bits: u32) -> Self {
		match bits {
			1 => Self::Comment,
			2 => Self::String,
			3 => Self::RegEx,
			_ => Self::Other,
		}
	}
}

/// Style resolved for one scope stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenStyle {
	pub font_style: FontStyle,
	/// Color index; only the low 9 bits are stored.
	pub foreground: u16,
	pub background: u8,
}

/// Supplies per-token metadata. Typically backed by a theme.
pub trait MetadataProvider {
	/// Language of a token; 0 if unknown.
	fn language_id(&self, _scopes: &[Scope]) -> u8 {
		0
	}

	fn style(&self, scopes: &[Scope]) -> TokenStyle;
}

/// A token's packed metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EncodedMetadata(u32);

impl EncodedMetadata {
	pub fn new(language_id: u8, token_type: StandardTokenType, style: TokenStyle) -> Self {
		let mut bits = u32::from(language_id);
		bits |= (token_type as u32) << TOKEN_TYPE_OFFSET;
		bits |= (u32::from(style.font_style.bits()) << FONT_STYLE_OFFSET) & FONT_STYLE_MASK;
		bits |= (u32::from(style.foreground) << FOREGROUND_OFFSET) & FOREGROUND_MASK;
		bits |= u32::from(style.background) << BACKGROUND_OFFSET;
		Self(bits)
	}

	pub fn from_bits(bits: u32) -> Self {
		Self(bits)
	}

	pub fn bits(self) -> u32 {
		self.0
	}

	pub fn language_id(self) -> u8 {
		(self.0 & LANGUAGE_ID_MASK) as u8
	}

	pub fn token_type(self) -> StandardTokenType {
		StandardTokenType::from_bits((self.0 & TOKEN_TYPE_MASK) >> TOKEN_TYPE_OFFSET)
	}

	pub fn font_style(self) -> FontStyle {
		FontStyle::from_bits_truncate(((self.0 & FONT_STYLE_MASK) >> FONT_STYLE_OFFSET) as u8)
	}

	pub fn foreground(self) -> u16 {
		((self.0 & FOREGROUND_MASK) >> FOREGROUND_OFFSET) as u16
	}

	pub fn background(self) -> u8 {
		((self.0 & BACKGROUND_MASK) >> BACKGROUND_OFFSET) as u8
	}
}

/// Result of [`Tokenizer::tokenize_line_encoded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLineTokens {
	/// `[start, metadata, start, metadata, ...]`. Adjacent tokens with equal
	/// metadata are merged. An empty line yields one pair at offset 0.
	pub tokens: Vec<u32>,
	/// The scoped tokens the pairs were computed from.
	pub scoped: Vec<Token>,
	pub stack: RuleStack,
}

impl EncodedLineTokens {
	/// Iterates `(start, metadata)` pairs.
	pub fn pairs(&self) -> impl Iterator<Item = (u32, EncodedMetadata)> + '_ {
		self.tokens
			.chunks_exact(2)
			.map(|pair| (pair[0], EncodedMetadata::from_bits(pair[1])))
	}
}

fn metadata(scopes: &[Scope], provider: &dyn MetadataProvider) -> EncodedMetadata {
	EncodedMetadata::new(
		provider.language_id(scopes),
		StandardTokenType::from_scopes(scopes),
		provider.style(scopes),
	)
}

impl Tokenizer<'_> {
	/// Tokenizes one line into packed metadata.
	pub fn tokenize_line_encoded(
		&self,
		line: &str,
		prev: Option<&RuleStack>,
		provider: &dyn MetadataProvider,
	) -> EncodedLineTokens {
		let result = self.tokenize_line(line, prev);
		let mut tokens = Vec::with_capacity(result.tokens.len() * 2);
		let mut last: Option<EncodedMetadata> = None;
		for token in &result.tokens {
			let meta = metadata(&token.scopes, provider);
			if last == Some(meta) {
				continue;
			}
			tokens.push(token.start as u32);
			tokens.push(meta.bits());
			last = Some(meta);
		}
		if tokens.is_empty() {
			let scopes = prev.map_or_else(|| self.initial_stack().scopes(), RuleStack::scopes);
			tokens.push(0);
			tokens.push(metadata(&scopes, provider).bits());
		}
		EncodedLineTokens {
			tokens,
			scoped: result.tokens,
			stack: result.stack,
		}
	}
}
