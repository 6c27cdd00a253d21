//! Regex sources with lazily compiled anchor variants.
//!
//! TextMate grammars use `\A` and `\G` with tokenizer-relative meaning: `\A`
//! only matches on the first line of a document and `\G` only matches where
//! the previous rule left off. Oniguruma gives both their absolute meaning,
//! so each [`RegexSource`] keeps up to four compiled variants in which a
//! disallowed anchor is replaced by a character that never occurs in text.

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::{Lazy, OnceCell};
use onig::{Region, SearchOptions};
use regex::Regex;
use tracing::warn;

/// Replacement for a disallowed `\A` or `\G`.
const NEVER_MATCHES: char = '\u{FFFF}';

static BACK_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(\d+)").unwrap());

static CAPTURE_REFERENCE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\$(\d+)|\$\{(\d+):/(downcase|upcase)\}").unwrap());

static REGEX_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\-\\\{\}\*\+\?\|\^\$\.,\[\]\(\)#\s]").unwrap());

/// Byte ranges of a match and its groups; unmatched groups are `None`.
pub type CaptureRanges = Vec<Option<(usize, usize)>>;

/// Which tokenizer-relative anchors may match for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
	/// `\A`: first line of the document.
	pub allow_a: bool,
	/// `\G`: search position equals the anchor position.
	pub allow_g: bool,
}

impl Anchors {
	fn index(self) -> usize {
		((self.allow_a as usize) << 1) | self.allow_g as usize
	}
}

/// A successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
	/// Group ranges; index 0 is the whole match.
	pub captures: CaptureRanges,
}

impl RegexMatch {
	/// Start of the whole match.
	pub fn start(&self) -> usize {
		self.captures[0].map_or(0, |(start, _)| start)
	}

	/// End of the whole match.
	pub fn end(&self) -> usize {
		self.captures[0].map_or(0, |(_, end)| end)
	}
}

/// One regex pattern from a grammar.
pub struct RegexSource {
	source: Box<str>,
	has_anchor: bool,
	has_back_references: bool,
	/// Indexed by [`Anchors::index`]. Without anchors only the last slot is used.
	variants: [OnceCell<Option<onig::Regex>>; 4],
}

impl fmt::Debug for RegexSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RegexSource").field(&self.source).finish()
	}
}

impl PartialEq for RegexSource {
	fn eq(&self, other: &Self) -> bool {
		self.source == other.source
	}
}

impl Eq for RegexSource {}

impl RegexSource {
	pub fn new(source: &str) -> Self {
		Self {
			has_anchor: has_anchor(source),
			has_back_references: BACK_REFERENCE.is_match(source),
			source: source.into(),
			variants: Default::default(),
		}
	}

	/// The pattern as written.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// True if the pattern contains `\1`-style references.
	///
	/// Only meaningful for `end` and `while` patterns, where the references
	/// point at the begin match.
	pub fn has_back_references(&self) -> bool {
		self.has_back_references
	}

	/// Compiles the unrestricted variant and reports a syntax error, if any.
	pub fn validate(&self) -> Result<(), String> {
		let slot = &self.variants[3];
		if let Some(compiled) = slot.get() {
			return compiled.as_ref().map(|_| ()).ok_or_else(|| "invalid pattern".to_string());
		}
		match onig::Regex::new(&self.source) {
			Ok(regex) => {
				let _ = slot.set(Some(regex));
				Ok(())
			}
			Err(error) => {
				let _ = slot.set(None);
				Err(error.to_string())
			}
		}
	}

	/// Returns the compiled variant for `anchors`, compiling it on first use.
	///
	/// `None` means the pattern does not compile and never matches.
	pub fn regex(&self, anchors: Anchors) -> Option<&onig::Regex> {
		let idx = if self.has_anchor { anchors.index() } else { 3 };
		self.variants[idx]
			.get_or_init(|| {
				let pattern = if idx == 3 {
					Cow::Borrowed(&*self.source)
				} else {
					Cow::Owned(restrict_anchors(&self.source, anchors))
				};
				match onig::Regex::new(&pattern) {
					Ok(regex) => Some(regex),
					Err(error) => {
						warn!(pattern = %self.source, error = %error, "Invalid grammar regex");
						None
					}
				}
			})
			.as_ref()
	}

	/// Searches `text` from byte offset `pos`.
	pub fn search(&self, text: &str, pos: usize, anchors: Anchors) -> Option<RegexMatch> {
		let regex = self.regex(anchors)?;
		search(regex, text, pos)
	}

	/// Substitutes `\N` with the regex-escaped text of capture `N`.
	///
	/// Used to build the end or while pattern of a frame from its begin match.
	pub fn resolve_back_references(&self, text: &str, captures: &[Option<(usize, usize)>]) -> RegexSource {
		let resolved = BACK_REFERENCE.replace_all(&self.source, |caps: &regex::Captures<'_>| {
			let captured = caps[1]
				.parse::<usize>()
				.ok()
				.and_then(|idx| captures.get(idx).copied().flatten())
				.map_or("", |(start, end)| &text[start..end]);
			escape(captured).into_owned()
		});
		RegexSource::new(&resolved)
	}
}

fn search(regex: &onig::Regex, text: &str, pos: usize) -> Option<RegexMatch> {
	if pos > text.len() {
		return None;
	}
	let mut region = Region::new();
	regex.search_with_options(text, pos, text.len(), SearchOptions::SEARCH_OPTION_NONE, Some(&mut region))?;
	let captures = (0..region.len()).map(|idx| region.pos(idx)).collect();
	Some(RegexMatch { captures })
}

/// Escapes every regex metacharacter in `text`.
pub fn escape(text: &str) -> Cow<'_, str> {
	REGEX_SPECIAL.replace_all(text, "\\$0")
}

fn has_anchor(source: &str) -> bool {
	let mut chars = source.chars();
	while let Some(c) = chars.next() {
		if c == '\\'
			&& let Some(next) = chars.next()
			&& matches!(next, 'A' | 'G')
		{
			return true;
		}
	}
	false
}

fn restrict_anchors(source: &str, anchors: Anchors) -> String {
	let mut out = String::with_capacity(source.len());
	let mut chars = source.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('A') if !anchors.allow_a => out.push(NEVER_MATCHES),
			Some('G') if !anchors.allow_g => out.push(NEVER_MATCHES),
			Some(next) => {
				out.push('\\');
				out.push(next);
			}
			None => out.push('\\'),
		}
	}
	out
}

/// A `name` or `contentName` that may reference match captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
	source: Box<str>,
	has_captures: bool,
}

impl NameTemplate {
	pub fn new(source: &str) -> Self {
		Self {
			has_captures: CAPTURE_REFERENCE.is_match(source),
			source: source.into(),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Expands `$n`, `${n:/downcase}` and `${n:/upcase}` against a match.
	///
	/// Leading dots are stripped from substituted text. References to groups
	/// that did not participate are left as written.
	pub fn resolve<'a>(&'a self, text: &str, captures: &[Option<(usize, usize)>]) -> Cow<'a, str> {
		if !self.has_captures {
			return Cow::Borrowed(&self.source);
		}
		CAPTURE_REFERENCE.replace_all(&self.source, |caps: &regex::Captures<'_>| {
			let idx = caps.get(1).or_else(|| caps.get(2)).and_then(|m| m.as_str().parse::<usize>().ok());
			let Some((start, end)) = idx.and_then(|idx| captures.get(idx).copied().flatten()) else {
				return caps[0].to_string();
			};
			let captured = text[start..end].trim_start_matches('.');
			match caps.get(3).map(|m| m.as_str()) {
				Some("downcase") => captured.to_lowercase(),
				Some("upcase") => captured.to_uppercase(),
				_ => captured.to_string(),
			}
		})
	}
}
