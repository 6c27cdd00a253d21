//! Raw grammar documents.
//!
//! [`RawGrammar`] mirrors the JSON layout of a TextMate grammar. Nothing here
//! is validated beyond what serde enforces; [`RawRule::classify`] binds a raw
//! rule to its [`RawPattern`] shape during compilation.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GrammarError, Result};

/// Named rules, in declaration order.
pub type Repository = IndexMap<String, RawRule>;

/// Capture index (as written in the document) to capture rule.
pub type RawCaptures = IndexMap<String, RawRule>;

/// A grammar document as written by its author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrammar {
	/// Root scope name, e.g. `source.js`.
	pub scope_name: String,
	/// Human-readable language name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// File extensions the grammar applies to.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub file_types: Vec<String>,
	/// Regex tested against the first line of a document.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_line_match: Option<String>,
	/// Top-level patterns.
	#[serde(default)]
	pub patterns: Vec<RawRule>,
	/// Named rules available to `#name` includes.
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub repository: Repository,
	/// Selector to rule map injected into this grammar's own scopes.
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub injections: IndexMap<String, RawRule>,
	/// Where this grammar injects itself when registered as an injection.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub injection_selector: Option<String>,
}

impl RawGrammar {
	/// Parses a grammar from JSON text.
	pub fn from_json(text: &str) -> Result<Self> {
		Ok(serde_json::from_str(text)?)
	}

	/// Parses a grammar from JSON bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self> {
		Ok(serde_json::from_slice(bytes)?)
	}

	/// Reads and parses a grammar file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let bytes = std::fs::read(path).map_err(|error| GrammarError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_slice(&bytes)
	}
}

/// One rule object as written in a grammar document.
///
/// Every key is optional; which keys are present decides the rule kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub include: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content_name: Option<String>,
	#[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
	pub match_: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub captures: Option<RawCaptures>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub begin: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub begin_captures: Option<RawCaptures>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_captures: Option<RawCaptures>,
	#[serde(default, rename = "while", skip_serializing_if = "Option::is_none")]
	pub while_: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub while_captures: Option<RawCaptures>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub patterns: Option<Vec<RawRule>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repository: Option<Repository>,
	/// Accepts `true`/`false` as well as `1`/`0`.
	#[serde(default, deserialize_with = "bool_or_int", skip_serializing_if = "std::ops::Not::not")]
	pub apply_end_pattern_last: bool,
}

fn bool_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Flag {
		Bool(bool),
		Int(i64),
	}

	Ok(match Flag::deserialize(deserializer)? {
		Flag::Bool(b) => b,
		Flag::Int(n) => n != 0,
	})
}

/// The shape a raw rule was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPattern<'a> {
	/// `include` only: a reference to another rule.
	Include(&'a str),
	/// `match`: a single regex.
	Match(&'a str),
	/// `begin` + `end`.
	BeginEnd { begin: &'a str, end: &'a str },
	/// `begin` + `while`.
	BeginWhile { begin: &'a str, while_: &'a str },
	/// Neither regex nor include: a container for `patterns`.
	Patterns,
}

impl RawRule {
	/// Binds the rule to its shape.
	///
	/// Contradictory key combinations are rejected with a reason instead of
	/// picking one interpretation.
	pub fn classify(&self) -> std::result::Result<RawPattern<'_>, String> {
		let regex_keys = [
			("match", self.match_.is_some()),
			("begin", self.begin.is_some()),
		];
		if let Some(include) = &self.include {
			if let Some((key, _)) = regex_keys.iter().find(|(_, present)| *present) {
				return Err(format!("`include` cannot be combined with `{key}`"));
			}
			return Ok(RawPattern::Include(include));
		}

		match (&self.match_, &self.begin, &self.end, &self.while_) {
			(Some(_), Some(_), _, _) => Err("`match` cannot be combined with `begin`".into()),
			(Some(m), None, None, None) => Ok(RawPattern::Match(m)),
			(Some(_), None, _, _) => Err("`match` cannot be combined with `end` or `while`".into()),
			(None, Some(_), Some(_), Some(_)) => Err("`begin` has both `end` and `while`".into()),
			(None, Some(begin), Some(end), None) => Ok(RawPattern::BeginEnd { begin, end }),
			(None, Some(begin), None, Some(while_)) => Ok(RawPattern::BeginWhile { begin, while_ }),
			(None, Some(_), None, None) => Err("`begin` without `end` or `while`".into()),
			(None, None, Some(_), _) => Err("`end` without `begin`".into()),
			(None, None, None, Some(_)) => Err("`while` without `begin`".into()),
			(None, None, None, None) => Ok(RawPattern::Patterns),
		}
	}
}
