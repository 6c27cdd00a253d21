//! Scope selectors for TextMate-style scope stacks.
//!
//! A selector is a boolean expression over dot-separated scope names. It is
//! evaluated against a scope stack snapshot (outermost scope first), as
//! produced by the tokenizer for every token.
//!
//! # Syntax
//!
//! * `string.quoted`: prefix match against one stack entry, by whole segments.
//! * `source.js string`: descendant path, `string` somewhere inside `source.js`.
//! * `meta.tag > string`: `string` directly inside `meta.tag`.
//! * `- comment`: negation of the following operand.
//! * `a b, c` or `a b | c`: alternatives.
//! * `(a, b)`: grouping.
//! * `L:` / `R:` before an alternative: injection priority.
//!
//! Two consumers use this crate: injection lookup in the tokenizer (via
//! [`Selector::alternatives`] and their [`Priority`]) and theme rule
//! ranking (via [`Selector::specificity`] and [`best_match`]).

mod error;
mod expr;
mod parse;

use std::fmt;
use std::str::FromStr;

pub use error::{Result, SelectorSyntaxError};
pub use expr::{Combinator, Expr, PathStep, ScopePath, Specificity, scope_has_prefix};

/// Injection priority attached to a selector alternative.
///
/// Ordered so that sorting puts `Left` injections first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
	/// `L:`: tried before the host grammar's own patterns.
	Left,
	/// No prefix: tried after the host grammar on ties.
	#[default]
	Normal,
	/// `R:`: tried after the host grammar's own patterns.
	Right,
}

impl Priority {
	/// Numeric form: -1 for `L:`, 0 for none, 1 for `R:`.
	pub fn as_i8(self) -> i8 {
		match self {
			Priority::Left => -1,
			Priority::Normal => 0,
			Priority::Right => 1,
		}
	}
}

/// One top-level alternative of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
	/// Priority prefix of this alternative.
	pub priority: Priority,
	/// The compiled expression.
	pub expr: Expr,
}

impl Alternative {
	/// Evaluates this alternative against a scope stack.
	pub fn matches<S: AsRef<str>>(&self, stack: &[S]) -> bool {
		self.expr.matches(stack)
	}
}

/// A compiled scope selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	source: Box<str>,
	alternatives: Vec<Alternative>,
}

impl Selector {
	/// Compiles a selector. Syntax errors are reported here, never at match time.
	pub fn parse(source: &str) -> Result<Self> {
		Ok(Self {
			source: source.into(),
			alternatives: parse::parse(source)?,
		})
	}

	/// Returns the selector source text.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Returns the top-level alternatives in declaration order.
	pub fn alternatives(&self) -> &[Alternative] {
		&self.alternatives
	}

	/// Returns true if any alternative matches the scope stack.
	pub fn matches<S: AsRef<str>>(&self, stack: &[S]) -> bool {
		self.alternatives.iter().any(|alt| alt.matches(stack))
	}

	/// Returns the strongest match among all alternatives, if any matches.
	pub fn specificity<S: AsRef<str>>(&self, stack: &[S]) -> Option<Specificity> {
		self.alternatives
			.iter()
			.filter_map(|alt| alt.expr.specificity(stack))
			.max()
	}
}

impl FromStr for Selector {
	type Err = SelectorSyntaxError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

/// Picks the selector that should win for `stack`.
///
/// The highest [`Specificity`] wins; among equals the later selector wins,
/// the way later rules override earlier ones in a theme.
pub fn best_match<S: AsRef<str>>(selectors: &[Selector], stack: &[S]) -> Option<usize> {
	let mut best: Option<(usize, Specificity)> = None;
	for (idx, selector) in selectors.iter().enumerate() {
		let Some(spec) = selector.specificity(stack) else {
			continue;
		};
		if best.is_none_or(|(_, current)| spec >= current) {
			best = Some((idx, spec));
		}
	}
	best.map(|(idx, _)| idx)
}
