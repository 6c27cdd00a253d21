//! Compiled rules.
//!
//! A grammar compiles into a flat arena of [`Rule`]s addressed by [`RuleId`].
//! Child patterns refer to rules of the same grammar by ID, to the grammar
//! being tokenized through [`PatternRef::Base`], and to other grammars through
//! lazily resolved [`ExternalInclude`]s.

mod compile;
mod patterns;

use std::fmt;
use std::sync::Arc;

pub(crate) use compile::compile;
pub(crate) use patterns::{PatternSet, ScanMode};

use crate::grammar::Grammar;
use crate::regex::{NameTemplate, RegexSource};

/// Index of a rule within its grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
	pub(crate) fn new(index: usize) -> Self {
		Self(index as u32)
	}

	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for RuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// A compiled rule.
#[derive(Debug)]
pub enum Rule {
	Match(MatchRule),
	/// Contributes its children in place; never pushed except as a root or
	/// capture retokenization frame.
	IncludeOnly(IncludeOnlyRule),
	BeginEnd(BeginEndRule),
	BeginWhile(BeginWhileRule),
	/// Malformed in the source document. Never matches.
	Invalid,
}

impl Rule {
	pub fn name(&self) -> Option<&NameTemplate> {
		match self {
			Rule::Match(r) => r.name.as_ref(),
			Rule::IncludeOnly(r) => r.name.as_ref(),
			Rule::BeginEnd(r) => r.name.as_ref(),
			Rule::BeginWhile(r) => r.name.as_ref(),
			Rule::Invalid => None,
		}
	}

	pub fn content_name(&self) -> Option<&NameTemplate> {
		match self {
			Rule::IncludeOnly(r) => r.content_name.as_ref(),
			Rule::BeginEnd(r) => r.content_name.as_ref(),
			Rule::BeginWhile(r) => r.content_name.as_ref(),
			Rule::Match(_) | Rule::Invalid => None,
		}
	}

	/// Child patterns scanned while this rule is on top of the stack.
	pub fn patterns(&self) -> &[PatternRef] {
		match self {
			Rule::IncludeOnly(r) => &r.patterns,
			Rule::BeginEnd(r) => &r.patterns,
			Rule::BeginWhile(r) => &r.patterns,
			Rule::Match(_) | Rule::Invalid => &[],
		}
	}
}

/// `match`: a single regex with captures.
#[derive(Debug)]
pub struct MatchRule {
	pub name: Option<NameTemplate>,
	pub regex: Arc<RegexSource>,
	pub captures: Captures,
}

/// `patterns` or `include`: a list of children.
#[derive(Debug)]
pub struct IncludeOnlyRule {
	pub name: Option<NameTemplate>,
	pub content_name: Option<NameTemplate>,
	pub patterns: Vec<PatternRef>,
}

/// `begin` / `end`.
#[derive(Debug)]
pub struct BeginEndRule {
	pub name: Option<NameTemplate>,
	pub content_name: Option<NameTemplate>,
	pub begin: Arc<RegexSource>,
	pub begin_captures: Captures,
	/// May reference begin captures; see [`RegexSource::has_back_references`].
	pub end: Arc<RegexSource>,
	pub end_captures: Captures,
	/// Children win ties against `end`.
	pub apply_end_pattern_last: bool,
	pub patterns: Vec<PatternRef>,
}

/// `begin` / `while`.
#[derive(Debug)]
pub struct BeginWhileRule {
	pub name: Option<NameTemplate>,
	pub content_name: Option<NameTemplate>,
	pub begin: Arc<RegexSource>,
	pub begin_captures: Captures,
	pub while_: Arc<RegexSource>,
	pub while_captures: Captures,
	pub patterns: Vec<PatternRef>,
}

/// Scope assignment for one capture group.
#[derive(Debug)]
pub struct CaptureRule {
	pub name: Option<NameTemplate>,
	pub content_name: Option<NameTemplate>,
	/// Rule whose children re-tokenize the captured text.
	pub retokenize: Option<RuleId>,
}

/// Capture rules indexed by group number.
pub type Captures = Vec<Option<CaptureRule>>;

/// A child pattern of a rule.
#[derive(Debug, Clone)]
pub enum PatternRef {
	/// A rule of the same grammar.
	Rule(RuleId),
	/// `$base`: the root of whichever grammar is being tokenized.
	Base,
	/// A rule of another grammar.
	External(Arc<ExternalInclude>),
}

/// An include of `scope` or `scope#rule`.
///
/// Resolved through a [`ScanCache`](crate::ScanCache) the first time a pattern
/// set containing it is built.
#[derive(Debug)]
pub struct ExternalInclude {
	scope_name: Box<str>,
	rule: Option<Box<str>>,
}

impl ExternalInclude {
	pub(crate) fn new(scope_name: &str, rule: Option<&str>) -> Self {
		Self {
			scope_name: scope_name.into(),
			rule: rule.map(Into::into),
		}
	}

	pub fn scope_name(&self) -> &str {
		&self.scope_name
	}

	pub fn rule_name(&self) -> Option<&str> {
		self.rule.as_deref()
	}
}

/// A rule together with the grammar that owns it.
#[derive(Clone)]
pub struct RuleRef {
	grammar: Arc<Grammar>,
	id: RuleId,
}

impl RuleRef {
	pub fn new(grammar: Arc<Grammar>, id: RuleId) -> Self {
		Self { grammar, id }
	}

	pub fn grammar(&self) -> &Arc<Grammar> {
		&self.grammar
	}

	pub fn id(&self) -> RuleId {
		self.id
	}

	pub fn rule(&self) -> &Rule {
		self.grammar.rule(self.id)
	}
}

impl PartialEq for RuleRef {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.grammar.id() == other.grammar.id()
	}
}

impl Eq for RuleRef {}

impl fmt::Debug for RuleRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.grammar.scope_name(), self.id)
	}
}
