//! Compiled grammars.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use loom_selector::Selector;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::GrammarCompileError;
use crate::raw::RawGrammar;
use crate::regex::{Anchors, RegexSource};
use crate::rule::{self, Rule, RuleId};
use crate::scope::Scope;

static NEXT_GRAMMAR_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique identity of a compiled grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarId(u32);

/// A compiled grammar.
///
/// Compilation never fails: problems are collected in
/// [`diagnostics`](Self::diagnostics) and the affected rules never match.
/// A grammar is immutable once compiled; what tokenization builds lazily is
/// kept in a [`ScanCache`](crate::ScanCache).
pub struct Grammar {
	id: GrammarId,
	scope_name: Scope,
	name: Option<String>,
	file_types: Vec<String>,
	first_line_match: Option<RegexSource>,
	rules: Vec<Rule>,
	root: RuleId,
	repository: FxHashMap<String, RuleId>,
	own_injections: Vec<(Selector, RuleId)>,
	injection_selector: Option<Selector>,
	diagnostics: Vec<GrammarCompileError>,
}

impl Grammar {
	/// Compiles a raw grammar.
	pub fn compile(raw: &RawGrammar) -> Self {
		let compiled = rule::compile(raw);
		for diagnostic in &compiled.diagnostics {
			warn!(
				scope = %raw.scope_name,
				location = diagnostic.location(),
				error = %diagnostic,
				"Grammar diagnostic"
			);
		}
		debug!(
			scope = %raw.scope_name,
			rules = compiled.rules.len(),
			diagnostics = compiled.diagnostics.len(),
			"Compiled grammar"
		);

		Self {
			id: GrammarId(NEXT_GRAMMAR_ID.fetch_add(1, Ordering::Relaxed)),
			scope_name: raw.scope_name.as_str().into(),
			name: raw.name.clone(),
			file_types: raw.file_types.clone(),
			first_line_match: compiled.first_line_match,
			rules: compiled.rules,
			root: compiled.root,
			repository: compiled.repository,
			own_injections: compiled.injections,
			injection_selector: compiled.injection_selector,
			diagnostics: compiled.diagnostics,
		}
	}

	pub fn id(&self) -> GrammarId {
		self.id
	}

	/// Root scope name, e.g. `source.js`.
	pub fn scope_name(&self) -> &Scope {
		&self.scope_name
	}

	/// Human-readable language name.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn file_types(&self) -> &[String] {
		&self.file_types
	}

	/// Tests `firstLineMatch` against the first line of a document.
	pub fn matches_first_line(&self, line: &str) -> bool {
		let anchors = Anchors {
			allow_a: true,
			allow_g: true,
		};
		self.first_line_match
			.as_ref()
			.is_some_and(|regex| regex.search(line, 0, anchors).is_some())
	}

	/// Problems found during compilation.
	pub fn diagnostics(&self) -> &[GrammarCompileError] {
		&self.diagnostics
	}

	/// The rule holding the top-level patterns.
	pub fn root(&self) -> RuleId {
		self.root
	}

	/// Looks up a rule.
	///
	/// # Panics
	///
	/// Panics if `id` does not belong to this grammar.
	pub fn rule(&self, id: RuleId) -> &Rule {
		&self.rules[id.index()]
	}

	pub fn rule_count(&self) -> usize {
		self.rules.len()
	}

	/// Looks up a top-level repository entry.
	pub fn repository_rule(&self, name: &str) -> Option<RuleId> {
		self.repository.get(name).copied()
	}

	/// Selector under which this grammar injects itself into others.
	pub fn injection_selector(&self) -> Option<&Selector> {
		self.injection_selector.as_ref()
	}

	/// Injections declared by this grammar for its own scopes.
	pub(crate) fn own_injections(&self) -> &[(Selector, RuleId)] {
		&self.own_injections
	}
}

impl fmt::Debug for Grammar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Grammar")
			.field("id", &self.id)
			.field("scope_name", &self.scope_name)
			.field("rules", &self.rules.len())
			.field("diagnostics", &self.diagnostics.len())
			.finish_non_exhaustive()
	}
}
