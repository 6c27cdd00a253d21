//! Tokenization caches.
//!
//! Pattern sets, injection lists and external include targets depend on the
//! resolver they were built with, so they live in a [`ScanCache`] paired with
//! one resolver rather than in the grammars. A [`Registry`](crate::Registry)
//! shares one cache between all its tokenizers; a standalone
//! [`Tokenizer`](crate::Tokenizer) owns its own. Grammars never point at a
//! cache, so dropping the owner frees everything it kept alive.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::grammar::{Grammar, GrammarId};
use crate::injection::Injection;
use crate::registry::GrammarResolver;
use crate::rule::{ExternalInclude, PatternSet, RuleId, RuleRef, ScanMode};

/// Tokenized grammar, target grammar, target rule, scan mode.
type PatternSetKey = (GrammarId, GrammarId, RuleId, ScanMode);

/// Included scope name and optional repository rule.
type IncludeKey = (Box<str>, Option<Box<str>>);

/// Write-once caches for tokenizing through one resolver.
#[derive(Default)]
pub struct ScanCache {
	pattern_sets: RwLock<FxHashMap<PatternSetKey, Arc<PatternSet>>>,
	injections: RwLock<FxHashMap<GrammarId, Arc<[Injection]>>>,
	includes: RwLock<FxHashMap<IncludeKey, Option<RuleRef>>>,
}

impl ScanCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the pattern set for `target` while tokenizing `base`, building
	/// it on first use.
	///
	/// `$base` inside `target` resolves to `base`, so sets are keyed by both.
	pub(crate) fn pattern_set(
		&self,
		base: &Arc<Grammar>,
		target: &RuleRef,
		mode: ScanMode,
		resolver: &dyn GrammarResolver,
	) -> Arc<PatternSet> {
		let key = (base.id(), target.grammar().id(), target.id(), mode);
		if let Some(set) = self.pattern_sets.read().get(&key) {
			return set.clone();
		}
		let set = Arc::new(PatternSet::collect(target, mode, base, resolver, self));
		self.pattern_sets.write().entry(key).or_insert(set).clone()
	}

	/// Injections applying while `grammar` is the tokenized grammar.
	pub(crate) fn injections(&self, grammar: &Arc<Grammar>, resolver: &dyn GrammarResolver) -> Arc<[Injection]> {
		if let Some(injections) = self.injections.read().get(&grammar.id()) {
			return injections.clone();
		}
		let built: Arc<[Injection]> = grammar.injections(resolver).into();
		self.injections.write().entry(grammar.id()).or_insert(built).clone()
	}

	/// Resolves an include of another grammar. The outcome is cached, so a
	/// missing target is reported once and never matches afterwards.
	pub(crate) fn resolve_include(&self, include: &ExternalInclude, resolver: &dyn GrammarResolver) -> Option<RuleRef> {
		let key: IncludeKey = (include.scope_name().into(), include.rule_name().map(Into::into));
		if let Some(target) = self.includes.read().get(&key) {
			return target.clone();
		}
		let target = resolve(include, resolver);
		self.includes.write().entry(key).or_insert(target).clone()
	}

	/// Number of cached pattern sets.
	pub fn pattern_set_count(&self) -> usize {
		self.pattern_sets.read().len()
	}
}

fn resolve(include: &ExternalInclude, resolver: &dyn GrammarResolver) -> Option<RuleRef> {
	let Some(grammar) = resolver.resolve(include.scope_name()) else {
		warn!(scope = include.scope_name(), "Included grammar not found");
		return None;
	};
	let id = match include.rule_name() {
		None => grammar.root(),
		Some(name) => {
			let Some(id) = grammar.repository_rule(name) else {
				warn!(scope = include.scope_name(), rule = name, "Included rule not found");
				return None;
			};
			id
		}
	};
	Some(RuleRef::new(grammar, id))
}

impl std::fmt::Debug for ScanCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScanCache")
			.field("pattern_sets", &self.pattern_sets.read().len())
			.field("injections", &self.injections.read().len())
			.field("includes", &self.includes.read().len())
			.finish()
	}
}
