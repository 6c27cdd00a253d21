//! Flattened candidate lists for scanning.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::{PatternRef, Rule, RuleId, RuleRef};
use crate::cache::ScanCache;
use crate::grammar::{Grammar, GrammarId};
use crate::regex::{Anchors, RegexMatch, RegexSource};
use crate::registry::GrammarResolver;

/// What a [`PatternSet`] is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ScanMode {
	/// The children of an active frame's rule.
	Children,
	/// The rule itself, as if it were included: its `match` or `begin` regex,
	/// or its children for include-only rules. Used for injection targets.
	Included,
}

/// The regexes scanned for one rule, in priority order.
///
/// Include-only rules are flattened in place and each is expanded at most
/// once, so recursive includes terminate.
#[derive(Debug, Default)]
pub(crate) struct PatternSet {
	entries: Vec<(RuleRef, Arc<RegexSource>)>,
}

struct Collector<'a> {
	base: &'a Arc<Grammar>,
	resolver: &'a dyn GrammarResolver,
	cache: &'a ScanCache,
	visited: FxHashSet<(GrammarId, RuleId)>,
	entries: Vec<(RuleRef, Arc<RegexSource>)>,
}

impl PatternSet {
	/// Builds the set for `target` in the context of tokenizing `base`.
	pub(crate) fn collect(
		target: &RuleRef,
		mode: ScanMode,
		base: &Arc<Grammar>,
		resolver: &dyn GrammarResolver,
		cache: &ScanCache,
	) -> Self {
		let mut collector = Collector {
			base,
			resolver,
			cache,
			visited: FxHashSet::default(),
			entries: Vec::new(),
		};
		match mode {
			ScanMode::Children => {
				collector.visited.insert((target.grammar().id(), target.id()));
				collector.children(target);
			}
			ScanMode::Included => collector.included(target),
		}
		Self {
			entries: collector.entries,
		}
	}

	/// Finds the earliest match at or after `pos`. Ties go to the earlier entry.
	pub(crate) fn find(&self, text: &str, pos: usize, anchors: Anchors) -> Option<(&RuleRef, RegexMatch)> {
		let mut best: Option<(&RuleRef, RegexMatch)> = None;
		for (rule, regex) in &self.entries {
			let Some(found) = regex.search(text, pos, anchors) else {
				continue;
			};
			if best.as_ref().is_some_and(|(_, m)| m.start() <= found.start()) {
				continue;
			}
			let at_pos = found.start() == pos;
			best = Some((rule, found));
			if at_pos {
				break;
			}
		}
		best
	}
}

impl Collector<'_> {
	fn children(&mut self, owner: &RuleRef) {
		for pattern in owner.rule().patterns() {
			let child = match pattern {
				PatternRef::Rule(id) => RuleRef::new(owner.grammar().clone(), *id),
				PatternRef::Base => RuleRef::new(self.base.clone(), self.base.root()),
				PatternRef::External(include) => match self.cache.resolve_include(include, self.resolver) {
					Some(rule) => rule,
					None => continue,
				},
			};
			self.included(&child);
		}
	}

	fn included(&mut self, rule: &RuleRef) {
		let regex = match rule.rule() {
			Rule::Match(r) => &r.regex,
			Rule::BeginEnd(r) => &r.begin,
			Rule::BeginWhile(r) => &r.begin,
			Rule::IncludeOnly(_) => {
				if self.visited.insert((rule.grammar().id(), rule.id())) {
					self.children(rule);
				}
				return;
			}
			Rule::Invalid => return,
		};
		self.entries.push((rule.clone(), regex.clone()));
	}
}
