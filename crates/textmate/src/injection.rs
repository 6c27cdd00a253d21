//! Injection lookup.
//!
//! Injections let one grammar contribute patterns to another wherever a
//! selector matches the current scopes. Two sources feed the list of a
//! tokenized grammar: its own `injections` map, and grammars registered as
//! global injections for its scope name (through their `injectionSelector`).

use std::sync::Arc;

use loom_selector::{Expr, Priority};
use tracing::debug;

use crate::grammar::Grammar;
use crate::registry::GrammarResolver;
use crate::rule::RuleRef;
use crate::scope::Scope;

/// One selector alternative bound to the rule it injects.
#[derive(Debug, Clone)]
pub struct Injection {
	/// Matched against the content scopes of the active frame.
	pub expr: Expr,
	/// Tie-break order against the host grammar's own patterns.
	pub priority: Priority,
	/// Scanned as if it were included at the current position.
	pub rule: RuleRef,
}

impl Injection {
	pub fn matches(&self, scopes: &[Scope]) -> bool {
		self.expr.matches(scopes)
	}
}

impl Grammar {
	/// Injections applying while `self` is the tokenized grammar.
	///
	/// Entries are ordered Left, Normal, Right, keeping declaration order
	/// within each priority. Tokenizers cache the list in their
	/// [`ScanCache`](crate::ScanCache).
	pub fn injections(self: &Arc<Self>, resolver: &dyn GrammarResolver) -> Vec<Injection> {
		collect(self, resolver)
	}
}

fn collect(grammar: &Arc<Grammar>, resolver: &dyn GrammarResolver) -> Vec<Injection> {
	let mut injections = Vec::new();

	for (selector, id) in grammar.own_injections() {
		let rule = RuleRef::new(grammar.clone(), *id);
		injections.extend(selector.alternatives().iter().map(|alt| Injection {
			expr: alt.expr.clone(),
			priority: alt.priority,
			rule: rule.clone(),
		}));
	}

	for scope in resolver.injections_for(grammar.scope_name()) {
		let Some(injector) = resolver.resolve(&scope) else {
			debug!(host = %grammar.scope_name(), injector = %scope, "Injection grammar not found");
			continue;
		};
		let Some(selector) = injector.injection_selector() else {
			debug!(injector = %scope, "Injection grammar has no injectionSelector");
			continue;
		};
		let rule = RuleRef::new(injector.clone(), injector.root());
		injections.extend(selector.alternatives().iter().map(|alt| Injection {
			expr: alt.expr.clone(),
			priority: alt.priority,
			rule: rule.clone(),
		}));
	}

	injections.sort_by_key(|injection| injection.priority);
	injections
}
