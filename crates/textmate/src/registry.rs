//! Grammar loading and caching.
//!
//! A [`Registry`] owns a [`GrammarSource`] and compiles each grammar the
//! first time its scope name is requested. Compilation happens at most once
//! per scope name even under concurrent first access; every later request
//! returns the same `Arc<Grammar>`.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::ScanCache;
use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::raw::RawGrammar;
use crate::tokenizer::Tokenizer;

/// Looks up compiled grammars by scope name.
///
/// Consumed by the tokenizer to follow includes into other grammars and to
/// find injection grammars.
pub trait GrammarResolver: Send + Sync {
	fn resolve(&self, scope_name: &str) -> Option<Arc<Grammar>>;

	/// Scope names of grammars that inject into `scope_name`.
	fn injections_for(&self, _scope_name: &str) -> Vec<String> {
		Vec::new()
	}
}

/// Resolves nothing. Tokenizes a standalone grammar whose external includes
/// never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGrammars;

impl GrammarResolver for NoGrammars {
	fn resolve(&self, _scope_name: &str) -> Option<Arc<Grammar>> {
		None
	}
}

/// Supplies raw grammar documents to a [`Registry`].
pub trait GrammarSource: Send + Sync {
	fn raw_grammar(&self, scope_name: &str) -> Option<RawGrammar>;

	/// Scope names of grammars that inject into `scope_name`.
	fn injections_for(&self, _scope_name: &str) -> Vec<String> {
		Vec::new()
	}
}

/// A [`GrammarSource`] backed by grammars added up front.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
	grammars: FxHashMap<String, RawGrammar>,
	injections: FxHashMap<String, Vec<String>>,
}

impl InMemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a grammar under its own scope name, replacing any previous one.
	pub fn add_grammar(&mut self, grammar: RawGrammar) -> &mut Self {
		self.grammars.insert(grammar.scope_name.clone(), grammar);
		self
	}

	/// Reads a grammar file and adds it. Returns its scope name.
	pub fn add_grammar_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
		let grammar = RawGrammar::from_path(path)?;
		let scope_name = grammar.scope_name.clone();
		self.add_grammar(grammar);
		Ok(scope_name)
	}

	/// Registers `injector` as a global injection into `target`.
	pub fn add_injection(&mut self, target: impl Into<String>, injector: impl Into<String>) -> &mut Self {
		self.injections.entry(target.into()).or_default().push(injector.into());
		self
	}

	/// Scope names of all added grammars, sorted.
	pub fn scope_names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.grammars.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

impl GrammarSource for InMemorySource {
	fn raw_grammar(&self, scope_name: &str) -> Option<RawGrammar> {
		self.grammars.get(scope_name).cloned()
	}

	fn injections_for(&self, scope_name: &str) -> Vec<String> {
		self.injections.get(scope_name).cloned().unwrap_or_default()
	}
}

/// Registry settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryOptions {
	/// Lines longer than this (in bytes) are not tokenized: they produce a
	/// single token with the incoming scopes and keep the incoming stack.
	pub max_line_length: Option<usize>,
}

type GrammarSlot = Arc<OnceCell<Option<Arc<Grammar>>>>;

/// Compiled grammar cache.
///
/// Tokenizers created through [`tokenizer`](Self::tokenizer) share one
/// [`ScanCache`].
pub struct Registry {
	source: Box<dyn GrammarSource>,
	options: RegistryOptions,
	grammars: RwLock<FxHashMap<String, GrammarSlot>>,
	cache: Arc<ScanCache>,
}

impl Registry {
	pub fn new(source: impl GrammarSource + 'static) -> Self {
		Self::with_options(source, RegistryOptions::default())
	}

	pub fn with_options(source: impl GrammarSource + 'static, options: RegistryOptions) -> Self {
		Self {
			source: Box::new(source),
			options,
			grammars: RwLock::new(FxHashMap::default()),
			cache: Arc::default(),
		}
	}

	pub fn options(&self) -> &RegistryOptions {
		&self.options
	}

	/// Returns the compiled grammar for `scope_name`, compiling it on first use.
	///
	/// Concurrent first calls for one scope name block on a shared slot, so
	/// the grammar is compiled once. A scope the source does not know is
	/// remembered as missing.
	pub fn grammar(&self, scope_name: &str) -> Option<Arc<Grammar>> {
		let slot = self.slot(scope_name);
		slot.get_or_init(|| {
			let Some(raw) = self.source.raw_grammar(scope_name) else {
				debug!(scope = scope_name, "Grammar not provided by source");
				return None;
			};
			if raw.scope_name != scope_name {
				warn!(
					requested = scope_name,
					declared = %raw.scope_name,
					"Grammar declares a different scope name"
				);
			}
			let grammar = Grammar::compile(&raw);
			info!(
				scope = scope_name,
				rules = grammar.rule_count(),
				diagnostics = grammar.diagnostics().len(),
				"Loaded grammar"
			);
			Some(Arc::new(grammar))
		})
		.clone()
	}

	/// Like [`grammar`](Self::grammar), but a missing grammar is an error.
	pub fn load(&self, scope_name: &str) -> Result<Arc<Grammar>> {
		self.grammar(scope_name)
			.ok_or_else(|| GrammarError::NotFound(scope_name.to_string()))
	}

	/// Creates a tokenizer for `scope_name` that follows includes and
	/// injections through this registry.
	pub fn tokenizer(&self, scope_name: &str) -> Result<Tokenizer<'_>> {
		let grammar = self.load(scope_name)?;
		let tokenizer = Tokenizer::with_cache(grammar, self, self.cache.clone());
		Ok(tokenizer.with_max_line_length(self.options.max_line_length))
	}

	/// Grammars compiled so far, sorted by scope name.
	pub fn loaded(&self) -> Vec<Arc<Grammar>> {
		let mut loaded: Vec<_> = self
			.grammars
			.read()
			.values()
			.filter_map(|slot| slot.get().cloned().flatten())
			.collect();
		loaded.sort_by(|a, b| a.scope_name().cmp(b.scope_name()));
		loaded
	}

	fn slot(&self, scope_name: &str) -> GrammarSlot {
		if let Some(slot) = self.grammars.read().get(scope_name) {
			return slot.clone();
		}
		self.grammars
			.write()
			.entry(scope_name.to_string())
			.or_default()
			.clone()
	}
}

impl GrammarResolver for Registry {
	fn resolve(&self, scope_name: &str) -> Option<Arc<Grammar>> {
		self.grammar(scope_name)
	}

	fn injections_for(&self, scope_name: &str) -> Vec<String> {
		self.source.injections_for(scope_name)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	struct CountingSource {
		inner: InMemorySource,
		loads: Arc<AtomicUsize>,
	}

	impl GrammarSource for CountingSource {
		fn raw_grammar(&self, scope_name: &str) -> Option<RawGrammar> {
			self.loads.fetch_add(1, Ordering::SeqCst);
			self.inner.raw_grammar(scope_name)
		}
	}

	fn source() -> InMemorySource {
		let mut source = InMemorySource::new();
		source.add_grammar(RawGrammar::from_json(r#"{ "scopeName": "source.g" }"#).unwrap());
		source
	}

	#[test]
	fn test_grammar_is_cached() {
		let registry = Registry::new(source());
		let a = registry.grammar("source.g").unwrap();
		let b = registry.grammar("source.g").unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(registry.loaded().len(), 1);
	}

	#[test]
	fn test_missing_grammar() {
		let registry = Registry::new(source());
		assert!(registry.grammar("source.none").is_none());
		assert!(matches!(registry.load("source.none"), Err(GrammarError::NotFound(s)) if s == "source.none"));
		assert!(registry.loaded().is_empty());
	}

	#[test]
	fn test_missing_grammar_is_looked_up_once() {
		let loads = Arc::new(AtomicUsize::new(0));
		let registry = Registry::new(CountingSource {
			inner: source(),
			loads: loads.clone(),
		});
		assert!(registry.grammar("source.none").is_none());
		assert!(registry.grammar("source.none").is_none());
		assert!(registry.grammar("source.g").is_some());
		assert!(registry.grammar("source.g").is_some());
		assert_eq!(loads.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_options_deserialize() {
		let options: RegistryOptions = serde_json::from_str(r#"{ "max-line-length": 10 }"#).unwrap();
		assert_eq!(options.max_line_length, Some(10));
		assert_eq!(serde_json::from_str::<RegistryOptions>("{}").unwrap(), RegistryOptions::default());
		assert!(serde_json::from_str::<RegistryOptions>(r#"{ "bogus": 1 }"#).is_err());
	}
}
