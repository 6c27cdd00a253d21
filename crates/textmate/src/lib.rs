//! TextMate grammar compiler and line tokenizer.
//!
//! Grammars are JSON documents of nested regex rules. This crate compiles
//! them into rule graphs and tokenizes text one line at a time, producing
//! tokens tagged with scope stacks such as
//! `["source.js", "string.quoted.double.js"]`.
//!
//! # Architecture
//!
//! * [`raw`]: Deserialized grammar documents
//! * [`regex`]: Lazily compiled Oniguruma patterns with `\A`/`\G` variants
//! * [`rule`]: Compiled rules and include references
//! * [`grammar`]: An immutable compiled grammar
//! * [`registry`]: Scope-name keyed grammar loading, compiled at most once
//! * [`ScanCache`]: Pattern sets, injections and include targets built while
//!   tokenizing, shared by the tokenizers of one resolver
//! * [`stack`]: The persistent state carried between lines
//! * [`tokenizer`]: The scanning loop and token output, scoped or encoded
//!
//! # Usage
//!
//! ```no_run
//! use loom_textmate::{InMemorySource, RawGrammar, Registry};
//!
//! let mut source = InMemorySource::new();
//! source.add_grammar(RawGrammar::from_path("js.tmLanguage.json")?);
//! let registry = Registry::new(source);
//! let tokenizer = registry.tokenizer("source.js")?;
//!
//! let mut stack = None;
//! for line in ["let s = \"hi\";", "// done"] {
//!     let result = tokenizer.tokenize_line(line, stack.as_ref());
//!     for token in &result.tokens {
//!         println!("{:?} {:?}", token.range(), token.scopes);
//!     }
//!     stack = Some(result.stack);
//! }
//! # Ok::<(), loom_textmate::GrammarError>(())
//! ```

mod cache;
mod error;
pub mod grammar;
mod injection;
pub mod raw;
pub mod regex;
pub mod registry;
pub mod rule;
mod scope;
pub mod stack;
pub mod tokenizer;

pub use cache::ScanCache;
pub use error::{GrammarCompileError, GrammarError, Result};
pub use grammar::{Grammar, GrammarId};
pub use injection::Injection;
pub use loom_selector::{Priority, Selector, SelectorSyntaxError};
pub use raw::{RawGrammar, RawPattern, RawRule, Repository};
pub use registry::{GrammarResolver, GrammarSource, InMemorySource, NoGrammars, Registry, RegistryOptions};
pub use rule::{CaptureRule, ExternalInclude, PatternRef, Rule, RuleId, RuleRef};
pub use scope::{Scope, ScopeList};
pub use stack::{PushFrame, RuleStack};
pub use tokenizer::{
	DocumentTokens, EncodedLineTokens, EncodedMetadata, FontStyle, LineTokens, MetadataProvider, StandardTokenType,
	Token, TokenStyle, Tokenizer,
};
