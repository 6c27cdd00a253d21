//! Line tokenizer.
//!
//! [`Tokenizer::tokenize_line`] turns one line plus the [`RuleStack`] left by
//! the previous line into scoped tokens and the stack for the next line.
//! Tokens always partition the line: they are contiguous, non-overlapping and
//! cover every byte. Offsets are UTF-8 byte offsets.

mod encoded;
mod scan;

use std::ops::Range;
use std::sync::Arc;

pub use encoded::{EncodedLineTokens, EncodedMetadata, FontStyle, MetadataProvider, StandardTokenType, TokenStyle};

use crate::cache::ScanCache;
use crate::grammar::Grammar;
use crate::injection::Injection;
use crate::registry::GrammarResolver;
use crate::scope::{Scope, ScopeList};
use crate::stack::RuleStack;

/// A scoped byte range of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub start: usize,
	pub end: usize,
	/// Scope stack snapshot, outermost first.
	pub scopes: Vec<Scope>,
}

impl Token {
	pub fn range(&self) -> Range<usize> {
		self.start..self.end
	}
}

/// Result of tokenizing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTokens {
	pub tokens: Vec<Token>,
	/// State to pass when tokenizing the next line.
	pub stack: RuleStack,
}

/// Result of tokenizing a whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTokens {
	/// Tokens per line.
	pub lines: Vec<Vec<Token>>,
	/// State after the last line.
	pub stack: RuleStack,
}

/// Tokenizes lines of one grammar.
///
/// Includes into other grammars and injection grammars are looked up through
/// the resolver. What that lookup builds is kept in a [`ScanCache`], which
/// must only ever be used with the same resolver.
pub struct Tokenizer<'r> {
	grammar: Arc<Grammar>,
	resolver: &'r dyn GrammarResolver,
	cache: Arc<ScanCache>,
	injections: Arc<[Injection]>,
	max_line_length: Option<usize>,
}

impl<'r> Tokenizer<'r> {
	/// Creates a tokenizer with a cache of its own.
	pub fn new(grammar: Arc<Grammar>, resolver: &'r dyn GrammarResolver) -> Self {
		Self::with_cache(grammar, resolver, Arc::default())
	}

	/// Creates a tokenizer sharing `cache` with other tokenizers of `resolver`.
	pub fn with_cache(grammar: Arc<Grammar>, resolver: &'r dyn GrammarResolver, cache: Arc<ScanCache>) -> Self {
		let injections = cache.injections(&grammar, resolver);
		Self {
			grammar,
			resolver,
			cache,
			injections,
			max_line_length: None,
		}
	}

	/// Lines longer than `max` bytes are passed through as one token.
	pub fn with_max_line_length(mut self, max: Option<usize>) -> Self {
		self.max_line_length = max;
		self
	}

	pub fn grammar(&self) -> &Arc<Grammar> {
		&self.grammar
	}

	pub fn cache(&self) -> &Arc<ScanCache> {
		&self.cache
	}

	/// Injections considered while tokenizing, in priority order.
	pub fn injections(&self) -> &[Injection] {
		&self.injections
	}

	/// The stack the first line of a document starts from.
	pub fn initial_stack(&self) -> RuleStack {
		RuleStack::root(&self.grammar)
	}

	/// Tokenizes one line.
	///
	/// `prev` is the stack returned for the previous line, or `None` for the
	/// first line of a document. `line` should not contain its line terminator.
	pub fn tokenize_line(&self, line: &str, prev: Option<&RuleStack>) -> LineTokens {
		let (stack, is_first_line) = match prev {
			Some(stack) => (stack.clone(), false),
			None => (self.initial_stack(), true),
		};

		if let Some(max) = self.max_line_length
			&& line.len() > max
		{
			let tokens = vec![Token {
				start: 0,
				end: line.len(),
				scopes: stack.scopes(),
			}];
			return LineTokens { tokens, stack };
		}

		let text = format!("{line}\n");
		let mut acc = TokenAccumulator::default();
		let stack = self.tokenize_text(&text, is_first_line, stack, &mut acc);
		LineTokens {
			tokens: acc.finish(line.len()),
			stack: stack.reset_line_positions(),
		}
	}

	/// Tokenizes every line of `text`, carrying the stack forward.
	pub fn tokenize_document(&self, text: &str) -> DocumentTokens {
		let mut lines = Vec::new();
		let mut stack: Option<RuleStack> = None;
		for line in text.lines() {
			let result = self.tokenize_line(line, stack.as_ref());
			lines.push(result.tokens);
			stack = Some(result.stack);
		}
		DocumentTokens {
			lines,
			stack: stack.unwrap_or_else(|| self.initial_stack()),
		}
	}
}

/// Collects tokens for one line in order.
#[derive(Debug, Default)]
struct TokenAccumulator {
	tokens: Vec<Token>,
	last_end: usize,
}

impl TokenAccumulator {
	/// Emits `[last_end, end)` with `scopes`. Ranges already covered are skipped.
	fn produce(&mut self, scopes: &ScopeList, end: usize) {
		if end <= self.last_end {
			return;
		}
		self.tokens.push(Token {
			start: self.last_end,
			end,
			scopes: scopes.to_vec(),
		});
		self.last_end = end;
	}

	/// Drops what was emitted for the appended newline.
	fn finish(mut self, line_len: usize) -> Vec<Token> {
		self.tokens.retain(|token| token.start < line_len);
		if let Some(last) = self.tokens.last_mut() {
			last.end = line_len;
		}
		self.tokens
	}
}

#[cfg(test)]
mod tests;
