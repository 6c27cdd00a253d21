#![allow(unused_crate_dependencies)]

//! End-to-end tokenization through a registry loaded from grammar files.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use loom_textmate::{
	GrammarSource, InMemorySource, Priority, RawGrammar, Registry, RegistryOptions, Token, Tokenizer,
};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> PathBuf {
	PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn source() -> InMemorySource {
	let mut source = InMemorySource::new();
	source.add_grammar_file(fixture("mini.tmLanguage.json")).unwrap();
	source.add_grammar_file(fixture("todo.tmLanguage.json")).unwrap();
	source.add_injection("source.mini", "source.todo");
	source
}

/// Innermost scope of the token covering `offset`.
fn innermost(tokens: &[Token], offset: usize) -> String {
	let token = tokens.iter().find(|t| t.range().contains(&offset)).unwrap();
	token.scopes.last().unwrap().to_string()
}

fn tokenize_lines(tokenizer: &Tokenizer<'_>, lines: &[&str]) -> Vec<Vec<Token>> {
	let mut stack = None;
	lines
		.iter()
		.map(|line| {
			let result = tokenizer.tokenize_line(line, stack.as_ref());
			stack = Some(result.stack);
			result.tokens
		})
		.collect()
}

#[test]
fn test_grammar_file_metadata() {
	let registry = Registry::new(source());
	let mini = registry.load("source.mini").unwrap();
	assert_eq!(mini.name(), Some("Mini"));
	assert_eq!(mini.file_types(), &["mini".to_string()]);
	assert!(mini.matches_first_line("#!/usr/bin/env mini"));
	assert!(!mini.matches_first_line("let x = 1"));
	assert!(mini.diagnostics().is_empty());
}

#[test]
fn test_injection_grammar_applies_inside_comments() {
	let registry = Registry::new(source());
	let tokenizer = registry.tokenizer("source.mini").unwrap();
	let result = tokenizer.tokenize_line("/* TODO */ TODO", None);
	let tokens = &result.tokens;

	assert_eq!(innermost(tokens, 0), "punctuation.definition.comment.mini");
	assert_eq!(innermost(tokens, 2), "comment.block.mini");
	assert_eq!(innermost(tokens, 3), "keyword.other.todo");
	assert_eq!(
		tokens.iter().find(|t| t.start == 3).map(|t| t.range()),
		Some(3..7)
	);
	assert_eq!(innermost(tokens, 9), "punctuation.definition.comment.mini");
	// Outside the comment the selector does not match.
	assert_eq!(innermost(tokens, 12), "source.mini");
}

#[test]
fn test_multi_line_comment_and_escapes() {
	let registry = Registry::new(source());
	let tokenizer = registry.tokenizer("source.mini").unwrap();
	let lines = tokenize_lines(&tokenizer, &[r#"let x = "a\"b" /* start"#, "TODO end */ 42"]);

	assert_eq!(innermost(&lines[0], 0), "keyword.control.mini");
	assert_eq!(innermost(&lines[0], 10), "constant.character.escape.mini");
	assert_eq!(innermost(&lines[0], 12), "string.quoted.double.mini");
	assert_eq!(innermost(&lines[0], 14), "source.mini");
	assert_eq!(innermost(&lines[0], 20), "comment.block.mini");

	assert_eq!(innermost(&lines[1], 0), "keyword.other.todo");
	assert_eq!(innermost(&lines[1], 5), "comment.block.mini");
	assert_eq!(innermost(&lines[1], 13), "constant.numeric.mini");
}

#[test]
fn test_balanced_document_returns_to_root() {
	let registry = Registry::new(source());
	let tokenizer = registry.tokenizer("source.mini").unwrap();
	let doc = tokenizer.tokenize_document("let a = 1\n/* one\ntwo */\n\"str\"\n// end\n");
	assert_eq!(doc.lines.len(), 5);
	assert_eq!(doc.stack.depth(), 1);
	assert_eq!(doc.stack, tokenizer.initial_stack());

	let open = tokenizer.tokenize_document("/* never closed\nstill\n");
	assert_eq!(open.stack.depth(), 2);
	assert_eq!(
		open.stack.scopes().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
		vec!["source.mini", "comment.block.mini"]
	);
}

#[test]
fn test_equal_states_compare_equal() {
	let registry = Registry::new(source());
	let tokenizer = registry.tokenizer("source.mini").unwrap();
	let a = tokenizer.tokenize_line("/* a", None).stack;
	let b = tokenizer.tokenize_line("let x /* b", None).stack;
	assert_eq!(a, b);
	let c = tokenizer.tokenize_line("\"a", None).stack;
	assert_ne!(a, c);
}

#[test]
fn test_max_line_length_from_options() {
	let registry = Registry::with_options(
		source(),
		RegistryOptions {
			max_line_length: Some(8),
		},
	);
	let tokenizer = registry.tokenizer("source.mini").unwrap();
	let result = tokenizer.tokenize_line("let value = 12345", None);
	assert_eq!(result.tokens.len(), 1);
	assert_eq!(result.tokens[0].range(), 0..17);
}

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

#[test]
fn test_concurrent_first_access_compiles_once() {
	let loads = Arc::new(AtomicUsize::new(0));
	let registry = Registry::new(CountingSource {
		inner: source(),
		loads: loads.clone(),
	});

	let grammars: Vec<_> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..8)
			.map(|_| scope.spawn(|| registry.grammar("source.mini").unwrap()))
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(loads.load(Ordering::SeqCst), 1);
	assert!(grammars.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_concurrent_tokenization_agrees() {
	let registry = Registry::new(source());
	let text = "let a = \"x\" /* TODO\n*/ fn 1\n";
	let expected = registry.tokenizer("source.mini").unwrap().tokenize_document(text);

	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				let tokenizer = registry.tokenizer("source.mini").unwrap();
				assert_eq!(tokenizer.tokenize_document(text), expected);
			});
		}
	});
}

#[test]
fn test_injections_sorted_by_priority() {
	let mut source = source();
	source.add_grammar(
		RawGrammar::from_json(
			r#"{
				"scopeName": "source.host",
				"injections": {
					"R:comment": { "patterns": [{ "match": "r" }] },
					"string": { "patterns": [{ "match": "n" }] },
					"L:meta": { "patterns": [{ "match": "l" }] }
				}
			}"#,
		)
		.unwrap(),
	);
	source.add_injection("source.host", "source.todo");
	let registry = Registry::new(source);
	let tokenizer = registry.tokenizer("source.host").unwrap();
	let priorities: Vec<_> = tokenizer.injections().iter().map(|i| i.priority).collect();
	assert_eq!(
		priorities,
		vec![Priority::Left, Priority::Left, Priority::Normal, Priority::Right]
	);
	// Own `L:` injections come before global ones of the same priority.
	assert_eq!(&**tokenizer.injections()[0].rule.grammar().scope_name(), "source.host");
	assert_eq!(&**tokenizer.injections()[1].rule.grammar().scope_name(), "source.todo");
}
