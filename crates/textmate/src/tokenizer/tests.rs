use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::raw::RawGrammar;
use crate::registry::{InMemorySource, NoGrammars, Registry};

type Simple = (Range<usize>, Vec<String>);

fn grammar(json: &str) -> Arc<Grammar> {
	Arc::new(Grammar::compile(&RawGrammar::from_json(json).unwrap()))
}

fn simplify(tokens: &[Token]) -> Vec<Simple> {
	tokens
		.iter()
		.map(|t| (t.range(), t.scopes.iter().map(|s| s.to_string()).collect()))
		.collect()
}

fn tok(range: Range<usize>, scopes: &[&str]) -> Simple {
	(range, scopes.iter().map(|s| s.to_string()).collect())
}

fn lines(tokenizer: &Tokenizer<'_>, text: &[&str]) -> Vec<Vec<Simple>> {
	let mut stack = None;
	text.iter()
		.map(|line| {
			let result = tokenizer.tokenize_line(line, stack.as_ref());
			stack = Some(result.stack);
			simplify(&result.tokens)
		})
		.collect()
}

fn single(json: &str, line: &str) -> Vec<Simple> {
	let tokenizer = Tokenizer::new(grammar(json), &NoGrammars);
	simplify(&tokenizer.tokenize_line(line, None).tokens)
}

const STRINGS: &str = r#"{
	"scopeName": "source.g",
	"patterns": [
		{ "match": "\\d+", "name": "constant.numeric" },
		{ "begin": "\"", "end": "\"", "name": "string.quoted.double" }
	]
}"#;

#[test]
fn test_match_splits_line() {
	assert_eq!(
		single(STRINGS, "ab12cd"),
		vec![
			tok(0..2, &["source.g"]),
			tok(2..4, &["source.g", "constant.numeric"]),
			tok(4..6, &["source.g"]),
		]
	);
}

#[test]
fn test_begin_end_on_one_line_is_balanced() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let result = tokenizer.tokenize_line("x \"hi\" y", None);
	let string = &["source.g", "string.quoted.double"];
	assert_eq!(
		simplify(&result.tokens),
		vec![
			tok(0..2, &["source.g"]),
			tok(2..3, string),
			tok(3..5, string),
			tok(5..6, string),
			tok(6..8, &["source.g"]),
		]
	);
	assert_eq!(result.stack.depth(), 1);
	assert_eq!(result.stack, tokenizer.initial_stack());
}

#[test]
fn test_begin_end_spans_lines() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let first = tokenizer.tokenize_line("a \"bc", None);
	assert_eq!(first.stack.depth(), 2);
	let second = tokenizer.tokenize_line("de\" 7", Some(&first.stack));
	assert_eq!(second.stack.depth(), 1);
	let string = &["source.g", "string.quoted.double"];
	assert_eq!(
		simplify(&second.tokens),
		vec![
			tok(0..2, string),
			tok(2..3, string),
			tok(3..4, &["source.g"]),
			tok(4..5, &["source.g", "constant.numeric"]),
		]
	);
}

#[test]
fn test_empty_line_has_no_tokens() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let first = tokenizer.tokenize_line("\"open", None);
	let empty = tokenizer.tokenize_line("", Some(&first.stack));
	assert!(empty.tokens.is_empty());
	assert_eq!(empty.stack, first.stack);
}

#[test]
fn test_content_name_excludes_delimiters() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"begin": "\\(", "end": "\\)",
			"name": "meta.group", "contentName": "meta.inner",
			"beginCaptures": { "0": { "name": "punctuation.open" } },
			"endCaptures": { "0": { "name": "punctuation.close" } }
		}]
	}"#;
	assert_eq!(
		single(json, "(x)"),
		vec![
			tok(0..1, &["source.g", "meta.group", "punctuation.open"]),
			tok(1..2, &["source.g", "meta.group", "meta.inner"]),
			tok(2..3, &["source.g", "meta.group", "punctuation.close"]),
		]
	);
}

#[test]
fn test_captures_scope_groups() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"match": "(\\w+)=(\\d+)",
			"name": "meta.assign",
			"captures": { "1": { "name": "variable" }, "2": { "name": "constant" } }
		}]
	}"#;
	assert_eq!(
		single(json, "a=1"),
		vec![
			tok(0..1, &["source.g", "meta.assign", "variable"]),
			tok(1..2, &["source.g", "meta.assign"]),
			tok(2..3, &["source.g", "meta.assign", "constant"]),
		]
	);
}

#[test]
fn test_nested_captures_stack_scopes() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"match": "((a)b)",
			"captures": { "1": { "name": "outer" }, "2": { "name": "inner" } }
		}]
	}"#;
	assert_eq!(
		single(json, "ab"),
		vec![tok(0..1, &["source.g", "outer", "inner"]), tok(1..2, &["source.g", "outer"])]
	);
}

#[test]
fn test_capture_patterns_retokenize_capture_text() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"match": "x(abc)y",
			"captures": { "1": { "name": "inner", "patterns": [{ "match": "b", "name": "bee" }] } }
		}]
	}"#;
	assert_eq!(
		single(json, "xabcy"),
		vec![
			tok(0..1, &["source.g"]),
			tok(1..2, &["source.g", "inner"]),
			tok(2..3, &["source.g", "inner", "bee"]),
			tok(3..4, &["source.g", "inner"]),
			tok(4..5, &["source.g"]),
		]
	);
}

#[test]
fn test_capture_names_substitute_groups() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{ "match": "(\\w+)\\.", "name": "support.${1:/downcase}" }]
	}"#;
	assert_eq!(single(json, "FOO."), vec![tok(0..4, &["source.g", "support.foo"])]);
}

#[test]
fn test_end_back_reference_uses_begin_capture() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{ "begin": "<<(\\w+)", "end": "^\\1$", "name": "string.heredoc" }]
	}"#;
	let tokenizer = Tokenizer::new(grammar(json), &NoGrammars);
	let heredoc = &["source.g", "string.heredoc"];
	assert_eq!(
		lines(&tokenizer, &["<<EOF", "END", "EOF", "after"]),
		vec![
			vec![tok(0..5, heredoc)],
			vec![tok(0..3, heredoc)],
			vec![tok(0..3, heredoc)],
			vec![tok(0..5, &["source.g"])],
		]
	);
}

#[test]
fn test_begin_while_continues_until_while_fails() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"begin": "^>", "while": "^>", "name": "markup.quote",
			"patterns": [{ "match": "\\*\\w+\\*", "name": "markup.bold" }]
		}]
	}"#;
	let tokenizer = Tokenizer::new(grammar(json), &NoGrammars);
	let quote = &["source.g", "markup.quote"];
	let first = tokenizer.tokenize_line("> a", None);
	assert_eq!(simplify(&first.tokens), vec![tok(0..1, quote), tok(1..3, quote)]);
	assert_eq!(first.stack.depth(), 2);

	let second = tokenizer.tokenize_line("> *b*", Some(&first.stack));
	assert_eq!(
		simplify(&second.tokens),
		vec![
			tok(0..1, quote),
			tok(1..2, quote),
			tok(2..5, &["source.g", "markup.quote", "markup.bold"]),
		]
	);

	let third = tokenizer.tokenize_line("c", Some(&second.stack));
	assert_eq!(simplify(&third.tokens), vec![tok(0..1, &["source.g"])]);
	assert_eq!(third.stack.depth(), 1);
}

#[test]
fn test_end_wins_ties_unless_applied_last() {
	let grammar_with = |last: bool| {
		format!(
			r#"{{
				"scopeName": "source.g",
				"patterns": [{{
					"begin": "<", "end": ">", "name": "tag", "applyEndPatternLast": {},
					"patterns": [{{ "match": ">>", "name": "op" }}]
				}}]
			}}"#,
			u8::from(last)
		)
	};

	let tokenizer = Tokenizer::new(grammar(&grammar_with(false)), &NoGrammars);
	let result = tokenizer.tokenize_line("<>>", None);
	assert_eq!(
		simplify(&result.tokens),
		vec![
			tok(0..1, &["source.g", "tag"]),
			tok(1..2, &["source.g", "tag"]),
			tok(2..3, &["source.g"]),
		]
	);
	assert_eq!(result.stack.depth(), 1);

	let tokenizer = Tokenizer::new(grammar(&grammar_with(true)), &NoGrammars);
	let result = tokenizer.tokenize_line("<>>", None);
	assert_eq!(
		simplify(&result.tokens),
		vec![tok(0..1, &["source.g", "tag"]), tok(1..3, &["source.g", "tag", "op"])]
	);
	assert_eq!(result.stack.depth(), 2);
}

#[test]
fn test_zero_width_match_does_not_loop() {
	let json = r#"{ "scopeName": "source.g", "patterns": [{ "match": "(?=x)", "name": "look" }] }"#;
	assert_eq!(
		single(json, "axb"),
		vec![
			tok(0..1, &["source.g"]),
			tok(1..2, &["source.g"]),
			tok(2..3, &["source.g"]),
		]
	);
}

#[test]
fn test_zero_width_begin_end_does_not_loop() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{ "begin": "(?=a)", "end": "(?=a)", "name": "empty" }]
	}"#;
	let tokenizer = Tokenizer::new(grammar(json), &NoGrammars);
	let result = tokenizer.tokenize_line("aaa", None);
	assert_eq!(result.tokens.first().map(|t| t.start), Some(0));
	assert_eq!(result.tokens.last().map(|t| t.end), Some(3));
}

#[test]
fn test_zero_width_step_respects_char_boundaries() {
	let json = r#"{ "scopeName": "source.g", "patterns": [{ "match": "(?=é)" }] }"#;
	assert_eq!(
		single(json, "xé"),
		vec![tok(0..1, &["source.g"]), tok(1..3, &["source.g"])]
	);
}

#[test]
fn test_offsets_are_utf8_bytes() {
	let json = r#"{ "scopeName": "source.g", "patterns": [{ "match": "é+", "name": "e" }] }"#;
	assert_eq!(
		single(json, "aéé b"),
		vec![
			tok(0..1, &["source.g"]),
			tok(1..5, &["source.g", "e"]),
			tok(5..7, &["source.g"]),
		]
	);
}

#[test]
fn test_anchor_a_matches_only_on_first_line() {
	let json = r#"{ "scopeName": "source.g", "patterns": [{ "match": "\\A#!.*", "name": "shebang" }] }"#;
	let tokenizer = Tokenizer::new(grammar(json), &NoGrammars);
	assert_eq!(
		lines(&tokenizer, &["#!sh", "#!sh"]),
		vec![vec![tok(0..4, &["source.g", "shebang"])], vec![tok(0..4, &["source.g"])]]
	);
}

#[test]
fn test_anchor_g_matches_after_begin() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [{
			"begin": "@", "end": "$", "name": "meta.at",
			"patterns": [{ "match": "\\G\\w+", "name": "entity.name" }]
		}]
	}"#;
	assert_eq!(
		single(json, "@ab cd"),
		vec![
			tok(0..1, &["source.g", "meta.at"]),
			tok(1..3, &["source.g", "meta.at", "entity.name"]),
			tok(3..6, &["source.g", "meta.at"]),
		]
	);
}

#[test]
fn test_long_lines_are_passed_through() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars).with_max_line_length(Some(3));
	let first = tokenizer.tokenize_line("\"a", None);
	let long = tokenizer.tokenize_line("12345", Some(&first.stack));
	assert_eq!(
		simplify(&long.tokens),
		vec![tok(0..5, &["source.g", "string.quoted.double"])]
	);
	assert_eq!(long.stack, first.stack);
}

#[test]
fn test_injection_priority_breaks_ties() {
	let grammar_with = |selector: &str| {
		format!(
			r#"{{
				"scopeName": "source.g",
				"patterns": [{{ "match": "ab", "name": "own" }}],
				"injections": {{ "{selector}": {{ "patterns": [{{ "match": "ab", "name": "injected" }}] }} }}
			}}"#
		)
	};
	for (selector, expected) in [("L:source.g", "injected"), ("source.g", "own"), ("R:source.g", "own")] {
		let tokenizer = Tokenizer::new(grammar(&grammar_with(selector)), &NoGrammars);
		assert_eq!(
			simplify(&tokenizer.tokenize_line("ab", None).tokens),
			vec![tok(0..2, &["source.g", expected])],
			"selector {selector}"
		);
	}
}

#[test]
fn test_earlier_injection_match_wins() {
	let json = r#"{
		"scopeName": "source.g",
		"patterns": [
			{ "begin": "\"", "end": "\"", "name": "string" },
			{ "match": "z", "name": "zed" }
		],
		"injections": { "string": { "patterns": [{ "match": "\\\\.", "name": "escape" }] } }
	}"#;
	assert_eq!(
		single(json, r#""a\nz" z"#),
		vec![
			tok(0..1, &["source.g", "string"]),
			tok(1..2, &["source.g", "string"]),
			tok(2..4, &["source.g", "string", "escape"]),
			tok(4..5, &["source.g", "string"]),
			tok(5..6, &["source.g", "string"]),
			tok(6..7, &["source.g"]),
			tok(7..8, &["source.g", "zed"]),
		]
	);
}

fn embedding_source() -> InMemorySource {
	let mut source = InMemorySource::new();
	source.add_grammar(
		RawGrammar::from_json(
			r#"{
				"scopeName": "source.outer",
				"patterns": [{
					"begin": "<<", "end": ">>", "name": "meta.embedded",
					"patterns": [{ "include": "source.inner" }]
				}]
			}"#,
		)
		.unwrap(),
	);
	source.add_grammar(
		RawGrammar::from_json(
			r#"{ "scopeName": "source.inner", "patterns": [{ "match": "\\d+", "name": "constant.numeric" }] }"#,
		)
		.unwrap(),
	);
	source
}

#[test]
fn test_external_include_through_registry() {
	let registry = Registry::new(embedding_source());
	let tokenizer = registry.tokenizer("source.outer").unwrap();
	let embedded = &["source.outer", "meta.embedded"];
	assert_eq!(
		simplify(&tokenizer.tokenize_line("1 <<2>>", None).tokens),
		vec![
			tok(0..2, &["source.outer"]),
			tok(2..4, embedded),
			tok(4..5, &["source.outer", "meta.embedded", "constant.numeric"]),
			tok(5..7, embedded),
		]
	);
}

#[test]
fn test_include_targets_follow_the_resolver() {
	let registry = Registry::new(embedding_source());
	let outer = registry.load("source.outer").unwrap();
	let embedded = &["source.outer", "meta.embedded"];

	let standalone = Tokenizer::new(outer, &NoGrammars);
	assert_eq!(
		simplify(&standalone.tokenize_line("<<2>>", None).tokens),
		vec![tok(0..2, embedded), tok(2..3, embedded), tok(3..5, embedded)]
	);

	let tokenizer = registry.tokenizer("source.outer").unwrap();
	assert_eq!(
		simplify(&tokenizer.tokenize_line("<<2>>", None).tokens),
		vec![
			tok(0..2, embedded),
			tok(2..3, &["source.outer", "meta.embedded", "constant.numeric"]),
			tok(3..5, embedded),
		]
	);
}

#[test]
fn test_standalone_grammar_is_freed_with_its_tokenizer() {
	let grammar = grammar(MIXED);
	let weak = Arc::downgrade(&grammar);
	let tokenizer = Tokenizer::new(grammar, &NoGrammars);
	let doc = tokenizer.tokenize_document("> \"a\" ab\n> 1\n");
	assert!(tokenizer.cache().pattern_set_count() > 0);
	drop(doc);
	drop(tokenizer);
	assert_eq!(weak.strong_count(), 0);
}

#[test]
fn test_registry_grammars_are_freed_with_the_registry() {
	let registry = Registry::new(embedding_source());
	let outer = Arc::downgrade(&registry.load("source.outer").unwrap());
	let inner = Arc::downgrade(&registry.load("source.inner").unwrap());
	{
		let tokenizer = registry.tokenizer("source.outer").unwrap();
		let doc = tokenizer.tokenize_document("<<1\n2>>\n");
		assert_eq!(doc.stack.depth(), 1);
	}
	drop(registry);
	assert_eq!(outer.strong_count(), 0);
	assert_eq!(inner.strong_count(), 0);
}

#[test]
fn test_missing_external_include_never_matches() {
	let json = r#"{ "scopeName": "source.g", "patterns": [{ "include": "source.none" }, { "match": "a", "name": "a" }] }"#;
	assert_eq!(single(json, "ba"), vec![tok(0..1, &["source.g"]), tok(1..2, &["source.g", "a"])]);
}

#[test]
fn test_base_include_follows_tokenized_grammar() {
	let mut source = InMemorySource::new();
	source.add_grammar(
		RawGrammar::from_json(
			r#"{
				"scopeName": "source.host",
				"patterns": [{ "include": "source.lib" }, { "match": "h", "name": "host.h" }]
			}"#,
		)
		.unwrap(),
	);
	source.add_grammar(
		RawGrammar::from_json(
			r#"{
				"scopeName": "source.lib",
				"patterns": [{ "begin": "\\(", "end": "\\)", "name": "paren", "patterns": [{ "include": "$base" }] }]
			}"#,
		)
		.unwrap(),
	);
	let registry = Registry::new(source);

	let host = registry.tokenizer("source.host").unwrap();
	assert_eq!(
		simplify(&host.tokenize_line("(h)", None).tokens),
		vec![
			tok(0..1, &["source.host", "paren"]),
			tok(1..2, &["source.host", "paren", "host.h"]),
			tok(2..3, &["source.host", "paren"]),
		]
	);

	let lib = registry.tokenizer("source.lib").unwrap();
	assert_eq!(
		simplify(&lib.tokenize_line("(h)", None).tokens),
		vec![
			tok(0..1, &["source.lib", "paren"]),
			tok(1..2, &["source.lib", "paren"]),
			tok(2..3, &["source.lib", "paren"]),
		]
	);
}

#[test]
fn test_document_carries_state() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let doc = tokenizer.tokenize_document("\"a\nb\" 1\n");
	assert_eq!(doc.lines.len(), 2);
	assert_eq!(
		simplify(&doc.lines[1]),
		vec![
			tok(0..1, &["source.g", "string.quoted.double"]),
			tok(1..2, &["source.g", "string.quoted.double"]),
			tok(2..3, &["source.g"]),
			tok(3..4, &["source.g", "constant.numeric"]),
		]
	);
	assert_eq!(doc.stack, tokenizer.initial_stack());
}

struct NumberTheme;

impl MetadataProvider for NumberTheme {
	fn language_id(&self, _scopes: &[Scope]) -> u8 {
		3
	}

	fn style(&self, scopes: &[Scope]) -> TokenStyle {
		let numeric = scopes.iter().any(|s| s.starts_with("constant"));
		TokenStyle {
			foreground: if numeric { 7 } else { 1 },
			..TokenStyle::default()
		}
	}
}

#[test]
fn test_encoded_tokens_merge_equal_metadata() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let result = tokenizer.tokenize_line_encoded("12 34", None, &NumberTheme);
	let pairs: Vec<_> = result.pairs().map(|(start, meta)| (start, meta.foreground())).collect();
	assert_eq!(pairs, vec![(0, 7), (2, 1), (3, 7)]);
	assert_eq!(result.scoped.len(), 3);

	let result = tokenizer.tokenize_line_encoded("\"a\"", None, &NumberTheme);
	assert_eq!(result.tokens.len(), 2);
	let (start, meta) = result.pairs().next().unwrap();
	assert_eq!(start, 0);
	assert_eq!(meta.token_type(), StandardTokenType::String);
	assert_eq!(meta.language_id(), 3);
}

#[test]
fn test_encoded_empty_line_has_one_pair() {
	let tokenizer = Tokenizer::new(grammar(STRINGS), &NoGrammars);
	let open = tokenizer.tokenize_line("\"", None);
	let result = tokenizer.tokenize_line_encoded("", Some(&open.stack), &NumberTheme);
	assert_eq!(result.tokens.len(), 2);
	assert_eq!(result.tokens[0], 0);
	assert_eq!(EncodedMetadata::from_bits(result.tokens[1]).token_type(), StandardTokenType::String);
}

const MIXED: &str = r#"{
	"scopeName": "source.g",
	"patterns": [
		{ "match": "\\d+", "name": "constant.numeric" },
		{ "begin": "\"", "end": "\"|$", "name": "string", "patterns": [{ "match": "\\\\." }] },
		{ "begin": "^>", "while": "^>", "name": "quote", "patterns": [{ "include": "$self" }] },
		{ "match": "(?=é)", "name": "look" },
		{ "match": "(a)(b)?", "captures": { "1": { "name": "x" }, "2": { "patterns": [{ "match": "b", "name": "y" }] } } }
	]
}"#;

proptest! {
	#[test]
	fn test_tokens_partition_every_line(text in "[ab1é\"\\\\> \n]{0,40}") {
		let tokenizer = Tokenizer::new(grammar(MIXED), &NoGrammars);
		let doc = tokenizer.tokenize_document(&text);
		for (line, tokens) in text.lines().zip(&doc.lines) {
			if line.is_empty() {
				prop_assert!(tokens.is_empty());
				continue;
			}
			prop_assert_eq!(tokens.first().map(|t| t.start), Some(0));
			prop_assert_eq!(tokens.last().map(|t| t.end), Some(line.len()));
			for pair in tokens.windows(2) {
				prop_assert_eq!(pair[0].end, pair[1].start);
			}
			for token in tokens {
				prop_assert!(token.start < token.end);
				prop_assert!(line.is_char_boundary(token.start));
				prop_assert_eq!(&*token.scopes[0], "source.g");
			}
		}
	}

	#[test]
	fn test_tokenizing_is_deterministic(text in "[ab1\"> \n]{0,40}") {
		let tokenizer = Tokenizer::new(grammar(MIXED), &NoGrammars);
		prop_assert_eq!(tokenizer.tokenize_document(&text), tokenizer.tokenize_document(&text));
	}
}
