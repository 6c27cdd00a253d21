//! Raw grammar to rule arena.

use std::fmt::Display;
use std::sync::Arc;

use loom_selector::Selector;
use rustc_hash::FxHashMap;

use super::{
	BeginEndRule, BeginWhileRule, CaptureRule, Captures, ExternalInclude, IncludeOnlyRule, MatchRule, PatternRef,
	Rule, RuleId,
};
use crate::error::GrammarCompileError;
use crate::raw::{RawCaptures, RawGrammar, RawPattern, RawRule, Repository};
use crate::regex::{NameTemplate, RegexSource};

/// Output of [`compile`].
pub(crate) struct Compiled {
	pub rules: Vec<Rule>,
	pub root: RuleId,
	pub repository: FxHashMap<String, RuleId>,
	pub injections: Vec<(Selector, RuleId)>,
	pub injection_selector: Option<Selector>,
	pub first_line_match: Option<RegexSource>,
	pub diagnostics: Vec<GrammarCompileError>,
}

/// Repositories visible from a rule, innermost first.
struct Repositories<'a, 'r> {
	repository: &'r Repository,
	parent: Option<&'a Repositories<'a, 'r>>,
}

impl<'r> Repositories<'_, 'r> {
	fn lookup(&self, name: &str) -> Option<&'r RawRule> {
		let mut current = Some(self);
		while let Some(repos) = current {
			if let Some(rule) = repos.repository.get(name) {
				return Some(rule);
			}
			current = repos.parent;
		}
		None
	}
}

struct Compiler<'r> {
	scope_name: &'r str,
	top: &'r Repository,
	root: RuleId,
	rules: Vec<Rule>,
	/// Raw rule address to compiled ID, so shared repository entries compile once.
	ids: FxHashMap<usize, RuleId>,
	diagnostics: Vec<GrammarCompileError>,
}

fn join(location: &str, segment: impl Display) -> String {
	if location.is_empty() {
		segment.to_string()
	} else {
		format!("{location}/{segment}")
	}
}

/// Compiles every rule of `raw`.
///
/// The root pattern list, all top-level repository entries and all
/// injection rules are compiled eagerly; problems become diagnostics and the
/// affected rules never match.
pub(crate) fn compile(raw: &RawGrammar) -> Compiled {
	let mut compiler = Compiler {
		scope_name: &raw.scope_name,
		top: &raw.repository,
		root: RuleId::new(0),
		rules: Vec::new(),
		ids: FxHashMap::default(),
		diagnostics: Vec::new(),
	};
	let top = Repositories {
		repository: &raw.repository,
		parent: None,
	};

	let root = compiler.reserve();
	compiler.root = root;

	// Repository entries first, so shared rules report their own location.
	let repository = raw
		.repository
		.iter()
		.map(|(name, rule)| {
			let id = compiler.compile_rule(rule, &top, &join("repository", name));
			(name.clone(), id)
		})
		.collect();

	let patterns = compiler.compile_patterns(&raw.patterns, &top, "");
	compiler.rules[root.index()] = Rule::IncludeOnly(IncludeOnlyRule {
		name: Some(NameTemplate::new(&raw.scope_name)),
		content_name: None,
		patterns,
	});

	let mut injections = Vec::new();
	for (source, rule) in &raw.injections {
		let location = join("injections", source);
		let id = compiler.compile_rule(rule, &top, &location);
		if let Some(selector) = compiler.selector(source, location) {
			injections.push((selector, id));
		}
	}

	let injection_selector = raw
		.injection_selector
		.as_deref()
		.and_then(|source| compiler.selector(source, "injectionSelector".into()));

	let first_line_match = raw.first_line_match.as_deref().map(|source| {
		let regex = RegexSource::new(source);
		if let Err(message) = regex.validate() {
			compiler.diagnostics.push(GrammarCompileError::InvalidRegex {
				location: "firstLineMatch".into(),
				pattern: source.into(),
				message,
			});
		}
		regex
	});

	Compiled {
		rules: compiler.rules,
		root,
		repository,
		injections,
		injection_selector,
		first_line_match,
		diagnostics: compiler.diagnostics,
	}
}

impl<'r> Compiler<'r> {
	fn reserve(&mut self) -> RuleId {
		let id = RuleId::new(self.rules.len());
		self.rules.push(Rule::Invalid);
		id
	}

	fn selector(&mut self, source: &str, location: String) -> Option<Selector> {
		match Selector::parse(source) {
			Ok(selector) => Some(selector),
			Err(error) => {
				self.diagnostics.push(GrammarCompileError::InvalidSelector {
					location,
					selector: source.into(),
					error,
				});
				None
			}
		}
	}

	fn compile_rule(&mut self, raw: &'r RawRule, repos: &Repositories<'_, 'r>, location: &str) -> RuleId {
		let key = raw as *const RawRule as usize;
		if let Some(&id) = self.ids.get(&key) {
			return id;
		}
		let id = self.reserve();
		self.ids.insert(key, id);

		let nested;
		let repos = match &raw.repository {
			Some(repository) => {
				nested = Repositories {
					repository,
					parent: Some(repos),
				};
				&nested
			}
			None => repos,
		};

		let name = raw.name.as_deref().map(NameTemplate::new);
		let content_name = raw.content_name.as_deref().map(NameTemplate::new);
		let children = raw.patterns.as_deref().unwrap_or_default();

		let rule = match raw.classify() {
			Err(reason) => {
				self.diagnostics.push(GrammarCompileError::InvalidShape {
					location: location.into(),
					reason,
				});
				Rule::Invalid
			}
			Ok(RawPattern::Include(target)) => Rule::IncludeOnly(IncludeOnlyRule {
				name,
				content_name,
				patterns: self.resolve_include(target, repos, location).into_iter().collect(),
			}),
			Ok(RawPattern::Patterns) => Rule::IncludeOnly(IncludeOnlyRule {
				name,
				content_name,
				patterns: self.compile_patterns(children, repos, location),
			}),
			Ok(RawPattern::Match(source)) => Rule::Match(MatchRule {
				name,
				regex: self.regex(source, &join(location, "match"), false),
				captures: self.compile_captures(raw.captures.as_ref(), repos, &join(location, "captures")),
			}),
			Ok(RawPattern::BeginEnd { begin, end }) => Rule::BeginEnd(BeginEndRule {
				name,
				content_name,
				begin: self.regex(begin, &join(location, "begin"), false),
				begin_captures: self.begin_captures(raw, repos, location),
				end: self.regex(end, &join(location, "end"), true),
				end_captures: match &raw.end_captures {
					Some(captures) => self.compile_captures(Some(captures), repos, &join(location, "endCaptures")),
					None => self.compile_captures(raw.captures.as_ref(), repos, &join(location, "captures")),
				},
				apply_end_pattern_last: raw.apply_end_pattern_last,
				patterns: self.compile_patterns(children, repos, location),
			}),
			Ok(RawPattern::BeginWhile { begin, while_ }) => Rule::BeginWhile(BeginWhileRule {
				name,
				content_name,
				begin: self.regex(begin, &join(location, "begin"), false),
				begin_captures: self.begin_captures(raw, repos, location),
				while_: self.regex(while_, &join(location, "while"), true),
				while_captures: match &raw.while_captures {
					Some(captures) => self.compile_captures(Some(captures), repos, &join(location, "whileCaptures")),
					None => self.compile_captures(raw.captures.as_ref(), repos, &join(location, "captures")),
				},
				patterns: self.compile_patterns(children, repos, location),
			}),
		};
		self.rules[id.index()] = rule;
		id
	}

	fn begin_captures(&mut self, raw: &'r RawRule, repos: &Repositories<'_, 'r>, location: &str) -> Captures {
		match &raw.begin_captures {
			Some(captures) => self.compile_captures(Some(captures), repos, &join(location, "beginCaptures")),
			None => self.compile_captures(raw.captures.as_ref(), repos, &join(location, "captures")),
		}
	}

	fn compile_patterns(
		&mut self,
		patterns: &'r [RawRule],
		repos: &Repositories<'_, 'r>,
		location: &str,
	) -> Vec<PatternRef> {
		let mut refs = Vec::with_capacity(patterns.len());
		for (idx, pattern) in patterns.iter().enumerate() {
			let location = join(location, format_args!("patterns/{idx}"));
			if let Some(target) = &pattern.include
				&& pattern.match_.is_none()
				&& pattern.begin.is_none()
			{
				refs.extend(self.resolve_include(target, repos, &location));
			} else {
				refs.push(PatternRef::Rule(self.compile_rule(pattern, repos, &location)));
			}
		}
		refs
	}

	fn compile_captures(
		&mut self,
		raw: Option<&'r RawCaptures>,
		repos: &Repositories<'_, 'r>,
		location: &str,
	) -> Captures {
		let mut captures: Captures = Vec::new();
		for (key, rule) in raw.into_iter().flatten() {
			let location = join(location, key);
			let Ok(idx) = key.parse::<usize>() else {
				self.diagnostics.push(GrammarCompileError::InvalidShape {
					location,
					reason: format!("capture key {key:?} is not a group number"),
				});
				continue;
			};
			let retokenize = rule.patterns.as_deref().map(|patterns| {
				let id = self.reserve();
				let patterns = self.compile_patterns(patterns, repos, &location);
				self.rules[id.index()] = Rule::IncludeOnly(IncludeOnlyRule {
					name: None,
					content_name: None,
					patterns,
				});
				id
			});
			if captures.len() <= idx {
				captures.resize_with(idx + 1, || None);
			}
			captures[idx] = Some(CaptureRule {
				name: rule.name.as_deref().map(NameTemplate::new),
				content_name: rule.content_name.as_deref().map(NameTemplate::new),
				retokenize,
			});
		}
		captures
	}

	/// Compiles a regex, reporting syntax errors.
	///
	/// End and while patterns with back-references are only complete once
	/// substituted, so they are checked when a frame builds them instead.
	fn regex(&mut self, source: &str, location: &str, substituted_later: bool) -> Arc<RegexSource> {
		let regex = RegexSource::new(source);
		if !(substituted_later && regex.has_back_references())
			&& let Err(message) = regex.validate()
		{
			self.diagnostics.push(GrammarCompileError::InvalidRegex {
				location: location.into(),
				pattern: source.into(),
				message,
			});
		}
		Arc::new(regex)
	}

	fn resolve_include(
		&mut self,
		target: &'r str,
		repos: &Repositories<'_, 'r>,
		location: &str,
	) -> Option<PatternRef> {
		match target {
			"$self" => return Some(PatternRef::Rule(self.root)),
			"$base" => return Some(PatternRef::Base),
			_ => {}
		}

		let (scope, rule) = match target.split_once('#') {
			Some((scope, rule)) => (scope, Some(rule)),
			None => (target, None),
		};

		let found = match (scope, rule) {
			("", Some(name)) => repos.lookup(name).map(|raw| (raw, repos)),
			(scope, None) if scope == self.scope_name => return Some(PatternRef::Rule(self.root)),
			(scope, Some(name)) if scope == self.scope_name => {
				let top = Repositories {
					repository: self.top,
					parent: None,
				};
				return match top.lookup(name) {
					Some(raw) => Some(PatternRef::Rule(self.compile_rule(raw, &top, location))),
					None => self.unresolved(target, location),
				};
			}
			("", None) => None,
			(scope, rule) => return Some(PatternRef::External(Arc::new(ExternalInclude::new(scope, rule)))),
		};

		match found {
			Some((raw, repos)) => Some(PatternRef::Rule(self.compile_rule(raw, repos, location))),
			None => self.unresolved(target, location),
		}
	}

	fn unresolved(&mut self, target: &str, location: &str) -> Option<PatternRef> {
		self.diagnostics.push(GrammarCompileError::UnresolvedInclude {
			location: location.into(),
			target: target.into(),
		});
		None
	}
}
