//! The scanning loop.

use std::sync::Arc;

use loom_selector::Priority;
use smallvec::SmallVec;
use tracing::trace;

use super::{TokenAccumulator, Tokenizer};
use crate::regex::{Anchors, NameTemplate, RegexMatch};
use crate::rule::{CaptureRule, PatternSet, Rule, RuleRef, ScanMode};
use crate::scope::ScopeList;
use crate::stack::{PushFrame, RuleStack};

/// What won a scan step.
enum Matched {
	/// The end pattern of the active `begin`/`end` frame.
	End,
	/// A child pattern or injection.
	Rule(RuleRef),
}

struct Candidate {
	matched: Matched,
	found: RegexMatch,
}

impl Candidate {
	fn start(&self) -> usize {
		self.found.start()
	}
}

fn push_name(scopes: &ScopeList, name: Option<&NameTemplate>, text: &str, captures: &[Option<(usize, usize)>]) -> ScopeList {
	match name {
		Some(name) => scopes.push_name(&name.resolve(text, captures)),
		None => scopes.clone(),
	}
}

impl Tokenizer<'_> {
	/// Tokenizes `text` (a line with its newline appended) from the start.
	pub(super) fn tokenize_text(
		&self,
		text: &str,
		is_first_line: bool,
		stack: RuleStack,
		acc: &mut TokenAccumulator,
	) -> RuleStack {
		let (stack, pos, is_first_line, anchor) = self.check_while_conditions(text, is_first_line, stack, acc);
		self.scan(text, pos, is_first_line, anchor, stack, acc)
	}

	/// Re-tests every `begin`/`while` frame, outermost first.
	///
	/// A frame whose `while` pattern fails is popped together with everything
	/// above it. Returns the surviving stack, the position after the last
	/// `while` match, the first-line flag and the `\G` anchor.
	fn check_while_conditions(
		&self,
		text: &str,
		mut is_first_line: bool,
		mut stack: RuleStack,
		acc: &mut TokenAccumulator,
	) -> (RuleStack, usize, bool, Option<usize>) {
		let mut pos = 0;
		let mut anchor = stack.begin_captured_eol().then_some(0);
		let mut while_frames: Vec<RuleStack> = stack.frames().filter(|frame| frame.is_while()).cloned().collect();

		while let Some(frame) = while_frames.pop() {
			let Rule::BeginWhile(rule) = frame.rule().rule() else {
				continue;
			};
			let regex = frame.end_rule().unwrap_or(&rule.while_);
			let anchors = Anchors {
				allow_a: is_first_line,
				allow_g: anchor == Some(pos),
			};
			let Some(found) = regex.search(text, pos, anchors) else {
				stack = frame.safe_pop();
				break;
			};
			acc.produce(frame.content_scopes(), found.start());
			self.handle_captures(text, is_first_line, &frame, acc, &rule.while_captures, &found.captures);
			acc.produce(frame.content_scopes(), found.end());
			anchor = Some(found.end());
			if found.end() > pos {
				pos = found.end();
				is_first_line = false;
			}
		}

		(stack, pos, is_first_line, anchor)
	}

	fn scan(
		&self,
		text: &str,
		mut pos: usize,
		mut is_first_line: bool,
		mut anchor: Option<usize>,
		mut stack: RuleStack,
		acc: &mut TokenAccumulator,
	) -> RuleStack {
		let len = text.len();
		loop {
			let anchors = Anchors {
				allow_a: is_first_line,
				allow_g: anchor == Some(pos),
			};
			let Some(candidate) = self.match_rule_or_injections(text, pos, anchors, &stack) else {
				acc.produce(stack.content_scopes(), len);
				return stack;
			};
			let Candidate { matched, found } = candidate;
			let (start, end) = (found.start(), found.end());
			let captures = &found.captures;
			let advanced = end > pos;

			let stalled = match matched {
				Matched::End => {
					let frame = stack.clone();
					let end_captures: &[Option<CaptureRule>] = match frame.rule().rule() {
						Rule::BeginEnd(rule) => &rule.end_captures,
						_ => &[],
					};
					acc.produce(stack.content_scopes(), start);
					let closing = stack.with_content_scopes(stack.name_scopes().clone());
					self.handle_captures(text, is_first_line, &closing, acc, end_captures, captures);
					acc.produce(closing.content_scopes(), end);

					match closing.pop() {
						Some(parent) if advanced || frame.enter_pos() != Some(pos) => {
							anchor = frame.anchor_pos();
							stack = parent;
							false
						}
						_ => true,
					}
				}
				Matched::Rule(rule_ref) => {
					acc.produce(stack.content_scopes(), start);
					let before_push = stack.clone();
					let rule = rule_ref.rule();
					let name_scopes = push_name(stack.content_scopes(), rule.name(), text, captures);
					let pushed = stack.push(PushFrame {
						rule: rule_ref.clone(),
						enter_pos: Some(pos),
						anchor_pos: anchor,
						begin_captured_eol: end == len,
						end_rule: None,
						name_scopes: name_scopes.clone(),
						content_scopes: name_scopes.clone(),
					});

					let begin = match rule {
						Rule::BeginEnd(r) => Some((&r.begin_captures, r.content_name.as_ref(), &r.end)),
						Rule::BeginWhile(r) => Some((&r.begin_captures, r.content_name.as_ref(), &r.while_)),
						Rule::Match(_) | Rule::IncludeOnly(_) | Rule::Invalid => None,
					};

					if let Some((begin_captures, content_name, end_regex)) = begin {
						self.handle_captures(text, is_first_line, &pushed, acc, begin_captures, captures);
						acc.produce(pushed.content_scopes(), end);
						anchor = Some(end);

						let content_scopes = push_name(&name_scopes, content_name, text, captures);
						let mut pushed = pushed.with_content_scopes(content_scopes);
						if end_regex.has_back_references() {
							let resolved = end_regex.resolve_back_references(text, captures);
							pushed = pushed.with_end_rule(Arc::new(resolved));
						}

						if !advanced && before_push.has_same_rule_as(&pushed) {
							stack = before_push;
							true
						} else {
							stack = pushed;
							false
						}
					} else {
						let match_captures: &[Option<CaptureRule>] = match rule {
							Rule::Match(r) => &r.captures,
							_ => &[],
						};
						self.handle_captures(text, is_first_line, &pushed, acc, match_captures, captures);
						acc.produce(pushed.content_scopes(), end);
						stack = before_push;
						!advanced
					}
				}
			};

			if stalled {
				// Zero-width match that changed nothing: step over one character.
				let Some(c) = text[pos..].chars().next() else {
					acc.produce(stack.content_scopes(), len);
					return stack;
				};
				trace!(pos, rule = ?stack.rule(), "Forcing progress past zero-width match");
				pos += c.len_utf8();
				acc.produce(stack.content_scopes(), pos);
				is_first_line = false;
				continue;
			}

			if advanced {
				pos = end;
				is_first_line = false;
			}
		}
	}

	fn match_rule_or_injections(
		&self,
		text: &str,
		pos: usize,
		anchors: Anchors,
		stack: &RuleStack,
	) -> Option<Candidate> {
		let own = self.match_rule(text, pos, anchors, stack);
		if self.injections.is_empty() {
			return own;
		}
		let Some((injected, priority)) = self.match_injections(text, pos, anchors, stack) else {
			return own;
		};
		match own {
			Some(own)
				if own.start() < injected.start()
					|| (own.start() == injected.start() && priority != Priority::Left) =>
			{
				Some(own)
			}
			_ => Some(injected),
		}
	}

	/// Scans the active frame's children and, for `begin`/`end` frames, the
	/// end pattern.
	fn match_rule(&self, text: &str, pos: usize, anchors: Anchors, stack: &RuleStack) -> Option<Candidate> {
		let active = stack.rule();
		let end = match active.rule() {
			Rule::BeginEnd(rule) => {
				let regex = stack.end_rule().unwrap_or(&rule.end);
				regex.search(text, pos, anchors).map(|found| (found, rule.apply_end_pattern_last))
			}
			_ => None,
		};

		// The end pattern wins ties unless it is applied last, so a match at
		// `pos` settles the step without scanning children.
		if matches!(&end, Some((found, false)) if found.start() == pos) {
			return end.map(|(found, _)| Candidate {
				matched: Matched::End,
				found,
			});
		}

		let child = self
			.pattern_set(active, ScanMode::Children)
			.find(text, pos, anchors)
			.map(|(rule, found)| Candidate {
				matched: Matched::Rule(rule.clone()),
				found,
			});

		let Some((found, end_last)) = end else {
			return child;
		};
		match child {
			Some(child) if child.start() < found.start() || (end_last && child.start() == found.start()) => Some(child),
			_ => Some(Candidate {
				matched: Matched::End,
				found,
			}),
		}
	}

	/// Scans injections whose selector matches the active content scopes.
	/// The earliest match wins; ties go to the earlier injection.
	fn match_injections(
		&self,
		text: &str,
		pos: usize,
		anchors: Anchors,
		stack: &RuleStack,
	) -> Option<(Candidate, Priority)> {
		let scopes = stack.scopes();
		let mut best: Option<(Candidate, Priority)> = None;
		for injection in self.injections.iter() {
			if !injection.matches(&scopes) {
				continue;
			}
			let set = self.pattern_set(&injection.rule, ScanMode::Included);
			let Some((rule, found)) = set.find(text, pos, anchors) else {
				continue;
			};
			if best.as_ref().is_some_and(|(b, _)| b.start() <= found.start()) {
				continue;
			}
			let at_pos = found.start() == pos;
			best = Some((
				Candidate {
					matched: Matched::Rule(rule.clone()),
					found,
				},
				injection.priority,
			));
			if at_pos {
				break;
			}
		}
		best
	}

	fn pattern_set(&self, rule: &RuleRef, mode: ScanMode) -> Arc<PatternSet> {
		self.cache.pattern_set(&self.grammar, rule, mode, self.resolver)
	}

	/// Emits tokens for the capture groups of a match.
	///
	/// Captures nest by position: a capture inside another gets the outer
	/// capture's scopes plus its own. Captures with patterns re-tokenize their
	/// text with those patterns.
	fn handle_captures(
		&self,
		text: &str,
		is_first_line: bool,
		stack: &RuleStack,
		acc: &mut TokenAccumulator,
		rules: &[Option<CaptureRule>],
		captures: &[Option<(usize, usize)>],
	) {
		if rules.is_empty() {
			return;
		}
		let Some(Some((_, max_end))) = captures.first() else {
			return;
		};
		let max_end = *max_end;

		// Scopes of open captures and where each ends.
		let mut open: SmallVec<[(ScopeList, usize); 4]> = SmallVec::new();
		for (rule, capture) in rules.iter().zip(captures) {
			let (Some(rule), Some((cap_start, cap_end))) = (rule, *capture) else {
				continue;
			};
			if cap_start == cap_end {
				continue;
			}
			if cap_start > max_end {
				break;
			}

			while let Some((scopes, open_end)) = open.last()
				&& *open_end <= cap_start
			{
				acc.produce(scopes, *open_end);
				open.pop();
			}
			match open.last() {
				Some((scopes, _)) => acc.produce(scopes, cap_start),
				None => acc.produce(stack.content_scopes(), cap_start),
			}

			if let Some(retokenize) = rule.retokenize {
				let name_scopes = push_name(stack.content_scopes(), rule.name.as_ref(), text, captures);
				let content_scopes = push_name(&name_scopes, rule.content_name.as_ref(), text, captures);
				let inner = stack.push(PushFrame {
					rule: RuleRef::new(stack.rule().grammar().clone(), retokenize),
					enter_pos: Some(cap_start),
					anchor_pos: None,
					begin_captured_eol: false,
					end_rule: None,
					name_scopes,
					content_scopes,
				});
				self.scan(&text[..cap_end], cap_start, is_first_line && cap_start == 0, None, inner, acc);
				continue;
			}

			if let Some(name) = &rule.name {
				let base = open.last().map_or(stack.content_scopes(), |(scopes, _)| scopes);
				let scopes = base.push_name(&name.resolve(text, captures));
				open.push((scopes, cap_end));
			}
		}

		while let Some((scopes, open_end)) = open.pop() {
			acc.produce(&scopes, open_end);
		}
	}
}
