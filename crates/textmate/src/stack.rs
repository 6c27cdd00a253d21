//! Persistent rule stacks.
//!
//! A [`RuleStack`] is the tokenizer state carried from one line to the next.
//! Frames are immutable and shared: pushing allocates one frame, popping
//! returns the parent, and two lines that end in the same state share their
//! frames.

use std::fmt;
use std::sync::Arc;

use crate::grammar::Grammar;
use crate::regex::RegexSource;
use crate::rule::{Rule, RuleRef};
use crate::scope::{Scope, ScopeList};

/// An active rule and everything the tokenizer remembers about it.
#[derive(Clone)]
struct Frame {
	parent: Option<RuleStack>,
	depth: usize,
	rule: RuleRef,
	/// Line-local position where the frame was pushed.
	enter_pos: Option<usize>,
	/// Line-local `\G` position to restore when the frame is popped.
	anchor_pos: Option<usize>,
	/// The begin match ran to the end of the line.
	begin_captured_eol: bool,
	/// End or while regex with begin captures substituted.
	end_rule: Option<Arc<RegexSource>>,
	name_scopes: ScopeList,
	content_scopes: ScopeList,
}

/// A persistent stack of active rules.
#[derive(Clone)]
pub struct RuleStack(Arc<Frame>);

/// Arguments for [`RuleStack::push`].
#[derive(Debug, Clone)]
pub struct PushFrame {
	pub rule: RuleRef,
	pub enter_pos: Option<usize>,
	pub anchor_pos: Option<usize>,
	pub begin_captured_eol: bool,
	pub end_rule: Option<Arc<RegexSource>>,
	pub name_scopes: ScopeList,
	pub content_scopes: ScopeList,
}

impl RuleStack {
	/// The stack a document starts in: the grammar's root rule, scoped with
	/// the grammar's scope name.
	pub fn root(grammar: &Arc<Grammar>) -> Self {
		let rule = RuleRef::new(grammar.clone(), grammar.root());
		let scopes = ScopeList::new().push(grammar.scope_name().clone());
		Self(Arc::new(Frame {
			parent: None,
			depth: 1,
			rule,
			enter_pos: None,
			anchor_pos: None,
			begin_captured_eol: false,
			end_rule: None,
			name_scopes: scopes.clone(),
			content_scopes: scopes,
		}))
	}

	/// Returns a new stack with `frame` on top. `self` is unchanged.
	pub fn push(&self, frame: PushFrame) -> Self {
		Self(Arc::new(Frame {
			parent: Some(self.clone()),
			depth: self.0.depth + 1,
			rule: frame.rule,
			enter_pos: frame.enter_pos,
			anchor_pos: frame.anchor_pos,
			begin_captured_eol: frame.begin_captured_eol,
			end_rule: frame.end_rule,
			name_scopes: frame.name_scopes,
			content_scopes: frame.content_scopes,
		}))
	}

	/// The parent stack, or `None` for the root.
	pub fn pop(&self) -> Option<Self> {
		self.0.parent.clone()
	}

	/// Pops unless this is the root.
	pub fn safe_pop(&self) -> Self {
		self.pop().unwrap_or_else(|| self.clone())
	}

	/// Number of frames, counting the root.
	pub fn depth(&self) -> usize {
		self.0.depth
	}

	/// The active rule.
	pub fn rule(&self) -> &RuleRef {
		&self.0.rule
	}

	/// Content scopes of the top frame, outermost first.
	pub fn scopes(&self) -> Vec<Scope> {
		self.0.content_scopes.to_vec()
	}

	pub fn content_scopes(&self) -> &ScopeList {
		&self.0.content_scopes
	}

	pub fn name_scopes(&self) -> &ScopeList {
		&self.0.name_scopes
	}

	/// The substituted end or while regex, if the rule needed one.
	pub fn end_rule(&self) -> Option<&Arc<RegexSource>> {
		self.0.end_rule.as_ref()
	}

	pub(crate) fn enter_pos(&self) -> Option<usize> {
		self.0.enter_pos
	}

	pub(crate) fn anchor_pos(&self) -> Option<usize> {
		self.0.anchor_pos
	}

	pub(crate) fn begin_captured_eol(&self) -> bool {
		self.0.begin_captured_eol
	}

	/// Replaces the top frame's content scopes.
	pub(crate) fn with_content_scopes(&self, content_scopes: ScopeList) -> Self {
		Self(Arc::new(Frame {
			content_scopes,
			..(*self.0).clone()
		}))
	}

	/// Replaces the top frame's end or while regex.
	pub(crate) fn with_end_rule(&self, end_rule: Arc<RegexSource>) -> Self {
		Self(Arc::new(Frame {
			end_rule: Some(end_rule),
			..(*self.0).clone()
		}))
	}

	/// True if a frame pushed at the same position as `other` runs the same rule.
	pub(crate) fn has_same_rule_as(&self, other: &RuleStack) -> bool {
		let mut current = Some(self);
		while let Some(stack) = current
			&& stack.0.enter_pos == other.0.enter_pos
		{
			if stack.0.rule == other.0.rule {
				return true;
			}
			current = stack.0.parent.as_ref();
		}
		false
	}

	/// Clears line-local positions before the stack is handed to the next line.
	///
	/// Only frames pushed during the current line carry positions; they are
	/// rebuilt bottom-up and everything below them is shared.
	pub fn reset_line_positions(&self) -> Self {
		let mut pushed = Vec::new();
		let mut settled = Some(self);
		while let Some(stack) = settled
			&& (stack.0.enter_pos.is_some() || stack.0.anchor_pos.is_some())
		{
			pushed.push(stack);
			settled = stack.0.parent.as_ref();
		}
		if pushed.is_empty() {
			return self.clone();
		}

		let mut parent = settled.cloned();
		for stack in pushed.into_iter().rev() {
			parent = Some(Self(Arc::new(Frame {
				parent,
				enter_pos: None,
				anchor_pos: None,
				..(*stack.0).clone()
			})));
		}
		parent.unwrap_or_else(|| self.clone())
	}

	/// Iterates frames from the top down.
	pub(crate) fn frames(&self) -> impl Iterator<Item = &RuleStack> {
		std::iter::successors(Some(self), |stack| stack.0.parent.as_ref())
	}

	/// True if the active rule is a `begin`/`while` rule.
	pub(crate) fn is_while(&self) -> bool {
		matches!(self.0.rule.rule(), Rule::BeginWhile(_))
	}
}

/// Unlinks uniquely owned parents one at a time, so dropping a deep stack
/// does not recurse once per frame.
impl Drop for RuleStack {
	fn drop(&mut self) {
		let mut parent = Arc::get_mut(&mut self.0).and_then(|frame| frame.parent.take());
		while let Some(mut stack) = parent {
			parent = Arc::get_mut(&mut stack.0).and_then(|frame| frame.parent.take());
		}
	}
}

impl PartialEq for RuleStack {
	fn eq(&self, other: &Self) -> bool {
		let (mut a, mut b) = (self, other);
		loop {
			if Arc::ptr_eq(&a.0, &b.0) {
				return true;
			}
			if a.0.depth != b.0.depth
				|| a.0.rule != b.0.rule
				|| a.0.end_rule.as_ref().map(|r| r.source()) != b.0.end_rule.as_ref().map(|r| r.source())
				|| a.0.content_scopes != b.0.content_scopes
			{
				return false;
			}
			match (&a.0.parent, &b.0.parent) {
				(Some(pa), Some(pb)) => {
					a = pa;
					b = pb;
				}
				(None, None) => return true,
				_ => return false,
			}
		}
	}
}

impl Eq for RuleStack {}

impl fmt::Debug for RuleStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut rules: Vec<_> = self.frames().map(|frame| frame.rule()).collect();
		rules.reverse();
		f.debug_struct("RuleStack")
			.field("rules", &rules)
			.field("scopes", &self.0.content_scopes)
			.finish()
	}
}
