//! Compiled selector expressions and their evaluator.
//!
//! A selector compiles to a small tree of [`Expr`] nodes. Evaluation is a
//! single recursive function over the tree; no node carries state, so a
//! compiled selector can be shared freely between threads.

use smallvec::SmallVec;

/// How a path step relates to the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
	/// `a b`: the step matches anywhere deeper than the previous one.
	Descendant,
	/// `a > b`: the step matches exactly one level deeper.
	Child,
}

/// One scope-name prefix within a [`ScopePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
	/// Dot-separated scope prefix, e.g. `string.quoted`.
	pub prefix: Box<str>,
	/// Relation to the previous step. Ignored for the first step.
	pub combinator: Combinator,
}

impl PathStep {
	/// Number of dot-separated segments in the prefix.
	pub fn segments(&self) -> u32 {
		self.prefix.split('.').count() as u32
	}

	/// Returns true if `scope` equals the prefix or extends it by whole segments.
	#[inline]
	pub fn matches_scope(&self, scope: &str) -> bool {
		scope_has_prefix(scope, &self.prefix)
	}
}

/// A run of scope prefixes that must appear in order in the scope stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePath {
	steps: SmallVec<[PathStep; 4]>,
}

impl ScopePath {
	pub(crate) fn new(steps: SmallVec<[PathStep; 4]>) -> Self {
		debug_assert!(!steps.is_empty());
		Self { steps }
	}

	/// Returns the steps of this path, outermost first.
	pub fn steps(&self) -> &[PathStep] {
		&self.steps
	}

	/// Finds the deepest embedding of this path in `stack`.
	///
	/// Returns the stack index matched by the last step. Steps are placed
	/// right to left, each at the deepest index still allowing the steps
	/// before it to match, so the first embedding found has the deepest
	/// innermost match.
	pub fn find<S: AsRef<str>>(&self, stack: &[S]) -> Option<usize> {
		let last = self.steps.len() - 1;
		(0..stack.len())
			.rev()
			.find(|&idx| self.steps[last].matches_scope(stack[idx].as_ref()) && self.place_before(last, idx, stack))
	}

	/// Places steps `0..step` given that `step` matched at `idx`.
	fn place_before<S: AsRef<str>>(&self, step: usize, idx: usize, stack: &[S]) -> bool {
		if step == 0 {
			return true;
		}
		let prev = step - 1;
		match self.steps[step].combinator {
			Combinator::Child => {
				idx > 0 && self.steps[prev].matches_scope(stack[idx - 1].as_ref()) && self.place_before(prev, idx - 1, stack)
			}
			Combinator::Descendant => (0..idx)
				.rev()
				.any(|j| self.steps[prev].matches_scope(stack[j].as_ref()) && self.place_before(prev, j, stack)),
		}
	}

	fn segments(&self) -> u32 {
		self.steps.iter().map(PathStep::segments).sum()
	}
}

/// Selector expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
	/// Ordered scope prefixes joined by combinators.
	Path(ScopePath),
	/// Matches when the inner expression does not.
	Not(Box<Expr>),
	/// Matches when every operand matches.
	And(Vec<Expr>),
	/// Matches when any operand matches.
	Or(Vec<Expr>),
}

impl Expr {
	/// Evaluates the expression against a scope stack (outermost first).
	pub fn matches<S: AsRef<str>>(&self, stack: &[S]) -> bool {
		match self {
			Expr::Path(path) => path.find(stack).is_some(),
			Expr::Not(inner) => !inner.matches(stack),
			Expr::And(operands) => operands.iter().all(|e| e.matches(stack)),
			Expr::Or(operands) => operands.iter().any(|e| e.matches(stack)),
		}
	}

	/// Computes how strongly the expression matches, or `None` if it does not.
	pub fn specificity<S: AsRef<str>>(&self, stack: &[S]) -> Option<Specificity> {
		match self {
			Expr::Path(path) => path.find(stack).map(|idx| Specificity {
				depth: idx as u32 + 1,
				segments: path.segments(),
				steps: path.steps().len() as u32,
			}),
			// A negation contributes nothing beyond allowing the match.
			Expr::Not(inner) => (!inner.matches(stack)).then_some(Specificity::default()),
			Expr::And(operands) => operands
				.iter()
				.try_fold(Specificity::default(), |acc, e| e.specificity(stack).map(|s| acc.combine(s))),
			Expr::Or(operands) => operands.iter().filter_map(|e| e.specificity(stack)).max(),
		}
	}
}

/// Matching strength of a selector against one scope stack.
///
/// Compared field by field: a match reaching deeper into the stack beats a
/// shallower one, then more matched name segments win, then more path steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
	/// One-based stack depth of the innermost matched scope (0 if none).
	pub depth: u32,
	/// Total dot-segments of all matched prefixes.
	pub segments: u32,
	/// Number of matched path steps.
	pub steps: u32,
}

impl Specificity {
	fn combine(self, other: Specificity) -> Specificity {
		Specificity {
			depth: self.depth.max(other.depth),
			segments: self.segments + other.segments,
			steps: self.steps + other.steps,
		}
	}
}

/// Returns true if `scope` is `prefix` or starts with `prefix` followed by a dot.
#[inline]
pub fn scope_has_prefix(scope: &str, prefix: &str) -> bool {
	scope.len() >= prefix.len()
		&& scope.starts_with(prefix)
		&& (scope.len() == prefix.len() || scope.as_bytes()[prefix.len()] == b'.')
}
