//! Persistent scope lists.

use std::fmt;
use std::sync::Arc;

/// A scope name such as `string.quoted.double`.
pub type Scope = Arc<str>;

/// An immutable list of scopes, outermost first, sharing its prefix with
/// the list it was pushed onto.
#[derive(Clone, Default)]
pub struct ScopeList(Option<Arc<ScopeNode>>);

struct ScopeNode {
	parent: ScopeList,
	scope: Scope,
	len: usize,
}

impl ScopeList {
	/// The empty list.
	pub fn new() -> Self {
		Self(None)
	}

	pub fn len(&self) -> usize {
		self.0.as_ref().map_or(0, |node| node.len)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_none()
	}

	/// The innermost scope.
	pub fn last(&self) -> Option<&Scope> {
		self.0.as_ref().map(|node| &node.scope)
	}

	/// Returns a list with `scope` appended.
	pub fn push(&self, scope: Scope) -> Self {
		Self(Some(Arc::new(ScopeNode {
			parent: self.clone(),
			len: self.len() + 1,
			scope,
		})))
	}

	/// Appends every whitespace-separated scope in `name`.
	///
	/// Grammar names like `"meta.tag string.quoted"` contribute two scopes.
	pub fn push_name(&self, name: &str) -> Self {
		name.split_ascii_whitespace()
			.fold(self.clone(), |list, scope| list.push(Scope::from(scope)))
	}

	/// Iterates from the innermost scope outwards.
	pub fn iter_rev(&self) -> impl Iterator<Item = &Scope> {
		std::iter::successors(self.0.as_deref(), |node| node.parent.0.as_deref()).map(|node| &node.scope)
	}

	/// Copies the list out, outermost first.
	pub fn to_vec(&self) -> Vec<Scope> {
		let mut scopes: Vec<Scope> = self.iter_rev().cloned().collect();
		scopes.reverse();
		scopes
	}

	fn ptr_eq(&self, other: &Self) -> bool {
		match (&self.0, &other.0) {
			(Some(a), Some(b)) => Arc::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		}
	}
}

impl Drop for ScopeList {
	fn drop(&mut self) {
		let mut node = self.0.take();
		while let Some(next) = node {
			node = Arc::into_inner(next).and_then(|mut next| next.parent.0.take());
		}
	}
}

impl PartialEq for ScopeList {
	fn eq(&self, other: &Self) -> bool {
		if self.len() != other.len() {
			return false;
		}
		let (mut a, mut b) = (self, other);
		loop {
			if a.ptr_eq(b) {
				return true;
			}
			match (&a.0, &b.0) {
				(Some(x), Some(y)) if x.scope == y.scope => {
					a = &x.parent;
					b = &y.parent;
				}
				_ => return false,
			}
		}
	}
}

impl Eq for ScopeList {}

impl fmt::Debug for ScopeList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.to_vec()).finish()
	}
}
