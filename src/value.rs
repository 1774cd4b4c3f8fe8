use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::addr::RcAddr;
use crate::computed::{derive1, AssocOp, Operand};
use crate::error::ObserveError;
use crate::event::{ChangeEvent, ChangeObserver, SubscriberId};

/// A node in the dependency graph. Implemented by every value backing
/// store; the graph edges point from a derived node to the nodes it
/// reads.
pub trait DependencyNode: 'static {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>>;
}

/// Backing store behind a [`Value`] handle. `constant` and
/// `assoc_operands` let the derive factories fold and flatten without
/// downcasting.
pub trait ValueAccess<T: PartialEq + Clone + 'static>: 'static {
	fn get(&self) -> T;
	fn on_change(&self) -> ChangeEvent<T>;
	fn node(&self) -> Rc<dyn DependencyNode>;

	/// `Some` when this value can never change again.
	fn constant(&self) -> Option<T> {
		None
	}

	/// For an associative derivation built with the same operator,
	/// returns its direct operands so a new derivation can splice them in
	/// flat.
	fn assoc_operands(&self, _op: &AssocOp<T>) -> Option<Vec<Operand<T>>> {
		None
	}
}

/// Read-only handle to a reactive value. Cheap to clone; all clones
/// share one backing store, one cached value and one change channel.
pub struct Value<T: PartialEq + Clone + 'static> {
	access: Rc<dyn ValueAccess<T>>,
}

impl<T: PartialEq + Clone + 'static> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			access: self.access.clone(),
		}
	}
}

impl<T: PartialEq + Clone + 'static> Value<T> {
	pub(crate) fn from_access(access: Rc<dyn ValueAccess<T>>) -> Self {
		Value { access }
	}

	pub(crate) fn access(&self) -> &Rc<dyn ValueAccess<T>> {
		&self.access
	}

	/// Returns the cached value. Never recomputes.
	pub fn get(&self) -> T {
		self.access.get()
	}

	pub fn on_change(&self) -> ChangeEvent<T> {
		self.access.on_change()
	}

	pub fn observe(&self, observer: ChangeObserver<T>) -> SubscriberId {
		self.on_change().observe(observer)
	}

	pub fn observe_times(&self, observer: ChangeObserver<T>, times: usize) -> SubscriberId {
		self.on_change().observe_times(observer, times)
	}

	pub fn weak_observe(&self, observer: &Rc<ChangeObserver<T>>) -> SubscriberId {
		self.on_change().weak_observe(observer)
	}

	pub fn unobserve(&self, id: SubscriberId) -> Result<(), ObserveError> {
		self.on_change().unobserve(id)
	}

	pub fn is_observed(&self) -> bool {
		self.on_change().is_observed()
	}

	/// `Some` when the value is known to never change again.
	pub fn constant(&self) -> Option<T> {
		self.access.constant()
	}

	pub fn node(&self) -> Rc<dyn DependencyNode> {
		self.access.node()
	}

	/// Direct dependencies of this value.
	pub fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		self.node().derived_from()
	}

	/// Transitive closure of `derived_from`, each node reported once.
	pub fn deep_derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		let mut seen: BTreeSet<RcAddr<dyn DependencyNode>> = BTreeSet::new();
		let mut queue: VecDeque<Rc<dyn DependencyNode>> = VecDeque::new();
		let mut out = Vec::new();
		queue.extend(self.derived_from());
		while let Some(node) = queue.pop_front() {
			if !seen.insert(RcAddr::new(node.clone())) {
				continue;
			}
			queue.extend(node.derived_from());
			out.push(node);
		}
		out
	}

	/// True when `other` is this value or appears anywhere in its
	/// transitive dependencies. Used to reject binding cycles before any
	/// state changes.
	pub fn is_dependent_on(&self, other: &Rc<dyn DependencyNode>) -> bool {
		let target = Rc::as_ptr(other) as *const ();
		if Rc::as_ptr(&self.node()) as *const () == target {
			return true;
		}
		self.deep_derived_from()
			.iter()
			.any(|node| Rc::as_ptr(node) as *const () == target)
	}

	/// Derives a new value by applying `transform` to this one.
	pub fn map<R: PartialEq + Clone + 'static>(
		&self,
		transform: impl Fn(&T) -> R + 'static,
	) -> Value<R> {
		derive1(self, transform)
	}
}

impl<T: PartialEq + Clone + 'static> PartialEq for Value<T> {
	fn eq(&self, other: &Self) -> bool {
		match (self.constant(), other.constant()) {
			(Some(a), Some(b)) => a == b,
			_ => {
				Rc::as_ptr(&self.access) as *const () == Rc::as_ptr(&other.access) as *const ()
			}
		}
	}
}

impl<T: PartialEq + Clone + 'static> std::fmt::Debug for Value<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Value").field(&self.get()).finish()
	}
}

impl<T: PartialEq + Clone + 'static> From<T> for Value<T> {
	fn from(value: T) -> Self {
		crate::r#const::Const::of(value)
	}
}
