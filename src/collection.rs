use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::action::{CollectionAction, Delta};
use crate::filtered::FilteredBag;
use crate::list::ObservableList;
use crate::mapped::{MappedBag, MappedSequence};
use crate::event::{ActionEvent, ActionObserver, ChangeEvent, DeltaEvent};
use crate::value::{DependencyNode, Value, ValueAccess};

/// Common surface of every observable collection: the two structural
/// channels, a reactive length and snapshot access. The provided
/// combinators project a collection down to a single reactive value.
pub trait ObservableCollection<T: PartialEq + Clone + 'static> {
	fn on_change(&self) -> ActionEvent<CollectionAction<T>>;
	fn delta_event(&self) -> DeltaEvent<Delta<T>>;
	fn len_value(&self) -> Value<usize>;
	fn snapshot(&self) -> Vec<T>;

	/// A snapshot closure detached from `self`, for observers that must
	/// not borrow the collection handle.
	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<T>>;

	fn len(&self) -> usize {
		self.snapshot().len()
	}

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Order-free projection through `transform`, maintained as a
	/// multiset.
	fn map<U>(&self, transform: impl Fn(&T) -> U + 'static) -> MappedBag<U>
	where
		U: Eq + std::hash::Hash + Clone + 'static,
		Self: Sized,
	{
		MappedBag::new(self, transform)
	}

	/// Order-preserving projection through `transform`.
	fn map_sequence<U>(&self, transform: impl Fn(&T) -> U + 'static) -> MappedSequence<U>
	where
		U: PartialEq + Clone + 'static,
		Self: Sized,
	{
		MappedSequence::new(self, transform)
	}

	/// The sub-multiset of elements satisfying `predicate`.
	fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> FilteredBag<T>
	where
		T: Eq + std::hash::Hash,
		Self: Sized,
	{
		FilteredBag::new(self, predicate)
	}

	/// Folds the collection into one value, updated incrementally from
	/// deltas. `add` folds an element in, `remove` folds one out;
	/// permutations are skipped and a clear resets to `initial`.
	fn reduce<R>(
		&self,
		initial: R,
		add: impl Fn(&R, &T) -> R + 'static,
		remove: impl Fn(&R, &T) -> R + 'static,
	) -> Value<R>
	where
		R: PartialEq + Clone + 'static,
		Self: Sized,
	{
		ReducedBody::build(self, initial, add, remove)
	}

	/// Recomputes `combine` over a full snapshot after every mutation.
	/// For folds without an inverse; prefer [`reduce`] when one exists.
	///
	/// [`reduce`]: ObservableCollection::reduce
	fn combine<R>(&self, combine: impl Fn(&[T]) -> R + 'static) -> Value<R>
	where
		R: PartialEq + Clone + 'static,
		Self: Sized,
	{
		CombinedBody::build(self, combine)
	}
}

struct ReducedBody<R: PartialEq + Clone + 'static> {
	value: RefCell<R>,
	initial: R,
	on_change: ChangeEvent<R>,
	this: Weak<ReducedBody<R>>,
	_listener: Rc<dyn Any>,
}

impl<R: PartialEq + Clone + 'static> ReducedBody<R> {
	fn build<T: PartialEq + Clone + 'static>(
		source: &impl ObservableCollection<T>,
		initial: R,
		add: impl Fn(&R, &T) -> R + 'static,
		remove: impl Fn(&R, &T) -> R + 'static,
	) -> Value<R> {
		let start = source
			.snapshot()
			.iter()
			.fold(initial.clone(), |acc, item| add(&acc, item));
		let body = Rc::new_cyclic(|this: &Weak<ReducedBody<R>>| {
			let weak = this.clone();
			let listener = Rc::new(ActionObserver::action(
				move |action: &CollectionAction<T>| {
					let body = match weak.upgrade() {
						Some(body) => body,
						None => return,
					};
					if action.is_permutation_only() {
						return;
					}
					match action.deltas() {
						Some(deltas) => {
							let mut acc = body.value.borrow().clone();
							for delta in &deltas {
								acc = if delta.is_add() {
									add(&acc, delta.value())
								} else {
									remove(&acc, delta.value())
								};
							}
							body.set_value(acc);
						}
						// Clear is the only delta-less non-permutation.
						None => body.set_value(body.initial.clone()),
					}
				},
			));
			source.on_change().weak_observe(&listener);
			ReducedBody {
				value: RefCell::new(start.clone()),
				initial,
				on_change: ChangeEvent::new(),
				this: this.clone(),
				_listener: listener as Rc<dyn Any>,
			}
		});
		Value::from_access(body)
	}

	fn set_value(&self, new: R) {
		let old = {
			let mut current = self.value.borrow_mut();
			if *current == new {
				return;
			}
			std::mem::replace(&mut *current, new.clone())
		};
		self.on_change.emit(&new, &old);
	}
}

impl<R: PartialEq + Clone + 'static> ValueAccess<R> for ReducedBody<R> {
	fn get(&self) -> R {
		self.value.borrow().clone()
	}

	fn on_change(&self) -> ChangeEvent<R> {
		self.on_change.clone()
	}

	fn node(&self) -> Rc<dyn DependencyNode> {
		self.this.upgrade().unwrap()
	}
}

impl<R: PartialEq + Clone + 'static> DependencyNode for ReducedBody<R> {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		Vec::new()
	}
}

struct CombinedBody<R: PartialEq + Clone + 'static> {
	value: RefCell<R>,
	on_change: ChangeEvent<R>,
	this: Weak<CombinedBody<R>>,
	_listener: Rc<dyn Any>,
}

impl<R: PartialEq + Clone + 'static> CombinedBody<R> {
	fn build<T: PartialEq + Clone + 'static>(
		source: &impl ObservableCollection<T>,
		combine: impl Fn(&[T]) -> R + 'static,
	) -> Value<R> {
		let snapshot = source.snapshot_fn();
		let start = combine(&snapshot());
		let body = Rc::new_cyclic(|this: &Weak<CombinedBody<R>>| {
			let weak = this.clone();
			let snapshot = snapshot.clone();
			let listener = Rc::new(ActionObserver::<CollectionAction<T>>::unit(move || {
				if let Some(body) = weak.upgrade() {
					body.set_value(combine(&snapshot()));
				}
			}));
			source.on_change().weak_observe(&listener);
			CombinedBody {
				value: RefCell::new(start.clone()),
				on_change: ChangeEvent::new(),
				this: this.clone(),
				_listener: listener as Rc<dyn Any>,
			}
		});
		Value::from_access(body)
	}

	fn set_value(&self, new: R) {
		let old = {
			let mut current = self.value.borrow_mut();
			if *current == new {
				return;
			}
			std::mem::replace(&mut *current, new.clone())
		};
		self.on_change.emit(&new, &old);
	}
}

impl<R: PartialEq + Clone + 'static> ValueAccess<R> for CombinedBody<R> {
	fn get(&self) -> R {
		self.value.borrow().clone()
	}

	fn on_change(&self) -> ChangeEvent<R> {
		self.on_change.clone()
	}

	fn node(&self) -> Rc<dyn DependencyNode> {
		self.this.upgrade().unwrap()
	}
}

impl<R: PartialEq + Clone + 'static> DependencyNode for CombinedBody<R> {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		Vec::new()
	}
}

impl<T: PartialEq + Clone + 'static> ObservableCollection<T> for crate::list::ObservableList<T> {
	fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		ObservableList::on_change(self)
	}

	fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		ObservableList::delta_event(self)
	}

	fn len_value(&self) -> Value<usize> {
		ObservableList::len_value(self)
	}

	fn snapshot(&self) -> Vec<T> {
		ObservableList::snapshot(self)
	}

	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<T>> {
		let list = self.clone();
		Rc::new(move || list.snapshot())
	}

	fn len(&self) -> usize {
		ObservableList::len(self)
	}

	fn is_empty(&self) -> bool {
		ObservableList::is_empty(self)
	}
}
