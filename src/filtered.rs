use std::any::Any;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;
use tracing::warn;

use crate::action::{CollectionAction, Delta};
use crate::collection::ObservableCollection;
use crate::event::{ActionEvent, ActionObserver, DeltaEvent};
use crate::value::Value;
use crate::var::Var;

/// The sub-multiset of a collection's elements that satisfy a predicate.
/// Order-free; permutations of the source are invisible to it.
pub struct FilteredBag<T: Eq + Hash + Clone + 'static> {
	body: Rc<FilteredBody<T>>,
}

pub(crate) struct FilteredBody<T: Eq + Hash + Clone + 'static> {
	counts: RefCell<FxHashMap<T, usize>>,
	len: Var<usize>,
	on_change: ActionEvent<CollectionAction<T>>,
	deltas: DeltaEvent<Delta<T>>,
	this: Weak<FilteredBody<T>>,
	_listener: RefCell<Option<Rc<dyn Any>>>,
}

impl<T: Eq + Hash + Clone + 'static> Clone for FilteredBag<T> {
	fn clone(&self) -> Self {
		FilteredBag {
			body: self.body.clone(),
		}
	}
}

impl<T: Eq + Hash + Clone + 'static> FilteredBag<T> {
	pub fn new(
		source: &impl ObservableCollection<T>,
		predicate: impl Fn(&T) -> bool + 'static,
	) -> Self {
		let mut counts: FxHashMap<T, usize> = FxHashMap::default();
		for item in source.snapshot() {
			if predicate(&item) {
				*counts.entry(item).or_insert(0) += 1;
			}
		}
		let len = counts.values().sum();
		let body = Rc::new_cyclic(|this: &Weak<FilteredBody<T>>| FilteredBody {
			counts: RefCell::new(counts),
			len: Var::new(len),
			on_change: ActionEvent::new(),
			deltas: DeltaEvent::new(),
			this: this.clone(),
			_listener: RefCell::new(None),
		});
		let weak = body.this.clone();
		let listener = Rc::new(ActionObserver::action(
			move |action: &CollectionAction<T>| {
				if let Some(body) = weak.upgrade() {
					body.apply(action, &predicate);
				}
			},
		));
		source.on_change().weak_observe(&listener);
		*body._listener.borrow_mut() = Some(listener as Rc<dyn Any>);
		FilteredBag { body }
	}

	pub fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		self.body.on_change.clone()
	}

	pub fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		self.body.deltas.clone()
	}

	pub fn len_value(&self) -> Value<usize> {
		self.body.len.value()
	}

	pub fn len(&self) -> usize {
		self.body.len.get()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, item: &T) -> bool {
		self.count_of(item) > 0
	}

	pub fn count_of(&self, item: &T) -> usize {
		self.body.counts.borrow().get(item).copied().unwrap_or(0)
	}

	/// All passing elements, each repeated by its count. Order is
	/// unspecified.
	pub fn snapshot(&self) -> Vec<T> {
		let counts = self.body.counts.borrow();
		let mut out = Vec::with_capacity(counts.values().sum());
		for (item, count) in counts.iter() {
			for _ in 0..*count {
				out.push(item.clone());
			}
		}
		out
	}
}

impl<T: Eq + Hash + Clone + 'static> FilteredBody<T> {
	fn apply(&self, action: &CollectionAction<T>, predicate: &impl Fn(&T) -> bool) {
		if action.is_permutation_only() {
			return;
		}
		match action.deltas() {
			None => self.apply_clear(),
			Some(deltas) => self.apply_deltas(deltas, predicate),
		}
	}

	fn apply_clear(&self) {
		let expansion = if self.deltas.is_observed() {
			let counts = self.counts.borrow();
			let mut removes = Vec::with_capacity(counts.values().sum());
			for (item, count) in counts.iter() {
				for _ in 0..*count {
					removes.push(Delta::Remove(item.clone()));
				}
			}
			Some(removes)
		} else {
			None
		};
		self.counts.borrow_mut().clear();
		self.len.set_notify_after(0, || {
			self.on_change.emit(&CollectionAction::Clear);
			if let Some(expansion) = expansion {
				self.deltas.emit(&expansion);
			}
		});
	}

	fn apply_deltas(&self, deltas: Vec<Delta<T>>, predicate: &impl Fn(&T) -> bool) {
		let mut applied: Vec<Delta<T>> = Vec::new();
		{
			let mut counts = self.counts.borrow_mut();
			for delta in deltas {
				let item = delta.value();
				if !predicate(item) {
					continue;
				}
				let item = item.clone();
				if delta.is_add() {
					*counts.entry(item.clone()).or_insert(0) += 1;
					applied.push(Delta::Add(item));
				} else {
					match counts.get_mut(&item) {
						Some(count) if *count > 1 => {
							*count -= 1;
							applied.push(Delta::Remove(item));
						}
						Some(_) => {
							counts.remove(&item);
							applied.push(Delta::Remove(item));
						}
						None => {
							warn!("removal of an element missing from the filtered bag; skipped");
						}
					}
				}
			}
		}
		if applied.is_empty() {
			return;
		}
		let new_len = self.counts.borrow().values().sum();
		let action = if applied.len() == 1 {
			CollectionAction::Delta(applied[0].clone())
		} else {
			CollectionAction::Deltas(applied.clone())
		};
		self.len.set_notify_after(new_len, || {
			self.on_change.emit(&action);
			if self.deltas.is_observed() {
				self.deltas.emit(&applied);
			}
		});
	}
}

impl<T: Eq + Hash + Clone + 'static> ObservableCollection<T> for FilteredBag<T> {
	fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		FilteredBag::on_change(self)
	}

	fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		FilteredBag::delta_event(self)
	}

	fn len_value(&self) -> Value<usize> {
		FilteredBag::len_value(self)
	}

	fn snapshot(&self) -> Vec<T> {
		FilteredBag::snapshot(self)
	}

	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<T>> {
		let bag = self.clone();
		Rc::new(move || bag.snapshot())
	}

	fn len(&self) -> usize {
		FilteredBag::len(self)
	}

	fn is_empty(&self) -> bool {
		FilteredBag::is_empty(self)
	}
}
