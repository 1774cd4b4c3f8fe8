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

/// An element-transformed projection of a collection that forgets order:
/// a multiset of mapped elements maintained by counting. Permutations of
/// the source are invisible to it.
pub struct MappedBag<U: Eq + Hash + Clone + 'static> {
	body: Rc<BagBody<U>>,
}

pub(crate) struct BagBody<U: Eq + Hash + Clone + 'static> {
	counts: RefCell<FxHashMap<U, usize>>,
	len: Var<usize>,
	on_change: ActionEvent<CollectionAction<U>>,
	deltas: DeltaEvent<Delta<U>>,
	this: Weak<BagBody<U>>,
	_listener: RefCell<Option<Rc<dyn Any>>>,
}

impl<U: Eq + Hash + Clone + 'static> Clone for MappedBag<U> {
	fn clone(&self) -> Self {
		MappedBag {
			body: self.body.clone(),
		}
	}
}

impl<U: Eq + Hash + Clone + 'static> MappedBag<U> {
	pub fn new<T: PartialEq + Clone + 'static>(
		source: &impl ObservableCollection<T>,
		transform: impl Fn(&T) -> U + 'static,
	) -> Self {
		let mut counts: FxHashMap<U, usize> = FxHashMap::default();
		for item in source.snapshot().iter() {
			*counts.entry(transform(item)).or_insert(0) += 1;
		}
		let len = counts.values().sum();
		let body = Rc::new_cyclic(|this: &Weak<BagBody<U>>| BagBody {
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
					body.apply(action.map(&transform));
				}
			},
		));
		source.on_change().weak_observe(&listener);
		*body._listener.borrow_mut() = Some(listener as Rc<dyn Any>);
		MappedBag { body }
	}

	pub fn on_change(&self) -> ActionEvent<CollectionAction<U>> {
		self.body.on_change.clone()
	}

	pub fn delta_event(&self) -> DeltaEvent<Delta<U>> {
		self.body.deltas.clone()
	}

	pub fn len_value(&self) -> Value<usize> {
		self.body.len.value()
	}

	/// Total element count, duplicates included.
	pub fn len(&self) -> usize {
		self.body.len.get()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, item: &U) -> bool {
		self.count_of(item) > 0
	}

	pub fn count_of(&self, item: &U) -> usize {
		self.body.counts.borrow().get(item).copied().unwrap_or(0)
	}

	/// All elements, each repeated by its count. Order is unspecified.
	pub fn snapshot(&self) -> Vec<U> {
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

impl<U: Eq + Hash + Clone + 'static> BagBody<U> {
	pub(crate) fn apply(&self, action: CollectionAction<U>) {
		if action.is_permutation_only() {
			return;
		}
		match action.deltas() {
			None => self.apply_clear(),
			Some(deltas) => self.apply_deltas(deltas),
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

	fn apply_deltas(&self, deltas: Vec<Delta<U>>) {
		let mut applied: Vec<Delta<U>> = Vec::with_capacity(deltas.len());
		{
			let mut counts = self.counts.borrow_mut();
			for delta in deltas {
				let item = delta.value().clone();
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
							warn!("removal of an element missing from the bag; skipped");
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

impl<U: Eq + Hash + Clone + 'static> ObservableCollection<U> for MappedBag<U> {
	fn on_change(&self) -> ActionEvent<CollectionAction<U>> {
		MappedBag::on_change(self)
	}

	fn delta_event(&self) -> DeltaEvent<Delta<U>> {
		MappedBag::delta_event(self)
	}

	fn len_value(&self) -> Value<usize> {
		MappedBag::len_value(self)
	}

	fn snapshot(&self) -> Vec<U> {
		MappedBag::snapshot(self)
	}

	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<U>> {
		let bag = self.clone();
		Rc::new(move || bag.snapshot())
	}

	fn len(&self) -> usize {
		MappedBag::len(self)
	}

	fn is_empty(&self) -> bool {
		MappedBag::is_empty(self)
	}
}

/// An element-transformed projection of a sequence that keeps order:
/// mirrors the source index for index.
pub struct MappedSequence<U: PartialEq + Clone + 'static> {
	body: Rc<SeqBody<U>>,
}

pub(crate) struct SeqBody<U: PartialEq + Clone + 'static> {
	values: RefCell<Vec<U>>,
	len: Var<usize>,
	on_change: ActionEvent<CollectionAction<U>>,
	deltas: DeltaEvent<Delta<U>>,
	this: Weak<SeqBody<U>>,
	_listener: RefCell<Option<Rc<dyn Any>>>,
}

impl<U: PartialEq + Clone + 'static> Clone for MappedSequence<U> {
	fn clone(&self) -> Self {
		MappedSequence {
			body: self.body.clone(),
		}
	}
}

impl<U: PartialEq + Clone + 'static> MappedSequence<U> {
	pub fn new<T: PartialEq + Clone + 'static>(
		source: &impl ObservableCollection<T>,
		transform: impl Fn(&T) -> U + 'static,
	) -> Self {
		let values: Vec<U> = source.snapshot().iter().map(&transform).collect();
		let len = values.len();
		let body = Rc::new_cyclic(|this: &Weak<SeqBody<U>>| SeqBody {
			values: RefCell::new(values),
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
					body.apply(action.map(&transform));
				}
			},
		));
		source.on_change().weak_observe(&listener);
		*body._listener.borrow_mut() = Some(listener as Rc<dyn Any>);
		MappedSequence { body }
	}

	pub fn on_change(&self) -> ActionEvent<CollectionAction<U>> {
		self.body.on_change.clone()
	}

	pub fn delta_event(&self) -> DeltaEvent<Delta<U>> {
		self.body.deltas.clone()
	}

	pub fn len_value(&self) -> Value<usize> {
		self.body.len.value()
	}

	pub fn len(&self) -> usize {
		self.body.values.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.body.values.borrow().is_empty()
	}

	pub fn get(&self, index: usize) -> Option<U> {
		self.body.values.borrow().get(index).cloned()
	}

	pub fn snapshot(&self) -> Vec<U> {
		self.body.values.borrow().clone()
	}
}

impl<U: PartialEq + Clone + 'static> SeqBody<U> {
	fn apply(&self, action: CollectionAction<U>) {
		match &action {
			CollectionAction::Clear => {
				let expansion = if self.deltas.is_observed() {
					Some(
						self.values
							.borrow()
							.iter()
							.map(|item| Delta::RemoveAt {
								index: 0,
								item: item.clone(),
							})
							.collect::<Vec<_>>(),
					)
				} else {
					None
				};
				self.values.borrow_mut().clear();
				self.len.set_notify_after(0, || {
					self.on_change.emit(&action);
					if let Some(expansion) = expansion {
						self.deltas.emit(&expansion);
					}
				});
			}
			CollectionAction::Reverse => {
				self.values.borrow_mut().reverse();
				self.on_change.emit(&action);
				if self.deltas.is_observed() {
					let values = self.values.borrow();
					let mut expansion: Vec<Delta<U>> = Vec::with_capacity(values.len() * 2);
					for item in values.iter().rev() {
						expansion.push(Delta::RemoveAt {
							index: 0,
							item: item.clone(),
						});
					}
					for (index, item) in values.iter().enumerate() {
						expansion.push(Delta::Insert {
							index,
							item: item.clone(),
						});
					}
					drop(values);
					self.deltas.emit(&expansion);
				}
			}
			CollectionAction::Changed { old_item, new_item } => {
				let replaced = {
					let mut values = self.values.borrow_mut();
					match values.iter().position(|item| item == old_item) {
						Some(index) => {
							values[index] = new_item.clone();
							true
						}
						None => false,
					}
				};
				if !replaced {
					warn!("changed element missing from the mapped sequence; skipped");
					return;
				}
				self.on_change.emit(&action);
				if self.deltas.is_observed() {
					if let Some(deltas) = action.deltas() {
						self.deltas.emit(&deltas);
					}
				}
			}
			_ => {
				let deltas = match action.deltas() {
					Some(deltas) => deltas,
					None => return,
				};
				// A sequence can only replay positioned deltas.
				if deltas.iter().any(|delta| delta.index().is_none()) {
					return;
				}
				{
					let mut values = self.values.borrow_mut();
					for delta in &deltas {
						match delta {
							Delta::Insert { index, item } => values.insert(*index, item.clone()),
							Delta::RemoveAt { index, .. } => {
								values.remove(*index);
							}
							Delta::Add(_) | Delta::Remove(_) => unreachable!(),
						}
					}
				}
				let new_len = self.values.borrow().len();
				self.len.set_notify_after(new_len, || {
					self.on_change.emit(&action);
					if self.deltas.is_observed() {
						self.deltas.emit(&deltas);
					}
				});
			}
		}
	}
}

impl<U: PartialEq + Clone + 'static> ObservableCollection<U> for MappedSequence<U> {
	fn on_change(&self) -> ActionEvent<CollectionAction<U>> {
		MappedSequence::on_change(self)
	}

	fn delta_event(&self) -> DeltaEvent<Delta<U>> {
		MappedSequence::delta_event(self)
	}

	fn len_value(&self) -> Value<usize> {
		MappedSequence::len_value(self)
	}

	fn snapshot(&self) -> Vec<U> {
		MappedSequence::snapshot(self)
	}

	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<U>> {
		let seq = self.clone();
		Rc::new(move || seq.snapshot())
	}

	fn len(&self) -> usize {
		MappedSequence::len(self)
	}

	fn is_empty(&self) -> bool {
		MappedSequence::is_empty(self)
	}
}
