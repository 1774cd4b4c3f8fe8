use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::action::{CollectionAction, Delta};
use crate::addr::RcAddr;
use crate::collection::ObservableCollection;
use crate::error::CollectionError;
use crate::event::{
	ActionEvent, ActionObserver, ChangeEvent, ChangeObserver, DeltaEvent, DeltaObserver,
};
use crate::list::ObservableList;
use crate::value::{DependencyNode, Value};

/// A list of reactive values observed as a list of their current
/// contents. Structural mutations and in-place changes of the element
/// values both surface on the same channels; an element change arrives
/// as a [`CollectionAction::Changed`] without a length change.
pub struct ValueList<T: PartialEq + Clone + 'static> {
	body: Rc<ValueListBody<T>>,
}

struct ValueListBody<T: PartialEq + Clone + 'static> {
	list: ObservableList<Value<T>>,
	cells: RefCell<BTreeMap<RcAddr<dyn DependencyNode>, ListenerCell<T>>>,
	on_change: ActionEvent<CollectionAction<T>>,
	deltas: DeltaEvent<Delta<T>>,
	on_element_changed: ChangeEvent<T>,
	this: Weak<ValueListBody<T>>,
	_action_listener: Rc<dyn Any>,
	_delta_listener: Rc<dyn Any>,
}

/// One shared change listener per distinct element value, reference
/// counted across its occurrences in the list.
struct ListenerCell<T: PartialEq + Clone + 'static> {
	listener: Rc<ChangeObserver<T>>,
	subscriptions: Vec<crate::event::SubscriberId>,
}

impl<T: PartialEq + Clone + 'static> Clone for ValueList<T> {
	fn clone(&self) -> Self {
		ValueList {
			body: self.body.clone(),
		}
	}
}

impl<T: PartialEq + Clone + 'static> Default for ValueList<T> {
	fn default() -> Self {
		ValueList::new()
	}
}

impl<T: PartialEq + Clone + 'static> ValueList<T> {
	pub fn new() -> Self {
		ValueList::from_values(Vec::new())
	}

	pub fn from_values(values: Vec<Value<T>>) -> Self {
		let list = ObservableList::from_vec(values);
		let body = Rc::new_cyclic(|this: &Weak<ValueListBody<T>>| {
			let on_change = ActionEvent::new();
			let deltas = DeltaEvent::new();

			// The inner list's actions carry value handles; re-emit them
			// with the handles read out.
			let reemit = on_change.clone();
			let action_listener = Rc::new(ActionObserver::action(
				move |action: &CollectionAction<Value<T>>| {
					reemit.emit(&action.map(&|value: &Value<T>| value.get()));
				},
			));
			list.on_change().weak_observe(&action_listener);

			let reemit = deltas.clone();
			let delta_listener = Rc::new(DeltaObserver::batch(move |batch: &[Delta<Value<T>>]| {
				let mapped: Vec<Delta<T>> = batch
					.iter()
					.map(|delta| delta.map(&|value: &Value<T>| value.get()))
					.collect();
				reemit.emit(&mapped);
			}));
			list.delta_event().weak_observe(&delta_listener);

			ValueListBody {
				list: list.clone(),
				cells: RefCell::new(BTreeMap::new()),
				on_change,
				deltas,
				on_element_changed: ChangeEvent::new(),
				this: this.clone(),
				_action_listener: action_listener as Rc<dyn Any>,
				_delta_listener: delta_listener as Rc<dyn Any>,
			}
		});
		for value in body.list.snapshot() {
			body.register(&value);
		}
		ValueList { body }
	}

	/// Structural and element changes, with handles already read out.
	pub fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		self.body.on_change.clone()
	}

	pub fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		self.body.deltas.clone()
	}

	/// Fires when an element value changes in place, carrying the new
	/// and old contents.
	pub fn on_element_changed(&self) -> ChangeEvent<T> {
		self.body.on_element_changed.clone()
	}

	pub fn len_value(&self) -> Value<usize> {
		self.body.list.len_value()
	}

	pub fn push(&self, item: impl Into<Value<T>>) {
		let value = item.into();
		self.body.register(&value);
		self.body.list.push(value);
	}

	pub fn insert(&self, index: usize, item: impl Into<Value<T>>) {
		// Validate before registering so a panic leaves nothing tracked.
		assert!(index <= self.len(), "insert index out of bounds");
		let value = item.into();
		self.body.register(&value);
		self.body.list.insert(index, value);
	}

	pub fn extend<V: Into<Value<T>>>(&self, items: impl IntoIterator<Item = V>) {
		let values: Vec<Value<T>> = items.into_iter().map(Into::into).collect();
		for value in &values {
			self.body.register(value);
		}
		self.body.list.extend(values);
	}

	pub fn insert_all<V: Into<Value<T>>>(&self, pairs: impl IntoIterator<Item = (usize, V)>) {
		let pairs: Vec<(usize, Value<T>)> = pairs
			.into_iter()
			.map(|(index, item)| (index, item.into()))
			.collect();
		if let Some(max) = pairs.iter().map(|(index, _)| *index).max() {
			assert!(max <= self.len(), "insert_all index out of bounds");
		}
		for (_, value) in &pairs {
			self.body.register(value);
		}
		self.body.list.insert_all(pairs);
	}

	/// Replaces the value handle at `index`, returning the old one.
	pub fn set(&self, index: usize, item: impl Into<Value<T>>) -> Value<T> {
		assert!(index < self.len(), "set index out of bounds");
		let value = item.into();
		self.body.register(&value);
		let old = self.body.list.set(index, value);
		self.body.unregister(&old);
		old
	}

	pub fn remove_at(&self, index: usize) -> Value<T> {
		let value = self.body.list.remove_at(index);
		self.body.unregister(&value);
		value
	}

	pub fn pop(&self) -> Option<Value<T>> {
		let value = self.body.list.pop()?;
		self.body.unregister(&value);
		Some(value)
	}

	/// Removes the first occurrence of `value` (constants compare by
	/// contents, everything else by identity).
	pub fn remove_value(&self, value: &Value<T>) -> Result<(), CollectionError> {
		self.body.list.remove_first(value)?;
		self.body.unregister(value);
		Ok(())
	}

	pub fn clear(&self) {
		for value in self.body.list.snapshot() {
			self.body.unregister(&value);
		}
		self.body.list.clear();
	}

	pub fn reverse(&self) {
		self.body.list.reverse();
	}

	pub fn len(&self) -> usize {
		self.body.list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.body.list.is_empty()
	}

	/// Current contents of the element at `index`.
	pub fn get(&self, index: usize) -> Option<T> {
		self.body.list.get(index).map(|value| value.get())
	}

	/// The value handle at `index`.
	pub fn get_value(&self, index: usize) -> Option<Value<T>> {
		self.body.list.get(index)
	}

	pub fn values(&self) -> Vec<Value<T>> {
		self.body.list.snapshot()
	}

	/// Current contents of every element.
	pub fn snapshot(&self) -> Vec<T> {
		self.body
			.list
			.snapshot()
			.iter()
			.map(|value| value.get())
			.collect()
	}
}

impl<T: PartialEq + Clone + 'static> ValueListBody<T> {
	/// Subscribes the shared per-value listener to one more occurrence of
	/// `value`. Constants cannot change and are never tracked.
	fn register(&self, value: &Value<T>) {
		if value.constant().is_some() {
			return;
		}
		let key = RcAddr::new(value.node());
		let mut cells = self.cells.borrow_mut();
		let cell = cells.entry(key).or_insert_with(|| {
			let weak = self.this.clone();
			ListenerCell {
				listener: Rc::new(ChangeObserver::new_and_old(move |new: &T, old: &T| {
					if let Some(body) = weak.upgrade() {
						body.element_changed(new, old);
					}
				})),
				subscriptions: Vec::new(),
			}
		});
		let id = value.weak_observe(&cell.listener);
		cell.subscriptions.push(id);
	}

	fn unregister(&self, value: &Value<T>) {
		if value.constant().is_some() {
			return;
		}
		let key = RcAddr::new(value.node());
		let mut cells = self.cells.borrow_mut();
		if let Some(cell) = cells.get_mut(&key) {
			if let Some(id) = cell.subscriptions.pop() {
				let _ = value.unobserve(id);
			}
			if cell.subscriptions.is_empty() {
				cells.remove(&key);
			}
		}
	}

	fn element_changed(&self, new: &T, old: &T) {
		self.on_change.emit(&CollectionAction::Changed {
			old_item: old.clone(),
			new_item: new.clone(),
		});
		if self.deltas.is_observed() {
			self.deltas
				.emit(&[Delta::Remove(old.clone()), Delta::Add(new.clone())]);
		}
		self.on_element_changed.emit(new, old);
	}
}

impl<T: PartialEq + Clone + 'static> ObservableCollection<T> for ValueList<T> {
	fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		ValueList::on_change(self)
	}

	fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		ValueList::delta_event(self)
	}

	fn len_value(&self) -> Value<usize> {
		ValueList::len_value(self)
	}

	fn snapshot(&self) -> Vec<T> {
		ValueList::snapshot(self)
	}

	fn snapshot_fn(&self) -> Rc<dyn Fn() -> Vec<T>> {
		let list = self.clone();
		Rc::new(move || list.snapshot())
	}

	fn len(&self) -> usize {
		ValueList::len(self)
	}

	fn is_empty(&self) -> bool {
		ValueList::is_empty(self)
	}
}
