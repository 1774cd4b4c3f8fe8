use std::cell::RefCell;
use std::fmt::Debug;
use std::ops::Range;
use std::rc::Rc;

use crate::action::{CollectionAction, Delta, IndexedReplace};
use crate::error::CollectionError;
use crate::event::{ActionEvent, DeltaEvent};
use crate::value::Value;
use crate::var::Var;

/// An observable sequence. Mutations emit one [`CollectionAction`] on the
/// whole-action channel and its flattened expansion on the delta channel;
/// a reactive length value updates in lockstep.
///
/// While completely unobserved, mutators skip building actions and run at
/// plain `Vec` cost.
pub struct ObservableList<T: PartialEq + Clone + 'static> {
	body: Rc<ListBody<T>>,
}

pub(crate) struct ListBody<T: PartialEq + Clone + 'static> {
	values: RefCell<Vec<T>>,
	on_change: ActionEvent<CollectionAction<T>>,
	deltas: DeltaEvent<Delta<T>>,
	len: Var<usize>,
}

impl<T: PartialEq + Clone + 'static> Clone for ObservableList<T> {
	fn clone(&self) -> Self {
		ObservableList {
			body: self.body.clone(),
		}
	}
}

impl<T: PartialEq + Clone + 'static> Default for ObservableList<T> {
	fn default() -> Self {
		ObservableList::new()
	}
}

impl<T: PartialEq + Clone + 'static> ObservableList<T> {
	pub fn new() -> Self {
		ObservableList::from_vec(Vec::new())
	}

	pub fn from_vec(values: Vec<T>) -> Self {
		let len = values.len();
		ObservableList {
			body: Rc::new(ListBody {
				values: RefCell::new(values),
				on_change: ActionEvent::new(),
				deltas: DeltaEvent::new(),
				len: Var::new(len),
			}),
		}
	}

	pub fn on_change(&self) -> ActionEvent<CollectionAction<T>> {
		self.body.on_change.clone()
	}

	pub fn delta_event(&self) -> DeltaEvent<Delta<T>> {
		self.body.deltas.clone()
	}

	/// Reactive length. Its observers fire after the structural channels
	/// for the mutation that changed it, so a length observer always sees
	/// the already-updated collection.
	pub fn len_value(&self) -> Value<usize> {
		self.body.len.value()
	}

	/// True when either structural channel has a live observer.
	pub fn is_observed(&self) -> bool {
		self.body.on_change.is_observed() || self.body.deltas.is_observed()
	}

	/// Updates the length variable and, for observed mutations, emits the
	/// action and its delta expansion. Length observers are notified last.
	fn finish(&self, action: Option<CollectionAction<T>>) {
		let new_len = self.body.values.borrow().len();
		match action {
			Some(action) => {
				let body = &self.body;
				body.len.set_notify_after(new_len, || {
					body.on_change.emit(&action);
					if body.deltas.is_observed() {
						if let Some(deltas) = action.deltas() {
							body.deltas.emit(&deltas);
						}
					}
				});
			}
			None => self.body.len.set(new_len),
		}
	}

	pub fn push(&self, item: T) {
		let observed = self.is_observed();
		let index = self.len();
		self.body.values.borrow_mut().push(item.clone());
		self.finish(observed.then(|| CollectionAction::Delta(Delta::Insert { index, item })));
	}

	/// Panics when `index > len`.
	pub fn insert(&self, index: usize, item: T) {
		let observed = self.is_observed();
		self.body.values.borrow_mut().insert(index, item.clone());
		self.finish(observed.then(|| CollectionAction::Delta(Delta::Insert { index, item })));
	}

	pub fn extend(&self, items: impl IntoIterator<Item = T>) {
		let items: Vec<T> = items.into_iter().collect();
		if items.is_empty() {
			return;
		}
		let observed = self.is_observed();
		let old_len = self.len();
		self.body.values.borrow_mut().extend(items.iter().cloned());
		self.finish(observed.then(|| CollectionAction::Extend { old_len, items }));
	}

	/// Inserts many `(index, item)` pairs in one action. Indices refer to
	/// the sequence before any of the insertions.
	///
	/// Panics when an index exceeds the current length.
	pub fn insert_all(&self, pairs: impl IntoIterator<Item = (usize, T)>) {
		let mut pairs: Vec<(usize, T)> = pairs.into_iter().collect();
		if pairs.is_empty() {
			return;
		}
		pairs.sort_by_key(|(index, _)| *index);
		let len = self.len();
		assert!(
			pairs.last().unwrap().0 <= len,
			"insert_all index out of bounds"
		);
		let observed = self.is_observed();
		{
			let mut values = self.body.values.borrow_mut();
			// Descending application keeps every stated index valid.
			for (index, item) in pairs.iter().rev() {
				values.insert(*index, item.clone());
			}
		}
		self.finish(observed.then(|| CollectionAction::InsertAll(pairs)));
	}

	/// Removes the first occurrence of `item`. The sequence is untouched
	/// when the item is absent.
	pub fn remove_first(&self, item: &T) -> Result<(), CollectionError> {
		let index = self.index_of(item).ok_or(CollectionError::NotFound)?;
		let _ = self.remove_at(index);
		Ok(())
	}

	/// Panics when `index >= len`.
	pub fn remove_at(&self, index: usize) -> T {
		let observed = self.is_observed();
		let item = self.body.values.borrow_mut().remove(index);
		self.finish(observed.then(|| {
			CollectionAction::Delta(Delta::RemoveAt {
				index,
				item: item.clone(),
			})
		}));
		item
	}

	/// Removes many indices in one action.
	///
	/// Panics when an index is out of bounds or repeated; nothing is
	/// removed in that case.
	pub fn remove_indices(&self, indices: impl IntoIterator<Item = usize>) {
		let mut indices: Vec<usize> = indices.into_iter().collect();
		if indices.is_empty() {
			return;
		}
		indices.sort_unstable();
		let len = self.len();
		assert!(
			*indices.last().unwrap() < len,
			"remove_indices index out of bounds"
		);
		assert!(
			indices.windows(2).all(|pair| pair[0] != pair[1]),
			"remove_indices index repeated"
		);
		let observed = self.is_observed();
		let mut pairs: Vec<(usize, T)> = Vec::with_capacity(indices.len());
		{
			let mut values = self.body.values.borrow_mut();
			for index in indices.iter().rev() {
				pairs.push((*index, values.remove(*index)));
			}
		}
		pairs.reverse();
		self.finish(observed.then(|| CollectionAction::RemoveAtIndices(pairs)));
	}

	pub fn remove_range(&self, range: Range<usize>) {
		self.remove_indices(range);
	}

	/// Removes one occurrence of every item in `items`, duplicate-aware:
	/// removing `[x, x]` needs two occurrences of `x`. Fails without
	/// touching the sequence when any occurrence is missing.
	pub fn remove_all(&self, items: &[T]) -> Result<(), CollectionError> {
		if items.is_empty() {
			return Ok(());
		}
		let mut taken: Vec<usize> = Vec::with_capacity(items.len());
		{
			let values = self.body.values.borrow();
			for item in items {
				let found = values
					.iter()
					.enumerate()
					.find(|(index, value)| *value == item && !taken.contains(index))
					.map(|(index, _)| index);
				match found {
					Some(index) => taken.push(index),
					None => return Err(CollectionError::NotFound),
				}
			}
		}
		self.remove_indices(taken);
		Ok(())
	}

	pub fn pop(&self) -> Option<T> {
		if self.is_empty() {
			return None;
		}
		Some(self.remove_at(self.len() - 1))
	}

	/// Replaces the element at `index`, returning the old one. The length
	/// does not change, so length observers stay silent.
	///
	/// Panics when `index >= len`.
	pub fn set(&self, index: usize, item: T) -> T {
		let observed = self.is_observed();
		let old_item = {
			let mut values = self.body.values.borrow_mut();
			std::mem::replace(&mut values[index], item.clone())
		};
		self.finish(observed.then(|| CollectionAction::SetAt {
			index,
			old_item: old_item.clone(),
			new_item: item,
		}));
		old_item
	}

	/// Replaces `range` with `items`. Equal lengths emit a positional
	/// replace; unequal lengths emit a splice.
	///
	/// Panics when `range` is out of bounds.
	pub fn set_slice(&self, range: Range<usize>, items: Vec<T>) {
		if range.is_empty() && items.is_empty() {
			return;
		}
		let observed = self.is_observed();
		let index = range.start;
		let old_items: Vec<T> = {
			let mut values = self.body.values.borrow_mut();
			values.splice(range, items.iter().cloned()).collect()
		};
		self.finish(observed.then(|| {
			if old_items.len() == items.len() {
				CollectionAction::SetAtIndices(
					old_items
						.into_iter()
						.zip(items)
						.enumerate()
						.map(|(i, (old_item, new_item))| IndexedReplace {
							index: index + i,
							old_item,
							new_item,
						})
						.collect(),
				)
			} else {
				CollectionAction::SliceSet {
					index,
					old_items,
					new_items: items,
				}
			}
		}));
	}

	pub fn clear(&self) {
		if self.is_empty() {
			return;
		}
		let observed = self.is_observed();
		// The per-delta expansion of a clear is every element removed from
		// index zero; built up front because the action itself has none.
		let expansion = if self.body.deltas.is_observed() {
			Some(
				self.body
					.values
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
		self.body.values.borrow_mut().clear();
		let body = &self.body;
		if observed {
			body.len.set_notify_after(0, || {
				body.on_change.emit(&CollectionAction::Clear);
				if let Some(expansion) = expansion {
					body.deltas.emit(&expansion);
				}
			});
		} else {
			body.len.set(0);
		}
	}

	pub fn reverse(&self) {
		if self.len() < 2 {
			return;
		}
		let observed = self.is_observed();
		// Delta observers see a reverse as a full drain in the old order
		// followed by reinsertion in the new one.
		let expansion = if self.body.deltas.is_observed() {
			let values = self.body.values.borrow();
			let mut deltas: Vec<Delta<T>> = Vec::with_capacity(values.len() * 2);
			for item in values.iter() {
				deltas.push(Delta::RemoveAt {
					index: 0,
					item: item.clone(),
				});
			}
			for (index, item) in values.iter().rev().enumerate() {
				deltas.push(Delta::Insert {
					index,
					item: item.clone(),
				});
			}
			Some(deltas)
		} else {
			None
		};
		self.body.values.borrow_mut().reverse();
		if observed {
			self.body.on_change.emit(&CollectionAction::Reverse);
			if let Some(expansion) = expansion {
				self.body.deltas.emit(&expansion);
			}
		}
	}

	/// Makes the sequence `n` concatenated copies of itself. Zero clears.
	pub fn repeat(&self, n: usize) {
		match n {
			0 => self.clear(),
			1 => {}
			_ => {
				let snapshot = self.snapshot();
				for _ in 1..n {
					self.extend(snapshot.iter().cloned());
				}
			}
		}
	}

	pub fn len(&self) -> usize {
		self.body.values.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.body.values.borrow().is_empty()
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.body.values.borrow().get(index).cloned()
	}

	pub fn snapshot(&self) -> Vec<T> {
		self.body.values.borrow().clone()
	}

	pub fn contains(&self, item: &T) -> bool {
		self.body.values.borrow().contains(item)
	}

	pub fn index_of(&self, item: &T) -> Option<usize> {
		self.body.values.borrow().iter().position(|v| v == item)
	}

	/// First occurrence of `item` at or after `start`.
	pub fn index_of_from(&self, item: &T, start: usize) -> Option<usize> {
		self.body
			.values
			.borrow()
			.iter()
			.skip(start)
			.position(|v| v == item)
			.map(|offset| start + offset)
	}

	/// Visits every element without cloning the whole sequence. The list
	/// must not be mutated from inside the callback.
	pub fn for_each(&self, mut visit: impl FnMut(&T)) {
		for item in self.body.values.borrow().iter() {
			visit(item);
		}
	}
}

impl<T: PartialEq + Clone + 'static> FromIterator<T> for ObservableList<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		ObservableList::from_vec(iter.into_iter().collect())
	}
}

impl<T: PartialEq + Clone + Debug + 'static> Debug for ObservableList<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.body.values.borrow().iter()).finish()
	}
}
