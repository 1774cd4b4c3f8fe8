/// Single-element change in a collection. Indexed variants locate the
/// element in a sequence; the index-free variants describe membership
/// changes only.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta<T> {
	Add(T),
	Remove(T),
	Insert { index: usize, item: T },
	RemoveAt { index: usize, item: T },
}

impl<T> Delta<T> {
	pub fn is_add(&self) -> bool {
		matches!(self, Delta::Add(_) | Delta::Insert { .. })
	}

	pub fn value(&self) -> &T {
		match self {
			Delta::Add(item) | Delta::Remove(item) => item,
			Delta::Insert { item, .. } | Delta::RemoveAt { item, .. } => item,
		}
	}

	pub fn index(&self) -> Option<usize> {
		match self {
			Delta::Insert { index, .. } | Delta::RemoveAt { index, .. } => Some(*index),
			Delta::Add(_) | Delta::Remove(_) => None,
		}
	}

	pub fn map<U>(&self, transform: &impl Fn(&T) -> U) -> Delta<U> {
		match self {
			Delta::Add(item) => Delta::Add(transform(item)),
			Delta::Remove(item) => Delta::Remove(transform(item)),
			Delta::Insert { index, item } => Delta::Insert {
				index: *index,
				item: transform(item),
			},
			Delta::RemoveAt { index, item } => Delta::RemoveAt {
				index: *index,
				item: transform(item),
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedReplace<T> {
	pub index: usize,
	pub old_item: T,
	pub new_item: T,
}

/// One structural mutation of an observable collection. Every mutator
/// emits exactly one action; observers replaying actions in order can
/// reconstruct the collection exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionAction<T> {
	Clear,
	Reverse,
	Delta(Delta<T>),
	Deltas(Vec<Delta<T>>),
	/// Items appended at the end; `old_len` is the length before.
	Extend { old_len: usize, items: Vec<T> },
	/// `(index, item)` pairs sorted ascending by pre-insertion index.
	/// The i-th pair lands at `index + i` in the final sequence.
	InsertAll(Vec<(usize, T)>),
	/// `(index, item)` pairs sorted ascending by pre-removal index.
	/// After the removals the i-th pair's slot is `index - i`.
	RemoveAtIndices(Vec<(usize, T)>),
	SetAt {
		index: usize,
		old_item: T,
		new_item: T,
	},
	SliceSet {
		index: usize,
		old_items: Vec<T>,
		new_items: Vec<T>,
	},
	SetAtIndices(Vec<IndexedReplace<T>>),
	/// An element changed in place without moving.
	Changed { old_item: T, new_item: T },
}

impl<T: Clone> CollectionAction<T> {
	/// True for actions that reorder elements without changing
	/// membership. Bag-shaped projections skip these entirely.
	pub fn is_permutation_only(&self) -> bool {
		matches!(self, CollectionAction::Reverse)
	}

	/// Expands the action into its flattened single-element deltas, with
	/// every index valid at its own application point. `None` for actions
	/// that have no per-element expansion.
	pub fn deltas(&self) -> Option<Vec<Delta<T>>> {
		match self {
			CollectionAction::Clear | CollectionAction::Reverse => None,
			CollectionAction::Delta(delta) => Some(vec![delta.clone()]),
			CollectionAction::Deltas(deltas) => Some(deltas.clone()),
			CollectionAction::Extend { old_len, items } => Some(
				items
					.iter()
					.enumerate()
					.map(|(i, item)| Delta::Insert {
						index: old_len + i,
						item: item.clone(),
					})
					.collect(),
			),
			CollectionAction::InsertAll(pairs) => Some(
				pairs
					.iter()
					.enumerate()
					.map(|(i, (index, item))| Delta::Insert {
						index: index + i,
						item: item.clone(),
					})
					.collect(),
			),
			CollectionAction::RemoveAtIndices(pairs) => Some(
				pairs
					.iter()
					.enumerate()
					.map(|(i, (index, item))| Delta::RemoveAt {
						index: index - i,
						item: item.clone(),
					})
					.collect(),
			),
			CollectionAction::SetAt {
				index,
				old_item,
				new_item,
			} => Some(vec![
				Delta::RemoveAt {
					index: *index,
					item: old_item.clone(),
				},
				Delta::Insert {
					index: *index,
					item: new_item.clone(),
				},
			]),
			CollectionAction::SliceSet {
				index,
				old_items,
				new_items,
			} => {
				let mut deltas = Vec::with_capacity(old_items.len() + new_items.len());
				for item in old_items {
					deltas.push(Delta::RemoveAt {
						index: *index,
						item: item.clone(),
					});
				}
				for (i, item) in new_items.iter().enumerate() {
					deltas.push(Delta::Insert {
						index: index + i,
						item: item.clone(),
					});
				}
				Some(deltas)
			}
			CollectionAction::SetAtIndices(replaces) => {
				let mut deltas = Vec::with_capacity(replaces.len() * 2);
				for replace in replaces {
					deltas.push(Delta::RemoveAt {
						index: replace.index,
						item: replace.old_item.clone(),
					});
					deltas.push(Delta::Insert {
						index: replace.index,
						item: replace.new_item.clone(),
					});
				}
				Some(deltas)
			}
			CollectionAction::Changed { old_item, new_item } => Some(vec![
				Delta::Remove(old_item.clone()),
				Delta::Add(new_item.clone()),
			]),
		}
	}

	/// Applies `transform` to every carried element, preserving the
	/// action's shape and indices.
	pub fn map<U>(&self, transform: &impl Fn(&T) -> U) -> CollectionAction<U> {
		match self {
			CollectionAction::Clear => CollectionAction::Clear,
			CollectionAction::Reverse => CollectionAction::Reverse,
			CollectionAction::Delta(delta) => CollectionAction::Delta(delta.map(transform)),
			CollectionAction::Deltas(deltas) => {
				CollectionAction::Deltas(deltas.iter().map(|d| d.map(transform)).collect())
			}
			CollectionAction::Extend { old_len, items } => CollectionAction::Extend {
				old_len: *old_len,
				items: items.iter().map(transform).collect(),
			},
			CollectionAction::InsertAll(pairs) => CollectionAction::InsertAll(
				pairs
					.iter()
					.map(|(index, item)| (*index, transform(item)))
					.collect(),
			),
			CollectionAction::RemoveAtIndices(pairs) => CollectionAction::RemoveAtIndices(
				pairs
					.iter()
					.map(|(index, item)| (*index, transform(item)))
					.collect(),
			),
			CollectionAction::SetAt {
				index,
				old_item,
				new_item,
			} => CollectionAction::SetAt {
				index: *index,
				old_item: transform(old_item),
				new_item: transform(new_item),
			},
			CollectionAction::SliceSet {
				index,
				old_items,
				new_items,
			} => CollectionAction::SliceSet {
				index: *index,
				old_items: old_items.iter().map(transform).collect(),
				new_items: new_items.iter().map(transform).collect(),
			},
			CollectionAction::SetAtIndices(replaces) => CollectionAction::SetAtIndices(
				replaces
					.iter()
					.map(|replace| IndexedReplace {
						index: replace.index,
						old_item: transform(&replace.old_item),
						new_item: transform(&replace.new_item),
					})
					.collect(),
			),
			CollectionAction::Changed { old_item, new_item } => CollectionAction::Changed {
				old_item: transform(old_item),
				new_item: transform(new_item),
			},
		}
	}
}
