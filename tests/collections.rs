use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether::{
	ActionObserver, ChangeObserver, CollectionAction, CollectionError, Delta, DeltaObserver,
	ObservableCollection, ObservableList, ValueList, Var,
};

mod mock;

use mock::Spy;

fn collect_actions<T: PartialEq + Clone + 'static>(
	list: &impl ObservableCollection<T>,
) -> Rc<RefCell<Vec<CollectionAction<T>>>> {
	let actions = Rc::new(RefCell::new(Vec::new()));
	list.on_change().observe(ActionObserver::action({
		let actions = actions.clone();
		move |action: &CollectionAction<T>| actions.borrow_mut().push(action.clone())
	}));
	actions
}

fn collect_deltas<T: PartialEq + Clone + 'static>(
	list: &impl ObservableCollection<T>,
) -> Rc<RefCell<Vec<Delta<T>>>> {
	let deltas = Rc::new(RefCell::new(Vec::new()));
	list.delta_event().observe(DeltaObserver::each({
		let deltas = deltas.clone();
		move |delta: &Delta<T>| deltas.borrow_mut().push(delta.clone())
	}));
	deltas
}

#[test]
fn list_emits_one_action_per_mutation() {
	let list = ObservableList::new();
	let actions = collect_actions(&list);
	let deltas = collect_deltas(&list);

	list.push(1i64);
	list.push(3);
	list.insert(1, 2);

	assert_eq!(list.snapshot(), vec![1, 2, 3]);
	assert_eq!(
		*actions.borrow(),
		vec![
			CollectionAction::Delta(Delta::Insert { index: 0, item: 1 }),
			CollectionAction::Delta(Delta::Insert { index: 1, item: 3 }),
			CollectionAction::Delta(Delta::Insert { index: 1, item: 2 }),
		]
	);
	assert_eq!(deltas.borrow().len(), 3);
}

#[test]
fn batch_insert_renumbers_indices() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3, 4]);
	let actions = collect_actions(&list);
	let deltas = collect_deltas(&list);

	list.insert_all(vec![(3, 5), (1, 4)]);

	assert_eq!(list.snapshot(), vec![1, 4, 2, 3, 5, 4]);
	assert_eq!(
		*actions.borrow(),
		vec![CollectionAction::InsertAll(vec![(1, 4), (3, 5)])]
	);
	// Each emitted index is valid at its own application point.
	assert_eq!(
		*deltas.borrow(),
		vec![
			Delta::Insert { index: 1, item: 4 },
			Delta::Insert { index: 4, item: 5 },
		]
	);
}

#[test]
fn batch_removal_renumbers_indices() {
	let list = ObservableList::from_vec(vec![10i64, 20, 30, 40, 50]);
	let deltas = collect_deltas(&list);

	list.remove_indices(vec![4, 1]);

	assert_eq!(list.snapshot(), vec![10, 30, 40]);
	assert_eq!(
		*deltas.borrow(),
		vec![
			Delta::RemoveAt { index: 1, item: 20 },
			Delta::RemoveAt { index: 3, item: 50 },
		]
	);
}

#[test]
fn removal_by_value_is_duplicate_aware() {
	let list = ObservableList::from_vec(vec![1i64, 2, 1, 3]);

	assert_eq!(list.remove_all(&[1, 1]), Ok(()));
	assert_eq!(list.snapshot(), vec![2, 3]);

	// Not enough occurrences: nothing is removed.
	assert_eq!(list.remove_all(&[2, 2]), Err(CollectionError::NotFound));
	assert_eq!(list.snapshot(), vec![2, 3]);

	assert_eq!(list.remove_first(&9), Err(CollectionError::NotFound));
	assert_eq!(list.remove_first(&3), Ok(()));
	assert_eq!(list.snapshot(), vec![2]);
}

#[test]
fn positional_replacement() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3, 4]);
	let actions = collect_actions(&list);

	assert_eq!(list.set(2, 9), 3);
	assert_eq!(list.snapshot(), vec![1, 2, 9, 4]);

	// Equal lengths replace in place, unequal lengths splice.
	list.set_slice(1..3, vec![7, 8]);
	assert_eq!(list.snapshot(), vec![1, 7, 8, 4]);

	list.set_slice(1..3, vec![5]);
	assert_eq!(list.snapshot(), vec![1, 5, 4]);

	let actions = actions.borrow();
	assert!(matches!(actions[0], CollectionAction::SetAt { .. }));
	assert!(matches!(actions[1], CollectionAction::SetAtIndices(_)));
	assert!(matches!(actions[2], CollectionAction::SliceSet { .. }));
}

#[test]
fn reverse_and_clear_expand_for_delta_observers() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3]);
	let actions = collect_actions(&list);
	let deltas = collect_deltas(&list);

	list.reverse();
	assert_eq!(list.snapshot(), vec![3, 2, 1]);
	assert_eq!(*actions.borrow(), vec![CollectionAction::Reverse]);
	assert_eq!(
		*deltas.borrow(),
		vec![
			Delta::RemoveAt { index: 0, item: 1 },
			Delta::RemoveAt { index: 0, item: 2 },
			Delta::RemoveAt { index: 0, item: 3 },
			Delta::Insert { index: 0, item: 3 },
			Delta::Insert { index: 1, item: 2 },
			Delta::Insert { index: 2, item: 1 },
		]
	);

	// Reversing twice restores the original order.
	list.reverse();
	assert_eq!(list.snapshot(), vec![1, 2, 3]);
	list.reverse();

	deltas.borrow_mut().clear();
	list.clear();
	assert!(list.is_empty());
	assert_eq!(actions.borrow().last(), Some(&CollectionAction::Clear));
	assert_eq!(
		*deltas.borrow(),
		vec![
			Delta::RemoveAt { index: 0, item: 3 },
			Delta::RemoveAt { index: 0, item: 2 },
			Delta::RemoveAt { index: 0, item: 1 },
		]
	);
}

#[test]
fn length_observers_fire_after_structural_ones() {
	let list: ObservableList<i64> = ObservableList::new();
	let order = Rc::new(RefCell::new(Vec::new()));

	list.len_value().observe(ChangeObserver::unit({
		let order = order.clone();
		let list = list.clone();
		move || {
			// The collection is already updated by the time length
			// observers run.
			assert_eq!(list.len(), 1);
			order.borrow_mut().push("len");
		}
	}));
	list.on_change().observe(ActionObserver::unit({
		let order = order.clone();
		let list = list.clone();
		move || {
			// Structural observers already see the new length value.
			assert_eq!(list.len_value().get(), 1);
			order.borrow_mut().push("action");
		}
	}));

	list.push(1);
	assert_eq!(*order.borrow(), vec!["action", "len"]);
}

#[test]
fn repeat_and_extend() {
	let list = ObservableList::from_vec(vec![1i64, 2]);
	let actions = collect_actions(&list);

	list.extend(vec![3, 4]);
	assert_eq!(list.snapshot(), vec![1, 2, 3, 4]);
	assert_eq!(
		actions.borrow()[0],
		CollectionAction::Extend {
			old_len: 2,
			items: vec![3, 4],
		}
	);

	list.repeat(2);
	assert_eq!(list.snapshot(), vec![1, 2, 3, 4, 1, 2, 3, 4]);

	list.repeat(0);
	assert!(list.is_empty());
}

#[test]
fn reduce_updates_incrementally() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3]);
	let sum = list.reduce(0i64, |acc, x| acc + x, |acc, x| acc - x);
	assert_eq!(sum.get(), 6);

	list.push(4);
	assert_eq!(sum.get(), 10);

	list.remove_at(0);
	assert_eq!(sum.get(), 9);

	// Permutations never touch the fold.
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());
	sum.observe(ChangeObserver::unit({
		let mock = mock.clone();
		move || mock.get().trigger(0)
	}));
	list.reverse();
	assert_eq!(sum.get(), 9);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	list.clear();
	assert_eq!(sum.get(), 0);
	mock.get().checkpoint();
}

#[test]
fn combine_recomputes_from_snapshots() {
	let list = ObservableList::from_vec(vec![3i64, 1]);
	let max = list.combine(|xs: &[i64]| xs.iter().copied().max().unwrap_or(0));
	assert_eq!(max.get(), 3);

	list.extend(vec![5, 2]);
	assert_eq!(max.get(), 5);

	// No inverse needed: removal of the maximum still recomputes.
	list.remove_first(&5).unwrap();
	assert_eq!(max.get(), 3);

	list.clear();
	assert_eq!(max.get(), 0);
}

#[test]
fn mapped_bag_counts_elements() {
	let list = ObservableList::from_vec(vec![1i64, 2, 2]);
	let bag = list.map(|x| x * 2);

	assert_eq!(bag.len(), 3);
	assert_eq!(bag.count_of(&4), 2);
	assert!(bag.contains(&2));

	list.push(2);
	assert_eq!(bag.count_of(&4), 3);

	list.remove_at(1);
	assert_eq!(bag.count_of(&4), 2);
	assert_eq!(bag.len_value().get(), 3);

	// Permutations of the source are invisible to the bag.
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());
	bag.on_change().observe(ActionObserver::unit({
		let mock = mock.clone();
		move || mock.get().trigger(0)
	}));
	list.reverse();
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	list.clear();
	assert_eq!(bag.len(), 0);
	assert!(!bag.contains(&4));
	mock.get().checkpoint();
}

#[test]
fn filtered_bag_applies_its_predicate() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3, 4]);
	let evens = list.filter(|x| x % 2 == 0);

	assert_eq!(evens.len(), 2);
	assert!(evens.contains(&2));
	assert!(!evens.contains(&3));

	list.push(6);
	assert_eq!(evens.len(), 3);

	// Removing a non-passing element leaves the bag alone.
	list.remove_first(&1).unwrap();
	assert_eq!(evens.len(), 3);

	list.remove_first(&2).unwrap();
	assert_eq!(evens.len(), 2);
	assert_eq!(evens.count_of(&2), 0);
}

#[test]
fn mapped_sequence_mirrors_order() {
	let list = ObservableList::from_vec(vec![1i64, 2, 3]);
	let seq = list.map_sequence(|x| x * 10);

	assert_eq!(seq.snapshot(), vec![10, 20, 30]);

	list.insert(1, 9);
	assert_eq!(seq.snapshot(), vec![10, 90, 20, 30]);

	list.reverse();
	assert_eq!(seq.snapshot(), vec![30, 20, 90, 10]);

	list.set(0, 5);
	assert_eq!(seq.snapshot(), vec![50, 20, 90, 10]);

	list.clear();
	assert!(seq.is_empty());
	assert_eq!(seq.len_value().get(), 0);
}

#[test]
fn bags_skip_removals_they_never_counted() {
	// The transform drifts over time, so a removal can map to a value
	// the bag never counted; it is skipped and counts stay consistent.
	let factor = Rc::new(Cell::new(1i64));
	let list = ObservableList::from_vec(vec![3i64]);
	let bag = list.map({
		let factor = factor.clone();
		move |x| x * factor.get()
	});
	assert_eq!(bag.count_of(&3), 1);

	factor.set(2);
	list.remove_at(0);
	assert_eq!(bag.len(), 1);
	assert_eq!(bag.count_of(&3), 1);
	assert_eq!(bag.count_of(&6), 0);

	// Same for a predicate that starts passing an element only after it
	// was inserted.
	let threshold = Rc::new(Cell::new(10i64));
	let list = ObservableList::from_vec(vec![4i64]);
	let passing = list.filter({
		let threshold = threshold.clone();
		move |x| *x > threshold.get()
	});
	assert_eq!(passing.len(), 0);

	threshold.set(0);
	list.remove_at(0);
	assert_eq!(passing.len(), 0);
	assert!(!passing.contains(&4));
}

#[test]
fn mapped_sequences_follow_element_changes() {
	let a = Var::new(1i64);
	let values = ValueList::new();
	values.push(a.value());
	values.push(2);

	let seq = values.map_sequence(|x| x * 10);
	assert_eq!(seq.snapshot(), vec![10, 20]);

	a.set(5);
	assert_eq!(seq.snapshot(), vec![50, 20]);
	assert_eq!(seq.len_value().get(), 2);
}

#[test]
fn value_list_surfaces_element_changes() {
	let v = Var::new(3i64);
	let values: ValueList<i64> = ValueList::new();
	values.push(v.value());
	values.push(5);
	assert_eq!(values.snapshot(), vec![3, 5]);

	let actions = collect_actions(&values);
	let changed: Rc<RefCell<Vec<(i64, i64)>>> = Rc::new(RefCell::new(Vec::new()));
	values.on_element_changed().observe(ChangeObserver::new_and_old({
		let changed = changed.clone();
		move |new: &i64, old: &i64| changed.borrow_mut().push((*new, *old))
	}));

	v.set(7);
	assert_eq!(values.snapshot(), vec![7, 5]);
	assert_eq!(values.len(), 2);
	assert_eq!(
		actions.borrow().last(),
		Some(&CollectionAction::Changed {
			old_item: 3,
			new_item: 7,
		})
	);
	assert_eq!(*changed.borrow(), vec![(7, 3)]);

	// Structural actions carry the current contents.
	let popped = values.remove_at(1);
	assert_eq!(popped.get(), 5);
	assert_eq!(
		actions.borrow().last(),
		Some(&CollectionAction::Delta(Delta::RemoveAt {
			index: 1,
			item: 5,
		}))
	);

	// A removed value is no longer tracked.
	values.remove_value(&v.value()).unwrap();
	let before = changed.borrow().len();
	v.set(9);
	assert_eq!(changed.borrow().len(), before);
}

#[test]
fn value_list_tracks_each_occurrence() {
	let v = Var::new(1i64);
	let values: ValueList<i64> = ValueList::new();
	values.push(v.value());
	values.push(v.value());

	let changed = Rc::new(RefCell::new(0));
	values.on_element_changed().observe(ChangeObserver::unit({
		let changed = changed.clone();
		move || *changed.borrow_mut() += 1
	}));

	v.set(2);
	assert_eq!(*changed.borrow(), 2);

	values.remove_at(0);
	v.set(3);
	assert_eq!(*changed.borrow(), 3);
}

#[test]
fn value_list_structure() {
	let a = Var::new(1i64);
	let values = ValueList::from_values(vec![a.value(), tether::Const::of(2)]);

	assert_eq!(values.len(), 2);
	assert_eq!(values.get(0), Some(1));
	assert_eq!(values.get_value(1).unwrap().constant(), Some(2));

	values.insert(1, 9);
	assert_eq!(values.snapshot(), vec![1, 9, 2]);

	values.reverse();
	assert_eq!(values.snapshot(), vec![2, 9, 1]);

	assert_eq!(values.set(0, 4).constant(), Some(2));
	assert_eq!(values.snapshot(), vec![4, 9, 1]);

	assert_eq!(values.pop().map(|value| value.get()), Some(1));

	values.clear();
	assert!(values.is_empty());
	assert_eq!(values.len_value().get(), 0);
}

#[test]
fn failed_inserts_leave_no_value_tracked() {
	let v = Var::new(1i64);
	let values: ValueList<i64> = ValueList::new();

	let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
		values.insert(5, v.value());
	}));
	assert!(result.is_err());
	assert!(values.is_empty());

	let changed = Rc::new(Cell::new(0));
	values.on_element_changed().observe(ChangeObserver::unit({
		let changed = changed.clone();
		move || changed.set(changed.get() + 1)
	}));

	v.set(2);
	assert_eq!(changed.get(), 0);
}

#[test]
fn projections_of_value_lists_stay_coherent() {
	let a = Var::new(1i64);
	let values = ValueList::new();
	values.push(a.value());
	values.push(10);

	let sum = values.reduce(0i64, |acc, x| acc + x, |acc, x| acc - x);
	assert_eq!(sum.get(), 11);

	// An element change folds out the old contents and folds in the new.
	a.set(4);
	assert_eq!(sum.get(), 14);

	values.push(5);
	assert_eq!(sum.get(), 19);
}
