use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use mockall::predicate::eq;
use tether::{
	derive2, derive_associative, derive_many, select, AssocOp, BindError, ChangeObserver, Const,
	ObserveError, Operand, Var,
};

mod mock;

use mock::Spy;

#[test]
fn derived_updates_once_per_write() {
	let v = Var::new(3i64);
	let d = v.value().map(|x| x * 2);
	assert_eq!(d.get(), 6);

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(10))
		.times(1)
		.return_const(());

	d.observe(ChangeObserver::new_value({
		let mock = mock.clone();
		move |new: &i64| mock.get().trigger(*new)
	}));

	v.set(5);
	assert_eq!(d.get(), 10);

	mock.get().checkpoint();
}

#[test]
fn writes_without_change_are_silent() {
	let v = Var::new(3i64);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());

	v.observe(ChangeObserver::unit({
		let mock = mock.clone();
		move || mock.get().trigger(0)
	}));

	v.set(3);

	mock.get().checkpoint();
}

#[test]
fn reads_are_cached() {
	let calls = Rc::new(Cell::new(0));
	let v = Var::new(2i64);
	let d = v.value().map({
		let calls = calls.clone();
		move |x| {
			calls.set(calls.get() + 1);
			x + 1
		}
	});

	assert_eq!(d.get(), 3);
	assert_eq!(d.get(), 3);
	assert_eq!(calls.get(), 1);

	v.set(4);
	assert_eq!(d.get(), 5);
	assert_eq!(d.get(), 5);
	assert_eq!(calls.get(), 2);
}

#[test]
fn binding_mirrors_source() {
	let a = Var::new(1i64);
	let b = Var::new(9i64);

	b.bind(&a.value()).unwrap();
	assert_eq!(b.get(), 1);
	assert!(b.is_bound());

	a.set(5);
	assert_eq!(b.get(), 5);

	b.unbind().unwrap();
	a.set(7);
	assert_eq!(b.get(), 5);

	b.set(2);
	assert_eq!(b.get(), 2);
}

#[test]
#[should_panic(expected = "bound")]
fn writing_a_bound_variable_panics() {
	let a = Var::new(1i64);
	let b = Var::new(2i64);
	b.bind(&a.value()).unwrap();
	b.set(3);
}

#[test]
fn cyclic_bindings_are_rejected() {
	let a = Var::new(1i64);
	let d = a.value().map(|x| x + 1);

	assert_eq!(a.bind(&d), Err(BindError::Cycle));
	assert_eq!(a.get(), 1);
	assert!(!a.is_bound());

	let b = Var::new(0i64);
	assert_eq!(b.bind(&b.value()), Err(BindError::SelfBind));
}

#[test]
fn rebinding_rules() {
	let a = Var::new(1i64);
	let b = Var::new(2i64);
	let target = Var::new(0i64);

	target.bind(&a.value()).unwrap();
	assert_eq!(target.bind(&b.value()), Err(BindError::AlreadyBound));

	// Binding again to the same source is a no-op.
	target.bind(&a.value()).unwrap();

	target.rebind(&b.value()).unwrap();
	assert_eq!(target.get(), 2);

	a.set(9);
	assert_eq!(target.get(), 2);

	assert_eq!(target.unbind(), Ok(()));
	assert_eq!(target.unbind(), Err(BindError::NotBound));
}

#[test]
fn constants_fold() {
	let c = Const::of(4i64);
	assert_eq!(c.constant(), Some(4));

	let d = c.map(|x| x * 3);
	assert_eq!(d.constant(), Some(12));

	let s = derive2(c.clone(), 5i64, |a, b| a + b);
	assert_eq!(s.constant(), Some(9));
}

#[test]
fn derivations_over_many_operands() {
	let a = Var::new(2i64);
	let b = Var::new(3i64);

	let product = derive2(a.value(), b.value(), |a: &i64, b: &i64| a * b);
	assert_eq!(product.get(), 6);
	a.set(4);
	assert_eq!(product.get(), 12);

	let total = derive_many(
		vec![
			Operand::from(a.value()),
			Operand::from(b.value()),
			Operand::Plain(10),
		],
		|xs: &[i64]| xs.iter().sum::<i64>(),
	);
	assert_eq!(total.get(), 17);
	b.set(5);
	assert_eq!(total.get(), 19);
}

#[test]
fn associative_derivations_flatten() {
	let a = Var::new(1i64);
	let b = Var::new(2i64);
	let c = Var::new(3i64);
	let sum = AssocOp::new(|xs: &[i64]| xs.iter().sum());

	let inner = derive_associative(
		sum.clone(),
		vec![Operand::from(a.value()), Operand::from(b.value())],
	);
	let outer = derive_associative(
		sum.clone(),
		vec![Operand::from(inner), Operand::from(c.value())],
	);

	assert_eq!(outer.get(), 6);
	assert_eq!(outer.derived_from().len(), 3);

	a.set(10);
	assert_eq!(outer.get(), 15);

	// Adjacent constant operands pre-fold into one.
	let folded = derive_associative(
		sum,
		vec![
			Operand::Plain(2),
			Operand::Plain(3),
			Operand::from(a.value()),
		],
	);
	assert_eq!(folded.derived_from().len(), 1);
	assert_eq!(folded.get(), 15);
}

#[test]
fn select_tracks_its_condition() {
	let cond = Var::new(true);
	let picked = select(cond.value(), 1i64, 2i64);
	assert_eq!(picked.get(), 1);

	cond.set(false);
	assert_eq!(picked.get(), 2);

	cond.toggle();
	assert_eq!(picked.get(), 1);
}

#[test]
fn weak_observers_die_with_their_callback() {
	let v = Var::new(1i64);

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(2))
		.times(1)
		.return_const(());

	let listener = Rc::new(ChangeObserver::new_value({
		let mock = mock.clone();
		move |new: &i64| mock.get().trigger(*new)
	}));
	v.value().weak_observe(&listener);

	v.set(2);
	assert!(v.is_observed());

	drop(listener);
	assert!(!v.is_observed());

	v.set(3);
	mock.get().checkpoint();
}

#[test]
fn call_budgets_expire() {
	let v = Var::new(0i64);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(2).return_const(());

	v.value().observe_times(
		ChangeObserver::unit({
			let mock = mock.clone();
			move || mock.get().trigger(0)
		}),
		2,
	);

	v.set(1);
	v.set(2);
	v.set(3);
	mock.get().checkpoint();

	// A budget of zero is discarded without ever being invoked.
	mock.get().expect_trigger().times(0).return_const(());
	v.value().observe_times(
		ChangeObserver::unit({
			let mock = mock.clone();
			move || mock.get().trigger(0)
		}),
		0,
	);
	v.set(4);
	mock.get().checkpoint();
}

#[test]
fn observers_may_unsubscribe_mid_emission() {
	let v = Var::new(0i64);
	let event = v.on_change();

	let hits = Rc::new(Cell::new(0));
	let id_cell = Rc::new(Cell::new(None));
	let id = event.observe(ChangeObserver::unit({
		let event = event.clone();
		let id_cell = id_cell.clone();
		let hits = hits.clone();
		move || {
			hits.set(hits.get() + 1);
			if let Some(id) = id_cell.get() {
				let _ = event.unobserve(id);
			}
		}
	}));
	id_cell.set(Some(id));

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(2).return_const(());
	event.observe(ChangeObserver::unit({
		let mock = mock.clone();
		move || mock.get().trigger(0)
	}));

	v.set(1);
	v.set(2);

	assert_eq!(hits.get(), 1);
	mock.get().checkpoint();
}

#[test]
fn removing_earlier_observers_and_itself_skips_nobody() {
	let v = Var::new(0i64);
	let event = v.on_change();

	// A is passive; B removes both A and itself mid-emission; C must
	// still run every time.
	let a = event.observe(ChangeObserver::unit(|| {}));
	let ids = Rc::new(Cell::new(None));
	let b = event.observe(ChangeObserver::unit({
		let event = event.clone();
		let ids = ids.clone();
		move || {
			if let Some((a, b)) = ids.get() {
				let _ = event.unobserve(a);
				let _ = event.unobserve(b);
			}
		}
	}));
	ids.set(Some((a, b)));

	let c_hits = Rc::new(Cell::new(0));
	event.observe(ChangeObserver::unit({
		let c_hits = c_hits.clone();
		move || c_hits.set(c_hits.get() + 1)
	}));

	v.set(1);
	assert_eq!(c_hits.get(), 1);
	v.set(2);
	assert_eq!(c_hits.get(), 2);
}

#[test]
fn unsubscribing_twice_fails() {
	let v = Var::new(1i64);
	let id = v.value().observe(ChangeObserver::unit(|| {}));

	assert_eq!(v.value().unobserve(id), Ok(()));
	assert_eq!(v.value().unobserve(id), Err(ObserveError::NotSubscribed));
}

#[test]
fn variable_conveniences() {
	let flag = Var::new(false);
	flag.toggle();
	assert!(flag.get());

	let n = Var::new(10i64);
	n.update(|x| *x += 5);
	assert_eq!(n.get(), 15);

	assert_eq!(n.replace(20), 15);
	assert_eq!(n.get(), 20);
}

#[test]
fn dependency_graph_is_reachable() {
	let a = Var::new(1i64);
	let b = Var::new(2i64);
	let s = derive2(a.value(), b.value(), |a: &i64, b: &i64| a + b);
	let d = s.map(|x| x * 2);

	assert_eq!(d.derived_from().len(), 1);
	assert_eq!(d.deep_derived_from().len(), 3);
	assert!(d.is_dependent_on(&a.value().node()));
	assert!(!a.value().is_dependent_on(&d.node()));
}

#[test]
fn observing_during_emission_runs_later_observers() {
	let v = Var::new(0i64);
	let event = v.on_change();

	let late = Rc::new(Cell::new(0));
	event.observe(ChangeObserver::unit({
		let event = event.clone();
		let late = late.clone();
		let added = Rc::new(Cell::new(false));
		move || {
			if !added.get() {
				added.set(true);
				let late = late.clone();
				event.observe(ChangeObserver::unit(move || late.set(late.get() + 1)));
			}
		}
	}));

	v.set(1);
	assert_eq!(late.get(), 1);
	v.set(2);
	assert_eq!(late.get(), 2);
}

#[test]
fn capture_macro_builds_observers() {
	let v = Var::new(1i64);
	let seen = Rc::new(RefCell::new(Vec::new()));

	v.observe(tether::on_change!((seen) new => {
		seen.borrow_mut().push(*new);
	}));

	v.set(2);
	v.set(3);
	assert_eq!(*seen.borrow(), vec![2, 3]);
}

#[test]
fn collected_payloads_carry_old_and_new() {
	let v = Var::new(1i64);
	let seen: Rc<RefCell<Vec<(i64, i64)>>> = Rc::new(RefCell::new(Vec::new()));

	v.observe(ChangeObserver::new_and_old({
		let seen = seen.clone();
		move |new: &i64, old: &i64| seen.borrow_mut().push((*new, *old))
	}));

	v.set(2);
	v.set(5);
	assert_eq!(*seen.borrow(), vec![(2, 1), (5, 2)]);
}
