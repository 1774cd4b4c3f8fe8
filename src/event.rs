use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::ObserveError;

/// Identifies one subscription on one channel. Returned by every
/// `observe`-flavored method; the only way to unsubscribe explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

enum CallbackRef<F: ?Sized> {
	Strong(Rc<F>),
	Weak(Weak<F>),
}

impl<F: ?Sized> Clone for CallbackRef<F> {
	fn clone(&self) -> Self {
		match self {
			CallbackRef::Strong(rc) => CallbackRef::Strong(rc.clone()),
			CallbackRef::Weak(weak) => CallbackRef::Weak(weak.clone()),
		}
	}
}

impl<F: ?Sized> CallbackRef<F> {
	fn upgrade(&self) -> Option<Rc<F>> {
		match self {
			CallbackRef::Strong(rc) => Some(rc.clone()),
			CallbackRef::Weak(weak) => weak.upgrade(),
		}
	}

	fn is_alive(&self) -> bool {
		match self {
			CallbackRef::Strong(_) => true,
			CallbackRef::Weak(weak) => weak.strong_count() > 0,
		}
	}
}

struct Entry<F: ?Sized> {
	id: u64,
	remaining: Cell<Option<usize>>,
	callback: CallbackRef<F>,
}

/// Shared bookkeeping behind every channel type: registration order,
/// call budgets, weak-reference reaping and a re-entrancy tolerant
/// emission loop.
pub(crate) struct Subscriptions<F: ?Sized> {
	entries: RefCell<Vec<Entry<F>>>,
	next_id: Cell<u64>,
}

impl<F: ?Sized> Subscriptions<F> {
	pub(crate) fn new() -> Self {
		Subscriptions {
			entries: RefCell::new(Vec::new()),
			next_id: Cell::new(0),
		}
	}

	fn push(&self, callback: CallbackRef<F>, times: Option<usize>) -> SubscriberId {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.entries.borrow_mut().push(Entry {
			id,
			remaining: Cell::new(times),
			callback,
		});
		SubscriberId(id)
	}

	pub(crate) fn subscribe(&self, callback: Rc<F>, times: Option<usize>) -> SubscriberId {
		self.push(CallbackRef::Strong(callback), times)
	}

	pub(crate) fn subscribe_weak(&self, callback: &Rc<F>, times: Option<usize>) -> SubscriberId {
		self.push(CallbackRef::Weak(Rc::downgrade(callback)), times)
	}

	pub(crate) fn unsubscribe(&self, id: SubscriberId) -> Result<(), ObserveError> {
		let mut entries = self.entries.borrow_mut();
		match entries.iter().position(|entry| entry.id == id.0) {
			Some(index) => {
				entries.remove(index);
				Ok(())
			}
			None => Err(ObserveError::NotSubscribed),
		}
	}

	pub(crate) fn is_observed(&self) -> bool {
		self.entries
			.borrow()
			.iter()
			.any(|entry| entry.callback.is_alive())
	}

	fn remove_by_id(&self, id: u64) {
		let mut entries = self.entries.borrow_mut();
		if let Some(index) = entries.iter().position(|entry| entry.id == id) {
			entries.remove(index);
		}
	}

	/// Invokes every subscription in registration order. Dead weak
	/// references and exhausted call budgets are removed in place without
	/// aborting the rest of the pass. Observers may add or remove
	/// subscriptions (including their own) mid-emission; no borrow is held
	/// while an observer runs.
	pub(crate) fn emit_with(&self, invoke: impl Fn(&F)) {
		let mut cursor = 0usize;
		loop {
			let (id, callback, remaining) = {
				let entries = self.entries.borrow();
				match entries.get(cursor) {
					Some(entry) => (entry.id, entry.callback.clone(), entry.remaining.get()),
					None => break,
				}
			};
			if remaining == Some(0) {
				self.remove_by_id(id);
				continue;
			}
			let target = match callback.upgrade() {
				Some(target) => target,
				None => {
					self.remove_by_id(id);
					continue;
				}
			};
			invoke(&target);
			let exhausted = {
				let entries = self.entries.borrow();
				match entries.iter().find(|entry| entry.id == id) {
					Some(entry) => match entry.remaining.get() {
						Some(left) => {
							entry.remaining.set(Some(left.saturating_sub(1)));
							left <= 1
						}
						None => false,
					},
					None => false,
				}
			};
			if exhausted {
				self.remove_by_id(id);
			}
			// Ids are monotonic and the vector stays in registration
			// order, so the next entry due is the first with a greater id.
			// This holds however many entries the observer removed,
			// including itself.
			let entries = self.entries.borrow();
			cursor = entries
				.iter()
				.position(|entry| entry.id > id)
				.unwrap_or(entries.len());
		}
	}
}

/// Observer of a value-change channel. The variants are the accepted
/// argument prefixes of the `(new, old)` payload; picking a variant fixes
/// the arity statically, so there is no such thing as an observer asking
/// for more arguments than the channel carries.
pub enum ChangeObserver<T> {
	Unit(Box<dyn Fn()>),
	NewValue(Box<dyn Fn(&T)>),
	NewAndOld(Box<dyn Fn(&T, &T)>),
}

impl<T> ChangeObserver<T> {
	pub fn unit(callback: impl Fn() + 'static) -> Self {
		ChangeObserver::Unit(Box::new(callback))
	}

	pub fn new_value(callback: impl Fn(&T) + 'static) -> Self {
		ChangeObserver::NewValue(Box::new(callback))
	}

	pub fn new_and_old(callback: impl Fn(&T, &T) + 'static) -> Self {
		ChangeObserver::NewAndOld(Box::new(callback))
	}

	fn call(&self, new: &T, old: &T) {
		match self {
			ChangeObserver::Unit(callback) => callback(),
			ChangeObserver::NewValue(callback) => callback(new),
			ChangeObserver::NewAndOld(callback) => callback(new, old),
		}
	}
}

/// Change-notification channel of a `Value`: emits `(new, old)` whenever
/// the cached value is replaced by an unequal one.
pub struct ChangeEvent<T> {
	subs: Rc<Subscriptions<ChangeObserver<T>>>,
}

impl<T> Clone for ChangeEvent<T> {
	fn clone(&self) -> Self {
		ChangeEvent {
			subs: self.subs.clone(),
		}
	}
}

impl<T: 'static> Default for ChangeEvent<T> {
	fn default() -> Self {
		ChangeEvent::new()
	}
}

impl<T: 'static> ChangeEvent<T> {
	pub fn new() -> Self {
		ChangeEvent {
			subs: Rc::new(Subscriptions::new()),
		}
	}

	pub fn observe(&self, observer: ChangeObserver<T>) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), None)
	}

	/// Strong subscription that self-removes after `times` invocations.
	pub fn observe_times(&self, observer: ChangeObserver<T>, times: usize) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), Some(times))
	}

	/// Stores only a weak reference; the caller's `Rc` is the
	/// subscription's lifeline. Once it drops, the subscription is reaped
	/// silently during the next emission.
	pub fn weak_observe(&self, observer: &Rc<ChangeObserver<T>>) -> SubscriberId {
		self.subs.subscribe_weak(observer, None)
	}

	pub fn weak_observe_times(
		&self,
		observer: &Rc<ChangeObserver<T>>,
		times: usize,
	) -> SubscriberId {
		self.subs.subscribe_weak(observer, Some(times))
	}

	pub fn unobserve(&self, id: SubscriberId) -> Result<(), ObserveError> {
		self.subs.unsubscribe(id)
	}

	pub fn is_observed(&self) -> bool {
		self.subs.is_observed()
	}

	pub(crate) fn emit(&self, new: &T, old: &T) {
		self.subs.emit_with(|observer| observer.call(new, old));
	}
}

/// Observer of a whole-action channel.
pub enum ActionObserver<A> {
	Unit(Box<dyn Fn()>),
	Action(Box<dyn Fn(&A)>),
}

impl<A> ActionObserver<A> {
	pub fn unit(callback: impl Fn() + 'static) -> Self {
		ActionObserver::Unit(Box::new(callback))
	}

	pub fn action(callback: impl Fn(&A) + 'static) -> Self {
		ActionObserver::Action(Box::new(callback))
	}

	fn call(&self, action: &A) {
		match self {
			ActionObserver::Unit(callback) => callback(),
			ActionObserver::Action(callback) => callback(action),
		}
	}
}

/// Whole-action channel of an observable collection: one call per
/// structural mutation, carrying the typed action that describes it.
pub struct ActionEvent<A> {
	subs: Rc<Subscriptions<ActionObserver<A>>>,
}

impl<A> Clone for ActionEvent<A> {
	fn clone(&self) -> Self {
		ActionEvent {
			subs: self.subs.clone(),
		}
	}
}

impl<A: 'static> Default for ActionEvent<A> {
	fn default() -> Self {
		ActionEvent::new()
	}
}

impl<A: 'static> ActionEvent<A> {
	pub fn new() -> Self {
		ActionEvent {
			subs: Rc::new(Subscriptions::new()),
		}
	}

	pub fn observe(&self, observer: ActionObserver<A>) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), None)
	}

	pub fn observe_times(&self, observer: ActionObserver<A>, times: usize) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), Some(times))
	}

	pub fn weak_observe(&self, observer: &Rc<ActionObserver<A>>) -> SubscriberId {
		self.subs.subscribe_weak(observer, None)
	}

	pub fn weak_observe_times(
		&self,
		observer: &Rc<ActionObserver<A>>,
		times: usize,
	) -> SubscriberId {
		self.subs.subscribe_weak(observer, Some(times))
	}

	pub fn unobserve(&self, id: SubscriberId) -> Result<(), ObserveError> {
		self.subs.unsubscribe(id)
	}

	pub fn is_observed(&self) -> bool {
		self.subs.is_observed()
	}

	pub(crate) fn emit(&self, action: &A) {
		self.subs.emit_with(|observer| observer.call(action));
	}
}

/// Observer of a flattened delta channel. `Batch` sees a whole mutation's
/// deltas in one call; `Each` is the per-element rendition of the same
/// stream: a batch of n deltas arrives as n single calls.
pub enum DeltaObserver<D> {
	Unit(Box<dyn Fn()>),
	Batch(Box<dyn Fn(&[D])>),
	Each(Box<dyn Fn(&D)>),
}

impl<D> DeltaObserver<D> {
	pub fn unit(callback: impl Fn() + 'static) -> Self {
		DeltaObserver::Unit(Box::new(callback))
	}

	pub fn batch(callback: impl Fn(&[D]) + 'static) -> Self {
		DeltaObserver::Batch(Box::new(callback))
	}

	pub fn each(callback: impl Fn(&D) + 'static) -> Self {
		DeltaObserver::Each(Box::new(callback))
	}

	fn call(&self, batch: &[D]) {
		match self {
			DeltaObserver::Unit(callback) => callback(),
			DeltaObserver::Batch(callback) => callback(batch),
			DeltaObserver::Each(callback) => {
				for delta in batch {
					callback(delta);
				}
			}
		}
	}
}

/// Per-delta channel of an observable collection. Carries the flattened
/// single-element expansion of every structural mutation.
pub struct DeltaEvent<D> {
	subs: Rc<Subscriptions<DeltaObserver<D>>>,
}

impl<D> Clone for DeltaEvent<D> {
	fn clone(&self) -> Self {
		DeltaEvent {
			subs: self.subs.clone(),
		}
	}
}

impl<D: 'static> Default for DeltaEvent<D> {
	fn default() -> Self {
		DeltaEvent::new()
	}
}

impl<D: 'static> DeltaEvent<D> {
	pub fn new() -> Self {
		DeltaEvent {
			subs: Rc::new(Subscriptions::new()),
		}
	}

	pub fn observe(&self, observer: DeltaObserver<D>) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), None)
	}

	pub fn observe_times(&self, observer: DeltaObserver<D>, times: usize) -> SubscriberId {
		self.subs.subscribe(Rc::new(observer), Some(times))
	}

	pub fn weak_observe(&self, observer: &Rc<DeltaObserver<D>>) -> SubscriberId {
		self.subs.subscribe_weak(observer, None)
	}

	pub fn weak_observe_times(&self, observer: &Rc<DeltaObserver<D>>, times: usize) -> SubscriberId {
		self.subs.subscribe_weak(observer, Some(times))
	}

	pub fn unobserve(&self, id: SubscriberId) -> Result<(), ObserveError> {
		self.subs.unsubscribe(id)
	}

	pub fn is_observed(&self) -> bool {
		self.subs.is_observed()
	}

	pub(crate) fn emit(&self, batch: &[D]) {
		self.subs.emit_with(|observer| observer.call(batch));
	}
}
