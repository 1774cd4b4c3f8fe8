use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::error::BindError;
use crate::event::{ChangeEvent, ChangeObserver, SubscriberId};
use crate::value::{DependencyNode, Value, ValueAccess};

/// A writable reactive value. Holds its own state until bound to a
/// source value, at which point it mirrors the source and rejects direct
/// writes.
pub struct Var<T: PartialEq + Clone + 'static> {
	body: Rc<VarBody<T>>,
}

struct VarBody<T: PartialEq + Clone + 'static> {
	value: RefCell<T>,
	on_change: ChangeEvent<T>,
	bound: RefCell<Option<Binding<T>>>,
	this: Weak<VarBody<T>>,
}

struct Binding<T: PartialEq + Clone + 'static> {
	source: Value<T>,
	subscription: SubscriberId,
	// Lifeline for the weak subscription on the source.
	_listener: Rc<ChangeObserver<T>>,
}

impl<T: PartialEq + Clone + 'static> Clone for Var<T> {
	fn clone(&self) -> Self {
		Var {
			body: self.body.clone(),
		}
	}
}

impl<T: PartialEq + Clone + Default + 'static> Default for Var<T> {
	fn default() -> Self {
		Var::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T: PartialEq + Clone + 'static> Var<T> {
	pub fn new(value: T) -> Self {
		Var {
			body: Rc::new_cyclic(|this| VarBody {
				value: RefCell::new(value),
				on_change: ChangeEvent::new(),
				bound: RefCell::new(None),
				this: this.clone(),
			}),
		}
	}

	/// Read-only handle to this variable.
	pub fn value(&self) -> Value<T> {
		Value::from_access(self.body.clone())
	}

	pub fn get(&self) -> T {
		self.body.value.borrow().clone()
	}

	pub fn on_change(&self) -> ChangeEvent<T> {
		self.body.on_change.clone()
	}

	pub fn observe(&self, observer: ChangeObserver<T>) -> SubscriberId {
		self.body.on_change.observe(observer)
	}

	pub fn is_observed(&self) -> bool {
		self.body.on_change.is_observed()
	}

	pub fn is_bound(&self) -> bool {
		self.body.bound.borrow().is_some()
	}

	/// Writes a new value and notifies observers when it differs from the
	/// current one.
	///
	/// Panics when the variable is bound; a bound variable belongs to its
	/// source.
	pub fn set(&self, value: T) {
		if self.is_bound() {
			panic!("cannot set a variable while it is bound");
		}
		self.body.set_bypass(value);
	}

	pub fn toggle(&self)
	where
		T: Toggle,
	{
		self.update(T::toggle)
	}

	/// Writes the old value back out and returns it.
	pub fn replace(&self, value: T) -> T {
		let old = self.get();
		self.set(value);
		old
	}

	pub fn update(&self, func: impl FnOnce(&mut T)) {
		let mut value = self.get();
		func(&mut value);
		self.set(value);
	}

	/// Makes this variable mirror `source` until unbound. The current
	/// value is overwritten with the source's value immediately.
	///
	/// Fails without changing anything when `source` is this variable,
	/// when binding would close a dependency cycle, or when the variable
	/// is already bound to a different source.
	pub fn bind(&self, source: &Value<T>) -> Result<(), BindError> {
		self.bind_with(source, false)
	}

	/// Like [`bind`](Var::bind), but silently rebinds when the variable is
	/// already bound elsewhere.
	pub fn rebind(&self, source: &Value<T>) -> Result<(), BindError> {
		self.bind_with(source, true)
	}

	fn bind_with(&self, source: &Value<T>, rebind_ok: bool) -> Result<(), BindError> {
		let self_node = self.value().node();
		if Rc::as_ptr(&source.node()) as *const () == Rc::as_ptr(&self_node) as *const () {
			return Err(BindError::SelfBind);
		}
		if source.is_dependent_on(&self_node) {
			return Err(BindError::Cycle);
		}
		if let Some(binding) = self.body.bound.borrow().as_ref() {
			if binding.source == *source {
				return Ok(());
			}
			if !rebind_ok {
				return Err(BindError::AlreadyBound);
			}
		}
		self.unbind_if_bound();

		let body = self.body.this.clone();
		let listener = Rc::new(ChangeObserver::new_value(move |new: &T| {
			if let Some(body) = body.upgrade() {
				body.set_bypass(new.clone());
			}
		}));
		let subscription = source.weak_observe(&listener);
		*self.body.bound.borrow_mut() = Some(Binding {
			source: source.clone(),
			subscription,
			_listener: listener,
		});
		self.body.set_bypass(source.get());
		Ok(())
	}

	/// Detaches from the bound source. The variable keeps the last
	/// mirrored value and becomes writable again.
	pub fn unbind(&self) -> Result<(), BindError> {
		match self.body.bound.borrow_mut().take() {
			Some(binding) => {
				let _ = binding.source.unobserve(binding.subscription);
				Ok(())
			}
			None => Err(BindError::NotBound),
		}
	}

	pub fn unbind_if_bound(&self) {
		let _ = self.unbind();
	}

	/// Silent write followed by `during`, with the change notification
	/// emitted only afterwards. Lets a containing structure update its
	/// own observers before this variable's observers see the new value.
	pub(crate) fn set_notify_after(&self, value: T, during: impl FnOnce()) {
		let old = {
			let mut current = self.body.value.borrow_mut();
			if *current == value {
				None
			} else {
				Some(std::mem::replace(&mut *current, value.clone()))
			}
		};
		during();
		if let Some(old) = old {
			self.body.on_change.emit(&value, &old);
		}
	}
}

impl<T: PartialEq + Clone + 'static> VarBody<T> {
	/// Write that ignores the bound state. Used by the binding listener
	/// itself and by internal owners of the variable.
	fn set_bypass(&self, value: T) {
		let old = {
			let mut current = self.value.borrow_mut();
			if *current == value {
				return;
			}
			std::mem::replace(&mut *current, value.clone())
		};
		// No borrow is held here; observers may read the variable freely.
		self.on_change.emit(&value, &old);
	}
}

impl<T: PartialEq + Clone + 'static> Drop for VarBody<T> {
	fn drop(&mut self) {
		if let Some(binding) = self.bound.borrow_mut().take() {
			let _ = binding.source.unobserve(binding.subscription);
		}
	}
}

impl<T: PartialEq + Clone + 'static> ValueAccess<T> for VarBody<T> {
	fn get(&self) -> T {
		self.value.borrow().clone()
	}

	fn on_change(&self) -> ChangeEvent<T> {
		self.on_change.clone()
	}

	fn node(&self) -> Rc<dyn DependencyNode> {
		self.this.upgrade().unwrap()
	}
}

impl<T: PartialEq + Clone + 'static> DependencyNode for VarBody<T> {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		match self.bound.borrow().as_ref() {
			Some(binding) => vec![binding.source.node()],
			None => Vec::new(),
		}
	}
}

impl<T: PartialEq + Clone + 'static> From<Var<T>> for Value<T> {
	fn from(var: Var<T>) -> Self {
		var.value()
	}
}

impl<T: PartialEq + Clone + Debug + 'static> Debug for Var<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get().fmt(f)
	}
}
