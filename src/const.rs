use std::rc::{Rc, Weak};

use crate::event::ChangeEvent;
use crate::value::{DependencyNode, Value, ValueAccess};

/// A value that never changes. Its change channel exists so the `Value`
/// surface stays uniform, but it never emits.
pub struct Const<T: PartialEq + Clone + 'static> {
	body: Rc<ConstBody<T>>,
}

struct ConstBody<T: PartialEq + Clone + 'static> {
	value: T,
	on_change: ChangeEvent<T>,
	this: Weak<ConstBody<T>>,
}

impl<T: PartialEq + Clone + 'static> Const<T> {
	pub fn new(value: T) -> Self {
		let body = Rc::new_cyclic(|this| ConstBody {
			value,
			on_change: ChangeEvent::new(),
			this: this.clone(),
		});
		Const { body }
	}

	/// Wraps `value` straight into a `Value` handle.
	pub fn of(value: T) -> Value<T> {
		Value::from_access(Const::new(value).body)
	}

	pub fn value(&self) -> Value<T> {
		Value::from_access(self.body.clone())
	}
}

impl<T: PartialEq + Clone + 'static> Clone for Const<T> {
	fn clone(&self) -> Self {
		Const {
			body: self.body.clone(),
		}
	}
}

impl<T: PartialEq + Clone + 'static> ValueAccess<T> for ConstBody<T> {
	fn get(&self) -> T {
		self.value.clone()
	}

	fn on_change(&self) -> ChangeEvent<T> {
		self.on_change.clone()
	}

	fn node(&self) -> Rc<dyn DependencyNode> {
		self.this.upgrade().unwrap()
	}

	fn constant(&self) -> Option<T> {
		Some(self.value.clone())
	}
}

impl<T: PartialEq + Clone + 'static> DependencyNode for ConstBody<T> {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		Vec::new()
	}
}
