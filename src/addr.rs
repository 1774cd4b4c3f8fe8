use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

/// An `Rc` compared and ordered by allocation address instead of by the
/// pointee. Lets heterogeneous graph nodes live in ordered sets keyed by
/// identity.
pub struct RcAddr<T: ?Sized> {
	ptr: Rc<T>,
}

impl<T: ?Sized> RcAddr<T> {
	pub fn new(ptr: Rc<T>) -> Self {
		RcAddr { ptr }
	}
}

impl<T: ?Sized> Clone for RcAddr<T> {
	fn clone(&self) -> Self {
		RcAddr {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for RcAddr<T> {
	type Target = Rc<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for RcAddr<T> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(
			Rc::as_ptr(&self.ptr) as *const (),
			Rc::as_ptr(&other.ptr) as *const (),
		)
	}
}

impl<T: ?Sized> Eq for RcAddr<T> {}

impl<T: ?Sized> Ord for RcAddr<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		(Rc::as_ptr(&self.ptr) as *const () as usize)
			.cmp(&(Rc::as_ptr(&other.ptr) as *const () as usize))
	}
}

impl<T: ?Sized> PartialOrd for RcAddr<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
