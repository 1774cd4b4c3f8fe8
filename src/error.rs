use thiserror::Error;

/// Raised by [`crate::Var::bind`] and friends before any state is touched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
	#[error("cannot bind a variable to itself")]
	SelfBind,
	#[error("binding would create a dependency cycle")]
	Cycle,
	#[error("variable is already bound to another value")]
	AlreadyBound,
	#[error("variable is not bound to any value")]
	NotBound,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ObserveError {
	#[error("observer is not subscribed to this channel")]
	NotSubscribed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CollectionError {
	#[error("item not found in collection")]
	NotFound,
}
