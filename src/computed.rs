use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::event::{ChangeEvent, ChangeObserver};
use crate::r#const::Const;
use crate::value::{DependencyNode, Value, ValueAccess};

/// One input of a derivation: either a reactive value or a plain value
/// carried along unchanged.
pub enum Operand<T: PartialEq + Clone + 'static> {
	Value(Value<T>),
	Plain(T),
}

impl<T: PartialEq + Clone + 'static> Clone for Operand<T> {
	fn clone(&self) -> Self {
		match self {
			Operand::Value(value) => Operand::Value(value.clone()),
			Operand::Plain(plain) => Operand::Plain(plain.clone()),
		}
	}
}

impl<T: PartialEq + Clone + 'static> Operand<T> {
	pub fn get(&self) -> T {
		match self {
			Operand::Value(value) => value.get(),
			Operand::Plain(plain) => plain.clone(),
		}
	}

	/// `Some` when this operand can never change.
	pub fn constant_value(&self) -> Option<T> {
		match self {
			Operand::Value(value) => value.constant(),
			Operand::Plain(plain) => Some(plain.clone()),
		}
	}

	fn node(&self) -> Option<Rc<dyn DependencyNode>> {
		match self {
			Operand::Value(value) => Some(value.node()),
			Operand::Plain(_) => None,
		}
	}
}

impl<T: PartialEq + Clone + 'static> From<T> for Operand<T> {
	fn from(plain: T) -> Self {
		Operand::Plain(plain)
	}
}

impl<T: PartialEq + Clone + 'static> From<Value<T>> for Operand<T> {
	fn from(value: Value<T>) -> Self {
		Operand::Value(value)
	}
}

impl<T: PartialEq + Clone + 'static> From<&Value<T>> for Operand<T> {
	fn from(value: &Value<T>) -> Self {
		Operand::Value(value.clone())
	}
}

/// An associative combining operator, compared by allocation identity.
/// Two derivations flatten into one operand list only when they carry
/// the very same `AssocOp`.
pub struct AssocOp<T>(Rc<dyn Fn(&[T]) -> T>);

impl<T> Clone for AssocOp<T> {
	fn clone(&self) -> Self {
		AssocOp(self.0.clone())
	}
}

impl<T> AssocOp<T> {
	pub fn new(op: impl Fn(&[T]) -> T + 'static) -> Self {
		AssocOp(Rc::new(op))
	}

	pub fn apply(&self, items: &[T]) -> T {
		(self.0)(items)
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
	}
}

struct ComputedBody<R: PartialEq + Clone + 'static> {
	value: RefCell<R>,
	on_change: ChangeEvent<R>,
	recompute: Box<dyn Fn() -> R>,
	upstream: Vec<Rc<dyn DependencyNode>>,
	assoc: Option<(AssocOp<R>, Vec<Operand<R>>)>,
	// Lifelines for the weak subscriptions on the operands.
	_listeners: Vec<Rc<dyn Any>>,
	this: Weak<ComputedBody<R>>,
}

impl<R: PartialEq + Clone + 'static> ComputedBody<R> {
	fn build(
		initial: R,
		recompute: Box<dyn Fn() -> R>,
		upstream: Vec<Rc<dyn DependencyNode>>,
		assoc: Option<(AssocOp<R>, Vec<Operand<R>>)>,
		register: impl FnOnce(&Weak<ComputedBody<R>>) -> Vec<Rc<dyn Any>>,
	) -> Value<R> {
		let body = Rc::new_cyclic(|this| ComputedBody {
			value: RefCell::new(initial),
			on_change: ChangeEvent::new(),
			recompute,
			upstream,
			assoc,
			_listeners: register(this),
			this: this.clone(),
		});
		Value::from_access(body)
	}

	fn on_dependency_changed(&self) {
		let new = (self.recompute)();
		let old = {
			let mut current = self.value.borrow_mut();
			if *current == new {
				return;
			}
			std::mem::replace(&mut *current, new.clone())
		};
		self.on_change.emit(&new, &old);
	}
}

fn listen<T: PartialEq + Clone + 'static, R: PartialEq + Clone + 'static>(
	source: &Value<T>,
	this: &Weak<ComputedBody<R>>,
) -> Rc<dyn Any> {
	let weak = this.clone();
	let listener = Rc::new(ChangeObserver::unit(move || {
		if let Some(body) = weak.upgrade() {
			body.on_dependency_changed();
		}
	}));
	source.weak_observe(&listener);
	listener as Rc<dyn Any>
}

impl<R: PartialEq + Clone + 'static> ValueAccess<R> for ComputedBody<R> {
	fn get(&self) -> R {
		self.value.borrow().clone()
	}

	fn on_change(&self) -> ChangeEvent<R> {
		self.on_change.clone()
	}

	fn node(&self) -> Rc<dyn DependencyNode> {
		self.this.upgrade().unwrap()
	}

	fn assoc_operands(&self, op: &AssocOp<R>) -> Option<Vec<Operand<R>>> {
		match &self.assoc {
			Some((own, operands)) if own.ptr_eq(op) => Some(operands.clone()),
			_ => None,
		}
	}
}

impl<R: PartialEq + Clone + 'static> DependencyNode for ComputedBody<R> {
	fn derived_from(&self) -> Vec<Rc<dyn DependencyNode>> {
		self.upstream.clone()
	}
}

/// Derives a value from one source. Folds to a constant when the source
/// is constant.
pub fn derive1<T, R>(source: &Value<T>, transform: impl Fn(&T) -> R + 'static) -> Value<R>
where
	T: PartialEq + Clone + 'static,
	R: PartialEq + Clone + 'static,
{
	if let Some(value) = source.constant() {
		return Const::of(transform(&value));
	}
	let captured = source.clone();
	let initial = transform(&captured.get());
	let recompute = Box::new(move || transform(&captured.get()));
	let upstream = vec![source.node()];
	let source = source.clone();
	ComputedBody::build(initial, recompute, upstream, None, |this| {
		vec![listen(&source, this)]
	})
}

/// Derives a value from two operands.
pub fn derive2<A, B, R>(
	a: impl Into<Operand<A>>,
	b: impl Into<Operand<B>>,
	combine: impl Fn(&A, &B) -> R + 'static,
) -> Value<R>
where
	A: PartialEq + Clone + 'static,
	B: PartialEq + Clone + 'static,
	R: PartialEq + Clone + 'static,
{
	let a = a.into();
	let b = b.into();
	if let (Some(a), Some(b)) = (a.constant_value(), b.constant_value()) {
		return Const::of(combine(&a, &b));
	}
	let upstream = [a.node(), b.node()].into_iter().flatten().collect();
	let (ca, cb) = (a.clone(), b.clone());
	let initial = combine(&ca.get(), &cb.get());
	let recompute = Box::new(move || combine(&ca.get(), &cb.get()));
	ComputedBody::build(initial, recompute, upstream, None, |this| {
		let mut listeners = Vec::new();
		if let Operand::Value(value) = &a {
			if value.constant().is_none() {
				listeners.push(listen(value, this));
			}
		}
		if let Operand::Value(value) = &b {
			if value.constant().is_none() {
				listeners.push(listen(value, this));
			}
		}
		listeners
	})
}

/// Derives a value from three operands.
pub fn derive3<A, B, C, R>(
	a: impl Into<Operand<A>>,
	b: impl Into<Operand<B>>,
	c: impl Into<Operand<C>>,
	combine: impl Fn(&A, &B, &C) -> R + 'static,
) -> Value<R>
where
	A: PartialEq + Clone + 'static,
	B: PartialEq + Clone + 'static,
	C: PartialEq + Clone + 'static,
	R: PartialEq + Clone + 'static,
{
	let a = a.into();
	let b = b.into();
	let c = c.into();
	if let (Some(a), Some(b), Some(c)) =
		(a.constant_value(), b.constant_value(), c.constant_value())
	{
		return Const::of(combine(&a, &b, &c));
	}
	let upstream = [a.node(), b.node(), c.node()]
		.into_iter()
		.flatten()
		.collect();
	let (ca, cb, cc) = (a.clone(), b.clone(), c.clone());
	let initial = combine(&ca.get(), &cb.get(), &cc.get());
	let recompute = Box::new(move || combine(&ca.get(), &cb.get(), &cc.get()));
	ComputedBody::build(initial, recompute, upstream, None, |this| {
		let mut listeners = Vec::new();
		for operand in [&a as &dyn OperandListen<R>, &b, &c] {
			if let Some(listener) = operand.listen_if_live(this) {
				listeners.push(listener);
			}
		}
		listeners
	})
}

trait OperandListen<R: PartialEq + Clone + 'static> {
	fn listen_if_live(&self, this: &Weak<ComputedBody<R>>) -> Option<Rc<dyn Any>>;
}

impl<T: PartialEq + Clone + 'static, R: PartialEq + Clone + 'static> OperandListen<R>
	for Operand<T>
{
	fn listen_if_live(&self, this: &Weak<ComputedBody<R>>) -> Option<Rc<dyn Any>> {
		match self {
			Operand::Value(value) if value.constant().is_none() => Some(listen(value, this)),
			_ => None,
		}
	}
}

/// Derives a value from any number of same-typed operands.
pub fn derive_many<T, R>(
	operands: Vec<Operand<T>>,
	combine: impl Fn(&[T]) -> R + 'static,
) -> Value<R>
where
	T: PartialEq + Clone + 'static,
	R: PartialEq + Clone + 'static,
{
	if operands.iter().all(|o| o.constant_value().is_some()) {
		let items: Vec<T> = operands.iter().map(|o| o.get()).collect();
		return Const::of(combine(&items));
	}
	let upstream = operands.iter().filter_map(|o| o.node()).collect();
	let captured = operands.clone();
	let gather = move || {
		let items: SmallVec<[T; 8]> = captured.iter().map(|o| o.get()).collect();
		combine(&items)
	};
	let initial = gather();
	let recompute = Box::new(gather);
	ComputedBody::build(initial, recompute, upstream, None, |this| {
		operands
			.iter()
			.filter_map(|operand| operand.listen_if_live(this))
			.collect()
	})
}

/// Derives a value by folding operands with an associative operator.
/// Operands that are themselves derivations of the same operator are
/// spliced in flat, and runs of adjacent constants are pre-folded.
pub fn derive_associative<T>(op: AssocOp<T>, operands: Vec<Operand<T>>) -> Value<T>
where
	T: PartialEq + Clone + 'static,
{
	let mut flat: Vec<Operand<T>> = Vec::new();
	for operand in operands {
		let spliced = match &operand {
			Operand::Value(value) => value.access().assoc_operands(&op),
			Operand::Plain(_) => None,
		};
		match spliced {
			Some(inner) => flat.extend(inner),
			None => flat.push(operand),
		}
	}

	let mut folded: Vec<Operand<T>> = Vec::new();
	for operand in flat {
		let merged = match (folded.last().and_then(|o| o.constant_value()), operand.constant_value()) {
			(Some(prev), Some(next)) => Some(op.apply(&[prev, next])),
			_ => None,
		};
		match merged {
			Some(value) => *folded.last_mut().unwrap() = Operand::Plain(value),
			None => folded.push(operand),
		}
	}

	if folded.iter().all(|o| o.constant_value().is_some()) {
		let items: Vec<T> = folded.iter().map(|o| o.get()).collect();
		return Const::of(op.apply(&items));
	}

	let upstream = folded.iter().filter_map(|o| o.node()).collect();
	let captured = folded.clone();
	let applied = op.clone();
	let gather = move || {
		let items: SmallVec<[T; 8]> = captured.iter().map(|o| o.get()).collect();
		applied.apply(&items)
	};
	let initial = gather();
	let recompute = Box::new(gather);
	let assoc = Some((op, folded.clone()));
	ComputedBody::build(initial, recompute, upstream, assoc, |this| {
		folded
			.iter()
			.filter_map(|operand| operand.listen_if_live(this))
			.collect()
	})
}

/// Reactive ternary: tracks `if_true` while `cond` holds, `if_false`
/// otherwise.
pub fn select<T>(
	cond: impl Into<Operand<bool>>,
	if_true: impl Into<Operand<T>>,
	if_false: impl Into<Operand<T>>,
) -> Value<T>
where
	T: PartialEq + Clone + 'static,
{
	derive3(cond, if_true, if_false, |cond, if_true, if_false| {
		if *cond {
			if_true.clone()
		} else {
			if_false.clone()
		}
	})
}
