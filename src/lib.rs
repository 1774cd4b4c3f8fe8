mod action;
mod addr;
mod collection;
mod computed;
mod r#const;
mod error;
mod event;
mod filtered;
mod list;
pub mod macros;
mod mapped;
mod value;
mod value_list;
mod var;

pub use crate::action::{CollectionAction, Delta, IndexedReplace};
pub use crate::collection::ObservableCollection;
pub use crate::computed::{
	derive1, derive2, derive3, derive_associative, derive_many, select, AssocOp, Operand,
};
pub use crate::error::{BindError, CollectionError, ObserveError};
pub use crate::event::{
	ActionEvent, ActionObserver, ChangeEvent, ChangeObserver, DeltaEvent, DeltaObserver,
	SubscriberId,
};
pub use crate::filtered::FilteredBag;
pub use crate::list::ObservableList;
pub use crate::mapped::{MappedBag, MappedSequence};
pub use crate::r#const::Const;
pub use crate::value::{DependencyNode, Value, ValueAccess};
pub use crate::value_list::ValueList;
pub use crate::var::{Toggle, Var};
