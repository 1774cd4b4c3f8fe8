pub use enclose::*;

#[macro_export]
macro_rules! on_change {
    (( $($d_tt:tt)* ) $new:ident => $($b:tt)*) => {
        tether::ChangeObserver::new_value($crate::macros::enclose!(($( $d_tt )*) move |$new| { $($b)* }))
    };
    ($new:ident => $($b:tt)*) => {
        tether::ChangeObserver::new_value(move |$new| { $($b)* })
    };
}

#[macro_export]
macro_rules! on_action {
    (( $($d_tt:tt)* ) $action:ident => $($b:tt)*) => {
        tether::ActionObserver::action($crate::macros::enclose!(($( $d_tt )*) move |$action| { $($b)* }))
    };
    ($action:ident => $($b:tt)*) => {
        tether::ActionObserver::action(move |$action| { $($b)* })
    };
}
