#![forbid(unsafe_code)]

//! Reactive primitives for caller-owned widget state.
//!
//! - [`Observable`]: a shared, version-tracked value with change callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BindingScope`]: owns all subscriptions of one widget instance.
//!
//! `Observable<T>` uses `Rc<RefCell<..>>`; everything here is single-threaded,
//! matching the UI event loop the widgets run on. Subscribers are stored as
//! `Weak` callbacks and cleaned up lazily during notification.

pub mod binding;
pub mod observable;

pub use binding::BindingScope;
pub use observable::{Observable, Subscription};
