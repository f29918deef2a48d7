#![forbid(unsafe_code)]

//! Subscription ownership for widget lifetimes.
//!
//! A widget that listens to caller-owned [`Observable`]s keeps every
//! [`Subscription`] in a [`BindingScope`]. Dropping or clearing the scope
//! disconnects the widget in one step, which is how unmount guarantees that
//! no callback fires into a torn-down widget.
//!
//! ```
//! use qedit_core::reactive::{BindingScope, Observable};
//!
//! let value = Observable::new(1);
//! let mut scope = BindingScope::new();
//! scope.subscribe(&value, |v| assert!(*v > 0));
//! assert_eq!(scope.binding_count(), 1);
//!
//! scope.clear();
//! assert_eq!(value.subscriber_count(), 0);
//! ```

use super::observable::{Observable, Subscription};

/// Owns the subscriptions belonging to one widget instance.
///
/// # Invariants
///
/// 1. After `clear()` or drop, no callback registered through this scope fires.
/// 2. `binding_count()` equals the number of subscriptions held.
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep an existing subscription alive for the lifetime of the scope.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe to `source` within this scope.
    pub fn subscribe<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(callback);
        self.subscriptions.push(sub);
        self
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription now; the scope stays usable.
    pub fn clear(&mut self) {
        // Newest first, mirroring drop order of nested widgets.
        while self.subscriptions.pop().is_some() {}
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}
