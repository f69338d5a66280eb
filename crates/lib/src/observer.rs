//! Change notification for registry mutations.
//!
//! A single observer can be registered on a [`Registry`](crate::Registry).
//! After every mutation it receives one structural event (`added`, `changed`,
//! `removed`, or `cleared`) plus a minimal patch for each document whose
//! merged view actually changed. Only documents whose merged view had been
//! read before the mutation are reported; nobody can be surprised by a
//! change to a view nobody has seen.
//!
//! Callbacks run on the mutating thread *after* the registry lock has been
//! released, so an observer may call back into the registry freely.

use crate::value::Value;

/// Callbacks reporting registry changes.
///
/// All methods have empty default bodies; implement only the events you
/// care about. The observer is shared across threads, so implementations
/// keep their own interior mutability.
pub trait ChangeObserver: Send + Sync {
    /// A document was added (first registration or merge-in re-add).
    fn on_added(&self, id: &str) {
        let _ = id;
    }

    /// A document's merged view changed; `patch` holds the additions and
    /// changes relative to the previously observed view.
    fn on_changed(&self, id: &str, patch: &Value) {
        let _ = (id, patch);
    }

    /// A document was removed.
    fn on_removed(&self, id: &str) {
        let _ = id;
    }

    /// All documents were removed at once.
    fn on_cleared(&self) {}
}
