pub mod alerts;
pub mod subscribers;

pub use alerts::{AlertRegistry, AlertSubscription};
pub use subscribers::{Language, Preferences, SubscriberId, SubscriberRegistry};

use std::sync::{Mutex, MutexGuard, PoisonError};

// Every mutation is a single map operation, so a poisoned lock still guards valid state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
