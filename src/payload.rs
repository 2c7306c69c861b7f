//! # Type-erased values flowing through the kernel.
//!
//! Function arguments, return values, resource objects and governance
//! extensions all travel as [`Payload`]: a shared `Arc<dyn Any>` that callers
//! downcast at the point of use.

use std::any::Any;
use std::sync::Arc;

/// Shared, type-erased value.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Wraps a value into a [`Payload`].
#[inline]
pub fn payload<T: Any + Send + Sync>(value: T) -> Payload {
    Arc::new(value)
}

/// Downcasts a payload into a shared handle of the concrete type.
///
/// Returns `None` if the payload holds a different type.
#[inline]
pub fn downcast<T: Any + Send + Sync>(value: &Payload) -> Option<Arc<T>> {
    Arc::clone(value).downcast::<T>().ok()
}
