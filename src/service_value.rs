//! Type-erased service storage.
//!
//! The locator stores every service as a [`ServiceValue`]: an `Arc<dyn Any + Send + Sync>`
//! plus the capabilities that were known statically when the value was wrapped (value
//! equality and the [`Adapt`] self-conversion). A `ServiceValue` must be coerced back into a
//! concrete type (see [`coerce`](crate::coerce())) before it is used.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Self-declared conversion capability.
///
/// `output` is the destination slot, an `Option<T>` for the requested `T`. Implementations
/// write into it (typically through [`fill`]) and return `true` when they produced a value.
pub trait Adapt {
    fn adapt(&self, output: &mut dyn Any) -> bool;
}

/// Write `value` into a destination slot handed to [`Adapt::adapt`].
///
/// Returns `false` when the slot expects a different type.
pub fn fill<T: 'static>(output: &mut dyn Any, value: T) -> bool {
    match output.downcast_mut::<Option<T>>() {
        Some(slot) => {
            *slot = Some(value);
            true
        }
        None => false,
    }
}

type EqualsFn = fn(&dyn Any, &dyn Any) -> bool;
type AdaptFn = fn(&dyn Any, &mut dyn Any) -> bool;

fn equals_erased<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn adapt_erased<T: Adapt + 'static>(this: &dyn Any, output: &mut dyn Any) -> bool {
    this.downcast_ref::<T>()
        .is_some_and(|value| value.adapt(output))
}

/// A type-erased, cheaply clonable service value.
#[derive(Clone)]
pub struct ServiceValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    equals: Option<EqualsFn>,
    adapter: Option<AdaptFn>,
}

impl ServiceValue {
    /// Wrap a value compared by identity.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing `Arc` without another allocation.
    ///
    /// Two values built from clones of the same `Arc` are equal.
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
            equals: None,
            adapter: None,
        }
    }

    /// Wrap a value compared with its `PartialEq` implementation.
    pub fn comparable<T: PartialEq + Send + Sync + 'static>(value: T) -> Self {
        Self {
            equals: Some(equals_erased::<T>),
            ..Self::new(value)
        }
    }

    /// Wrap a value that knows how to convert itself through [`Adapt`].
    pub fn adaptable<T: Adapt + Send + Sync + 'static>(value: T) -> Self {
        Self {
            adapter: Some(adapt_erased::<T>),
            ..Self::new(value)
        }
    }

    /// Name of the concrete type that was wrapped.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.inner
    }

    /// Run the wrapped value's [`Adapt`] capability, if it has one.
    pub fn adapt_into(&self, output: &mut dyn Any) -> Option<bool> {
        self.adapter
            .map(|adapt| adapt(self.as_any() as &dyn Any, output))
    }

    /// Equality used by the one-time registration policy.
    ///
    /// Values of the same type wrapped with [`ServiceValue::comparable`] compare by value;
    /// everything else compares by allocation identity.
    pub fn same_value(&self, other: &ServiceValue) -> bool {
        if self.value_type_id() != other.value_type_id() {
            return false;
        }
        match self.equals {
            Some(equals) => equals(self.as_any(), other.as_any()),
            None => {
                Arc::as_ptr(&self.inner) as *const () == Arc::as_ptr(&other.inner) as *const ()
            }
        }
    }

    pub fn value_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }
}

impl fmt::Debug for ServiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceValue")
            .field("type_name", &self.type_name)
            .field("comparable", &self.equals.is_some())
            .field("adaptable", &self.adapter.is_some())
            .finish()
    }
}
