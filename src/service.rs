//! Named service descriptors.
//!
//! [`Service`] pairs a name with a strongly typed value and is the transport object between
//! caller code and the locator's type-erased storage. [`ServiceType`] names the static type a
//! caller expects back and knows how to coerce a stored value into it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::RegistryContext;
use crate::pipeline::{accept_service_type, RegistrationStep};
use crate::{coerce, Result, ServiceValue};

/// A named, typed service value.
///
/// The value is shared: every [`ServiceValue`] produced by [`Service::to_value`] points at the
/// same allocation, so registering the same descriptor twice is not a conflicting write.
pub struct Service<T> {
    name: String,
    value: Arc<T>,
}

impl<T: Send + Sync + 'static> Service<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self::from_arc(name, Arc::new(value))
    }

    pub fn from_arc(name: impl Into<String>, value: Arc<T>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped value. No coercion is involved.
    pub fn as_service(&self) -> &T {
        &self.value
    }

    pub fn shared(&self) -> Arc<T> {
        self.value.clone()
    }

    /// Type-erased view for storage in a [`System`](crate::System).
    pub fn to_value(&self) -> ServiceValue {
        ServiceValue::from_arc(self.value.clone())
    }
}

impl<T> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> fmt::Debug for Service<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Descriptor of a static type that services can be retrieved as.
///
/// Its name is the type identifier used by
/// [`accept_service_type`](crate::accept_service_type) and
/// [`matching_service_type`](crate::matching_service_type). Names are unique per
/// [`RegistryContext`] and cannot be reused.
pub struct ServiceType<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + 'static> ServiceType<T> {
    /// Claim `name` in `context` and build the descriptor.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::TypeNameTaken`](crate::RegistryError::TypeNameTaken) when a
    ///   descriptor with the same name already exists in `context`
    /// - [`RegistryError::InvalidValue`](crate::RegistryError::InvalidValue) when `name` is empty
    pub fn new(context: &RegistryContext, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        context.claim_type_name(&name)?;
        Ok(Self {
            name,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coerce a stored value into `T`.
    pub fn as_type<'a>(&self, input: impl Into<Option<&'a ServiceValue>>) -> Result<T> {
        coerce(input)
    }

    /// Registration step declaring this type acceptable for the registered service.
    pub fn accept(&self) -> RegistrationStep {
        accept_service_type(self.name.clone())
    }
}

impl<T> Clone for ServiceType<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ServiceType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
