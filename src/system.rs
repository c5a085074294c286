//! Named service locator.
//!
//! A [`System`] stores type-erased services by name in a [`ConcurrentRegistry`] and runs every
//! registration and retrieval through an ordered middleware chain (see [`crate::pipeline`]).
//!
//! ```
//! use std::sync::Arc;
//! use service_registry::{RegistryContext, ServiceValue, System};
//!
//! let system = System::new(Arc::new(RegistryContext::new()));
//!
//! system
//!     .register("port", ServiceValue::new(8080u16), &[])
//!     .unwrap();
//!
//! let port: u16 = system.get_as("port", "u16", &[]).unwrap();
//! assert_eq!(port, 8080);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::context::RegistryContext;
use crate::pipeline::{
    allow_one_time_registration, matching_service_type, run_registration, run_retrieval,
    ErrorMode, GetContext, GetStep, RegistrationContext, RegistrationStep,
};
use crate::service::{Service, ServiceType};
use crate::{coerce, ConcurrentRegistry, RegistryError, RegistryEvent, Result, ServiceValue};

/// Storage backing a [`System`].
pub type ServiceMap = ConcurrentRegistry<String, Option<ServiceValue>>;

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the system is
/// interacted with. It must be thread-safe because systems are shared between threads.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

// -------------------------------------------------------------------------------------------------
// Configuration
// -------------------------------------------------------------------------------------------------

/// Per-instance defaults of a [`System`].
///
/// The default configuration enforces one-time registration and runs no retrieval steps.
/// Steps passed to an individual call replace these defaults for that call.
#[derive(Clone)]
pub struct SystemConfig {
    registration_steps: Vec<RegistrationStep>,
    retrieval_steps: Vec<GetStep>,
}

impl SystemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No default steps: any registration overwrites, any retrieval passes.
    pub fn permissive() -> Self {
        Self {
            registration_steps: Vec::new(),
            retrieval_steps: Vec::new(),
        }
    }

    pub fn with_registration_steps(mut self, steps: Vec<RegistrationStep>) -> Self {
        self.registration_steps = steps;
        self
    }

    pub fn with_retrieval_steps(mut self, steps: Vec<GetStep>) -> Self {
        self.retrieval_steps = steps;
        self
    }

    /// Append a [`matching_service_type`] check to the default retrieval steps.
    pub fn enforce_declared_types(mut self, mode: ErrorMode) -> Self {
        self.retrieval_steps.push(matching_service_type(mode));
        self
    }

    pub fn registration_steps(&self) -> &[RegistrationStep] {
        &self.registration_steps
    }

    pub fn retrieval_steps(&self) -> &[GetStep] {
        &self.retrieval_steps
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            registration_steps: vec![allow_one_time_registration()],
            retrieval_steps: Vec::new(),
        }
    }
}

impl fmt::Debug for SystemConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemConfig")
            .field("registration_steps", &self.registration_steps.len())
            .field("retrieval_steps", &self.retrieval_steps.len())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// System
// -------------------------------------------------------------------------------------------------

pub struct System {
    services: Option<ServiceMap>,
    context: Arc<RegistryContext>,
    config: SystemConfig,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl System {
    /// Create a system with the default [`SystemConfig`].
    pub fn new(context: Arc<RegistryContext>) -> Self {
        Self::with_config(context, SystemConfig::default())
    }

    pub fn with_config(context: Arc<RegistryContext>, config: SystemConfig) -> Self {
        Self {
            services: Some(ServiceMap::new()),
            context,
            config,
            trace: Mutex::new(None),
        }
    }

    /// A system without backing storage. Every operation fails with
    /// [`RegistryError::NotInitialized`].
    pub fn detached() -> Self {
        Self {
            services: None,
            context: Arc::new(RegistryContext::new()),
            config: SystemConfig::default(),
            trace: Mutex::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.services.is_some()
    }

    pub fn context(&self) -> &Arc<RegistryContext> {
        &self.context
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn services(&self) -> Result<&ServiceMap> {
        self.services.as_ref().ok_or(RegistryError::NotInitialized)
    }

    // ---------------------------------------------------------------------------------------------
    // Tracing
    // ---------------------------------------------------------------------------------------------

    /// Set a tracing callback for this system's operations.
    ///
    /// The callback must not call back into the same system's tracing setters.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: RegistryEvent) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------------------------------

    /// Register `value` under `name` and return the value it replaced.
    ///
    /// `steps` replace the configured default registration steps when non-empty. The value is
    /// only written if every step completes without an error.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotInitialized`] on a detached system
    /// - [`RegistryError::InvalidValue`] when `name` is empty
    /// - any error left by a registration step, e.g. [`RegistryError::AlreadyRegistered`]
    pub fn register(
        &self,
        name: &str,
        value: ServiceValue,
        steps: &[RegistrationStep],
    ) -> Result<Option<ServiceValue>> {
        let services = self.services()?;
        if name.is_empty() {
            return Err(RegistryError::InvalidValue { what: "name" });
        }

        let steps = if steps.is_empty() {
            self.config.registration_steps()
        } else {
            steps
        };

        let mut cx = RegistrationContext::new(services, &self.context, name, &value);
        if let Err(err) = run_registration(steps, &mut cx) {
            warn!(service = name, error = %err, "registration rejected");
            self.emit_event(RegistryEvent::Register {
                name: name.to_owned(),
                accepted: false,
            });
            return Err(err);
        }

        debug!(
            service = name,
            value_type = value.type_name(),
            "registered service"
        );
        let previous = services.register(name, Some(value));
        self.emit_event(RegistryEvent::Register {
            name: name.to_owned(),
            accepted: true,
        });
        Ok(previous)
    }

    pub fn register_service<T: Send + Sync + 'static>(
        &self,
        service: &Service<T>,
        steps: &[RegistrationStep],
    ) -> Result<Option<ServiceValue>> {
        self.register(service.name(), service.to_value(), steps)
    }

    /// Like [`System::register`], but panics on failure.
    ///
    /// # Panics
    ///
    /// Panics with the registration error.
    pub fn must_register(&self, name: &str, value: ServiceValue, steps: &[RegistrationStep]) {
        if let Err(err) = self.register(name, value, steps) {
            panic!("{err}");
        }
    }

    /// Remove the service stored under `name` and return it.
    pub fn unregister(&self, name: &str) -> Result<Option<ServiceValue>> {
        let services = self.services()?;
        if name.is_empty() {
            return Err(RegistryError::InvalidValue { what: "name" });
        }

        let removed = services.unregister(name);
        debug!(service = name, found = removed.is_some(), "unregistered service");
        self.emit_event(RegistryEvent::Unregister {
            name: name.to_owned(),
            found: removed.is_some(),
        });
        Ok(removed)
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.services()?.contains(name))
    }

    // ---------------------------------------------------------------------------------------------
    // Retrieval
    // ---------------------------------------------------------------------------------------------

    /// Retrieve the service stored under `name`, requested as `type_name`.
    ///
    /// The raw read happens first; `steps` (or the configured defaults when empty) can then
    /// transform the value or reject the call.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotInitialized`] on a detached system
    /// - [`RegistryError::InvalidValue`] when `name` is empty
    /// - any error left by a retrieval step, e.g. [`RegistryError::TypeNotDeclared`]
    /// - [`RegistryError::MissingService`] when no value is left after the steps
    pub fn get(&self, name: &str, type_name: &str, steps: &[GetStep]) -> Result<ServiceValue> {
        let services = self.services()?;
        if name.is_empty() {
            return Err(RegistryError::InvalidValue { what: "name" });
        }

        let raw = services.get(name);
        let steps = if steps.is_empty() {
            self.config.retrieval_steps()
        } else {
            steps
        };

        let mut cx = GetContext::new(&self.context, name, type_name, raw);
        let outcome = run_retrieval(steps, &mut cx).and_then(|()| {
            cx.into_value().ok_or_else(|| RegistryError::MissingService {
                name: name.to_owned(),
            })
        });

        match &outcome {
            Ok(_) => debug!(service = name, type_name, "resolved service"),
            Err(err) => warn!(service = name, type_name, error = %err, "service lookup failed"),
        }
        self.emit_event(RegistryEvent::Get {
            name: name.to_owned(),
            found: outcome.is_ok(),
        });
        outcome
    }

    /// Retrieve and coerce the service stored under `name` into `T`.
    pub fn get_as<T: Clone + 'static>(
        &self,
        name: &str,
        type_name: &str,
        steps: &[GetStep],
    ) -> Result<T> {
        let value = self.get(name, type_name, steps)?;
        coerce(&value)
    }

    /// Retrieve the service stored under `name` as the type described by `service_type`.
    pub fn get_service<T: Clone + 'static>(
        &self,
        name: &str,
        service_type: &ServiceType<T>,
        steps: &[GetStep],
    ) -> Result<T> {
        let value = self.get(name, service_type.name(), steps)?;
        service_type.as_type(&value)
    }

    /// Like [`System::get_as`], but panics on failure.
    ///
    /// # Panics
    ///
    /// Panics with the retrieval or coercion error.
    pub fn must_get<T: Clone + 'static>(&self, name: &str, type_name: &str, steps: &[GetStep]) -> T {
        match self.get_as(name, type_name, steps) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a [`ServiceType`] descriptor whose name is claimed in this system's context.
    pub fn service_type<T: Clone + 'static>(&self, name: &str) -> Result<ServiceType<T>> {
        ServiceType::new(&self.context, name)
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("services", &self.services)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accept_service_type, registration_step};

    fn system() -> System {
        System::new(Arc::new(RegistryContext::new()))
    }

    #[test]
    fn test_detached_system_is_not_initialized() {
        let system = System::detached();
        assert!(!system.is_initialized());
        assert_eq!(
            system.register("a", ServiceValue::new(1u8), &[]).err(),
            Some(RegistryError::NotInitialized)
        );
        assert_eq!(
            system.get("a", "u8", &[]).err(),
            Some(RegistryError::NotInitialized)
        );
        assert_eq!(system.unregister("a").err(), Some(RegistryError::NotInitialized));
        assert_eq!(system.contains("a"), Err(RegistryError::NotInitialized));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let system = system();
        assert_eq!(
            system.register("", ServiceValue::new(1u8), &[]).err(),
            Some(RegistryError::InvalidValue { what: "name" })
        );
        assert_eq!(
            system.get("", "u8", &[]).err(),
            Some(RegistryError::InvalidValue { what: "name" })
        );
    }

    #[test]
    fn test_missing_service() {
        let system = system();
        assert_eq!(
            system.get("nope", "u8", &[]).err(),
            Some(RegistryError::MissingService {
                name: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_register_returns_previous_value() {
        let system = System::with_config(
            Arc::new(RegistryContext::new()),
            SystemConfig::permissive(),
        );

        assert!(system
            .register("n", ServiceValue::new(1u8), &[])
            .unwrap()
            .is_none());
        let previous = system.register("n", ServiceValue::new(2u8), &[]).unwrap();
        assert_eq!(previous.and_then(|v| v.downcast_ref::<u8>().copied()), Some(1));
        assert_eq!(system.get_as::<u8>("n", "u8", &[]), Ok(2));
    }

    #[test]
    fn test_per_call_steps_replace_defaults() {
        let system = system();
        system.register("n", ServiceValue::new(1u8), &[]).unwrap();

        // default one-time policy rejects
        assert!(system.register("n", ServiceValue::new(2u8), &[]).is_err());

        // a per-call chain without the policy overwrites
        let noop = registration_step(|_| {});
        system
            .register("n", ServiceValue::new(3u8), &[noop])
            .unwrap();
        assert_eq!(system.get_as::<u8>("n", "u8", &[]), Ok(3));
    }

    #[test]
    fn test_enforced_declared_types() {
        let system = System::with_config(
            Arc::new(RegistryContext::new()),
            SystemConfig::new().enforce_declared_types(ErrorMode::Generate),
        );

        system
            .register(
                "db",
                ServiceValue::new("postgres://"),
                &[allow_one_time_registration(), accept_service_type("Url")],
            )
            .unwrap();

        assert_eq!(system.get_as::<&str>("db", "Url", &[]), Ok("postgres://"));
        assert_eq!(
            system.get("db", "Socket", &[]).err(),
            Some(RegistryError::TypeNotDeclared {
                name: "db".to_string(),
                type_name: "Socket".to_string()
            })
        );
    }

    #[test]
    fn test_unregister() {
        let system = system();
        system.register("n", ServiceValue::new(1u8), &[]).unwrap();
        assert_eq!(system.contains("n"), Ok(true));

        let removed = system.unregister("n").unwrap();
        assert!(removed.is_some());
        assert_eq!(system.contains("n"), Ok(false));
        assert!(system.unregister("n").unwrap().is_none());
    }

    #[test]
    #[should_panic(expected = "Service not found: ghost")]
    fn test_must_get_panics() {
        let system = system();
        let _: u8 = system.must_get("ghost", "u8", &[]);
    }
}
