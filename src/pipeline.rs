//! Registration and retrieval middleware.
//!
//! Every [`System::register`](crate::System::register) and [`System::get`](crate::System::get)
//! call runs an ordered list of steps over a mutable call context. A step may inspect the
//! call, replace the value flowing through it, or abort the chain with an error. The chain
//! stops at the first step that leaves an error behind; later steps never run.
//!
//! A step that panics does not take the caller down: the panic is caught at the pipeline
//! boundary and turned into an error. A panic carrying a [`RegistryError`] payload (see
//! [`ErrorMode::Panic`]) is recovered as that error, anything else becomes
//! [`RegistryError::StepPanicked`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::context::RegistryContext;
use crate::system::ServiceMap;
use crate::{RegistryError, Result, ServiceValue};

/// A registration middleware step.
pub type RegistrationStep = Arc<dyn Fn(&mut RegistrationContext<'_>) + Send + Sync>;

/// A retrieval middleware step.
pub type GetStep = Arc<dyn Fn(&mut GetContext<'_>) + Send + Sync>;

/// How a built-in step reports a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Leave an error in the call context.
    #[default]
    Generate,
    /// Panic with the error as payload. The pipeline recovers it into the same error.
    Panic,
}

impl ErrorMode {
    fn raise<C: StepContext>(self, cx: &mut C, err: RegistryError) {
        match self {
            ErrorMode::Generate => cx.fail(err),
            ErrorMode::Panic => panic::panic_any(err),
        }
    }
}

trait StepContext {
    fn fail(&mut self, err: RegistryError);
    fn take_error(&mut self) -> Option<RegistryError>;
}

// -------------------------------------------------------------------------------------------------
// Registration
// -------------------------------------------------------------------------------------------------

/// State threaded through the registration steps of one call.
pub struct RegistrationContext<'a> {
    services: &'a ServiceMap,
    context: &'a RegistryContext,
    name: &'a str,
    value: &'a ServiceValue,
    applicable: Option<ServiceValue>,
    error: Option<RegistryError>,
}

impl<'a> RegistrationContext<'a> {
    pub(crate) fn new(
        services: &'a ServiceMap,
        context: &'a RegistryContext,
        name: &'a str,
        value: &'a ServiceValue,
    ) -> Self {
        Self {
            services,
            context,
            name,
            value,
            applicable: None,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The value being registered.
    pub fn value(&self) -> &ServiceValue {
        self.value
    }

    /// The value currently stored under this call's name.
    pub fn existing(&self) -> Option<ServiceValue> {
        self.services.get(self.name)
    }

    pub fn registry_context(&self) -> &RegistryContext {
        self.context
    }

    /// The value the chain currently reports as relevant. Informational only.
    pub fn applicable(&self) -> Option<&ServiceValue> {
        self.applicable.as_ref()
    }

    pub fn set_applicable(&mut self, value: Option<ServiceValue>) {
        self.applicable = value;
    }

    pub fn error(&self) -> Option<&RegistryError> {
        self.error.as_ref()
    }

    /// Abort the chain with `err`.
    pub fn fail(&mut self, err: RegistryError) {
        self.error = Some(err);
    }
}

impl StepContext for RegistrationContext<'_> {
    fn fail(&mut self, err: RegistryError) {
        RegistrationContext::fail(self, err);
    }

    fn take_error(&mut self) -> Option<RegistryError> {
        self.error.take()
    }
}

/// Wrap a closure as a [`RegistrationStep`].
pub fn registration_step<F>(step: F) -> RegistrationStep
where
    F: Fn(&mut RegistrationContext<'_>) + Send + Sync + 'static,
{
    Arc::new(step)
}

/// Reject a registration that would replace an existing, different value.
///
/// The rejected call reports the stored value as its applicable value.
pub fn allow_one_time_registration() -> RegistrationStep {
    registration_step(|cx| {
        let Some(existing) = cx.existing() else {
            return;
        };
        if existing.same_value(cx.value()) {
            return;
        }

        let err = RegistryError::AlreadyRegistered {
            name: cx.name().to_owned(),
        };
        cx.set_applicable(Some(existing));
        cx.fail(err);
    })
}

/// Declare `type_name` as acceptable for the service being registered. Never fails.
pub fn accept_service_type(type_name: impl Into<String>) -> RegistrationStep {
    let type_name = type_name.into();
    registration_step(move |cx| {
        cx.registry_context()
            .declare_service_type(cx.name(), &type_name);
    })
}

pub(crate) fn run_registration(
    steps: &[RegistrationStep],
    cx: &mut RegistrationContext<'_>,
) -> Result<()> {
    run(steps, cx)
}

// -------------------------------------------------------------------------------------------------
// Retrieval
// -------------------------------------------------------------------------------------------------

/// State threaded through the retrieval steps of one call.
///
/// The raw read from the registry has already happened; steps can only transform the value
/// or turn the call into an error.
pub struct GetContext<'a> {
    context: &'a RegistryContext,
    name: &'a str,
    type_name: &'a str,
    value: Option<ServiceValue>,
    error: Option<RegistryError>,
}

impl<'a> GetContext<'a> {
    pub(crate) fn new(
        context: &'a RegistryContext,
        name: &'a str,
        type_name: &'a str,
        value: Option<ServiceValue>,
    ) -> Self {
        Self {
            context,
            name,
            type_name,
            value,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The type identifier the caller asked for.
    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn value(&self) -> Option<&ServiceValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<ServiceValue>) {
        self.value = value;
    }

    pub fn registry_context(&self) -> &RegistryContext {
        self.context
    }

    pub fn error(&self) -> Option<&RegistryError> {
        self.error.as_ref()
    }

    pub fn fail(&mut self, err: RegistryError) {
        self.error = Some(err);
    }

    pub(crate) fn into_value(self) -> Option<ServiceValue> {
        self.value
    }
}

impl StepContext for GetContext<'_> {
    fn fail(&mut self, err: RegistryError) {
        GetContext::fail(self, err);
    }

    fn take_error(&mut self) -> Option<RegistryError> {
        self.error.take()
    }
}

/// Wrap a closure as a [`GetStep`].
pub fn get_step<F>(step: F) -> GetStep
where
    F: Fn(&mut GetContext<'_>) + Send + Sync + 'static,
{
    Arc::new(step)
}

/// Reject a retrieval whose requested type was never declared for the service.
pub fn matching_service_type(mode: ErrorMode) -> GetStep {
    get_step(move |cx| {
        if cx
            .registry_context()
            .is_service_type_declared(cx.name(), cx.type_name())
        {
            return;
        }

        let err = RegistryError::TypeNotDeclared {
            name: cx.name().to_owned(),
            type_name: cx.type_name().to_owned(),
        };
        mode.raise(cx, err);
    })
}

pub(crate) fn run_retrieval(steps: &[GetStep], cx: &mut GetContext<'_>) -> Result<()> {
    run(steps, cx)
}

// -------------------------------------------------------------------------------------------------
// Runner
// -------------------------------------------------------------------------------------------------

fn run<C, S>(steps: &[Arc<S>], cx: &mut C) -> Result<()>
where
    C: StepContext,
    S: Fn(&mut C) + Send + Sync + ?Sized,
{
    for step in steps {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| step(&mut *cx))) {
            cx.fail(recover(payload));
        }
        if let Some(err) = cx.take_error() {
            return Err(err);
        }
    }
    Ok(())
}

fn recover(payload: Box<dyn Any + Send>) -> RegistryError {
    let payload = match payload.downcast::<RegistryError>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };

    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    };

    warn!(%message, "pipeline step panicked");
    RegistryError::StepPanicked { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> (ServiceMap, RegistryContext) {
        (ServiceMap::new(), RegistryContext::new())
    }

    #[test]
    fn test_empty_chain_succeeds() {
        let (services, context) = services();
        let value = ServiceValue::new(1u8);
        let mut cx = RegistrationContext::new(&services, &context, "a", &value);
        assert_eq!(run_registration(&[], &mut cx), Ok(()));
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (services, context) = services();
        let value = ServiceValue::new(1u8);
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = |calls: Arc<AtomicUsize>| {
            registration_step(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let steps = vec![
            counted(calls.clone()),
            registration_step(|cx| cx.fail(RegistryError::InvalidValue { what: "test" })),
            counted(calls.clone()),
        ];

        let mut cx = RegistrationContext::new(&services, &context, "a", &value);
        assert_eq!(
            run_registration(&steps, &mut cx),
            Err(RegistryError::InvalidValue { what: "test" })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_time_registration_reports_old_value() {
        let (services, context) = services();
        let old = ServiceValue::new(1u8);
        services.register("a", Some(old.clone()));

        let new = ServiceValue::new(2u8);
        let mut cx = RegistrationContext::new(&services, &context, "a", &new);
        let result = run_registration(&[allow_one_time_registration()], &mut cx);

        assert_eq!(
            result,
            Err(RegistryError::AlreadyRegistered {
                name: "a".to_string()
            })
        );
        assert!(cx.applicable().is_some_and(|v| v.same_value(&old)));
    }

    #[test]
    fn test_one_time_registration_accepts_same_value() {
        let (services, context) = services();
        let value = ServiceValue::comparable(1u8);
        services.register("a", Some(value));

        let again = ServiceValue::comparable(1u8);
        let mut cx = RegistrationContext::new(&services, &context, "a", &again);
        assert_eq!(
            run_registration(&[allow_one_time_registration()], &mut cx),
            Ok(())
        );
    }

    #[test]
    fn test_accept_service_type_declares() {
        let (services, context) = services();
        let value = ServiceValue::new(1u8);
        let mut cx = RegistrationContext::new(&services, &context, "db", &value);

        run_registration(&[accept_service_type("Pg")], &mut cx).unwrap();
        assert!(context.is_service_type_declared("db", "Pg"));
    }

    #[test]
    fn test_matching_service_type_modes() {
        let context = RegistryContext::new();
        context.declare_service_type("db", "Pg");

        let expected = Err(RegistryError::TypeNotDeclared {
            name: "db".to_string(),
            type_name: "Redis".to_string(),
        });

        for mode in [ErrorMode::Generate, ErrorMode::Panic] {
            let mut cx = GetContext::new(&context, "db", "Redis", None);
            assert_eq!(
                run_retrieval(&[matching_service_type(mode)], &mut cx),
                expected
            );

            let mut cx = GetContext::new(&context, "db", "Pg", None);
            assert_eq!(run_retrieval(&[matching_service_type(mode)], &mut cx), Ok(()));
        }
    }

    #[test]
    fn test_panicking_step_becomes_error() {
        let context = RegistryContext::new();
        let steps = vec![get_step(|_| panic!("boom"))];

        let mut cx = GetContext::new(&context, "x", "T", None);
        assert_eq!(
            run_retrieval(&steps, &mut cx),
            Err(RegistryError::StepPanicked {
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn test_step_can_transform_value() {
        let context = RegistryContext::new();
        let steps = vec![get_step(|cx| {
            if cx.value().is_none() {
                cx.set_value(Some(ServiceValue::new("fallback")));
            }
        })];

        let mut cx = GetContext::new(&context, "x", "T", None);
        run_retrieval(&steps, &mut cx).unwrap();
        assert_eq!(
            cx.into_value().and_then(|v| v.downcast_ref::<&str>().copied()),
            Some("fallback")
        );
    }
}
