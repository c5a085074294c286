use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors reported by the service locator and the coercion primitives.
///
/// The [`ConcurrentRegistry`](crate::ConcurrentRegistry) itself never reports errors; it
/// degrades to a no-op and leaves the explanation to the caller with more context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Service system is not initialized")]
    NotInitialized,

    #[error("Invalid value: {what}")]
    InvalidValue { what: &'static str },

    #[error("Key has no identity")]
    NilKey,

    #[error("Key of type {key_type} cannot be normalized")]
    KeyConversion { key_type: &'static str },

    #[error("Service not found: {name}")]
    MissingService { name: String },

    #[error("Service already registered with a different value: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid coercion input")]
    InvalidInput,

    #[error("Invalid coercion output")]
    InvalidOutput,

    #[error("Cannot transform {from} into {to}")]
    TransformationFailed {
        from: &'static str,
        to: &'static str,
    },

    #[error("Service type {type_name} is not declared for service {name}")]
    TypeNotDeclared { name: String, type_name: String },

    #[error("Service type name already in use: {type_name}")]
    TypeNameTaken { type_name: String },

    #[error("Pipeline step panicked: {message}")]
    StepPanicked { message: String },
}

impl RegistryError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotInitialized => "not_initialized",
            RegistryError::InvalidValue { .. } => "invalid_value",
            RegistryError::NilKey => "nil_key",
            RegistryError::KeyConversion { .. } => "key_conversion",
            RegistryError::MissingService { .. } => "missing_service",
            RegistryError::AlreadyRegistered { .. } => "already_registered",
            RegistryError::InvalidInput => "invalid_input",
            RegistryError::InvalidOutput => "invalid_output",
            RegistryError::TransformationFailed { .. } => "transformation_failed",
            RegistryError::TypeNotDeclared { .. } => "type_not_declared",
            RegistryError::TypeNameTaken { .. } => "type_name_taken",
            RegistryError::StepPanicked { .. } => "step_panicked",
        }
    }
}
