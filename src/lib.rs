//! # Service Registry
//!
//! A thread-safe keyed registry with a middleware-style service locator on top of it.
//!
//! The crate has three layers:
//!
//! - [`ConcurrentRegistry`]: a generic map from normalized key to a per-key [`Record`].
//!   Lookups and writes on distinct keys do not serialize behind a single lock.
//! - [`System`]: named registration and retrieval of type-erased [`ServiceValue`]s, with
//!   ordered, short-circuiting middleware chains for both directions.
//! - [`coerce`]: turns a type-erased value back into the static type a caller expects.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use service_registry::{RegistryContext, RegistryError, ServiceValue, System};
//!
//! let system = System::new(Arc::new(RegistryContext::new()));
//!
//! // Register a value
//! system
//!     .register("greeting", ServiceValue::comparable("Hello, World!".to_string()), &[])
//!     .unwrap();
//!
//! // Retrieve the value
//! let message: String = system.get_as("greeting", "String", &[]).unwrap();
//! assert_eq!(message, "Hello, World!");
//!
//! // A conflicting value is rejected by the default one-time registration policy
//! let err = system
//!     .register("greeting", ServiceValue::comparable("Bye".to_string()), &[])
//!     .unwrap_err();
//! assert_eq!(err, RegistryError::AlreadyRegistered { name: "greeting".into() });
//! ```
//!
//! ## Features
//!
//! - **Thread-safe**: two-level locking, structure lock plus one lock per record
//! - **Pluggable**: registration and retrieval middleware, see [`pipeline`]
//! - **Typed retrieval**: assignability, closed runtime conversions, and [`Adapt`]
//! - **Tracing support**: `tracing` logs plus an optional per-system event callback

mod coerce;
mod concurrent_registry;
mod context;
mod key;
pub mod pipeline;
mod record;
mod registry_error;
mod registry_event;
mod service;
mod service_value;
mod system;

pub use coerce::{coerce, coerce_into, convert, must_coerce, try_coerce};
pub use concurrent_registry::ConcurrentRegistry;
pub use context::RegistryContext;
pub use key::{ByUnique, RegistryKey, Unique};
pub use pipeline::{
    accept_service_type, allow_one_time_registration, get_step, matching_service_type,
    registration_step, ErrorMode, GetContext, GetStep, RegistrationContext, RegistrationStep,
};
pub use record::Record;
pub use registry_error::{RegistryError, Result};
pub use registry_event::RegistryEvent;
pub use service::{Service, ServiceType};
pub use service_value::{fill, Adapt, ServiceValue};
pub use system::{ServiceMap, System, SystemConfig, TraceCallback};
