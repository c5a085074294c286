//! Middleware example for service-registry.
//!
//! Demonstrates:
//! - Declaring service types at registration time
//! - Enforcing declared types at retrieval time
//! - Custom registration and retrieval steps
//! - Observing the system with `tracing` and a trace callback
//!
//! Run with: `RUST_LOG=service_registry=debug cargo run --example service_pipeline`

use service_registry::{
    allow_one_time_registration, get_step, registration_step, ErrorMode, RegistryContext,
    RegistryError, Service, ServiceValue, System, SystemConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

trait Storage: Send + Sync {
    fn describe(&self) -> String;
}

struct Postgres {
    url: String,
}

impl Storage for Postgres {
    fn describe(&self) -> String {
        format!("postgres at {}", self.url)
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!("=== service-registry: Service Pipeline ===\n");

    let config = SystemConfig::new().enforce_declared_types(ErrorMode::Generate);
    let system = System::with_config(Arc::new(RegistryContext::new()), config);
    system.set_trace_callback(|event| println!("   [trace] {}", event));

    // -------------------------------------------------------------------------
    // 1. Register with a declared type
    // -------------------------------------------------------------------------
    println!("1. Registering storage as `Storage`...");

    let storage_type = system.service_type::<Arc<dyn Storage>>("Storage").unwrap();
    let storage: Arc<dyn Storage> = Arc::new(Postgres {
        url: "localhost:5432".to_string(),
    });
    system
        .register_service(
            &Service::new("storage", storage),
            &[allow_one_time_registration(), storage_type.accept()],
        )
        .unwrap();

    // -------------------------------------------------------------------------
    // 2. Retrieve it through the declared type
    // -------------------------------------------------------------------------
    println!("\n2. Retrieving storage...");

    let storage = system.get_service("storage", &storage_type, &[]).unwrap();
    println!("   {}", storage.describe());

    if let Err(err) = system.get("storage", "Cache", &[]) {
        println!("   as `Cache`: {}", err);
    }

    // -------------------------------------------------------------------------
    // 3. Custom steps
    // -------------------------------------------------------------------------
    println!("\n3. Running custom steps...");

    let reserved = registration_step(|cx| {
        if cx.name().starts_with('_') {
            cx.fail(RegistryError::InvalidValue {
                what: "reserved name",
            });
        }
    });
    if let Err(err) = system.register("_internal", ServiceValue::new(()), &[reserved]) {
        println!("   _internal: {}", err);
    }

    let fallback = get_step(|cx| {
        if cx.value().is_none() {
            cx.set_value(Some(ServiceValue::new(30u64)));
        }
    });
    let timeout: u64 = system.get_as("timeout", "u64", &[fallback]).unwrap();
    println!("   timeout (fallback) = {}", timeout);

    println!("\n=== Example completed successfully! ===");
}
