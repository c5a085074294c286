//! Basic usage example for service-registry.
//!
//! Demonstrates:
//! - Registering services by name
//! - Retrieving them with `get_as()`
//! - The default one-time registration policy
//! - The keyed `ConcurrentRegistry` underneath
//!
//! Run with: `cargo run --example basic_usage`

use service_registry::{ConcurrentRegistry, RegistryContext, ServiceValue, System};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct AppConfig {
    name: String,
    version: u32,
    debug_mode: bool,
}

fn main() {
    println!("=== service-registry: Basic Usage ===\n");

    let system = System::new(Arc::new(RegistryContext::new()));

    // -------------------------------------------------------------------------
    // 1. Register services
    // -------------------------------------------------------------------------
    println!("1. Registering services...");

    let config = AppConfig {
        name: "MyApp".to_string(),
        version: 1,
        debug_mode: true,
    };
    system
        .register("config", ServiceValue::comparable(config.clone()), &[])
        .unwrap();
    system
        .register("port", ServiceValue::new(8080u16), &[])
        .unwrap();

    println!("   Registered: config, port");

    // -------------------------------------------------------------------------
    // 2. Retrieve them
    // -------------------------------------------------------------------------
    println!("\n2. Retrieving services...");

    let retrieved: AppConfig = system.get_as("config", "AppConfig", &[]).unwrap();
    let port: u16 = system.get_as("port", "u16", &[]).unwrap();
    println!("   config = {:?}", retrieved);
    println!("   port   = {}", port);

    // -------------------------------------------------------------------------
    // 3. One-time registration
    // -------------------------------------------------------------------------
    println!("\n3. Re-registering...");

    let same = system.register("config", ServiceValue::comparable(config), &[]);
    println!("   same value      -> {}", if same.is_ok() { "ok" } else { "rejected" });

    let different = system.register("port", ServiceValue::new(9090u16), &[]);
    match different {
        Ok(_) => println!("   different value -> ok"),
        Err(err) => println!("   different value -> {} ({})", err, err.code()),
    }

    // -------------------------------------------------------------------------
    // 4. Missing services
    // -------------------------------------------------------------------------
    println!("\n4. Looking up a missing service...");

    if let Err(err) = system.get("cache", "Cache", &[]) {
        println!("   {}", err);
    }

    // -------------------------------------------------------------------------
    // 5. The keyed registry
    // -------------------------------------------------------------------------
    println!("\n5. Using ConcurrentRegistry directly...");

    let hits: ConcurrentRegistry<u32, u64> = ConcurrentRegistry::new();
    hits.register(&404u32, 3);
    hits.register(&200u32, 120);
    println!("   hits[200] = {}", hits.get(&200u32));
    println!("   hits[500] = {} (default for unknown keys)", hits.get(&500u32));

    println!("\n=== Example completed successfully! ===");
}
