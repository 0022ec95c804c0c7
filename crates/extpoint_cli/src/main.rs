//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `extpoint_core` linkage.
//! - Walk one extension point end-to-end against the global registry.

use extpoint_core::{ExtensionRegistry, Implementation, PointDescriptor};
use std::sync::Arc;

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

#[derive(Default)]
struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self) -> String {
        "hello from extpoint".to_string()
    }
}

fn main() {
    println!("extpoint_core ping={}", extpoint_core::ping());
    println!("extpoint_core version={}", extpoint_core::core_version());

    // Probe the registry wiring without descriptor files: register a point,
    // bind one implementation, and confirm lookup diagnostics work.
    let registry = ExtensionRegistry::global();
    if let Err(err) = registry.register_point::<dyn Greeter>(PointDescriptor::new("cli.Greeter")) {
        println!("register_point failed: {err}");
        return;
    }
    if let Err(err) = registry.bind_implementation(
        Implementation::<dyn Greeter>::new::<EnglishGreeter, _>("cli::EnglishGreeter", || {
            Ok(Arc::new(EnglishGreeter))
        })
        .named("english"),
    ) {
        println!("bind_implementation failed: {err}");
        return;
    }

    match registry.get_loader::<dyn Greeter>() {
        Ok(loader) => match loader.get_extension("english") {
            Ok(greeter) => println!("greeter says: {}", greeter.greet()),
            // Expected without a descriptor file on EXTPOINT_PATH; the
            // error still names the missing extension.
            Err(err) => println!("lookup: {err}"),
        },
        Err(err) => println!("get_loader failed: {err}"),
    }
}
