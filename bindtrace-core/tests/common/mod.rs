//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern.

#![allow(dead_code)]

use bindtrace_core::{
    AssemblyIdentity, AssemblySpec, BinderEvent, BinderTracer, CategoryGate, EventCategory,
    LoadContext, LoadedAssembly, MemorySink, Version,
};
use std::sync::{Arc, Once};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A tracer with every category enabled, recording into memory.
pub fn recording_tracer() -> (BinderTracer, Arc<MemorySink>) {
    recording_tracer_for(EventCategory::ALL)
}

pub fn recording_tracer_for(
    categories: impl IntoIterator<Item = EventCategory>,
) -> (BinderTracer, Arc<MemorySink>) {
    init_test_logging();
    let sink = Arc::new(MemorySink::new());
    let gate = Arc::new(CategoryGate::with_categories(categories));
    (BinderTracer::new(gate, sink.clone()), sink)
}

pub fn versioned(name: &str, major: u16, minor: u16) -> AssemblyIdentity {
    AssemblyIdentity::new(name).with_version(Version::new(major, minor, 0, 0))
}

/// `Contoso.Widgets 2.0` requested by `App` in a custom context.
pub fn widgets_spec() -> AssemblySpec {
    AssemblySpec::new(versioned("Contoso.Widgets", 2, 0))
        .with_requesting_assembly(versioned("App", 1, 0))
        .with_load_context(LoadContext::named(7, "Plugins"))
        .with_requesting_load_context(LoadContext::named(1, "Default"))
}

pub fn loaded(identity: AssemblyIdentity, path: &str) -> LoadedAssembly {
    LoadedAssembly::new(identity).with_path(path)
}

pub fn event_names(events: &[BinderEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
