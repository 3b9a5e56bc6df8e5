//! The shared tracing context borrowed by every tracker.
//!
//! A [`BinderTracer`] bundles the enablement gate, the event sink and the two
//! host-supplied policies. It is cheap to clone (all parts are `Arc`s) and
//! safe to share across threads; the trackers themselves are not.

use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::bind::{BindFilter, TraceAllBinds};
use crate::error::{BindTraceError, Result};
use crate::event::BinderEvent;
use crate::gate::{CategoryGate, EnablementGate, EventCategory};
use crate::identity::{DefaultIdentityPolicy, IdentityPolicy};
use crate::sink::{EventSink, NullSink};

#[derive(Clone)]
pub struct BinderTracer {
    gate: Arc<dyn EnablementGate>,
    sink: Arc<dyn EventSink>,
    identity_policy: Arc<dyn IdentityPolicy>,
    bind_filter: Arc<dyn BindFilter>,
}

impl BinderTracer {
    /// Create a tracer with the default identity policy and no bind filtering.
    pub fn new(gate: Arc<dyn EnablementGate>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            gate,
            sink,
            identity_policy: Arc::new(DefaultIdentityPolicy),
            bind_filter: Arc::new(TraceAllBinds),
        }
    }

    /// A tracer for which every category is off.
    pub fn disabled() -> Self {
        Self::new(Arc::new(CategoryGate::none()), Arc::new(NullSink))
    }

    pub fn with_identity_policy(mut self, policy: Arc<dyn IdentityPolicy>) -> Self {
        self.identity_policy = policy;
        self
    }

    pub fn with_bind_filter(mut self, filter: Arc<dyn BindFilter>) -> Self {
        self.bind_filter = filter;
        self
    }

    pub fn is_enabled(&self, category: EventCategory) -> bool {
        self.gate.is_enabled(category)
    }

    pub fn identity_policy(&self) -> &dyn IdentityPolicy {
        self.identity_policy.as_ref()
    }

    pub fn bind_filter(&self) -> &dyn BindFilter {
        self.bind_filter.as_ref()
    }

    pub(crate) fn emit(&self, event: BinderEvent) {
        trace!(event = event.name(), "Emitting binder event");
        self.sink.emit(&event);
    }
}

impl fmt::Debug for BinderTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled: Vec<&str> = EventCategory::ALL
            .iter()
            .filter(|c| self.is_enabled(**c))
            .map(|c| c.as_str())
            .collect();
        f.debug_struct("BinderTracer")
            .field("enabled", &enabled)
            .finish_non_exhaustive()
    }
}

static GLOBAL_TRACER: OnceCell<BinderTracer> = OnceCell::new();

static DISABLED_TRACER: Lazy<BinderTracer> = Lazy::new(BinderTracer::disabled);

/// Install the process-wide tracer. Only the first call succeeds.
pub fn install(tracer: BinderTracer) -> Result<()> {
    GLOBAL_TRACER
        .set(tracer)
        .map_err(|_| BindTraceError::TracerAlreadyInstalled)?;
    debug!("Installed process-wide binder tracer");
    Ok(())
}

/// The process-wide tracer, or a disabled one if none was installed.
pub fn global() -> &'static BinderTracer {
    GLOBAL_TRACER.get().unwrap_or(&*DISABLED_TRACER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_disabled_tracer_reports_nothing_enabled() {
        let tracer = BinderTracer::disabled();
        for category in EventCategory::ALL {
            assert!(!tracer.is_enabled(category));
        }
        assert!(format!("{tracer:?}").contains("enabled: []"));
    }

    #[test]
    fn test_gate_changes_are_visible_through_tracer() {
        let gate = Arc::new(CategoryGate::none());
        let tracer = BinderTracer::new(gate.clone(), Arc::new(MemorySink::new()));

        assert!(!tracer.is_enabled(EventCategory::KnownPathProbed));
        gate.enable(EventCategory::KnownPathProbed);
        assert!(tracer.is_enabled(EventCategory::KnownPathProbed));
    }

    #[test]
    fn test_global_install_is_once() {
        let sink = Arc::new(MemorySink::new());
        let tracer = BinderTracer::new(Arc::new(CategoryGate::all()), sink);

        install(tracer.clone()).unwrap();
        assert!(global().is_enabled(EventCategory::AssemblyLoader));
        assert_eq!(install(tracer), Err(BindTraceError::TracerAlreadyInstalled));
    }
}
