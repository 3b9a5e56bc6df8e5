//! Bind operation tracking: one start/stop event pair per load request.
//!
//! ## Lifecycle
//!
//! 1. Created by the resolver when a load request begins (`BindOperation::new()`)
//! 2. Outcome recorded once known (`set_result()`)
//! 3. Stop event written by `Drop`
//!
//! ## Drop Guard
//!
//! The stop event is emitted from `Drop`, so it fires exactly once whether
//! the resolver returns normally, bails out through `?`, or unwinds from a
//! panic.

use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{BindStartEvent, BindStopEvent, BinderEvent};
use crate::gate::EventCategory;
use crate::request::{AssemblySpec, BindRequest, LoadedAssembly};
use crate::tracer::BinderTracer;

/// Host-supplied rule deciding which binds are not worth tracing.
///
/// Consulted at most once per [`BindOperation`], and only while tracing is
/// enabled.
pub trait BindFilter: Send + Sync {
    fn should_ignore(&self, spec: &AssemblySpec) -> bool;
}

impl<F> BindFilter for F
where
    F: Fn(&AssemblySpec) -> bool + Send + Sync,
{
    fn should_ignore(&self, spec: &AssemblySpec) -> bool {
        self(spec)
    }
}

/// Filter that traces every bind.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceAllBinds;

impl BindFilter for TraceAllBinds {
    fn should_ignore(&self, _spec: &AssemblySpec) -> bool {
        false
    }
}

#[derive(Debug)]
struct BindResult {
    name: String,
    path: Option<String>,
}

/// Scoped tracker for a single load request.
///
/// The assembly spec and path are borrowed for the tracker's lifetime; the outcome is
/// snapshotted when recorded.
#[derive(Debug)]
pub struct BindOperation<'a> {
    tracer: &'a BinderTracer,
    spec: &'a AssemblySpec,
    assembly_path: Option<&'a Path>,

    /// Captured once at construction
    enabled: bool,

    /// Populated lazily, at most once
    request: Option<BindRequest>,

    /// Memoized ignore decision
    ignore_bind: Option<bool>,

    operation_id: Option<Uuid>,
    result: Option<BindResult>,
    result_recorded: bool,
    cached: bool,
}

impl<'a> BindOperation<'a> {
    /// Begin tracking a load request. Emits the start event if the
    /// `AssemblyLoader` category is enabled and the bind is not filtered out.
    pub fn new(
        tracer: &'a BinderTracer,
        spec: &'a AssemblySpec,
        assembly_path: Option<&'a Path>,
    ) -> Self {
        let enabled = tracer.is_enabled(EventCategory::AssemblyLoader);
        let mut operation = Self {
            tracer,
            spec,
            assembly_path,
            enabled,
            request: None,
            ignore_bind: None,
            operation_id: None,
            result: None,
            result_recorded: false,
            cached: false,
        };

        if operation.enabled && !operation.should_ignore_bind() {
            operation.fire_start();
        }

        operation
    }

    /// Record the terminal outcome. `None` means the bind failed.
    pub fn set_result(&mut self, assembly: Option<&LoadedAssembly>, cached: bool) {
        if !self.enabled {
            return;
        }

        if self.result_recorded {
            warn!(
                assembly = %self.spec.identity,
                "Bind result recorded more than once; keeping the latest"
            );
        }

        self.result_recorded = true;
        self.cached = cached;
        self.result = assembly.map(|a| BindResult {
            name: a.identity.to_string(),
            path: a.path_string(),
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Correlation id shared by this operation's start and stop events.
    pub fn operation_id(&self) -> Option<Uuid> {
        self.operation_id
    }

    fn should_ignore_bind(&mut self) -> bool {
        if let Some(ignore) = self.ignore_bind {
            return ignore;
        }

        let ignore = self.tracer.bind_filter().should_ignore(self.spec);
        if ignore {
            debug!(assembly = %self.spec.identity, "Bind filtered out of tracing");
        }
        self.ignore_bind = Some(ignore);
        ignore
    }

    fn populate_bind_request(&mut self) -> &BindRequest {
        let spec = self.spec;
        let assembly_path = self.assembly_path;
        self.request.get_or_insert_with(|| BindRequest {
            assembly_name: Some(spec.identity.to_string()),
            assembly_path: assembly_path.map(|p| p.display().to_string()),
            requesting_assembly: spec.requesting_assembly.as_ref().map(|a| a.to_string()),
            assembly_load_context: spec.load_context.as_ref().map(|c| c.to_string()),
            requesting_assembly_load_context: spec
                .requesting_load_context
                .as_ref()
                .map(|c| c.to_string()),
        })
    }

    fn operation_id_string(&mut self) -> String {
        self.operation_id.get_or_insert_with(Uuid::now_v7).to_string()
    }

    fn fire_start(&mut self) {
        let operation_id = self.operation_id_string();
        let request = self.populate_bind_request().clone();
        self.tracer.emit(BinderEvent::BindStart(BindStartEvent {
            operation_id,
            request,
        }));
    }

    fn fire_stop(&mut self) {
        let operation_id = self.operation_id_string();
        let request = self.populate_bind_request().clone();
        let result = self.result.take();
        self.tracer.emit(BinderEvent::BindStop(BindStopEvent {
            operation_id,
            request,
            success: result.is_some(),
            cached: self.cached,
            result_assembly_name: result.as_ref().map(|r| r.name.clone()),
            result_assembly_path: result.and_then(|r| r.path),
        }));
    }
}

impl Drop for BindOperation<'_> {
    fn drop(&mut self) {
        if !self.enabled || self.should_ignore_bind() {
            return;
        }

        if std::thread::panicking() {
            debug!(
                assembly = %self.spec.identity,
                "Bind operation unwinding; reporting as failed unless a result was recorded"
            );
        }

        self.fire_stop();
    }
}
