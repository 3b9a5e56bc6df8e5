//! Event sinks.
//!
//! A sink owns delivery. It is shared across threads, must not block the
//! caller for long, and never reports failure back into a tracker: write
//! errors are logged and dropped.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::event::BinderEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BinderEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &BinderEvent) {}
}

/// Forwards events as structured `tracing` records on target `bindtrace::events`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &BinderEvent) {
        match event {
            BinderEvent::BindStart(e) => info!(
                target: "bindtrace::events",
                event = "bind_start",
                operation_id = %e.operation_id,
                assembly_name = ?e.request.assembly_name,
                assembly_path = ?e.request.assembly_path,
                requesting_assembly = ?e.request.requesting_assembly,
                assembly_load_context = ?e.request.assembly_load_context,
                requesting_assembly_load_context = ?e.request.requesting_assembly_load_context,
            ),
            BinderEvent::BindStop(e) => info!(
                target: "bindtrace::events",
                event = "bind_stop",
                operation_id = %e.operation_id,
                assembly_name = ?e.request.assembly_name,
                assembly_path = ?e.request.assembly_path,
                requesting_assembly = ?e.request.requesting_assembly,
                assembly_load_context = ?e.request.assembly_load_context,
                requesting_assembly_load_context = ?e.request.requesting_assembly_load_context,
                success = e.success,
                cached = e.cached,
                result_assembly_name = ?e.result_assembly_name,
                result_assembly_path = ?e.result_assembly_path,
            ),
            BinderEvent::ResolutionAttempted(e) => info!(
                target: "bindtrace::events",
                event = "resolution_attempted",
                assembly_name = ?e.assembly_name,
                stage = %e.stage,
                load_context = ?e.load_context,
                result = %e.result,
                result_assembly_name = ?e.result_assembly_name,
                result_assembly_path = ?e.result_assembly_path,
                error_message = ?e.error_message,
                duration_us = e.duration_us,
            ),
            BinderEvent::PathProbed(e) => info!(
                target: "bindtrace::events",
                event = "path_probed",
                path = %e.path,
                source = %e.source,
                result = %e.result,
            ),
        }
    }
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BinderEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<BinderEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return everything emitted so far.
    pub fn drain(&self) -> Vec<BinderEvent> {
        std::mem::take(&mut *self.lock())
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<BinderEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &BinderEvent) {
        self.lock().push(event.clone());
    }
}

/// Writes one JSON object per line (newline-terminated for log shippers).
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &BinderEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            warn!("Failed to write {} event: {}", event.name(), e);
        }
    }
}
