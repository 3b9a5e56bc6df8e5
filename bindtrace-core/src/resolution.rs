//! Resolution attempt tracking: one event per resolution stage entered.
//!
//! A [`ResolutionAttempt`] lives on the resolver's stack next to the status
//! code it reports on. The resolver calls [`ResolutionAttempt::go_to_stage`]
//! as it moves from one strategy to the next; moving on implies the previous
//! stage did not end the search, so its event is fired right away with
//! whatever identities were attached at that point. The stage that is
//! current when the attempt is dropped is reported from `Drop`.
//!
//! The status code is read lazily at classification time rather than
//! snapshotted, so a failure stored into the cell by an error path after the
//! attempt was created is still seen:
//!
//! ```
//! use std::cell::Cell;
//! use std::sync::Arc;
//! use bindtrace_core::{
//!     BinderTracer, CategoryGate, MemorySink, ResolutionAttempt, Stage, StatusCode,
//! };
//!
//! let sink = Arc::new(MemorySink::new());
//! let tracer = BinderTracer::new(Arc::new(CategoryGate::all()), sink.clone());
//!
//! let status = Cell::new(StatusCode::SUCCESS);
//! {
//!     let mut attempt = ResolutionAttempt::new(&tracer, &status);
//!     attempt.go_to_stage(Stage::FindInLoadContext).unwrap();
//!     status.set(StatusCode::FILE_NOT_FOUND);
//! }
//! assert_eq!(sink.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, trace};

use crate::error::{BindTraceError, Result};
use crate::event::{BinderEvent, ResolutionAttemptedEvent};
use crate::gate::EventCategory;
use crate::identity::{AssemblyIdentity, IdentityPolicy};
use crate::request::{LoadContextId, LoadedAssembly};
use crate::status::StatusCode;
use crate::tracer::BinderTracer;

/// Resolution strategies, in the priority order the resolver tries them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Stage {
    /// Look for an already-loaded module in the requesting context.
    FindInLoadContext = 0,
    /// Invoke the context's custom load hook.
    AssemblyLoadContextLoad = 1,
    /// Search well-known platform module locations.
    PlatformAssemblies = 2,
    /// Fall back to the default context.
    DefaultAssemblyLoadContextFallback = 3,
    /// Raise the context-level "resolving" event.
    AssemblyLoadContextResolvingEvent = 4,
    /// Raise the application-level "resolve" event.
    AppDomainAssemblyResolveEvent = 5,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::FindInLoadContext,
        Stage::AssemblyLoadContextLoad,
        Stage::PlatformAssemblies,
        Stage::DefaultAssemblyLoadContextFallback,
        Stage::AssemblyLoadContextResolvingEvent,
        Stage::AppDomainAssemblyResolveEvent,
    ];

    pub const fn ordinal(self) -> u16 {
        self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FindInLoadContext => "find_in_load_context",
            Stage::AssemblyLoadContextLoad => "assembly_load_context_load",
            Stage::PlatformAssemblies => "platform_assemblies",
            Stage::DefaultAssemblyLoadContextFallback => "default_assembly_load_context_fallback",
            Stage::AssemblyLoadContextResolvingEvent => "assembly_load_context_resolving_event",
            Stage::AppDomainAssemblyResolveEvent => "app_domain_assembly_resolve_event",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ResolutionResult {
    Success = 0,
    AssemblyNotFound = 1,
    IncompatibleVersion = 2,
    MismatchedAssemblyName = 3,
    Failure = 4,
}

impl ResolutionResult {
    pub const fn ordinal(self) -> u16 {
        self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionResult::Success => "success",
            ResolutionResult::AssemblyNotFound => "assembly_not_found",
            ResolutionResult::IncompatibleVersion => "incompatible_version",
            ResolutionResult::MismatchedAssemblyName => "mismatched_assembly_name",
            ResolutionResult::Failure => "failure",
        }
    }
}

impl fmt::Display for ResolutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one stage from the status code and the attached identities.
///
/// The order is significant: success short-circuits everything, and the
/// not-found check precedes the mismatch checks, which only make sense once
/// something was found.
pub fn classify(
    status: StatusCode,
    requested: Option<&AssemblyIdentity>,
    found: Option<&AssemblyIdentity>,
    policy: &dyn IdentityPolicy,
) -> ResolutionResult {
    if status.is_success() {
        return ResolutionResult::Success;
    }

    if status == StatusCode::FILE_NOT_FOUND {
        return ResolutionResult::AssemblyNotFound;
    }

    if let (Some(requested), Some(found)) = (requested, found) {
        if !policy.is_version_compatible(requested, found) {
            return ResolutionResult::IncompatibleVersion;
        }
        if !policy.names_match(requested, found) {
            return ResolutionResult::MismatchedAssemblyName;
        }
    }

    ResolutionResult::Failure
}

fn error_message(
    result: ResolutionResult,
    status: StatusCode,
    requested: Option<&AssemblyIdentity>,
    found: Option<&AssemblyIdentity>,
) -> Option<String> {
    let version_of = |identity: Option<&AssemblyIdentity>| {
        identity
            .and_then(|i| i.version)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    };
    let name_of = |identity: Option<&AssemblyIdentity>| {
        identity.map(|i| i.name.clone()).unwrap_or_default()
    };

    match result {
        ResolutionResult::Success => None,
        ResolutionResult::AssemblyNotFound => Some("Could not locate assembly".to_string()),
        ResolutionResult::IncompatibleVersion => Some(format!(
            "Requested version {} is incompatible with found version {}",
            version_of(requested),
            version_of(found)
        )),
        ResolutionResult::MismatchedAssemblyName => Some(format!(
            "Requested assembly name '{}' does not match found assembly name '{}'",
            name_of(requested),
            name_of(found)
        )),
        ResolutionResult::Failure => Some(format!("Failed with status {status}")),
    }
}

/// Scoped tracker for one resolution attempt.
///
/// `status` must outlive the attempt and is only ever read. Identity
/// snapshots are shared handles and may be replaced any number of times;
/// they affect the next stage that gets classified.
#[derive(Debug)]
pub struct ResolutionAttempt<'a> {
    tracer: &'a BinderTracer,
    status: &'a Cell<StatusCode>,

    /// `None` until the first stage is entered.
    stage: Option<Stage>,
    visited: u8,
    stage_started: Option<Instant>,

    assembly_name: Option<Arc<AssemblyIdentity>>,
    found_assembly: Option<Arc<LoadedAssembly>>,
    managed_context: Option<LoadContextId>,

    enabled: bool,
}

impl<'a> ResolutionAttempt<'a> {
    pub fn new(tracer: &'a BinderTracer, status: &'a Cell<StatusCode>) -> Self {
        Self {
            tracer,
            status,
            stage: None,
            visited: 0,
            stage_started: None,
            assembly_name: None,
            found_assembly: None,
            managed_context: None,
            enabled: tracer.is_enabled(EventCategory::ResolutionAttempted),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The stage currently being attempted, if any.
    pub fn current_stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn set_assembly_name(&mut self, assembly_name: Arc<AssemblyIdentity>) {
        if self.enabled {
            self.assembly_name = Some(assembly_name);
        }
    }

    pub fn set_managed_context(&mut self, context: LoadContextId) {
        if self.enabled {
            self.managed_context = Some(context);
        }
    }

    pub fn set_found_assembly(&mut self, assembly: Arc<LoadedAssembly>) {
        if self.enabled {
            self.found_assembly = Some(assembly);
        }
    }

    /// Move on to `next`, reporting the current stage first.
    ///
    /// Entering a stage twice is a caller bug: it is rejected with
    /// [`BindTraceError::StageRevisited`] and nothing is emitted.
    pub fn go_to_stage(&mut self, next: Stage) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.visited & next.bit() != 0 {
            error!(
                stage = %next,
                current = ?self.stage,
                "Resolution stage entered twice; ignoring transition"
            );
            return Err(BindTraceError::StageRevisited { stage: next });
        }

        self.trace_stage_end();

        trace!(stage = %next, "Entering resolution stage");
        self.stage = Some(next);
        self.visited |= next.bit();
        self.stage_started = Some(Instant::now());
        Ok(())
    }

    fn trace_stage_end(&self) {
        let Some(stage) = self.stage else {
            return;
        };

        let status = self.status.get();
        let requested = self.assembly_name.as_deref();
        let found = self.found_assembly.as_deref();
        let found_identity = found.map(|a| &a.identity);

        let result = classify(
            status,
            requested,
            found_identity,
            self.tracer.identity_policy(),
        );

        let event = ResolutionAttemptedEvent {
            assembly_name: requested.map(|i| i.to_string()),
            stage,
            load_context: self.managed_context,
            result,
            result_assembly_name: found_identity.map(|i| i.to_string()),
            result_assembly_path: found.and_then(|a| a.path_string()),
            error_message: error_message(result, status, requested, found_identity),
            duration_us: self
                .stage_started
                .map(|started| started.elapsed().as_micros() as u64)
                .unwrap_or(0),
        };

        self.tracer.emit(BinderEvent::ResolutionAttempted(event));
    }
}

impl Drop for ResolutionAttempt<'_> {
    fn drop(&mut self) {
        if self.enabled {
            self.trace_stage_end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DefaultIdentityPolicy, Version};

    fn identity(name: &str, version: (u16, u16)) -> AssemblyIdentity {
        AssemblyIdentity::new(name).with_version(Version::new(version.0, version.1, 0, 0))
    }

    #[test]
    fn test_classify_success_without_identities() {
        let result = classify(StatusCode::SUCCESS, None, None, &DefaultIdentityPolicy);
        assert_eq!(result, ResolutionResult::Success);
    }

    #[test]
    fn test_classify_not_found_precedes_mismatch() {
        let requested = identity("Contoso", (2, 0));
        let found = identity("Fabrikam", (1, 0));
        let result = classify(
            StatusCode::FILE_NOT_FOUND,
            Some(&requested),
            Some(&found),
            &DefaultIdentityPolicy,
        );
        assert_eq!(result, ResolutionResult::AssemblyNotFound);
    }

    #[test]
    fn test_classify_version_precedes_name() {
        let requested = identity("Contoso", (2, 0));
        let found = identity("Fabrikam", (1, 0));
        let result = classify(StatusCode::FAIL, Some(&requested), Some(&found), &DefaultIdentityPolicy);
        assert_eq!(result, ResolutionResult::IncompatibleVersion);
    }

    #[test]
    fn test_classify_name_mismatch() {
        let requested = identity("Contoso", (2, 0));
        let found = identity("Fabrikam", (2, 5));
        let result = classify(StatusCode::FAIL, Some(&requested), Some(&found), &DefaultIdentityPolicy);
        assert_eq!(result, ResolutionResult::MismatchedAssemblyName);
    }

    #[test]
    fn test_classify_falls_back_to_failure() {
        let requested = identity("Contoso", (2, 0));
        let matching = identity("Contoso", (2, 0));

        assert_eq!(
            classify(StatusCode::FAIL, Some(&requested), None, &DefaultIdentityPolicy),
            ResolutionResult::Failure
        );
        assert_eq!(
            classify(StatusCode::FAIL, None, Some(&matching), &DefaultIdentityPolicy),
            ResolutionResult::Failure
        );
        assert_eq!(
            classify(StatusCode::FAIL, Some(&requested), Some(&matching), &DefaultIdentityPolicy),
            ResolutionResult::Failure
        );
    }

    #[test]
    fn test_error_messages() {
        let requested = identity("Contoso", (2, 0));
        let found = identity("Contoso", (1, 0));

        assert_eq!(
            error_message(ResolutionResult::Success, StatusCode::SUCCESS, None, None),
            None
        );
        assert_eq!(
            error_message(
                ResolutionResult::IncompatibleVersion,
                StatusCode::FAIL,
                Some(&requested),
                Some(&found)
            )
            .as_deref(),
            Some("Requested version 2.0.0.0 is incompatible with found version 1.0.0.0")
        );
        assert_eq!(
            error_message(ResolutionResult::Failure, StatusCode::FAIL, None, None).as_deref(),
            Some("Failed with status 0x80004005")
        );
    }

    #[test]
    fn test_stage_ordinals_follow_priority_order() {
        for (index, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.ordinal() as usize, index);
        }
        assert_eq!(ResolutionResult::Failure.ordinal(), 4);
        assert_eq!(
            serde_json::to_value(Stage::PlatformAssemblies).unwrap(),
            "platform_assemblies"
        );
    }
}
