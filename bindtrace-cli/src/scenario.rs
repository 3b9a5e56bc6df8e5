//! Scripted binder scenarios
//!
//! A scenario describes one load request and the stages a resolver walks
//! through to satisfy it. Replaying it drives the real trackers, so the
//! emitted events are exactly what an instrumented resolver would produce.
//!
//! ```yaml
//! request:
//!   identity: { name: Contoso.Widgets, version: "2.0.0.0" }
//!   requesting_assembly: { name: App, version: "1.0.0.0" }
//!   load_context: { id: 7, name: Plugins }
//! managed_context: 7
//! stages:
//!   - stage: find_in_load_context
//!     outcome: not_found
//!   - stage: platform_assemblies
//!     probes:
//!       - { path: /opt/app/Contoso.Widgets.dll, source: app_paths, outcome: success }
//!     found:
//!       identity: { name: Contoso.Widgets, version: "2.1.0.0" }
//!       path: /opt/app/Contoso.Widgets.dll
//!     outcome: success
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use bindtrace_core::{
    path_probed, AssemblySpec, BindOperation, BinderEvent, BinderTracer, CategoryGate,
    EventCategory, LoadContextId, LoadedAssembly, MemorySink, PathSource, ResolutionAttempt,
    Stage, StatusCode,
};

/// How a stage or probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    #[default]
    NotFound,
    Failure,
}

impl Outcome {
    pub fn status(self) -> StatusCode {
        match self {
            Outcome::Success => StatusCode::SUCCESS,
            Outcome::NotFound => StatusCode::FILE_NOT_FOUND,
            Outcome::Failure => StatusCode::FAIL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStep {
    pub path: PathBuf,
    pub source: PathSource,
    #[serde(default)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStep {
    pub stage: Stage,

    #[serde(default)]
    pub outcome: Outcome,

    /// Raw signed status code; takes precedence over `outcome`.
    #[serde(default)]
    pub status: Option<StatusCode>,

    /// Module the stage found, if any. Stays attached for later stages.
    #[serde(default)]
    pub found: Option<LoadedAssembly>,

    #[serde(default)]
    pub probes: Vec<ProbeStep>,
}

impl StageStep {
    fn status_code(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.outcome.status())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub request: AssemblySpec,

    /// Path given when the request is a load-from-path.
    #[serde(default)]
    pub assembly_path: Option<PathBuf>,

    #[serde(default)]
    pub managed_context: Option<LoadContextId>,

    /// Whether a successful result came from the load context's cache.
    #[serde(default)]
    pub cached: bool,

    /// Categories collected while replaying; all of them when absent.
    #[serde(default)]
    pub categories: Option<Vec<EventCategory>>,

    #[serde(default)]
    pub stages: Vec<StageStep>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let scenario = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Invalid scenario: {}", path.display()))?;
        debug!("Loaded scenario from {:?}", path);
        Ok(scenario)
    }

    /// Build a tracer collecting this scenario's categories into `sink`.
    pub fn tracer(&self, sink: Arc<MemorySink>) -> BinderTracer {
        let gate = match &self.categories {
            Some(categories) => CategoryGate::with_categories(categories.iter().copied()),
            None => CategoryGate::all(),
        };
        BinderTracer::new(Arc::new(gate), sink)
    }

    /// Replay the scenario and return the events it produced, in order.
    pub fn run(&self) -> Result<Vec<BinderEvent>> {
        let sink = Arc::new(MemorySink::new());
        let tracer = self.tracer(sink.clone());
        self.replay(&tracer)?;
        Ok(sink.drain())
    }

    /// Replay the scenario against an arbitrary tracer.
    pub fn replay(&self, tracer: &BinderTracer) -> Result<()> {
        info!(assembly = %self.request.identity, stages = self.stages.len(), "Replaying scenario");

        let mut operation = BindOperation::new(tracer, &self.request, self.assembly_path.as_deref());
        let status = Cell::new(StatusCode::SUCCESS);
        let mut resolved: Option<Arc<LoadedAssembly>> = None;

        {
            let mut attempt = ResolutionAttempt::new(tracer, &status);
            attempt.set_assembly_name(Arc::new(self.request.identity.clone()));
            if let Some(context) = self.managed_context {
                attempt.set_managed_context(context);
            }

            let mut found: Option<Arc<LoadedAssembly>> = None;
            for (index, step) in self.stages.iter().enumerate() {
                attempt
                    .go_to_stage(step.stage)
                    .with_context(|| format!("Stage #{} ({}) is out of order", index + 1, step.stage))?;

                for probe in &step.probes {
                    path_probed(tracer, &probe.path, probe.source, probe.outcome.status());
                }

                if let Some(assembly) = &step.found {
                    let assembly = Arc::new(assembly.clone());
                    attempt.set_found_assembly(assembly.clone());
                    found = Some(assembly);
                }

                let code = step.status_code();
                status.set(code);

                if code.is_success() {
                    resolved = Some(found.clone().unwrap_or_else(|| {
                        Arc::new(LoadedAssembly::new(self.request.identity.clone()))
                    }));
                    let skipped = self.stages.len() - index - 1;
                    if skipped > 0 {
                        warn!(skipped, stage = %step.stage, "Stages after a successful stage are not replayed");
                    }
                    break;
                }
            }
        }

        operation.set_result(resolved.as_deref(), self.cached && resolved.is_some());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindtrace_core::ResolutionResult;
    use pretty_assertions::assert_eq;

    const PLUGIN_SCENARIO: &str = r#"
request:
  identity: { name: Contoso.Widgets, version: "2.0.0.0" }
  requesting_assembly: { name: App, version: "1.0.0.0" }
  load_context: { id: 7, name: Plugins }
managed_context: 7
stages:
  - stage: find_in_load_context
    outcome: not_found
  - stage: platform_assemblies
    probes:
      - { path: /opt/app/ni/Contoso.Widgets.dll, source: app_native_image_paths, outcome: not_found }
      - { path: /opt/app/Contoso.Widgets.dll, source: app_paths, outcome: success }
    found:
      identity: { name: Contoso.Widgets, version: "2.1.0.0" }
      path: /opt/app/Contoso.Widgets.dll
    outcome: success
  - stage: app_domain_assembly_resolve_event
"#;

    #[test]
    fn test_replay_successful_bind() {
        let scenario: Scenario = serde_yaml_ng::from_str(PLUGIN_SCENARIO).unwrap();
        let events = scenario.run().unwrap();

        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "bind_start",
                "resolution_attempted",
                "path_probed",
                "path_probed",
                "resolution_attempted",
                "bind_stop",
            ]
        );

        let first = events[1].as_resolution_attempted().unwrap();
        assert_eq!(first.stage, Stage::FindInLoadContext);
        assert_eq!(first.result, ResolutionResult::AssemblyNotFound);
        assert_eq!(first.load_context, Some(LoadContextId(7)));

        let second = events[4].as_resolution_attempted().unwrap();
        assert_eq!(second.stage, Stage::PlatformAssemblies);
        assert_eq!(second.result, ResolutionResult::Success);

        let stop = events[5].as_bind_stop().unwrap();
        assert!(stop.success);
        assert_eq!(
            stop.result_assembly_path.as_deref(),
            Some("/opt/app/Contoso.Widgets.dll")
        );
    }

    #[test]
    fn test_replay_failed_bind() {
        let scenario: Scenario = serde_yaml_ng::from_str(
            r#"
request:
  identity: { name: Missing }
cached: true
stages:
  - stage: find_in_load_context
  - stage: default_assembly_load_context_fallback
    outcome: failure
"#,
        )
        .unwrap();

        let events = scenario.run().unwrap();
        let stop = events.last().unwrap().as_bind_stop().unwrap();
        assert!(!stop.success);
        assert!(!stop.cached);

        let last_attempt = events[2].as_resolution_attempted().unwrap();
        assert_eq!(last_attempt.result, ResolutionResult::Failure);
    }

    #[test]
    fn test_raw_status_overrides_outcome() {
        let step: StageStep = serde_yaml_ng::from_str(
            "stage: platform_assemblies\noutcome: success\nstatus: -2147024894\n",
        )
        .unwrap();
        assert_eq!(step.status_code(), StatusCode::FILE_NOT_FOUND);
    }

    #[test]
    fn test_category_subset() {
        let mut scenario: Scenario = serde_yaml_ng::from_str(PLUGIN_SCENARIO).unwrap();
        scenario.categories = Some(vec![EventCategory::KnownPathProbed]);

        let events = scenario.run().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.name() == "path_probed"));
    }

    #[test]
    fn test_revisited_stage_is_reported() {
        let scenario: Scenario = serde_yaml_ng::from_str(
            r#"
request:
  identity: { name: Contoso.Widgets }
stages:
  - stage: platform_assemblies
  - stage: find_in_load_context
  - stage: platform_assemblies
"#,
        )
        .unwrap();

        let err = scenario.run().unwrap_err();
        assert!(format!("{err:#}").contains("Stage #3"));
    }
}
