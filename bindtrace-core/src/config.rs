//! Trace configuration loaded from YAML.
//!
//! ```yaml
//! enabled: true
//! categories: [assembly_loader, resolution_attempted, known_path_probed]
//! sink:
//!   kind: json_lines        # tracing | json_lines | none
//!   path: ./bindtrace.jsonl # json_lines only; stdout when absent
//! ```
//!
//! Every field is optional. `BINDTRACE_CATEGORIES` (`all`, `none`, or a
//! comma-separated list) overrides `categories` when applied.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::gate::{CategoryGate, EventCategory};
use crate::sink::{EventSink, JsonLinesSink, NullSink, TracingSink};
use crate::tracer::BinderTracer;

/// Environment variable overriding the configured categories.
pub const CATEGORIES_ENV: &str = "BINDTRACE_CATEGORIES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Tracing,
    JsonLines,
    None,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Tracing => "tracing",
            SinkKind::JsonLines => "json_lines",
            SinkKind::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Master switch; when false no category is enabled.
    pub enabled: bool,

    pub categories: Vec<EventCategory>,

    pub sink: SinkConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: EventCategory::ALL.to_vec(),
            sink: SinkConfig::default(),
        }
    }
}

impl TraceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace config: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid trace config: {}", path.display()))?;
        debug!("Loaded trace config from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Apply `BINDTRACE_CATEGORIES` if it is set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let Ok(value) = std::env::var(CATEGORIES_ENV) else {
            return Ok(());
        };

        self.categories = parse_category_list(&value)
            .with_context(|| format!("Invalid {CATEGORIES_ENV} value '{value}'"))?;
        info!(
            categories = ?self.categories,
            "Trace categories overridden from environment"
        );
        Ok(())
    }

    /// The categories that will actually be collected.
    pub fn effective_categories(&self) -> Vec<EventCategory> {
        if !self.enabled {
            return Vec::new();
        }
        let gate = CategoryGate::with_categories(self.categories.iter().copied());
        gate.enabled_categories()
    }

    pub fn build_gate(&self) -> CategoryGate {
        CategoryGate::with_categories(self.effective_categories())
    }

    /// Build a tracer using the configured sink.
    pub fn build_tracer(&self) -> Result<BinderTracer> {
        let sink: Arc<dyn EventSink> = match self.sink.kind {
            SinkKind::Tracing => Arc::new(TracingSink),
            SinkKind::None => Arc::new(NullSink),
            SinkKind::JsonLines => match &self.sink.path {
                Some(path) => {
                    Arc::new(JsonLinesSink::new(open_append(path)?)) as Arc<dyn EventSink>
                }
                None => Arc::new(JsonLinesSink::new(std::io::stdout())),
            },
        };
        Ok(self.build_tracer_with_sink(sink))
    }

    /// Build a tracer that delivers to `sink`, ignoring the configured sink.
    pub fn build_tracer_with_sink(&self, sink: Arc<dyn EventSink>) -> BinderTracer {
        BinderTracer::new(Arc::new(self.build_gate()), sink)
    }
}

/// Parse `all`, `none`, or a comma-separated list of category names.
pub fn parse_category_list(value: &str) -> Result<Vec<EventCategory>> {
    match value.trim() {
        "all" => Ok(EventCategory::ALL.to_vec()),
        "none" | "" => Ok(Vec::new()),
        list => list
            .split(',')
            .map(|name| name.parse::<EventCategory>().map_err(Into::into))
            .collect(),
    }
}

fn open_append(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open event log {}", path.display()))
}
