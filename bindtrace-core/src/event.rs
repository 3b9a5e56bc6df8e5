//! Event payloads handed to the sink.
//!
//! Each variant is a flat set of named fields. Encoding beyond serde is the
//! sink's business.

use serde::{Deserialize, Serialize};

use crate::probe::PathSource;
use crate::request::{BindRequest, LoadContextId};
use crate::resolution::{ResolutionResult, Stage};
use crate::status::StatusCode;

/// Fired when a load request begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindStartEvent {
    /// Correlates the start with its stop (UUID v7).
    pub operation_id: String,

    #[serde(flatten)]
    pub request: BindRequest,
}

/// Fired once when a load request ends, carrying the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindStopEvent {
    pub operation_id: String,

    #[serde(flatten)]
    pub request: BindRequest,

    pub success: bool,
    pub cached: bool,
    pub result_assembly_name: Option<String>,
    pub result_assembly_path: Option<String>,
}

/// Fired once per resolution stage entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAttemptedEvent {
    pub assembly_name: Option<String>,
    pub stage: Stage,
    pub load_context: Option<LoadContextId>,
    pub result: ResolutionResult,
    pub result_assembly_name: Option<String>,
    pub result_assembly_path: Option<String>,
    pub error_message: Option<String>,
    pub duration_us: u64,
}

/// Fired for every filesystem/resource path the resolver probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathProbedEvent {
    pub path: String,
    pub source: PathSource,
    pub result: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BinderEvent {
    BindStart(BindStartEvent),
    BindStop(BindStopEvent),
    ResolutionAttempted(ResolutionAttemptedEvent),
    PathProbed(PathProbedEvent),
}

impl BinderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BinderEvent::BindStart(_) => "bind_start",
            BinderEvent::BindStop(_) => "bind_stop",
            BinderEvent::ResolutionAttempted(_) => "resolution_attempted",
            BinderEvent::PathProbed(_) => "path_probed",
        }
    }

    pub fn as_bind_stop(&self) -> Option<&BindStopEvent> {
        match self {
            BinderEvent::BindStop(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_resolution_attempted(&self) -> Option<&ResolutionAttemptedEvent> {
        match self {
            BinderEvent::ResolutionAttempted(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = BinderEvent::PathProbed(PathProbedEvent {
            path: "/app/Contoso.dll".into(),
            source: PathSource::AppPaths,
            result: StatusCode::FILE_NOT_FOUND,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "path_probed");
        assert_eq!(json["source"], "app_paths");
        assert_eq!(json["result"], StatusCode::FILE_NOT_FOUND.0);
    }

    #[test]
    fn test_bind_request_fields_are_flattened() {
        let event = BinderEvent::BindStop(BindStopEvent {
            operation_id: "op".into(),
            request: BindRequest {
                assembly_name: Some("Contoso".into()),
                ..Default::default()
            },
            success: false,
            cached: false,
            result_assembly_name: None,
            result_assembly_path: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "bind_stop");
        assert_eq!(json["assembly_name"], "Contoso");
        assert!(json["requesting_assembly"].is_null());
        assert_eq!(event.name(), "bind_stop");
        assert!(event.as_bind_stop().is_some());
        assert!(event.as_resolution_attempted().is_none());
    }
}
