//! Stateless reporting of filesystem/resource probes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::event::{BinderEvent, PathProbedEvent};
use crate::gate::EventCategory;
use crate::status::StatusCode;
use crate::tracer::BinderTracer;

/// Which search location a probed path belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum PathSource {
    ApplicationAssemblies = 0,
    AppNativeImagePaths = 1,
    AppPaths = 2,
    PlatformResourceRoots = 3,
    SatelliteSubdirectory = 4,
}

impl PathSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathSource::ApplicationAssemblies => "application_assemblies",
            PathSource::AppNativeImagePaths => "app_native_image_paths",
            PathSource::AppPaths => "app_paths",
            PathSource::PlatformResourceRoots => "platform_resource_roots",
            PathSource::SatelliteSubdirectory => "satellite_subdirectory",
        }
    }
}

impl fmt::Display for PathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report one probe. No-op unless `KnownPathProbed` is enabled.
pub fn path_probed(tracer: &BinderTracer, path: &Path, source: PathSource, result: StatusCode) {
    if !tracer.is_enabled(EventCategory::KnownPathProbed) {
        return;
    }

    tracer.emit(BinderEvent::PathProbed(PathProbedEvent {
        path: path.display().to_string(),
        source,
        result,
    }));
}
