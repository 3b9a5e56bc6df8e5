//! Descriptions of a load request as handed to the trackers by the resolver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::identity::AssemblyIdentity;

/// Opaque identifier of an isolation context (the managed load context handle).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadContextId(pub u64);

impl fmt::Display for LoadContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An isolation context within which identities resolve independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadContext {
    pub id: LoadContextId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LoadContext {
    pub fn new(id: u64) -> Self {
        Self {
            id: LoadContextId(id),
            name: None,
        }
    }

    pub fn named(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: LoadContextId(id),
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{}\" {}", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// The in-flight load request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblySpec {
    pub identity: AssemblyIdentity,

    /// Absent for top-level requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_assembly: Option<AssemblyIdentity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_context: Option<LoadContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_load_context: Option<LoadContext>,
}

impl AssemblySpec {
    pub fn new(identity: AssemblyIdentity) -> Self {
        Self {
            identity,
            requesting_assembly: None,
            load_context: None,
            requesting_load_context: None,
        }
    }

    pub fn with_requesting_assembly(mut self, requesting: AssemblyIdentity) -> Self {
        self.requesting_assembly = Some(requesting);
        self
    }

    pub fn with_load_context(mut self, context: LoadContext) -> Self {
        self.load_context = Some(context);
        self
    }

    pub fn with_requesting_load_context(mut self, context: LoadContext) -> Self {
        self.requesting_load_context = Some(context);
        self
    }
}

/// A module the resolver found or loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedAssembly {
    pub identity: AssemblyIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl LoadedAssembly {
    pub fn new(identity: AssemblyIdentity) -> Self {
        Self {
            identity,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.display().to_string())
    }
}

/// Request fields as they appear on bind events. Every field may be
/// unknown at emission time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRequest {
    pub assembly_name: Option<String>,
    pub assembly_path: Option<String>,
    pub requesting_assembly: Option<String>,
    pub assembly_load_context: Option<String>,
    pub requesting_assembly_load_context: Option<String>,
}
