//! Enablement gate: "is this event category currently being collected?"
//!
//! Trackers query the gate once at construction and keep the answer for
//! their whole lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::BindTraceError;

/// One category per event kind the core emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Bind start/stop pairs.
    AssemblyLoader,
    /// One event per resolution stage.
    ResolutionAttempted,
    /// Filesystem probe reports.
    KnownPathProbed,
}

impl EventCategory {
    pub const ALL: [EventCategory; 3] = [
        EventCategory::AssemblyLoader,
        EventCategory::ResolutionAttempted,
        EventCategory::KnownPathProbed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::AssemblyLoader => "assembly_loader",
            EventCategory::ResolutionAttempted => "resolution_attempted",
            EventCategory::KnownPathProbed => "known_path_probed",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            EventCategory::AssemblyLoader => 1 << 0,
            EventCategory::ResolutionAttempted => 1 << 1,
            EventCategory::KnownPathProbed => 1 << 2,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = BindTraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "assembly_loader" => Ok(EventCategory::AssemblyLoader),
            "resolution_attempted" => Ok(EventCategory::ResolutionAttempted),
            "known_path_probed" => Ok(EventCategory::KnownPathProbed),
            other => Err(BindTraceError::UnknownCategory {
                name: other.to_string(),
            }),
        }
    }
}

/// Process-wide enablement query. Must be cheap and safe to call from any thread.
pub trait EnablementGate: Send + Sync {
    fn is_enabled(&self, category: EventCategory) -> bool;
}

/// Gate backed by an atomic bitmask; categories can be flipped at runtime.
#[derive(Debug, Default)]
pub struct CategoryGate {
    mask: AtomicU8,
}

impl CategoryGate {
    /// A gate with every category disabled.
    pub fn none() -> Self {
        Self::default()
    }

    /// A gate with every category enabled.
    pub fn all() -> Self {
        Self::with_categories(EventCategory::ALL)
    }

    pub fn with_categories(categories: impl IntoIterator<Item = EventCategory>) -> Self {
        let mask = categories.into_iter().fold(0u8, |acc, c| acc | c.bit());
        Self {
            mask: AtomicU8::new(mask),
        }
    }

    pub fn enable(&self, category: EventCategory) {
        self.mask.fetch_or(category.bit(), Ordering::Relaxed);
    }

    pub fn disable(&self, category: EventCategory) {
        self.mask.fetch_and(!category.bit(), Ordering::Relaxed);
    }

    pub fn enabled_categories(&self) -> Vec<EventCategory> {
        EventCategory::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

impl EnablementGate for CategoryGate {
    fn is_enabled(&self, category: EventCategory) -> bool {
        self.mask.load(Ordering::Relaxed) & category.bit() != 0
    }
}
