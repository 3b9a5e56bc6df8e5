//! Assembly identities and the comparison rules used to classify stages.
//!
//! The rules deciding whether a found assembly satisfies a request belong to
//! the host resolver; they are injected through [`IdentityPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BindTraceError;

/// Four-part assembly version (`major.minor.build.revision`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for Version {
    type Err = BindTraceError;

    /// Accepts two to four dot-separated components; missing ones are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BindTraceError::InvalidVersion {
            value: s.to_string(),
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(invalid());
        }

        let mut components = [0u16; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Version::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl TryFrom<String> for Version {
    type Error = BindTraceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Identity of a module as requested or as found on disk.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyIdentity {
    /// Simple name, e.g. `System.Text.Json`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_token: Option<String>,
}

impl AssemblyIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            culture: None,
            public_key_token: None,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub fn with_public_key_token(mut self, token: impl Into<String>) -> Self {
        self.public_key_token = Some(token.into());
        self
    }
}

/// Textual identity: `Name, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null`.
/// Parts that are unknown are left out.
impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, ", Version={version}")?;
        }
        if let Some(culture) = &self.culture {
            let culture = if culture.is_empty() { "neutral" } else { culture };
            write!(f, ", Culture={culture}")?;
        }
        if let Some(token) = &self.public_key_token {
            write!(f, ", PublicKeyToken={token}")?;
        }
        Ok(())
    }
}

/// Comparison rules owned by the host resolver's identity model.
pub trait IdentityPolicy: Send + Sync {
    /// Whether `found` satisfies the version constraint of `requested`.
    fn is_version_compatible(&self, requested: &AssemblyIdentity, found: &AssemblyIdentity)
        -> bool;

    /// Whether the simple names of the two identities refer to the same module.
    fn names_match(&self, requested: &AssemblyIdentity, found: &AssemblyIdentity) -> bool;
}

/// Default rules: any found version at or above the requested one is
/// compatible, and simple names compare ASCII case-insensitively.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultIdentityPolicy;

impl IdentityPolicy for DefaultIdentityPolicy {
    fn is_version_compatible(
        &self,
        requested: &AssemblyIdentity,
        found: &AssemblyIdentity,
    ) -> bool {
        match (&requested.version, &found.version) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(actual)) => actual >= wanted,
        }
    }

    fn names_match(&self, requested: &AssemblyIdentity, found: &AssemblyIdentity) -> bool {
        requested.name.eq_ignore_ascii_case(&found.name)
    }
}
