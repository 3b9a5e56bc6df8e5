//! Status codes reported by the external resolver.
//!
//! Codes follow the HRESULT convention: the sign bit marks failure, so any
//! non-negative value is a success.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit success/failure code owned by the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Operation completed successfully.
    pub const SUCCESS: StatusCode = StatusCode(0);

    /// The requested module could not be located.
    pub const FILE_NOT_FOUND: StatusCode = StatusCode(0x8007_0002_u32 as i32);

    /// Unspecified failure.
    pub const FAIL: StatusCode = StatusCode(0x8000_4005_u32 as i32);

    /// Build a code from its unsigned hexadecimal form (e.g. `0x80070002`).
    pub const fn from_bits(bits: u32) -> Self {
        StatusCode(bits as i32)
    }

    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::SUCCESS
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.bits())
    }
}
