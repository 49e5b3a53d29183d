#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Switches for one analysis run. Read from the `[check]` table of
/// `veritas.toml`; every key is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Run the ownership/borrow pass.
    pub ownership: bool,
    /// Report calls performing effects the caller does not declare.
    pub effects: bool,
    /// Compute per-binding live ranges during the ownership pass.
    pub track_lifetimes: bool,
    /// Cap on reported errors per pass; 0 means unlimited.
    pub max_errors: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            ownership: true,
            effects: true,
            track_lifetimes: false,
            max_errors: 0,
        }
    }
}

impl CheckConfig {
    /// Truncate `errors` to the configured cap.
    pub fn limit<T>(&self, errors: &mut Vec<T>) {
        if self.max_errors > 0 {
            errors.truncate(self.max_errors);
        }
    }
}
