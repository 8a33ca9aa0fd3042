//! Invalidation levels shared by properties and processors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much of a processor's computed state is stale.
///
/// Ordered: `Valid < InvalidOutput < InvalidResources`. Invalid resources
/// imply invalid outputs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum InvalidationLevel {
    #[default]
    Valid,
    /// Outputs must be recomputed from the current resources.
    InvalidOutput,
    /// Internal resources (buffers, shaders, caches) must be rebuilt as well.
    InvalidResources,
}

impl InvalidationLevel {
    #[inline]
    pub fn is_valid(self) -> bool {
        self == InvalidationLevel::Valid
    }

    pub fn label(self) -> &'static str {
        match self {
            InvalidationLevel::Valid => "valid",
            InvalidationLevel::InvalidOutput => "invalid output",
            InvalidationLevel::InvalidResources => "invalid resources",
        }
    }
}

impl fmt::Display for InvalidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
