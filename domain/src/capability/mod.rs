//! Request capabilities and their classification.
//!
//! - [`Capability`]: the closed set of handlers a request can be routed to
//! - [`rule::CapabilityRule`]: one pluggable routing rule
//! - [`classifier::CapabilityClassifier`]: ordered rules with a chat fallback

pub mod classifier;
pub mod rule;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which handler owns a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Streaming chat completion (default)
    #[default]
    Chat,
    /// One-shot image generation
    Draw,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Draw => "draw",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
