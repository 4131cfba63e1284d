//! Capability-based driver selection (§9). The runtime never hardcodes a
//! specific AI backend; workflows declare what they need and the context's
//! driver factory picks the best match available.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LoomResult;

/// A capability requested by a workflow, e.g. `"text-generation"` or
/// `"structured-output"`. Opaque strings rather than an enum so new
/// capabilities don't require a core release.
pub type Capability = String;

/// What a workflow asks for when requesting a driver.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySpec {
    /// All of these must be satisfied by a candidate driver.
    pub required: Vec<Capability>,
    /// Used only to break ties between equally-qualifying drivers.
    pub preferred: Vec<Capability>,
}

impl CapabilitySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, capability: impl Into<Capability>) -> Self {
        self.required.push(capability.into());
        self
    }

    pub fn prefer(mut self, capability: impl Into<Capability>) -> Self {
        self.preferred.push(capability.into());
        self
    }
}

/// A disposable handle to a selected driver. Drivers are not cached across
/// workflow runs unless they declare `reusable() == true`.
#[async_trait]
pub trait Driver: Send + Sync {
    fn capabilities(&self) -> &[Capability];

    fn reusable(&self) -> bool {
        false
    }

    async fn invoke(&self, input: Value) -> LoomResult<Value>;
}

/// Enumerates available drivers and selects the highest-scoring one whose
/// required capability set is satisfied.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create_driver(&self, spec: &CapabilitySpec) -> LoomResult<Box<dyn Driver>>;
}

/// Scores a candidate's capability set against a spec. Returns `None` if a
/// required capability is missing.
pub fn score_candidate(spec: &CapabilitySpec, candidate_capabilities: &[Capability]) -> Option<u32> {
    for required in &spec.required {
        if !candidate_capabilities.contains(required) {
            return None;
        }
    }

    let score = spec
        .preferred
        .iter()
        .filter(|p| candidate_capabilities.contains(p))
        .count() as u32;

    Some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_capability_disqualifies() {
        let spec = CapabilitySpec::new().require("structured-output");
        assert!(score_candidate(&spec, &["text-generation".to_string()]).is_none());
    }

    #[test]
    fn preferred_capabilities_break_ties() {
        let spec = CapabilitySpec::new()
            .require("text-generation")
            .prefer("low-latency");

        let plain = vec!["text-generation".to_string()];
        let fast = vec!["text-generation".to_string(), "low-latency".to_string()];

        assert_eq!(score_candidate(&spec, &plain), Some(0));
        assert_eq!(score_candidate(&spec, &fast), Some(1));
    }
}
