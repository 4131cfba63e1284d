//! Declarative workflow metadata for `loomctl workflow list|describe`.
//!
//! `WorkflowDefinition` carries a live `Arc<dyn Executor>`, which only
//! exists inside a running `serve` process — this CLI has no plugin
//! loader (an explicit non-goal) to construct one out of process. So
//! introspection instead reads a lightweight manifest of metadata only:
//! name, description, trigger event types and priority, and timeout. A
//! `serve` embedder is expected to keep this manifest in sync with the
//! workflows it actually registers in code.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_manifest_path() -> &'static str {
    "workflows.yaml"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "eventTypes")]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(rename = "timeoutSecs", default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowManifest {
    #[serde(default)]
    pub workflows: Vec<WorkflowMetadata>,
}

impl WorkflowManifest {
    /// Loads the manifest at `path`, or an explicit default path if none
    /// is given. A missing default file is treated as an empty manifest;
    /// an explicitly-given missing path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => {
                let default_path = Path::new(default_manifest_path());
                if default_path.exists() {
                    Self::from_yaml_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workflow manifest {}", path.display()))?;
        let deserializer = serde_yaml::Deserializer::from_str(&content);
        serde_path_to_error::deserialize(deserializer)
            .with_context(|| format!("failed to parse workflow manifest {}", path.display()))
    }

    pub fn find(&self, name: &str) -> Option<&WorkflowMetadata> {
        self.workflows.iter().find(|workflow| workflow.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_manifest_is_empty() {
        let manifest = WorkflowManifest::load(None).unwrap();
        assert!(manifest.workflows.is_empty());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let error = WorkflowManifest::load(Some(Path::new("/nonexistent/workflows.yaml")));
        assert!(error.is_err());
    }

    #[test]
    fn parses_declared_workflows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.yaml");
        std::fs::write(
            &path,
            "workflows:\n  - name: triage\n    description: Triages incoming alerts\n    eventTypes: [DATA_ARRIVED]\n    priority: 10\n",
        )
        .unwrap();

        let manifest = WorkflowManifest::load(Some(&path)).unwrap();
        assert_eq!(manifest.workflows.len(), 1);
        assert_eq!(manifest.find("triage").unwrap().priority, 10);
        assert!(manifest.find("missing").is_none());
    }
}
