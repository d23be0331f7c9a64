//! Workflow loader - reads workflow definition files
//!
//! JSON is the default format; files ending in `.yaml` or `.yml` are parsed
//! as YAML.

use super::graph::{validate, Graph};
use super::types::{NodeSpec, WorkflowFile};
use crate::engine::error::{DragoError, LoadError};
use std::fs;
use std::path::Path;

/// Loads workflow definitions from disk
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load the node specifications from a workflow file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<Vec<NodeSpec>, LoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file = if is_yaml(path) {
            Self::parse_yaml(&content)?
        } else {
            Self::parse_json(&content)?
        };

        if let Some(name) = file.name() {
            log::info!("Loaded workflow '{}' from {}", name, path.display());
        }
        Ok(file.into_nodes())
    }

    /// Load a workflow file and build a validated graph from it.
    ///
    /// The decoded specifications are returned alongside so callers can
    /// build fresh graphs for later runs.
    pub async fn load_graph<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(Vec<NodeSpec>, Graph), DragoError> {
        let specs = self.load_workflow(path)?;
        let graph = Graph::from_specs(specs.clone());
        validate(&graph).await?;
        Ok((specs, graph))
    }

    /// Parse a workflow definition from a JSON string
    pub fn parse_json(content: &str) -> Result<WorkflowFile, LoadError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowFile, LoadError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}
