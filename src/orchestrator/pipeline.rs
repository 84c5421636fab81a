//! Pipeline definitions
//!
//! A pipeline is an ordered list of phases; a phase is an ordered, non-empty
//! list of operations. Pipelines are loaded from TOML:
//!
//! ```toml
//! name = "nightly-billing"
//!
//! [parameters]
//! app_name = "billing"
//!
//! [[phases]]
//! name = "extract"
//!
//! [[phases.operations]]
//! id = "OB01"
//! command = "python3 obtain.py --data-set={app_name}"
//! critical_path = true
//!
//! [phases.operations.alternative]
//! id = "OB01-mirror"
//! command = "python3 obtain.py --mirror --data-set={app_name}"
//! ```

use crate::errors::{OrchestratorError, Result};
use crate::types::{Operation, OperationId, Parameters};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Ordered group of operations that must jointly succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,

    /// Failures in this phase do not halt the run
    #[serde(default)]
    pub non_blocking: bool,

    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            non_blocking: false,
            operations: Vec::new(),
        }
    }

    pub fn non_blocking(mut self) -> Self {
        self.non_blocking = true;
        self
    }

    /// Append an operation, binding it (and its alternative) to this phase
    pub fn with_operation(mut self, mut operation: Operation) -> Self {
        bind_phase(&mut operation, &self.name);
        self.operations.push(operation);
        self
    }
}

/// Pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Base parameter values for every operation
    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: BTreeMap::new(),
            parameters: Parameters::new(),
            phases: Vec::new(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Load and validate a pipeline file. Relative working directories are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OrchestratorError::InvalidPipeline(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut pipeline = Self::from_toml_str(&content)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            for phase in &mut pipeline.phases {
                for operation in &mut phase.operations {
                    resolve_working_dir(operation, base);
                }
            }
        }

        Ok(pipeline)
    }

    /// Parse and validate a pipeline from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut pipeline: Pipeline = toml::from_str(content)?;

        for phase in &mut pipeline.phases {
            let name = phase.name.clone();
            for operation in &mut phase.operations {
                bind_phase(operation, &name);
            }
        }

        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check structural rules
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidPipeline(
                "pipeline name must not be empty".to_string(),
            ));
        }

        if self.phases.is_empty() {
            return Err(OrchestratorError::InvalidPipeline(format!(
                "pipeline '{}' has no phases",
                self.name
            )));
        }

        let mut phase_names = HashSet::new();
        let mut ids: HashSet<&OperationId> = HashSet::new();

        for phase in &self.phases {
            if !phase_names.insert(phase.name.as_str()) {
                return Err(OrchestratorError::InvalidPipeline(format!(
                    "duplicate phase '{}'",
                    phase.name
                )));
            }

            if phase.operations.is_empty() {
                return Err(OrchestratorError::InvalidPipeline(format!(
                    "phase '{}' has no operations",
                    phase.name
                )));
            }

            for operation in &phase.operations {
                validate_operation(operation, &mut ids)?;

                if let Some(alternative) = &operation.alternative {
                    if alternative.alternative.is_some() {
                        return Err(OrchestratorError::InvalidPipeline(format!(
                            "alternative '{}' of '{}' cannot declare its own alternative",
                            alternative.id, operation.id
                        )));
                    }
                    validate_operation(alternative, &mut ids)?;
                }
            }
        }

        Ok(())
    }

    pub fn operation_count(&self) -> usize {
        self.phases.iter().map(|p| p.operations.len()).sum()
    }
}

fn validate_operation<'a>(operation: &'a Operation, ids: &mut HashSet<&'a OperationId>) -> Result<()> {
    if operation.id.as_str().trim().is_empty() {
        return Err(OrchestratorError::InvalidPipeline(
            "operation id must not be empty".to_string(),
        ));
    }

    if !ids.insert(&operation.id) {
        return Err(OrchestratorError::InvalidPipeline(format!(
            "duplicate operation id '{}'",
            operation.id
        )));
    }

    if operation.command.trim().is_empty() {
        return Err(OrchestratorError::InvalidPipeline(format!(
            "operation '{}' has an empty command",
            operation.id
        )));
    }

    if operation.critical_path && operation.optional {
        return Err(OrchestratorError::InvalidPipeline(format!(
            "operation '{}' cannot be both critical_path and optional",
            operation.id
        )));
    }

    if operation.timeout_secs == Some(0) {
        return Err(OrchestratorError::InvalidPipeline(format!(
            "operation '{}' has a zero timeout",
            operation.id
        )));
    }

    Ok(())
}

fn bind_phase(operation: &mut Operation, phase: &str) {
    operation.phase = phase.to_string();
    if let Some(alternative) = operation.alternative.as_mut() {
        alternative.phase = phase.to_string();
    }
}

fn resolve_working_dir(operation: &mut Operation, base: &Path) {
    if operation.working_dir.is_relative() {
        operation.working_dir = base.join(&operation.working_dir);
    }
    if let Some(alternative) = operation.alternative.as_mut() {
        resolve_working_dir(alternative, base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;
    use std::path::PathBuf;

    const NIGHTLY: &str = r#"
        name = "nightly-billing"

        [metadata]
        owner = "data-platform"

        [parameters]
        app_name = "billing"
        memory_limit_mb = 1024

        [[phases]]
        name = "extract"

        [[phases.operations]]
        id = "OB01"
        command = "python3 obtain.py --data-set={app_name}"
        critical_path = true

        [phases.operations.alternative]
        id = "OB01-mirror"
        command = "python3 obtain.py --mirror"

        [[phases]]
        name = "report"
        non_blocking = true

        [[phases.operations]]
        id = "GR01"
        command = "python3 generate_report.py"
        optional = true
        timeout_secs = 120
    "#;

    #[test]
    fn test_parse_pipeline() {
        let pipeline = Pipeline::from_toml_str(NIGHTLY).unwrap();

        assert_eq!(pipeline.name, "nightly-billing");
        assert_eq!(pipeline.metadata["owner"], "data-platform");
        assert_eq!(pipeline.parameters["memory_limit_mb"], ParamValue::Number(1024));
        assert_eq!(pipeline.phases.len(), 2);
        assert_eq!(pipeline.operation_count(), 2);

        let extract = &pipeline.phases[0];
        assert!(!extract.non_blocking);
        assert_eq!(extract.operations[0].phase, "extract");
        assert_eq!(extract.operations[0].alternative.as_ref().unwrap().phase, "extract");

        let report = &pipeline.phases[1];
        assert!(report.non_blocking);
        assert!(report.operations[0].optional);
        assert_eq!(report.operations[0].timeout_secs, Some(120));
    }

    #[test]
    fn test_rejects_empty_pipeline() {
        let err = Pipeline::from_toml_str("name = \"empty\"").unwrap_err();
        assert!(err.to_string().contains("no phases"));
    }

    #[test]
    fn test_rejects_empty_phase() {
        let pipeline = Pipeline::new("p").with_phase(Phase::new("extract"));
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids_including_alternatives() {
        let pipeline = Pipeline::new("p")
            .with_phase(Phase::new("extract").with_operation(
                Operation::new("OB01", "", "obtain.sh")
                    .with_alternative(Operation::new("CL01", "", "obtain_mirror.sh")),
            ))
            .with_phase(Phase::new("clean").with_operation(Operation::new("CL01", "", "clean.sh")));

        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate operation id 'CL01'"));
    }

    #[test]
    fn test_rejects_critical_and_optional() {
        let pipeline = Pipeline::new("p").with_phase(
            Phase::new("load").with_operation(Operation::new("LD01", "", "load.sh").critical().optional()),
        );
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_rejects_nested_alternative() {
        let nested = Operation::new("A2", "", "b.sh").with_alternative(Operation::new("A3", "", "c.sh"));
        let pipeline = Pipeline::new("p").with_phase(
            Phase::new("x").with_operation(Operation::new("A1", "", "a.sh").with_alternative(nested)),
        );
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_with_operation_binds_phase() {
        let phase = Phase::new("clean").with_operation(
            Operation::new("CL01", "", "clean.sh").with_alternative(Operation::new("CL01-alt", "", "clean2.sh")),
        );
        assert_eq!(phase.operations[0].phase, "clean");
        assert_eq!(phase.operations[0].alternative.as_ref().unwrap().phase, "clean");
    }

    #[test]
    fn test_load_resolves_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
            name = "p"
            [[phases]]
            name = "extract"
            [[phases.operations]]
            id = "OB01"
            command = "obtain.sh"
            working_dir = "jobs"
            "#,
        )
        .unwrap();

        let pipeline = Pipeline::load(&path).unwrap();
        assert_eq!(
            pipeline.phases[0].operations[0].working_dir,
            dir.path().join(PathBuf::from("jobs"))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Pipeline::load(Path::new("/nonexistent/pipeline.toml")).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidPipeline(_)));
    }
}
