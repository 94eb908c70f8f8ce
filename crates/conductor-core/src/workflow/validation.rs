//! Pre-flight validation.
//!
//! The engine itself imposes no preconditions. Concrete workflows register
//! `Precondition`s (required input files, configured credentials, ...) and
//! `WorkflowEngine::validate` collects every failure message. Validation
//! failures are returned as data and never raised.

use std::path::PathBuf;

use serde::Serialize;

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A passing report with no errors.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Record a failure. Marks the report invalid.
    pub fn push(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::ok()
    }
}

/// A check that must hold before a workflow runs.
pub trait Precondition: Send + Sync {
    /// Return a human-readable message when the precondition does not hold.
    fn check(&self) -> Result<(), String>;
}

impl<F> Precondition for F
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    fn check(&self) -> Result<(), String> {
        self()
    }
}

/// Requires a file (fixture, upload payload, ...) to exist on disk.
#[derive(Debug, Clone)]
pub struct RequiredFile {
    pub path: PathBuf,
}

impl RequiredFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Precondition for RequiredFile {
    fn check(&self) -> Result<(), String> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(format!("required file not found: {}", self.path.display()))
        }
    }
}

/// Requires an environment variable (typically a credential) to be set and
/// non-empty.
#[derive(Debug, Clone)]
pub struct RequiredEnv {
    pub var: String,
}

impl RequiredEnv {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Precondition for RequiredEnv {
    fn check(&self) -> Result<(), String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(()),
            _ => Err(format!("required environment variable '{}' is not set", self.var)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn report_push_invalidates() {
        let mut report = ValidationReport::ok();
        assert!(report.valid);
        report.push("missing fixture");
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["missing fixture".to_string()]);
    }

    #[test]
    fn required_file() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("doc.pdf");
        std::fs::write(&present, b"%PDF").unwrap();

        assert!(RequiredFile::new(&present).check().is_ok());
        let err = RequiredFile::new(tmp.path().join("absent.pdf"))
            .check()
            .unwrap_err();
        assert!(err.contains("absent.pdf"));
        // A directory is not a file.
        assert!(RequiredFile::new(tmp.path()).check().is_err());
    }

    #[test]
    fn required_env_missing() {
        let err = RequiredEnv::new("CONDUCTOR_TEST_SURELY_UNSET_VAR")
            .check()
            .unwrap_err();
        assert!(err.contains("CONDUCTOR_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn closure_precondition() {
        let always = || Err::<(), String>("credentials not configured".to_string());
        assert_eq!(always.check().unwrap_err(), "credentials not configured");
    }
}
