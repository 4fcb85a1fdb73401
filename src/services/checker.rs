//! Rule syntax checking
//!
//! The candidate rule file is checked before it replaces the live one. The
//! checker is always pointed at the candidate's temporary path, never at the
//! live file.

use crate::error::CheckError;
use std::path::Path;
use std::process::Command;

/// External rule-syntax checker
pub trait RuleChecker: Send {
    /// Check the rule file at `path`
    fn check(&self, path: &Path) -> Result<(), CheckError>;

    /// Checker name for logging
    fn name(&self) -> &str;
}

/// Runs `promtool check rules <path>`
#[derive(Debug, Clone)]
pub struct PromtoolChecker {
    command: String,
}

impl PromtoolChecker {
    /// Create a checker invoking the given promtool binary
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for PromtoolChecker {
    fn default() -> Self {
        Self::new("promtool")
    }
}

impl RuleChecker for PromtoolChecker {
    fn check(&self, path: &Path) -> Result<(), CheckError> {
        log::debug!("Running {} check rules {}", self.command, path.display());

        let output = Command::new(&self.command)
            .args(["check", "rules"])
            .arg(path)
            .output()
            .map_err(|source| CheckError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if detail.is_empty() {
            detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        if detail.is_empty() {
            detail = format!("exited with {}", output.status);
        }
        Err(CheckError::Syntax(detail))
    }

    fn name(&self) -> &str {
        "promtool"
    }
}

/// Accepts every candidate (checking disabled)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChecker;

impl RuleChecker for NoopChecker {
    fn check(&self, _path: &Path) -> Result<(), CheckError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}
