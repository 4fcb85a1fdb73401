//! Mock implementations for testing
//!
//! Provides a scriptable rule checker and a recording propagation sink so
//! the materializer and engine can be tested without promtool or a cluster.

use crate::error::{CheckError, PropagationError};
use crate::propagation::Propagator;
use crate::services::checker::RuleChecker;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct CheckLog {
    calls: usize,
    last_path: Option<PathBuf>,
    last_content: Option<String>,
}

/// Mock rule checker
///
/// Clones share their call log, so a test can keep one clone and hand the
/// other to the materializer.
#[derive(Debug, Clone)]
pub struct MockChecker {
    rejection: Option<String>,
    log: Arc<Mutex<CheckLog>>,
}

impl MockChecker {
    /// Checker that accepts every candidate
    pub fn accepting() -> Self {
        Self {
            rejection: None,
            log: Arc::default(),
        }
    }

    /// Checker that rejects every candidate with `message`
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            rejection: Some(message.into()),
            log: Arc::default(),
        }
    }

    /// Number of checks run
    pub fn calls(&self) -> usize {
        self.log.lock().map(|log| log.calls).unwrap_or(0)
    }

    /// Path of the most recent check
    pub fn last_path(&self) -> Option<PathBuf> {
        self.log.lock().ok()?.last_path.clone()
    }

    /// Content of the most recent candidate, read at check time
    pub fn last_content(&self) -> Option<String> {
        self.log.lock().ok()?.last_content.clone()
    }
}

impl RuleChecker for MockChecker {
    fn check(&self, path: &Path) -> Result<(), CheckError> {
        if let Ok(mut log) = self.log.lock() {
            log.calls += 1;
            log.last_path = Some(path.to_path_buf());
            log.last_content = fs::read_to_string(path).ok();
        }

        match &self.rejection {
            Some(message) => Err(CheckError::Syntax(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Propagation sink that records every document it receives
#[derive(Debug, Clone)]
pub struct RecordingPropagator {
    name: String,
    fail: bool,
    documents: Arc<Mutex<Vec<String>>>,
}

impl RecordingPropagator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            documents: Arc::default(),
        }
    }

    /// Sink that records the document and then reports a failure
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Documents received so far, oldest first
    pub fn documents(&self) -> Vec<String> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

impl Propagator for RecordingPropagator {
    fn propagate(&self, document: &str) -> Result<(), PropagationError> {
        if let Ok(mut docs) = self.documents.lock() {
            docs.push(document.to_string());
        }
        if self.fail {
            return Err(PropagationError::NotConfigured(format!(
                "{} is set up to fail",
                self.name
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mock_checker_records_calls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.yml.tmp");
        fs::write(&path, "groups:\n").unwrap();

        let checker = MockChecker::accepting();
        let shared = checker.clone();
        assert!(checker.check(&path).is_ok());

        assert_eq!(shared.calls(), 1);
        assert_eq!(shared.last_path(), Some(path));
        assert_eq!(shared.last_content().as_deref(), Some("groups:\n"));
    }

    #[test]
    fn test_mock_checker_rejects() {
        let checker = MockChecker::rejecting("bad");
        let err = checker.check(Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, CheckError::Syntax(msg) if msg == "bad"));
        assert_eq!(checker.last_content(), None);
    }

    #[test]
    fn test_failing_propagator_still_records() {
        let sink = RecordingPropagator::failing("sink");
        assert!(sink.propagate("doc").is_err());
        assert_eq!(sink.documents(), vec!["doc".to_string()]);
        assert_eq!(sink.name(), "sink");
    }
}
