//! Rule file materializer
//!
//! One pass drains the pending batch, applies every entity to the current
//! rule file in arrival order, checks the candidate and swaps it in.
//!
//! ```text
//! Idle -> Draining -> Rewriting -> Validating -> Publishing -> Idle
//! ```
//!
//! Every failure after draining is fatal: the caller must stop rather than
//! leave Prometheus with a rule set that was never checked.

use crate::batch::PendingBatch;
use crate::domain::EntityDescriptor;
use crate::error::MaterializeError;
use crate::rules::{RuleDocument, RuleTemplate};
use crate::services::checker::RuleChecker;
use crate::services::publisher::AtomicPublisher;

use std::fmt;

/// Current step of the pass state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializerState {
    Idle,
    Draining,
    Rewriting,
    Validating,
    Publishing,
}

impl fmt::Display for MaterializerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Draining => write!(f, "draining"),
            Self::Rewriting => write!(f, "rewriting"),
            Self::Validating => write!(f, "validating"),
            Self::Publishing => write!(f, "publishing"),
        }
    }
}

/// Counts from applying one drained batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Entities taken from the batch
    pub drained: usize,
    /// Entities applied to the document
    pub applied: usize,
    /// Malformed entities skipped
    pub skipped: usize,
    /// Fragments removed (including replaced ones)
    pub removed: usize,
    /// Fragments in the resulting document
    pub rules: usize,
}

/// Result of a materialization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing was pending; the rule file was not touched
    Empty,
    /// The batch did not change the rule file; nothing was published
    Unchanged(PassSummary),
    /// A new revision was published
    Published {
        summary: PassSummary,
        /// Full text of the published revision
        document: String,
    },
}

impl PassOutcome {
    /// Published text, if this pass published one
    pub fn document(&self) -> Option<&str> {
        match self {
            Self::Published { document, .. } => Some(document),
            _ => None,
        }
    }
}

/// Drains batches into the rule file
pub struct Materializer {
    publisher: AtomicPublisher,
    checker: Box<dyn RuleChecker>,
    template: RuleTemplate,
    state: MaterializerState,
}

impl Materializer {
    /// Create a materializer
    pub fn new(
        publisher: AtomicPublisher,
        checker: Box<dyn RuleChecker>,
        template: RuleTemplate,
    ) -> Self {
        Self {
            publisher,
            checker,
            template,
            state: MaterializerState::Idle,
        }
    }

    pub fn state(&self) -> MaterializerState {
        self.state
    }

    pub fn publisher(&self) -> &AtomicPublisher {
        &self.publisher
    }

    /// Lay down a header-only rule file, replacing any previous one
    pub fn initialize(&self) -> Result<(), MaterializeError> {
        self.publisher.replace(&RuleDocument::new().render())?;
        log::info!(
            "Initialized rule file {}",
            self.publisher.path().display()
        );
        Ok(())
    }

    /// Run one pass over everything currently pending
    pub fn run_pass(&mut self, batch: &PendingBatch) -> Result<PassOutcome, MaterializeError> {
        self.state = MaterializerState::Draining;
        let entities = batch.drain_all();
        if entities.is_empty() {
            self.state = MaterializerState::Idle;
            return Ok(PassOutcome::Empty);
        }
        log::info!("{} entities to flush into rule file", entities.len());

        let outcome = self.materialize(&entities);
        self.state = MaterializerState::Idle;
        outcome
    }

    fn materialize(
        &mut self,
        entities: &[EntityDescriptor],
    ) -> Result<PassOutcome, MaterializeError> {
        self.state = MaterializerState::Rewriting;
        let current = self.publisher.read()?;
        let mut document = RuleDocument::parse(&current);
        let mut summary = apply_all(&mut document, entities, &self.template);
        summary.rules = document.len();

        let candidate = document.render();
        if candidate == current {
            log::info!(
                "Rule file unchanged after {} entities, skipping publication",
                summary.drained
            );
            return Ok(PassOutcome::Unchanged(summary));
        }

        self.state = MaterializerState::Validating;
        let staged = self.publisher.stage(&candidate)?;
        if let Err(source) = self.checker.check(staged) {
            let path = staged.to_path_buf();
            self.publisher.discard();
            return Err(MaterializeError::Rejected { path, source });
        }

        self.state = MaterializerState::Publishing;
        self.publisher.commit()?;
        log::info!(
            "Published {} rules to {} ({} applied, {} skipped)",
            summary.rules,
            self.publisher.path().display(),
            summary.applied,
            summary.skipped
        );

        Ok(PassOutcome::Published {
            summary,
            document: candidate,
        })
    }
}

/// Apply entities in arrival order so a later event for a key wins
pub fn apply_all(
    document: &mut RuleDocument,
    entities: &[EntityDescriptor],
    template: &RuleTemplate,
) -> PassSummary {
    let mut summary = PassSummary {
        drained: entities.len(),
        ..PassSummary::default()
    };

    for entity in entities {
        match document.apply(entity, template) {
            Ok(applied) => {
                summary.applied += 1;
                summary.removed += applied.removed;
                log::debug!("Applied {} ({} replaced)", entity, applied.removed);
            }
            Err(e) => {
                summary.skipped += 1;
                log::warn!("Skipping malformed entity {}: {}", entity, e);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TriggerConfig;
    use crate::error::Stage;
    use crate::mock::MockChecker;
    use crate::rules::FILE_HEADER;
    use crate::services::checker::NoopChecker;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup(checker: Box<dyn RuleChecker>) -> (TempDir, Materializer, PendingBatch) {
        let dir = tempdir().unwrap();
        let publisher = AtomicPublisher::new(dir.path().join("rules.yml"));
        let materializer = Materializer::new(publisher, checker, RuleTemplate::default());
        materializer.initialize().unwrap();
        (dir, materializer, PendingBatch::new(TriggerConfig::default()))
    }

    #[test]
    fn test_initialize_writes_header() {
        let (_dir, materializer, _batch) = setup(Box::new(NoopChecker));
        assert_eq!(materializer.publisher().read().unwrap(), FILE_HEADER);
        assert_eq!(materializer.state(), MaterializerState::Idle);
    }

    #[test]
    fn test_empty_drain_is_noop() {
        let checker = MockChecker::accepting();
        let (_dir, mut materializer, batch) = setup(Box::new(checker.clone()));
        let before = fs::read(materializer.publisher().path()).unwrap();

        let outcome = materializer.run_pass(&batch).unwrap();

        assert_eq!(outcome, PassOutcome::Empty);
        assert_eq!(fs::read(materializer.publisher().path()).unwrap(), before);
        assert_eq!(checker.calls(), 0);
    }

    #[test]
    fn test_pass_publishes_fragment() {
        let checker = MockChecker::accepting();
        let (_dir, mut materializer, batch) = setup(Box::new(checker.clone()));
        batch.append(vec![EntityDescriptor::added("ns1", "pod1", "c1", "0.5")]);

        let outcome = materializer.run_pass(&batch).unwrap();
        let text = materializer.publisher().read().unwrap();

        assert_eq!(outcome.document(), Some(text.as_str()));
        assert!(text.starts_with(FILE_HEADER));
        assert!(text.contains("ns1/pod1/c1/CPU"));
        assert!(text.contains("/ 0.5 > 0.8"));
        assert_eq!(checker.calls(), 1);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_checker_sees_candidate_path() {
        let checker = MockChecker::accepting();
        let (_dir, mut materializer, batch) = setup(Box::new(checker.clone()));
        batch.append(vec![EntityDescriptor::added("ns1", "pod1", "c1", "0.5")]);
        materializer.run_pass(&batch).unwrap();

        assert_eq!(
            checker.last_path().as_deref(),
            Some(materializer.publisher().temp_path())
        );
        assert!(checker.last_content().unwrap().contains("ns1/pod1/c1/CPU"));
    }

    #[test]
    fn test_last_write_wins_within_batch() {
        let (_dir, mut materializer, batch) = setup(Box::new(NoopChecker));
        batch.append(vec![
            EntityDescriptor::added("ns1", "pod1", "c1", "0.5"),
            EntityDescriptor::added("ns1", "pod1", "c1", "2"),
        ]);
        materializer.run_pass(&batch).unwrap();

        let doc = RuleDocument::parse(&materializer.publisher().read().unwrap());
        assert_eq!(doc.len(), 1);
        assert!(doc.fragments()[0].text.contains("/ 2 > 0.8"));
    }

    #[test]
    fn test_rejected_candidate_keeps_document() {
        let (_dir, mut materializer, batch) = setup(Box::new(NoopChecker));
        batch.append(vec![EntityDescriptor::added("ns1", "pod1", "c1", "0.5")]);
        materializer.run_pass(&batch).unwrap();
        let before = materializer.publisher().read().unwrap();

        let mut materializer = Materializer::new(
            materializer.publisher().clone(),
            Box::new(MockChecker::rejecting("bad rule")),
            RuleTemplate::default(),
        );
        batch.append(vec![EntityDescriptor::added("ns2", "pod2", "c2", "1")]);
        let err = materializer.run_pass(&batch).unwrap_err();

        assert_eq!(err.stage(), Stage::Validate);
        assert_eq!(materializer.publisher().read().unwrap(), before);
        assert!(!materializer.publisher().temp_path().exists());
        assert_eq!(materializer.state(), MaterializerState::Idle);
    }

    #[test]
    fn test_malformed_entity_skipped() {
        let (_dir, mut materializer, batch) = setup(Box::new(NoopChecker));
        batch.append(vec![
            EntityDescriptor::added("ns1", "", "c1", "0.5"),
            EntityDescriptor::added("ns1", "pod1", "c1", "0.5"),
        ]);

        match materializer.run_pass(&batch).unwrap() {
            PassOutcome::Published { summary, .. } => {
                assert_eq!(summary.drained, 2);
                assert_eq!(summary.applied, 1);
                assert_eq!(summary.skipped, 1);
                assert_eq!(summary.rules, 1);
            }
            other => panic!("Expected published pass, got {:?}", other),
        }
    }

    #[test]
    fn test_unchanged_document_not_republished() {
        let checker = MockChecker::accepting();
        let (_dir, mut materializer, batch) = setup(Box::new(checker.clone()));
        batch.append(vec![EntityDescriptor::removed("ns1", "ghost")]);

        let outcome = materializer.run_pass(&batch).unwrap();
        assert!(matches!(outcome, PassOutcome::Unchanged(s) if s.drained == 1));
        assert_eq!(checker.calls(), 0);
    }

    #[test]
    fn test_missing_live_file_is_fatal() {
        let (_dir, mut materializer, batch) = setup(Box::new(NoopChecker));
        fs::remove_file(materializer.publisher().path()).unwrap();
        batch.append(vec![EntityDescriptor::added("ns1", "pod1", "c1", "0.5")]);

        let err = materializer.run_pass(&batch).unwrap_err();
        assert_eq!(err.stage(), Stage::Rewrite);
    }
}
