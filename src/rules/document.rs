//! In-memory rule file
//!
//! The rule file is parsed into its header and an ordered list of fragments
//! keyed by rule identity. Updates operate on that structure; the text is
//! produced again only when the pass publishes.

use crate::domain::{EntityDescriptor, KeySelector, RuleKey};
use crate::error::DomainError;
use crate::rules::codec::{self, RuleTemplate, FILE_HEADER, IDENTITY_PREFIX};

/// One rule block of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Identity recovered from the alert line; `None` for foreign rules
    pub key: Option<RuleKey>,
    /// Verbatim text, including the trailing newline
    pub text: String,
}

/// Effect of applying one entity to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Fragments removed before any insertion
    pub removed: usize,
    /// Whether a fresh fragment was appended
    pub inserted: bool,
}

/// Parsed rule file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocument {
    header: String,
    fragments: Vec<Fragment>,
}

impl Default for RuleDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleDocument {
    /// Header-only document
    pub fn new() -> Self {
        Self {
            header: FILE_HEADER.to_string(),
            fragments: Vec::new(),
        }
    }

    /// Parse rule file text
    ///
    /// Everything before the first identity line is kept as the header;
    /// each identity line starts a new fragment that runs until the next.
    pub fn parse(text: &str) -> Self {
        let mut header = String::new();
        let mut fragments: Vec<Fragment> = Vec::new();

        for line in text.split_inclusive('\n') {
            if line.starts_with(IDENTITY_PREFIX) {
                fragments.push(Fragment {
                    key: codec::decode_key(line),
                    text: line.to_string(),
                });
            } else if let Some(current) = fragments.last_mut() {
                current.text.push_str(line);
            } else {
                header.push_str(line);
            }
        }

        if header.is_empty() && fragments.is_empty() {
            return Self::new();
        }
        Self { header, fragments }
    }

    /// Render the full file text
    pub fn render(&self) -> String {
        let len = self.header.len() + self.fragments.iter().map(|f| f.text.len()).sum::<usize>();
        let mut out = String::with_capacity(len);
        out.push_str(&self.header);
        for fragment in &self.fragments {
            out.push_str(&fragment.text);
        }
        out
    }

    /// Number of fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Keys of all recognised fragments, in file order
    pub fn keys(&self) -> impl Iterator<Item = &RuleKey> {
        self.fragments.iter().filter_map(|f| f.key.as_ref())
    }

    /// Fragment text for a key
    pub fn get(&self, key: &RuleKey) -> Option<&str> {
        self.fragments
            .iter()
            .find(|f| f.key.as_ref() == Some(key))
            .map(|f| f.text.as_str())
    }

    /// Remove every fragment matched by the selector, returning how many
    pub fn remove(&mut self, selector: &KeySelector<'_>) -> usize {
        let before = self.fragments.len();
        self.fragments
            .retain(|f| !f.key.as_ref().is_some_and(|k| selector.matches(k)));
        before - self.fragments.len()
    }

    /// Replace any fragment for `key` with `text`, appended at the end
    ///
    /// Returns how many fragments were replaced.
    pub fn upsert(&mut self, key: RuleKey, text: String) -> usize {
        let selector = KeySelector {
            group_id: &key.group_id,
            unit_id: &key.unit_id,
            sub_unit_id: Some(&key.sub_unit_id),
        };
        let removed = self.remove(&selector);
        self.fragments.push(Fragment {
            key: Some(key),
            text,
        });
        removed
    }

    /// Apply one entity: strip its key, then append a fresh fragment unless
    /// the entity is a removal
    ///
    /// # Errors
    /// Returns a `DomainError` for a malformed entity, leaving the document
    /// untouched.
    pub fn apply(
        &mut self,
        entity: &EntityDescriptor,
        template: &RuleTemplate,
    ) -> Result<Applied, DomainError> {
        entity.validate()?;

        if entity.is_removed() {
            let removed = self.remove(&entity.selector());
            return Ok(Applied {
                removed,
                inserted: false,
            });
        }

        let text = template.encode(entity)?;
        let key = entity.key().ok_or(DomainError::MissingField("sub_unit_id"))?;
        let removed = self.upsert(key, text);
        Ok(Applied {
            removed,
            inserted: true,
        })
    }
}
