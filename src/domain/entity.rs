//! Entity descriptor types
//!
//! An entity descriptor is the unit of work handed from the event source to
//! the materializer: one container's identity, its CPU threshold, and whether
//! its rule should be added or removed.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identity of one alert rule: namespace, pod and container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    /// Namespace
    pub group_id: String,
    /// Pod name
    pub unit_id: String,
    /// Container name
    pub sub_unit_id: String,
}

impl RuleKey {
    /// Create a new rule key
    pub fn new(
        group_id: impl Into<String>,
        unit_id: impl Into<String>,
        sub_unit_id: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            unit_id: unit_id.into(),
            sub_unit_id: sub_unit_id.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group_id, self.unit_id, self.sub_unit_id)
    }
}

/// Selects the rules an entity replaces or deletes
///
/// A selector without a container matches every rule of the pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySelector<'a> {
    pub group_id: &'a str,
    pub unit_id: &'a str,
    pub sub_unit_id: Option<&'a str>,
}

impl KeySelector<'_> {
    /// Check whether a rule key falls under this selector
    pub fn matches(&self, key: &RuleKey) -> bool {
        key.group_id == self.group_id
            && key.unit_id == self.unit_id
            && self.sub_unit_id.map_or(true, |sub| key.sub_unit_id == sub)
    }
}

/// CPU threshold as a decimal string of cores (e.g. `0.5`, `2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Threshold(String);

impl Threshold {
    /// Create a threshold with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidThreshold` unless the value is a plain
    /// positive decimal number.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if !is_positive_decimal(&value) {
            return Err(DomainError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    /// Get the threshold text as rendered into the rule expression
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Threshold {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for String {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

fn is_positive_decimal(value: &str) -> bool {
    let (int, frac) = match value.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (value, None),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if int.is_empty() || !digits(int) {
        return false;
    }
    if let Some(frac) = frac {
        if frac.is_empty() || !digits(frac) {
            return false;
        }
    }
    value.bytes().any(|b| matches!(b, b'1'..=b'9'))
}

/// Add or remove intent for one monitored container
///
/// Descriptors are created by the event translator, copied into the pending
/// batch and consumed exactly once by the materializer. Removal descriptors
/// usually carry only namespace and pod, since the container set of a
/// deleted pod is no longer known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    group_id: String,
    unit_id: String,
    #[serde(default)]
    sub_unit_id: Option<String>,
    #[serde(default)]
    threshold: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl EntityDescriptor {
    /// Descriptor for a container whose rule should be created or replaced
    pub fn added(
        group_id: impl Into<String>,
        unit_id: impl Into<String>,
        sub_unit_id: impl Into<String>,
        threshold: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            unit_id: unit_id.into(),
            sub_unit_id: Some(sub_unit_id.into()),
            threshold: Some(threshold.into()),
            removed: false,
        }
    }

    /// Descriptor removing every rule of a pod
    pub fn removed(group_id: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            unit_id: unit_id.into(),
            sub_unit_id: None,
            threshold: None,
            removed: true,
        }
    }

    /// Descriptor removing the rule of a single container
    pub fn removed_container(
        group_id: impl Into<String>,
        unit_id: impl Into<String>,
        sub_unit_id: impl Into<String>,
    ) -> Self {
        Self {
            sub_unit_id: Some(sub_unit_id.into()),
            ..Self::removed(group_id, unit_id)
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn sub_unit_id(&self) -> Option<&str> {
        self.sub_unit_id.as_deref()
    }

    pub fn threshold(&self) -> Option<&str> {
        self.threshold.as_deref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Selector for the rules this descriptor replaces or deletes
    pub fn selector(&self) -> KeySelector<'_> {
        KeySelector {
            group_id: &self.group_id,
            unit_id: &self.unit_id,
            sub_unit_id: self.sub_unit_id.as_deref().filter(|s| !s.is_empty()),
        }
    }

    /// Validate the fields required by this descriptor's intent
    ///
    /// Removals need namespace and pod; additions additionally need the
    /// container and a threshold.
    ///
    /// # Errors
    /// Returns the first `DomainError` found.
    pub fn validate(&self) -> Result<(), DomainError> {
        check_identity("group_id", &self.group_id)?;
        check_identity("unit_id", &self.unit_id)?;
        if let Some(sub) = self.sub_unit_id.as_deref().filter(|s| !s.is_empty()) {
            check_identity("sub_unit_id", sub)?;
        }

        if self.removed {
            return Ok(());
        }

        match self.sub_unit_id.as_deref() {
            Some(sub) if !sub.is_empty() => {}
            _ => return Err(DomainError::MissingField("sub_unit_id")),
        }
        match self.threshold.as_deref() {
            Some(t) if !t.is_empty() => Threshold::new(t).map(|_| ()),
            _ => Err(DomainError::MissingField("threshold")),
        }
    }

    /// Rule key of an add descriptor, `None` for pod-wide removals
    pub fn key(&self) -> Option<RuleKey> {
        self.sub_unit_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|sub| RuleKey::new(&*self.group_id, &*self.unit_id, sub))
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.removed { "remove" } else { "add" };
        let sub = self.sub_unit_id.as_deref().unwrap_or("*");
        write!(f, "{} {}/{}/{}", op, self.group_id, self.unit_id, sub)
    }
}

/// Identity components end up inside YAML scalars and PromQL label matchers
fn check_identity(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::MissingField(field));
    }
    let valid = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'));
    if !valid {
        return Err(DomainError::InvalidIdentity {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
