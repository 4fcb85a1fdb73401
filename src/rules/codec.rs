//! Rule text codec
//!
//! Renders an entity descriptor into the text fragment of one Prometheus
//! alert rule and recovers the rule key from a fragment's identity line.
//!
//! A fragment has three parts:
//!
//! ```text
//!   - alert: <ns>/<pod>/<container>/CPU                       identity
//!     expr: sum(irate(...{namespace="<ns>",...}[5m])) / <q> > 0.8   expression
//!     labels: ... annotations: ... summary: <ns>/<pod>/<container>/CPU  metadata
//! ```
//!
//! The indentation is significant: fragments are spliced verbatim under the
//! `rules:` key of the header.

use crate::domain::{EntityDescriptor, KeySelector, RuleKey};
use crate::error::DomainError;
use crate::rules::RuleDocument;
use serde::{Deserialize, Serialize};

/// Fixed header of the rule file
pub const FILE_HEADER: &str = "groups:\n- name: cpu-usage\n  rules:\n";

/// Prefix of every fragment's identity line
pub const IDENTITY_PREFIX: &str = "  - alert: ";

/// Suffix of the alert name after the rule key
const ALERT_SUFFIX: &str = "/CPU";

/// Tunable parts of the rule expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTemplate {
    /// Range window of the `irate` in the expression
    pub window: String,
    /// Fraction of the CPU request above which the alert fires
    pub usage_ratio: f64,
    /// Value of the `severity` label (routes the alert in Alertmanager)
    pub severity: String,
}

impl Default for RuleTemplate {
    fn default() -> Self {
        Self {
            window: "5m".to_string(),
            usage_ratio: 0.8,
            severity: "webhook".to_string(),
        }
    }
}

impl RuleTemplate {
    /// Render the fragment for an add descriptor
    ///
    /// # Errors
    /// Returns a `DomainError` if the descriptor is a removal or is missing
    /// any field the template needs.
    pub fn encode(&self, entity: &EntityDescriptor) -> Result<String, DomainError> {
        entity.validate()?;
        if entity.is_removed() {
            return Err(DomainError::MissingField("threshold"));
        }
        let key = entity.key().ok_or(DomainError::MissingField("sub_unit_id"))?;
        let threshold = entity
            .threshold()
            .ok_or(DomainError::MissingField("threshold"))?;

        Ok(self.render(&key, threshold))
    }

    fn render(&self, key: &RuleKey, threshold: &str) -> String {
        let alert = alert_name(key);
        let mut out = String::with_capacity(384);

        out.push_str(IDENTITY_PREFIX);
        out.push_str(&alert);
        out.push('\n');

        out.push_str(&format!(
            "    expr: sum(irate(container_cpu_usage_seconds_total{{namespace=\"{}\",pod_name=\"{}\",container_name=\"{}\"}}[{}])) / {} > {} \n",
            key.group_id, key.unit_id, key.sub_unit_id, self.window, threshold, self.usage_ratio
        ));

        out.push_str("    labels:\n");
        out.push_str(&format!("      severity: {}\n", self.severity));
        out.push_str("    annotations:\n");
        out.push_str(&format!("      summary: {}\n", alert));

        out
    }
}

fn alert_name(key: &RuleKey) -> String {
    format!("{}{}", key, ALERT_SUFFIX)
}

/// Recover the rule key from a fragment's identity line
///
/// Returns `None` for lines that are not identity lines or whose alert name
/// does not have the `<ns>/<pod>/<container>/CPU` shape.
pub fn decode_key(line: &str) -> Option<RuleKey> {
    let name = line
        .strip_prefix(IDENTITY_PREFIX)?
        .trim_end()
        .strip_suffix(ALERT_SUFFIX)?;

    let mut parts = name.split('/');
    let (group, unit, sub) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || group.is_empty() || unit.is_empty() || sub.is_empty() {
        return None;
    }
    Some(RuleKey::new(group, unit, sub))
}

/// Remove every fragment matched by `selector` from a rule file
///
/// A selector without a container removes all rules of the pod. Nothing to
/// remove is not an error; the text comes back unchanged.
pub fn strip(document: &str, selector: &KeySelector<'_>) -> String {
    let mut doc = RuleDocument::parse(document);
    if doc.remove(selector) == 0 {
        return document.to_string();
    }
    doc.render()
}
