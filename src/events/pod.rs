//! Pod watch events
//!
//! Minimal model of the Kubernetes watch event stream for pods and the
//! translation of pod lifecycle transitions into entity descriptors.

use crate::domain::{CpuQuantity, EntityDescriptor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Watch event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Bookmark => write!(f, "BOOKMARK"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One entry of a `--output-watch-events` stream
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub object: Pod,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodSpec {
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Container {
    pub name: String,
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceRequirements {
    pub requests: BTreeMap<String, String>,
}

impl Container {
    /// Requested CPU, zero when unset
    pub fn cpu_request(&self) -> Result<CpuQuantity, crate::error::DomainError> {
        match self.resources.requests.get("cpu") {
            Some(q) => q.parse(),
            None => Ok(CpuQuantity::default()),
        }
    }
}

impl Pod {
    /// Add descriptors for every container with a CPU request
    pub fn created_entities(&self) -> Vec<EntityDescriptor> {
        let meta = &self.metadata;
        let mut entities = Vec::with_capacity(self.spec.containers.len());

        for container in &self.spec.containers {
            let request = match container.cpu_request() {
                Ok(q) => q,
                Err(e) => {
                    log::warn!(
                        "Pod {}/{} container {}: {}",
                        meta.namespace,
                        meta.name,
                        container.name,
                        e
                    );
                    continue;
                }
            };
            // Without a request there is nothing to compare usage against
            let Some(threshold) = request.to_threshold() else {
                log::debug!(
                    "Pod {}/{} container {} has no CPU request, skipping",
                    meta.namespace,
                    meta.name,
                    container.name
                );
                continue;
            };
            entities.push(EntityDescriptor::added(
                &*meta.namespace,
                &*meta.name,
                &*container.name,
                String::from(threshold),
            ));
        }
        entities
    }

    /// Removal descriptor for the whole pod
    pub fn deleted_entity(&self) -> EntityDescriptor {
        EntityDescriptor::removed(&*self.metadata.namespace, &*self.metadata.name)
    }
}

/// Translate a watch event into entity descriptors
///
/// Only pod creation and deletion change the rule set; other event types
/// yield nothing.
pub fn translate(event: &WatchEvent) -> Vec<EntityDescriptor> {
    match event.event_type {
        EventType::Added => event.object.created_entities(),
        EventType::Deleted => vec![event.object.deleted_entity()],
        other => {
            log::debug!(
                "Ignoring {} event for {}/{}",
                other,
                event.object.metadata.namespace,
                event.object.metadata.name
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> WatchEvent {
        serde_json::from_str(json).unwrap()
    }

    const ADDED: &str = r#"{
        "type": "ADDED",
        "object": {
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "shop", "uid": "abc"},
            "spec": {
                "containers": [
                    {"name": "app", "resources": {"requests": {"cpu": "250m", "memory": "1Gi"}}},
                    {"name": "sidecar", "resources": {}},
                    {"name": "worker", "resources": {"requests": {"cpu": "2"}}}
                ]
            }
        }
    }"#;

    #[test]
    fn test_added_event_translates_containers_with_requests() {
        let entities = translate(&event(ADDED));
        assert_eq!(
            entities,
            vec![
                EntityDescriptor::added("shop", "web-0", "app", "0.25"),
                EntityDescriptor::added("shop", "web-0", "worker", "2"),
            ]
        );
    }

    #[test]
    fn test_deleted_event_removes_pod() {
        let entities = translate(&event(
            r#"{"type": "DELETED", "object": {"metadata": {"name": "web-0", "namespace": "shop"}}}"#,
        ));
        assert_eq!(entities, vec![EntityDescriptor::removed("shop", "web-0")]);
    }

    #[test]
    fn test_modified_event_ignored() {
        let entities = translate(&event(
            r#"{"type": "MODIFIED", "object": {"metadata": {"name": "web-0", "namespace": "shop"}}}"#,
        ));
        assert!(entities.is_empty());
    }

    #[test]
    fn test_error_event_with_status_object() {
        let entities = translate(&event(
            r#"{"type": "ERROR", "object": {"kind": "Status", "code": 410, "message": "too old"}}"#,
        ));
        assert!(entities.is_empty());
    }

    #[test]
    fn test_invalid_quantity_skips_container() {
        let entities = translate(&event(
            r#"{"type": "ADDED", "object": {
                "metadata": {"name": "p", "namespace": "n"},
                "spec": {"containers": [
                    {"name": "bad", "resources": {"requests": {"cpu": "lots"}}},
                    {"name": "good", "resources": {"requests": {"cpu": "100m"}}}
                ]}
            }}"#,
        ));
        assert_eq!(entities, vec![EntityDescriptor::added("n", "p", "good", "0.1")]);
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let result: Result<WatchEvent, _> =
            serde_json::from_str(r#"{"type": "RESYNC", "object": {}}"#);
        assert!(result.is_err());
    }
}
