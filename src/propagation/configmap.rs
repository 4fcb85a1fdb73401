//! ConfigMap propagation
//!
//! Stores the rule file in a ConfigMap so Prometheus pods mounting it pick up
//! the new revision. Talks to the API server directly with the pod's service
//! account credentials.

use crate::config::ConfigMapConfig;
use crate::error::PropagationError;
use crate::propagation::Propagator;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Certificate, StatusCode};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// In-cluster API server service name, used when neither the config nor the
/// environment names one
pub const DEFAULT_API_SERVER: &str = "https://kubernetes.default.svc";

/// Where the rule file is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapTarget {
    /// API server base URL, e.g. `https://10.0.0.1:443`
    pub api_server: String,
    /// Namespace of the ConfigMap
    pub namespace: String,
    /// ConfigMap name
    pub name: String,
    /// Data key holding the rule file
    pub data_key: String,
}

impl ConfigMapTarget {
    fn collection_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/configmaps",
            self.api_server.trim_end_matches('/'),
            self.namespace
        )
    }

    fn item_url(&self) -> String {
        format!("{}/{}", self.collection_url(), self.name)
    }

    /// ConfigMap manifest carrying the rule file
    pub fn manifest(&self, document: &str) -> Value {
        let mut data = Map::new();
        data.insert(self.data_key.clone(), Value::String(document.to_string()));

        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
            },
            "data": data,
        })
    }
}

/// Upserts the rule file into a ConfigMap
pub struct ConfigMapPropagator {
    client: Client,
    target: ConfigMapTarget,
    token: Option<String>,
}

impl ConfigMapPropagator {
    /// Create a propagator with explicit credentials
    pub fn new(
        target: ConfigMapTarget,
        token: Option<String>,
        ca_pem: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self, PropagationError> {
        let http_err = |source| PropagationError::Http {
            url: target.api_server.clone(),
            source,
        };

        let mut builder = Client::builder().timeout(timeout);
        if let Some(pem) = ca_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(pem).map_err(http_err)?);
        }
        let client = builder.build().map_err(http_err)?;

        Ok(Self {
            client,
            target,
            token,
        })
    }

    /// Create a propagator from configuration, filling unset values from the
    /// pod's service account and environment
    pub fn from_config(
        config: &ConfigMapConfig,
        data_key: &str,
        timeout: Duration,
    ) -> Result<Self, PropagationError> {
        let api_server = resolve_api_server(
            config.api_server.as_deref(),
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
        );

        let namespace = match &config.namespace {
            Some(ns) => ns.clone(),
            None => read_namespace(&config.namespace_path)?,
        };

        let token = read_optional(&config.token_path)?
            .map(|t| String::from_utf8_lossy(&t).trim().to_string());
        let ca_pem = read_optional(&config.ca_path)?;

        let target = ConfigMapTarget {
            api_server,
            namespace,
            name: config.name.clone(),
            data_key: data_key.to_string(),
        };
        log::info!(
            "ConfigMap sink: {}/{} on {}",
            target.namespace,
            target.name,
            target.api_server
        );

        Self::new(target, token, ca_pem.as_deref(), timeout)
    }

    pub fn target(&self) -> &ConfigMapTarget {
        &self.target
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<StatusCode, PropagationError> {
        self.authorized(request)
            .send()
            .map(|r| r.status())
            .map_err(|source| PropagationError::Http {
                url: url.to_string(),
                source,
            })
    }
}

impl Propagator for ConfigMapPropagator {
    /// GET the ConfigMap, then create it if absent or replace it otherwise
    fn propagate(&self, document: &str) -> Result<(), PropagationError> {
        let item_url = self.target.item_url();
        let manifest = self.target.manifest(document);

        let existing = self.send(&item_url, self.client.get(&item_url))?;
        let (url, status) = if existing == StatusCode::NOT_FOUND {
            let url = self.target.collection_url();
            let status = self.send(&url, self.client.post(&url).json(&manifest))?;
            (url, status)
        } else if existing.is_success() {
            let status = self.send(&item_url, self.client.put(&item_url).json(&manifest))?;
            (item_url, status)
        } else {
            (item_url, existing)
        };

        if !status.is_success() {
            return Err(PropagationError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "configmap"
    }
}

/// Configured URL, else the service host from the environment, else
/// `DEFAULT_API_SERVER`
fn resolve_api_server(
    configured: Option<&str>,
    host: Option<String>,
    port: Option<String>,
) -> String {
    if let Some(url) = configured {
        return url.to_string();
    }
    let Some(host) = host.filter(|h| !h.is_empty()) else {
        return DEFAULT_API_SERVER.to_string();
    };
    let port = port.unwrap_or_else(|| "443".to_string());
    if host.contains(':') {
        format!("https://[{}]:{}", host, port)
    } else {
        format!("https://{}:{}", host, port)
    }
}

/// Namespace the controller runs in, from the service account mount
fn read_namespace(path: &Path) -> Result<String, PropagationError> {
    let namespace = fs::read_to_string(path).map_err(|source| PropagationError::Credentials {
        path: path.to_path_buf(),
        source,
    })?;
    let namespace = namespace.trim();
    if namespace.is_empty() {
        return Err(PropagationError::NotConfigured(format!(
            "namespace file {} is empty",
            path.display()
        )));
    }
    Ok(namespace.to_string())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PropagationError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} not present", path.display());
            Ok(None)
        }
        Err(source) => Err(PropagationError::Credentials {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn target() -> ConfigMapTarget {
        ConfigMapTarget {
            api_server: "https://10.0.0.1:443/".to_string(),
            namespace: "monitoring".to_string(),
            name: "alert-rules-config".to_string(),
            data_key: "instance_cpu_alert_rules.yml".to_string(),
        }
    }

    #[test]
    fn test_urls() {
        let target = target();
        assert_eq!(
            target.collection_url(),
            "https://10.0.0.1:443/api/v1/namespaces/monitoring/configmaps"
        );
        assert_eq!(
            target.item_url(),
            "https://10.0.0.1:443/api/v1/namespaces/monitoring/configmaps/alert-rules-config"
        );
    }

    #[test]
    fn test_manifest() {
        let manifest = target().manifest("groups:\n");
        assert_eq!(manifest["kind"], "ConfigMap");
        assert_eq!(manifest["metadata"]["name"], "alert-rules-config");
        assert_eq!(manifest["metadata"]["namespace"], "monitoring");
        assert_eq!(manifest["data"]["instance_cpu_alert_rules.yml"], "groups:\n");
    }

    #[test]
    fn test_read_namespace_trims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("namespace");
        fs::write(&path, "monitoring\n").unwrap();
        assert_eq!(read_namespace(&path).unwrap(), "monitoring");
    }

    #[test]
    fn test_read_namespace_missing() {
        let result = read_namespace(Path::new("/nonexistent/namespace"));
        assert!(matches!(result, Err(PropagationError::Credentials { .. })));
    }

    #[test]
    fn test_api_server_fallbacks() {
        assert_eq!(resolve_api_server(None, None, None), DEFAULT_API_SERVER);
        assert_eq!(
            resolve_api_server(None, Some("10.0.0.1".to_string()), None),
            "https://10.0.0.1:443"
        );
        assert_eq!(
            resolve_api_server(None, Some("fd00::1".to_string()), Some("6443".to_string())),
            "https://[fd00::1]:6443"
        );
        assert_eq!(
            resolve_api_server(Some("https://api:6443"), Some("10.0.0.1".to_string()), None),
            "https://api:6443"
        );
    }

    #[test]
    fn test_from_config_without_api_server() {
        let config = ConfigMapConfig {
            namespace: Some("monitoring".to_string()),
            token_path: "/nonexistent/token".into(),
            ca_path: "/nonexistent/ca.crt".into(),
            ..ConfigMapConfig::default()
        };

        let sink =
            ConfigMapPropagator::from_config(&config, "rules.yml", Duration::from_secs(1)).unwrap();
        assert!(sink.target().api_server.starts_with("https://"));
        assert!(sink.token.is_none());
    }

    #[test]
    fn test_from_config_explicit_values() {
        let dir = tempdir().unwrap();
        let token = dir.path().join("token");
        fs::write(&token, "secret-token\n").unwrap();

        let config = ConfigMapConfig {
            api_server: Some("https://127.0.0.1:6443".to_string()),
            namespace: Some("monitoring".to_string()),
            token_path: token,
            ca_path: dir.path().join("missing-ca.crt"),
            ..ConfigMapConfig::default()
        };

        let sink =
            ConfigMapPropagator::from_config(&config, "rules.yml", Duration::from_secs(1)).unwrap();
        assert_eq!(sink.target().namespace, "monitoring");
        assert_eq!(sink.target().data_key, "rules.yml");
        assert_eq!(sink.token.as_deref(), Some("secret-token"));
    }
}
