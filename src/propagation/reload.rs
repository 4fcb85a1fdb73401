//! Prometheus reload notification

use crate::error::PropagationError;
use crate::propagation::Propagator;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Asks Prometheus to reload its rule files via `POST /-/reload`
///
/// Requires Prometheus to run with `--web.enable-lifecycle`.
pub struct ReloadPropagator {
    client: Client,
    url: String,
}

impl ReloadPropagator {
    /// Create a notifier for the Prometheus at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PropagationError> {
        let url = reload_url(base_url);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| PropagationError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Propagator for ReloadPropagator {
    fn propagate(&self, _document: &str) -> Result<(), PropagationError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain")
            .body("reload rules")
            .send()
            .map_err(|source| PropagationError::Http {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PropagationError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus-reload"
    }
}

fn reload_url(base_url: &str) -> String {
    format!("{}/-/reload", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_url() {
        assert_eq!(
            reload_url("http://prometheus:9090"),
            "http://prometheus:9090/-/reload"
        );
        assert_eq!(
            reload_url("http://prometheus:9090/"),
            "http://prometheus:9090/-/reload"
        );
    }

    #[test]
    fn test_unreachable_server_is_http_error() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server
        let sink = ReloadPropagator::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:9/-/reload");
        assert!(matches!(
            sink.propagate("groups:\n"),
            Err(PropagationError::Http { .. })
        ));
    }
}
