use std::time::Duration;

use {
    async_trait::async_trait,
    sheetbot_common::ResourceId,
    sheetbot_config::BackendConfig,
    tracing::{debug, warn},
    url::Url,
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{backend as backend_metrics, counter, histogram, labels};

use crate::{
    error::{BackendError, Result},
    operation::{BackendResponse, Operation, OperationWeight},
};

/// Outbound calls to the automation endpoint.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run `operation` against `resource` (or the endpoint's own default when
    /// `None`).
    async fn call(
        &self,
        operation: &Operation,
        resource: Option<&ResourceId>,
    ) -> Result<BackendResponse>;
}

/// Per-weight call timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub bulk: Duration,
}

impl BackendTimeouts {
    #[must_use]
    pub fn for_weight(&self, weight: OperationWeight) -> Duration {
        match weight {
            OperationWeight::Read => self.read,
            OperationWeight::Write => self.write,
            OperationWeight::Bulk => self.bulk,
        }
    }
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self::from(&BackendConfig::default())
    }
}

impl From<&BackendConfig> for BackendTimeouts {
    fn from(config: &BackendConfig) -> Self {
        Self {
            read: Duration::from_secs(config.read_timeout_secs),
            write: Duration::from_secs(config.write_timeout_secs),
            bulk: Duration::from_secs(config.bulk_timeout_secs),
        }
    }
}

/// [`Backend`] over HTTP: GET for reads, POST with a JSON body for writes.
pub struct HttpBackend {
    client: reqwest::Client,
    url: Url,
    timeouts: BackendTimeouts,
}

impl HttpBackend {
    pub fn new(url: Url, timeouts: BackendTimeouts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sheetbot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.read)
            .build()
            .map_err(BackendError::from)?;
        Ok(Self {
            client,
            url,
            timeouts,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| BackendError::transport(format!("invalid backend URL: {e}")))?;
        Self::new(url, BackendTimeouts::from(config))
    }

    async fn send(
        &self,
        operation: &Operation,
        resource: Option<&ResourceId>,
    ) -> Result<BackendResponse> {
        let timeout = self.timeouts.for_weight(operation.weight());
        let request = if operation.is_read() {
            self.client
                .get(self.url.clone())
                .query(&operation.query(resource))
        } else {
            self.client
                .post(self.url.clone())
                .json(&operation.payload(resource))
        };

        let response = request.timeout(timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(BackendError::transport(format!("HTTP {status}")));
            },
            Err(e) => {
                return Err(BackendError::malformed(format!("response is not JSON: {e}")));
            },
        };

        if !status.is_success() {
            // An error page that still speaks the envelope is the app's own failure.
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.trim().is_empty());
            return Err(match message {
                Some(message) => BackendError::application(message),
                None => BackendError::transport(format!("HTTP {status}")),
            });
        }

        operation.interpret(value)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(
        &self,
        operation: &Operation,
        resource: Option<&ResourceId>,
    ) -> Result<BackendResponse> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        debug!(
            operation = operation.name(),
            resource = resource.map(ResourceId::as_str),
            "calling backend"
        );
        let result = self.send(operation, resource).await;

        #[cfg(feature = "metrics")]
        {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind.as_str(),
            };
            counter!(
                backend_metrics::CALLS_TOTAL,
                labels::OPERATION => operation.name(),
                labels::OUTCOME => outcome
            )
            .increment(1);
            histogram!(
                backend_metrics::CALL_DURATION_SECONDS,
                labels::OPERATION => operation.name()
            )
            .record(start.elapsed().as_secs_f64());
        }

        if let Err(ref e) = result {
            warn!(operation = operation.name(), kind = %e.kind, error = %e.message, "backend call failed");
        }
        result
    }
}
