//! HTTP sink.
//!
//! Each batch is POSTed to the configured endpoint with its content type and
//! encoding. The response status decides the delivery outcome:
//!
//! | Response              | Status                       |
//! |-----------------------|------------------------------|
//! | 2xx                   | [`DeliveryStatus::Delivered`] |
//! | 4xx                   | [`DeliveryStatus::Rejected`]  |
//! | anything else, or no response | [`DeliveryStatus::Errored`] |

use super::{DeliveryStatus, Sink};
use crate::codec::EncodedBatch;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::time::Duration;

/// Delivers batches to an external collector over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl HttpSink {
    /// Creates a sink for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns a message if the endpoint is not an http(s) URL, a header is
    /// malformed, or the client cannot be built.
    pub fn new(
        endpoint: &str,
        headers: BTreeMap<String, String>,
        timeout_secs: u64,
    ) -> Result<Self, String> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| format!("invalid endpoint '{endpoint}': {e}"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(format!(
                "endpoint scheme must be http or https, got '{}'",
                endpoint.scheme()
            ));
        }

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header = HeaderName::try_from(name.as_str())
                .map_err(|e| format!("invalid header name '{name}': {e}"))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| format!("invalid value for header '{name}': {e}"))?;
            header_map.insert(header, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            endpoint,
            headers: header_map,
        })
    }

    /// The endpoint batches are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn status_for(status: reqwest::StatusCode) -> DeliveryStatus {
    if status.is_success() {
        DeliveryStatus::Delivered
    } else if status.is_client_error() {
        DeliveryStatus::Rejected {
            message: format!("HTTP {status}"),
        }
    } else {
        DeliveryStatus::Errored {
            message: format!("HTTP {status}"),
        }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, batch: EncodedBatch) -> DeliveryStatus {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, batch.content_type);
        if let Some(encoding) = batch.content_encoding {
            request = request.header(CONTENT_ENCODING, encoding);
        }

        match request.body(batch.body).send().await {
            Ok(response) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    status = %response.status(),
                    events = batch.event_count,
                    "Batch sent"
                );
                status_for(response.status())
            }
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, error = %e, "Request failed");
                DeliveryStatus::Errored {
                    message: e.to_string(),
                }
            }
        }
    }
}
