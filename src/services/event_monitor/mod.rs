//! Forwards decoded contract events to an external monitoring endpoint.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::models::ExternalEventEnvelope;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum EventMonitorError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Monitor error: {0}")]
    MonitorError(String),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventMonitorTrait: Send + Sync {
    async fn process_external_event_log(
        &self,
        envelope: &ExternalEventEnvelope,
    ) -> Result<(), EventMonitorError>;
}

/// Posts event envelopes to a configured HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpEventMonitor {
    client: Client,
    endpoint_url: String,
}

impl HttpEventMonitor {
    pub fn new(endpoint_url: String) -> Self {
        Self {
            client: Client::new(),
            endpoint_url,
        }
    }
}

#[async_trait]
impl EventMonitorTrait for HttpEventMonitor {
    async fn process_external_event_log(
        &self,
        envelope: &ExternalEventEnvelope,
    ) -> Result<(), EventMonitorError> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(envelope)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let error_message = response.text().await?;
            Err(EventMonitorError::MonitorError(error_message))
        }
    }
}
