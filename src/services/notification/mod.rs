//! This module provides the `WebhookNotificationService` for delivering
//! in-app notifications via webhooks.
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NotificationError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Response error: {0}")]
    ResponseError(#[from] serde_json::Error),
    #[error("Webhook error: {0}")]
    WebhookError(String),
    #[error("Signing error: {0}")]
    SigningError(String),
}

/// Payload posted to the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: String,
    pub user_address: String,
    pub title: String,
    pub message: String,
    pub timestamp: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationServiceTrait: Send + Sync {
    async fn send_in_app_notification(
        &self,
        user_address: &str,
        title: &str,
        message: &str,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone)]
pub struct WebhookNotificationService {
    client: Client,
    webhook_url: String,
    secret_key: Option<String>,
}

impl WebhookNotificationService {
    pub fn new(webhook_url: String, secret_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            secret_key,
        }
    }

    fn sign_payload(&self, payload: &str, secret_key: &str) -> Result<String, NotificationError> {
        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|e| NotificationError::SigningError(e.to_string()))?;
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        Ok(STANDARD.encode(result.into_bytes()))
    }
}

#[async_trait]
impl NotificationServiceTrait for WebhookNotificationService {
    async fn send_in_app_notification(
        &self,
        user_address: &str,
        title: &str,
        message: &str,
    ) -> Result<(), NotificationError> {
        let notification = InAppNotification {
            id: Uuid::new_v4().to_string(),
            user_address: user_address.to_lowercase(),
            title: title.to_string(),
            message: message.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_string(&notification)?;

        let response = match self.secret_key.as_ref() {
            Some(key) => {
                let signature = self.sign_payload(&payload, key)?;

                self.client
                    .post(&self.webhook_url)
                    .header("X-Signature", signature)
                    .json(&notification)
                    .send()
                    .await?
            }
            None => {
                self.client
                    .post(&self.webhook_url)
                    .json(&notification)
                    .send()
                    .await?
            }
        };

        if response.status().is_success() {
            Ok(())
        } else {
            let error_message: String = response.text().await?;
            Err(NotificationError::WebhookError(error_message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload_is_deterministic() {
        let service = WebhookNotificationService::new(
            "http://localhost/webhook".to_string(),
            Some("secret".to_string()),
        );

        let first = service.sign_payload("payload", "secret").unwrap();
        let second = service.sign_payload("payload", "secret").unwrap();
        assert_eq!(first, second);

        let different = service.sign_payload("payload", "other-secret").unwrap();
        assert_ne!(first, different);
    }

    #[test]
    fn test_notification_serializes_lowercased_user() {
        let notification = InAppNotification {
            id: "n1".to_string(),
            user_address: "0xABCD".to_lowercase(),
            title: "Transaction Confirmed".to_string(),
            message: "Your transfer went through".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("0xabcd"));
        assert!(json.contains("Transaction Confirmed"));
    }
}
