use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;

use crate::error::NotifyError;
use crate::types::Notification;
use crate::Notifier;

type HmacSha256 = Hmac<Sha256>;

/// Delivers notifications as HTTP POSTs, optionally signing the body with
/// HMAC-SHA256 so receivers can verify origin.
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    secret: Option<String>,
    headers: HashMap<String, String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            url: url.into(),
            secret: None,
            headers: HashMap::new(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn sign_payload(&self, payload: &str, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError> {
        let notification = Notification::new(topic, payload);
        let body = serde_json::to_string(&notification)?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        if let Some(secret) = &self.secret {
            let signature = self.sign_payload(&body, secret);
            request = request.header("X-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::send_failed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(NotifyError::send_failed(format!(
                "webhook returned {status}: {detail}"
            )))
        }
    }
}
