//! Best-effort outbound notifications.
//!
//! The transport is abstract: handlers call `dispatch` after a successful
//! persist and move on. Failures are logged at WARN and never reach the
//! client; delivery is bounded by a 2-second deadline.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

pub const NOTIFY_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notify endpoint returned {0}")]
    Endpoint(reqwest::StatusCode),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, template: &str, payload: Value) -> Result<(), NotifyError>;
}

/// Default transport: records the notification and does nothing else.
/// Keeps the core testable without a mail provider.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, template: &str, _payload: Value) -> Result<(), NotifyError> {
        info!(template, "notification recorded (log-only transport)");
        Ok(())
    }
}

/// Posts `{template, payload}` to a configured webhook, typically a mail
/// relay sitting in front of the actual provider.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_DEADLINE)
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, template: &str, payload: Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "template": template, "payload": payload }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Endpoint(response.status()))
        }
    }
}

pub fn from_config(config: &Config) -> Arc<dyn Notifier> {
    match &config.notify_webhook_url {
        Some(url) => {
            info!("notifier: webhook transport → {}", url);
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            info!("notifier: log-only transport");
            Arc::new(LogNotifier)
        }
    }
}

/// Fire-and-forget dispatch. The handler's response never waits on this
/// beyond spawning the task.
pub fn dispatch(notifier: Arc<dyn Notifier>, template: &'static str, payload: Value) {
    tokio::spawn(async move {
        match tokio::time::timeout(NOTIFY_DEADLINE, notifier.notify(template, payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(template, "notification failed: {}", err),
            Err(_) => warn!(template, "notification timed out"),
        }
    });
}
