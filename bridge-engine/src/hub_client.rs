//! HTTP implementation of [`HubClient`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::ports::{HubClient, HubNotification};

/// Posts notifications as JSON to `http://<callback>`.
#[derive(Debug, Clone)]
pub struct HttpHubClient {
    client: reqwest::Client,
}

impl HttpHubClient {
    /// Create a client with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self { client })
    }

    /// Notification URL for a callback address.
    ///
    /// The hub registers a bare `host:port`; an address that already carries
    /// a scheme is used unchanged.
    pub fn notify_url(callback: &str) -> String {
        if callback.starts_with("http://") || callback.starts_with("https://") {
            callback.to_string()
        } else {
            format!("http://{callback}")
        }
    }
}

#[async_trait]
impl HubClient for HttpHubClient {
    async fn notify(&self, callback: &str, notification: &HubNotification) -> Result<(), NotifyError> {
        let url = Self::notify_url(callback);
        let response = self
            .client
            .post(&url)
            .json(notification)
            .send()
            .await
            .map_err(|source| NotifyError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status {
                url,
                status: status.as_u16(),
            })
        }
    }
}
