//! Webhook notification channel (Slack-compatible `{"text": ...}` payload)

use crate::error::DispatchError;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts rendered alert text to an incoming-webhook URL
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a webhook channel whose requests are bounded by `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    url = %url,
                    error = %e,
                    "Failed to build webhook client, using defaults with per-request timeout"
                );
                reqwest::Client::new()
            }
        };

        Self {
            url,
            timeout,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Post `text`, treating any non-2xx response as a failure
    pub async fn send(&self, text: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&WebhookPayload { text })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %self.url, "Webhook notification sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_posts_text_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/services/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "text": "ALERT [HIGH]: CPU usage is critical: 95% (threshold: 80%)"
            })))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let channel = WebhookChannel::new(
            format!("{}/services/hook", server.url()),
            Duration::from_secs(5),
        );
        channel
            .send("ALERT [HIGH]: CPU usage is critical: 95% (threshold: 80%)")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("invalid_token")
            .create_async()
            .await;

        let channel = WebhookChannel::new(format!("{}/hook", server.url()), Duration::from_secs(5));
        let err = channel.send("hello").await.unwrap_err();

        match err {
            DispatchError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "invalid_token");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let channel =
            WebhookChannel::new(format!("http://{}/hook", addr), Duration::from_millis(200));
        assert_eq!(channel.timeout(), Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), channel.send("hello"))
            .await
            .unwrap();
        match result {
            Err(DispatchError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let channel = WebhookChannel::new("http://127.0.0.1:1/hook", Duration::from_secs(2));
        assert!(matches!(
            channel.send("hello").await,
            Err(DispatchError::Http(_))
        ));
    }
}
