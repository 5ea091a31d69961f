//! Forwarding of extracted messages to the Bark push service.
//!
//! Delivery is fail-open: there is exactly one attempt per message, the
//! outcome is reported as a [`DispatchResult`] and never as an error, and
//! nothing guarantees the notification actually arrives.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::NotifyConfig;
use crate::error::{Result, WebhookerError};
use crate::payload::NotificationMessage;

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The remote answered, with whatever status code it chose
    Sent(u16),
    /// No response was received
    Failed(String),
}

impl DispatchResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchResult::Sent(_))
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Implementations must not retry.
    async fn dispatch(&self, message: &NotificationMessage) -> DispatchResult;
}

/// Notifier calling `GET <base_url>/<token>/<group>/<message>`
#[derive(Debug, Clone)]
pub struct BarkNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    group: String,
}

impl BarkNotifier {
    /// Build a notifier from config. Fails when no token is configured.
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WebhookerError::ConfigError("notify.token is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("webhooker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            group: config.group.clone(),
        })
    }

    /// Destination for `message`, which is percent-encoded as a single path segment
    pub fn target_url(&self, message: &NotificationMessage) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.token,
            urlencoding::encode(&self.group),
            urlencoding::encode(message.as_str())
        )
    }

    /// Same as `target_url` with the token hidden, for logs
    fn redacted_url(&self, message: &NotificationMessage) -> String {
        self.target_url(message).replacen(&self.token, "***", 1)
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn dispatch(&self, message: &NotificationMessage) -> DispatchResult {
        let url = self.target_url(message);
        debug!("Sending notification: GET {}", self.redacted_url(message));

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!("Notification sent ({})", status);
                } else {
                    warn!("Notification endpoint answered {}", status);
                }
                DispatchResult::Sent(status.as_u16())
            }
            Err(e) => {
                let kind = if e.is_timeout() {
                    "timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                // reqwest includes the URL in its message; drop it to keep the token out of logs
                let description = format!("notification {}: {}", kind, e.without_url());
                warn!("{}", description);
                DispatchResult::Failed(description)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> NotifyConfig {
        NotifyConfig {
            base_url: base_url.to_string(),
            token: Some("test-token".to_string()),
            group: "LSP-Warning".to_string(),
            timeout_secs: 1,
        }
    }

    fn message(text: &str) -> NotificationMessage {
        NotificationMessage::new(text).unwrap()
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let mut cfg = config("https://api.day.app");
        cfg.token = None;
        assert!(matches!(
            BarkNotifier::new(&cfg),
            Err(WebhookerError::ConfigError(_))
        ));

        cfg.token = Some(String::new());
        assert!(BarkNotifier::new(&cfg).is_err());
    }

    #[test]
    fn target_url_percent_encodes_the_message() {
        let notifier = BarkNotifier::new(&config("https://api.day.app/")).unwrap();

        assert_eq!(
            notifier.target_url(&message("disk full")),
            "https://api.day.app/test-token/LSP-Warning/disk%20full"
        );
        assert_eq!(
            notifier.target_url(&message("a/b?c#d&e=f%")),
            "https://api.day.app/test-token/LSP-Warning/a%2Fb%3Fc%23d%26e%3Df%25"
        );
        assert_eq!(
            notifier.target_url(&message("磁盘满")),
            "https://api.day.app/test-token/LSP-Warning/%E7%A3%81%E7%9B%98%E6%BB%A1"
        );
    }

    #[test]
    fn redacted_url_hides_token() {
        let notifier = BarkNotifier::new(&config("https://api.day.app")).unwrap();
        let url = notifier.redacted_url(&message("hi"));
        assert!(!url.contains("test-token"));
        assert_eq!(url, "https://api.day.app/***/LSP-Warning/hi");
    }

    #[tokio::test]
    async fn dispatch_reports_status_of_successful_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/test-token/LSP-Warning/.+$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = BarkNotifier::new(&config(&server.uri())).unwrap();
        let result = notifier.dispatch(&message("disk full")).await;

        assert_eq!(result, DispatchResult::Sent(200));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/test-token/LSP-Warning/disk%20full");
    }

    #[tokio::test]
    async fn non_success_status_still_counts_as_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = BarkNotifier::new(&config(&server.uri())).unwrap();
        let result = notifier.dispatch(&message("oops")).await;

        assert_eq!(result, DispatchResult::Sent(500));
        assert!(result.is_sent());
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let notifier = BarkNotifier::new(&config(&server.uri())).unwrap();
        let result = notifier.dispatch(&message("slow")).await;

        match result {
            DispatchResult::Failed(description) => {
                assert!(description.contains("timed out"), "{}", description);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_reported_as_failed() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = BarkNotifier::new(&config(&format!("http://{}", addr))).unwrap();
        let result = notifier.dispatch(&message("anyone there")).await;

        match result {
            DispatchResult::Failed(description) => {
                assert!(!description.contains("test-token"), "{}", description);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
