use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::store::{KvStore, keys};

/// Webhook messages longer than this are truncated before dispatch.
const MAX_MESSAGE_CHARS: usize = 1024;

/// Last dispatched alert, persisted for duplicate suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastNotification {
    pub text: String,
    pub time: i64,
}

/// Best-effort alerting to an external webhook channel. An identical message
/// inside the silence window is a silent no-op; dispatch failures are logged
/// and swallowed so alerting can never fail a cycle.
pub struct Notifier {
    store: Arc<dyn KvStore>,
    client: reqwest::Client,
    webhook_url: Option<String>,
    silence_minutes: u32,
}

impl Notifier {
    pub fn new(store: Arc<dyn KvStore>, config: &AppConfig) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            webhook_url: config.webhook_url.clone(),
            silence_minutes: config.notification_silence_minutes,
        }
    }

    pub fn enabled(&self) -> bool {
        self.webhook_url.as_ref().is_some_and(|url| !url.is_empty())
    }

    /// Send an alert. Returns whether a webhook dispatch was attempted.
    pub async fn send(&self, text: &str) -> bool {
        self.send_at(text, Utc::now().timestamp_millis()).await
    }

    pub async fn send_at(&self, text: &str, now_ms: i64) -> bool {
        let Some(url) = self.webhook_url.as_ref().filter(|u| !u.is_empty()) else {
            return false;
        };

        let message: String = text.chars().take(MAX_MESSAGE_CHARS).collect();

        if self.silenced(&message, now_ms).await {
            info!("notification recently sent and silenced");
            return false;
        }

        debug!("sending webhook notification: {message}");
        let dispatch = self
            .client
            .post(url)
            .json(&serde_json::json!({ "content": message }))
            .send()
            .await;
        if let Err(e) = dispatch {
            warn!("failed to send notification: {e}");
            return false;
        }

        let record = LastNotification {
            text: message,
            time: now_ms,
        };
        match serde_json::to_string(&record) {
            Ok(raw) => {
                if let Err(e) = self.store.set(keys::LAST_NOTIFICATION, &raw).await {
                    warn!("cannot persist notification record: {e:#}");
                }
            }
            Err(e) => warn!("cannot serialize notification record: {e}"),
        }

        true
    }

    async fn silenced(&self, message: &str, now_ms: i64) -> bool {
        let last = match self.store.get(keys::LAST_NOTIFICATION).await {
            Ok(Some(raw)) => match serde_json::from_str::<LastNotification>(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("stored notification record is unreadable: {e}");
                    return false;
                }
            },
            Ok(None) => return false,
            Err(e) => {
                warn!("cannot read notification record: {e:#}");
                return false;
            }
        };

        last.text == message && last.time > now_ms - 60_000 * i64::from(self.silence_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn webhook_server(expected: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(expected)
            .mount(&server)
            .await;
        server
    }

    fn notifier_for(server: &MockServer, store: Arc<dyn KvStore>) -> Notifier {
        let config = AppConfig {
            webhook_url: Some(format!("{}/hook", server.uri())),
            ..AppConfig::default()
        };
        Notifier::new(store, &config)
    }

    #[tokio::test]
    async fn disabled_notifier_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(store.clone(), &AppConfig::default());
        assert!(!notifier.enabled());
        assert!(!notifier.send("anything").await);
        assert_eq!(store.get(keys::LAST_NOTIFICATION).await.expect("get"), None);
    }

    #[tokio::test]
    async fn duplicate_inside_silence_window_is_suppressed() {
        let server = webhook_server(1).await;
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let notifier = notifier_for(&server, store.clone());

        let now = 1_700_000_000_000;
        assert!(notifier.send_at("stale data", now).await);
        assert!(!notifier.send_at("stale data", now + 60_000).await);

        let raw = store
            .get(keys::LAST_NOTIFICATION)
            .await
            .expect("get")
            .expect("record");
        let record: LastNotification = serde_json::from_str(&raw).expect("parse");
        assert_eq!(record.text, "stale data");
        assert_eq!(record.time, now);
    }

    #[tokio::test]
    async fn same_text_after_window_dispatches_again() {
        let server = webhook_server(2).await;
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let notifier = notifier_for(&server, store.clone());

        let now = 1_700_000_000_000;
        assert!(notifier.send_at("stale data", now).await);
        // default silence window is 30 minutes; 31 minutes later is fair game
        assert!(notifier.send_at("stale data", now + 31 * 60_000).await);
    }

    #[tokio::test]
    async fn different_text_is_never_silenced() {
        let server = webhook_server(2).await;
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let notifier = notifier_for(&server, store.clone());

        let now = 1_700_000_000_000;
        assert!(notifier.send_at("stale data", now).await);
        assert!(notifier.send_at("fetch failed", now + 1_000).await);
    }

    #[tokio::test]
    async fn long_messages_are_truncated() {
        let server = MockServer::start().await;
        let truncated: String = "x".repeat(MAX_MESSAGE_CHARS);
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(
                serde_json::json!({ "content": truncated }),
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let notifier = notifier_for(&server, store);
        assert!(notifier.send(&"x".repeat(MAX_MESSAGE_CHARS + 500)).await);
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed_and_skips_the_record() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let config = AppConfig {
            // nothing is listening here
            webhook_url: Some("http://127.0.0.1:1/hook".into()),
            ..AppConfig::default()
        };
        let notifier = Notifier::new(store.clone(), &config);

        assert!(!notifier.send("unreachable").await);
        assert_eq!(store.get(keys::LAST_NOTIFICATION).await.expect("get"), None);
    }

    #[tokio::test]
    async fn zero_silence_window_always_dispatches() {
        let server = webhook_server(2).await;
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let config = AppConfig {
            webhook_url: Some(format!("{}/hook", server.uri())),
            notification_silence_minutes: 0,
            ..AppConfig::default()
        };
        let notifier = Notifier::new(store, &config);

        let now = 1_700_000_000_000;
        assert!(notifier.send_at("repeat", now).await);
        assert!(notifier.send_at("repeat", now).await);
    }
}
