//! Sync loop configuration
//!
//! Plain serde config in the workspace's usual shape; every field has a
//! default so an empty config document is valid.

use serde::{Deserialize, Serialize};

/// Configuration for the sync loop driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Long-poll timeout passed to the homeserver, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Presence override sent with each poll (`online`, `offline`,
    /// `unavailable`). None omits the parameter.
    #[serde(default)]
    pub presence: Option<String>,

    /// Delay before retrying after a failed poll, in milliseconds.
    #[serde(default = "default_failure_retry_ms")]
    pub failure_retry_ms: u64,

    /// Capacity of the notification broadcast channel.
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_failure_retry_ms() -> u64 {
    5_000
}

fn default_notification_buffer() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            presence: None,
            failure_retry_ms: default_failure_retry_ms(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.presence, None);
        assert_eq!(config.failure_retry_ms, 5_000);
        assert_eq!(config.notification_buffer, 256);
    }

    #[test]
    fn test_partial_override() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "presence": "offline", "failure_retry_ms": 100 }"#).unwrap();
        assert_eq!(config.presence.as_deref(), Some("offline"));
        assert_eq!(config.failure_retry_ms, 100);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
