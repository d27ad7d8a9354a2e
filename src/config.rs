//! Configuration for the client engine and push consumers.
//!
//! Two layers of configuration mirror the two long-lived components:
//!
//! - [`ClientConfig`]: connection pool, scheduler periods, RPC deadlines
//! - [`ConsumerConfig`]: group identity, flow control, lite subscription
//!
//! All cadences are configuration, not derived values: their optimal
//! settings are deployment-specific, so nothing here is hard-baked beyond
//! the documented defaults in [`crate::constants`].
//!
//! Call `validate()` at startup to catch inconsistent settings early.

use std::time::Duration;

use crate::client::Endpoint;
use crate::constants::{
    DEFAULT_CONNECTION_MAX_IDLE_SECS, DEFAULT_FLOW_CONTROL_BACKOFF_MS,
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_IDLE_SWEEP_INTERVAL_SECS, DEFAULT_LITE_SUBSCRIPTION_QUOTA,
    DEFAULT_LITE_SYNC_INTERVAL_SECS, DEFAULT_LONG_POLLING_TIMEOUT_SECS,
    DEFAULT_MAX_CACHED_MESSAGE_BYTES, DEFAULT_MAX_CACHED_MESSAGE_COUNT,
    DEFAULT_MAX_DELIVERY_ATTEMPTS, DEFAULT_MAX_LITE_TOPIC_LENGTH, DEFAULT_RECEIVE_BATCH_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCAN_ASSIGNMENT_INTERVAL_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_STATS_INTERVAL_SECS,
};

/// How a consumer group divides queues among its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageModel {
    /// Every instance consumes every queue; assignment derives directly
    /// from route data, filtered to primary replicas.
    Broadcasting,
    /// Queues are divided among group members; assignment comes from an
    /// explicit QueryAssignment call against a broker.
    #[default]
    Clustering,
}

/// Configuration for the shared client manager (pool + scheduler).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name-server endpoint used for route queries.
    pub name_server: Endpoint,

    /// Deadline applied to every unary RPC.
    pub request_timeout: Duration,

    /// Idle threshold past which pooled connections are evicted.
    pub connection_max_idle: Duration,

    /// Period of the health-check round.
    pub health_check_interval: Duration,

    /// Period of the heartbeat round.
    pub heartbeat_interval: Duration,

    /// Period of the idle-connection sweep.
    pub idle_sweep_interval: Duration,

    /// Period of the stats-logging round.
    pub stats_interval: Duration,

    /// Bound on waiting for background tasks during shutdown.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default cadences for a name server.
    pub fn new(name_server: Endpoint) -> Self {
        Self {
            name_server,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connection_max_idle: Duration::from_secs(DEFAULT_CONNECTION_MAX_IDLE_SECS),
            health_check_interval: Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            idle_sweep_interval: Duration::from_secs(DEFAULT_IDLE_SWEEP_INTERVAL_SECS),
            stats_interval: Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Validate the configuration and return all errors found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.request_timeout.is_zero() {
            errors.push("request_timeout must be greater than zero".to_string());
        }
        if self.heartbeat_interval.is_zero() {
            errors.push("heartbeat_interval must be greater than zero".to_string());
        }
        if self.idle_sweep_interval.is_zero() {
            errors.push("idle_sweep_interval must be greater than zero".to_string());
        }
        if self.health_check_interval.is_zero() {
            errors.push("health_check_interval must be greater than zero".to_string());
        }

        // A connection heartbeated on schedule must never look idle.
        if self.connection_max_idle <= self.heartbeat_interval {
            errors.push(format!(
                "connection_max_idle ({:?}) must exceed heartbeat_interval ({:?})",
                self.connection_max_idle, self.heartbeat_interval
            ));
        }
        if self.connection_max_idle <= self.idle_sweep_interval {
            errors.push(format!(
                "connection_max_idle ({:?}) must exceed idle_sweep_interval ({:?})",
                self.connection_max_idle, self.idle_sweep_interval
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Configuration for one push consumer instance.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group this instance belongs to.
    pub group: String,

    /// How queues are divided among the group's members.
    pub message_model: MessageModel,

    /// Period of the assignment rescan.
    pub scan_assignment_interval: Duration,

    /// Server-side wait bound for each long-poll receive.
    pub long_polling_timeout: Duration,

    /// Messages requested per receive call.
    pub receive_batch_size: u32,

    /// Flow-control ceiling on cached message count.
    pub max_cached_message_count: usize,

    /// Flow-control ceiling on cached message bytes.
    pub max_cached_message_bytes: usize,

    /// Pause before re-checking a full cache.
    pub flow_control_backoff: Duration,

    /// Delivery attempts after which a message goes to the dead-letter
    /// queue instead of being redelivered.
    pub max_delivery_attempts: i32,

    /// Base topic the lite-subscription capability binds to; `None`
    /// disables the capability entirely.
    pub lite_bind_topic: Option<String>,

    /// Quota on concurrently held lite topics.
    pub lite_subscription_quota: usize,

    /// Maximum accepted lite topic name length.
    pub max_lite_topic_length: usize,

    /// Period of the lite-subscription full resync.
    pub lite_sync_interval: Duration,
}

impl ConsumerConfig {
    /// Create a configuration with default tuning for a consumer group.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            message_model: MessageModel::default(),
            scan_assignment_interval: Duration::from_secs(DEFAULT_SCAN_ASSIGNMENT_INTERVAL_SECS),
            long_polling_timeout: Duration::from_secs(DEFAULT_LONG_POLLING_TIMEOUT_SECS),
            receive_batch_size: DEFAULT_RECEIVE_BATCH_SIZE,
            max_cached_message_count: DEFAULT_MAX_CACHED_MESSAGE_COUNT,
            max_cached_message_bytes: DEFAULT_MAX_CACHED_MESSAGE_BYTES,
            flow_control_backoff: Duration::from_millis(DEFAULT_FLOW_CONTROL_BACKOFF_MS),
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            lite_bind_topic: None,
            lite_subscription_quota: DEFAULT_LITE_SUBSCRIPTION_QUOTA,
            max_lite_topic_length: DEFAULT_MAX_LITE_TOPIC_LENGTH,
            lite_sync_interval: Duration::from_secs(DEFAULT_LITE_SYNC_INTERVAL_SECS),
        }
    }

    /// Validate the configuration and return all errors found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.group.trim().is_empty() {
            errors.push("group must not be blank".to_string());
        }
        if self.receive_batch_size == 0 {
            errors.push("receive_batch_size must be at least 1".to_string());
        }
        if self.max_cached_message_count == 0 {
            errors.push("max_cached_message_count must be at least 1".to_string());
        }
        if self.max_cached_message_bytes == 0 {
            errors.push("max_cached_message_bytes must be at least 1".to_string());
        }
        if self.max_delivery_attempts < 1 {
            errors.push(format!(
                "max_delivery_attempts ({}) must be at least 1",
                self.max_delivery_attempts
            ));
        }
        if self.long_polling_timeout.is_zero() {
            errors.push("long_polling_timeout must be greater than zero".to_string());
        }
        if self.scan_assignment_interval.is_zero() {
            errors.push("scan_assignment_interval must be greater than zero".to_string());
        }
        if self.max_lite_topic_length == 0 {
            errors.push("max_lite_topic_length must be at least 1".to_string());
        }
        if let Some(bind_topic) = &self.lite_bind_topic {
            if bind_topic.trim().is_empty() {
                errors.push("lite_bind_topic must not be blank when set".to_string());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AddressScheme;

    fn name_server() -> Endpoint {
        Endpoint::new(AddressScheme::Plain, "127.0.0.1", 9876)
    }

    #[test]
    fn test_client_config_defaults_are_valid() {
        let config = ClientConfig::new(name_server());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_zero_request_timeout_fails() {
        let config = ClientConfig {
            request_timeout: Duration::ZERO,
            ..ClientConfig::new(name_server())
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("request_timeout")));
    }

    #[test]
    fn test_client_config_idle_below_heartbeat_fails() {
        let config = ClientConfig {
            connection_max_idle: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            ..ClientConfig::new(name_server())
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("connection_max_idle")));
    }

    #[test]
    fn test_consumer_config_defaults_are_valid() {
        let config = ConsumerConfig::new("test-group");
        assert!(config.validate().is_ok());
        assert_eq!(config.message_model, MessageModel::Clustering);
    }

    #[test]
    fn test_consumer_config_blank_group_fails() {
        let config = ConsumerConfig::new("   ");
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("group")));
    }

    #[test]
    fn test_consumer_config_zero_batch_size_fails() {
        let config = ConsumerConfig {
            receive_batch_size: 0,
            ..ConsumerConfig::new("g")
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("receive_batch_size")));
    }

    #[test]
    fn test_consumer_config_collects_multiple_errors() {
        let config = ConsumerConfig {
            receive_batch_size: 0,
            max_delivery_attempts: 0,
            ..ConsumerConfig::new("")
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.len() >= 3);
    }
}
