//! Lite-subscription synchronization.
//!
//! A lite subscription is a lightweight, quota-bounded topic filter bound
//! to one base topic and consumer group, addable and removable without a
//! full group re-subscription. Local state and the server are kept in sync
//! three ways:
//!
//! - explicit mutations send a partial delta (`PartialAdd`/`PartialRemove`)
//!   and commit locally only after the RPC succeeds;
//! - a periodic full resync declares the entire local set (`CompleteAdd`),
//!   idempotent regardless of server-side staleness;
//! - a server-pushed unsubscribe notification removes one topic locally
//!   with no RPC round-trip.
//!
//! All mutations serialize on one async mutex held across the RPC, so a
//! notification racing an explicit call is applied through the same
//! single-writer path; the commit is only ever observed after its RPC
//! success.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{ClientManager, Endpoint};
use crate::error::{Error, Result};
use crate::rpc::{LiteSubscriptionAction, NotifyUnsubscribeLiteCommand, SyncLiteSubscriptionRequest};

/// Quota-bounded set of lite topics under one base topic + group.
pub struct LiteSubscription {
    bind_topic: String,
    group: String,
    quota: usize,
    max_topic_len: usize,
    topics: Mutex<HashSet<String>>,
}

impl LiteSubscription {
    /// Create an empty subscription bound to a base topic and group.
    pub fn new(
        bind_topic: impl Into<String>,
        group: impl Into<String>,
        quota: usize,
        max_topic_len: usize,
    ) -> Self {
        Self {
            bind_topic: bind_topic.into(),
            group: group.into(),
            quota,
            max_topic_len,
            topics: Mutex::new(HashSet::new()),
        }
    }

    /// Base topic this subscription is bound to.
    pub fn bind_topic(&self) -> &str {
        &self.bind_topic
    }

    /// Snapshot of the current lite topic set.
    pub async fn topic_set(&self) -> HashSet<String> {
        self.topics.lock().await.clone()
    }

    /// Add one lite topic; no-op if already subscribed.
    ///
    /// Validates the topic and checks the quota before any RPC is
    /// attempted; an RPC failure leaves local state unchanged and
    /// re-raises to the caller.
    pub async fn subscribe(&self, manager: &ClientManager, lite_topic: &str) -> Result<()> {
        let mut topics = self.topics.lock().await;
        if topics.contains(lite_topic) {
            return Ok(());
        }
        self.validate(lite_topic)?;
        self.check_quota(topics.len(), 1)?;

        self.sync(
            manager,
            LiteSubscriptionAction::PartialAdd,
            vec![lite_topic.to_string()],
        )
        .await
        .map_err(|e| {
            warn!(lite_topic, error = %e, "Failed to subscribe lite topic");
            e
        })?;

        topics.insert(lite_topic.to_string());
        info!(
            lite_topic,
            topic = %self.bind_topic,
            group = %self.group,
            "Subscribed lite topic"
        );
        Ok(())
    }

    /// Remove one lite topic; no-op if absent.
    pub async fn unsubscribe(&self, manager: &ClientManager, lite_topic: &str) -> Result<()> {
        let mut topics = self.topics.lock().await;
        if !topics.contains(lite_topic) {
            return Ok(());
        }

        self.sync(
            manager,
            LiteSubscriptionAction::PartialRemove,
            vec![lite_topic.to_string()],
        )
        .await
        .map_err(|e| {
            warn!(lite_topic, error = %e, "Failed to unsubscribe lite topic");
            e
        })?;

        topics.remove(lite_topic);
        info!(
            lite_topic,
            topic = %self.bind_topic,
            group = %self.group,
            "Unsubscribed lite topic"
        );
        Ok(())
    }

    /// Declare the entire local set to the server.
    ///
    /// The zero-delta quota check catches a server-lowered quota that the
    /// local set already violates. The sent set is the complete state, not
    /// a diff, so the call is idempotent regardless of what the server
    /// currently holds.
    pub async fn sync_all(&self, manager: &ClientManager) -> Result<()> {
        let topics = self.topics.lock().await;
        self.check_quota(topics.len(), 0)?;
        let complete: Vec<String> = topics.iter().cloned().collect();
        self.sync(manager, LiteSubscriptionAction::CompleteAdd, complete)
            .await
    }

    /// Apply a server-pushed unsubscribe command.
    ///
    /// Removes the topic unconditionally with no RPC; a blank topic in the
    /// notification is ignored rather than treated as "remove everything".
    pub async fn on_notify_unsubscribe(
        &self,
        endpoint: &Endpoint,
        command: &NotifyUnsubscribeLiteCommand,
    ) {
        info!(
            lite_topic = %command.lite_topic,
            %endpoint,
            topic = %self.bind_topic,
            group = %self.group,
            "Notify unsubscribe lite"
        );
        if command.lite_topic.trim().is_empty() {
            return;
        }
        self.topics.lock().await.remove(&command.lite_topic);
    }

    fn validate(&self, lite_topic: &str) -> Result<()> {
        if lite_topic.trim().is_empty() {
            return Err(Error::Validation("lite topic is blank".to_string()));
        }
        if lite_topic.len() > self.max_topic_len {
            return Err(Error::Validation(format!(
                "lite topic length exceeded max length {}, lite topic: {}",
                self.max_topic_len, lite_topic
            )));
        }
        Ok(())
    }

    fn check_quota(&self, current: usize, delta: usize) -> Result<()> {
        if current + delta > self.quota {
            return Err(Error::QuotaExceeded(format!(
                "lite subscription quota exceeded {}",
                self.quota
            )));
        }
        Ok(())
    }

    /// Shared low-level sync primitive.
    ///
    /// Sends action + bind topic + group + delta to the access point and
    /// translates a non-OK status into a typed failure, giving the add,
    /// remove, and full-sync paths identical error semantics.
    async fn sync(
        &self,
        manager: &ClientManager,
        action: LiteSubscriptionAction,
        delta: Vec<String>,
    ) -> Result<()> {
        let request = SyncLiteSubscriptionRequest {
            action,
            topic: self.bind_topic.clone(),
            group: self.group.clone(),
            lite_topics: delta,
        };
        let endpoint = manager.config().name_server.clone();
        let timeout = manager.config().request_timeout;
        let response = manager
            .sync_lite_subscription(&endpoint, request, timeout)
            .await?;
        response.status.check()
    }
}
