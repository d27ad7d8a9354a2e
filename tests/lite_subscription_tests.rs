//! Integration tests for the lite-subscription surface of the consumer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowmq::client::{AddressScheme, ClientManager, Endpoint};
use flowmq::config::{ClientConfig, ConsumerConfig, MessageModel};
use flowmq::consumer::{ConsumeStatus, MessageListener, PushConsumer};
use flowmq::message::MessageView;
use flowmq::rpc::mock::{MockConnectionFactory, MockTransport};
use flowmq::rpc::{LiteSubscriptionAction, NotifyUnsubscribeLiteCommand, Status};
use flowmq::{Error, StatusCode};

struct NoopListener;

#[async_trait]
impl MessageListener for NoopListener {
    async fn consume(&self, _message: &MessageView) -> ConsumeStatus {
        ConsumeStatus::Success
    }
}

fn name_server() -> Endpoint {
    Endpoint::new(AddressScheme::Plain, "nameserver", 9876)
}

async fn started_consumer(
    quota: usize,
) -> (Arc<MockTransport>, Arc<ClientManager>, Arc<PushConsumer>) {
    let factory = Arc::new(MockConnectionFactory::new());
    let transport = factory.transport(&name_server());
    let manager = ClientManager::new(ClientConfig::new(name_server()), factory);

    let config = ConsumerConfig {
        message_model: MessageModel::Broadcasting,
        lite_bind_topic: Some("orders".to_string()),
        lite_subscription_quota: quota,
        max_lite_topic_length: 64,
        // Long cadence so scheduled resyncs don't interfere with asserts.
        lite_sync_interval: Duration::from_secs(3600),
        scan_assignment_interval: Duration::from_secs(3600),
        ..ConsumerConfig::new("test-group")
    };
    let consumer = PushConsumer::new(Arc::clone(&manager), config, Arc::new(NoopListener)).unwrap();
    consumer.start().await;
    (transport, manager, consumer)
}

#[tokio::test]
async fn subscribe_is_idempotent_without_extra_rpc() {
    let (transport, _, consumer) = started_consumer(10).await;

    consumer.subscribe_lite("lite-a").await.unwrap();
    consumer.subscribe_lite("lite-a").await.unwrap();

    assert_eq!(transport.sync_requests().len(), 1);
    let set = consumer.lite_topic_set().await.unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.contains("lite-a"));

    consumer.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_is_idempotent_without_extra_rpc() {
    let (transport, _, consumer) = started_consumer(10).await;

    consumer.subscribe_lite("lite-a").await.unwrap();
    consumer.unsubscribe_lite("lite-a").await.unwrap();
    consumer.unsubscribe_lite("lite-a").await.unwrap();

    assert_eq!(transport.sync_requests().len(), 2);
    assert!(consumer.lite_topic_set().await.unwrap().is_empty());

    consumer.shutdown().await;
}

#[tokio::test]
async fn quota_allows_exactly_two_of_three() {
    let (_, _, consumer) = started_consumer(2).await;

    consumer.subscribe_lite("a").await.unwrap();
    consumer.subscribe_lite("b").await.unwrap();
    let err = consumer.subscribe_lite("c").await.unwrap_err();

    assert!(matches!(err, Error::QuotaExceeded(_)));
    let set = consumer.lite_topic_set().await.unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.contains("a") && set.contains("b"));

    consumer.shutdown().await;
}

#[tokio::test]
async fn validation_errors_never_contact_the_server() {
    let (transport, _, consumer) = started_consumer(10).await;

    assert!(matches!(
        consumer.subscribe_lite("").await.unwrap_err(),
        Error::Validation(_)
    ));
    let long = "x".repeat(65);
    assert!(matches!(
        consumer.subscribe_lite(&long).await.unwrap_err(),
        Error::Validation(_)
    ));

    assert!(transport.sync_requests().is_empty());
    consumer.shutdown().await;
}

#[tokio::test]
async fn full_resync_sends_complete_set_regardless_of_history() {
    let (transport, _, consumer) = started_consumer(10).await;

    consumer.subscribe_lite("a").await.unwrap();
    consumer.subscribe_lite("b").await.unwrap();
    consumer.subscribe_lite("c").await.unwrap();
    consumer.unsubscribe_lite("c").await.unwrap();

    consumer.sync_all_lite_subscription().await.unwrap();

    let requests = transport.sync_requests();
    let complete = requests.last().unwrap();
    assert_eq!(complete.action, LiteSubscriptionAction::CompleteAdd);
    let mut sent = complete.lite_topics.clone();
    sent.sort();
    assert_eq!(sent, vec!["a".to_string(), "b".to_string()]);

    consumer.shutdown().await;
}

#[tokio::test]
async fn server_notification_takes_effect_immediately() {
    let (_, _, consumer) = started_consumer(10).await;

    consumer.subscribe_lite("a").await.unwrap();
    consumer.subscribe_lite("b").await.unwrap();

    consumer
        .on_notify_unsubscribe_lite(
            &name_server(),
            NotifyUnsubscribeLiteCommand {
                lite_topic: "a".to_string(),
            },
        )
        .await;

    // No waiting for the next periodic resync.
    let set = consumer.lite_topic_set().await.unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.contains("b"));

    consumer.shutdown().await;
}

#[tokio::test]
async fn blank_notification_does_not_clear_the_set() {
    let (_, _, consumer) = started_consumer(10).await;

    consumer.subscribe_lite("a").await.unwrap();
    consumer
        .on_notify_unsubscribe_lite(
            &name_server(),
            NotifyUnsubscribeLiteCommand {
                lite_topic: String::new(),
            },
        )
        .await;

    assert_eq!(consumer.lite_topic_set().await.unwrap().len(), 1);
    consumer.shutdown().await;
}

#[tokio::test]
async fn rpc_failure_leaves_local_state_unchanged() {
    let (transport, _, consumer) = started_consumer(10).await;

    transport.set_sync_status(Status::error(
        StatusCode::InternalServerError,
        "broker unavailable",
    ));
    let err = consumer.subscribe_lite("a").await.unwrap_err();
    assert!(matches!(err, Error::Status { .. }));
    assert!(consumer.lite_topic_set().await.unwrap().is_empty());

    // Recovery: once the server answers OK the same call commits.
    transport.set_sync_status(Status::ok());
    consumer.subscribe_lite("a").await.unwrap();
    assert_eq!(consumer.lite_topic_set().await.unwrap().len(), 1);

    consumer.shutdown().await;
}

#[tokio::test]
async fn mutations_require_started_consumer() {
    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(ClientConfig::new(name_server()), factory);
    let config = ConsumerConfig {
        lite_bind_topic: Some("orders".to_string()),
        ..ConsumerConfig::new("test-group")
    };
    let consumer = PushConsumer::new(manager, config, Arc::new(NoopListener)).unwrap();

    assert!(matches!(
        consumer.subscribe_lite("a").await.unwrap_err(),
        Error::IllegalState(_)
    ));
    assert!(matches!(
        consumer.unsubscribe_lite("a").await.unwrap_err(),
        Error::IllegalState(_)
    ));

    consumer.start().await;
    consumer.shutdown().await;
    assert!(matches!(
        consumer.subscribe_lite("a").await.unwrap_err(),
        Error::IllegalState(_)
    ));
}

#[tokio::test]
async fn scheduled_resync_fires_on_cadence() {
    let factory = Arc::new(MockConnectionFactory::new());
    let transport = factory.transport(&name_server());
    let manager = ClientManager::new(ClientConfig::new(name_server()), factory);

    let config = ConsumerConfig {
        lite_bind_topic: Some("orders".to_string()),
        lite_sync_interval: Duration::from_millis(30),
        scan_assignment_interval: Duration::from_secs(3600),
        ..ConsumerConfig::new("test-group")
    };
    let consumer = PushConsumer::new(manager, config, Arc::new(NoopListener)).unwrap();
    consumer.start().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    consumer.shutdown().await;

    let complete_adds = transport
        .sync_requests()
        .iter()
        .filter(|r| r.action == LiteSubscriptionAction::CompleteAdd)
        .count();
    assert!(complete_adds >= 2, "expected periodic resyncs, got {complete_adds}");
}
