//! Integration tests for the connection pool and scheduler rounds.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flowmq::client::{AddressScheme, ClientManager, ClientObserver, Endpoint, ServiceState};
use flowmq::config::ClientConfig;
use flowmq::rpc::mock::MockConnectionFactory;
use flowmq::types::ClientId;
use flowmq::{Error, Result};

fn endpoint(host: &str) -> Endpoint {
    Endpoint::new(AddressScheme::Plain, host, 8081)
}

fn config() -> ClientConfig {
    ClientConfig::new(endpoint("nameserver"))
}

struct CountingObserver {
    id: ClientId,
    health_checks: AtomicU32,
    heartbeats: AtomicU32,
    stats: AtomicU32,
    fail_heartbeat: bool,
}

impl CountingObserver {
    fn new(id: &str, fail_heartbeat: bool) -> Arc<Self> {
        Arc::new(Self {
            id: ClientId::new(id),
            health_checks: AtomicU32::new(0),
            heartbeats: AtomicU32::new(0),
            stats: AtomicU32::new(0),
            fail_heartbeat,
        })
    }
}

#[async_trait]
impl ClientObserver for CountingObserver {
    fn client_id(&self) -> &ClientId {
        &self.id
    }

    async fn on_health_check(&self) -> Result<()> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_heartbeat(&self) -> Result<()> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.fail_heartbeat {
            Err(Error::Timeout { millis: 1 })
        } else {
            Ok(())
        }
    }

    async fn on_stats(&self) -> Result<()> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn concurrent_get_connection_returns_one_shared_connection() {
    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(config(), factory.clone());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.get_connection(&endpoint("broker-0")).await.unwrap()
        }));
    }
    let connections: Vec<_> = futures_join(handles).await;

    assert_eq!(factory.connect_count(&endpoint("broker-0")), 1);
    for connection in &connections[1..] {
        assert!(Arc::ptr_eq(&connections[0], connection));
    }
}

async fn futures_join<T>(handles: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

#[tokio::test]
async fn connection_failure_surfaces_and_is_not_cached() {
    let factory = Arc::new(MockConnectionFactory::new());
    factory.fail_connect(&endpoint("broker-0"), "secure channel setup failed");
    let manager = ClientManager::new(config(), factory.clone());

    for _ in 0..3 {
        let err = manager.get_connection(&endpoint("broker-0")).await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn idle_sweep_evicts_strictly_past_threshold() {
    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(
        ClientConfig {
            connection_max_idle: Duration::from_millis(60),
            ..config()
        },
        factory.clone(),
    );

    manager.get_connection(&endpoint("stale")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.get_connection(&endpoint("young")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    // "stale" idled ~70ms, "young" only ~40ms.
    manager.sweep_idle_connections().await;

    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(factory.transport(&endpoint("stale")).shutdown_count(), 1);
    assert_eq!(factory.transport(&endpoint("young")).shutdown_count(), 0);
}

#[tokio::test]
async fn periodic_rounds_drive_all_observers_despite_failures() {
    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(
        ClientConfig {
            health_check_interval: Duration::from_millis(20),
            heartbeat_interval: Duration::from_millis(20),
            stats_interval: Duration::from_millis(20),
            idle_sweep_interval: Duration::from_millis(50),
            connection_max_idle: Duration::from_millis(500),
            ..config()
        },
        factory,
    );

    let failing = CountingObserver::new("failing", true);
    let healthy = CountingObserver::new("healthy", false);
    manager.register_observer(failing.clone());
    manager.register_observer(healthy.clone());

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    manager.shutdown().await;

    // The failing observer never stops the round for the healthy one.
    assert!(failing.heartbeats.load(Ordering::SeqCst) >= 2);
    assert!(healthy.heartbeats.load(Ordering::SeqCst) >= 2);
    assert!(healthy.health_checks.load(Ordering::SeqCst) >= 2);
    assert!(healthy.stats.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn lifecycle_is_idempotent_and_terminal() {
    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(config(), factory.clone());

    assert_eq!(manager.state(), ServiceState::Ready);
    manager.start().await;
    manager.start().await;
    assert_eq!(manager.state(), ServiceState::Started);

    manager.get_connection(&endpoint("broker-0")).await.unwrap();
    manager.shutdown().await;
    manager.shutdown().await;
    assert_eq!(manager.state(), ServiceState::Stopped);
    assert_eq!(manager.connection_count().await, 0);
    assert_eq!(factory.transport(&endpoint("broker-0")).shutdown_count(), 1);
}

#[tokio::test]
async fn rpc_surface_reuses_pooled_connection() {
    use flowmq::rpc::HealthCheckRequest;

    let factory = Arc::new(MockConnectionFactory::new());
    let manager = ClientManager::new(config(), factory.clone());

    for _ in 0..5 {
        manager
            .health_check(
                &endpoint("broker-0"),
                HealthCheckRequest {
                    client_id: ClientId::generate(),
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
    }

    assert_eq!(factory.connect_count(&endpoint("broker-0")), 1);
    assert_eq!(factory.transport(&endpoint("broker-0")).health_check_count(), 5);
}
