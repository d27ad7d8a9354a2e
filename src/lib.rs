//! # flowmq
//! Rust-native message-queue push-consumer client engine.
//!
//! This crate provides the client-side machinery of a message-queue SDK:
//! it keeps a pool of connections to broker nodes alive, discovers and
//! refreshes which queues a consumer instance is responsible for, drains
//! those queues with long polling, and settles every delivery with an
//! ack, a nack, or a dead-letter forward — all while enforcing group
//! liveness through heartbeats and local flow-control limits.
//!
//! # Goals
//! - Easy to understand code
//! - Leverage best in class libraries such as [Tokio](https://tokio.rs/)
//! - Keep transient broker failures away from the embedding application
//! - Be a building block for message-queue client SDKs
//!
//! ## Getting started
//! Install `flowmq` with `cargo add flowmq` or include the following
//! snippet in your `Cargo.toml` dependencies:
//! ```toml
//! flowmq = "0.1"
//! ```
//!
//! ### Consuming messages
//! Wire a [`ClientManager`](client::ClientManager) to your transport via
//! the [`ConnectionFactory`](rpc::ConnectionFactory) trait, then hand a
//! [`MessageListener`](consumer::MessageListener) to a
//! [`PushConsumer`](consumer::PushConsumer):
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use flowmq::prelude::*;
//!
//! struct PrintListener;
//!
//! #[async_trait]
//! impl MessageListener for PrintListener {
//!     async fn consume(&self, message: &MessageView) -> ConsumeStatus {
//!         println!("got {}", message.message_id);
//!         ConsumeStatus::Success
//!     }
//! }
//!
//! # async fn run(factory: Arc<dyn flowmq::rpc::ConnectionFactory>) -> flowmq::Result<()> {
//! let name_server = Endpoint::new(AddressScheme::Plain, "127.0.0.1", 9876);
//! let manager = ClientManager::new(ClientConfig::new(name_server), factory);
//! manager.start().await;
//!
//! let consumer = PushConsumer::new(
//!     Arc::clone(&manager),
//!     ConsumerConfig::new("my-group"),
//!     Arc::new(PrintListener),
//! )?;
//! consumer.subscribe("orders")?;
//! consumer.start().await;
//! # Ok(())
//! # }
//! ```
//!
//! The transport itself (wire encoding, TLS handshake) stays behind the
//! [`RpcTransport`](rpc::RpcTransport) seam; tests plug in the in-memory
//! [`MockTransport`](rpc::mock::MockTransport).

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod message;
pub mod retry;
pub mod rpc;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result, StatusCode};

pub mod prelude {
    //! Main exports for building a consumer.
    pub use crate::client::{AddressScheme, ClientManager, ClientObserver, Endpoint, ServiceState};
    pub use crate::config::{ClientConfig, ConsumerConfig, MessageModel};
    pub use crate::consumer::{
        ConsumeStatus, MessageListener, MessageQueue, PushConsumer, TopicAssignments,
    };
    pub use crate::error::{Error, Result, StatusCode};
    pub use crate::message::MessageView;
    pub use crate::types::ClientId;

    pub use bytes;
}
