//! Push-consumption layer: assignment, flow control, and the poll loops.

pub mod assignment;
pub mod cache;
pub mod listener;
pub mod lite;
pub mod push_consumer;
pub mod resolver;
pub mod route;

pub use assignment::{Assignment, MessageQueue, TopicAssignments};
pub use cache::ConsumeCache;
pub use listener::{ConsumeStatus, MessageListener};
pub use lite::LiteSubscription;
pub use push_consumer::{PushConsumer, StatsSnapshot};
pub use resolver::AssignmentResolver;
pub use route::{Broker, Partition, TopicRouteData};
