//! Topic route topology as reported by the name server.
//!
//! A route query returns every partition replica of a topic together with
//! the broker hosting it. Only primary replicas (broker id 0) are
//! consumable; the rest is routing metadata kept for completeness.

use crate::client::Endpoint;
use crate::types::BrokerId;

/// One broker node hosting partition replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    /// Replica id within the partition's replica group; 0 is the primary.
    pub id: BrokerId,
    /// Endpoint clients use to reach this broker.
    pub endpoint: Endpoint,
}

/// One partition replica in a topic's route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Topic the partition belongs to.
    pub topic: String,
    /// Partition index within the topic.
    pub queue_id: u32,
    /// Broker hosting this replica.
    pub broker: Broker,
}

impl Partition {
    /// Whether this replica may be consumed from.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.broker.id.is_primary()
    }
}

/// Complete route topology for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicRouteData {
    /// All partition replicas, in server-reported order.
    pub partitions: Vec<Partition>,
}

impl TopicRouteData {
    /// Endpoints of all primary replicas, deduplicated, in first-seen order.
    pub fn primary_endpoints(&self) -> Vec<Endpoint> {
        let mut seen = Vec::new();
        for partition in self.partitions.iter().filter(|p| p.is_primary()) {
            if !seen.contains(&partition.broker.endpoint) {
                seen.push(partition.broker.endpoint.clone());
            }
        }
        seen
    }
}
