//! Queue assignment: the set of queues one consumer instance polls.
//!
//! An assignment is rebuilt wholesale on every successful resolve — there
//! is no partial merge, the newest set is authoritative. Equality between
//! two assignments is order-insensitive so that a rescan returning the same
//! queues in a different order does not tear down and recreate unchanged
//! poll loops.

use std::collections::HashSet;
use std::fmt;

use crate::client::Endpoint;
use crate::consumer::route::TopicRouteData;

/// One consumable queue: a topic partition pinned to its primary broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageQueue {
    /// Topic the queue belongs to.
    pub topic: String,
    /// Partition index within the topic.
    pub queue_id: u32,
    /// Endpoint of the primary replica serving this queue.
    pub endpoint: Endpoint,
}

impl fmt::Display for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.topic, self.queue_id, self.endpoint)
    }
}

/// Assignment of one queue to this consumer instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    /// The assigned queue.
    pub queue: MessageQueue,
}

impl Assignment {
    /// Wrap a queue into an assignment.
    pub fn new(queue: MessageQueue) -> Self {
        Self { queue }
    }
}

/// The complete queue set assigned to one consumer for one topic.
#[derive(Debug, Clone, Default)]
pub struct TopicAssignments {
    assignments: Vec<Assignment>,
}

impl TopicAssignments {
    /// Build an assignment from explicit server-reported entries.
    pub fn new(assignments: Vec<Assignment>) -> Self {
        Self { assignments }
    }

    /// Derive an assignment directly from route data.
    ///
    /// Filters to primary replicas; standby replicas are routing metadata,
    /// not consumable queues. An empty result is a valid assignment.
    pub fn from_route(route: &TopicRouteData) -> Self {
        let assignments = route
            .partitions
            .iter()
            .filter(|partition| partition.is_primary())
            .map(|partition| {
                Assignment::new(MessageQueue {
                    topic: partition.topic.clone(),
                    queue_id: partition.queue_id,
                    endpoint: partition.broker.endpoint.clone(),
                })
            })
            .collect();
        Self { assignments }
    }

    /// The assigned queues in server-reported order.
    pub fn queues(&self) -> impl Iterator<Item = &MessageQueue> {
        self.assignments.iter().map(|assignment| &assignment.queue)
    }

    /// The assigned queues as an owned set.
    pub fn queue_set(&self) -> HashSet<MessageQueue> {
        self.queues().cloned().collect()
    }

    /// Number of assigned queues.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the assignment holds no queues.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl PartialEq for TopicAssignments {
    fn eq(&self, other: &Self) -> bool {
        // Order-insensitive: the same queues in a different order are the
        // same assignment.
        self.assignments.iter().collect::<HashSet<_>>()
            == other.assignments.iter().collect::<HashSet<_>>()
    }
}

impl Eq for TopicAssignments {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AddressScheme;
    use crate::consumer::route::{Broker, Partition};
    use crate::types::BrokerId;

    fn queue(queue_id: u32, host: &str) -> MessageQueue {
        MessageQueue {
            topic: "orders".to_string(),
            queue_id,
            endpoint: Endpoint::new(AddressScheme::Plain, host, 8081),
        }
    }

    fn assignments(queues: Vec<MessageQueue>) -> TopicAssignments {
        TopicAssignments::new(queues.into_iter().map(Assignment::new).collect())
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = assignments(vec![queue(0, "a"), queue(1, "b")]);
        let b = assignments(vec![queue(1, "b"), queue(0, "a")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoint_change_breaks_equality() {
        let a = assignments(vec![queue(0, "a"), queue(1, "b")]);
        let b = assignments(vec![queue(0, "a"), queue(1, "c")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_added_queue_breaks_equality() {
        let a = assignments(vec![queue(0, "a")]);
        let b = assignments(vec![queue(0, "a"), queue(1, "a")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_route_filters_standby_replicas() {
        let route = TopicRouteData {
            partitions: vec![
                Partition {
                    topic: "orders".to_string(),
                    queue_id: 0,
                    broker: Broker {
                        id: BrokerId::PRIMARY,
                        endpoint: Endpoint::new(AddressScheme::Plain, "a", 8081),
                    },
                },
                Partition {
                    topic: "orders".to_string(),
                    queue_id: 0,
                    broker: Broker {
                        id: BrokerId::new(1),
                        endpoint: Endpoint::new(AddressScheme::Plain, "b", 8081),
                    },
                },
            ],
        };
        let topic_assignments = TopicAssignments::from_route(&route);
        assert_eq!(topic_assignments.len(), 1);
        let only = topic_assignments.queues().next().unwrap();
        assert_eq!(only.endpoint.host(), "a");
    }

    #[test]
    fn test_from_route_with_no_primaries_is_empty_and_valid() {
        let route = TopicRouteData {
            partitions: vec![Partition {
                topic: "orders".to_string(),
                queue_id: 0,
                broker: Broker {
                    id: BrokerId::new(2),
                    endpoint: Endpoint::new(AddressScheme::Plain, "standby", 8081),
                },
            }],
        };
        let topic_assignments = TopicAssignments::from_route(&route);
        assert!(topic_assignments.is_empty());
        assert_eq!(topic_assignments, TopicAssignments::default());
    }

    #[test]
    fn test_queue_display() {
        let q = queue(3, "broker-a");
        assert_eq!(q.to_string(), "orders#3@broker-a:8081");
    }
}
