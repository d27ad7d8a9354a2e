//! Assignment resolution: from route topology to a consumable queue set.
//!
//! Resolution always starts with a route query against the name server.
//! Under [`MessageModel::Broadcasting`] the assignment derives directly
//! from the route (every primary replica is consumed by every instance);
//! under [`MessageModel::Clustering`] an explicit assignment RPC against
//! one of the route's brokers divides queues among the group's members.

use std::sync::Arc;

use tracing::debug;

use crate::client::ClientManager;
use crate::config::MessageModel;
use crate::consumer::assignment::TopicAssignments;
use crate::error::Result;
use crate::retry;
use crate::rpc::{QueryAssignmentRequest, QueryRouteRequest};
use crate::types::ClientId;

/// Resolves the authoritative queue set for one consumer instance.
pub struct AssignmentResolver {
    manager: Arc<ClientManager>,
    client_id: ClientId,
}

impl AssignmentResolver {
    pub fn new(manager: Arc<ClientManager>, client_id: ClientId) -> Self {
        Self { manager, client_id }
    }

    /// Resolve the queue set for `topic` within `group`.
    ///
    /// A rescan that finds zero primary partitions is not an error: it
    /// yields an empty, valid assignment.
    pub async fn resolve(
        &self,
        topic: &str,
        group: &str,
        model: MessageModel,
    ) -> Result<TopicAssignments> {
        let timeout = self.manager.config().request_timeout;
        let name_server = self.manager.config().name_server.clone();

        let response = retry::with_route_policy(
            || {
                self.manager.query_route(
                    &name_server,
                    QueryRouteRequest {
                        topic: topic.to_string(),
                    },
                    timeout,
                )
            },
            |e| e.is_recoverable(),
        )
        .await?;
        response.status.check()?;
        let route = response.route;

        match model {
            MessageModel::Broadcasting => {
                let assignments = TopicAssignments::from_route(&route);
                debug!(topic, group, queues = assignments.len(), "Resolved assignment from route");
                Ok(assignments)
            }
            MessageModel::Clustering => {
                let Some(endpoint) = route.primary_endpoints().into_iter().next() else {
                    debug!(topic, group, "Route reported no primary replicas");
                    return Ok(TopicAssignments::default());
                };
                let response = self
                    .manager
                    .query_assignment(
                        &endpoint,
                        QueryAssignmentRequest {
                            topic: topic.to_string(),
                            group: group.to_string(),
                            client_id: self.client_id.clone(),
                        },
                        timeout,
                    )
                    .await?;
                response.status.check()?;
                let assignments = TopicAssignments::new(response.assignments);
                debug!(topic, group, queues = assignments.len(), "Resolved assignment from broker");
                Ok(assignments)
            }
        }
    }
}
