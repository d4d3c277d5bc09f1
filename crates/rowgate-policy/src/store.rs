//! Source of group and permission data.
//!
//! Groups and permissions are owned by an external collaborator. The evaluator
//! only reads them, once per request.

use async_trait::async_trait;
use rowgate_core::Group;

use crate::error::PolicyError;

/// Read access to the groups of a connection.
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Every group of `connection_id` that has `user_id` as a member.
    async fn groups_for_user(
        &self,
        connection_id: &str,
        user_id: &str,
    ) -> Result<Vec<Group>, PolicyError>;
}

/// Access store over a fixed set of groups, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessStore {
    groups: Vec<Group>,
}

impl StaticAccessStore {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

#[async_trait]
impl AccessStore for StaticAccessStore {
    async fn groups_for_user(
        &self,
        connection_id: &str,
        user_id: &str,
    ) -> Result<Vec<Group>, PolicyError> {
        Ok(self
            .groups
            .iter()
            .filter(|g| g.connection_id == connection_id && g.has_member(user_id))
            .cloned()
            .collect())
    }
}
