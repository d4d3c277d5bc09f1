//! Rowgate permission evaluation.
//!
//! Turns a requester's group memberships into one effective [`Capability`] per
//! table plus the set of fields that must never leave the query core.
//!
//! The fold itself lives in [`evaluator`] and is free of I/O; the
//! [`PermissionEvaluator`] only fetches the requester's groups from an
//! [`AccessStore`] and hands them to it.

pub mod error;
pub mod evaluator;
pub mod store;

use rowgate_core::{TableSchema, TableSettings};
use std::sync::Arc;

pub use error::PolicyError;
pub use evaluator::{
    AccessDecision, effective_capability, evaluate, excluded_fields, group_capability,
    merge_capabilities,
};
pub use rowgate_core::Capability;
pub use store::{AccessStore, StaticAccessStore};

/// Resolves access decisions against an [`AccessStore`].
#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn AccessStore>,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Effective capability and excluded fields of `user_id` on `table`.
    pub async fn evaluate(
        &self,
        user_id: &str,
        connection_id: &str,
        schema: &TableSchema,
        settings: &TableSettings,
    ) -> Result<AccessDecision, PolicyError> {
        let groups = self.store.groups_for_user(connection_id, user_id).await?;
        let decision = evaluate(user_id, &schema.name, &groups, schema, settings);

        tracing::debug!(
            connection = %connection_id,
            table = %schema.name,
            groups = groups.len(),
            visible = decision.capability.visibility,
            readonly = decision.capability.readonly,
            "Evaluated table access"
        );

        Ok(decision)
    }

    /// Effective capability on each of `tables`, fetching the groups once.
    ///
    /// Returns `None` when the user belongs to no group of the connection.
    pub async fn table_capabilities(
        &self,
        user_id: &str,
        connection_id: &str,
        tables: &[String],
    ) -> Result<Option<Vec<(String, Capability)>>, PolicyError> {
        let groups = self.store.groups_for_user(connection_id, user_id).await?;
        if groups.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            tables
                .iter()
                .map(|t| {
                    let cap = effective_capability(user_id, t, &groups)
                        .unwrap_or_else(Capability::denied);
                    (t.clone(), cap)
                })
                .collect(),
        ))
    }

    /// Whether `user_id` belongs to any group of the connection.
    pub async fn is_member(&self, user_id: &str, connection_id: &str) -> Result<bool, PolicyError> {
        Ok(!self
            .store
            .groups_for_user(connection_id, user_id)
            .await?
            .is_empty())
    }
}
