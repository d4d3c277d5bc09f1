//! Effective access for one requester on one table.
//!
//! Evaluation is a pure fold over the groups the requester belongs to on the
//! connection:
//!
//! 1. Each group resolves to one [`Capability`] through its coarse access level:
//!    `none` denies, `fullaccess` permits everything, `readonly` and `edit`
//!    fall back to the group's permission row for the table (`readonly` caps
//!    the row to read-only).
//! 2. A `fullaccess` group ends the fold with full permission.
//! 3. Otherwise every flag is OR-ed across visible group capabilities. A
//!    readonly flag from any visible group makes the result readonly, which
//!    disables add/edit/delete.

use rowgate_core::{AccessLevel, Capability, Group, TableSchema, TableSettings};
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of evaluating a requester's access to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// Whether the requester belongs to any group of the connection.
    pub is_member: bool,
    pub capability: Capability,
    /// Columns that must never be returned, filtered or sorted on.
    pub excluded_fields: BTreeSet<String>,
}

impl AccessDecision {
    pub fn is_visible(&self) -> bool {
        self.capability.visibility
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_fields.contains(column)
    }
}

/// Capability a single group grants on a table.
pub fn group_capability(group: &Group, table: &str) -> Capability {
    match group.effective_level() {
        AccessLevel::None => Capability::denied(),
        AccessLevel::FullAccess => Capability::full(),
        AccessLevel::Readonly => match group.table_permission(table) {
            Some(row) if row.visibility => Capability::read_only(),
            _ => Capability::denied(),
        },
        AccessLevel::Edit => group
            .table_permission(table)
            .copied()
            .map(Capability::normalized)
            .unwrap_or_else(Capability::denied),
    }
}

/// Merge per-group capabilities into one effective capability.
pub fn merge_capabilities<I>(capabilities: I) -> Capability
where
    I: IntoIterator<Item = Capability>,
{
    let mut merged = Capability::denied();
    for cap in capabilities {
        if !cap.visibility {
            continue;
        }
        merged.visibility = true;
        merged.readonly |= cap.readonly;
        merged.add |= cap.add;
        merged.edit |= cap.edit;
        merged.delete |= cap.delete;
    }
    merged.normalized()
}

/// Configured excluded fields that exist in the table, minus primary keys.
pub fn excluded_fields(schema: &TableSchema, settings: &TableSettings) -> BTreeSet<String> {
    settings
        .excluded_fields
        .iter()
        .filter(|c| schema.has_column(c) && !schema.is_primary_key(c))
        .cloned()
        .collect()
}

/// Effective capability of `user_id` on `table`, or `None` when the user
/// belongs to none of `groups`.
pub fn effective_capability(user_id: &str, table: &str, groups: &[Group]) -> Option<Capability> {
    let memberships: Vec<&Group> = groups.iter().filter(|g| g.has_member(user_id)).collect();
    if memberships.is_empty() {
        return None;
    }
    if memberships
        .iter()
        .any(|g| g.effective_level() == AccessLevel::FullAccess)
    {
        return Some(Capability::full());
    }
    Some(merge_capabilities(
        memberships.iter().map(|g| group_capability(g, table)),
    ))
}

/// Evaluate access for `user_id` given the groups of one connection.
///
/// `groups` may contain groups the user does not belong to; they are skipped.
pub fn evaluate(
    user_id: &str,
    table: &str,
    groups: &[Group],
    schema: &TableSchema,
    settings: &TableSettings,
) -> AccessDecision {
    let capability = effective_capability(user_id, table, groups);
    AccessDecision {
        is_member: capability.is_some(),
        capability: capability.unwrap_or_else(Capability::denied),
        excluded_fields: excluded_fields(schema, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowgate_core::ColumnSchema;

    fn users_table() -> TableSchema {
        TableSchema::new("users")
            .with_column(ColumnSchema::new("id", "integer").primary_key())
            .with_column(ColumnSchema::new("name", "text"))
            .with_column(ColumnSchema::new("password_hash", "text"))
    }

    fn edit_group(id: &str, table_access: Capability) -> Group {
        Group::new(id, "conn", id, AccessLevel::Edit)
            .with_member("u1")
            .with_permission("users", table_access)
    }

    #[test]
    fn test_or_merge_grants_edit() {
        let a = edit_group(
            "a",
            Capability {
                visibility: true,
                edit: false,
                ..Capability::denied()
            },
        );
        let b = edit_group(
            "b",
            Capability {
                visibility: true,
                edit: true,
                ..Capability::denied()
            },
        );
        let decision = evaluate("u1", "users", &[a, b], &users_table(), &TableSettings::default());
        assert!(decision.capability.visibility);
        assert!(decision.capability.edit);
        assert!(!decision.capability.add);
    }

    #[test]
    fn test_readonly_group_disables_edit() {
        let a = edit_group(
            "a",
            Capability {
                visibility: true,
                edit: true,
                ..Capability::denied()
            },
        );
        let b = edit_group("b", Capability::read_only());
        let decision = evaluate("u1", "users", &[a, b], &users_table(), &TableSettings::default());
        assert!(decision.capability.readonly);
        assert!(!decision.capability.edit);
        assert!(decision.capability.visibility);
    }

    #[test]
    fn test_hidden_group_readonly_flag_is_ignored() {
        let a = edit_group("a", Capability::full());
        let b = edit_group(
            "b",
            Capability {
                visibility: false,
                readonly: true,
                ..Capability::denied()
            },
        );
        let decision = evaluate("u1", "users", &[a, b], &users_table(), &TableSettings::default());
        assert_eq!(decision.capability, Capability::full());
    }

    #[test]
    fn test_coarse_levels_short_circuit() {
        let none = Group::new("n", "conn", "n", AccessLevel::None)
            .with_member("u1")
            .with_permission("users", Capability::full());
        assert_eq!(group_capability(&none, "users"), Capability::denied());

        let full = Group::new("f", "conn", "f", AccessLevel::FullAccess).with_member("u1");
        assert_eq!(group_capability(&full, "anything"), Capability::full());

        let readonly = Group::new("r", "conn", "r", AccessLevel::Readonly)
            .with_member("u1")
            .with_permission("users", Capability::full());
        assert_eq!(group_capability(&readonly, "users"), Capability::read_only());
        assert_eq!(group_capability(&readonly, "orders"), Capability::denied());

        let admin = Group::new_admin("conn", "u1");
        let decision = evaluate(
            "u1",
            "users",
            &[readonly, admin],
            &users_table(),
            &TableSettings::default(),
        );
        assert_eq!(decision.capability, Capability::full());
    }

    #[test]
    fn test_non_member_is_denied() {
        let group = edit_group("a", Capability::full());
        let decision = evaluate("stranger", "users", &[group], &users_table(), &TableSettings::default());
        assert!(!decision.is_member);
        assert!(!decision.is_visible());
    }

    #[test]
    fn test_primary_keys_are_never_excluded() {
        let settings = TableSettings {
            excluded_fields: vec![
                "id".to_string(),
                "password_hash".to_string(),
                "missing".to_string(),
            ],
            ..Default::default()
        };
        let fields = excluded_fields(&users_table(), &settings);
        assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec!["password_hash".to_string()]);
    }
}
