//! Group and permission model.
//!
//! Every connection owns a set of [`Group`]s. Exactly one of them is the Admin
//! group, created together with the connection and seeded with its creator.
//! A group carries a coarse connection-wide [`AccessLevel`] and, for the
//! `readonly`/`edit` levels, per-table [`Permission`] rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name given to the Admin group of every connection.
pub const ADMIN_GROUP_NAME: &str = "Admin";

/// Coarse, connection-wide access level of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// No access to any table of the connection.
    #[default]
    None,
    /// Table permissions apply, capped to read-only.
    Readonly,
    /// Table permissions apply as configured.
    Edit,
    /// Every table is visible and fully editable.
    #[serde(rename = "fullaccess")]
    FullAccess,
}

/// Operations a requester can attempt on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableAction {
    Read,
    Add,
    Edit,
    Delete,
}

impl fmt::Display for TableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableAction::Read => "read",
            TableAction::Add => "add",
            TableAction::Edit => "edit",
            TableAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Resolved table permissions for one requester, or one fine-grained
/// permission row for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Capability {
    #[serde(default)]
    pub visibility: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub add: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub edit: bool,
}

impl Capability {
    pub const fn denied() -> Self {
        Self {
            visibility: false,
            readonly: false,
            add: false,
            delete: false,
            edit: false,
        }
    }

    pub const fn full() -> Self {
        Self {
            visibility: true,
            readonly: false,
            add: true,
            delete: true,
            edit: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            visibility: true,
            readonly: true,
            add: false,
            delete: false,
            edit: false,
        }
    }

    /// Readonly is a restriction: a readonly capability never adds, edits or deletes.
    pub fn normalized(mut self) -> Self {
        if self.readonly {
            self.add = false;
            self.edit = false;
            self.delete = false;
        }
        if !self.visibility {
            self = Self::denied();
        }
        self
    }

    pub fn allows(&self, action: TableAction) -> bool {
        if !self.visibility {
            return false;
        }
        match action {
            TableAction::Read => true,
            TableAction::Add => self.add && !self.readonly,
            TableAction::Edit => self.edit && !self.readonly,
            TableAction::Delete => self.delete && !self.readonly,
        }
    }
}

/// Fine-grained permission of one group on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub table_name: String,
    #[serde(flatten)]
    pub access: Capability,
}

/// Errors raised when mutating a group.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("user {user} is already a member of group {group}")]
    AlreadyMember { group: String, user: String },

    #[error("user {user} is not a member of group {group}")]
    NotMember { group: String, user: String },

    #[error("cannot remove the last user from the Admin group")]
    LastAdminMember,

    #[error("the Admin group cannot be {action}")]
    AdminGroupImmutable { action: &'static str },
}

/// A named set of users scoped to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub connection_id: String,
    pub name: String,

    /// The Admin group is created with the connection and always has full access.
    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default)]
    pub access_level: AccessLevel,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Group {
    pub fn new(
        id: impl Into<String>,
        connection_id: impl Into<String>,
        name: impl Into<String>,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: id.into(),
            connection_id: connection_id.into(),
            name: name.into(),
            is_admin: false,
            members: Vec::new(),
            access_level,
            permissions: Vec::new(),
        }
    }

    /// The Admin group created alongside a connection, seeded with its creator.
    pub fn new_admin(connection_id: impl Into<String>, creator: impl Into<String>) -> Self {
        let connection_id = connection_id.into();
        Self {
            id: format!("{}:admin", connection_id),
            connection_id,
            name: ADMIN_GROUP_NAME.to_string(),
            is_admin: true,
            members: vec![creator.into()],
            access_level: AccessLevel::FullAccess,
            permissions: Vec::new(),
        }
    }

    pub fn with_member(mut self, user: impl Into<String>) -> Self {
        let user = user.into();
        if !self.has_member(&user) {
            self.members.push(user);
        }
        self
    }

    pub fn with_permission(mut self, table: impl Into<String>, access: Capability) -> Self {
        self.set_permission(table, access);
        self
    }

    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    /// Connection-wide level, with the Admin group always at full access.
    pub fn effective_level(&self) -> AccessLevel {
        if self.is_admin {
            AccessLevel::FullAccess
        } else {
            self.access_level
        }
    }

    pub fn table_permission(&self, table: &str) -> Option<&Capability> {
        self.permissions
            .iter()
            .find(|p| p.table_name == table)
            .map(|p| &p.access)
    }

    /// Insert or replace the permission row for a table.
    pub fn set_permission(&mut self, table: impl Into<String>, access: Capability) {
        let table = table.into();
        match self.permissions.iter_mut().find(|p| p.table_name == table) {
            Some(existing) => existing.access = access,
            None => self.permissions.push(Permission {
                table_name: table,
                access,
            }),
        }
    }

    pub fn add_member(&mut self, user: impl Into<String>) -> Result<(), GroupError> {
        let user = user.into();
        if self.has_member(&user) {
            return Err(GroupError::AlreadyMember {
                group: self.name.clone(),
                user,
            });
        }
        self.members.push(user);
        Ok(())
    }

    pub fn remove_member(&mut self, user: &str) -> Result<(), GroupError> {
        let Some(idx) = self.members.iter().position(|m| m == user) else {
            return Err(GroupError::NotMember {
                group: self.name.clone(),
                user: user.to_string(),
            });
        };
        if self.is_admin && self.members.len() == 1 {
            return Err(GroupError::LastAdminMember);
        }
        self.members.remove(idx);
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), GroupError> {
        if self.is_admin {
            return Err(GroupError::AdminGroupImmutable { action: "renamed" });
        }
        self.name = name.into();
        Ok(())
    }

    /// Deletion check, called before a group is dropped from its connection.
    pub fn ensure_deletable(&self) -> Result<(), GroupError> {
        if self.is_admin {
            return Err(GroupError::AdminGroupImmutable { action: "deleted" });
        }
        Ok(())
    }
}
