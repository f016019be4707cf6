//! Credential entries and the typed header records stored beside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroize;

use passvault_common::{Error, GroupPath, Result};
use passvault_policy::PasswordPolicy;

/// One stored credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    /// Normalized dotted group path; `""` is the root group.
    #[serde(default)]
    pub group: String,
    /// Name of the policy the password was checked against.
    #[serde(default)]
    pub policy_name: Option<String>,
    /// Parameters of that policy at the time of the last write.
    #[serde(default)]
    pub policy: Option<PasswordPolicy>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Entry {
    /// Build a new entry from a request. The request is not validated here.
    pub fn new(request: EntryRequest, policy: Option<&PasswordPolicy>) -> Self {
        let now = Utc::now();
        let mut entry = Self {
            id: Uuid::new_v4(),
            title: String::new(),
            username: String::new(),
            password: String::new(),
            url: String::new(),
            notes: String::new(),
            group: String::new(),
            policy_name: None,
            policy: None,
            created: now,
            modified: now,
        };
        entry.apply(request, policy);
        entry.modified = entry.created;
        entry
    }

    /// Overwrite every user-editable field, keeping id and creation time.
    pub fn apply(&mut self, mut request: EntryRequest, policy: Option<&PasswordPolicy>) {
        self.title = request.title.trim().to_string();
        self.username = std::mem::take(&mut request.username);
        self.password.zeroize();
        self.password = std::mem::take(&mut request.password);
        self.url = std::mem::take(&mut request.url);
        self.notes.zeroize();
        self.notes = std::mem::take(&mut request.notes);
        self.group = GroupPath::normalize(&request.group);
        self.policy_name = policy.map(|p| p.name.clone());
        self.policy = policy.cloned();
        self.modified = Utc::now();
    }

    /// The entry's group as a path.
    pub fn group_path(&self) -> GroupPath {
        GroupPath::parse(&self.group)
    }

    /// Whether the entry lives in `group` or one of its subgroups.
    pub fn is_in(&self, group: &GroupPath) -> bool {
        self.group_path().is_same_or_child(group)
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.password.zeroize();
        self.notes.zeroize();
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("group", &self.group)
            .field("policy_name", &self.policy_name)
            .finish()
    }
}

/// Caller-supplied fields for creating or updating an entry.
#[derive(Clone, Default)]
pub struct EntryRequest {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub group: String,
    /// Policy to enforce; falls back to the vault default.
    pub policy_name: Option<String>,
}

impl EntryRequest {
    pub fn new(title: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            username: String::new(),
            password: password.into(),
            url: String::new(),
            notes: String::new(),
            group: String::new(),
            policy_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_policy(mut self, name: impl Into<String>) -> Self {
        self.policy_name = Some(name.into());
        self
    }

    /// Check the required fields.
    ///
    /// # Errors
    /// - `InvalidInput` if the title or password is empty
    pub fn check(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title is required.".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::InvalidInput("Password is required.".to_string()));
        }
        Ok(())
    }
}

impl Drop for EntryRequest {
    fn drop(&mut self) {
        self.password.zeroize();
        self.notes.zeroize();
    }
}

impl fmt::Debug for EntryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRequest")
            .field("title", &self.title)
            .field("group", &self.group)
            .field("policy_name", &self.policy_name)
            .finish_non_exhaustive()
    }
}

/// Kind of a header record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderKind {
    /// Keeps a group that owns no entries; `text` holds the path.
    EmptyGroup,
    /// Names the vault-wide default policy.
    DefaultPolicy,
}

/// A typed record in the document header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub kind: HeaderKind,
    #[serde(default)]
    pub text: Option<String>,
    /// Older vaults stored the default policy by id only.
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

impl HeaderRecord {
    /// Marker for an empty group.
    pub fn empty_group(path: &GroupPath) -> Self {
        Self {
            kind: HeaderKind::EmptyGroup,
            text: Some(path.as_string()),
            uuid: None,
        }
    }

    /// Default policy record.
    pub fn default_policy(name: impl Into<String>) -> Self {
        Self {
            kind: HeaderKind::DefaultPolicy,
            text: Some(name.into()),
            uuid: None,
        }
    }

    /// The group path of an empty-group marker.
    pub fn group_marker(&self) -> Option<GroupPath> {
        match self.kind {
            HeaderKind::EmptyGroup => self.text.as_deref().map(GroupPath::parse),
            HeaderKind::DefaultPolicy => None,
        }
    }
}
