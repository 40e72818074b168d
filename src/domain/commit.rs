//! Commit, identity and tag value objects
//!
//! These are immutable once observed from the repository and serialize into
//! the state file with camelCase field names.

use serde::{Deserialize, Serialize};

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A git tag as observed in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    /// SHA of the tagged commit
    pub target: String,
    pub annotated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Tag {
    /// Create a lightweight tag reference
    pub fn lightweight(name: impl Into<String>, target: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            target: target.into(),
            annotated: false,
            message: None,
        }
    }

    /// Create an annotated tag reference
    pub fn annotated(
        name: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Tag {
            name: name.into(),
            target: target.into(),
            annotated: true,
            message: Some(message.into()),
        }
    }
}

/// A commit as observed in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: Identity,
    pub committer: Identity,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub parents: Vec<String>,
    /// Tags pointing at this commit
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Commit {
    /// Abbreviated 7-character SHA
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(7);
        &self.sha[..end]
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
