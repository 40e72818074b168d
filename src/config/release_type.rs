//! Release type records
//!
//! A release type is a named rule matching a branch/environment and
//! specifying how to compute, tag and publish a release. Every string field
//! holds a raw template resolved against the live state at the moment it is
//! read.

use crate::domain::IdentifierPosition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Workspace cleanliness predicate of a release type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkspaceStatus {
    Clean,
    Dirty,
    #[default]
    Any,
}

/// An extra identifier appended to inferred versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionIdentifier {
    pub position: IdentifierPosition,
    /// Template for the identifier qualifier
    pub qualifier: String,
    /// Template for the identifier value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A named release rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Regex template matched against the current branch name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_branches: Option<String>,

    /// Environment variable name to regex; all entries must match
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub match_environment_variables: IndexMap<String, String>,

    #[serde(default)]
    pub match_workspace_status: WorkspaceStatus,

    /// Regex template selecting the tags considered for the previous version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_tags: Option<String>,

    #[serde(default)]
    pub collapse_versions: bool,

    /// Template for the pre-release qualifier of collapsed versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed_version_qualifier: Option<String>,

    /// Regex template the inferred version must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,

    /// Derive the version range from the branch name instead
    #[serde(default)]
    pub version_range_from_branch_name: bool,

    /// Extra identifiers appended in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<VersionIdentifier>,

    /// Boolean template: commit pending changes during Mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,

    /// Template for the release commit message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_message: Option<String>,

    /// Boolean template: push to the configured remotes during Mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_push: Option<String>,

    /// Boolean template: tag the release commit during Mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_tag: Option<String>,

    /// Template for the annotated tag message; empty means lightweight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_tag_message: Option<String>,

    /// Boolean template: publish to the configured services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<String>,
}

impl ReleaseType {
    /// The built-in fallback rule: matches anything, disables every side
    /// effect
    pub fn fallback() -> Self {
        ReleaseType {
            description: Some("Fallback release type".to_string()),
            publish: Some("false".to_string()),
            git_commit: Some("false".to_string()),
            git_push: Some("false".to_string()),
            git_tag: Some("false".to_string()),
            ..ReleaseType::default()
        }
    }
}

/// Name reserved for the built-in fallback rule
pub const DEFAULT_RELEASE_TYPE_NAME: &str = "default";

/// The ordered release type table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseTypes {
    /// Names evaluated in declaration order during selection
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Services (by name, from the services table) Publish releases to
    #[serde(default)]
    pub publication_services: Vec<String>,

    /// Git remotes pushed to during Mark; defaults to `origin`
    #[serde(default)]
    pub remote_repositories: Vec<String>,

    #[serde(default)]
    pub items: IndexMap<String, ReleaseType>,
}

impl Default for ReleaseTypes {
    fn default() -> Self {
        let mut items = IndexMap::new();
        items.insert(DEFAULT_RELEASE_TYPE_NAME.to_string(), ReleaseType::fallback());
        ReleaseTypes {
            enabled: vec![DEFAULT_RELEASE_TYPE_NAME.to_string()],
            publication_services: Vec::new(),
            remote_repositories: Vec::new(),
            items,
        }
    }
}
