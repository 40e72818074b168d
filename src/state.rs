//! Engine state and its persistence
//!
//! The state is the single record the pipeline phases read and write. It
//! serializes to YAML or JSON (chosen by file extension) with atomic writes,
//! round-trips unknown fields for forward compatibility, and feeds the
//! template engine as the rendering context.

use crate::changelog::Changelog;
use crate::config::Configuration;
use crate::domain::{Scheme, Version};
use crate::error::{ReleaseError, Result};
use crate::release::ReleaseScope;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// The full engine state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Release timestamp in milliseconds, anchored to the final commit so
    /// that inference stays deterministic
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Aggregate bump component of the current scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump: Option<String>,

    #[serde(default)]
    pub scheme: Scheme,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    /// Explicit configuration override, when one is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_version: Option<Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,

    #[serde(default)]
    pub release_scope: ReleaseScope,

    /// Name of the active release type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<Changelog>,

    #[serde(default)]
    pub new_version: bool,

    #[serde(default)]
    pub new_release: bool,

    /// The resolved configuration snapshot this state was computed under
    #[serde(default)]
    pub configuration: Configuration,

    /// Version the Mark phase last completed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark_completed_for: Option<String>,

    /// Version the Make phase last completed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_completed_for: Option<String>,

    /// Version the Publish phase last completed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_completed_for: Option<String>,

    /// Services already published for the current version, in service order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_services: Vec<String>,

    /// Unknown fields, preserved for forward compatibility
    #[serde(flatten, default, skip_serializing_if = "IndexMap::is_empty")]
    pub other: IndexMap<String, Value>,
}

impl State {
    /// A fresh state for the given configuration snapshot
    pub fn new(configuration: Configuration) -> Self {
        State {
            directory: Some(configuration.directory().to_string()),
            scheme: configuration.scheme(),
            configuration,
            ..State::default()
        }
    }

    /// The rendering context for templates
    ///
    /// The whole state tree is visible to templates; environment lookups
    /// are handled by the engine itself.
    pub fn to_context(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Drop every field computed by Infer, keeping the configuration
    ///
    /// Used when a resumed state turns out to be stale.
    pub fn invalidate(&mut self) {
        self.branch = None;
        self.bump = None;
        self.version = None;
        self.overridden_version = None;
        self.version_range = None;
        self.release_scope = ReleaseScope::default();
        self.release_type = None;
        self.changelog = None;
        self.new_version = false;
        self.new_release = false;
        self.mark_completed_for = None;
        self.make_completed_for = None;
        self.publish_completed_for = None;
        self.published_services.clear();
    }

    /// Load a state file, selecting the parser by extension
    pub fn load(path: &Path) -> Result<State> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReleaseError::state(format!("Cannot read state file '{}': {}", path.display(), e))
        })?;
        if is_yaml(path) {
            serde_yaml::from_str(&content).map_err(|e| {
                ReleaseError::state(format!("Invalid YAML in '{}': {}", path.display(), e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                ReleaseError::state(format!("Invalid JSON in '{}': {}", path.display(), e))
            })
        }
    }

    /// Serialize atomically: write a temp file next to the target, then
    /// rename over it
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)
                .map_err(|e| ReleaseError::state(format!("Cannot serialize state: {}", e)))?
        } else {
            let mut json = serde_json::to_string_pretty(self)
                .map_err(|e| ReleaseError::state(format!("Cannot serialize state: {}", e)))?;
            json.push('\n');
            json
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let temp = tempfile::NamedTempFile::new_in(parent)?;
        std::fs::write(temp.path(), &content)?;
        temp.persist(path)
            .map_err(|e| ReleaseError::state(format!("Cannot persist state file: {}", e.error)))?;
        tracing::debug!(path = %path.display(), "State saved");
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
