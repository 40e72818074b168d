//! Configuration model and layering
//!
//! The effective configuration overlays multiple sources in fixed priority
//! (highest first): command line/environment > explicit file > shared file >
//! preset > built-in defaults. Merging is field-wise: a higher layer's value
//! wins for scalars and lists, maps and nested records merge key-by-key.
//!
//! String fields are stored raw and resolved through the template engine
//! against the live state at the moment they are read; they may reference
//! values computed mid-pipeline (`{{releaseScope.finalCommit}}`,
//! `{{version}}`).

pub mod presets;
pub mod release_type;

pub use release_type::{
    ReleaseType, ReleaseTypes, VersionIdentifier, WorkspaceStatus, DEFAULT_RELEASE_TYPE_NAME,
};

use crate::conventions::{self, CommitMessageConventions};
use crate::domain::Scheme;
use crate::error::{ReleaseError, Result};
use crate::services::Provider;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Changelog generation options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogConfiguration {
    /// Destination file; unset disables changelog generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Section name to commit type regex, in rendering order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sections: IndexMap<String, String>,

    /// Regex to replacement, applied line by line after rendering
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub substitutions: IndexMap<String, String>,

    /// Custom template overriding the default Markdown layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Credentials for one git remote (both fields are templates)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRemoteConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Git options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfiguration {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub remotes: IndexMap<String, GitRemoteConfiguration>,
}

/// A configured hosting service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfiguration {
    #[serde(rename = "type")]
    pub provider: Provider,
    /// Option name to value template (AUTHENTICATION_TOKEN, REPOSITORY_NAME,
    /// REPOSITORY_OWNER, BASE_URI, TIMEOUT)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

/// The root configuration record
///
/// Every field is optional so that layers can be overlaid; accessors apply
/// the built-in defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Explicit bump override (major, minor, patch or a named identifier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<ChangelogConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message_conventions: Option<CommitMessageConventions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_lenient: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_types: Option<ReleaseTypes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<IndexMap<String, ServiceConfiguration>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_configuration_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,

    /// Explicit version override; wins over inference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Unknown keys, preserved for forward compatibility
    #[serde(flatten, default, skip_serializing_if = "IndexMap::is_empty")]
    pub other: IndexMap<String, serde_json::Value>,
}

impl Configuration {
    /// The built-in defaults layer
    pub fn defaults() -> Self {
        Configuration {
            commit_message_conventions: Some(conventions::default_conventions()),
            directory: Some(".".to_string()),
            dry_run: Some(false),
            initial_version: Some("0.1.0".to_string()),
            release_lenient: Some(true),
            release_types: Some(ReleaseTypes::default()),
            resume: Some(false),
            scheme: Some(Scheme::Semver),
            ..Configuration::default()
        }
    }

    /// Overlay `over` on top of `self`, returning the merged configuration
    ///
    /// Scalars and lists from the higher layer replace; nested records and
    /// maps merge key-by-key (a same-named map entry is replaced wholesale,
    /// since the entry is the unit of declaration).
    pub fn overlay(mut self, over: Configuration) -> Configuration {
        self.bump = over.bump.or(self.bump);
        self.changelog = merge_option(self.changelog, over.changelog, merge_changelog);
        self.commit_message_conventions = merge_option(
            self.commit_message_conventions,
            over.commit_message_conventions,
            merge_conventions,
        );
        self.configuration_file = over.configuration_file.or(self.configuration_file);
        self.directory = over.directory.or(self.directory);
        self.dry_run = over.dry_run.or(self.dry_run);
        self.git = merge_option(self.git, over.git, |mut base, over| {
            base.remotes.extend(over.remotes);
            base
        });
        self.initial_version = over.initial_version.or(self.initial_version);
        self.preset = over.preset.or(self.preset);
        self.release_lenient = over.release_lenient.or(self.release_lenient);
        self.release_prefix = over.release_prefix.or(self.release_prefix);
        self.release_types = merge_option(self.release_types, over.release_types, merge_types);
        self.resume = over.resume.or(self.resume);
        self.scheme = over.scheme.or(self.scheme);
        self.services = merge_option(self.services, over.services, |mut base, over| {
            base.extend(over);
            base
        });
        self.shared_configuration_file = over
            .shared_configuration_file
            .or(self.shared_configuration_file);
        self.state_file = over.state_file.or(self.state_file);
        self.verbosity = over.verbosity.or(self.verbosity);
        self.version = over.version.or(self.version);
        self.other.extend(over.other);
        self
    }

    /// Effective working directory
    pub fn directory(&self) -> &str {
        self.directory.as_deref().unwrap_or(".")
    }

    /// Effective initial version string
    pub fn initial_version(&self) -> &str {
        self.initial_version.as_deref().unwrap_or("0.1.0")
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }

    pub fn is_resume(&self) -> bool {
        self.resume.unwrap_or(false)
    }

    pub fn is_release_lenient(&self) -> bool {
        self.release_lenient.unwrap_or(true)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme.unwrap_or_default()
    }

    /// Effective release type table (the fallback table when unset)
    pub fn release_types(&self) -> ReleaseTypes {
        self.release_types.clone().unwrap_or_default()
    }

    /// Effective convention set (empty when unset)
    pub fn conventions(&self) -> CommitMessageConventions {
        self.commit_message_conventions.clone().unwrap_or_default()
    }
}

fn merge_option<T>(base: Option<T>, over: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, over) {
        (Some(b), Some(o)) => Some(merge(b, o)),
        (None, over @ Some(_)) => over,
        (base, None) => base,
    }
}

fn merge_changelog(
    mut base: ChangelogConfiguration,
    over: ChangelogConfiguration,
) -> ChangelogConfiguration {
    base.path = over.path.or(base.path);
    if !over.sections.is_empty() {
        base.sections = over.sections;
    }
    if !over.substitutions.is_empty() {
        base.substitutions = over.substitutions;
    }
    base.template = over.template.or(base.template);
    base
}

fn merge_conventions(
    mut base: CommitMessageConventions,
    over: CommitMessageConventions,
) -> CommitMessageConventions {
    if !over.enabled.is_empty() {
        base.enabled = over.enabled;
    }
    base.items.extend(over.items);
    base
}

fn merge_types(mut base: ReleaseTypes, over: ReleaseTypes) -> ReleaseTypes {
    if !over.enabled.is_empty() {
        base.enabled = over.enabled;
    }
    if !over.publication_services.is_empty() {
        base.publication_services = over.publication_services;
    }
    if !over.remote_repositories.is_empty() {
        base.remote_repositories = over.remote_repositories;
    }
    base.items.extend(over.items);
    base
}

/// Load a configuration file, selecting the parser by extension
///
/// Accepts `.json`, `.yaml`/`.yml` and `.toml`. Unknown top-level keys warn
/// and are preserved in the `other` passthrough map.
pub fn load_file(path: &Path) -> Result<Configuration> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ReleaseError::config(format!(
            "Cannot read configuration file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let config: Configuration = match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| {
            ReleaseError::config(format!("Invalid JSON in '{}': {}", path.display(), e))
        })?,
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| {
            ReleaseError::config(format!("Invalid YAML in '{}': {}", path.display(), e))
        })?,
        "toml" => toml::from_str(&content).map_err(|e| {
            ReleaseError::config(format!("Invalid TOML in '{}': {}", path.display(), e))
        })?,
        other => {
            return Err(ReleaseError::config(format!(
                "Unsupported configuration file extension: '{}'",
                other
            )))
        }
    };
    for key in config.other.keys() {
        tracing::warn!(
            file = %path.display(),
            key = %key,
            "Unknown configuration option, preserved but ignored"
        );
    }
    Ok(config)
}

/// Resolve the effective configuration from the layer stack
///
/// `command_line` is the highest-priority layer; the explicit and shared
/// file paths and the preset name may come from any layer already applied
/// above them.
pub fn resolve(command_line: Configuration) -> Result<Configuration> {
    let file_layer = match &command_line.configuration_file {
        Some(path) => Some(load_file(Path::new(path))?),
        None => None,
    };
    let shared_path = command_line.shared_configuration_file.clone().or_else(|| {
        file_layer
            .as_ref()
            .and_then(|l| l.shared_configuration_file.clone())
    });
    let shared_layer = match &shared_path {
        Some(path) => Some(load_file(Path::new(path))?),
        None => None,
    };
    let preset_name = command_line
        .preset
        .clone()
        .or_else(|| file_layer.as_ref().and_then(|l| l.preset.clone()))
        .or_else(|| shared_layer.as_ref().and_then(|l| l.preset.clone()));
    let preset_layer = match &preset_name {
        Some(name) => Some(presets::by_name(name)?),
        None => None,
    };

    let mut effective = Configuration::defaults();
    if let Some(preset) = preset_layer {
        effective = effective.overlay(preset);
    }
    if let Some(shared) = shared_layer {
        effective = effective.overlay(shared);
    }
    if let Some(file) = file_layer {
        effective = effective.overlay(file);
    }
    Ok(effective.overlay(command_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::defaults();
        assert_eq!(config.initial_version(), "0.1.0");
        assert!(!config.is_dry_run());
        assert!(config.is_release_lenient());
        assert_eq!(config.scheme(), Scheme::Semver);
        assert!(config
            .conventions()
            .enabled
            .contains(&"conventionalCommits".to_string()));
    }

    #[test]
    fn test_overlay_scalar_priority() {
        let base = Configuration {
            initial_version: Some("0.1.0".to_string()),
            dry_run: Some(false),
            ..Configuration::default()
        };
        let over = Configuration {
            initial_version: Some("1.0.0".to_string()),
            ..Configuration::default()
        };
        let merged = base.overlay(over);
        assert_eq!(merged.initial_version(), "1.0.0");
        // Unset in the higher layer keeps the lower layer's value.
        assert_eq!(merged.dry_run, Some(false));
    }

    #[test]
    fn test_overlay_merges_release_type_items() {
        let mut base_items = IndexMap::new();
        base_items.insert("mainline".to_string(), ReleaseType::default());
        let base = Configuration {
            release_types: Some(ReleaseTypes {
                enabled: vec!["mainline".to_string()],
                publication_services: Vec::new(),
                remote_repositories: Vec::new(),
                items: base_items,
            }),
            ..Configuration::default()
        };

        let mut over_items = IndexMap::new();
        over_items.insert(
            "hotfix".to_string(),
            ReleaseType {
                match_branches: Some("^hotfix-".to_string()),
                ..ReleaseType::default()
            },
        );
        let over = Configuration {
            release_types: Some(ReleaseTypes {
                enabled: vec!["mainline".to_string(), "hotfix".to_string()],
                publication_services: Vec::new(),
                remote_repositories: Vec::new(),
                items: over_items,
            }),
            ..Configuration::default()
        };

        let merged = base.overlay(over);
        let types = merged.release_types();
        assert_eq!(types.enabled.len(), 2);
        assert!(types.items.contains_key("mainline"));
        assert!(types.items.contains_key("hotfix"));
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.json");
        std::fs::write(
            &path,
            r#"{"initialVersion": "1.0.0", "releasePrefix": "v", "dryRun": true}"#,
        )
        .unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.initial_version.as_deref(), Some("1.0.0"));
        assert_eq!(config.release_prefix.as_deref(), Some("v"));
        assert_eq!(config.dry_run, Some(true));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.yaml");
        std::fs::write(
            &path,
            "initialVersion: 2.0.0\nreleaseLenient: false\nscheme: semver\n",
        )
        .unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.initial_version.as_deref(), Some("2.0.0"));
        assert_eq!(config.release_lenient, Some(false));
        assert_eq!(config.scheme, Some(Scheme::Semver));
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.toml");
        std::fs::write(&path, "initialVersion = \"0.2.0\"\nresume = true\n").unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.initial_version.as_deref(), Some("0.2.0"));
        assert_eq!(config.resume, Some(true));
    }

    #[test]
    fn test_load_unknown_keys_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.json");
        std::fs::write(
            &path,
            r#"{"initialVersion": "1.0.0", "futureOption": {"nested": 1}}"#,
        )
        .unwrap();
        let config = load_file(&path).unwrap();
        assert!(config.other.contains_key("futureOption"));
        // And the unknown key round-trips.
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("futureOption"));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let err = load_file(Path::new("/nonexistent/release.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_resolve_layers_file_over_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.json");
        std::fs::write(
            &path,
            r#"{"preset": "simple", "initialVersion": "3.0.0"}"#,
        )
        .unwrap();
        let command_line = Configuration {
            configuration_file: Some(path.to_string_lossy().into_owned()),
            ..Configuration::default()
        };
        let effective = resolve(command_line).unwrap();
        // File overrides the preset scalar...
        assert_eq!(effective.initial_version(), "3.0.0");
        // ...while the preset's release types survive.
        assert!(effective.release_types().items.contains_key("mainline"));
    }

    #[test]
    fn test_resolve_command_line_wins() {
        let command_line = Configuration {
            preset: Some("simple".to_string()),
            bump: Some("minor".to_string()),
            dry_run: Some(true),
            ..Configuration::default()
        };
        let effective = resolve(command_line).unwrap();
        assert_eq!(effective.bump.as_deref(), Some("minor"));
        assert!(effective.is_dry_run());
        assert!(effective.release_types().items.contains_key("mainline"));
    }

    #[test]
    fn test_resolve_unknown_preset_fails() {
        let command_line = Configuration {
            preset: Some("nope".to_string()),
            ..Configuration::default()
        };
        assert!(resolve(command_line).is_err());
    }
}
