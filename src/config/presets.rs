//! Compiled-in configuration presets
//!
//! Presets are whole configuration layers selected by name. `simple` covers
//! a single mainline with an internal fallback; `extended` models the full
//! git-flow branch families with collapsed pre-release tracks.

use crate::config::{
    Configuration, ReleaseType, ReleaseTypes, ServiceConfiguration, VersionIdentifier,
    WorkspaceStatus,
};
use crate::conventions;
use crate::domain::IdentifierPosition;
use crate::error::{ReleaseError, Result};
use crate::services::Provider;
use indexmap::IndexMap;

/// Look a preset up by name
pub fn by_name(name: &str) -> Result<Configuration> {
    match name {
        "simple" => Ok(simple()),
        "extended" => Ok(extended()),
        other => Err(ReleaseError::config(format!("Unknown preset: '{}'", other))),
    }
}

/// Tag filter matching plain `major.minor.patch` versions, with the
/// configured prefix tolerated
const CORE_FILTER: &str =
    r"^({{configuration.releasePrefix}})?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)$";

fn mainline() -> ReleaseType {
    ReleaseType {
        description: Some("Stable releases from the mainline".to_string()),
        match_branches: Some(r"^(master|main)$".to_string()),
        match_workspace_status: WorkspaceStatus::Clean,
        filter_tags: Some(CORE_FILTER.to_string()),
        git_tag: Some("true".to_string()),
        git_tag_message: Some("Release {{version}}".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("true".to_string()),
        ..ReleaseType::default()
    }
}

fn integration() -> ReleaseType {
    ReleaseType {
        description: Some("Unstable releases from integration branches".to_string()),
        match_branches: Some(r"^(develop|development|integration|latest)$".to_string()),
        collapse_versions: true,
        collapsed_version_qualifier: Some(
            "{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string(),
        ),
        filter_tags: Some(
            r"^({{configuration.releasePrefix}})?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-(develop|development|integration|latest)(\.(0|[1-9]\d*))?)?$"
                .to_string(),
        ),
        git_tag: Some("true".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("true".to_string()),
        ..ReleaseType::default()
    }
}

fn maturity() -> ReleaseType {
    ReleaseType {
        description: Some("Maturity releases (alpha, beta, ...)".to_string()),
        match_branches: Some(r"^(alpha|beta|gamma|delta|rc)$".to_string()),
        collapse_versions: true,
        collapsed_version_qualifier: Some(
            "{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string(),
        ),
        filter_tags: Some(
            r"^({{configuration.releasePrefix}})?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-(alpha|beta|gamma|delta|rc)(\.(0|[1-9]\d*))?)?$"
                .to_string(),
        ),
        git_tag: Some("true".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("true".to_string()),
        ..ReleaseType::default()
    }
}

fn feature() -> ReleaseType {
    ReleaseType {
        description: Some("Feature branch builds, never published".to_string()),
        match_branches: Some(r"^(feat|feature)((-|/)[0-9a-zA-Z-_]+)?$".to_string()),
        collapse_versions: true,
        collapsed_version_qualifier: Some(
            "{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string(),
        ),
        git_tag: Some("false".to_string()),
        git_push: Some("false".to_string()),
        publish: Some("false".to_string()),
        ..ReleaseType::default()
    }
}

fn hotfix() -> ReleaseType {
    ReleaseType {
        description: Some("Hotfix releases".to_string()),
        match_branches: Some(r"^hotfix((-|/)[0-9a-zA-Z-_]+)?$".to_string()),
        collapse_versions: true,
        collapsed_version_qualifier: Some(
            "{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string(),
        ),
        git_tag: Some("true".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("true".to_string()),
        ..ReleaseType::default()
    }
}

fn release() -> ReleaseType {
    ReleaseType {
        description: Some("Release branch candidates, constrained to the branch version".to_string()),
        match_branches: Some(
            r"^(rel|release)((-|/)({{configuration.releasePrefix}})?(0|[1-9x]\d*)(\.(0|[1-9x]\d*))?(\.(0|[1-9x]\d*))?)$"
                .to_string(),
        ),
        collapse_versions: true,
        collapsed_version_qualifier: Some("rel".to_string()),
        version_range_from_branch_name: true,
        git_tag: Some("true".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("false".to_string()),
        ..ReleaseType::default()
    }
}

fn maintenance() -> ReleaseType {
    ReleaseType {
        description: Some("Maintenance releases for past version lines".to_string()),
        match_branches: Some(r"^[a-zA-Z]*(0|[1-9x]\d*)(\.(0|[1-9x]\d*))?(\.(0|[1-9x]\d*))?$".to_string()),
        match_workspace_status: WorkspaceStatus::Clean,
        filter_tags: Some(CORE_FILTER.to_string()),
        version_range_from_branch_name: true,
        git_tag: Some("true".to_string()),
        git_push: Some("true".to_string()),
        publish: Some("true".to_string()),
        ..ReleaseType::default()
    }
}

fn internal() -> ReleaseType {
    ReleaseType {
        description: Some("Local fallback builds, never published".to_string()),
        collapse_versions: true,
        collapsed_version_qualifier: Some("internal".to_string()),
        identifiers: vec![
            VersionIdentifier {
                position: IdentifierPosition::Build,
                qualifier: "branch".to_string(),
                value: Some("{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string()),
            },
            VersionIdentifier {
                position: IdentifierPosition::Build,
                qualifier: "commit".to_string(),
                value: Some("{{#short7}}{{releaseScope.finalCommit}}{{/short7}}".to_string()),
            },
            VersionIdentifier {
                position: IdentifierPosition::Build,
                qualifier: "user".to_string(),
                value: Some("{{#sanitizeLower}}{{environment.user}}{{/sanitizeLower}}".to_string()),
            },
        ],
        git_tag: Some("false".to_string()),
        git_push: Some("false".to_string()),
        publish: Some("false".to_string()),
        ..ReleaseType::default()
    }
}

fn github_service() -> ServiceConfiguration {
    let mut options = IndexMap::new();
    options.insert(
        "AUTHENTICATION_TOKEN".to_string(),
        "{{#environment.variable}}GITHUB_TOKEN{{/environment.variable}}".to_string(),
    );
    options.insert(
        "REPOSITORY_NAME".to_string(),
        "{{#environment.variable}}GITHUB_REPOSITORY_NAME{{/environment.variable}}".to_string(),
    );
    options.insert(
        "REPOSITORY_OWNER".to_string(),
        "{{#environment.variable}}GITHUB_REPOSITORY_OWNER{{/environment.variable}}".to_string(),
    );
    ServiceConfiguration {
        provider: Provider::GitHub,
        options,
    }
}

fn gitlab_service() -> ServiceConfiguration {
    let mut options = IndexMap::new();
    options.insert(
        "AUTHENTICATION_TOKEN".to_string(),
        "{{#environment.variable}}GITLAB_TOKEN{{/environment.variable}}".to_string(),
    );
    options.insert(
        "REPOSITORY_NAME".to_string(),
        "{{#environment.variable}}GITLAB_REPOSITORY_NAME{{/environment.variable}}".to_string(),
    );
    options.insert(
        "REPOSITORY_OWNER".to_string(),
        "{{#environment.variable}}GITLAB_REPOSITORY_OWNER{{/environment.variable}}".to_string(),
    );
    ServiceConfiguration {
        provider: Provider::GitLab,
        options,
    }
}

/// Mainline plus an internal fallback
pub fn simple() -> Configuration {
    let mut items = IndexMap::new();
    items.insert("mainline".to_string(), mainline());
    items.insert("internal".to_string(), internal());
    Configuration {
        commit_message_conventions: Some(conventions::default_conventions()),
        release_types: Some(ReleaseTypes {
            enabled: vec!["mainline".to_string(), "internal".to_string()],
            publication_services: Vec::new(),
            remote_repositories: Vec::new(),
            items,
        }),
        ..Configuration::default()
    }
}

/// The full git-flow branch model plus GitHub/GitLab service stubs
pub fn extended() -> Configuration {
    let mut items = IndexMap::new();
    items.insert("mainline".to_string(), mainline());
    items.insert("integration".to_string(), integration());
    items.insert("maturity".to_string(), maturity());
    items.insert("feature".to_string(), feature());
    items.insert("hotfix".to_string(), hotfix());
    items.insert("release".to_string(), release());
    items.insert("maintenance".to_string(), maintenance());
    items.insert("internal".to_string(), internal());

    let mut services = IndexMap::new();
    services.insert("github".to_string(), github_service());
    services.insert("gitlab".to_string(), gitlab_service());

    Configuration {
        commit_message_conventions: Some(conventions::default_conventions()),
        release_types: Some(ReleaseTypes {
            enabled: vec![
                "mainline".to_string(),
                "integration".to_string(),
                "maturity".to_string(),
                "feature".to_string(),
                "hotfix".to_string(),
                "release".to_string(),
                "maintenance".to_string(),
                "internal".to_string(),
            ],
            publication_services: Vec::new(),
            remote_repositories: Vec::new(),
            items,
        }),
        services: Some(services),
        ..Configuration::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert!(by_name("simple").is_ok());
        assert!(by_name("extended").is_ok());
        assert!(by_name("unknown").is_err());
    }

    #[test]
    fn test_simple_preset_shape() {
        let config = simple();
        let types = config.release_types.unwrap();
        assert_eq!(types.enabled, vec!["mainline", "internal"]);
        assert!(types.items.get("mainline").unwrap().match_branches.is_some());
        // The internal fallback matches any branch.
        assert!(types.items.get("internal").unwrap().match_branches.is_none());
    }

    #[test]
    fn test_extended_preset_shape() {
        let config = extended();
        let types = config.release_types.as_ref().unwrap();
        assert_eq!(types.enabled.len(), 8);
        // Matching order: specific families first, internal last.
        assert_eq!(types.enabled.first().map(String::as_str), Some("mainline"));
        assert_eq!(types.enabled.last().map(String::as_str), Some("internal"));
        let services = config.services.as_ref().unwrap();
        assert_eq!(services.get("github").unwrap().provider, Provider::GitHub);
        assert_eq!(services.get("gitlab").unwrap().provider, Provider::GitLab);
    }

    #[test]
    fn test_extended_collapsing_types() {
        let config = extended();
        let types = config.release_types.unwrap();
        for name in ["integration", "maturity", "feature", "hotfix", "release", "internal"] {
            assert!(
                types.items.get(name).unwrap().collapse_versions,
                "{} should collapse versions",
                name
            );
        }
        assert!(!types.items.get("mainline").unwrap().collapse_versions);
    }

    #[test]
    fn test_release_type_constrains_range_from_branch() {
        let config = extended();
        let types = config.release_types.unwrap();
        assert!(types.items.get("release").unwrap().version_range_from_branch_name);
        assert!(types.items.get("maintenance").unwrap().version_range_from_branch_name);
    }
}
