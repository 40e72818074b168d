//! Release scope resolution
//!
//! Walks the history from HEAD towards the root, looking for the previous
//! version (latest tag matching the active type's filter) and the prime
//! version (latest non-collapsed tag), and collects the commits in between
//! that are significant under the enabled conventions.

use crate::config::{Configuration, ReleaseType};
use crate::conventions::ConventionMatcher;
use crate::domain::{Commit, Version};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::template;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The set of commits and anchor versions considered for the current release
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseScope {
    /// Highest version whose tag matches the active type's filter,
    /// reachable from HEAD; the initial version when no tag matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<Version>,

    /// Commit the previous version tag points at; None for the initial
    /// version fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_commit: Option<String>,

    /// Highest non-collapsed version reachable from HEAD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime_version: Option<Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime_version_commit: Option<String>,

    /// Oldest commit after the previous version commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_commit: Option<String>,

    /// HEAD at the start of inference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_commit: Option<String>,

    /// Commits in the window that contribute a bump, in chronological order
    #[serde(default)]
    pub significant_commits: Vec<Commit>,
}

/// Resolve the release scope for the active release type
pub fn resolve_scope(
    repo: &dyn Repository,
    config: &Configuration,
    release_type: &ReleaseType,
    matcher: &ConventionMatcher,
    context: &Value,
) -> Result<ReleaseScope> {
    // Ensure HEAD is on a branch before walking anything.
    repo.get_current_branch()?;
    let final_commit = repo.get_latest_commit()?;

    let filter = match &release_type.filter_tags {
        Some(pattern) => {
            let rendered = template::render(pattern, context)?;
            if rendered.is_empty() {
                None
            } else {
                Some(Regex::new(&rendered).map_err(|e| {
                    ReleaseError::config(format!("Invalid filterTags expression: {}", e))
                })?)
            }
        }
        None => None,
    };
    let collapsed_qualifiers = collapsed_qualifiers(config, context)?;

    let mut previous: Option<(Version, String)> = None;
    let mut prime: Option<(Version, String)> = None;
    let mut window: Vec<Commit> = Vec::new();

    repo.walk_history(Some(&final_commit), None, &mut |commit| {
        let mut matching: Vec<Version> = Vec::new();
        let mut non_collapsed: Vec<Version> = Vec::new();
        for tag in &commit.tags {
            if filter.as_ref().is_some_and(|f| !f.is_match(&tag.name)) {
                continue;
            }
            let Some(version) = parse_tag(&tag.name, config) else {
                continue;
            };
            if !is_collapsed(&version, &collapsed_qualifiers) {
                non_collapsed.push(version.clone());
            }
            matching.push(version);
        }

        if previous.is_none() {
            match matching.into_iter().max() {
                Some(highest) => previous = Some((highest, commit.sha.clone())),
                None => window.push(commit.clone()),
            }
        }
        if prime.is_none() {
            if let Some(highest) = non_collapsed.into_iter().max() {
                prime = Some((highest, commit.sha.clone()));
            }
        }
        // Keep walking until both anchors are found or the root is reached.
        previous.is_none() || prime.is_none()
    })?;

    let initial_version = Version::parse_lenient(config.initial_version(), None)
        .map_err(|_| {
            ReleaseError::config(format!(
                "Invalid initialVersion: '{}'",
                config.initial_version()
            ))
        })?;

    let (previous_version, previous_version_commit) = match previous {
        Some((version, sha)) => (version, Some(sha)),
        None => (initial_version.clone(), None),
    };
    let (prime_version, prime_version_commit) = match prime {
        Some((version, sha)) => (version, Some(sha)),
        None => (initial_version, None),
    };

    // The walk visited the window newest first.
    window.reverse();
    let initial_commit = window.first().map(|c| c.sha.clone());
    let significant_commits: Vec<Commit> = window
        .into_iter()
        .filter(|c| matcher.significance(&c.message).is_some())
        .collect();

    Ok(ReleaseScope {
        previous_version: Some(previous_version),
        previous_version_commit,
        prime_version: Some(prime_version),
        prime_version_commit,
        initial_commit,
        final_commit: Some(final_commit),
        significant_commits,
    })
}

/// Resolved collapsed qualifiers of every collapsing enabled release type
fn collapsed_qualifiers(config: &Configuration, context: &Value) -> Result<Vec<String>> {
    let types = config.release_types();
    let mut qualifiers = Vec::new();
    for name in &types.enabled {
        let Some(release_type) = types.items.get(name) else {
            continue;
        };
        if !release_type.collapse_versions {
            continue;
        }
        if let Some(qualifier_template) = &release_type.collapsed_version_qualifier {
            let rendered = template::render(qualifier_template, context)?;
            if !rendered.is_empty() {
                qualifiers.push(rendered);
            }
        }
    }
    Ok(qualifiers)
}

fn is_collapsed(version: &Version, qualifiers: &[String]) -> bool {
    match version.prerelease_qualifier() {
        Some(qualifier) => qualifiers.iter().any(|q| *q == qualifier),
        None => false,
    }
}

/// Parse a tag name into a version under the configured leniency
fn parse_tag(name: &str, config: &Configuration) -> Option<Version> {
    let prefix = config.release_prefix.as_deref();
    if config.is_release_lenient() {
        Version::parse_lenient(name, prefix).ok()
    } else {
        let stripped = match prefix {
            Some(p) if !p.is_empty() => name.strip_prefix(p)?,
            _ => name,
        };
        Version::parse(stripped).ok()
    }
}
