//! Next version inference
//!
//! Combines the release scope, the convention matcher and the active release
//! type into the next version: aggregate bump, collapsed qualifier and
//! ordinal, extra identifiers, and the version range constraint.

use crate::config::{Configuration, ReleaseType};
use crate::conventions::ConventionMatcher;
use crate::domain::{BumpComponent, Version};
use crate::error::{ReleaseError, Result};
use crate::release::scope::ReleaseScope;
use crate::template;
use regex::Regex;
use serde_json::Value;

/// Outcome of version inference
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    /// The effective next version (the override when one is configured)
    pub version: Version,
    /// The explicit configuration override, when present
    pub overridden_version: Option<Version>,
    /// Aggregate bump component, when any commit was significant
    pub bump: Option<BumpComponent>,
    /// The effective version range expression, when one applied
    pub version_range: Option<String>,
    /// Whether the next version differs from the previous one
    pub new_version: bool,
    /// Whether a release should be published (gated by the type's publish
    /// flag)
    pub new_release: bool,
}

/// Infer the next version for the active release type
pub fn infer(
    config: &Configuration,
    release_type: &ReleaseType,
    scope: &ReleaseScope,
    matcher: &ConventionMatcher,
    branch: &str,
    context: &Value,
) -> Result<Inference> {
    let previous = scope
        .previous_version
        .clone()
        .ok_or_else(|| ReleaseError::state("Release scope has no previous version"))?;
    let prime = scope
        .prime_version
        .clone()
        .ok_or_else(|| ReleaseError::state("Release scope has no prime version"))?;

    let bump = aggregate_bump(config, scope, matcher)?;

    // With no previous tag in history the initial version itself is the
    // first release; nothing to bump off.
    let first_release = scope.previous_version_commit.is_none();
    let mut candidate = if first_release {
        previous.clone()
    } else {
        match &bump {
            None => previous.clone(),
            Some(component) => {
                let base = if release_type.collapse_versions {
                    &prime
                } else {
                    &previous
                };
                base.bump(component)
            }
        }
    };

    if release_type.collapse_versions && (bump.is_some() || first_release) {
        candidate = collapse(release_type, &candidate, &previous, context)?;
    }

    for identifier in &release_type.identifiers {
        let qualifier = template::render(&identifier.qualifier, context)?;
        if qualifier.is_empty() {
            continue;
        }
        let value = match &identifier.value {
            Some(value_template) => {
                let rendered = template::render(value_template, context)?;
                (!rendered.is_empty()).then_some(rendered)
            }
            None => None,
        };
        candidate = candidate.with_identifier(identifier.position, &qualifier, value.as_deref())?;
    }

    let overridden_version = match &config.version {
        Some(raw) => Some(Version::parse_lenient(raw, config.release_prefix.as_deref())?),
        None => None,
    };
    let effective = overridden_version.clone().unwrap_or(candidate);

    let version_range = effective_range(release_type, branch, context)?;
    if let Some(range) = &version_range {
        let regex = Regex::new(range).map_err(|e| {
            ReleaseError::config(format!("Invalid version range expression '{}': {}", range, e))
        })?;
        if !effective.in_range(&regex) {
            return Err(ReleaseError::version_range(format!(
                "Version '{}' does not match the required range '{}'",
                effective, range
            )));
        }
    }

    let new_version = effective != previous || first_release;
    let new_release = new_version
        && match &release_type.publish {
            Some(publish) => template::render_boolean(publish, context)?,
            None => false,
        };

    Ok(Inference {
        version: effective,
        overridden_version,
        bump,
        version_range,
        new_version,
        new_release,
    })
}

/// Highest bump over the significant commits, or the configured override
fn aggregate_bump(
    config: &Configuration,
    scope: &ReleaseScope,
    matcher: &ConventionMatcher,
) -> Result<Option<BumpComponent>> {
    if let Some(raw) = &config.bump {
        return Ok(Some(raw.parse::<BumpComponent>()?));
    }
    let mut aggregate: Option<BumpComponent> = None;
    for commit in &scope.significant_commits {
        if let Some(component) = matcher.significance(&commit.message) {
            aggregate = Some(match aggregate {
                Some(current) => current.max(component),
                None => component,
            });
        }
    }
    Ok(aggregate)
}

/// Apply the collapsed qualifier and advance the track ordinal
fn collapse(
    release_type: &ReleaseType,
    candidate: &Version,
    previous: &Version,
    context: &Value,
) -> Result<Version> {
    let qualifier_template = release_type.collapsed_version_qualifier.as_deref().ok_or_else(|| {
        ReleaseError::config(
            "collapseVersions is enabled but collapsedVersionQualifier is not set",
        )
    })?;
    let qualifier = template::render(qualifier_template, context)?;
    if qualifier.is_empty() {
        return Err(ReleaseError::config(
            "collapsedVersionQualifier resolved to an empty string",
        ));
    }

    let qualified = candidate.with_prerelease_qualifier(&qualifier)?;
    let same_track = previous.core() == qualified.core()
        && previous.prerelease_qualifier().as_deref() == Some(qualifier.as_str());
    let ordinal = if same_track {
        previous.prerelease_ordinal().unwrap_or(0) + 1
    } else {
        1
    };
    let mut next = qualified.with_prerelease_ordinal(ordinal);

    // A shrinking window of significant commits must never move the track
    // backwards.
    if next < *previous && previous.has_prerelease() {
        next = previous.with_prerelease_ordinal(previous.prerelease_ordinal().unwrap_or(0) + 1);
    }
    Ok(next)
}

/// The effective range expression for the candidate, if any
fn effective_range(
    release_type: &ReleaseType,
    branch: &str,
    context: &Value,
) -> Result<Option<String>> {
    if release_type.version_range_from_branch_name {
        return Ok(Some(range_from_branch(branch)?));
    }
    match &release_type.version_range {
        Some(range_template) => {
            let rendered = template::render(range_template, context)?;
            Ok((!rendered.is_empty()).then_some(rendered))
        }
        None => Ok(None),
    }
}

/// Derive a version range regex from a branch name
///
/// `rel/1.4.x` constrains to `^1\.4\.`, `v1.x` to `^1\.`, `1.2.3` to the
/// exact core. Anything up to the first digit is treated as a prefix and
/// ignored; an `x` component matches any remainder.
fn range_from_branch(branch: &str) -> Result<String> {
    let start = branch
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| {
            ReleaseError::config(format!(
                "Cannot derive a version range from branch '{}'",
                branch
            ))
        })?;
    let mut pattern = String::from("^");
    let mut components = 0;
    for component in branch[start..].split('.') {
        if component.eq_ignore_ascii_case("x") {
            return Ok(pattern);
        }
        if !component.bytes().all(|b| b.is_ascii_digit()) || component.is_empty() {
            return Err(ReleaseError::config(format!(
                "Cannot derive a version range from branch '{}'",
                branch
            )));
        }
        pattern.push_str(&regex::escape(component));
        pattern.push_str(r"\.");
        components += 1;
    }
    if components == 3 {
        // Full triple: drop the trailing separator and anchor the core.
        pattern.truncate(pattern.len() - 2);
    }
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::presets;
    use crate::conventions;
    use crate::domain::Commit;
    use crate::domain::Identity;
    use serde_json::json;

    fn config() -> Configuration {
        Configuration::defaults().overlay(presets::extended())
    }

    fn matcher() -> ConventionMatcher {
        ConventionMatcher::new(&conventions::default_conventions()).unwrap()
    }

    fn release_type(name: &str) -> ReleaseType {
        config().release_types().items.get(name).unwrap().clone()
    }

    fn commit(message: &str) -> Commit {
        Commit {
            sha: "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2".to_string(),
            message: message.to_string(),
            author: Identity::new("Jane Doe", "jane@example.com"),
            committer: Identity::new("Jane Doe", "jane@example.com"),
            timestamp: 1_700_000_000,
            parents: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn scope(previous: &str, prime: &str, messages: &[&str]) -> ReleaseScope {
        ReleaseScope {
            previous_version: Some(Version::parse(previous).unwrap()),
            previous_version_commit: Some("b".repeat(40)),
            prime_version: Some(Version::parse(prime).unwrap()),
            prime_version_commit: Some("b".repeat(40)),
            initial_commit: Some("c".repeat(40)),
            final_commit: Some("a".repeat(40)),
            significant_commits: messages.iter().map(|m| commit(m)).collect(),
        }
    }

    fn context(branch: &str) -> Value {
        json!({"branch": branch})
    }

    #[test]
    fn test_infer_first_release_uses_initial_version() {
        let mut first = scope("1.0.0", "1.0.0", &["feat: initial"]);
        first.previous_version_commit = None;
        first.prime_version_commit = None;
        let inference = infer(
            &config(),
            &release_type("mainline"),
            &first,
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.0.0");
        assert!(inference.new_version);
        assert!(inference.new_release);
    }

    #[test]
    fn test_infer_first_release_collapsed() {
        let mut first = scope("0.1.0", "0.1.0", &["feat: initial"]);
        first.previous_version_commit = None;
        first.prime_version_commit = None;
        let inference = infer(
            &config(),
            &release_type("maturity"),
            &first,
            &matcher(),
            "alpha",
            &context("alpha"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "0.1.0-alpha.1");
        assert!(inference.new_version);
    }

    #[test]
    fn test_infer_patch_bump() {
        let inference = infer(
            &config(),
            &release_type("mainline"),
            &scope("1.2.3", "1.2.3", &["fix: npe"]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.2.4");
        assert_eq!(inference.bump, Some(BumpComponent::Patch));
        assert!(inference.new_version);
        assert!(inference.new_release);
    }

    #[test]
    fn test_infer_no_significant_commits() {
        let inference = infer(
            &config(),
            &release_type("mainline"),
            &scope("1.2.3", "1.2.3", &[]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.2.3");
        assert_eq!(inference.bump, None);
        assert!(!inference.new_version);
        assert!(!inference.new_release);
    }

    #[test]
    fn test_infer_major_wins_over_minor() {
        let inference = infer(
            &config(),
            &release_type("mainline"),
            &scope("1.2.3", "1.2.3", &["feat: x", "fix(core)!: breaking"]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "2.0.0");
        assert_eq!(inference.bump, Some(BumpComponent::Major));
    }

    #[test]
    fn test_infer_collapsed_first_ordinal() {
        let inference = infer(
            &config(),
            &release_type("maturity"),
            &scope("1.2.0", "1.2.0", &["feat: x"]),
            &matcher(),
            "alpha",
            &context("alpha"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.3.0-alpha.1");
        assert!(inference.new_version);
    }

    #[test]
    fn test_infer_collapsed_increments_ordinal() {
        let inference = infer(
            &config(),
            &release_type("maturity"),
            &scope("1.3.0-alpha.1", "1.2.0", &["feat: y"]),
            &matcher(),
            "alpha",
            &context("alpha"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.3.0-alpha.2");
    }

    #[test]
    fn test_infer_collapsed_never_regresses() {
        // Only a fix landed since the last alpha, but the track must not go
        // back below the published 1.3.0-alpha.1.
        let inference = infer(
            &config(),
            &release_type("maturity"),
            &scope("1.3.0-alpha.1", "1.2.0", &["fix: z"]),
            &matcher(),
            "alpha",
            &context("alpha"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.3.0-alpha.2");
    }

    #[test]
    fn test_infer_bump_override() {
        let mut config = config();
        config.bump = Some("major".to_string());
        let inference = infer(
            &config,
            &release_type("mainline"),
            &scope("1.2.3", "1.2.3", &[]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "2.0.0");
    }

    #[test]
    fn test_infer_version_override_wins() {
        let mut config = config();
        config.version = Some("9.9.9".to_string());
        let inference = infer(
            &config,
            &release_type("mainline"),
            &scope("1.2.3", "1.2.3", &["fix: npe"]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "9.9.9");
        assert_eq!(
            inference.overridden_version.as_ref().map(|v| v.to_string()),
            Some("9.9.9".to_string())
        );
        assert!(inference.new_version);
    }

    #[test]
    fn test_infer_range_from_branch_accepts() {
        let inference = infer(
            &config(),
            &release_type("release"),
            &scope("1.4.0", "1.4.0", &["fix: y"]),
            &matcher(),
            "rel/1.4.x",
            &context("rel/1.4.x"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.4.1-rel.1");
        assert_eq!(inference.version_range.as_deref(), Some(r"^1\.4\."));
    }

    #[test]
    fn test_infer_range_from_branch_rejects() {
        let result = infer(
            &config(),
            &release_type("release"),
            &scope("1.4.0", "1.4.0", &["feat: api"]),
            &matcher(),
            "rel/1.4.x",
            &context("rel/1.4.x"),
        );
        // A feature bump would produce 1.5.0-rel.1, outside the branch range.
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_infer_explicit_version_range() {
        let mut rt = release_type("mainline");
        rt.version_range = Some(r"^2\.".to_string());
        let result = infer(
            &config(),
            &rt,
            &scope("1.2.3", "1.2.3", &["fix: npe"]),
            &matcher(),
            "main",
            &context("main"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_infer_identifiers_applied() {
        let mut rt = release_type("mainline");
        rt.identifiers = vec![crate::config::VersionIdentifier {
            position: crate::domain::IdentifierPosition::Build,
            qualifier: "branch".to_string(),
            value: Some("{{#sanitizeLower}}{{branch}}{{/sanitizeLower}}".to_string()),
        }];
        let inference = infer(
            &config(),
            &rt,
            &scope("1.2.3", "1.2.3", &["fix: npe"]),
            &matcher(),
            "main",
            &context("main"),
        )
        .unwrap();
        assert_eq!(inference.version.to_string(), "1.2.4+branch.main");
    }

    #[test]
    fn test_range_from_branch_derivation() {
        assert_eq!(range_from_branch("rel/1.4.x").unwrap(), r"^1\.4\.");
        assert_eq!(range_from_branch("v1.x").unwrap(), r"^1\.");
        assert_eq!(range_from_branch("1.2.3").unwrap(), r"^1\.2\.3");
        assert_eq!(range_from_branch("release-2.x").unwrap(), r"^2\.");
        assert!(range_from_branch("feature/foo").is_err());
    }
}
