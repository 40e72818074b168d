//! Commit message convention matching
//!
//! A convention is a regex with named groups (`type`, `scope`, `title`,
//! optionally `breaking`) plus a map of bump components to regexes. The
//! matcher walks the enabled conventions in declaration order; a commit is
//! significant when some enabled convention matches it and at least one bump
//! expression fires. The significance of a commit is its highest bump
//! component (major > minor > patch).

use crate::domain::BumpComponent;
use crate::error::{ReleaseError, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single commit message convention, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitConvention {
    /// Regex with named groups `type`, `scope`, `title` and optionally
    /// `breaking`
    pub expression: String,
    /// Bump component name to regex, in priority order
    #[serde(default)]
    pub bump_expressions: IndexMap<String, String>,
}

/// The configured convention set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMessageConventions {
    /// Names of enabled conventions, in matching order
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub items: IndexMap<String, CommitConvention>,
}

/// Structured fields captured from a matching commit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Name of the convention that matched
    pub convention: String,
    pub commit_type: Option<String>,
    pub scope: Option<String>,
    pub title: Option<String>,
}

struct CompiledConvention {
    name: String,
    expression: Regex,
    bumps: Vec<(BumpComponent, Regex)>,
}

/// Compiled matcher over the enabled conventions
pub struct ConventionMatcher {
    conventions: Vec<CompiledConvention>,
}

impl ConventionMatcher {
    /// Compile the enabled conventions, in declaration order
    ///
    /// An enabled name with no corresponding item or an invalid regex is a
    /// configuration error.
    pub fn new(config: &CommitMessageConventions) -> Result<Self> {
        let mut conventions = Vec::with_capacity(config.enabled.len());
        for name in &config.enabled {
            let convention = config.items.get(name).ok_or_else(|| {
                ReleaseError::config(format!(
                    "Enabled commit message convention '{}' is not defined",
                    name
                ))
            })?;
            let expression = Regex::new(&convention.expression).map_err(|e| {
                ReleaseError::config(format!(
                    "Invalid expression for convention '{}': {}",
                    name, e
                ))
            })?;
            let mut bumps = Vec::with_capacity(convention.bump_expressions.len());
            for (component, pattern) in &convention.bump_expressions {
                let component = component.parse::<BumpComponent>()?;
                let regex = Regex::new(pattern).map_err(|e| {
                    ReleaseError::config(format!(
                        "Invalid bump expression '{}' for convention '{}': {}",
                        component, name, e
                    ))
                })?;
                bumps.push((component, regex));
            }
            conventions.push(CompiledConvention {
                name: name.clone(),
                expression,
                bumps,
            });
        }
        Ok(ConventionMatcher { conventions })
    }

    /// Parse structured fields from the first convention whose expression
    /// matches, regardless of significance
    ///
    /// Used by the changelog builder, which also lists commits that do not
    /// contribute a bump on their own.
    pub fn parse(&self, message: &str) -> Option<ParsedMessage> {
        for convention in &self.conventions {
            if let Some(captures) = convention.expression.captures(message) {
                let group = |name: &str| {
                    captures
                        .name(name)
                        .map(|m| m.as_str().to_string())
                        .filter(|s| !s.is_empty())
                };
                return Some(ParsedMessage {
                    convention: convention.name.clone(),
                    commit_type: group("type"),
                    scope: group("scope"),
                    title: group("title"),
                });
            }
        }
        None
    }

    /// The bump component a message contributes, if any
    ///
    /// The first convention whose expression matches and whose bump
    /// expressions produce at least one component wins; the result is the
    /// highest produced component.
    pub fn significance(&self, message: &str) -> Option<BumpComponent> {
        for convention in &self.conventions {
            if !convention.expression.is_match(message) {
                continue;
            }
            let mut result: Option<BumpComponent> = None;
            for (component, regex) in &convention.bumps {
                if regex.is_match(message) {
                    result = Some(match result {
                        Some(current) => current.max(component.clone()),
                        None => component.clone(),
                    });
                }
            }
            if result.is_some() {
                return result;
            }
        }
        None
    }
}

/// The compiled-in conventional-commits convention
///
/// Breaking changes are flagged either by `!` after the type/scope or by a
/// `BREAKING CHANGE:`/`BREAKING-CHANGE:` footer.
pub fn conventional_commits() -> CommitConvention {
    let mut bump_expressions = IndexMap::new();
    bump_expressions.insert(
        "major".to_string(),
        r"(?s)(^[a-zA-Z0-9_]+(\([^)]*\))?!:.*)|(.*BREAKING[ -]CHANGE:.*)".to_string(),
    );
    bump_expressions.insert(
        "minor".to_string(),
        r"(?s)^feat(\([^)]*\))?!?:.*".to_string(),
    );
    bump_expressions.insert(
        "patch".to_string(),
        r"(?s)^(fix|perf)(\([^)]*\))?!?:.*".to_string(),
    );
    CommitConvention {
        expression:
            r"^(?P<type>[a-zA-Z0-9_]+)(\((?P<scope>[^)]*)\))?(?P<breaking>!)?:\s*(?P<title>[^\n]+)"
                .to_string(),
        bump_expressions,
    }
}

/// Convention set with only conventional commits enabled
pub fn default_conventions() -> CommitMessageConventions {
    let mut items = IndexMap::new();
    items.insert("conventionalCommits".to_string(), conventional_commits());
    CommitMessageConventions {
        enabled: vec!["conventionalCommits".to_string()],
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ConventionMatcher {
        ConventionMatcher::new(&default_conventions()).unwrap()
    }

    #[test]
    fn test_parse_type_and_title() {
        let parsed = matcher().parse("feat: add search").unwrap();
        assert_eq!(parsed.convention, "conventionalCommits");
        assert_eq!(parsed.commit_type.as_deref(), Some("feat"));
        assert_eq!(parsed.scope, None);
        assert_eq!(parsed.title.as_deref(), Some("add search"));
    }

    #[test]
    fn test_parse_with_scope() {
        let parsed = matcher().parse("fix(api): handle null values").unwrap();
        assert_eq!(parsed.commit_type.as_deref(), Some("fix"));
        assert_eq!(parsed.scope.as_deref(), Some("api"));
        assert_eq!(parsed.title.as_deref(), Some("handle null values"));
    }

    #[test]
    fn test_parse_non_conventional() {
        assert!(matcher().parse("updated stuff").is_none());
    }

    #[test]
    fn test_significance_feat_is_minor() {
        assert_eq!(
            matcher().significance("feat: new feature"),
            Some(BumpComponent::Minor)
        );
    }

    #[test]
    fn test_significance_fix_is_patch() {
        assert_eq!(
            matcher().significance("fix: npe"),
            Some(BumpComponent::Patch)
        );
        assert_eq!(
            matcher().significance("perf(core): cache results"),
            Some(BumpComponent::Patch)
        );
    }

    #[test]
    fn test_significance_breaking_is_major() {
        assert_eq!(
            matcher().significance("feat(api)!: redesign endpoint"),
            Some(BumpComponent::Major)
        );
        assert_eq!(
            matcher().significance("fix!: drop legacy flag"),
            Some(BumpComponent::Major)
        );
        assert_eq!(
            matcher()
                .significance("fix: rename field\n\nBREAKING CHANGE: field changed from X to Y"),
            Some(BumpComponent::Major)
        );
        assert_eq!(
            matcher().significance("chore: cleanup\n\nBREAKING-CHANGE: removed option"),
            Some(BumpComponent::Major)
        );
    }

    #[test]
    fn test_significance_insignificant_types() {
        let m = matcher();
        assert_eq!(m.significance("docs: update readme"), None);
        assert_eq!(m.significance("chore: bump deps"), None);
        assert_eq!(m.significance("style: format"), None);
        assert_eq!(m.significance("not a conventional commit"), None);
    }

    #[test]
    fn test_significance_picks_highest() {
        // feat! matches the major, minor (and not patch) expressions; the
        // highest wins.
        assert_eq!(
            matcher().significance("feat!: breaking feature"),
            Some(BumpComponent::Major)
        );
    }

    #[test]
    fn test_enabled_order_wins() {
        let mut items = IndexMap::new();
        let mut patch_only = IndexMap::new();
        patch_only.insert("patch".to_string(), r"(?s).*".to_string());
        items.insert(
            "anything".to_string(),
            CommitConvention {
                expression: r"(?P<type>.*)".to_string(),
                bump_expressions: patch_only,
            },
        );
        items.insert("conventionalCommits".to_string(), conventional_commits());
        let config = CommitMessageConventions {
            enabled: vec!["anything".to_string(), "conventionalCommits".to_string()],
            items,
        };
        let m = ConventionMatcher::new(&config).unwrap();
        // The catch-all convention is listed first and wins even for a feat
        // commit.
        assert_eq!(
            m.significance("feat: new feature"),
            Some(BumpComponent::Patch)
        );
    }

    #[test]
    fn test_unknown_enabled_convention_fails() {
        let config = CommitMessageConventions {
            enabled: vec!["missing".to_string()],
            items: IndexMap::new(),
        };
        assert!(ConventionMatcher::new(&config).is_err());
    }

    #[test]
    fn test_invalid_regex_fails() {
        let mut items = IndexMap::new();
        items.insert(
            "broken".to_string(),
            CommitConvention {
                expression: "(".to_string(),
                bump_expressions: IndexMap::new(),
            },
        );
        let config = CommitMessageConventions {
            enabled: vec!["broken".to_string()],
            items,
        };
        assert!(ConventionMatcher::new(&config).is_err());
    }

    #[test]
    fn test_conventions_serde_roundtrip() {
        let config = default_conventions();
        let json = serde_json::to_string(&config).unwrap();
        let back: CommitMessageConventions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
