//! Changelog model, builder and renderer
//!
//! Builds a structured changelog from the significant commits of the release
//! scope, grouped into the configured sections by conventional commit type,
//! then renders it to Markdown (or through a custom template) and writes it
//! idempotently.

use crate::config::ChangelogConfiguration;
use crate::conventions::ConventionMatcher;
use crate::domain::Commit;
use crate::error::{ReleaseError, Result};
use crate::template;
use chrono::{TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One rendered changelog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub sha: String,
    pub short_sha: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A titled group of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogSection {
    pub name: String,
    pub entries: Vec<ChangelogEntry>,
}

/// The structured changelog, stored in the state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changelog {
    pub version: String,
    /// Release date, `YYYY-MM-DD`
    pub date: String,
    pub sections: Vec<ChangelogSection>,
}

/// Group the significant commits into the configured sections
///
/// Sections are evaluated in declaration order; a commit lands in the first
/// section whose regex matches its conventional type. Commits matching no
/// section (or no convention at all) are dropped. With no configured
/// sections, a single catch-all `Changes` section is used.
pub fn build(
    config: &ChangelogConfiguration,
    commits: &[Commit],
    matcher: &ConventionMatcher,
    version: &str,
    timestamp_millis: i64,
) -> Result<Changelog> {
    let section_specs: Vec<(String, Regex)> = if config.sections.is_empty() {
        let catch_all = Regex::new(".*")
            .map_err(|e| ReleaseError::config(format!("Invalid section expression: {}", e)))?;
        vec![("Changes".to_string(), catch_all)]
    } else {
        config
            .sections
            .iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| (name.clone(), regex))
                    .map_err(|e| {
                        ReleaseError::config(format!(
                            "Invalid changelog section expression '{}': {}",
                            name, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut sections: Vec<ChangelogSection> = section_specs
        .iter()
        .map(|(name, _)| ChangelogSection {
            name: name.clone(),
            entries: Vec::new(),
        })
        .collect();

    for commit in commits {
        let Some(parsed) = matcher.parse(&commit.message) else {
            continue;
        };
        let commit_type = parsed.commit_type.unwrap_or_default();
        if let Some(index) = section_specs
            .iter()
            .position(|(_, regex)| regex.is_match(&commit_type))
        {
            sections[index].entries.push(ChangelogEntry {
                sha: commit.sha.clone(),
                short_sha: commit.short_sha().to_string(),
                title: parsed.title.unwrap_or_else(|| commit.summary().to_string()),
                scope: parsed.scope,
            });
        }
    }
    sections.retain(|s| !s.entries.is_empty());

    let date = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    Ok(Changelog {
        version: version.to_string(),
        date,
        sections,
    })
}

/// Render the changelog to text
///
/// With a configured template, the changelog tree is the rendering context;
/// otherwise the default Markdown layout applies. Substitutions run
/// line-by-line on the rendered output.
pub fn render(changelog: &Changelog, config: &ChangelogConfiguration) -> Result<String> {
    let rendered = match &config.template {
        Some(custom) => {
            let context: Value = serde_json::to_value(changelog)
                .map_err(|e| ReleaseError::state(format!("Cannot serialize changelog: {}", e)))?;
            template::render(custom, &context)?
        }
        None => {
            let mut out = String::new();
            out.push_str(&format!("## {} ({})\n", changelog.version, changelog.date));
            for section in &changelog.sections {
                out.push('\n');
                out.push_str(&format!("### {}\n\n", section.name));
                for entry in &section.entries {
                    out.push_str(&format!("- [{}] {}\n", entry.short_sha, entry.title));
                }
            }
            out
        }
    };
    apply_substitutions(&rendered, config)
}

fn apply_substitutions(text: &str, config: &ChangelogConfiguration) -> Result<String> {
    if config.substitutions.is_empty() {
        return Ok(text.to_string());
    }
    let compiled: Vec<(Regex, &String)> = config
        .substitutions
        .iter()
        .map(|(pattern, replacement)| {
            Regex::new(pattern).map(|regex| (regex, replacement)).map_err(|e| {
                ReleaseError::config(format!(
                    "Invalid changelog substitution '{}': {}",
                    pattern, e
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let mut current = line.to_string();
        for (regex, replacement) in &compiled {
            current = regex
                .replace_all(&current, replacement.as_str())
                .into_owned();
        }
        lines.push(current);
    }
    let mut result = lines.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

/// Write the rendered changelog, leaving an identical existing file alone
///
/// Returns whether the file was actually (re)written.
pub fn write_file(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == content {
            tracing::debug!(path = %path.display(), "Changelog unchanged, not rewritten");
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conventions;
    use crate::domain::Identity;
    use indexmap::IndexMap;

    fn matcher() -> ConventionMatcher {
        ConventionMatcher::new(&conventions::default_conventions()).unwrap()
    }

    fn commit(sha_byte: u8, message: &str) -> Commit {
        Commit {
            sha: format!("{:02x}", sha_byte).repeat(20),
            message: message.to_string(),
            author: Identity::new("Jane Doe", "jane@example.com"),
            committer: Identity::new("Jane Doe", "jane@example.com"),
            timestamp: 1_700_000_000,
            parents: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn sections_config() -> ChangelogConfiguration {
        let mut sections = IndexMap::new();
        sections.insert("Added".to_string(), "^feat$".to_string());
        sections.insert("Fixed".to_string(), "^fix$".to_string());
        ChangelogConfiguration {
            path: Some("CHANGELOG.md".to_string()),
            sections,
            substitutions: IndexMap::new(),
            template: None,
        }
    }

    // 2023-11-14 in UTC
    const TS: i64 = 1_700_000_000_000;

    #[test]
    fn test_build_groups_by_section() {
        let commits = vec![
            commit(0x11, "feat(api): add endpoint"),
            commit(0x22, "fix: npe"),
            commit(0x33, "feat: search"),
        ];
        let changelog = build(&sections_config(), &commits, &matcher(), "1.3.0", TS).unwrap();
        assert_eq!(changelog.version, "1.3.0");
        assert_eq!(changelog.date, "2023-11-14");
        assert_eq!(changelog.sections.len(), 2);
        assert_eq!(changelog.sections[0].name, "Added");
        assert_eq!(changelog.sections[0].entries.len(), 2);
        assert_eq!(changelog.sections[1].name, "Fixed");
        assert_eq!(changelog.sections[1].entries.len(), 1);
        assert_eq!(changelog.sections[1].entries[0].title, "npe");
    }

    #[test]
    fn test_build_drops_unmatched_types() {
        let commits = vec![commit(0x11, "docs: readme"), commit(0x22, "fix: npe")];
        let changelog = build(&sections_config(), &commits, &matcher(), "1.0.1", TS).unwrap();
        assert_eq!(changelog.sections.len(), 1);
        assert_eq!(changelog.sections[0].name, "Fixed");
    }

    #[test]
    fn test_build_default_catch_all_section() {
        let config = ChangelogConfiguration {
            path: Some("CHANGELOG.md".to_string()),
            ..ChangelogConfiguration::default()
        };
        let commits = vec![commit(0x11, "feat: x"), commit(0x22, "fix: y")];
        let changelog = build(&config, &commits, &matcher(), "1.0.0", TS).unwrap();
        assert_eq!(changelog.sections.len(), 1);
        assert_eq!(changelog.sections[0].name, "Changes");
        assert_eq!(changelog.sections[0].entries.len(), 2);
    }

    #[test]
    fn test_render_default_markdown() {
        let commits = vec![commit(0x11, "feat: search"), commit(0x22, "fix: npe")];
        let changelog = build(&sections_config(), &commits, &matcher(), "1.3.0", TS).unwrap();
        let text = render(&changelog, &sections_config()).unwrap();
        assert!(text.starts_with("## 1.3.0 (2023-11-14)\n"));
        assert!(text.contains("### Added\n"));
        assert!(text.contains("- [1111111] search\n"));
        assert!(text.contains("### Fixed\n"));
        assert!(text.contains("- [2222222] npe\n"));
    }

    #[test]
    fn test_render_substitutions() {
        let mut config = sections_config();
        config
            .substitutions
            .insert(r"#(\d+)".to_string(), "[#$1](https://example.com/issues/$1)".to_string());
        let commits = vec![commit(0x11, "fix: close #42")];
        let changelog = build(&config, &commits, &matcher(), "1.0.1", TS).unwrap();
        let text = render(&changelog, &config).unwrap();
        assert!(text.contains("[#42](https://example.com/issues/42)"));
    }

    #[test]
    fn test_render_custom_template() {
        let mut config = sections_config();
        config.template = Some("Release {{version}} on {{date}}".to_string());
        let changelog = build(&config, &[commit(0x11, "fix: npe")], &matcher(), "1.0.1", TS).unwrap();
        let text = render(&changelog, &config).unwrap();
        assert_eq!(text, "Release 1.0.1 on 2023-11-14");
    }

    #[test]
    fn test_write_file_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        assert!(write_file(&path, "content\n").unwrap());
        // Identical content is not rewritten.
        assert!(!write_file(&path, "content\n").unwrap());
        // Different content is.
        assert!(write_file(&path, "changed\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "changed\n");
    }

    #[test]
    fn test_changelog_serde_roundtrip() {
        let commits = vec![commit(0x11, "feat: search")];
        let changelog = build(&sections_config(), &commits, &matcher(), "1.3.0", TS).unwrap();
        let json = serde_json::to_string(&changelog).unwrap();
        let back: Changelog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changelog);
    }
}
