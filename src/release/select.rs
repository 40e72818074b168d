//! Release type selection
//!
//! Walks the enabled release types in declaration order and picks the first
//! whose predicates all hold against the current branch, environment and
//! workspace status. Predicates are templates resolved against the live
//! state before matching.

use crate::config::{ReleaseType, ReleaseTypes, WorkspaceStatus, DEFAULT_RELEASE_TYPE_NAME};
use crate::error::{ReleaseError, Result};
use crate::template;
use regex::Regex;
use serde_json::Value;

/// Select the active release type
///
/// Returns the type name and a copy of its rule. Falls back to the built-in
/// `default` rule (all side effects disabled) when nothing matches.
pub fn select(
    types: &ReleaseTypes,
    branch: &str,
    workspace_clean: bool,
    context: &Value,
) -> Result<(String, ReleaseType)> {
    for name in &types.enabled {
        let release_type = types.items.get(name).ok_or_else(|| {
            ReleaseError::config(format!("Enabled release type '{}' is not defined", name))
        })?;
        if matches(name, release_type, branch, workspace_clean, context)? {
            tracing::debug!(release_type = %name, "Release type selected");
            return Ok((name.clone(), release_type.clone()));
        }
    }
    tracing::debug!("No release type matched, using the fallback");
    Ok((
        DEFAULT_RELEASE_TYPE_NAME.to_string(),
        ReleaseType::fallback(),
    ))
}

fn matches(
    name: &str,
    release_type: &ReleaseType,
    branch: &str,
    workspace_clean: bool,
    context: &Value,
) -> Result<bool> {
    if let Some(pattern) = &release_type.match_branches {
        let rendered = template::render(pattern, context)?;
        if !rendered.is_empty() {
            let regex = Regex::new(&rendered).map_err(|e| {
                ReleaseError::config(format!(
                    "Invalid matchBranches for release type '{}': {}",
                    name, e
                ))
            })?;
            if !regex.is_match(branch) {
                return Ok(false);
            }
        }
    }

    for (variable, pattern) in &release_type.match_environment_variables {
        let rendered = template::render(pattern, context)?;
        let regex = Regex::new(&rendered).map_err(|e| {
            ReleaseError::config(format!(
                "Invalid matchEnvironmentVariables entry '{}' for release type '{}': {}",
                variable, name, e
            ))
        })?;
        let value = match std::env::var(variable) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };
        if !regex.is_match(&value) {
            return Ok(false);
        }
    }

    let status_ok = match release_type.match_workspace_status {
        WorkspaceStatus::Any => true,
        WorkspaceStatus::Clean => workspace_clean,
        WorkspaceStatus::Dirty => !workspace_clean,
    };
    Ok(status_ok)
}
