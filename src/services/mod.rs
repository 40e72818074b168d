//! Hosting service abstraction
//!
//! Providers are capability-based: each declares the features it supports
//! and Publish only calls into features a provider declares. Service options
//! come from the configuration as a template-resolved string map; secrets
//! are read from the environment through templates and never logged.

pub mod github;
pub mod gitlab;

pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::config::ServiceConfiguration;
use crate::error::{ReleaseError, Result};
use crate::template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Features a hosting provider may support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    GitHosting,
    Releases,
    Users,
}

/// Known hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    #[serde(rename = "GITHUB")]
    GitHub,
    #[serde(rename = "GITLAB")]
    GitLab,
}

impl Provider {
    /// The features this provider supports
    pub fn features(&self) -> &'static [Feature] {
        match self {
            Provider::GitHub | Provider::GitLab => {
                &[Feature::GitHosting, Feature::Releases, Feature::Users]
            }
        }
    }
}

/// Service option name: the API authentication token
pub const AUTHENTICATION_TOKEN: &str = "AUTHENTICATION_TOKEN";
/// Service option name: the repository name
pub const REPOSITORY_NAME: &str = "REPOSITORY_NAME";
/// Service option name: the repository owner
pub const REPOSITORY_OWNER: &str = "REPOSITORY_OWNER";
/// Service option name: the API base URI
pub const BASE_URI: &str = "BASE_URI";
/// Service option name: per-service network timeout in milliseconds
pub const TIMEOUT: &str = "TIMEOUT";

/// The authenticated user as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub full_name: Option<String>,
}

/// A hosted release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub title: String,
    pub tag: String,
    pub url: Option<String>,
}

/// An asset attached to a hosted release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    /// Local file path (uploaded) or URL (linked), depending on the provider
    pub path: String,
}

/// Operations Publish needs from a hosting provider
///
/// Calling an operation of an unsupported feature fails with
/// [ReleaseError::UnsupportedOperation].
pub trait HostingService: Send + Sync {
    fn provider(&self) -> Provider;

    fn supports(&self, feature: Feature) -> bool {
        self.provider().features().contains(&feature)
    }

    fn authenticated_user(&self) -> Result<User>;

    fn create_release(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
        tag: &str,
        body: &str,
    ) -> Result<Release>;

    fn release_by_tag(&self, owner: &str, repository: &str, tag: &str)
        -> Result<Option<Release>>;

    fn publish_release_assets(
        &self,
        owner: &str,
        repository: &str,
        tag: &str,
        assets: &[ReleaseAsset],
    ) -> Result<()>;
}

/// Resolved service options
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub token: Option<String>,
    pub repository_name: Option<String>,
    pub repository_owner: Option<String>,
    pub base_uri: Option<String>,
    pub timeout: Option<Duration>,
}

impl ServiceOptions {
    /// Resolve the configured option templates against the live state
    pub fn resolve(config: &ServiceConfiguration, context: &Value) -> Result<Self> {
        let mut options = ServiceOptions::default();
        for (name, value_template) in &config.options {
            let value = template::render(value_template, context)?;
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                AUTHENTICATION_TOKEN => options.token = Some(value),
                REPOSITORY_NAME => options.repository_name = Some(value),
                REPOSITORY_OWNER => options.repository_owner = Some(value),
                BASE_URI => options.base_uri = Some(value),
                TIMEOUT => {
                    options.timeout = value.parse::<u64>().ok().map(Duration::from_millis);
                }
                other => {
                    tracing::warn!(option = %other, "Unknown service option ignored");
                }
            }
        }
        Ok(options)
    }

    /// The effective network timeout
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::from_secs(60))
    }
}

/// Instantiate the hosting service for a configured entry
pub fn instance(
    config: &ServiceConfiguration,
    context: &Value,
) -> Result<Box<dyn HostingService>> {
    let options = ServiceOptions::resolve(config, context)?;
    match config.provider {
        Provider::GitHub => Ok(Box::new(GitHubService::new(options)?)),
        Provider::GitLab => Ok(Box::new(GitLabService::new(options)?)),
    }
}

/// Retry an idempotent read with exponential backoff (3 attempts, 1 s → 4 s)
///
/// Writes are never routed through here.
pub(crate) fn retry_read<T>(mut call: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = Duration::from_secs(1);
    let mut last_error = None;
    for attempt in 0..3 {
        match call() {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(attempt = attempt + 1, error = %e, "Service read failed");
                last_error = Some(e);
                if attempt < 2 {
                    std::thread::sleep(delay);
                    delay *= 4;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ReleaseError::service("Service read failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn test_provider_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&Provider::GitHub).unwrap(),
            "\"GITHUB\""
        );
        let provider: Provider = serde_json::from_str("\"GITLAB\"").unwrap();
        assert_eq!(provider, Provider::GitLab);
    }

    #[test]
    fn test_provider_features() {
        assert!(Provider::GitHub.features().contains(&Feature::Releases));
        assert!(Provider::GitLab.features().contains(&Feature::Users));
    }

    #[test]
    fn test_options_resolution() {
        std::env::set_var("SERVICE_TEST_TOKEN", "s3cret");
        let mut raw = IndexMap::new();
        raw.insert(
            AUTHENTICATION_TOKEN.to_string(),
            "{{#environment.variable}}SERVICE_TEST_TOKEN{{/environment.variable}}".to_string(),
        );
        raw.insert(REPOSITORY_NAME.to_string(), "git-release".to_string());
        raw.insert(REPOSITORY_OWNER.to_string(), "{{owner}}".to_string());
        raw.insert(TIMEOUT.to_string(), "5000".to_string());
        let config = ServiceConfiguration {
            provider: Provider::GitHub,
            options: raw,
        };
        let options =
            ServiceOptions::resolve(&config, &json!({"owner": "acme"})).unwrap();
        assert_eq!(options.token.as_deref(), Some("s3cret"));
        assert_eq!(options.repository_name.as_deref(), Some("git-release"));
        assert_eq!(options.repository_owner.as_deref(), Some("acme"));
        assert_eq!(options.timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_options_empty_values_skipped() {
        let mut raw = IndexMap::new();
        raw.insert(
            AUTHENTICATION_TOKEN.to_string(),
            "{{#environment.variable}}SERVICE_TEST_UNSET{{/environment.variable}}".to_string(),
        );
        let config = ServiceConfiguration {
            provider: Provider::GitHub,
            options: raw,
        };
        let options = ServiceOptions::resolve(&config, &json!({})).unwrap();
        assert!(options.token.is_none());
        assert_eq!(options.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_instance_dispatch() {
        let config = ServiceConfiguration {
            provider: Provider::GitLab,
            options: IndexMap::new(),
        };
        let service = instance(&config, &json!({})).unwrap();
        assert_eq!(service.provider(), Provider::GitLab);
    }
}
