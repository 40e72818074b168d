//! GitHub REST client for the hosting service operations

use crate::error::{ReleaseError, Result};
use crate::services::{
    retry_read, Feature, HostingService, Provider, Release, ReleaseAsset, ServiceOptions, User,
};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;

const DEFAULT_BASE_URI: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = concat!("git-release/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    name: Option<String>,
    tag_name: String,
    html_url: Option<String>,
    upload_url: Option<String>,
}

/// GitHub API client
pub struct GitHubService {
    client: Client,
    base_uri: String,
    has_token: bool,
}

impl GitHubService {
    /// Build the client with default headers per the GitHub REST guidelines
    pub fn new(options: ServiceOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let has_token = options.token.is_some();
        if let Some(token) = &options.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ReleaseError::security("Malformed authentication token"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout())
            .build()
            .map_err(|e| ReleaseError::service(format!("Cannot create HTTP client: {}", e)))?;
        Ok(GitHubService {
            client,
            base_uri: options
                .base_uri
                .unwrap_or_else(|| DEFAULT_BASE_URI.to_string()),
            has_token,
        })
    }

    fn require_token(&self) -> Result<()> {
        if self.has_token {
            Ok(())
        } else {
            Err(ReleaseError::security(
                "GitHub requires an AUTHENTICATION_TOKEN for this operation",
            ))
        }
    }

    fn check(&self, response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReleaseError::security(format!(
                "GitHub rejected the credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReleaseError::service(format!(
                "GitHub API error ({}): {}",
                status, body
            )));
        }
        Ok(response)
    }
}

impl HostingService for GitHubService {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    fn authenticated_user(&self) -> Result<User> {
        if !self.supports(Feature::Users) {
            return Err(ReleaseError::UnsupportedOperation(
                "GitHub does not support user operations".to_string(),
            ));
        }
        self.require_token()?;
        let url = format!("{}/user", self.base_uri);
        let user: GitHubUser = retry_read(|| {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| ReleaseError::service(format!("GitHub request failed: {}", e)))?;
            self.check(response)?
                .json()
                .map_err(|e| ReleaseError::service(format!("Invalid GitHub response: {}", e)))
        })?;
        Ok(User {
            id: user.id.to_string(),
            user_name: user.login,
            full_name: user.name,
        })
    }

    fn create_release(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
        tag: &str,
        body: &str,
    ) -> Result<Release> {
        if !self.supports(Feature::Releases) {
            return Err(ReleaseError::UnsupportedOperation(
                "GitHub does not support releases".to_string(),
            ));
        }
        self.require_token()?;
        let url = format!("{}/repos/{}/{}/releases", self.base_uri, owner, repository);
        tracing::debug!(%owner, %repository, %tag, "Creating GitHub release");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "tag_name": tag,
                "name": title,
                "body": body,
            }))
            .send()
            .map_err(|e| ReleaseError::service(format!("GitHub request failed: {}", e)))?;
        let release: GitHubRelease = self
            .check(response)?
            .json()
            .map_err(|e| ReleaseError::service(format!("Invalid GitHub response: {}", e)))?;
        Ok(Release {
            title: release.name.unwrap_or_else(|| title.to_string()),
            tag: release.tag_name,
            url: release.html_url,
        })
    }

    fn release_by_tag(
        &self,
        owner: &str,
        repository: &str,
        tag: &str,
    ) -> Result<Option<Release>> {
        if !self.supports(Feature::Releases) {
            return Err(ReleaseError::UnsupportedOperation(
                "GitHub does not support releases".to_string(),
            ));
        }
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.base_uri, owner, repository, tag
        );
        retry_read(|| {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| ReleaseError::service(format!("GitHub request failed: {}", e)))?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let release: GitHubRelease = self
                .check(response)?
                .json()
                .map_err(|e| ReleaseError::service(format!("Invalid GitHub response: {}", e)))?;
            Ok(Some(Release {
                title: release.name.unwrap_or_default(),
                tag: release.tag_name,
                url: release.html_url,
            }))
        })
    }

    fn publish_release_assets(
        &self,
        owner: &str,
        repository: &str,
        tag: &str,
        assets: &[ReleaseAsset],
    ) -> Result<()> {
        if assets.is_empty() {
            return Ok(());
        }
        self.require_token()?;
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.base_uri, owner, repository, tag
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ReleaseError::service(format!("GitHub request failed: {}", e)))?;
        let release: GitHubRelease = self
            .check(response)?
            .json()
            .map_err(|e| ReleaseError::service(format!("Invalid GitHub response: {}", e)))?;
        // The upload URL is a template like ".../assets{?name,label}".
        let upload_base = release
            .upload_url
            .ok_or_else(|| ReleaseError::service("GitHub release has no upload URL"))?;
        let upload_base = upload_base
            .split('{')
            .next()
            .unwrap_or(upload_base.as_str())
            .to_string();
        for asset in assets {
            let content = std::fs::read(&asset.path)?;
            let response = self
                .client
                .post(format!("{}?name={}", upload_base, asset.name))
                .header("Content-Type", "application/octet-stream")
                .body(content)
                .send()
                .map_err(|e| ReleaseError::service(format!("GitHub upload failed: {}", e)))?;
            self.check(response)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_without_token_rejects_writes() {
        let service = GitHubService::new(ServiceOptions::default()).unwrap();
        let err = service
            .create_release("acme", "widget", "1.0.0", "v1.0.0", "notes")
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Security(_)));
    }

    #[test]
    fn test_service_without_token_rejects_user_lookup() {
        let service = GitHubService::new(ServiceOptions::default()).unwrap();
        assert!(service.authenticated_user().is_err());
    }

    #[test]
    fn test_base_uri_default_and_override() {
        let service = GitHubService::new(ServiceOptions::default()).unwrap();
        assert_eq!(service.base_uri, DEFAULT_BASE_URI);
        let service = GitHubService::new(ServiceOptions {
            base_uri: Some("https://ghe.example.com/api/v3".to_string()),
            ..ServiceOptions::default()
        })
        .unwrap();
        assert_eq!(service.base_uri, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_provider_and_features() {
        let service = GitHubService::new(ServiceOptions::default()).unwrap();
        assert_eq!(service.provider(), Provider::GitHub);
        assert!(service.supports(Feature::Releases));
        assert!(service.supports(Feature::Users));
    }
}
