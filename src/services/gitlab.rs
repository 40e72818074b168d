//! GitLab REST client for the hosting service operations

use crate::error::{ReleaseError, Result};
use crate::services::{
    retry_read, Feature, HostingService, Provider, Release, ReleaseAsset, ServiceOptions, User,
};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;

const DEFAULT_BASE_URI: &str = "https://gitlab.com/api/v4";

const USER_AGENT_VALUE: &str = concat!("git-release/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabRelease {
    name: Option<String>,
    tag_name: String,
    _links: Option<GitLabReleaseLinks>,
}

#[derive(Debug, Deserialize)]
struct GitLabReleaseLinks {
    #[serde(rename = "self")]
    self_url: Option<String>,
}

/// GitLab API client
pub struct GitLabService {
    client: Client,
    base_uri: String,
    has_token: bool,
}

impl GitLabService {
    pub fn new(options: ServiceOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
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
        Ok(GitLabService {
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
                "GitLab requires an AUTHENTICATION_TOKEN for this operation",
            ))
        }
    }

    /// URL-encoded `owner/repository` project id
    fn project_id(owner: &str, repository: &str) -> String {
        format!("{}%2F{}", owner, repository)
    }

    fn check(&self, response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReleaseError::security(format!(
                "GitLab rejected the credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReleaseError::service(format!(
                "GitLab API error ({}): {}",
                status, body
            )));
        }
        Ok(response)
    }
}

impl HostingService for GitLabService {
    fn provider(&self) -> Provider {
        Provider::GitLab
    }

    fn authenticated_user(&self) -> Result<User> {
        if !self.supports(Feature::Users) {
            return Err(ReleaseError::UnsupportedOperation(
                "GitLab does not support user operations".to_string(),
            ));
        }
        self.require_token()?;
        let url = format!("{}/user", self.base_uri);
        let user: GitLabUser = retry_read(|| {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| ReleaseError::service(format!("GitLab request failed: {}", e)))?;
            self.check(response)?
                .json()
                .map_err(|e| ReleaseError::service(format!("Invalid GitLab response: {}", e)))
        })?;
        Ok(User {
            id: user.id.to_string(),
            user_name: user.username,
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
                "GitLab does not support releases".to_string(),
            ));
        }
        self.require_token()?;
        let url = format!(
            "{}/projects/{}/releases",
            self.base_uri,
            Self::project_id(owner, repository)
        );
        tracing::debug!(%owner, %repository, %tag, "Creating GitLab release");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "name": title,
                "tag_name": tag,
                "description": body,
            }))
            .send()
            .map_err(|e| ReleaseError::service(format!("GitLab request failed: {}", e)))?;
        let release: GitLabRelease = self
            .check(response)?
            .json()
            .map_err(|e| ReleaseError::service(format!("Invalid GitLab response: {}", e)))?;
        Ok(Release {
            title: release.name.unwrap_or_else(|| title.to_string()),
            tag: release.tag_name,
            url: release._links.and_then(|l| l.self_url),
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
                "GitLab does not support releases".to_string(),
            ));
        }
        let url = format!(
            "{}/projects/{}/releases/{}",
            self.base_uri,
            Self::project_id(owner, repository),
            tag
        );
        retry_read(|| {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| ReleaseError::service(format!("GitLab request failed: {}", e)))?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let release: GitLabRelease = self
                .check(response)?
                .json()
                .map_err(|e| ReleaseError::service(format!("Invalid GitLab response: {}", e)))?;
            Ok(Some(Release {
                title: release.name.unwrap_or_default(),
                tag: release.tag_name,
                url: release._links.and_then(|l| l.self_url),
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
        // GitLab attaches assets as release links.
        let url = format!(
            "{}/projects/{}/releases/{}/assets/links",
            self.base_uri,
            Self::project_id(owner, repository),
            tag
        );
        for asset in assets {
            let response = self
                .client
                .post(&url)
                .json(&serde_json::json!({
                    "name": asset.name,
                    "url": asset.path,
                }))
                .send()
                .map_err(|e| ReleaseError::service(format!("GitLab request failed: {}", e)))?;
            self.check(response)?;
        }
        Ok(())
    }
}
