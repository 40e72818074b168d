//! Pipeline orchestration
//!
//! Runs the Infer → Mark → Make → Publish phases over a repository, owning
//! the state for the duration of the run. Each phase completes by updating
//! the state and checkpointing it to the state file (when one is
//! configured), so a later invocation with `resume` picks up where the
//! previous one stopped.

use crate::changelog;
use crate::config::Configuration;
use crate::conventions::ConventionMatcher;
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::release::{infer, resolve_scope, select};
use crate::services;
use crate::state::State;
use crate::template;
use std::path::{Path, PathBuf};

/// The pipeline commands, each implying the phases before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Infer,
    Mark,
    Make,
    Publish,
    Release,
}

/// Drives the phases over one repository
pub struct Orchestrator<'a> {
    config: Configuration,
    repo: &'a dyn Repository,
    state: State,
    state_file: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    /// Initialize the orchestrator, resuming from the state file when asked
    ///
    /// A resumed state is invalidated (forcing a fresh Infer) when HEAD has
    /// moved, the configuration snapshot differs, or the directory changed.
    pub fn new(config: Configuration, repo: &'a dyn Repository) -> Result<Self> {
        let state_file = config.state_file.clone().map(PathBuf::from);
        let state = match (&state_file, config.is_resume()) {
            (Some(path), true) if path.exists() => {
                let mut loaded = State::load(path)?;
                if Self::is_stale(&loaded, &config, repo)? {
                    tracing::info!("Resumed state is stale, re-running inference");
                    loaded.invalidate();
                }
                loaded.configuration = config.clone();
                loaded.directory = Some(config.directory().to_string());
                loaded
            }
            _ => State::new(config.clone()),
        };
        Ok(Orchestrator {
            config,
            repo,
            state,
            state_file,
        })
    }

    fn is_stale(state: &State, config: &Configuration, repo: &dyn Repository) -> Result<bool> {
        if state.release_scope.final_commit.as_deref() != Some(repo.get_latest_commit()?.as_str()) {
            return Ok(true);
        }
        // Run-control flags do not feed inference and must not invalidate it.
        let mut recorded = state.configuration.clone();
        let mut current = config.clone();
        recorded.resume = None;
        current.resume = None;
        recorded.dry_run = None;
        current.dry_run = None;
        if recorded != current {
            return Ok(true);
        }
        Ok(state.directory.as_deref() != Some(config.directory()))
    }

    /// The state computed so far
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Consume the orchestrator and return the final state
    pub fn into_state(self) -> State {
        self.state
    }

    fn checkpoint(&self) -> Result<()> {
        if let Some(path) = &self.state_file {
            self.state.save(path)?;
        }
        Ok(())
    }

    /// Run a command and the phases it implies
    pub fn run(&mut self, command: Command) -> Result<()> {
        self.infer()?;
        if command == Command::Infer {
            return Ok(());
        }
        self.mark()?;
        if command == Command::Mark {
            return Ok(());
        }
        self.make()?;
        if command == Command::Make {
            return Ok(());
        }
        self.publish()
    }

    /// Infer: select the release type, resolve the scope, infer the version
    ///
    /// Read-only with respect to the repository. Skipped entirely when a
    /// resumed state is still fresh.
    pub fn infer(&mut self) -> Result<()> {
        let head = self.repo.get_latest_commit()?;
        if let Some(version) = &self.state.version {
            if self.state.release_scope.final_commit.as_deref() == Some(head.as_str()) {
                tracing::info!(%version, "Inference resumed from state");
                return Ok(());
            }
        }

        let branch = self.repo.get_current_branch()?;
        let workspace_clean = self.repo.is_clean()?;
        self.state.branch = Some(branch.clone());
        self.state.scheme = self.config.scheme();

        let context = self.state.to_context();
        let types = self.config.release_types();
        let (type_name, release_type) = select(&types, &branch, workspace_clean, &context)?;
        self.state.release_type = Some(type_name);

        let matcher = ConventionMatcher::new(&self.config.conventions())?;
        let scope = resolve_scope(self.repo, &self.config, &release_type, &matcher, &context)?;
        self.state.timestamp = head_commit_timestamp(self.repo)? * 1000;
        self.state.release_scope = scope;

        let context = self.state.to_context();
        let inference = infer(
            &self.config,
            &release_type,
            &self.state.release_scope,
            &matcher,
            &branch,
            &context,
        )?;
        tracing::info!(
            version = %inference.version,
            new_version = inference.new_version,
            new_release = inference.new_release,
            "Version inferred"
        );
        self.state.version = Some(inference.version);
        self.state.overridden_version = inference.overridden_version;
        self.state.version_range = inference.version_range;
        self.state.bump = inference.bump.map(|b| b.to_string());
        self.state.new_version = inference.new_version;
        self.state.new_release = inference.new_release;
        self.checkpoint()
    }

    /// Mark: commit, tag and push as the active release type dictates
    pub fn mark(&mut self) -> Result<()> {
        if !self.state.new_version {
            tracing::debug!("No new version, nothing to mark");
            return Ok(());
        }
        let version = self.version_string()?;
        if self.state.mark_completed_for.as_deref() == Some(version.as_str()) {
            tracing::info!("Mark already completed for this version");
            return Ok(());
        }
        let release_type = self.active_release_type()?;
        let context = self.state.to_context();
        let dry_run = self.config.is_dry_run();

        if resolve_flag(release_type.git_commit.as_deref(), &context)? && !self.repo.is_clean()? {
            let message_template = release_type
                .git_commit_message
                .as_deref()
                .unwrap_or("Release version {{version}}");
            let message = template::render(message_template, &context)?;
            if dry_run {
                tracing::info!(%message, "dry run: skipping release commit");
            } else {
                // Stage everything pending, the changelog included when one
                // was produced by an earlier run.
                self.repo.add(&[])?;
                let commit = self.repo.commit(&message)?;
                tracing::info!(sha = %commit.short_sha(), "Release commit created");
                self.state.release_scope.final_commit = Some(commit.sha);
            }
        }

        if resolve_flag(release_type.git_tag.as_deref(), &context)? {
            let tag_name = self.tag_name(&version);
            let message = match release_type.git_tag_message.as_deref() {
                Some(template_text) => {
                    let rendered = template::render(template_text, &context)?;
                    (!rendered.is_empty()).then_some(rendered)
                }
                None => None,
            };
            if dry_run {
                tracing::info!(tag = %tag_name, "dry run: skipping tag creation");
            } else {
                let target = self
                    .state
                    .release_scope
                    .final_commit
                    .clone()
                    .ok_or_else(|| ReleaseError::state("No final commit to tag"))?;
                self.repo.tag(&target, &tag_name, message.as_deref())?;
                tracing::info!(tag = %tag_name, "Tag created");
            }
        }

        if resolve_flag(release_type.git_push.as_deref(), &context)? {
            let types = self.config.release_types();
            let remotes = if types.remote_repositories.is_empty() {
                vec!["origin".to_string()]
            } else {
                types.remote_repositories.clone()
            };
            for remote in remotes {
                if dry_run {
                    tracing::info!(%remote, "dry run: skipping push");
                    continue;
                }
                let (user, password) = self.remote_credentials(&remote, &context)?;
                self.repo.push(&remote, user.as_deref(), password.as_deref())?;
                tracing::info!(%remote, "Pushed branch and tags");
            }
        }

        self.state.mark_completed_for = Some(version);
        self.checkpoint()
    }

    /// Make: build the changelog artifact
    pub fn make(&mut self) -> Result<()> {
        if !self.state.new_version {
            tracing::debug!("No new version, nothing to make");
            return Ok(());
        }
        let version = self.version_string()?;
        if self.state.make_completed_for.as_deref() == Some(version.as_str()) {
            tracing::info!("Make already completed for this version");
            return Ok(());
        }
        let Some(changelog_config) = self.config.changelog.clone() else {
            self.state.make_completed_for = Some(version);
            return self.checkpoint();
        };
        let Some(path) = changelog_config.path.clone() else {
            self.state.make_completed_for = Some(version);
            return self.checkpoint();
        };

        let matcher = ConventionMatcher::new(&self.config.conventions())?;
        let built = changelog::build(
            &changelog_config,
            &self.state.release_scope.significant_commits,
            &matcher,
            &version,
            self.state.timestamp,
        )?;
        let rendered = changelog::render(&built, &changelog_config)?;
        self.state.changelog = Some(built);
        if self.config.is_dry_run() {
            tracing::info!(%path, "dry run: skipping changelog write");
        } else {
            let written = changelog::write_file(Path::new(&path), &rendered)?;
            if written {
                tracing::info!(%path, "Changelog written");
            }
        }
        self.state.make_completed_for = Some(version);
        self.checkpoint()
    }

    /// Publish: create hosted releases on every configured service
    ///
    /// Services run in declaration order; a failing service is reported but
    /// later services still proceed, and the overall run fails when any
    /// failed.
    pub fn publish(&mut self) -> Result<()> {
        if !self.state.new_release {
            tracing::debug!("No new release, nothing to publish");
            return Ok(());
        }
        let version = self.version_string()?;
        if self.state.publish_completed_for.as_deref() == Some(version.as_str()) {
            tracing::info!("Publish already completed for this version");
            return Ok(());
        }
        let types = self.config.release_types();
        let context = self.state.to_context();
        let tag_name = self.tag_name(&version);
        let body = match (&self.state.changelog, &self.config.changelog) {
            (Some(built), Some(changelog_config)) => {
                changelog::render(built, changelog_config)?
            }
            _ => String::new(),
        };

        let mut failures: Vec<String> = Vec::new();
        for name in &types.publication_services {
            if self.state.published_services.iter().any(|s| s == name) {
                tracing::info!(service = %name, "Already published, skipping");
                continue;
            }
            let result = self.publish_to(name, &version, &tag_name, &body, &context);
            match result {
                Ok(()) => {
                    self.state.published_services.push(name.clone());
                    self.checkpoint()?;
                }
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Publication failed");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(ReleaseError::service(format!(
                "Publication failed for {}",
                failures.join("; ")
            )));
        }
        self.state.publish_completed_for = Some(version);
        self.checkpoint()
    }

    fn publish_to(
        &self,
        name: &str,
        version: &str,
        tag_name: &str,
        body: &str,
        context: &serde_json::Value,
    ) -> Result<()> {
        let service_config = self
            .config
            .services
            .as_ref()
            .and_then(|s| s.get(name))
            .ok_or_else(|| {
                ReleaseError::config(format!("Publication service '{}' is not configured", name))
            })?;
        let options = services::ServiceOptions::resolve(service_config, context)?;
        let owner = options.repository_owner.clone().ok_or_else(|| {
            ReleaseError::config(format!("Service '{}' has no REPOSITORY_OWNER", name))
        })?;
        let repository = options.repository_name.clone().ok_or_else(|| {
            ReleaseError::config(format!("Service '{}' has no REPOSITORY_NAME", name))
        })?;
        if self.config.is_dry_run() {
            tracing::info!(service = %name, tag = %tag_name, "dry run: skipping release creation");
            return Ok(());
        }
        let service = services::instance(service_config, context)?;
        let release = service.create_release(&owner, &repository, version, tag_name, body)?;
        tracing::info!(service = %name, tag = %release.tag, "Release published");
        Ok(())
    }

    fn active_release_type(&self) -> Result<crate::config::ReleaseType> {
        let name = self
            .state
            .release_type
            .clone()
            .ok_or_else(|| ReleaseError::state("No release type selected; run Infer first"))?;
        if name == crate::config::DEFAULT_RELEASE_TYPE_NAME {
            return Ok(self
                .config
                .release_types()
                .items
                .get(&name)
                .cloned()
                .unwrap_or_else(crate::config::ReleaseType::fallback));
        }
        self.config
            .release_types()
            .items
            .get(&name)
            .cloned()
            .ok_or_else(|| {
                ReleaseError::config(format!("Release type '{}' is not defined", name))
            })
    }

    fn version_string(&self) -> Result<String> {
        self.state
            .version
            .as_ref()
            .map(|v| v.to_string())
            .ok_or_else(|| ReleaseError::state("No version inferred; run Infer first"))
    }

    fn tag_name(&self, version: &str) -> String {
        match self.config.release_prefix.as_deref() {
            Some(prefix) => format!("{}{}", prefix, version),
            None => version.to_string(),
        }
    }

    fn remote_credentials(
        &self,
        remote: &str,
        context: &serde_json::Value,
    ) -> Result<(Option<String>, Option<String>)> {
        let Some(git) = &self.config.git else {
            return Ok((None, None));
        };
        let Some(remote_config) = git.remotes.get(remote) else {
            return Ok((None, None));
        };
        let user = match remote_config.user.as_deref() {
            Some(user_template) => {
                let rendered = template::render(user_template, context)?;
                (!rendered.is_empty()).then_some(rendered)
            }
            None => None,
        };
        let password = match remote_config.password.as_deref() {
            Some(password_template) => {
                let rendered = template::render(password_template, context)?;
                (!rendered.is_empty()).then_some(rendered)
            }
            None => None,
        };
        Ok((user, password))
    }
}

/// Resolve a boolean-valued template field; unset means false
fn resolve_flag(field: Option<&str>, context: &serde_json::Value) -> Result<bool> {
    match field {
        Some(template_text) => template::render_boolean(template_text, context),
        None => Ok(false),
    }
}

/// Timestamp of the commit HEAD points at, in seconds
fn head_commit_timestamp(repo: &dyn Repository) -> Result<i64> {
    let mut timestamp = 0;
    repo.walk_history(None, None, &mut |commit| {
        timestamp = commit.timestamp;
        false
    })?;
    Ok(timestamp)
}
