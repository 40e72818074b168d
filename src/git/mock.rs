//! In-memory implementation of the [Repository] trait for testing
//!
//! Simulates a linear first-parent history without touching the file
//! system. Tests script the history with the builder methods, then exercise
//! engine code through the trait. Side effects (commits, tags, pushes) are
//! recorded and can be asserted on.

use crate::domain::{Commit, Identity, Tag};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use std::sync::Mutex;

struct Inner {
    /// Oldest first
    commits: Vec<Commit>,
    branch: String,
    detached: bool,
    clean: bool,
    remotes: Vec<String>,
    counter: u64,
    pushes: Vec<String>,
}

/// Scripted repository state
///
/// ```rust
/// # use git_release::git::{InMemoryRepository, Repository};
/// let repo = InMemoryRepository::new();
/// let first = repo.script_commit("feat: initial");
/// repo.script_tag("v1.0.0", None);
/// repo.script_commit("fix: npe");
/// assert_eq!(repo.get_root_commit().unwrap(), first);
/// ```
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    /// An empty repository on branch `main` with remote `origin`
    pub fn new() -> Self {
        InMemoryRepository {
            inner: Mutex::new(Inner {
                commits: Vec::new(),
                branch: "main".to_string(),
                detached: false,
                clean: true,
                remotes: vec!["origin".to_string()],
                counter: 0,
                pushes: Vec::new(),
            }),
        }
    }

    /// Append a commit to the scripted history, returning its SHA
    pub fn script_commit(&self, message: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let counter = inner.counter;
        inner.counter += 1;
        let sha = format!("{:040x}", 0xc0ffee_u64 + counter);
        let parents = inner
            .commits
            .last()
            .map(|c| vec![c.sha.clone()])
            .unwrap_or_default();
        inner.commits.push(Commit {
            sha: sha.clone(),
            message: message.to_string(),
            author: Identity::new("Jane Doe", "jane@example.com"),
            committer: Identity::new("Jane Doe", "jane@example.com"),
            timestamp: 1_700_000_000 + counter as i64 * 60,
            parents,
            tags: Vec::new(),
        });
        sha
    }

    /// Attach a tag to the scripted head commit
    pub fn script_tag(&self, name: &str, message: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        let target = inner
            .commits
            .last()
            .map(|c| c.sha.clone())
            .expect("cannot tag an empty scripted history");
        let tag = match message {
            Some(msg) => Tag::annotated(name, target, msg),
            None => Tag::lightweight(name, target),
        };
        inner.commits.last_mut().unwrap().tags.push(tag);
    }

    /// Attach a tag to an arbitrary scripted commit
    pub fn script_tag_at(&self, name: &str, sha: &str) {
        let mut inner = self.inner.lock().unwrap();
        let commit = inner
            .commits
            .iter_mut()
            .find(|c| c.sha == sha)
            .expect("unknown scripted commit");
        commit.tags.push(Tag::lightweight(name, sha));
    }

    /// Set the current branch name
    pub fn script_branch(&self, name: &str) {
        self.inner.lock().unwrap().branch = name.to_string();
    }

    /// Simulate a detached HEAD
    pub fn script_detached(&self) {
        self.inner.lock().unwrap().detached = true;
    }

    /// Set the workspace cleanliness flag
    pub fn script_clean(&self, clean: bool) {
        self.inner.lock().unwrap().clean = clean;
    }

    /// Replace the configured remotes
    pub fn script_remotes(&self, remotes: &[&str]) {
        self.inner.lock().unwrap().remotes = remotes.iter().map(|s| s.to_string()).collect();
    }

    /// Remotes pushed to so far, in push order
    pub fn pushes(&self) -> Vec<String> {
        self.inner.lock().unwrap().pushes.clone()
    }

    /// All tags in the repository
    pub fn tags(&self) -> Vec<Tag> {
        let inner = self.inner.lock().unwrap();
        inner.commits.iter().flat_map(|c| c.tags.clone()).collect()
    }

    /// Number of scripted plus engine-created commits
    pub fn commit_count(&self) -> usize {
        self.inner.lock().unwrap().commits.len()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for InMemoryRepository {
    fn add(&self, _paths: &[String]) -> Result<()> {
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Commit> {
        let sha = self.script_commit(message);
        let mut inner = self.inner.lock().unwrap();
        inner.clean = true;
        let commit = inner
            .commits
            .iter()
            .find(|c| c.sha == sha)
            .cloned()
            .expect("commit just created");
        Ok(commit)
    }

    fn tag(&self, target: &str, name: &str, message: Option<&str>) -> Result<Tag> {
        let mut inner = self.inner.lock().unwrap();
        if inner.commits.iter().any(|c| c.tags.iter().any(|t| t.name == name)) {
            return Err(ReleaseError::git(format!("Tag '{}' already exists", name)));
        }
        let commit = inner
            .commits
            .iter_mut()
            .find(|c| c.sha == target)
            .ok_or_else(|| ReleaseError::git(format!("Cannot find commit '{}'", target)))?;
        let tag = match message.filter(|m| !m.is_empty()) {
            Some(msg) => Tag::annotated(name, target, msg),
            None => Tag::lightweight(name, target),
        };
        commit.tags.push(tag.clone());
        Ok(tag)
    }

    fn push(&self, remote: &str, _user: Option<&str>, _password: Option<&str>) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.remotes.iter().any(|r| r == remote) {
            return Err(ReleaseError::git(format!("Cannot find remote '{}'", remote)));
        }
        inner.pushes.push(remote.to_string());
        Ok(remote.to_string())
    }

    fn walk_history(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        visit: &mut dyn FnMut(&Commit) -> bool,
    ) -> Result<()> {
        let commits = {
            let inner = self.inner.lock().unwrap();
            inner.commits.clone()
        };
        if commits.is_empty() {
            return Err(ReleaseError::git("Repository has no commits"));
        }
        let start_index = match start {
            Some(sha) => commits
                .iter()
                .position(|c| c.sha == sha)
                .ok_or_else(|| ReleaseError::git(format!("Cannot find commit '{}'", sha)))?,
            None => commits.len() - 1,
        };
        for commit in commits[..=start_index].iter().rev() {
            if !visit(commit) {
                break;
            }
            if end.is_some_and(|e| e == commit.sha) {
                break;
            }
        }
        Ok(())
    }

    fn get_commit_tags(&self, sha: &str) -> Result<Vec<Tag>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .commits
            .iter()
            .find(|c| c.sha == sha)
            .map(|c| c.tags.clone())
            .unwrap_or_default())
    }

    fn get_current_branch(&self) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        if inner.detached {
            return Err(ReleaseError::git("detached HEAD"));
        }
        Ok(inner.branch.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.inner.lock().unwrap().clean)
    }

    fn get_latest_commit(&self) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .commits
            .last()
            .map(|c| c.sha.clone())
            .ok_or_else(|| ReleaseError::git("Repository has no commits"))
    }

    fn get_root_commit(&self) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .commits
            .first()
            .map(|c| c.sha.clone())
            .ok_or_else(|| ReleaseError::git("Repository has no commits"))
    }

    fn get_remote_names(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().unwrap().remotes.clone())
    }
}
