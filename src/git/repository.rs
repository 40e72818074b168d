//! Real repository implementation over the git2 crate

use crate::domain::{Commit, Identity, Tag};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use git2::{ObjectType, Repository as Git2Repo, Sort};
use std::collections::HashMap;
use std::path::Path;

/// Concrete implementation of the [Repository] trait using libgit2
///
/// All methods convert `git2::Error` into [ReleaseError] variants so the
/// engine sees one error surface.
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository at the given path
    ///
    /// Searches for a `.git` directory from the provided path upwards.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path.as_ref()).map_err(|e| {
            ReleaseError::git(format!(
                "Cannot open repository at '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Git2Repository { repo })
    }

    /// Map of commit SHA to the tags pointing at it
    ///
    /// Annotated tags are peeled to their target commit; the tag message is
    /// preserved.
    fn tags_by_commit(&self) -> Result<HashMap<String, Vec<Tag>>> {
        let mut map: HashMap<String, Vec<Tag>> = HashMap::new();
        let names = self.repo.tag_names(None)?;
        for name in names.iter().flatten() {
            let reference = match self.repo.find_reference(&format!("refs/tags/{}", name)) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let Some(direct) = reference.target() else {
                continue;
            };
            let object = self
                .repo
                .find_object(direct, None)
                .map_err(|e| ReleaseError::git(format!("Broken tag '{}': {}", name, e)))?;
            let tag = match object.as_tag() {
                Some(tag_obj) => {
                    let commit_id = object
                        .peel(ObjectType::Commit)
                        .map_err(|e| ReleaseError::git(format!("Cannot peel tag '{}': {}", name, e)))?
                        .id()
                        .to_string();
                    Tag {
                        name: name.to_string(),
                        target: commit_id,
                        annotated: true,
                        message: tag_obj.message().map(|m| m.to_string()),
                    }
                }
                None => Tag::lightweight(name, object.id().to_string()),
            };
            map.entry(tag.target.clone()).or_default().push(tag);
        }
        Ok(map)
    }

    fn to_commit(&self, commit: &git2::Commit<'_>, tags: &HashMap<String, Vec<Tag>>) -> Commit {
        let sha = commit.id().to_string();
        Commit {
            sha: sha.clone(),
            message: commit.message().unwrap_or_default().to_string(),
            author: Identity::new(
                commit.author().name().unwrap_or_default(),
                commit.author().email().unwrap_or_default(),
            ),
            committer: Identity::new(
                commit.committer().name().unwrap_or_default(),
                commit.committer().email().unwrap_or_default(),
            ),
            timestamp: commit.time().seconds(),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            tags: tags.get(&sha).cloned().unwrap_or_default(),
        }
    }
}

impl Repository for Git2Repository {
    fn add(&self, paths: &[String]) -> Result<()> {
        let mut index = self.repo.index()?;
        if paths.is_empty() {
            index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        } else {
            for path in paths {
                index.add_path(Path::new(path))?;
            }
        }
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Commit> {
        let signature = self.repo.signature()?;
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let head = self.repo.head()?.peel_to_commit()?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&head],
        )?;
        let commit = self.repo.find_commit(oid)?;
        let tags = self.tags_by_commit()?;
        Ok(self.to_commit(&commit, &tags))
    }

    fn tag(&self, target: &str, name: &str, message: Option<&str>) -> Result<Tag> {
        let oid = git2::Oid::from_str(target)
            .map_err(|e| ReleaseError::git(format!("Invalid commit SHA '{}': {}", target, e)))?;
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| ReleaseError::git(format!("Cannot find object '{}': {}", target, e)))?;
        match message.filter(|m| !m.is_empty()) {
            Some(msg) => {
                let signature = self.repo.signature()?;
                self.repo
                    .tag(name, &object, &signature, msg, false)
                    .map_err(|e| ReleaseError::git(format!("Cannot create tag '{}': {}", name, e)))?;
                Ok(Tag::annotated(name, target, msg))
            }
            None => {
                self.repo
                    .tag_lightweight(name, &object, false)
                    .map_err(|e| ReleaseError::git(format!("Cannot create tag '{}': {}", name, e)))?;
                Ok(Tag::lightweight(name, target))
            }
        }
    }

    fn push(&self, remote: &str, user: Option<&str>, password: Option<&str>) -> Result<String> {
        let branch = self.get_current_branch()?;
        let mut remote_handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::git(format!("Cannot find remote '{}': {}", remote, e)))?;

        let mut callbacks = git2::RemoteCallbacks::new();
        let user = user.map(|s| s.to_string());
        let password = password.map(|s| s.to_string());
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            match (&user, &password) {
                // Token-as-username with empty password, or user/token pair.
                (Some(u), Some(p)) => git2::Cred::userpass_plaintext(u, p),
                (Some(u), None) => git2::Cred::userpass_plaintext(u, ""),
                (None, Some(p)) => {
                    git2::Cred::userpass_plaintext(username_from_url.unwrap_or("git"), p)
                }
                (None, None) => git2::Cred::default(),
            }
        });
        let mut options = git2::PushOptions::new();
        options.remote_callbacks(callbacks);

        let branch_refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        let refspecs = [branch_refspec.as_str(), "refs/tags/*:refs/tags/*"];
        remote_handle
            .push(&refspecs, Some(&mut options))
            .map_err(|e| ReleaseError::git(format!("Push to '{}' failed: {}", remote, e)))?;
        Ok(remote.to_string())
    }

    fn walk_history(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        visit: &mut dyn FnMut(&Commit) -> bool,
    ) -> Result<()> {
        let tags = self.tags_by_commit()?;
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;
        revwalk.simplify_first_parent()?;
        match start {
            Some(sha) => {
                let oid = git2::Oid::from_str(sha)
                    .map_err(|e| ReleaseError::git(format!("Invalid start SHA '{}': {}", sha, e)))?;
                revwalk.push(oid)?;
            }
            None => revwalk.push_head()?,
        }
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            let commit = self.to_commit(&commit, &tags);
            let sha = commit.sha.clone();
            if !visit(&commit) {
                break;
            }
            if end.is_some_and(|e| e == sha) {
                break;
            }
        }
        Ok(())
    }

    fn get_commit_tags(&self, sha: &str) -> Result<Vec<Tag>> {
        Ok(self
            .tags_by_commit()?
            .get(sha)
            .cloned()
            .unwrap_or_default())
    }

    fn get_current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(ReleaseError::git("detached HEAD"));
        }
        head.shorthand()
            .map(|s| s.to_string())
            .ok_or_else(|| ReleaseError::git("Branch name is not valid UTF-8"))
    }

    fn is_clean(&self) -> Result<bool> {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    fn get_latest_commit(&self) -> Result<String> {
        let head = self.repo.head()?;
        head.target()
            .map(|oid| oid.to_string())
            .ok_or_else(|| ReleaseError::git("Repository has no commits"))
    }

    fn get_root_commit(&self) -> Result<String> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;
        revwalk.simplify_first_parent()?;
        revwalk.push_head()?;
        let mut last = None;
        for oid in revwalk {
            last = Some(oid?);
        }
        last.map(|oid| oid.to_string())
            .ok_or_else(|| ReleaseError::git("Repository has no commits"))
    }

    fn get_remote_names(&self) -> Result<Vec<String>> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(|s| s.to_string()).collect())
    }
}

// SAFETY: the engine drives one repository from one thread at a time;
// libgit2 itself is thread-safe for the read paths used here.
unsafe impl Sync for Git2Repository {}
