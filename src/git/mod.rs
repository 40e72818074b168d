//! Git operations abstraction layer
//!
//! The [Repository] trait is the narrow facade the release engine consumes.
//! Concrete implementations:
//!
//! - [repository::Git2Repository]: real repositories via the `git2` crate
//! - [mock::InMemoryRepository]: scripted history for tests
//!
//! Engine code depends on the trait only, so scope resolution and the
//! pipeline can be exercised without touching a real repository.

pub mod mock;
pub mod repository;

pub use mock::InMemoryRepository;
pub use repository::Git2Repository;

use crate::domain::{Commit, Tag};
use crate::error::Result;

/// Common git operation trait for abstraction
///
/// All implementors must be `Send + Sync`. Implementations map underlying
/// errors to [crate::error::ReleaseError] variants.
pub trait Repository: Send + Sync {
    /// Stage the given paths (empty slice stages all pending changes)
    fn add(&self, paths: &[String]) -> Result<()>;

    /// Commit the staged changes with the given message
    fn commit(&self, message: &str) -> Result<Commit>;

    /// Tag a commit
    ///
    /// A non-empty message produces an annotated tag, otherwise a
    /// lightweight one.
    fn tag(&self, target: &str, name: &str, message: Option<&str>) -> Result<Tag>;

    /// Push the current branch and all tags to the named remote
    ///
    /// Credentials are optional; when given, they are used for HTTPS basic
    /// auth. Returns the remote name on success.
    fn push(&self, remote: &str, user: Option<&str>, password: Option<&str>) -> Result<String>;

    /// Walk the commit history in reverse chronological first-parent order
    ///
    /// Starts at `start` (HEAD when `None`) and visits commits until `end`
    /// (inclusive) is visited, the visitor returns `false`, or the root is
    /// reached.
    fn walk_history(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        visit: &mut dyn FnMut(&Commit) -> bool,
    ) -> Result<()>;

    /// All tags pointing at the given commit
    fn get_commit_tags(&self, sha: &str) -> Result<Vec<Tag>>;

    /// Name of the currently checked out branch
    ///
    /// A detached HEAD is an error: release inference needs a branch to
    /// select the release type.
    fn get_current_branch(&self) -> Result<String>;

    /// Whether the working tree has no uncommitted changes
    fn is_clean(&self) -> Result<bool>;

    /// SHA of the commit HEAD points at
    fn get_latest_commit(&self) -> Result<String>;

    /// SHA of the first-parent root commit
    fn get_root_commit(&self) -> Result<String>;

    /// Configured remote names
    fn get_remote_names(&self) -> Result<Vec<String>>;
}
