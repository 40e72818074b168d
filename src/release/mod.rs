//! Release resolution
//!
//! The three read-only stages behind Infer: selecting the active release
//! type, resolving the release scope from history, and inferring the next
//! version.

pub mod infer;
pub mod scope;
pub mod select;

pub use infer::{infer, Inference};
pub use scope::{resolve_scope, ReleaseScope};
pub use select::select;
