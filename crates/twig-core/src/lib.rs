//! twig-core — Core library for a small local version-control system.
//!
//! Twig stores content-addressed **blobs** and **commits** under `.twig/`,
//! tracks named **branches** and a HEAD that may be detached, and merges
//! branches three ways with conflict markers. [`Repository`] is the entry
//! point; the other modules are the pieces it composes.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod index;
pub mod lock;
pub mod merge;
pub mod object;
pub mod refs;
pub mod repo;
pub mod status;
pub mod worktree;

pub use commit::Commit;
pub use error::{ErrorKind, TwigError, TwigResult};
pub use merge::MergeOutcome;
pub use refs::Head;
pub use repo::Repository;
pub use status::{Status, UnstagedChange};
