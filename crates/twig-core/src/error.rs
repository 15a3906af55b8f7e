//! Error types for twig operations.
//!
//! Most variants carry the exact diagnostic the CLI prints. Every operation
//! checks its preconditions before the first write, so any error returned
//! here means nothing on disk was changed.

use std::io;

/// Broad category of a [`TwigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed usage: empty message, bad branch name, bad path.
    UserInput,
    /// The repository is not in a state that allows the operation.
    Precondition,
    /// A referenced object, commit, branch or file does not exist.
    NotFound,
    /// A logic bug or on-disk corruption. Never expected in normal use.
    Invariant,
    /// The filesystem or a serializer failed underneath us.
    Io,
}

/// All possible twig errors.
#[derive(Debug, thiserror::Error)]
pub enum TwigError {
    /// The working directory has no `.twig/`.
    #[error("Not in an initialized Twig directory.")]
    NotARepo,
    /// `.twig/` already exists.
    #[error("A Twig version-control system already exists in the current directory.")]
    AlreadyExists,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No object with this hash in the store.
    #[error("no such object: {0}")]
    ObjectNotFound(String),
    /// The object exists but is of a different kind than requested.
    #[error("object {hash} is a {found}, expected a {expected}")]
    TypeMismatch {
        hash: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Stored bytes are unreadable or no longer hash to their name.
    #[error("corrupt object {hash}: {reason}")]
    CorruptObject { hash: String, reason: String },
    /// An abbreviated id matched more than one object.
    #[error("ambiguous id '{prefix}' matches {count} objects")]
    AmbiguousId { prefix: String, count: usize },
    /// A graph invariant does not hold (e.g. no common ancestor).
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("No commit with that id exists.")]
    NoSuchCommit(String),
    #[error("Found no commit with that message.")]
    NoCommitWithMessage,
    #[error("File does not exist.")]
    FileNotFound(String),
    #[error("File does not exist in that commit.")]
    FileNotInCommit(String),

    #[error("Please enter a commit message.")]
    EmptyMessage,
    #[error("No changes added to the commit.")]
    NothingToCommit,
    #[error("No reason to remove the file.")]
    NothingToRemove(String),

    #[error("A branch with that name already exists.")]
    BranchExists(String),
    /// Used by `rm-branch` and `merge`.
    #[error("A branch with that name does not exist.")]
    BranchNotFound(String),
    /// Used by `checkout <branch>`.
    #[error("No such branch exists.")]
    NoSuchBranch(String),
    #[error("Cannot remove the current branch.")]
    CannotRemoveCurrentBranch,
    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch,
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("You have uncommitted changes.")]
    UncommittedChanges,
    #[error("Cannot merge a branch with itself.")]
    MergeWithSelf,
    #[error("Cannot merge with a detached HEAD.")]
    DetachedHead,
    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedFileInTheWay(String),

    /// A path escapes the working directory or points into `.twig/`.
    #[error("path is outside the working tree: {0}")]
    PathTraversal(String),
    /// Could not acquire the repository lock within the timeout.
    #[error("could not acquire repository lock within timeout")]
    LockTimeout,
}

impl TwigError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use TwigError::*;
        match self {
            EmptyMessage | InvalidBranchName(_) | PathTraversal(_) => ErrorKind::UserInput,
            NotARepo
            | AlreadyExists
            | NothingToCommit
            | NothingToRemove(_)
            | BranchExists(_)
            | CannotRemoveCurrentBranch
            | AlreadyOnBranch
            | UncommittedChanges
            | MergeWithSelf
            | DetachedHead
            | UntrackedFileInTheWay(_)
            | AmbiguousId { .. }
            | LockTimeout => ErrorKind::Precondition,
            ObjectNotFound(_)
            | NoSuchCommit(_)
            | NoCommitWithMessage
            | FileNotFound(_)
            | FileNotInCommit(_)
            | BranchNotFound(_)
            | NoSuchBranch(_)
            | TypeMismatch { .. } => ErrorKind::NotFound,
            CorruptObject { .. } | Invariant(_) => ErrorKind::Invariant,
            Io(_) | Json(_) => ErrorKind::Io,
        }
    }
}

/// Convenience alias for Results in twig.
pub type TwigResult<T> = Result<T, TwigError>;
