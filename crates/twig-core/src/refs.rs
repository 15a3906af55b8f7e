//! Branches and HEAD.
//!
//! Each branch is a file under `.twig/refs/heads/` containing a commit id.
//! HEAD is either `ref: refs/heads/<name>` or, when detached, a bare id.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;
use crate::graph::CommitGraph;

const SYMBOLIC_PREFIX: &str = "ref: refs/heads/";

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    Branch(String),
    Detached(String),
}

impl Head {
    fn encode(&self) -> String {
        match self {
            Head::Branch(name) => format!("{SYMBOLIC_PREFIX}{name}\n"),
            Head::Detached(id) => format!("{id}\n"),
        }
    }

    fn decode(raw: &str) -> TwigResult<Self> {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix(SYMBOLIC_PREFIX) {
            return Ok(Head::Branch(name.to_string()));
        }
        if crate::hash::is_hex(raw) && raw.len() == crate::hash::HASH_HEX_LEN {
            return Ok(Head::Detached(raw.to_string()));
        }
        Err(TwigError::Invariant(format!("unreadable HEAD: {raw:?}")))
    }
}

/// Reads and writes `HEAD` and `refs/heads/*`.
pub struct RefStore {
    head_path: PathBuf,
    heads_dir: PathBuf,
}

impl RefStore {
    pub fn new(twig_dir: &std::path::Path) -> Self {
        Self {
            head_path: twig_dir.join("HEAD"),
            heads_dir: twig_dir.join("refs").join("heads"),
        }
    }

    pub fn read_head(&self) -> TwigResult<Head> {
        Head::decode(&fs::read_to_string(&self.head_path)?)
    }

    pub fn write_head(&self, head: &Head) -> TwigResult<()> {
        debug!(?head, "moving HEAD");
        atomic_write(&self.head_path, head.encode().as_bytes())
    }

    /// Name of the checked-out branch, or `None` when detached.
    pub fn current_branch(&self) -> TwigResult<Option<String>> {
        Ok(match self.read_head()? {
            Head::Branch(name) => Some(name),
            Head::Detached(_) => None,
        })
    }

    /// Commit id HEAD resolves to.
    pub fn head_commit_id(&self) -> TwigResult<String> {
        match self.read_head()? {
            Head::Branch(name) => self.read_branch(&name)?.ok_or_else(|| {
                TwigError::Invariant(format!("HEAD names missing branch '{name}'"))
            }),
            Head::Detached(id) => Ok(id),
        }
    }

    /// Dereference HEAD all the way to its commit.
    pub fn resolve_head(&self, graph: &CommitGraph<'_>) -> TwigResult<Commit> {
        graph.get_commit(&self.head_commit_id()?)
    }

    /// Commit a branch points at, or `None` if it does not exist. A name
    /// that could never be a branch does not exist either.
    pub fn read_branch(&self, name: &str) -> TwigResult<Option<String>> {
        match self.existing_branch_path(name) {
            Some(path) => Ok(Some(fs::read_to_string(path)?.trim().to_string())),
            None => Ok(None),
        }
    }

    pub fn branch_exists(&self, name: &str) -> TwigResult<bool> {
        Ok(self.existing_branch_path(name).is_some())
    }

    /// Create or overwrite a branch.
    pub fn set_branch(&self, name: &str, id: &str) -> TwigResult<()> {
        let path = self.branch_path(name)?;
        fs::create_dir_all(&self.heads_dir)?;
        debug!(branch = name, commit = id, "updating branch");
        atomic_write(&path, format!("{id}\n").as_bytes())
    }

    /// Create a new branch at `id`; fails if it already exists.
    pub fn create_branch(&self, name: &str, id: &str) -> TwigResult<()> {
        if self.branch_exists(name)? {
            return Err(TwigError::BranchExists(name.to_string()));
        }
        self.set_branch(name, id)
    }

    /// Delete a branch; the checked-out branch cannot be deleted.
    pub fn delete_branch(&self, name: &str) -> TwigResult<()> {
        if !self.branch_exists(name)? {
            return Err(TwigError::BranchNotFound(name.to_string()));
        }
        if self.current_branch()?.as_deref() == Some(name) {
            return Err(TwigError::CannotRemoveCurrentBranch);
        }
        fs::remove_file(self.heads_dir.join(name))?;
        debug!(branch = name, "deleted branch");
        Ok(())
    }

    /// Move whatever HEAD points at to `id`: the current branch, or HEAD
    /// itself when detached.
    pub fn advance_head(&self, id: &str) -> TwigResult<()> {
        match self.read_head()? {
            Head::Branch(name) => self.set_branch(&name, id),
            Head::Detached(_) => self.write_head(&Head::Detached(id.to_string())),
        }
    }

    /// All branch names, sorted.
    pub fn branches(&self) -> TwigResult<Vec<String>> {
        let mut names = Vec::new();
        if self.heads_dir.exists() {
            for entry in fs::read_dir(&self.heads_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if !name.ends_with(".tmp") {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path for a branch about to be written; rejects bad names.
    fn branch_path(&self, name: &str) -> TwigResult<PathBuf> {
        validate_branch_name(name)?;
        Ok(self.heads_dir.join(name))
    }

    fn existing_branch_path(&self, name: &str) -> Option<PathBuf> {
        validate_branch_name(name).ok()?;
        let path = self.heads_dir.join(name);
        path.is_file().then_some(path)
    }
}

/// Branch names become file names, so keep them to one safe path segment.
pub fn validate_branch_name(name: &str) -> TwigResult<()> {
    let bad = name.is_empty()
        || name.len() > 255
        || name.starts_with('-')
        || name.starts_with('.')
        || name.ends_with(".tmp")
        || name.contains("..")
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | ':'));
    if bad {
        return Err(TwigError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}
