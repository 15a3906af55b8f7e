//! The staging area.
//!
//! Records pending additions and removals relative to the HEAD commit's
//! snapshot. Stored as `.twig/index.json`; only `added` and `removed` are
//! persisted, `tracked` is taken from HEAD every time the index is loaded.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;
use crate::object::{object_id, ObjectKind, ObjectStore};

/// What `remove` did to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A pending addition was dropped; the working file is untouched.
    Unstaged,
    /// The path is tracked and is now staged for removal. The caller
    /// deletes the working file.
    Staged,
}

/// Pending changes between HEAD and the next commit.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagingArea {
    /// Path -> staged blob hash.
    pub added: BTreeMap<String, String>,
    /// Paths staged for removal.
    pub removed: BTreeSet<String>,
    /// HEAD's snapshot at load time.
    #[serde(skip)]
    pub tracked: BTreeMap<String, String>,
}

impl StagingArea {
    /// Load the index from a JSON file (or start empty) on top of `tracked`.
    pub fn load(path: &Path, tracked: BTreeMap<String, String>) -> TwigResult<Self> {
        let mut stage: StagingArea = if path.exists() {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else {
            StagingArea::default()
        };
        stage.tracked = tracked;
        Ok(stage)
    }

    /// Save the index to a JSON file (atomic: temp + fsync + rename).
    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())?;
        Ok(())
    }

    /// Stage `content` as the new version of `path`.
    ///
    /// Content identical to HEAD's version cancels any pending add or
    /// removal instead. Returns whether the index changed.
    pub fn add(&mut self, path: &str, content: &[u8], objects: &ObjectStore) -> TwigResult<bool> {
        let hash = object_id(ObjectKind::Blob, content);

        if self.tracked.get(path) == Some(&hash) {
            let unstaged = self.added.remove(path).is_some();
            let unremoved = self.removed.remove(path);
            debug!(path, "content matches HEAD, cleared pending changes");
            return Ok(unstaged || unremoved);
        }

        let unremoved = self.removed.remove(path);
        if self.added.get(path) == Some(&hash) {
            return Ok(unremoved);
        }

        objects.store_blob(content)?;
        self.added.insert(path.to_string(), hash.clone());
        debug!(path, blob = %hash, "staged for addition");
        Ok(true)
    }

    /// Unstage a pending addition, or stage a tracked path for removal.
    pub fn remove(&mut self, path: &str) -> TwigResult<Removal> {
        if self.added.remove(path).is_some() {
            debug!(path, "unstaged");
            return Ok(Removal::Unstaged);
        }
        if self.tracked.contains_key(path) {
            self.removed.insert(path.to_string());
            debug!(path, "staged for removal");
            return Ok(Removal::Staged);
        }
        Err(TwigError::NothingToRemove(path.to_string()))
    }

    /// True if nothing is staged.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// `(tracked - removed) + added`: the snapshot the next commit records.
    pub fn compute_new_tracked(&self) -> BTreeMap<String, String> {
        let mut next: BTreeMap<String, String> = self
            .tracked
            .iter()
            .filter(|(path, _)| !self.removed.contains(*path))
            .map(|(path, hash)| (path.clone(), hash.clone()))
            .collect();
        next.extend(self.added.iter().map(|(p, h)| (p.clone(), h.clone())));
        next
    }

    /// Drop all pending changes and rebase onto a new snapshot.
    pub fn reset(&mut self, tracked: BTreeMap<String, String>) {
        self.added.clear();
        self.removed.clear();
        self.tracked = tracked;
    }

    /// Paths that are staged or tracked.
    pub fn is_known(&self, path: &str) -> bool {
        self.added.contains_key(path) || self.tracked.contains_key(path)
    }
}
