//! Working directory status.
//!
//! Compares the working copy against the staging area and HEAD's snapshot.

use serde::Serialize;

use crate::error::TwigResult;
use crate::index::StagingArea;
use crate::worktree::WorkTree;

/// Why a file shows up under "not staged for commit".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnstagedChange {
    Modified,
    Deleted,
}

/// Snapshot of everything `twig status` reports. All lists are sorted.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub branches: Vec<String>,
    /// `None` when HEAD is detached.
    pub current_branch: Option<String>,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub unstaged: Vec<(String, UnstagedChange)>,
    pub untracked: Vec<String>,
}

impl Status {
    /// True if nothing is staged, modified or untracked.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }
}

/// Compute the status for the given index and working copy.
pub fn compute_status(
    stage: &StagingArea,
    tree: &WorkTree,
    branches: Vec<String>,
    current_branch: Option<String>,
) -> TwigResult<Status> {
    let mut unstaged = Vec::new();

    for (path, staged_hash) in &stage.added {
        match tree.blob_id(path)? {
            None => unstaged.push((path.clone(), UnstagedChange::Deleted)),
            Some(hash) if &hash != staged_hash => {
                unstaged.push((path.clone(), UnstagedChange::Modified))
            }
            Some(_) => {}
        }
    }

    for (path, tracked_hash) in &stage.tracked {
        if stage.added.contains_key(path) || stage.removed.contains(path) {
            continue;
        }
        match tree.blob_id(path)? {
            None => unstaged.push((path.clone(), UnstagedChange::Deleted)),
            Some(hash) if &hash != tracked_hash => {
                unstaged.push((path.clone(), UnstagedChange::Modified))
            }
            Some(_) => {}
        }
    }
    unstaged.sort();

    let untracked = tree
        .files()?
        .into_iter()
        .filter(|path| !stage.is_known(path) || stage.removed.contains(path))
        .collect();

    Ok(Status {
        branches,
        current_branch,
        staged: stage.added.keys().cloned().collect(),
        removed: stage.removed.iter().cloned().collect(),
        unstaged,
        untracked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{object_id, ObjectKind, ObjectStore};
    use tempfile::tempdir;

    #[test]
    fn test_status_categories() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        let objects = ObjectStore::new(&dir.path().join(".twig/objects"));

        let mut stage = StagingArea::default();
        for (path, content) in [("same.txt", "s"), ("edited.txt", "e"), ("gone.txt", "g"), ("rm.txt", "r")] {
            stage
                .tracked
                .insert(path.into(), object_id(ObjectKind::Blob, content.as_bytes()));
        }

        tree.write("same.txt", b"s").unwrap();
        tree.write("edited.txt", b"e2").unwrap();
        tree.write("staged.txt", b"v1").unwrap();
        stage.add("staged.txt", b"v1", &objects).unwrap();
        tree.write("staged.txt", b"v2").unwrap();
        stage.remove("rm.txt").unwrap();
        tree.write("stray.txt", b"?").unwrap();

        let status = compute_status(&stage, &tree, vec!["master".into()], Some("master".into()))
            .unwrap();

        assert_eq!(status.staged, vec!["staged.txt"]);
        assert_eq!(status.removed, vec!["rm.txt"]);
        assert_eq!(
            status.unstaged,
            vec![
                ("edited.txt".to_string(), UnstagedChange::Modified),
                ("gone.txt".to_string(), UnstagedChange::Deleted),
                ("staged.txt".to_string(), UnstagedChange::Modified),
            ]
        );
        assert_eq!(status.untracked, vec!["stray.txt"]);
        assert!(!status.is_clean());
    }
}
