//! Repository — the main entry point for twig operations.
//!
//! A Repository ties together the object store, commit graph, staging area,
//! refs and working copy. It holds no cached state: HEAD and the index are
//! read from disk by each operation, and every mutating operation holds the
//! repository lock from its first read to its last write.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::commit::Commit;
use crate::config::RepoConfig;
use crate::error::{TwigError, TwigResult};
use crate::graph::{AllCommits, CommitGraph, FirstParentWalk};
use crate::index::{Removal, StagingArea};
use crate::lock::RepoLock;
use crate::merge::{self, MergeAction, MergeOutcome};
use crate::object::{ObjectKind, ObjectStore};
use crate::refs::{Head, RefStore};
use crate::status::{self, Status};
use crate::worktree::{WorkTree, TWIG_DIR};

/// A twig repository.
pub struct Repository {
    /// Path to the `.twig/` directory.
    twig_dir: PathBuf,
    config: RepoConfig,
    objects: ObjectStore,
    refs: RefStore,
    tree: WorkTree,
}

impl Repository {
    /// Initialize a new repository in `root` with default settings.
    pub fn init(root: &Path) -> TwigResult<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Initialize a new repository in `root`.
    ///
    /// Creates `.twig/`, stores the shared root commit, points the default
    /// branch at it and checks that branch out.
    pub fn init_with_config(root: &Path, config: RepoConfig) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if twig_dir.exists() {
            return Err(TwigError::AlreadyExists);
        }
        crate::refs::validate_branch_name(&config.default_branch)?;

        fs::create_dir_all(twig_dir.join("objects"))?;
        fs::create_dir_all(twig_dir.join("refs").join("heads"))?;
        config.save(&twig_dir.join("config.json"))?;

        let objects = ObjectStore::new(&twig_dir.join("objects"));
        let root_commit = Commit::root();
        objects.store_commit(&root_commit)?;

        let refs = RefStore::new(&twig_dir);
        refs.set_branch(&config.default_branch, &root_commit.id)?;
        refs.write_head(&Head::Branch(config.default_branch.clone()))?;
        StagingArea::default().save(&twig_dir.join("index.json"))?;

        info!(root = %root.display(), branch = %config.default_branch, "initialized repository");
        Self::open(root)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if !twig_dir.is_dir() {
            return Err(TwigError::NotARepo);
        }

        let config = RepoConfig::load(&twig_dir.join("config.json"))?;
        Ok(Self {
            objects: ObjectStore::new(&twig_dir.join("objects")),
            refs: RefStore::new(&twig_dir),
            tree: WorkTree::new(root),
            config,
            twig_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn graph(&self) -> CommitGraph<'_> {
        CommitGraph::new(&self.objects)
    }

    /// Acquire an exclusive lock on the repository.
    fn lock(&self) -> TwigResult<RepoLock> {
        RepoLock::acquire(&self.twig_dir, self.config.lock_timeout())
    }

    // --- HEAD and staging ---

    pub fn head(&self) -> TwigResult<Head> {
        self.refs.read_head()
    }

    /// The checked-out branch, or `None` when HEAD is detached.
    pub fn current_branch(&self) -> TwigResult<Option<String>> {
        self.refs.current_branch()
    }

    /// The commit HEAD resolves to.
    pub fn head_commit(&self) -> TwigResult<Commit> {
        self.refs.resolve_head(&self.graph())
    }

    /// The staging area on top of HEAD's snapshot.
    pub fn staging_area(&self) -> TwigResult<StagingArea> {
        let head = self.head_commit()?;
        self.load_stage(&head)
    }

    fn load_stage(&self, head: &Commit) -> TwigResult<StagingArea> {
        StagingArea::load(&self.index_path(), head.tracked.clone())
    }

    fn save_stage(&self, stage: &StagingArea) -> TwigResult<()> {
        stage.save(&self.index_path())
    }

    fn index_path(&self) -> PathBuf {
        self.twig_dir.join("index.json")
    }

    // --- Staging ---

    /// Stage the working copy of `path`. Returns whether the index changed.
    pub fn add(&self, path: &str) -> TwigResult<bool> {
        let path = WorkTree::normalize(path)?;
        let _lock = self.lock()?;
        let content = self.tree.read(&path)?;
        let mut stage = self.staging_area()?;

        let changed = stage.add(&path, &content, &self.objects)?;
        if changed {
            self.save_stage(&stage)?;
        }
        Ok(changed)
    }

    /// Unstage `path`, or stage it for removal and delete the working file.
    pub fn remove(&self, path: &str) -> TwigResult<Removal> {
        let path = WorkTree::normalize(path)?;
        let _lock = self.lock()?;
        let mut stage = self.staging_area()?;

        let removal = stage.remove(&path)?;
        self.save_stage(&stage)?;
        if removal == Removal::Staged {
            self.tree.remove(&path)?;
        }
        Ok(removal)
    }

    /// Record the staged changes as a new commit on HEAD.
    pub fn commit(&self, message: &str) -> TwigResult<Commit> {
        if message.trim().is_empty() {
            return Err(TwigError::EmptyMessage);
        }
        let _lock = self.lock()?;
        let head = self.head_commit()?;
        let mut stage = self.load_stage(&head)?;
        if stage.is_clean() {
            return Err(TwigError::NothingToCommit);
        }

        self.commit_stage(message.to_string(), vec![head.id], &mut stage)
    }

    /// Write a commit from `stage`, advance HEAD and clear the index.
    fn commit_stage(
        &self,
        message: String,
        parents: Vec<String>,
        stage: &mut StagingArea,
    ) -> TwigResult<Commit> {
        let commit = Commit::new(message, parents, stage.compute_new_tracked());
        self.objects.store_commit(&commit)?;
        self.refs.advance_head(&commit.id)?;
        stage.reset(commit.tracked.clone());
        self.save_stage(stage)?;

        info!(commit = %commit.id, files = commit.tracked.len(), "created commit");
        Ok(commit)
    }

    // --- History ---

    /// First-parent history from HEAD, newest first.
    pub fn history(&self) -> TwigResult<FirstParentWalk<'_>> {
        let head = self.refs.head_commit_id()?;
        Ok(self.graph().walk_first_parent(&head))
    }

    /// Collected first-parent history from HEAD.
    pub fn log(&self) -> TwigResult<Vec<Commit>> {
        self.history()?.collect()
    }

    /// Every commit ever made, in no particular order.
    pub fn all_commits(&self) -> TwigResult<AllCommits<'_>> {
        self.graph().walk_all()
    }

    /// Collected [`Repository::all_commits`].
    pub fn global_log(&self) -> TwigResult<Vec<Commit>> {
        self.all_commits()?.collect()
    }

    /// Ids of commits with exactly this message.
    pub fn find(&self, message: &str) -> TwigResult<Vec<String>> {
        let found = self.graph().find(message)?;
        if found.is_empty() {
            return Err(TwigError::NoCommitWithMessage);
        }
        Ok(found)
    }

    /// Resolve a full or abbreviated commit id.
    pub fn resolve_commit(&self, id: &str) -> TwigResult<String> {
        match self.objects.resolve_prefix(id, ObjectKind::Commit) {
            Err(TwigError::ObjectNotFound(_)) => Err(TwigError::NoSuchCommit(id.to_string())),
            other => other,
        }
    }

    pub fn status(&self) -> TwigResult<Status> {
        let stage = self.staging_area()?;
        status::compute_status(
            &stage,
            &self.tree,
            self.refs.branches()?,
            self.refs.current_branch()?,
        )
    }

    // --- Checkout and reset ---

    /// Restore `path` from HEAD into the working copy, without staging.
    pub fn checkout_file(&self, path: &str) -> TwigResult<()> {
        let head = self.head_commit()?;
        self.checkout_file_from(&head, path)
    }

    /// Restore `path` as of `commit_id` into the working copy, without staging.
    pub fn checkout_file_at(&self, commit_id: &str, path: &str) -> TwigResult<()> {
        let id = self.resolve_commit(commit_id)?;
        let commit = self.graph().get_commit(&id)?;
        self.checkout_file_from(&commit, path)
    }

    fn checkout_file_from(&self, commit: &Commit, path: &str) -> TwigResult<()> {
        let path = WorkTree::normalize(path)?;
        let _lock = self.lock()?;
        let blob = commit
            .blob(&path)
            .ok_or_else(|| TwigError::FileNotInCommit(path.clone()))?;
        let content = self.objects.load_blob(blob)?;
        self.tree.write(&path, &content)?;
        debug!(path = %path, commit = %commit.id, "checked out file");
        Ok(())
    }

    /// Switch to `branch`, replacing the working copy with its snapshot.
    pub fn checkout_branch(&self, branch: &str) -> TwigResult<()> {
        let _lock = self.lock()?;
        let target_id = self
            .refs
            .read_branch(branch)?
            .ok_or_else(|| TwigError::NoSuchBranch(branch.to_string()))?;
        if self.refs.current_branch()?.as_deref() == Some(branch) {
            return Err(TwigError::AlreadyOnBranch);
        }

        let target = self.graph().get_commit(&target_id)?;
        self.switch_snapshot(&target)?;
        self.refs.write_head(&Head::Branch(branch.to_string()))?;
        info!(branch, commit = %target.id, "switched branch");
        Ok(())
    }

    /// Detach HEAD at `commit_id`, replacing the working copy.
    pub fn checkout_detached(&self, commit_id: &str) -> TwigResult<()> {
        let _lock = self.lock()?;
        let id = self.resolve_commit(commit_id)?;
        let target = self.graph().get_commit(&id)?;

        self.switch_snapshot(&target)?;
        self.refs.write_head(&Head::Detached(target.id.clone()))?;
        info!(commit = %target.id, "detached HEAD");
        Ok(())
    }

    /// Move the current branch (or detached HEAD) to `commit_id` and
    /// replace the working copy with that commit's snapshot.
    pub fn reset(&self, commit_id: &str) -> TwigResult<Commit> {
        let _lock = self.lock()?;
        let id = self.resolve_commit(commit_id)?;
        let target = self.graph().get_commit(&id)?;

        self.switch_snapshot(&target)?;
        self.refs.advance_head(&target.id)?;
        info!(commit = %target.id, "reset");
        Ok(target)
    }

    /// Replace the working copy and index with `target`'s snapshot.
    ///
    /// Checks for untracked files first; refs are left to the caller.
    fn switch_snapshot(&self, target: &Commit) -> TwigResult<()> {
        let head = self.head_commit()?;
        let mut stage = self.load_stage(&head)?;
        self.replace_worktree(&stage, &head, target)?;
        stage.reset(target.tracked.clone());
        self.save_stage(&stage)
    }

    /// Fail if any untracked working file would be overwritten.
    ///
    /// `touched` yields each path the operation writes, with the blob it
    /// writes (`None` for a deletion). An untracked file that already holds
    /// exactly that blob is not in the way.
    fn check_untracked<'p>(
        &self,
        stage: &StagingArea,
        touched: impl IntoIterator<Item = (&'p str, Option<&'p str>)>,
    ) -> TwigResult<()> {
        for (path, incoming) in touched {
            if stage.is_known(path) {
                continue;
            }
            let Some(on_disk) = self.tree.blob_id(path)? else {
                continue;
            };
            if incoming != Some(on_disk.as_str()) {
                return Err(TwigError::UntrackedFileInTheWay(path.to_string()));
            }
        }
        Ok(())
    }

    /// Fail if writing any of `writes` would collide with the layout left
    /// after `removes` are deleted: a directory still holding files where a
    /// file goes, or a file where a parent directory goes.
    fn check_layout<'p>(
        &self,
        writes: impl IntoIterator<Item = &'p str>,
        removes: &BTreeSet<&str>,
    ) -> TwigResult<()> {
        for path in writes {
            if let Some(blocker) = self
                .tree
                .files_under(path)?
                .into_iter()
                .find(|f| !removes.contains(f.as_str()))
            {
                return Err(TwigError::UntrackedFileInTheWay(blocker));
            }
            let mut prefix = path;
            while let Some((parent, _)) = prefix.rsplit_once('/') {
                if self.tree.exists(parent) && !removes.contains(parent) {
                    return Err(TwigError::UntrackedFileInTheWay(parent.to_string()));
                }
                prefix = parent;
            }
        }
        Ok(())
    }

    /// Make the working copy match `target`, coming from `current`.
    ///
    /// Deletes files `current` tracks that `target` does not, then writes
    /// `target`'s files. Untracked files are left alone, and every check runs
    /// before the first change.
    fn replace_worktree(
        &self,
        stage: &StagingArea,
        current: &Commit,
        target: &Commit,
    ) -> TwigResult<()> {
        self.check_untracked(
            stage,
            target.tracked.iter().map(|(p, h)| (p.as_str(), Some(h.as_str()))),
        )?;
        let removes: BTreeSet<&str> = current
            .tracked
            .keys()
            .filter(|path| !target.tracked.contains_key(*path))
            .map(String::as_str)
            .collect();
        self.check_layout(target.tracked.keys().map(String::as_str), &removes)?;

        for path in &removes {
            self.tree.remove(path)?;
        }
        for (path, hash) in &target.tracked {
            if self.tree.blob_id(path)?.as_deref() != Some(hash.as_str()) {
                self.tree.write(path, &self.objects.load_blob(hash)?)?;
            }
        }
        Ok(())
    }

    // --- Branches ---

    /// Create `name` pointing at HEAD's commit.
    pub fn create_branch(&self, name: &str) -> TwigResult<()> {
        let _lock = self.lock()?;
        let head = self.refs.head_commit_id()?;
        self.refs.create_branch(name, &head)?;
        info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    pub fn delete_branch(&self, name: &str) -> TwigResult<()> {
        let _lock = self.lock()?;
        self.refs.delete_branch(name)
    }

    pub fn branches(&self) -> TwigResult<Vec<String>> {
        self.refs.branches()
    }

    // --- Merge ---

    /// Merge branch `other_branch` into the current branch.
    pub fn merge(&self, other_branch: &str) -> TwigResult<MergeOutcome> {
        let _lock = self.lock()?;
        let current_branch = self.refs.current_branch()?.ok_or(TwigError::DetachedHead)?;
        let head = self.head_commit()?;
        let mut stage = self.load_stage(&head)?;

        if !stage.is_clean() {
            return Err(TwigError::UncommittedChanges);
        }
        let other_id = self
            .refs
            .read_branch(other_branch)?
            .ok_or_else(|| TwigError::BranchNotFound(other_branch.to_string()))?;
        if other_branch == current_branch {
            return Err(TwigError::MergeWithSelf);
        }

        let graph = self.graph();
        let other = graph.get_commit(&other_id)?;
        let split_id = graph.lowest_common_ancestor(&head.id, &other.id)?;
        debug!(head = %head.id, other = %other.id, split = %split_id, "merge base");

        if split_id == other.id {
            return Ok(MergeOutcome::AlreadyMerged);
        }
        if split_id == head.id {
            self.replace_worktree(&stage, &head, &other)?;
            self.refs.set_branch(&current_branch, &other.id)?;
            stage.reset(other.tracked.clone());
            self.save_stage(&stage)?;
            info!(branch = %current_branch, commit = %other.id, "fast-forwarded");
            return Ok(MergeOutcome::FastForward { commit: other.id });
        }

        let split = graph.get_commit(&split_id)?;
        let plan = merge::plan(&split, &head, &other);

        // Every path the merge writes or deletes must be clear, and every
        // new file built, before the first change lands.
        for (path, action) in &plan {
            if action.touches_worktree() && !stage.is_known(path) && self.tree.exists(path) {
                return Err(TwigError::UntrackedFileInTheWay(path.clone()));
            }
        }
        let removes: BTreeSet<&str> = plan
            .iter()
            .filter(|(_, action)| **action == MergeAction::Remove)
            .map(|(path, _)| path.as_str())
            .collect();
        let mut writes = Vec::new();
        let mut conflicts = Vec::new();
        for (path, action) in &plan {
            match action {
                MergeAction::TakeOther(hash) => {
                    writes.push((path.as_str(), self.objects.load_blob(hash)?));
                }
                MergeAction::Conflict => {
                    let content = merge::conflict_content(
                        &self.blob_text(head.blob(path))?,
                        &self.blob_text(other.blob(path))?,
                    );
                    writes.push((path.as_str(), content.into_bytes()));
                    conflicts.push(path.clone());
                }
                MergeAction::Keep | MergeAction::Remove => {}
            }
        }
        self.check_layout(writes.iter().map(|(path, _)| *path), &removes)?;

        for path in &removes {
            stage.remove(path)?;
            self.tree.remove(path)?;
        }
        for (path, content) in &writes {
            self.tree.write(path, content)?;
            stage.add(path, content, &self.objects)?;
        }
        for path in &conflicts {
            warn!(path = %path, "merge conflict");
        }

        let message = format!("Merged {other_branch} into {current_branch}.");
        let commit = self.commit_stage(message, vec![head.id.clone(), other.id.clone()], &mut stage)?;
        Ok(MergeOutcome::Merged {
            commit: commit.id,
            conflicts,
        })
    }

    /// Blob content as text, or empty for an absent path.
    fn blob_text(&self, hash: Option<&str>) -> TwigResult<String> {
        match hash {
            Some(hash) => Ok(String::from_utf8_lossy(&self.objects.load_blob(hash)?).into_owned()),
            None => Ok(String::new()),
        }
    }
}
