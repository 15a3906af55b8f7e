//! Working-copy file access.
//!
//! Paths handed to the core are repository-relative, `/`-separated and
//! normalized by [`WorkTree::normalize`]; nothing here ever reaches outside
//! the root or into `.twig/`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{TwigError, TwigResult};
use crate::object::{object_id, ObjectKind};

/// Name of the metadata directory at the root of the working copy.
pub const TWIG_DIR: &str = ".twig";

pub struct WorkTree {
    root: PathBuf,
}

impl WorkTree {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Turn user input into a canonical relative path (`./a//b` -> `a/b`).
    ///
    /// Rejects absolute paths, `..` components and anything under `.twig`.
    pub fn normalize(rel_path: &str) -> TwigResult<String> {
        let mut parts = Vec::new();
        for component in Path::new(rel_path).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(TwigError::PathTraversal(rel_path.to_string()));
                }
            }
        }
        if parts.is_empty() || parts[0] == TWIG_DIR {
            return Err(TwigError::PathTraversal(rel_path.to_string()));
        }
        Ok(parts.join("/"))
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.root.join(rel_path).is_file()
    }

    pub fn read(&self, rel_path: &str) -> TwigResult<Vec<u8>> {
        let path = self.root.join(rel_path);
        if !path.is_file() {
            return Err(TwigError::FileNotFound(rel_path.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Blob id of the working file, or `None` if it does not exist.
    pub fn blob_id(&self, rel_path: &str) -> TwigResult<Option<String>> {
        if !self.exists(rel_path) {
            return Ok(None);
        }
        Ok(Some(object_id(ObjectKind::Blob, &self.read(rel_path)?)))
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, rel_path: &str, content: &[u8]) -> TwigResult<()> {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Delete a file if present and prune directories it leaves empty.
    pub fn remove(&self, rel_path: &str) -> TwigResult<bool> {
        let path = self.root.join(rel_path);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        if let Some(parent) = path.parent() {
            let _ = self.remove_empty_dirs(parent);
        }
        Ok(true)
    }

    /// Every regular file in the working copy outside `.twig/`, sorted.
    pub fn files(&self) -> TwigResult<Vec<String>> {
        self.walk(&self.root)
    }

    /// Files below the directory `rel_path`, sorted. Empty if `rel_path` is
    /// not a directory.
    pub fn files_under(&self, rel_path: &str) -> TwigResult<Vec<String>> {
        let dir = self.root.join(rel_path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        self.walk(&dir)
    }

    fn walk(&self, dir: &Path) -> TwigResult<Vec<String>> {
        let metadata_dir = self.root.join(TWIG_DIR);
        let mut out = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.path() != metadata_dir)
        {
            let entry = entry.map_err(|e| {
                TwigError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        out.sort();
        Ok(out)
    }

    /// Remove empty directories walking up from `dir` to the root (exclusive).
    fn remove_empty_dirs(&self, dir: &Path) -> std::io::Result<()> {
        let mut current = dir.to_path_buf();
        while current != self.root {
            if fs::read_dir(&current)?.next().is_none() {
                fs::remove_dir(&current)?;
            } else {
                break;
            }
            match current.parent() {
                Some(p) => current = p.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }
}
