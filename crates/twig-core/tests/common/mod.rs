use std::fs;
use std::path::Path;

use twig_core::{Commit, Repository};

pub fn write(dir: &Path, path: &str, content: &str) {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

#[allow(dead_code)]
pub fn read(dir: &Path, path: &str) -> String {
    fs::read_to_string(dir.join(path)).unwrap()
}

/// Write, stage and commit one file.
pub fn commit_file(repo: &Repository, path: &str, content: &str, msg: &str) -> Commit {
    write(repo.root(), path, content);
    repo.add(path).unwrap();
    repo.commit(msg).unwrap()
}
