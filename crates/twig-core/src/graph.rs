//! Commit graph traversal.
//!
//! The DAG exists only as parent-hash lists inside commits; every edge is
//! followed by looking the hash up in the object store.

use std::collections::{HashSet, VecDeque};

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::object::{ObjectKind, ObjectStore};

/// Read-only view of the commits in an object store.
pub struct CommitGraph<'a> {
    objects: &'a ObjectStore,
}

impl<'a> CommitGraph<'a> {
    pub fn new(objects: &'a ObjectStore) -> Self {
        Self { objects }
    }

    /// Load a commit by full id.
    pub fn get_commit(&self, hash: &str) -> TwigResult<Commit> {
        self.objects.load_commit(hash)
    }

    /// Walk first parents from `start` down to the root, newest first.
    pub fn walk_first_parent(&self, start: &str) -> FirstParentWalk<'a> {
        FirstParentWalk {
            objects: self.objects,
            next: Some(start.to_string()),
        }
    }

    /// Every commit in the store, in no particular order.
    pub fn walk_all(&self) -> TwigResult<AllCommits<'a>> {
        Ok(AllCommits {
            objects: self.objects,
            hashes: self.objects.hashes()?.into_iter(),
        })
    }

    /// Ids of all commits whose message is exactly `message`.
    pub fn find(&self, message: &str) -> TwigResult<Vec<String>> {
        let mut found = Vec::new();
        for commit in self.walk_all()? {
            let commit = commit?;
            if commit.message == message {
                found.push(commit.id);
            }
        }
        Ok(found)
    }

    /// `hash` and everything reachable from it through any parent.
    pub fn ancestors(&self, hash: &str) -> TwigResult<HashSet<String>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([hash.to_string()]);

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let commit = self.get_commit(&id)?;
            queue.extend(commit.parents);
        }

        Ok(seen)
    }

    /// True if `ancestor` is reachable from `descendant` (or equal to it).
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> TwigResult<bool> {
        Ok(self.ancestors(descendant)?.contains(ancestor))
    }

    /// The lowest common ancestor of `a` and `b`.
    ///
    /// Breadth-first from `b`, parents in stored order; the first commit
    /// that is also an ancestor of `a` wins. All commits descend from the
    /// shared root, so running out of candidates means the graph is broken.
    pub fn lowest_common_ancestor(&self, a: &str, b: &str) -> TwigResult<String> {
        let a_ancestors = self.ancestors(a)?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([b.to_string()]);

        while let Some(id) = queue.pop_front() {
            if a_ancestors.contains(&id) {
                return Ok(id);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            let commit = self.get_commit(&id)?;
            queue.extend(commit.parents);
        }

        Err(TwigError::Invariant(format!(
            "commits {a} and {b} share no common ancestor"
        )))
    }
}

/// Lazy first-parent history. Stops after the first error.
pub struct FirstParentWalk<'a> {
    objects: &'a ObjectStore,
    next: Option<String>,
}

impl Iterator for FirstParentWalk<'_> {
    type Item = TwigResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.objects.load_commit(&id) {
            Ok(commit) => {
                self.next = commit.first_parent().map(String::from);
                Some(Ok(commit))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy walk over every stored commit; blobs are skipped by header.
pub struct AllCommits<'a> {
    objects: &'a ObjectStore,
    hashes: std::vec::IntoIter<String>,
}

impl Iterator for AllCommits<'_> {
    type Item = TwigResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        for hash in self.hashes.by_ref() {
            match self.objects.kind_of(&hash) {
                Ok(ObjectKind::Commit) => return Some(self.objects.load_commit(&hash)),
                Ok(ObjectKind::Blob) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    /// Store a commit whose timestamp is `seq` seconds after the epoch.
    fn commit(store: &ObjectStore, msg: &str, parents: &[&str], seq: i64) -> String {
        let ts = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(seq);
        let c = Commit::with_timestamp(
            msg.to_string(),
            ts,
            parents.iter().map(|p| p.to_string()).collect(),
            BTreeMap::new(),
        );
        store.store_commit(&c).unwrap()
    }

    fn root(store: &ObjectStore) -> String {
        store.store_commit(&Commit::root()).unwrap()
    }

    #[test]
    fn test_walk_first_parent_follows_first_parent_only() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        let a = commit(&store, "a", &[&r], 1);
        let b = commit(&store, "b", &[&r], 2);
        let m = commit(&store, "merge", &[&a, &b], 3);

        let messages: Vec<String> = graph
            .walk_first_parent(&m)
            .map(|c| c.unwrap().message)
            .collect();
        assert_eq!(messages, vec!["merge", "a", "initial commit"]);
    }

    #[test]
    fn test_walk_first_parent_missing_commit_errors() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let mut walk = graph.walk_first_parent(&"ab".repeat(32));
        assert!(walk.next().unwrap().is_err());
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_walk_all_skips_blobs() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        commit(&store, "a", &[&r], 1);
        store.store_blob(b"not a commit").unwrap();

        let all: Vec<Commit> = graph.walk_all().unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_find_by_message() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        let a = commit(&store, "same", &[&r], 1);
        let b = commit(&store, "same", &[&a], 2);
        commit(&store, "other", &[&b], 3);

        let mut found = graph.find("same").unwrap();
        found.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(found, expected);
        assert!(graph.find("missing").unwrap().is_empty());
    }

    #[test]
    fn test_ancestors_inclusive() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        let a = commit(&store, "a", &[&r], 1);
        let b = commit(&store, "b", &[&r], 2);
        let m = commit(&store, "m", &[&a, &b], 3);

        let set = graph.ancestors(&m).unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.contains(&m) && set.contains(&a) && set.contains(&b) && set.contains(&r));
        assert!(graph.is_ancestor(&b, &m).unwrap());
        assert!(!graph.is_ancestor(&m, &b).unwrap());
    }

    #[test]
    fn test_lca_branches() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        let base = commit(&store, "base", &[&r], 1);
        let left = commit(&store, "left", &[&base], 2);
        let right = commit(&store, "right", &[&base], 3);

        assert_eq!(graph.lowest_common_ancestor(&left, &right).unwrap(), base);
        assert_eq!(graph.lowest_common_ancestor(&right, &left).unwrap(), base);
        assert_eq!(graph.lowest_common_ancestor(&left, &left).unwrap(), left);
        assert_eq!(graph.lowest_common_ancestor(&left, &base).unwrap(), base);
    }

    #[test]
    fn test_lca_after_merge() {
        // r - a - c - m
        //      \     /
        //       b --+-- d
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let r = root(&store);
        let a = commit(&store, "a", &[&r], 1);
        let b = commit(&store, "b", &[&a], 2);
        let c = commit(&store, "c", &[&a], 3);
        let m = commit(&store, "m", &[&c, &b], 4);
        let d = commit(&store, "d", &[&b], 5);

        assert_eq!(graph.lowest_common_ancestor(&m, &d).unwrap(), b);
        assert_eq!(graph.lowest_common_ancestor(&d, &m).unwrap(), b);
    }

    #[test]
    fn test_lca_disjoint_is_invariant_violation() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let graph = CommitGraph::new(&store);

        let x = commit(&store, "x", &[], 1);
        let y = commit(&store, "y", &[], 2);
        assert!(matches!(
            graph.lowest_common_ancestor(&x, &y),
            Err(TwigError::Invariant(_))
        ));
    }

    proptest! {
        /// A shared trunk of `trunk` commits, then two branches forking at
        /// `fork` with `left` and `right` commits each.
        #[test]
        fn prop_lca_symmetric_and_reflexive(
            trunk in 1usize..6,
            fork_seed in 0usize..6,
            left in 0usize..5,
            right in 0usize..5,
        ) {
            let dir = tempdir().unwrap();
            let store = ObjectStore::new(dir.path());
            let graph = CommitGraph::new(&store);

            let mut seq = 0;
            let mut chain = vec![root(&store)];
            for i in 0..trunk {
                seq += 1;
                let parent = chain.last().unwrap().clone();
                chain.push(commit(&store, &format!("t{i}"), &[&parent], seq));
            }
            let fork = chain[fork_seed % chain.len()].clone();

            let grow = |n: usize, tag: &str, seq: &mut i64| {
                let mut tip = fork.clone();
                for i in 0..n {
                    *seq += 1;
                    tip = commit(&store, &format!("{tag}{i}"), &[&tip], *seq);
                }
                tip
            };
            let l = grow(left, "l", &mut seq);
            let r = grow(right, "r", &mut seq);

            let lr = graph.lowest_common_ancestor(&l, &r).unwrap();
            let rl = graph.lowest_common_ancestor(&r, &l).unwrap();
            prop_assert_eq!(&lr, &rl);
            prop_assert_eq!(&lr, &fork);
            prop_assert_eq!(graph.lowest_common_ancestor(&l, &l).unwrap(), l);
        }
    }
}
