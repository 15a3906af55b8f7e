//! Commits: immutable snapshots of the tracked file set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TwigError, TwigResult};
use crate::object::{object_id, ObjectKind};

/// Message of the root commit every repository starts from.
pub const ROOT_MESSAGE: &str = "initial commit";

/// A commit.
///
/// `id` is not part of the serialized form: it is the hash of everything
/// else, computed once at construction and recovered from the object name
/// at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    #[serde(skip)]
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Parent commit ids. Empty for the root, two for a merge.
    pub parents: Vec<String>,
    /// Full snapshot: path -> blob hash.
    pub tracked: BTreeMap<String, String>,
}

impl Commit {
    /// Create a commit stamped with the current time.
    pub fn new(message: String, parents: Vec<String>, tracked: BTreeMap<String, String>) -> Self {
        Self::with_timestamp(message, Utc::now(), parents, tracked)
    }

    /// Create a commit with an explicit timestamp and compute its id.
    pub fn with_timestamp(
        message: String,
        timestamp: DateTime<Utc>,
        parents: Vec<String>,
        tracked: BTreeMap<String, String>,
    ) -> Self {
        let mut commit = Commit {
            id: String::new(),
            message,
            timestamp,
            parents,
            tracked,
        };
        commit.id = object_id(ObjectKind::Commit, &commit.payload());
        commit
    }

    /// The shared root commit: epoch timestamp, no parents, nothing tracked.
    ///
    /// Every input is fixed, so the root has the same id in every repository.
    pub fn root() -> Self {
        Self::with_timestamp(
            ROOT_MESSAGE.to_string(),
            DateTime::<Utc>::UNIX_EPOCH,
            Vec::new(),
            BTreeMap::new(),
        )
    }

    /// Canonical encoded form stored in the object store.
    pub fn payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("commit serialization should not fail")
    }

    pub(crate) fn from_payload(id: &str, payload: &[u8]) -> TwigResult<Self> {
        let mut commit: Commit =
            serde_json::from_slice(payload).map_err(|e| TwigError::CorruptObject {
                hash: id.to_string(),
                reason: format!("undecodable commit: {e}"),
            })?;
        commit.id = id.to_string();
        Ok(commit)
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Blob hash tracked at `path`, if any.
    pub fn blob(&self, path: &str) -> Option<&str> {
        self.tracked.get(path).map(String::as_str)
    }

    /// First 7 hex characters of the id.
    pub fn short_id(&self) -> &str {
        &self.id[..7.min(self.id.len())]
    }
}
