//! Content-addressable object store.
//!
//! Objects are stored in `.twig/objects/` using a 2-character prefix
//! directory scheme. Every object file starts with a small header naming
//! its kind and payload length (`"commit 213\0"`), followed by the payload.
//! The object's id is the SHA-256 of header and payload together, so a blob
//! and a commit with identical payloads never collide.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;
use crate::hash::{hash_parts, is_hex, HASH_HEX_LEN};

/// Shortest abbreviated id accepted by [`ObjectStore::resolve_prefix`].
pub const MIN_PREFIX_LEN: usize = 4;

/// Type discriminant persisted in each object's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Commit,
}

impl ObjectKind {
    pub fn tag(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Commit => "commit",
        }
    }

    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"blob" => Some(ObjectKind::Blob),
            b"commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

/// A decoded object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Blob(Vec<u8>),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }
}

fn header(kind: ObjectKind, payload_len: usize) -> Vec<u8> {
    format!("{} {}\0", kind.tag(), payload_len).into_bytes()
}

/// Compute the id an object would have, without storing it.
pub fn object_id(kind: ObjectKind, payload: &[u8]) -> String {
    hash_parts(&[&header(kind, payload.len()), payload])
}

/// Parse `"<tag> <len>"` (without the trailing NUL).
fn parse_header(raw: &[u8]) -> Option<(ObjectKind, usize)> {
    let space = raw.iter().position(|&b| b == b' ')?;
    let kind = ObjectKind::from_tag(&raw[..space])?;
    let len = std::str::from_utf8(&raw[space + 1..]).ok()?.parse().ok()?;
    Some((kind, len))
}

/// The object store manages content-addressable storage on disk.
pub struct ObjectStore {
    /// Root path: `.twig/objects/`
    root: PathBuf,
}

impl ObjectStore {
    /// Create a new ObjectStore rooted at the given path.
    pub fn new(objects_dir: &Path) -> Self {
        Self {
            root: objects_dir.to_path_buf(),
        }
    }

    /// Store a payload of the given kind and return its id.
    ///
    /// If the object already exists this is a no-op that returns the
    /// existing id.
    pub fn store(&self, kind: ObjectKind, payload: &[u8]) -> TwigResult<String> {
        let head = header(kind, payload.len());
        let hash = hash_parts(&[&head, payload]);
        let path = self.object_path(&hash);

        if path.exists() {
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut data = head;
        data.extend_from_slice(payload);
        atomic_write(&path, &data)?;
        debug!(hash = %hash, kind = kind.tag(), size = payload.len(), "stored object");
        Ok(hash)
    }

    /// Store file content as a blob.
    pub fn store_blob(&self, content: &[u8]) -> TwigResult<String> {
        self.store(ObjectKind::Blob, content)
    }

    /// Persist a commit. Its id must already match its encoded form.
    pub fn store_commit(&self, commit: &Commit) -> TwigResult<String> {
        let hash = self.store(ObjectKind::Commit, &commit.payload())?;
        if hash != commit.id {
            return Err(TwigError::Invariant(format!(
                "commit id {} does not match its content hash {hash}",
                commit.id
            )));
        }
        Ok(hash)
    }

    /// Load and decode an object, checking that it is of `expected` kind.
    pub fn load(&self, hash: &str, expected: ObjectKind) -> TwigResult<Object> {
        let (kind, payload) = self.read_raw(hash)?;
        if kind != expected {
            return Err(TwigError::TypeMismatch {
                hash: hash.to_string(),
                expected: expected.tag(),
                found: kind.tag(),
            });
        }
        match kind {
            ObjectKind::Blob => Ok(Object::Blob(payload)),
            ObjectKind::Commit => Ok(Object::Commit(Commit::from_payload(hash, &payload)?)),
        }
    }

    /// Load a blob's content.
    pub fn load_blob(&self, hash: &str) -> TwigResult<Vec<u8>> {
        match self.load(hash, ObjectKind::Blob)? {
            Object::Blob(content) => Ok(content),
            Object::Commit(_) => unreachable!("load() checked the kind"),
        }
    }

    /// Load a commit.
    pub fn load_commit(&self, hash: &str) -> TwigResult<Commit> {
        match self.load(hash, ObjectKind::Commit)? {
            Object::Commit(commit) => Ok(commit),
            Object::Blob(_) => unreachable!("load() checked the kind"),
        }
    }

    /// Check if an object exists.
    pub fn exists(&self, hash: &str) -> bool {
        Self::is_full_hash(hash) && self.object_path(hash).exists()
    }

    /// Read only the header of an object to learn its kind.
    pub fn kind_of(&self, hash: &str) -> TwigResult<ObjectKind> {
        if !self.exists(hash) {
            return Err(TwigError::ObjectNotFound(hash.to_string()));
        }
        let mut reader = BufReader::new(File::open(self.object_path(hash))?);
        let mut raw = Vec::new();
        reader.read_until(0, &mut raw)?;
        if raw.pop() != Some(0) {
            return Err(Self::corrupt(hash, "missing header terminator"));
        }
        parse_header(&raw)
            .map(|(kind, _)| kind)
            .ok_or_else(|| Self::corrupt(hash, "malformed header"))
    }

    /// Every stored object id, sorted.
    pub fn hashes(&self) -> TwigResult<Vec<String>> {
        let mut out = Vec::new();
        if !self.root.exists() {
            return Ok(out);
        }
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().to_string();
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let hash = format!("{prefix}{}", entry.file_name().to_string_lossy());
                if Self::is_full_hash(&hash) {
                    out.push(hash);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Resolve an abbreviated id to the single object of `kind` it names.
    ///
    /// Returns `ObjectNotFound` when nothing of that kind matches.
    pub fn resolve_prefix(&self, prefix: &str, kind: ObjectKind) -> TwigResult<String> {
        if prefix.len() < MIN_PREFIX_LEN || prefix.len() > HASH_HEX_LEN || !is_hex(prefix) {
            return Err(TwigError::ObjectNotFound(prefix.to_string()));
        }
        if prefix.len() == HASH_HEX_LEN {
            return match self.kind_of(prefix) {
                Ok(found) if found == kind => Ok(prefix.to_string()),
                Ok(_) | Err(TwigError::ObjectNotFound(_)) => {
                    Err(TwigError::ObjectNotFound(prefix.to_string()))
                }
                Err(e) => Err(e),
            };
        }

        let shard = self.root.join(&prefix[..2]);
        if !shard.exists() {
            return Err(TwigError::ObjectNotFound(prefix.to_string()));
        }
        let rest = &prefix[2..];
        let mut matches = Vec::new();
        for entry in fs::read_dir(&shard)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name.starts_with(rest) {
                let hash = format!("{}{name}", &prefix[..2]);
                if Self::is_full_hash(&hash) && self.kind_of(&hash)? == kind {
                    matches.push(hash);
                }
            }
        }

        match matches.len() {
            0 => Err(TwigError::ObjectNotFound(prefix.to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(TwigError::AmbiguousId {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }

    /// Read an object file, verify its header and hash, return the payload.
    fn read_raw(&self, hash: &str) -> TwigResult<(ObjectKind, Vec<u8>)> {
        if !self.exists(hash) {
            return Err(TwigError::ObjectNotFound(hash.to_string()));
        }
        let mut data = fs::read(self.object_path(hash))?;

        let nul = data
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Self::corrupt(hash, "missing header terminator"))?;
        let (kind, len) =
            parse_header(&data[..nul]).ok_or_else(|| Self::corrupt(hash, "malformed header"))?;
        if data.len() - nul - 1 != len {
            return Err(Self::corrupt(hash, "payload length does not match header"));
        }
        if crate::hash::hash_bytes(&data) != hash {
            return Err(Self::corrupt(hash, "content does not match its hash"));
        }

        let payload = data.split_off(nul + 1);
        Ok((kind, payload))
    }

    fn corrupt(hash: &str, reason: &str) -> TwigError {
        TwigError::CorruptObject {
            hash: hash.to_string(),
            reason: reason.to_string(),
        }
    }

    fn is_full_hash(hash: &str) -> bool {
        hash.len() == HASH_HEX_LEN && is_hex(hash)
    }

    /// Get the filesystem path for an object hash.
    ///
    /// Uses 2-char prefix directories: hash `abcdef...` -> `ab/cdef...`
    fn object_path(&self, hash: &str) -> PathBuf {
        let (prefix, rest) = hash.split_at(2);
        self.root.join(prefix).join(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_and_load_blob() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let hash = store.store_blob(b"hello world").unwrap();
        assert_eq!(store.load_blob(&hash).unwrap(), b"hello world");
    }

    #[test]
    fn test_store_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let h1 = store.store_blob(b"same content").unwrap();
        let h2 = store.store_blob(b"same content").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.hashes().unwrap(), vec![h1]);
    }

    #[test]
    fn test_sharded_layout() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let hash = store.store_blob(b"x").unwrap();
        assert!(dir.path().join(&hash[..2]).join(&hash[2..]).is_file());
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let missing = "ab".repeat(32);
        assert!(matches!(
            store.load(&missing, ObjectKind::Blob),
            Err(TwigError::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.load("deadbeef", ObjectKind::Blob),
            Err(TwigError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let root = Commit::root();
        store.store_commit(&root).unwrap();
        let blob = store.store_blob(b"data").unwrap();

        assert!(matches!(
            store.load(&root.id, ObjectKind::Blob),
            Err(TwigError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.load(&blob, ObjectKind::Commit),
            Err(TwigError::TypeMismatch { .. })
        ));
        assert_eq!(store.load_commit(&root.id).unwrap(), root);
    }

    #[test]
    fn test_same_payload_different_kind_differs() {
        assert_ne!(
            object_id(ObjectKind::Blob, b"{}"),
            object_id(ObjectKind::Commit, b"{}")
        );
    }

    #[test]
    fn test_tampered_object_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let hash = store.store_blob(b"original").unwrap();
        let path = dir.path().join(&hash[..2]).join(&hash[2..]);
        fs::write(&path, b"blob 8\0tampered").unwrap();

        assert!(matches!(
            store.load_blob(&hash),
            Err(TwigError::CorruptObject { .. })
        ));
    }

    #[test]
    fn test_exists() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let hash = store.store_blob(b"test").unwrap();
        assert!(store.exists(&hash));
        assert!(!store.exists("nonexistent"));
        assert_eq!(store.kind_of(&hash).unwrap(), ObjectKind::Blob);
    }

    #[test]
    fn test_resolve_prefix() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let root = Commit::root();
        store.store_commit(&root).unwrap();
        let blob = store.store_blob(b"blob").unwrap();

        assert_eq!(
            store.resolve_prefix(&root.id[..8], ObjectKind::Commit).unwrap(),
            root.id
        );
        assert_eq!(
            store.resolve_prefix(&root.id, ObjectKind::Commit).unwrap(),
            root.id
        );
        assert!(matches!(
            store.resolve_prefix(&blob[..8], ObjectKind::Commit),
            Err(TwigError::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.resolve_prefix("abc", ObjectKind::Commit),
            Err(TwigError::ObjectNotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_blob_round_trip(content in proptest::collection::vec(any::<u8>(), 0..512)) {
            let dir = tempdir().unwrap();
            let store = ObjectStore::new(dir.path());

            let h1 = store.store_blob(&content).unwrap();
            let h2 = store.store_blob(&content).unwrap();
            prop_assert_eq!(&h1, &h2);
            prop_assert_eq!(store.load_blob(&h1).unwrap(), content);
        }
    }
}
