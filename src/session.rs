//! Session-scoped auxiliary key storage at the evaluator.
//!
//! A session owns at most one key of each kind. Uploads never overwrite:
//! a concurrent pair of uploads for the same (session, kind) resolves to
//! exactly one success and one conflict. The store is the only shared
//! mutable state in the evaluator process and every transition for a given
//! entry is serialized behind the map lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::scheme::{RelinKey, RotationKeys};

/// The two kinds of auxiliary evaluation keys a session can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    /// Ciphertext-size reduction after multiplication.
    Relinearization,
    /// Galois keys for slot rotations.
    Rotation,
}

impl KeyKind {
    /// Wire name used by the HTTP protocol.
    pub fn wire_name(&self) -> &'static str {
        match self {
            KeyKind::Relinearization => "RelinKeys",
            KeyKind::Rotation => "GaloisKeys",
        }
    }

    /// Parse the wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "RelinKeys" => Some(KeyKind::Relinearization),
            "GaloisKeys" => Some(KeyKind::Rotation),
            _ => None,
        }
    }
}

/// Deserialized key material held for a session.
pub enum SessionKey {
    /// A relinearization key.
    Relinearization(RelinKey),
    /// A rotation key set.
    Rotation(RotationKeys),
}

impl SessionKey {
    /// The kind slot this key occupies.
    pub fn kind(&self) -> KeyKind {
        match self {
            SessionKey::Relinearization(_) => KeyKind::Relinearization,
            SessionKey::Rotation(_) => KeyKind::Rotation,
        }
    }
}

/// Result of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The slot was empty; the key is now stored.
    Stored,
    /// A key of this kind already exists for the session.
    Conflict,
}

/// Result of a delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The key existed and was removed.
    Deleted,
    /// No key of this kind was stored for the session.
    NotFound,
}

/// Concurrency-safe mapping (session token, key kind) -> auxiliary key.
///
/// Implementations must make the upload check-then-insert atomic; a lost
/// update or a silently overwritten key is a correctness bug, not an
/// acceptable simplification.
pub trait SessionKeyStore: Send + Sync {
    /// True iff a key of this kind is present for the session.
    fn query(&self, sid: &str, kind: KeyKind) -> bool;

    /// Store a key if the slot is empty.
    fn upload(&self, sid: &str, key: SessionKey) -> UploadOutcome;

    /// Remove a key if present.
    fn delete(&self, sid: &str, kind: KeyKind) -> DeleteOutcome;

    /// Fetch the key for evaluation.
    fn get(&self, sid: &str, kind: KeyKind) -> Option<Arc<SessionKey>>;
}

/// In-memory store behind a single mutex.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<(String, KeyKind), Arc<SessionKey>>>,
}

impl MemoryKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionKeyStore for MemoryKeyStore {
    fn query(&self, sid: &str, kind: KeyKind) -> bool {
        let entries = self.entries.lock().expect("key store lock poisoned");
        entries.contains_key(&(sid.to_string(), kind))
    }

    fn upload(&self, sid: &str, key: SessionKey) -> UploadOutcome {
        let kind = key.kind();
        let mut entries = self.entries.lock().expect("key store lock poisoned");
        match entries.entry((sid.to_string(), kind)) {
            std::collections::hash_map::Entry::Occupied(_) => UploadOutcome::Conflict,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::new(key));
                debug!(kind = kind.wire_name(), "stored session key");
                UploadOutcome::Stored
            }
        }
    }

    fn delete(&self, sid: &str, kind: KeyKind) -> DeleteOutcome {
        let mut entries = self.entries.lock().expect("key store lock poisoned");
        if entries.remove(&(sid.to_string(), kind)).is_some() {
            debug!(kind = kind.wire_name(), "deleted session key");
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        }
    }

    fn get(&self, sid: &str, kind: KeyKind) -> Option<Arc<SessionKey>> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        entries.get(&(sid.to_string(), kind)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BfvParams;
    use crate::scheme::{KeyGenerator, SchemeContext};
    use std::thread;

    fn relin_key() -> RelinKey {
        let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
        KeyGenerator::new(ctx).relin_key()
    }

    #[test]
    fn upload_query_delete_state_walk() {
        let store = MemoryKeyStore::new();
        let sid = "session-a";

        assert!(!store.query(sid, KeyKind::Relinearization));
        assert_eq!(store.delete(sid, KeyKind::Relinearization), DeleteOutcome::NotFound);

        let outcome = store.upload(sid, SessionKey::Relinearization(relin_key()));
        assert_eq!(outcome, UploadOutcome::Stored);
        assert!(store.query(sid, KeyKind::Relinearization));
        // The other kind is unaffected.
        assert!(!store.query(sid, KeyKind::Rotation));

        let outcome = store.upload(sid, SessionKey::Relinearization(relin_key()));
        assert_eq!(outcome, UploadOutcome::Conflict);

        assert_eq!(store.delete(sid, KeyKind::Relinearization), DeleteOutcome::Deleted);
        assert!(!store.query(sid, KeyKind::Relinearization));
        assert_eq!(store.delete(sid, KeyKind::Relinearization), DeleteOutcome::NotFound);
    }

    #[test]
    fn concurrent_uploads_resolve_to_one_winner() {
        let store = Arc::new(MemoryKeyStore::new());
        let key = relin_key();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                thread::spawn(move || store.upload("shared", SessionKey::Relinearization(key)))
            })
            .collect();

        let outcomes: Vec<UploadOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let stored = outcomes
            .iter()
            .filter(|&&o| o == UploadOutcome::Stored)
            .count();
        let conflicts = outcomes
            .iter()
            .filter(|&&o| o == UploadOutcome::Conflict)
            .count();
        assert_eq!((stored, conflicts), (1, 1));
        assert!(store.query("shared", KeyKind::Relinearization));
    }

    #[test]
    fn sessions_are_isolated() {
        let store = MemoryKeyStore::new();
        store.upload("a", SessionKey::Relinearization(relin_key()));
        assert!(!store.query("b", KeyKind::Relinearization));
        assert_eq!(store.delete("b", KeyKind::Relinearization), DeleteOutcome::NotFound);
    }
}
