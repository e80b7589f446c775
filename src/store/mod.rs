// src/store/mod.rs

//! Versioned key/value store with a Merkle root per committed version.
//!
//! The live tree is mutated only through [`KvStore::set`] / [`KvStore::remove`]
//! and becomes visible to readers of older versions only after
//! [`KvStore::commit`]. Each commit freezes the tree into an immutable
//! [`Version`] shared by `Arc`, so check views opened at a version never
//! observe later writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::crypto::{leaf_hash, merkle_root};
use crate::error::{CodecError, StoreError};
use crate::types::Hash;

pub mod keys;

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// Minimal contract of the persistent store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn remove(&mut self, key: &[u8]);
    fn commit(&mut self) -> (Hash, u64);
    /// Key/value pairs under `prefix`, ascending key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// An immutable committed version of the tree.
#[derive(Debug)]
pub struct Version {
    version: u64,
    root: Hash,
    data: Tree,
}

impl Version {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    pub fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        range_prefix(&self.data, prefix)
    }
}

fn range_prefix(tree: &Tree, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    tree.range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub struct MerkleStore {
    working: Tree,
    leaves: BTreeMap<Vec<u8>, Hash>,
    versions: BTreeMap<u64, Arc<Version>>,
    version: u64,
    keep_last: u64,
}

impl MerkleStore {
    /// `keep_last == 0` keeps every version.
    pub fn new(keep_last: u64) -> Self {
        let genesis = Arc::new(Version { version: 0, root: merkle_root(&[]), data: Tree::new() });
        let mut versions = BTreeMap::new();
        versions.insert(0, genesis);
        Self { working: Tree::new(), leaves: BTreeMap::new(), versions, version: 0, keep_last }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn latest(&self) -> Arc<Version> {
        // the current version is never pruned
        self.versions
            .get(&self.version)
            .cloned()
            .unwrap_or_else(|| Arc::new(Version { version: self.version, root: merkle_root(&[]), data: Tree::new() }))
    }

    pub fn at_version(&self, version: u64) -> Result<Arc<Version>, StoreError> {
        self.versions.get(&version).cloned().ok_or(StoreError::VersionNotFound(version))
    }

    pub fn available_versions(&self) -> Vec<u64> {
        self.versions.keys().copied().collect()
    }

    fn prune(&mut self) {
        if self.keep_last == 0 || self.version < self.keep_last {
            return;
        }
        let oldest_kept = self.version - self.keep_last + 1;
        let stale: Vec<u64> = self.versions.range(..oldest_kept).map(|(v, _)| *v).collect();
        for v in stale {
            self.versions.remove(&v);
            debug!(version = v, "pruned store version");
        }
    }
}

impl KvStore for MerkleStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.working.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.leaves.insert(key.clone(), leaf_hash(&key, &value));
        self.working.insert(key, value);
    }

    fn remove(&mut self, key: &[u8]) {
        self.leaves.remove(key);
        self.working.remove(key);
    }

    fn commit(&mut self) -> (Hash, u64) {
        let leaves: Vec<Hash> = self.leaves.values().copied().collect();
        let root = merkle_root(&leaves);
        self.version += 1;
        let snapshot = Arc::new(Version { version: self.version, root, data: self.working.clone() });
        self.versions.insert(self.version, snapshot);
        self.prune();
        (root, self.version)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        range_prefix(&self.working, prefix)
    }
}

/// Handle used by the state layer: either the live store (deliver) or a
/// frozen version (check). Cloning is cheap.
#[derive(Clone)]
pub enum StoreView {
    Live(Arc<RwLock<MerkleStore>>),
    Snapshot(Arc<Version>),
}

impl StoreView {
    pub fn live(store: MerkleStore) -> Self {
        StoreView::Live(Arc::new(RwLock::new(store)))
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, StoreView::Snapshot(_))
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self {
            StoreView::Live(s) => s.read().get(key),
            StoreView::Snapshot(v) => v.get(key),
        }
    }

    pub fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self {
            StoreView::Live(s) => s.read().iter_prefix(prefix),
            StoreView::Snapshot(v) => v.iter_prefix(prefix),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            StoreView::Live(s) => s.read().version(),
            StoreView::Snapshot(v) => v.version(),
        }
    }

    /// Read-only view of the last committed version.
    pub fn snapshot(&self) -> StoreView {
        match self {
            StoreView::Live(s) => StoreView::Snapshot(s.read().latest()),
            StoreView::Snapshot(v) => StoreView::Snapshot(v.clone()),
        }
    }

    pub fn snapshot_at(&self, version: u64) -> Result<StoreView, StoreError> {
        match self {
            StoreView::Live(s) => Ok(StoreView::Snapshot(s.read().at_version(version)?)),
            StoreView::Snapshot(v) if v.version() == version => Ok(StoreView::Snapshot(v.clone())),
            StoreView::Snapshot(_) => Err(StoreError::VersionNotFound(version)),
        }
    }

    pub fn get_decoded<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, CodecError> {
        match self.get(key) {
            Some(bytes) => codec::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn decode_prefix<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, CodecError> {
        self.iter_prefix(prefix)
            .into_iter()
            .map(|(k, v)| codec::decode(&v).map(|t| (k, t)))
            .collect()
    }

    pub fn put_encoded<T: Serialize>(&self, key: Vec<u8>, value: &T) -> Result<(), StoreError> {
        let bytes = codec::encode(value)?;
        self.put(key, bytes)
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        match self {
            StoreView::Live(s) => {
                s.write().set(key, value);
                Ok(())
            }
            StoreView::Snapshot(_) => Err(StoreError::ReadOnly),
        }
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        match self {
            StoreView::Live(s) => {
                s.write().remove(key);
                Ok(())
            }
            StoreView::Snapshot(_) => Err(StoreError::ReadOnly),
        }
    }

    pub fn commit(&self) -> Result<(Hash, u64), StoreError> {
        match self {
            StoreView::Live(s) => Ok(s.write().commit()),
            StoreView::Snapshot(_) => Err(StoreError::ReadOnly),
        }
    }
}
