// src/state/overlay.rs

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, StoreError};
use crate::store::StoreView;

/// Undo log over in-block writes. A transaction opens a checkpoint, then
/// either releases it on success or rolls every write back on failure.
/// Only entries touched after the checkpoint are recorded.
pub trait Journal {
    fn checkpoint(&mut self);
    fn rollback(&mut self);
    fn release(&mut self);
}

/// Implements [`Journal`] for a sub-store by forwarding to its journaled fields.
macro_rules! journaled {
    ($ty:ty => $($field:ident),+ $(,)?) => {
        impl $crate::state::overlay::Journal for $ty {
            fn checkpoint(&mut self) {
                $($crate::state::overlay::Journal::checkpoint(&mut self.$field);)+
            }
            fn rollback(&mut self) {
                $($crate::state::overlay::Journal::rollback(&mut self.$field);)+
            }
            fn release(&mut self) {
                $($crate::state::overlay::Journal::release(&mut self.$field);)+
            }
        }
    };
}
pub(crate) use journaled;

/// In-block dirty overlay for one keyed collection.
///
/// Reads fall through to the store; writes stay here until [`Overlay::flush`].
/// `None` marks a deletion. Flushing walks the map in key order, which makes
/// the write sequence deterministic.
#[derive(Clone)]
pub struct Overlay<K, V> {
    prefix: Vec<u8>,
    encode_key: fn(&K) -> Vec<u8>,
    decode_key: fn(&[u8]) -> Option<K>,
    entries: BTreeMap<K, Option<V>>,
    /// Overlay entry each key had at the checkpoint; outer `None` means no entry.
    journal: Option<BTreeMap<K, Option<Option<V>>>>,
}

impl<K, V> Overlay<K, V>
where
    K: Ord + Clone,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(prefix: Vec<u8>, encode_key: fn(&K) -> Vec<u8>, decode_key: fn(&[u8]) -> Option<K>) -> Self {
        Self { prefix, encode_key, decode_key, entries: BTreeMap::new(), journal: None }
    }

    pub fn get(&self, store: &StoreView, key: &K) -> Result<Option<V>, CodecError> {
        match self.entries.get(key) {
            Some(v) => Ok(v.clone()),
            None => store.get_decoded((self.encode_key)(key).as_slice()),
        }
    }

    fn record(&mut self, key: &K) {
        if let Some(journal) = &mut self.journal {
            if !journal.contains_key(key) {
                journal.insert(key.clone(), self.entries.get(key).cloned());
            }
        }
    }

    pub fn set(&mut self, key: K, value: V) {
        self.record(&key);
        self.entries.insert(key, Some(value));
    }

    pub fn remove(&mut self, key: K) {
        self.record(&key);
        self.entries.insert(key, None);
    }

    pub fn is_dirty(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Every live entry: store contents under the prefix with the overlay applied.
    pub fn all(&self, store: &StoreView) -> Result<BTreeMap<K, V>, CodecError> {
        let mut out = BTreeMap::new();
        for (raw, value) in store.decode_prefix::<V>(&self.prefix)? {
            if let Some(key) = (self.decode_key)(&raw) {
                out.insert(key, value);
            }
        }
        for (key, value) in &self.entries {
            match value {
                Some(v) => {
                    out.insert(key.clone(), v.clone());
                }
                None => {
                    out.remove(key);
                }
            }
        }
        Ok(out)
    }

    /// Writes every dirty entry to the store in ascending key order and clears the overlay.
    pub fn flush(&mut self, store: &StoreView) -> Result<usize, StoreError> {
        self.journal = None;
        let entries = std::mem::take(&mut self.entries);
        let n = entries.len();
        for (key, value) in entries {
            let raw = (self.encode_key)(&key);
            match value {
                Some(v) => store.put_encoded(raw, &v)?,
                None => store.delete(&raw)?,
            }
        }
        Ok(n)
    }

    pub fn clear(&mut self) {
        self.journal = None;
        self.entries.clear();
    }
}

impl<K: Ord + Clone, V: Clone> Journal for Overlay<K, V> {
    fn checkpoint(&mut self) {
        self.journal = Some(BTreeMap::new());
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (key, prev) in journal {
            match prev {
                Some(entry) => {
                    self.entries.insert(key, entry);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    fn release(&mut self) {
        self.journal = None;
    }
}

#[derive(Clone)]
enum Saved<V> {
    Off,
    Armed,
    Taken(Option<V>),
}

/// Single-value counterpart of [`Overlay`]: a pending write for one store key.
#[derive(Clone)]
pub struct DirtyValue<V> {
    value: Option<V>,
    saved: Saved<V>,
}

impl<V: Clone> Default for DirtyValue<V> {
    fn default() -> Self {
        Self { value: None, saved: Saved::Off }
    }
}

impl<V: Clone> DirtyValue<V> {
    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn set(&mut self, value: V) {
        if matches!(self.saved, Saved::Armed) {
            self.saved = Saved::Taken(self.value.clone());
        }
        self.value = Some(value);
    }

    /// Hands the pending value to the caller for flushing.
    pub fn take(&mut self) -> Option<V> {
        self.saved = Saved::Off;
        self.value.take()
    }
}

impl<V: Clone> Journal for DirtyValue<V> {
    fn checkpoint(&mut self) {
        self.saved = Saved::Armed;
    }

    fn rollback(&mut self) {
        if let Saved::Taken(prev) = std::mem::replace(&mut self.saved, Saved::Off) {
            self.value = prev;
        }
    }

    fn release(&mut self) {
        self.saved = Saved::Off;
    }
}
