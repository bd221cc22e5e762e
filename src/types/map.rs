// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Shared maps.
//!
//! Keys are strings. Concurrent writes to the same key resolve last-writer-wins: a write that
//! observed the previous value always replaces it, and among concurrent writes the one from the
//! higher client id survives on every replica.
use super::branch_ref;
use crate::{
    error::Result,
    iter::{Iter, Snapshot},
    transaction::{ReadTxn, TransactionMut},
    value::{In, Out},
};

branch_ref!(
    /// Handle to a shared map.
    MapRef => Map
);

/// A single entry produced by map iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: String,
    pub value: Out,
}

impl From<MapEntry> for (String, Out) {
    fn from(entry: MapEntry) -> Self {
        (entry.key, entry.value)
    }
}

/// Iterator over the entries of a map, in ascending key order.
pub type MapIter<'txn> = Iter<'txn, MapEntry>;

impl MapRef {
    /// Sets `key` to `value`, replacing any previous value.
    ///
    /// Returns the output view of the inserted value: the value itself for scalars, a handle to
    /// the new branch for preliminary containers.
    pub fn insert(
        &self,
        txn: &mut TransactionMut,
        key: impl AsRef<str>,
        value: impl Into<In>,
    ) -> Result<Out> {
        let (store, ds) = self.0.store_mut(txn)?;
        let ptr = store.map_insert(self.0.id(), key.as_ref(), value.into(), ds);
        Ok(store.out(ptr))
    }

    pub fn get<T: ReadTxn + ?Sized>(&self, txn: &T, key: &str) -> Result<Option<Out>> {
        let store = self.0.store(txn)?;
        Ok(store.map_get(self.0.id(), key).map(|ptr| store.out(ptr)))
    }

    /// Removes `key`. Returns `true` if the key held a live value.
    pub fn remove(&self, txn: &mut TransactionMut, key: &str) -> Result<bool> {
        let (store, ds) = self.0.store_mut(txn)?;
        Ok(store.map_remove(self.0.id(), key, ds))
    }

    pub fn contains_key<T: ReadTxn + ?Sized>(&self, txn: &T, key: &str) -> Result<bool> {
        Ok(self.0.store(txn)?.map_get(self.0.id(), key).is_some())
    }

    /// Number of live keys.
    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<usize> {
        Ok(self.0.store(txn)?.map_len(self.0.id()))
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Live keys in ascending order.
    pub fn keys<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<Vec<String>> {
        Ok(self
            .0
            .store(txn)?
            .map_entries(self.0.id())
            .into_iter()
            .map(|(key, _)| key.to_string())
            .collect())
    }

    /// Removes every key.
    pub fn clear(&self, txn: &mut TransactionMut) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        for (_, ptr) in store.map_entries(self.0.id()) {
            store.delete(ptr, ds);
        }
        Ok(())
    }

    /// Iterates over a snapshot of the live entries, in ascending key order.
    ///
    /// The snapshot is taken when this method is called. The iterator borrows `txn`, so the map
    /// cannot be changed through the same transaction while the iterator is alive.
    pub fn iter<'txn, T: ReadTxn + ?Sized>(&self, txn: &'txn T) -> Result<MapIter<'txn>> {
        Ok(Iter::new(self.snapshot(txn)?))
    }

    pub(crate) fn snapshot<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<Snapshot<MapEntry>> {
        let store = self.0.store(txn)?;
        Ok(store
            .map_entries(self.0.id())
            .into_iter()
            .map(|(key, ptr)| MapEntry {
                key: key.to_string(),
                value: store.out(ptr),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Doc, In, Value};
    use std::collections::BTreeMap;

    #[test]
    fn insert_get_remove() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        assert_eq!(map.insert(&mut txn, "key1", "value1").unwrap(), "value1");
        assert_eq!(map.get(&txn, "key1").unwrap().unwrap(), "value1");
        assert!(map.contains_key(&txn, "key1").unwrap());
        assert!(map.remove(&mut txn, "key1").unwrap());
        assert!(!map.remove(&mut txn, "key1").unwrap());
        assert_eq!(map.get(&txn, "key1").unwrap(), None);
        assert!(map.is_empty(&txn).unwrap());
    }

    #[test]
    fn overwrite_keeps_a_single_entry() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        map.insert(&mut txn, "k", 1).unwrap();
        map.insert(&mut txn, "k", 2).unwrap();
        assert_eq!(map.len(&txn).unwrap(), 1);
        assert_eq!(map.get(&txn, "k").unwrap().unwrap(), 2);
    }

    #[test]
    fn iteration_is_sorted_and_skips_removed_keys() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        for key in ["c", "a", "b"] {
            map.insert(&mut txn, key, key).unwrap();
        }
        map.remove(&mut txn, "b").unwrap();
        let mut iter = map.iter(&txn).unwrap();
        assert!(iter.has_next());
        let keys: Vec<_> = iter.by_ref().map(|e| e.key).collect();
        assert_eq!(keys, ["a", "c"]);
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn nested_prelim_map_becomes_a_branch() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        let prelim = BTreeMap::from([("inner".to_string(), In::from(Value::Null))]);
        let out = map.insert(&mut txn, "nested", prelim).unwrap();
        let nested = out.as_map().unwrap().clone();
        assert_eq!(nested.get(&txn, "inner").unwrap().unwrap(), Value::Null);
        nested.insert(&mut txn, "more", true).unwrap();
        assert_eq!(nested.keys(&txn).unwrap(), ["inner", "more"]);
    }

    #[test]
    fn clear_removes_everything() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        map.insert(&mut txn, "a", 1).unwrap();
        map.insert(&mut txn, "b", 2).unwrap();
        map.clear(&mut txn).unwrap();
        assert_eq!(map.len(&txn).unwrap(), 0);
        assert_eq!(map.keys(&txn).unwrap(), Vec::<String>::new());
    }
}
