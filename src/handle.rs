// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Handle registry
//!
//! A [`Registry`] owns documents, transactions, branch handles and iterators and hands out small
//! `Copy` handles for them. Every handle carries the generation of the slot it points to, so a
//! handle that outlived its object (an ended transaction, a destroyed document, an iterator of a
//! committed transaction) is detected and rejected with [`Error::InvalidHandle`] instead of
//! silently aliasing whatever reuses the slot.
//!
//! This is the shape language bindings need: handles convert to and from plain `u64`s, strings
//! cross as `&str` and buffers as `&[u8]`, and no borrow ever has to cross the boundary.
//!
//! ```
//! use crdoc::{BranchKind, Options, handle::{HandleOut, Registry}};
//!
//! let mut registry = Registry::new();
//! let doc = registry.create_doc(Options::with_client_id(1));
//! let map = registry.branch(doc, "config", BranchKind::Map)?;
//!
//! let txn = registry.begin_write(doc, None)?;
//! registry.map_insert(txn, map, "retries", 3.into())?;
//! let update = registry.commit(txn)?;
//! assert!(!update.is_empty());
//!
//! let txn = registry.begin_read(doc)?;
//! assert_eq!(
//!     registry.map_get(txn, map, "retries")?,
//!     Some(HandleOut::Value(3.into()))
//! );
//! registry.end(txn)?;
//! # Ok::<(), crdoc::Error>(())
//! ```
use crate::{
    ArrayRef, BranchKind, BranchRef, Doc, DocRandomState, MapRef, Options, Out, ReadTxn,
    StateVector, TextRef, Transaction, TransactionMut, Update, Value,
    block::BranchId,
    error::{Error, Result},
    types::MapEntry,
    value::In,
};
use std::{collections::HashMap, fmt, vec};
use tracing::debug;

/// Slot index and generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    fn into_raw(self) -> u64 {
        u64::from(self.generation) << 32 | u64::from(self.index)
    }

    fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Key);

        impl $name {
            /// Packs the handle into an integer for crossing a language boundary.
            pub fn into_raw(self) -> u64 {
                self.0.into_raw()
            }

            /// Unpacks a handle produced by `into_raw`. Garbage input yields a handle that is
            /// rejected on use.
            pub fn from_raw(raw: u64) -> Self {
                Self(Key::from_raw(raw))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}({}v{})",
                    stringify!($name),
                    self.0.index,
                    self.0.generation
                )
            }
        }
    };
}

handle!(
    /// Refers to a document owned by a [`Registry`].
    DocHandle
);
handle!(
    /// Refers to an open read or write transaction.
    TxnHandle
);
handle!(
    /// Refers to a branch of a document.
    BranchHandle
);
handle!(
    /// Refers to an iterator over a map or array.
    IterHandle
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slots with generation counters. Freed slots are reused with the next generation.
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> Key {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Key {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Key {
            index,
            generation: 0,
        }
    }

    fn get(&self, key: Key) -> Result<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(Error::InvalidHandle)
    }

    fn get_mut(&mut self, key: Key) -> Result<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(Error::InvalidHandle)
    }

    fn remove(&mut self, key: Key) -> Result<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.value.is_some())
            .ok_or(Error::InvalidHandle)?;
        let value = slot.value.take().ok_or(Error::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Ok(value)
    }

    fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.as_ref().is_some_and(|value| !keep(value)) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

/// A read result with nested branches registered as [`BranchHandle`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOut {
    Value(Value),
    Branch(BranchHandle, BranchKind),
}

/// An element produced by an iterator handle.
#[derive(Debug, Clone, PartialEq)]
pub enum IterEntry {
    /// A key-value pair of a map.
    Map { key: String, value: HandleOut },
    /// An element of an array.
    Element(HandleOut),
}

enum Txn {
    Read(Transaction),
    Write(TransactionMut),
}

impl Txn {
    fn read(&self) -> &dyn ReadTxn {
        match self {
            Txn::Read(txn) => txn,
            Txn::Write(txn) => txn,
        }
    }
}

struct TxnEntry {
    doc: DocHandle,
    txn: Txn,
}

struct BranchEntry {
    doc: DocHandle,
    branch: BranchRef,
}

enum Snapshot {
    Map(vec::IntoIter<MapEntry>),
    Array(vec::IntoIter<Out>),
}

struct IterState {
    txn: TxnHandle,
    snapshot: Snapshot,
}

impl IterState {
    fn has_next(&self) -> bool {
        match &self.snapshot {
            Snapshot::Map(entries) => entries.len() > 0,
            Snapshot::Array(elements) => elements.len() > 0,
        }
    }
}

/// Owner of all objects reachable through handles.
///
/// Dropping the registry releases everything it owns: open write transactions are rolled back.
///
/// Each branch of a document has at most one live [`BranchHandle`]. Looking it up again, as a
/// root or through a read result, returns the handle already registered.
#[derive(Default)]
pub struct Registry {
    docs: Arena<Doc>,
    txns: Arena<TxnEntry>,
    branches: Arena<BranchEntry>,
    branch_index: HashMap<(DocHandle, BranchId), BranchHandle, DocRandomState>,
    iters: Arena<IterState>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("docs", &self.docs.values().count())
            .field("txns", &self.txns.values().count())
            .field("branches", &self.branches.values().count())
            .field("iters", &self.iters.values().count())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_doc(&mut self, options: Options) -> DocHandle {
        let handle = DocHandle(self.docs.insert(Doc::with_options(options)));
        debug!(?handle, "registered document");
        handle
    }

    /// The document behind a handle, for use with the native API.
    pub fn doc(&self, doc: DocHandle) -> Result<&Doc> {
        self.docs.get(doc.0)
    }

    /// Destroys a document together with its branch handles.
    ///
    /// Fails with [`Error::Concurrency`] while a transaction of the document is open.
    pub fn destroy_doc(&mut self, doc: DocHandle) -> Result<()> {
        self.docs.get(doc.0)?;
        if self.txns.values().any(|entry| entry.doc == doc) {
            return Err(Error::Concurrency);
        }
        self.docs.remove(doc.0)?;
        self.branches.retain(|entry| entry.doc != doc);
        self.branch_index.retain(|(owner, _), _| *owner != doc);
        debug!(handle = ?doc, "destroyed document");
        Ok(())
    }

    pub fn begin_read(&mut self, doc: DocHandle) -> Result<TxnHandle> {
        let txn = self.docs.get(doc.0)?.try_transact()?;
        Ok(TxnHandle(self.txns.insert(TxnEntry {
            doc,
            txn: Txn::Read(txn),
        })))
    }

    pub fn begin_write(&mut self, doc: DocHandle, origin: Option<&[u8]>) -> Result<TxnHandle> {
        let doc_ref = self.docs.get(doc.0)?;
        let txn = match origin {
            Some(origin) => doc_ref.try_transact_mut_with(origin)?,
            None => doc_ref.try_transact_mut()?,
        };
        Ok(TxnHandle(self.txns.insert(TxnEntry {
            doc,
            txn: Txn::Write(txn),
        })))
    }

    /// Commits a write transaction and returns the encoded update.
    ///
    /// The handle and all iterators created with it become invalid. Read transactions cannot be
    /// committed; they stay open and the call fails with [`Error::InvalidHandle`].
    pub fn commit(&mut self, txn: TxnHandle) -> Result<Vec<u8>> {
        if !matches!(self.txns.get(txn.0)?.txn, Txn::Write(_)) {
            return Err(Error::InvalidHandle);
        }
        let mut entry = self.txns.remove(txn.0)?;
        self.drop_iterators(txn);
        match &mut entry.txn {
            Txn::Write(write) => Ok(write.commit()?.encode_v1()),
            Txn::Read(_) => Err(Error::InvalidHandle),
        }
    }

    /// Ends a transaction. Uncommitted changes of a write transaction are discarded.
    pub fn end(&mut self, txn: TxnHandle) -> Result<()> {
        self.txns.remove(txn.0)?;
        self.drop_iterators(txn);
        Ok(())
    }

    fn drop_iterators(&mut self, txn: TxnHandle) {
        self.iters.retain(|iter| iter.txn != txn);
    }

    /// Returns a handle to the root branch `name`, creating it with `kind` on first use.
    pub fn branch(&mut self, doc: DocHandle, name: &str, kind: BranchKind) -> Result<BranchHandle> {
        let branch = self.docs.get(doc.0)?.get_or_insert(name, kind)?;
        Ok(self.register(doc, branch))
    }

    /// Releases a branch handle. The branch itself is unaffected.
    ///
    /// The handle is shared by every lookup of the branch, so all copies of it become invalid. A
    /// later lookup registers a fresh one.
    pub fn release_branch(&mut self, branch: BranchHandle) -> Result<()> {
        let entry = self.branches.remove(branch.0)?;
        self.branch_index.remove(&(entry.doc, entry.branch.id().clone()));
        Ok(())
    }

    /// The handle of `branch`, registering it on first use.
    fn register(&mut self, doc: DocHandle, branch: BranchRef) -> BranchHandle {
        let key = (doc, branch.id().clone());
        if let Some(&handle) = self.branch_index.get(&key) {
            if self.branches.get(handle.0).is_ok() {
                return handle;
            }
        }
        let handle = BranchHandle(self.branches.insert(BranchEntry { doc, branch }));
        self.branch_index.insert(key, handle);
        handle
    }

    /// Resolves a transaction and a branch of the same document.
    fn resolve(&self, txn: TxnHandle, branch: BranchHandle) -> Result<(&TxnEntry, BranchRef)> {
        let entry = self.txns.get(txn.0)?;
        let branch = self.branches.get(branch.0)?;
        if branch.doc != entry.doc {
            return Err(Error::InvalidHandle);
        }
        Ok((entry, branch.branch.clone()))
    }

    fn resolve_mut(
        &mut self,
        txn: TxnHandle,
        branch: BranchHandle,
    ) -> Result<(&mut TransactionMut, DocHandle, BranchRef)> {
        let (entry, branch) = self.resolve(txn, branch)?;
        let doc = entry.doc;
        match &mut self.txns.get_mut(txn.0)?.txn {
            Txn::Write(write) => Ok((write, doc, branch)),
            Txn::Read(_) => Err(Error::InvalidHandle),
        }
    }

    /// Registers nested branches of a read result.
    fn adopt(&mut self, doc: DocHandle, out: Out) -> HandleOut {
        match out.try_into_branch() {
            Ok(branch) => {
                let kind = branch.kind();
                HandleOut::Branch(self.register(doc, branch), kind)
            }
            Err(value) => HandleOut::Value(value),
        }
    }

    pub fn map_insert(
        &mut self,
        txn: TxnHandle,
        map: BranchHandle,
        key: &str,
        value: In,
    ) -> Result<HandleOut> {
        let (write, doc, branch) = self.resolve_mut(txn, map)?;
        let out = typed::<MapRef>(branch)?.insert(write, key, value)?;
        Ok(self.adopt(doc, out))
    }

    pub fn map_get(
        &mut self,
        txn: TxnHandle,
        map: BranchHandle,
        key: &str,
    ) -> Result<Option<HandleOut>> {
        let (entry, branch) = self.resolve(txn, map)?;
        let doc = entry.doc;
        let out = typed::<MapRef>(branch)?.get(entry.txn.read(), key)?;
        Ok(out.map(|out| self.adopt(doc, out)))
    }

    pub fn map_remove(&mut self, txn: TxnHandle, map: BranchHandle, key: &str) -> Result<bool> {
        let (write, _, branch) = self.resolve_mut(txn, map)?;
        typed::<MapRef>(branch)?.remove(write, key)
    }

    pub fn map_len(&self, txn: TxnHandle, map: BranchHandle) -> Result<usize> {
        let (entry, branch) = self.resolve(txn, map)?;
        typed::<MapRef>(branch)?.len(entry.txn.read())
    }

    pub fn array_insert_range(
        &mut self,
        txn: TxnHandle,
        array: BranchHandle,
        index: usize,
        values: Vec<In>,
    ) -> Result<()> {
        let (write, _, branch) = self.resolve_mut(txn, array)?;
        typed::<ArrayRef>(branch)?.insert_range(write, index, values)
    }

    pub fn array_remove_range(
        &mut self,
        txn: TxnHandle,
        array: BranchHandle,
        index: usize,
        len: usize,
    ) -> Result<()> {
        let (write, _, branch) = self.resolve_mut(txn, array)?;
        typed::<ArrayRef>(branch)?.remove_range(write, index, len)
    }

    pub fn array_get(
        &mut self,
        txn: TxnHandle,
        array: BranchHandle,
        index: usize,
    ) -> Result<HandleOut> {
        let (entry, branch) = self.resolve(txn, array)?;
        let doc = entry.doc;
        let out = typed::<ArrayRef>(branch)?.get(entry.txn.read(), index)?;
        Ok(self.adopt(doc, out))
    }

    pub fn array_len(&self, txn: TxnHandle, array: BranchHandle) -> Result<usize> {
        let (entry, branch) = self.resolve(txn, array)?;
        typed::<ArrayRef>(branch)?.len(entry.txn.read())
    }

    pub fn text_to_string(&self, txn: TxnHandle, text: BranchHandle) -> Result<String> {
        let (entry, branch) = self.resolve(txn, text)?;
        typed::<TextRef>(branch)?.get_string(entry.txn.read())
    }

    pub fn text_insert(
        &mut self,
        txn: TxnHandle,
        text: BranchHandle,
        index: usize,
        chunk: &str,
    ) -> Result<()> {
        let (write, _, branch) = self.resolve_mut(txn, text)?;
        typed::<TextRef>(branch)?.insert(write, index, chunk)
    }

    pub fn text_remove_range(
        &mut self,
        txn: TxnHandle,
        text: BranchHandle,
        index: usize,
        len: usize,
    ) -> Result<()> {
        let (write, _, branch) = self.resolve_mut(txn, text)?;
        typed::<TextRef>(branch)?.remove_range(write, index, len)
    }

    /// Creates an iterator over a snapshot of a map or an array.
    ///
    /// Later changes made through the same transaction do not affect the iterator. Ending or
    /// committing the transaction invalidates it.
    pub fn iter_create(&mut self, txn: TxnHandle, branch: BranchHandle) -> Result<IterHandle> {
        let (entry, branch) = self.resolve(txn, branch)?;
        let read = entry.txn.read();
        let snapshot = match branch.kind() {
            BranchKind::Map => Snapshot::Map(typed::<MapRef>(branch)?.snapshot(read)?.into_iter()),
            BranchKind::Array => {
                Snapshot::Array(typed::<ArrayRef>(branch)?.snapshot(read)?.into_iter())
            }
            _ => return Err(Error::InvalidHandle),
        };
        Ok(IterHandle(self.iters.insert(IterState { txn, snapshot })))
    }

    fn live_iter(&mut self, iter: IterHandle) -> Result<&mut IterState> {
        let txn = self.iters.get(iter.0)?.txn;
        self.txns.get(txn.0)?;
        self.iters.get_mut(iter.0)
    }

    pub fn iter_has_next(&mut self, iter: IterHandle) -> Result<bool> {
        Ok(self.live_iter(iter)?.has_next())
    }

    /// Advances an iterator. Returns `None` once it is exhausted, on every further call.
    pub fn iter_next(&mut self, iter: IterHandle) -> Result<Option<IterEntry>> {
        let state = self.live_iter(iter)?;
        let txn = state.txn;
        let next = match &mut state.snapshot {
            Snapshot::Map(entries) => entries.next().map(|e| (Some(e.key), e.value)),
            Snapshot::Array(elements) => elements.next().map(|e| (None, e)),
        };
        let doc = self.txns.get(txn.0)?.doc;
        Ok(next.map(|(key, value)| {
            let value = self.adopt(doc, value);
            match key {
                Some(key) => IterEntry::Map { key, value },
                None => IterEntry::Element(value),
            }
        }))
    }

    pub fn iter_destroy(&mut self, iter: IterHandle) -> Result<()> {
        self.iters.remove(iter.0).map(drop)
    }

    pub fn encode_state_vector(&self, txn: TxnHandle) -> Result<Vec<u8>> {
        self.txns.get(txn.0)?.txn.read().encode_state_vector()
    }

    /// Encodes the changes a peer with the encoded state vector `sv` is missing, or the complete
    /// document state if `sv` is `None`.
    pub fn encode_state_as_update(&self, txn: TxnHandle, sv: Option<&[u8]>) -> Result<Vec<u8>> {
        let read = self.txns.get(txn.0)?.txn.read();
        match sv {
            Some(sv) => read.encode_diff(sv),
            None => read.encode_state_as_update(&StateVector::new()),
        }
    }

    /// Decodes an update without applying it, for instance to validate it.
    pub fn decode_update(&self, update: &[u8]) -> Result<Update> {
        Update::decode_v1(update)
    }

    pub fn apply_update(&mut self, txn: TxnHandle, update: &[u8]) -> Result<()> {
        match &mut self.txns.get_mut(txn.0)?.txn {
            Txn::Write(write) => write.apply_update(update),
            Txn::Read(_) => Err(Error::InvalidHandle),
        }
    }
}

fn typed<T>(branch: BranchRef) -> Result<T>
where
    T: TryFrom<BranchRef, Error = BranchRef>,
{
    T::try_from(branch).map_err(|_| Error::InvalidHandle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Registry, DocHandle) {
        let mut registry = Registry::new();
        let doc = registry.create_doc(Options::with_client_id(1));
        (registry, doc)
    }

    #[test]
    fn raw_handles_round_trip() {
        let key = Key {
            index: 7,
            generation: 3,
        };
        let handle = TxnHandle(key);
        assert_eq!(TxnHandle::from_raw(handle.into_raw()), handle);
        assert_eq!(format!("{handle:?}"), "TxnHandle(7v3)");
    }

    #[test]
    fn reused_slots_reject_stale_handles() {
        let (mut registry, doc) = setup();
        let first = registry.begin_read(doc).unwrap();
        registry.end(first).unwrap();
        let second = registry.begin_read(doc).unwrap();
        assert_eq!(first.0.index, second.0.index);
        assert_eq!(registry.end(first), Err(Error::InvalidHandle));
        assert_eq!(registry.end(second), Ok(()));
    }

    #[test]
    fn transaction_discipline_is_enforced() {
        let (mut registry, doc) = setup();
        let read = registry.begin_read(doc).unwrap();
        assert_eq!(registry.begin_write(doc, None), Err(Error::Concurrency));
        assert_eq!(registry.destroy_doc(doc), Err(Error::Concurrency));
        registry.end(read).unwrap();
        registry.destroy_doc(doc).unwrap();
        assert_eq!(registry.begin_read(doc), Err(Error::InvalidHandle));
    }

    #[test]
    fn writes_through_read_transactions_are_rejected() {
        let (mut registry, doc) = setup();
        let map = registry.branch(doc, "m", BranchKind::Map).unwrap();
        let txn = registry.begin_read(doc).unwrap();
        assert_eq!(
            registry.map_insert(txn, map, "k", 1.into()),
            Err(Error::InvalidHandle)
        );
        assert_eq!(registry.commit(txn), Err(Error::InvalidHandle));
        // the transaction is still usable for reads
        assert_eq!(registry.map_len(txn, map), Ok(0));
    }

    #[test]
    fn nested_branches_become_handles() {
        let (mut registry, doc) = setup();
        let root = registry.branch(doc, "root", BranchKind::Map).unwrap();
        let txn = registry.begin_write(doc, Some(&b"test"[..])).unwrap();
        let HandleOut::Branch(list, BranchKind::Array) =
            registry.map_insert(txn, root, "list", In::array()).unwrap()
        else {
            panic!("expected a nested array");
        };
        registry
            .array_insert_range(txn, list, 0, vec!["a".into(), "b".into()])
            .unwrap();
        registry.array_remove_range(txn, list, 0, 1).unwrap();
        assert_eq!(
            registry.array_get(txn, list, 0),
            Ok(HandleOut::Value("b".into()))
        );
        assert!(matches!(
            registry.array_get(txn, list, 1),
            Err(Error::Range { .. })
        ));
        registry.commit(txn).unwrap();
    }

    #[test]
    fn lookups_share_one_handle_per_branch() {
        let (mut registry, doc) = setup();
        let root = registry.branch(doc, "root", BranchKind::Map).unwrap();
        assert_eq!(registry.branch(doc, "root", BranchKind::Map), Ok(root));

        let txn = registry.begin_write(doc, None).unwrap();
        let HandleOut::Branch(inner, _) =
            registry.map_insert(txn, root, "inner", In::array()).unwrap()
        else {
            panic!("expected a nested array");
        };
        for _ in 0..1000 {
            assert_eq!(
                registry.map_get(txn, root, "inner"),
                Ok(Some(HandleOut::Branch(inner, BranchKind::Array)))
            );
        }
        assert_eq!(
            format!("{registry:?}"),
            "Registry { docs: 1, txns: 1, branches: 2, iters: 0 }"
        );

        registry.release_branch(inner).unwrap();
        let Ok(Some(HandleOut::Branch(fresh, BranchKind::Array))) =
            registry.map_get(txn, root, "inner")
        else {
            panic!("expected a nested array");
        };
        assert_ne!(fresh, inner);
        assert_eq!(registry.array_len(txn, inner), Err(Error::InvalidHandle));
        assert_eq!(registry.array_len(txn, fresh), Ok(0));
        registry.commit(txn).unwrap();
    }

    #[test]
    fn iterators_die_with_their_transaction() {
        let (mut registry, doc) = setup();
        let map = registry.branch(doc, "m", BranchKind::Map).unwrap();
        let txn = registry.begin_write(doc, None).unwrap();
        registry.map_insert(txn, map, "a", 1.into()).unwrap();
        registry.map_insert(txn, map, "b", 2.into()).unwrap();

        let iter = registry.iter_create(txn, map).unwrap();
        // mutation after creation does not affect the snapshot
        registry.map_insert(txn, map, "c", 3.into()).unwrap();
        let mut keys = Vec::new();
        while registry.iter_has_next(iter).unwrap() {
            match registry.iter_next(iter).unwrap() {
                Some(IterEntry::Map { key, .. }) => keys.push(key),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(registry.iter_next(iter), Ok(None));

        let other = registry.iter_create(txn, map).unwrap();
        registry.commit(txn).unwrap();
        assert_eq!(registry.iter_next(other), Err(Error::InvalidHandle));
        assert_eq!(registry.iter_has_next(iter), Err(Error::InvalidHandle));
        assert_eq!(registry.iter_destroy(other), Err(Error::InvalidHandle));
    }

    #[test]
    fn updates_travel_between_documents() {
        let mut registry = Registry::new();
        let a = registry.create_doc(Options::with_client_id(1));
        let b = registry.create_doc(Options::with_client_id(2));
        let text_a = registry.branch(a, "t", BranchKind::Text).unwrap();
        let text_b = registry.branch(b, "t", BranchKind::Text).unwrap();

        let txn = registry.begin_write(a, None).unwrap();
        registry.text_insert(txn, text_a, 0, "hello").unwrap();
        registry.commit(txn).unwrap();

        let read_b = registry.begin_read(b).unwrap();
        let sv = registry.encode_state_vector(read_b).unwrap();
        registry.end(read_b).unwrap();
        let read_a = registry.begin_read(a).unwrap();
        let diff = registry.encode_state_as_update(read_a, Some(sv.as_slice())).unwrap();
        // a branch of another document is rejected
        assert_eq!(
            registry.text_to_string(read_a, text_b),
            Err(Error::InvalidHandle)
        );
        registry.end(read_a).unwrap();

        assert!(registry.decode_update(&diff).is_ok());
        let txn = registry.begin_write(b, None).unwrap();
        registry.apply_update(txn, &diff).unwrap();
        registry.text_remove_range(txn, text_b, 0, 1).unwrap();
        assert_eq!(registry.text_to_string(txn, text_b).unwrap(), "ello");
        registry.end(txn).unwrap();

        // ending a write transaction rolls it back
        let read_b = registry.begin_read(b).unwrap();
        assert_eq!(registry.text_to_string(read_b, text_b).unwrap(), "");
    }
}
