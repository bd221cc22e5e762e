// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Origin, ReadTxn};
use crate::{
    Doc,
    error::{Error, Result},
    id::StateVector,
    id_set::IdSet,
    store::Store,
    update::Update,
};
use parking_lot::{RawRwLock, lock_api::ArcRwLockWriteGuard};
use std::fmt;
use tracing::debug;

/// A read-write transaction.
///
/// Holds the exclusive lock on the document until it is committed or dropped. Dropping it without
/// calling [`TransactionMut::commit`] rolls back every change it made.
pub struct TransactionMut {
    doc: Doc,
    /// Present until the transaction is committed. Changes are written to the locked store and
    /// journaled until then.
    guard: Option<ArcRwLockWriteGuard<RawRwLock, Store>>,
    origin: Option<Origin>,
    /// State when the transaction began, used to compute the committed update.
    begin: StateVector,
    /// Everything deleted by this transaction, locally or by applied updates.
    delete_set: IdSet,
}

impl TransactionMut {
    pub(crate) fn new(
        doc: Doc,
        mut guard: ArcRwLockWriteGuard<RawRwLock, Store>,
        origin: Option<Origin>,
    ) -> Self {
        guard.begin();
        let begin = guard.state_vector();
        Self {
            doc,
            guard: Some(guard),
            origin,
            begin,
            delete_set: IdSet::new(),
        }
    }

    /// The document this transaction writes to.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Returns true once [`TransactionMut::commit`] has been called.
    pub fn is_committed(&self) -> bool {
        self.guard.is_none()
    }

    /// Mutable access to the locked state and the delete set of this transaction.
    pub(crate) fn parts_mut(&mut self) -> Result<(&mut Store, &mut IdSet)> {
        let store = self.guard.as_deref_mut().ok_or(Error::InvalidHandle)?;
        Ok((store, &mut self.delete_set))
    }

    /// Decodes and integrates a remote update.
    ///
    /// The bytes are decoded completely before anything is integrated, so malformed input leaves
    /// the document untouched. Content whose causal dependencies are missing is kept until they
    /// arrive with a later update.
    pub fn apply_update(&mut self, update: &[u8]) -> Result<()> {
        // decode before checking the handle so that errors are reported in input order
        let update = Update::decode_v1(update)?;
        self.apply(update)
    }

    /// Integrates an already decoded remote update.
    pub fn apply(&mut self, update: Update) -> Result<()> {
        let (store, ds) = self.parts_mut()?;
        store.apply(update, ds);
        Ok(())
    }

    /// Makes all changes of this transaction visible and returns them as an [`Update`].
    ///
    /// The update contains every item integrated since the transaction began (local or remote)
    /// and every deletion it performed. Update observers of the document are notified with the
    /// encoded update after the document has been unlocked.
    ///
    /// Fails with [`Error::InvalidHandle`] if the transaction was committed before.
    pub fn commit(&mut self) -> Result<Update> {
        let mut guard = self.guard.take().ok_or(Error::InvalidHandle)?;
        guard.settle();
        let update = Update::from_parts(
            guard.blocks_since(&self.begin),
            std::mem::take(&mut self.delete_set),
        );
        drop(guard);

        debug!(
            doc = self.doc.id(),
            blocks = update.block_count(),
            deleted = update.delete_set().len(),
            origin = ?self.origin,
            "committed transaction"
        );
        if !update.is_empty() {
            self.doc.notify(&update, self.origin.as_ref());
        }
        Ok(update)
    }
}

impl ReadTxn for TransactionMut {
    fn store(&self) -> Result<&Store> {
        self.guard.as_deref().ok_or(Error::InvalidHandle)
    }
}

impl Drop for TransactionMut {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            let removed = guard.rollback();
            debug!(
                doc = self.doc.id(),
                removed, "rolled back uncommitted transaction"
            );
        }
    }
}

impl fmt::Debug for TransactionMut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionMut")
            .field("doc", &self.doc.id())
            .field("origin", &self.origin)
            .field("committed", &self.is_committed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Doc, Error, ReadTxn};

    #[test]
    fn commit_is_terminal() {
        let doc = Doc::with_client_id(1);
        let map = doc.get_or_insert_map("m").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        map.insert(&mut txn, "k", 1).unwrap();
        txn.commit().unwrap();
        assert!(txn.is_committed());
        assert_eq!(txn.commit().unwrap_err(), Error::InvalidHandle);
        assert_eq!(map.insert(&mut txn, "k", 2).unwrap_err(), Error::InvalidHandle);
        assert_eq!(map.get(&txn, "k").unwrap_err(), Error::InvalidHandle);
        assert_eq!(txn.state_vector().unwrap_err(), Error::InvalidHandle);
        // the lock was released on commit
        drop(doc.try_transact().unwrap());
    }

    #[test]
    fn commit_reports_a_contiguous_clock_range() {
        let doc = Doc::with_client_id(7);
        let array = doc.get_or_insert_array("a").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        array.insert_range(&mut txn, 0, [1, 2, 3]).unwrap();
        array.remove_range(&mut txn, 0, 1).unwrap();
        let update = txn.commit().unwrap();
        assert_eq!(update.state_vector().get(7), 3);
        assert_eq!(update.block_count(), 3);
        assert_eq!(update.delete_set().len(), 1);
    }

    #[test]
    fn empty_commit_produces_empty_update() {
        let doc = Doc::with_client_id(1);
        let mut txn = doc.try_transact_mut().unwrap();
        assert!(txn.commit().unwrap().is_empty());
    }

    #[test]
    fn malformed_updates_are_rejected_without_changes() {
        let doc = Doc::with_client_id(1);
        let mut txn = doc.try_transact_mut().unwrap();
        assert!(matches!(
            txn.apply_update(&[1, 1, 5]),
            Err(Error::Codec(_))
        ));
        assert!(matches!(
            txn.apply_update(&[9]),
            Err(Error::Version { found: 9, .. })
        ));
        assert!(txn.state_vector().unwrap().is_empty());
        assert!(!txn.has_pending().unwrap());
    }
}
