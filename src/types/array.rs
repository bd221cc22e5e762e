// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Shared arrays.
//!
//! Concurrent insertions at the same index are all kept and interleaved deterministically:
//! elements inserted in one call stay contiguous, and runs inserted concurrently at the same
//! position are ordered by client id.
use super::branch_ref;
use crate::{
    error::Result,
    iter::{Iter, Snapshot},
    transaction::{ReadTxn, TransactionMut},
    value::{In, Out},
};

branch_ref!(
    /// Handle to a shared array.
    ArrayRef => Array
);

/// Iterator over the elements of an array.
pub type ArrayIter<'txn> = Iter<'txn, Out>;

impl ArrayRef {
    /// Inserts `values` contiguously at `index`, shifting later elements.
    ///
    /// Fails with [`Error::Range`](crate::Error::Range) unless `index <= len`.
    pub fn insert_range<I>(&self, txn: &mut TransactionMut, index: usize, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<In>,
    {
        let (store, ds) = self.0.store_mut(txn)?;
        let values = values.into_iter().map(Into::into).collect();
        store.seq_insert(self.0.id(), index, values, ds)?;
        Ok(())
    }

    /// Inserts a single value at `index` and returns its output view.
    pub fn insert(
        &self,
        txn: &mut TransactionMut,
        index: usize,
        value: impl Into<In>,
    ) -> Result<Out> {
        let (store, ds) = self.0.store_mut(txn)?;
        let ptr = store.seq_insert_one(self.0.id(), index, value.into(), ds)?;
        Ok(store.out(ptr))
    }

    pub fn push_back(&self, txn: &mut TransactionMut, value: impl Into<In>) -> Result<Out> {
        let len = self.len(&*txn)?;
        self.insert(txn, len, value)
    }

    pub fn push_front(&self, txn: &mut TransactionMut, value: impl Into<In>) -> Result<Out> {
        self.insert(txn, 0, value)
    }

    /// Removes `len` elements starting at `index`.
    ///
    /// Fails with [`Error::Range`](crate::Error::Range) if `index + len` exceeds the length.
    pub fn remove_range(&self, txn: &mut TransactionMut, index: usize, len: usize) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        store.seq_remove(self.0.id(), index, len, ds)
    }

    /// Removes the element at `index`.
    pub fn remove(&self, txn: &mut TransactionMut, index: usize) -> Result<()> {
        self.remove_range(txn, index, 1)
    }

    /// Fails with [`Error::Range`](crate::Error::Range) if `index` is out of bounds.
    pub fn get<T: ReadTxn + ?Sized>(&self, txn: &T, index: usize) -> Result<Out> {
        let store = self.0.store(txn)?;
        let ptr = store.seq_get(self.0.id(), index)?;
        Ok(store.out(ptr))
    }

    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<usize> {
        Ok(self.0.store(txn)?.seq_len(self.0.id()))
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Iterates over a snapshot of the elements.
    pub fn iter<'txn, T: ReadTxn + ?Sized>(&self, txn: &'txn T) -> Result<ArrayIter<'txn>> {
        Ok(Iter::new(self.snapshot(txn)?))
    }

    pub(crate) fn snapshot<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<Snapshot<Out>> {
        let store = self.0.store(txn)?;
        Ok(store.seq(self.0.id()).map(|ptr| store.out(ptr)).collect())
    }
}
