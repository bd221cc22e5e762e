// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::ReadTxn;
use crate::{Doc, error::Result, store::Store};
use parking_lot::{RawRwLock, lock_api::ArcRwLockReadGuard};
use std::fmt;

/// A read-only transaction.
///
/// Holds a shared lock on the document until dropped.
pub struct Transaction {
    doc: Doc,
    guard: ArcRwLockReadGuard<RawRwLock, Store>,
}

impl Transaction {
    pub(crate) fn new(doc: Doc, guard: ArcRwLockReadGuard<RawRwLock, Store>) -> Self {
        Self { doc, guard }
    }

    /// The document this transaction reads.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }
}

impl ReadTxn for Transaction {
    fn store(&self) -> Result<&Store> {
        Ok(&*self.guard)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("doc", &self.doc.id())
            .finish_non_exhaustive()
    }
}
