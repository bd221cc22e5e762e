// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Shared text.
//!
//! Offsets and lengths are counted in Unicode scalar values (`char`s), never in bytes, so every
//! offset is a valid split point of the string.
use super::branch_ref;
use crate::{
    block::Content,
    error::Result,
    iter::Iter,
    transaction::{ReadTxn, TransactionMut},
};

branch_ref!(
    /// Handle to a shared text.
    TextRef => Text
);

/// Iterator over the characters of a text.
pub type TextChars<'txn> = Iter<'txn, char>;

impl TextRef {
    /// Materializes the current content.
    pub fn get_string<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<String> {
        Ok(self.0.store(txn)?.text(self.0.id()))
    }

    /// Inserts `chunk` at character offset `index`.
    pub fn insert(&self, txn: &mut TransactionMut, index: usize, chunk: &str) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        store.text_insert(self.0.id(), index, chunk, ds)
    }

    /// Appends `chunk` to the end of the text.
    pub fn push(&self, txn: &mut TransactionMut, chunk: &str) -> Result<()> {
        let len = self.len(&*txn)?;
        self.insert(txn, len, chunk)
    }

    /// Removes `len` characters starting at character offset `index`.
    pub fn remove_range(&self, txn: &mut TransactionMut, index: usize, len: usize) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        store.seq_remove(self.0.id(), index, len, ds)
    }

    /// Length in characters.
    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<usize> {
        Ok(self.0.store(txn)?.seq_len(self.0.id()))
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Iterates over a snapshot of the characters.
    pub fn chars<'txn, T: ReadTxn + ?Sized>(&self, txn: &'txn T) -> Result<TextChars<'txn>> {
        let store = self.0.store(txn)?;
        let chars = store
            .seq(self.0.id())
            .filter_map(|ptr| match store.item(ptr).block.content {
                Content::Char(c) => Some(c),
                _ => None,
            })
            .collect();
        Ok(Iter::new(chars))
    }
}
