// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Iteration
//!
//! All containers share one iterator type, [`Iter`], over a snapshot of their content taken when
//! iteration begins. The iterator borrows the transaction it was created from, so it can neither
//! outlive that transaction nor observe mutations made through it.
//!
//! The protocol is a simple state machine: while [`Iter::has_next`] returns `true`, `next` yields
//! the following element; once the snapshot is exhausted `next` keeps returning `None`.
use std::{iter::FusedIterator, marker::PhantomData, vec};

/// Owned content of a container, captured for iteration.
pub(crate) type Snapshot<T> = Vec<T>;

/// Iterator over a snapshot of a container's content.
///
/// See [`MapRef::iter`](crate::MapRef::iter) and [`ArrayRef::iter`](crate::ArrayRef::iter).
#[derive(Debug, Clone)]
pub struct Iter<'txn, T> {
    inner: vec::IntoIter<T>,
    _txn: PhantomData<&'txn ()>,
}

impl<T> Iter<'_, T> {
    pub(crate) fn new(snapshot: Snapshot<T>) -> Self {
        Self {
            inner: snapshot.into_iter(),
            _txn: PhantomData,
        }
    }

    /// Returns true if another call to `next` will yield an element.
    pub fn has_next(&self) -> bool {
        self.inner.len() != 0
    }
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
