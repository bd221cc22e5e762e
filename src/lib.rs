// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # crdoc: a conflict-free replicated document engine
//!
//! This crate implements an in-memory document that many replicas can edit concurrently and
//! without coordination. Replicas exchange compact binary [`Update`]s, and every replica that has
//! applied the same set of updates holds the same content, regardless of the order in which the
//! updates arrived or how often each was delivered.
//!
//! A [`Doc`] holds a set of named root branches of one of these kinds:
//!
//! - [`MapRef`]: string keys mapping to values or nested branches.
//! - [`ArrayRef`]: an ordered list of values or nested branches.
//! - [`TextRef`]: a string edited by character offsets.
//! - [`XmlFragmentRef`] and [`XmlElementRef`]: trees of XML elements and text.
//!
//! Branches nest: inserting a preliminary container ([`In::Map`], [`In::Array`], …) into a map
//! or array creates a nested branch, which is returned as an [`Out`] handle.
//!
//! ## Merge semantics
//!
//! Sequences (arrays, text and XML children) are ordered with the YATA algorithm. Every inserted
//! item remembers its left and right neighbour at the time it was created, and concurrent
//! insertions between the same neighbours are ordered by the client ids of their authors. This
//! keeps runs of text typed by one author together instead of interleaving them.
//!
//! Map keys are last-writer-wins: a write that observed the previous value of a key always
//! replaces it, and among concurrent writes to the same key the one from the higher client id
//! wins.
//!
//! Deleted content leaves a tombstone behind, which keeps positions of concurrent edits
//! resolvable. Tombstones are never garbage collected.
//!
//! ## Getting Started
//!
//! ```rust
//! use crdoc::{Doc, ReadTxn};
//!
//! // two replicas with distinct client ids
//! let alice = Doc::with_client_id(1);
//! let bob = Doc::with_client_id(2);
//! let alice_list = alice.get_or_insert_array("list")?;
//! let bob_list = bob.get_or_insert_array("list")?;
//!
//! // alice writes and bob receives the change
//! let mut txn = alice.try_transact_mut()?;
//! alice_list.insert_range(&mut txn, 0, ["apples", "bananas"])?;
//! let update = txn.commit()?.encode_v1();
//! drop(txn);
//! let mut txn = bob.try_transact_mut()?;
//! txn.apply_update(&update)?;
//! txn.commit()?;
//! drop(txn);
//!
//! // both edit concurrently
//! let mut txn = alice.try_transact_mut()?;
//! alice_list.push_back(&mut txn, "cherries")?;
//! let from_alice = txn.commit()?.encode_v1();
//! drop(txn);
//! let mut txn = bob.try_transact_mut()?;
//! bob_list.remove(&mut txn, 0)?;
//! let from_bob = txn.commit()?.encode_v1();
//! drop(txn);
//!
//! // after exchanging updates, both replicas agree
//! let mut txn = alice.try_transact_mut()?;
//! txn.apply_update(&from_bob)?;
//! txn.commit()?;
//! drop(txn);
//! let mut txn = bob.try_transact_mut()?;
//! txn.apply_update(&from_alice)?;
//! txn.commit()?;
//! drop(txn);
//!
//! let a = alice.try_transact()?;
//! let b = bob.try_transact()?;
//! let items: Vec<_> = alice_list.iter(&a)?.map(|v| v.to_string()).collect();
//! assert_eq!(items, ["bananas", "cherries"]);
//! assert_eq!(a.state_vector()?, b.state_vector()?);
//! # Ok::<(), crdoc::Error>(())
//! ```
//!
//! ## Synchronizing replicas
//!
//! Besides forwarding every committed update, two replicas can catch up with each other by
//! exchanging state vectors: [`ReadTxn::encode_state_vector`] summarizes what a replica has, and
//! [`ReadTxn::encode_state_as_update`] produces exactly what a peer with a given state vector is
//! missing. Updates may arrive out of order: content whose dependencies are missing is kept back
//! and integrated as soon as they arrive (see [`ReadTxn::has_pending`]).
//!
//! **This crate does not include any networking.** Delivering updates is up to the application.
//!
//! ## Bindings
//!
//! The [`handle`] module wraps the API into a registry of generation-checked integer handles,
//! which is the shape foreign-function interfaces need.
//!
//! ## Features
//!
//! - `json`: Conversion of values and branches into `serde_json::Value`. Enabled by default.
//! - `serde`: `serde` support for values, ids and state vectors.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for values, useful for property-based
//!   testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make performance benchmarks have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

mod block;
pub use block::BranchId;
mod doc;
pub use doc::{Doc, Options, Subscription, UpdateEvent};
pub mod error;
pub use error::{CodecError, Error, Result};
pub mod handle;
mod id;
pub use id::{ClientId, Id, StateVector};
mod id_set;
pub use id_set::IdSet;
pub mod iter;
pub use iter::Iter;
#[cfg(feature = "json")]
pub mod json;
/// Macros for building input values.
pub mod macros;
mod store;
pub mod transaction;
pub use transaction::{Origin, ReadTxn, Transaction, TransactionMut};
pub mod types;
pub use types::{
    ArrayRef, BranchKind, BranchRef, MapEntry, MapRef, TextRef, XmlElementRef, XmlFragmentRef,
    XmlTextRef,
};
pub mod update;
pub use update::Update;
mod value;
pub use value::{In, Out, Value, XmlElementPrelim, XmlNode};

#[cfg(test)]
mod test_util;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, DocRandomState> {
    std::collections::HashMap::with_hasher(DocRandomState::default())
}

/// A small wrapper around the ahash RandomState, switched to a fixed seed by
/// [`enable_determinism`].
#[derive(Clone)]
pub struct DocRandomState {
    inner: RandomState,
}

impl Default for DocRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for DocRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
