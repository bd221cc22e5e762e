// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Transactions over a [`Doc`](crate::Doc).
//!
//! Every read and write of document content happens inside a transaction:
//!
//! - [`Transaction`] is read-only. Any number of them may be open on a document at the same time.
//! - [`TransactionMut`] reads and writes. At most one may be open on a document, and never next to
//!   a read transaction.
//!
//! Opening a transaction never blocks: if the discipline above would be violated, the `try_*`
//! constructors on [`Doc`](crate::Doc) return [`Error::Concurrency`](crate::Error::Concurrency).
//!
//! # Example
//!
//! ```
//! use crdoc::{Doc, ReadTxn};
//!
//! let doc = Doc::with_client_id(1);
//! let text = doc.get_or_insert_text("article")?;
//!
//! let mut txn = doc.try_transact_mut()?;
//! text.push(&mut txn, "hello")?;
//! // the document is locked for everyone else until the transaction ends
//! assert!(doc.try_transact().is_err());
//! let update = txn.commit()?;
//! drop(txn);
//!
//! // replay the change on another replica
//! let remote = Doc::with_client_id(2);
//! let remote_text = remote.get_or_insert_text("article")?;
//! let mut txn = remote.try_transact_mut()?;
//! txn.apply_update(&update.encode_v1())?;
//! assert_eq!(remote_text.get_string(&txn)?, "hello");
//! # Ok::<(), crdoc::Error>(())
//! ```
//!
//! # Transaction Semantics
//!
//! A [`TransactionMut`] applies every operation directly to the locked document state and keeps a
//! journal of what it overwrote, so reads within the transaction see its own uncommitted changes
//! and the cost of a transaction depends on its changes, not on the size of the document.
//!
//! - **On commit**: the journal is discarded, the transaction computes the
//!   [`Update`](crate::Update) describing everything integrated since it began, and update
//!   observers are notified once the document is unlocked again.
//! - **On drop without commit**: the journal is replayed backwards before the lock is released.
//!   Nothing the transaction did becomes visible, so a transaction is never partially committed.
//!
//! After `commit` the transaction is spent: every further operation on it fails with
//! [`Error::InvalidHandle`](crate::Error::InvalidHandle). It still holds no lock, so it can simply
//! be dropped.
use crate::{error::Result, id::StateVector, store::Store, update::Update};
use smallvec::SmallVec;
use std::fmt;

mod read_transaction;
mod write_transaction;

pub use read_transaction::Transaction;
pub use write_transaction::TransactionMut;

/// Read access shared by both transaction kinds.
pub trait ReadTxn {
    /// The document state visible to this transaction.
    #[doc(hidden)]
    fn store(&self) -> Result<&Store>;

    /// What this replica has integrated, per client.
    fn state_vector(&self) -> Result<StateVector> {
        Ok(self.store()?.state_vector())
    }

    /// Encodes [`ReadTxn::state_vector`] for sending to a peer.
    fn encode_state_vector(&self) -> Result<Vec<u8>> {
        Ok(self.state_vector()?.encode_v1())
    }

    /// Encodes everything a peer with state vector `sv` is missing.
    ///
    /// The result always carries the complete set of deletions known to this replica, since the
    /// state vector does not say which of them the peer has seen.
    fn encode_state_as_update(&self, sv: &StateVector) -> Result<Vec<u8>> {
        Ok(self.store()?.diff(sv).encode_v1())
    }

    /// Like [`ReadTxn::encode_state_as_update`], for an encoded state vector.
    fn encode_diff(&self, encoded_sv: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(encoded_sv)?;
        self.encode_state_as_update(&sv)
    }

    /// Computes the same diff as [`ReadTxn::encode_state_as_update`] without encoding it.
    fn diff(&self, sv: &StateVector) -> Result<Update> {
        Ok(self.store()?.diff(sv))
    }

    /// Returns true if remote content is waiting for dependencies that have not arrived yet.
    fn has_pending(&self) -> Result<bool> {
        Ok(self.store()?.has_pending())
    }
}

/// Opaque tag identifying where the changes of a write transaction came from.
///
/// Origins are passed on to update observers and never influence merging.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Origin(SmallVec<[u8; 8]>);

impl Origin {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Origin {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Origin({s:?})"),
            Err(_) => write!(f, "Origin({:02X?})", self.0.as_slice()),
        }
    }
}

impl From<&[u8]> for Origin {
    fn from(value: &[u8]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

impl From<Vec<u8>> for Origin {
    fn from(value: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(value))
    }
}

impl From<&str> for Origin {
    fn from(value: &str) -> Self {
        value.as_bytes().into()
    }
}

impl From<String> for Origin {
    fn from(value: String) -> Self {
        value.into_bytes().into()
    }
}

/// Big-endian bytes of the number.
impl From<u64> for Origin {
    fn from(value: u64) -> Self {
        value.to_be_bytes().as_slice().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_debug_prefers_text() {
        assert_eq!(format!("{:?}", Origin::from("sync")), r#"Origin("sync")"#);
        assert_eq!(
            format!("{:?}", Origin::from(&[0xff, 0x00][..])),
            "Origin([FF, 00])"
        );
        assert_eq!(Origin::from(1u64).as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 1]);
    }
}
