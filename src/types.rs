// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Shared types
//!
//! Handles to the branches of a document. Every handle is a cheap, cloneable reference that only
//! stores the identity of its branch; the content itself lives in the document and is read and
//! written through transactions:
//!
//! - [`MapRef`]: string keys mapping to values or nested branches.
//! - [`ArrayRef`]: an ordered sequence of values or nested branches.
//! - [`TextRef`]: a string, addressed by Unicode scalar offsets.
//! - [`XmlFragmentRef`], [`XmlElementRef`], [`XmlTextRef`]: an XML tree.
//!
//! Reads take any [`ReadTxn`], writes a [`TransactionMut`]. Using a handle with a transaction of a
//! different document, or a handle to a nested branch that does not exist in the transaction's
//! view of the document (for instance one created by a rolled back transaction), fails with
//! [`Error::InvalidHandle`].
//!
//! ```rust
//! use crdoc::{Doc, ReadTxn};
//!
//! let doc = Doc::with_client_id(1);
//! let map = doc.get_or_insert_map("config")?;
//!
//! let mut txn = doc.try_transact_mut()?;
//! map.insert(&mut txn, "retries", 3)?;
//! txn.commit()?;
//!
//! let txn = doc.try_transact()?;
//! assert_eq!(map.get(&txn, "retries")?.and_then(|v| v.as_i64()), Some(3));
//! # Ok::<(), crdoc::Error>(())
//! ```
use crate::{
    block::BranchId,
    error::{Error, Result},
    id_set::IdSet,
    store::Store,
    transaction::{ReadTxn, TransactionMut},
    value::Out,
};
use std::fmt;

pub mod array;
pub mod map;
pub mod text;
pub mod xml;

pub use array::ArrayRef;
pub use map::{MapEntry, MapRef};
pub use text::TextRef;
pub use xml::{XmlElementRef, XmlFragmentRef, XmlTextRef};

/// The kind of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum BranchKind {
    Map,
    Array,
    Text,
    XmlFragment,
    XmlElement,
    XmlText,
}

impl BranchKind {
    pub(crate) const ALL: [BranchKind; 6] = [
        BranchKind::Map,
        BranchKind::Array,
        BranchKind::Text,
        BranchKind::XmlFragment,
        BranchKind::XmlElement,
        BranchKind::XmlText,
    ];

    /// Wire tag of this kind.
    pub(crate) const fn tag(self) -> u8 {
        match self {
            BranchKind::Map => 0,
            BranchKind::Array => 1,
            BranchKind::Text => 2,
            BranchKind::XmlFragment => 3,
            BranchKind::XmlElement => 4,
            BranchKind::XmlText => 5,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BranchKind::Map => "map",
            BranchKind::Array => "array",
            BranchKind::Text => "text",
            BranchKind::XmlFragment => "xml fragment",
            BranchKind::XmlElement => "xml element",
            BranchKind::XmlText => "xml text",
        })
    }
}

#[cfg(any(test, feature = "arbitrary"))]
impl quickcheck::Arbitrary for BranchKind {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        *g.choose(&Self::ALL).unwrap()
    }
}

/// Untyped handle to a branch of a specific document.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BranchRef {
    doc: u64,
    id: BranchId,
    kind: BranchKind,
}

impl fmt::Debug for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.id)
    }
}

impl BranchRef {
    pub(crate) fn new(doc: u64, id: BranchId, kind: BranchKind) -> Self {
        Self { doc, id, kind }
    }

    /// Identifier of the document this branch belongs to.
    pub fn doc_id(&self) -> u64 {
        self.doc
    }

    pub fn id(&self) -> &BranchId {
        &self.id
    }

    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    /// Wraps this handle into the typed [`Out`] variant matching its kind.
    pub fn into_out(self) -> Out {
        match self.kind {
            BranchKind::Map => Out::Map(MapRef(self)),
            BranchKind::Array => Out::Array(ArrayRef(self)),
            BranchKind::Text => Out::Text(TextRef(self)),
            BranchKind::XmlFragment => Out::XmlFragment(XmlFragmentRef(self)),
            BranchKind::XmlElement => Out::XmlElement(XmlElementRef(self)),
            BranchKind::XmlText => Out::XmlText(XmlTextRef(self)),
        }
    }

    /// The store of `txn`, after checking this handle belongs to it.
    pub(crate) fn store<'t, T>(&self, txn: &'t T) -> Result<&'t Store>
    where
        T: ReadTxn + ?Sized,
    {
        let store = txn.store()?;
        self.check(store)?;
        Ok(store)
    }

    /// Mutable access to the store of `txn` and its delete set.
    pub(crate) fn store_mut<'t>(
        &self,
        txn: &'t mut TransactionMut,
    ) -> Result<(&'t mut Store, &'t mut IdSet)> {
        let (store, ds) = txn.parts_mut()?;
        self.check(store)?;
        Ok((store, ds))
    }

    fn check(&self, store: &Store) -> Result<()> {
        if store.doc_id() != self.doc {
            return Err(Error::InvalidHandle);
        }
        store.validate_branch(&self.id, self.kind)
    }
}

/// Defines a typed newtype over [`BranchRef`].
macro_rules! branch_ref {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) $crate::types::BranchRef);

        impl $name {
            /// The untyped handle.
            pub fn branch(&self) -> &$crate::types::BranchRef {
                &self.0
            }

            pub fn id(&self) -> &$crate::block::BranchId {
                self.0.id()
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0.id())
            }
        }

        impl From<$name> for $crate::types::BranchRef {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<$crate::types::BranchRef> for $name {
            type Error = $crate::types::BranchRef;

            fn try_from(
                value: $crate::types::BranchRef,
            ) -> ::std::result::Result<Self, Self::Error> {
                if value.kind() == $crate::types::BranchKind::$kind {
                    Ok(Self(value))
                } else {
                    Err(value)
                }
            }
        }

        impl From<$name> for $crate::value::Out {
            fn from(value: $name) -> Self {
                value.0.into_out()
            }
        }
    };
}
pub(crate) use branch_ref;

#[cfg(test)]
mod tests {
    use super::*;

    #[quickcheck]
    fn kind_tags_round_trip(kind: BranchKind) -> bool {
        BranchKind::from_tag(kind.tag()) == Some(kind)
    }

    #[test]
    fn unknown_kind_tags() {
        assert_eq!(BranchKind::from_tag(6), None);
        assert_eq!(BranchKind::from_tag(u8::MAX), None);
    }

    #[test]
    fn typed_conversion_checks_kind() {
        let branch = BranchRef::new(0, BranchId::Root("m".into()), BranchKind::Map);
        assert!(MapRef::try_from(branch.clone()).is_ok());
        assert!(ArrayRef::try_from(branch.clone()).is_err());
        assert!(matches!(branch.into_out(), Out::Map(_)));
    }
}
