// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Internal representation of document content.
//!
//! A [`Block`] is the unit of content that travels between replicas: it carries its own [`Id`],
//! the ids of its left and right neighbours at the time it was created (its *origins*), the
//! branch it belongs to, and its payload. An [`Item`] is a block after integration into a store,
//! extended with the links to its current neighbours and a deletion flag.
//!
//! Every block holds exactly one unit of content (one array element, one character or one
//! nested branch), so clocks map one-to-one onto blocks.
use crate::{
    id::Id,
    types::BranchKind,
    value::Value,
};
use std::{fmt, sync::Arc};

/// Index of an [`Item`] inside its store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ItemPtr(pub(crate) usize);

impl fmt::Debug for ItemPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Stable identity of a branch within a document.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchId {
    /// A top-level branch registered under a name.
    Root(Arc<str>),
    /// A branch nested inside another one, identified by the item that created it.
    Nested(Id),
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchId::Root(name) => write!(f, "{name:?}"),
            BranchId::Nested(id) => write!(f, "<{id:?}>"),
        }
    }
}

/// Payload of a block.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Content {
    /// An array element or a map value.
    Any(Value),
    /// A single character of a text.
    Char(char),
    /// A nested branch. XML elements carry their tag name.
    Type {
        kind: BranchKind,
        tag: Option<Arc<str>>,
    },
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Any(v) => write!(f, "{v:?}"),
            Content::Char(c) => write!(f, "{c:?}"),
            Content::Type { kind, tag: None } => write!(f, "<{kind}>"),
            Content::Type {
                kind,
                tag: Some(tag),
            } => write!(f, "<{kind} {tag}>"),
        }
    }
}

/// A unit of content as it is exchanged between replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    pub id: Id,
    /// Id of the left neighbour when this block was created.
    pub origin: Option<Id>,
    /// Id of the right neighbour when this block was created.
    pub right_origin: Option<Id>,
    pub parent: BranchId,
    /// The map key, if this block is a map entry rather than a sequence element.
    pub parent_sub: Option<Arc<str>>,
    pub content: Content,
}

impl Block {
    /// The branch this block creates, if any.
    pub fn nested_branch(&self) -> Option<BranchId> {
        matches!(self.content, Content::Type { .. }).then_some(BranchId::Nested(self.id))
    }
}

/// A [`Block`] integrated into a store.
#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub block: Block,
    pub left: Option<ItemPtr>,
    pub right: Option<ItemPtr>,
    pub deleted: bool,
}

impl Item {
    pub fn id(&self) -> Id {
        self.block.id
    }

    /// True if `other` lives in the same branch and under the same map key.
    pub fn is_sibling_of(&self, other: &Block) -> bool {
        self.block.parent == other.parent && self.block.parent_sub == other.parent_sub
    }
}

#[cfg(any(test, feature = "arbitrary"))]
mod arbitrary {
    use super::*;
    use quickcheck::{Arbitrary, Gen};

    impl Arbitrary for BranchId {
        fn arbitrary(g: &mut Gen) -> Self {
            if bool::arbitrary(g) {
                let name = g.choose(&["a", "b", "notes"]).copied().unwrap_or("a");
                BranchId::Root(Arc::from(name))
            } else {
                BranchId::Nested(Id::new(
                    u64::from(u8::arbitrary(g) % 4),
                    u64::from(u8::arbitrary(g)),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[quickcheck]
    fn roots_sort_before_nested_branches(a: BranchId, b: BranchId) -> bool {
        match (&a, &b) {
            (BranchId::Root(_), BranchId::Nested(_)) => a < b,
            (BranchId::Nested(_), BranchId::Root(_)) => a > b,
            _ => true,
        }
    }

    #[test]
    fn debug_output() {
        assert_eq!(format!("{:?}", BranchId::Root("notes".into())), r#""notes""#);
        let block = Block {
            id: Id::new(1, 0),
            origin: None,
            right_origin: None,
            parent: BranchId::Root("xml".into()),
            parent_sub: None,
            content: Content::Type {
                kind: BranchKind::XmlElement,
                tag: Some("p".into()),
            },
        };
        assert_eq!(format!("{:?}", block.content), "<xml element p>");
        assert_eq!(
            block.nested_branch(),
            Some(BranchId::Nested(Id::new(1, 0)))
        );
    }
}
