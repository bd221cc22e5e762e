// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Shared XML trees.
//!
//! An [`XmlFragmentRef`] is an ordered list of child nodes. An [`XmlElementRef`] additionally has
//! a tag name and string attributes, and an [`XmlTextRef`] is a text node. Children are either
//! elements or text nodes.
//!
//! The tag of a nested element is fixed when it is created. A root element uses its root name as
//! its tag.
use super::{BranchKind, BranchRef, branch_ref};
use crate::{
    block::{BranchId, Content},
    error::Result,
    iter::Iter,
    store::Store,
    transaction::{ReadTxn, TransactionMut},
    value::{In, Out, Value, XmlElementPrelim, XmlNode},
};
use std::{fmt, sync::Arc};

branch_ref!(
    /// Handle to a shared XML fragment.
    XmlFragmentRef => XmlFragment
);

branch_ref!(
    /// Handle to a shared XML element.
    XmlElementRef => XmlElement
);

branch_ref!(
    /// Handle to a shared XML text node.
    XmlTextRef => XmlText
);

/// Iterator over the children of an XML node.
pub type XmlChildren<'txn> = Iter<'txn, Out>;

/// Operations shared by fragments and elements.
macro_rules! xml_children {
    ($name:ident) => {
        impl $name {
            /// Inserts a new element with the given tag at `index`.
            pub fn insert_element(
                &self,
                txn: &mut TransactionMut,
                index: usize,
                tag: impl Into<String>,
            ) -> Result<XmlElementRef> {
                let prelim = In::XmlElement(XmlElementPrelim::new(tag));
                match insert_child(&self.0, txn, index, prelim)? {
                    Out::XmlElement(element) => Ok(element),
                    _ => Err(crate::Error::InvalidHandle),
                }
            }

            /// Inserts a new text node with the given content at `index`.
            pub fn insert_text(
                &self,
                txn: &mut TransactionMut,
                index: usize,
                content: impl Into<String>,
            ) -> Result<XmlTextRef> {
                match insert_child(&self.0, txn, index, In::XmlText(content.into()))? {
                    Out::XmlText(text) => Ok(text),
                    _ => Err(crate::Error::InvalidHandle),
                }
            }

            /// Inserts a preliminary element or text node at `index`.
            pub fn insert(
                &self,
                txn: &mut TransactionMut,
                index: usize,
                node: impl Into<XmlNode>,
            ) -> Result<Out> {
                insert_child(&self.0, txn, index, node.into().into())
            }

            /// Fails with [`Error::Range`](crate::Error::Range) if `index` is out of bounds.
            pub fn get<T: ReadTxn + ?Sized>(&self, txn: &T, index: usize) -> Result<Out> {
                let store = self.0.store(txn)?;
                let ptr = store.seq_get(self.0.id(), index)?;
                Ok(store.out(ptr))
            }

            /// Number of children.
            pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<usize> {
                Ok(self.0.store(txn)?.seq_len(self.0.id()))
            }

            pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<bool> {
                Ok(self.len(txn)? == 0)
            }

            /// Removes `len` children starting at `index`.
            pub fn remove_range(
                &self,
                txn: &mut TransactionMut,
                index: usize,
                len: usize,
            ) -> Result<()> {
                let (store, ds) = self.0.store_mut(txn)?;
                store.seq_remove(self.0.id(), index, len, ds)
            }

            /// Iterates over a snapshot of the children.
            pub fn children<'txn, T: ReadTxn + ?Sized>(
                &self,
                txn: &'txn T,
            ) -> Result<XmlChildren<'txn>> {
                let store = self.0.store(txn)?;
                Ok(Iter::new(
                    store.seq(self.0.id()).map(|ptr| store.out(ptr)).collect(),
                ))
            }

            /// Serializes this node and its descendants.
            pub fn get_string<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<String> {
                let store = self.0.store(txn)?;
                Ok(Xml {
                    store,
                    branch: self.0.id(),
                    kind: self.0.kind(),
                }
                .to_string())
            }
        }
    };
}
xml_children!(XmlFragmentRef);
xml_children!(XmlElementRef);

/// Inserts an element or text node into a fragment or element.
fn insert_child(
    parent: &BranchRef,
    txn: &mut TransactionMut,
    index: usize,
    node: In,
) -> Result<Out> {
    let (store, ds) = parent.store_mut(txn)?;
    let ptr = store.seq_insert_one(parent.id(), index, node, ds)?;
    Ok(store.out(ptr))
}

impl XmlElementRef {
    /// The tag name of this element.
    pub fn tag<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<String> {
        let store = self.0.store(txn)?;
        Ok(store
            .tag(self.0.id())
            .map(|tag| tag.to_string())
            .unwrap_or_default())
    }

    /// Sets attribute `name` to `value`, replacing any previous value.
    pub fn insert_attribute(
        &self,
        txn: &mut TransactionMut,
        name: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        store.map_insert(self.0.id(), name, In::Any(Value::String(value.into())), ds);
        Ok(())
    }

    pub fn get_attribute<T: ReadTxn + ?Sized>(
        &self,
        txn: &T,
        name: &str,
    ) -> Result<Option<String>> {
        let store = self.0.store(txn)?;
        Ok(store
            .map_get(self.0.id(), name)
            .and_then(|ptr| attribute_value(store, ptr)))
    }

    /// Removes attribute `name`. Returns `true` if it was set.
    pub fn remove_attribute(&self, txn: &mut TransactionMut, name: &str) -> Result<bool> {
        let (store, ds) = self.0.store_mut(txn)?;
        Ok(store.map_remove(self.0.id(), name, ds))
    }

    /// All attributes, sorted by name.
    pub fn attributes<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<Vec<(String, String)>> {
        let store = self.0.store(txn)?;
        Ok(store
            .map_entries(self.0.id())
            .into_iter()
            .filter_map(|(name, ptr)| Some((name.to_string(), attribute_value(store, ptr)?)))
            .collect())
    }
}

impl XmlTextRef {
    pub fn get_string<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<String> {
        Ok(self.0.store(txn)?.text(self.0.id()))
    }

    /// Inserts `chunk` at character offset `index`.
    pub fn insert(&self, txn: &mut TransactionMut, index: usize, chunk: &str) -> Result<()> {
        let (store, ds) = self.0.store_mut(txn)?;
        store.text_insert(self.0.id(), index, chunk, ds)
    }

    pub fn push(&self, txn: &mut TransactionMut, chunk: &str) -> Result<()> {
        let len = self.len(&*txn)?;
        self.insert(txn, len, chunk)
    }

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
}

fn attribute_value(store: &Store, ptr: crate::block::ItemPtr) -> Option<String> {
    match &store.item(ptr).block.content {
        Content::Any(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Serializes an XML branch.
///
/// Only element and text children are written. Anything else a remote peer placed under an XML
/// branch is skipped.
struct Xml<'a> {
    store: &'a Store,
    branch: &'a BranchId,
    kind: BranchKind,
}

enum Step {
    Node(BranchId, BranchKind),
    Close(Option<Arc<str>>),
}

impl Xml<'_> {
    /// Pushes the XML children of `branch` so that they pop in document order.
    fn push_children(&self, branch: &BranchId, stack: &mut Vec<Step>) {
        let children: Vec<_> = self.store.seq(branch).collect();
        for ptr in children.into_iter().rev() {
            let item = self.store.item(ptr);
            if let Content::Type {
                kind: kind @ (BranchKind::XmlElement | BranchKind::XmlText),
                ..
            } = item.block.content
            {
                stack.push(Step::Node(BranchId::Nested(item.id()), kind));
            }
        }
    }
}

impl fmt::Display for Xml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // elements nest as deep as remote peers make them, so the tree is walked with a stack
        let mut stack = vec![Step::Node(self.branch.clone(), self.kind)];
        while let Some(step) = stack.pop() {
            let (branch, kind) = match step {
                Step::Close(tag) => {
                    write!(f, "</{}>", tag.as_deref().unwrap_or_default())?;
                    continue;
                }
                Step::Node(branch, kind) => (branch, kind),
            };
            match kind {
                BranchKind::XmlElement => {
                    let tag = self.store.tag(&branch);
                    write!(f, "<{}", tag.as_deref().unwrap_or_default())?;
                    for (name, ptr) in self.store.map_entries(&branch) {
                        if let Some(value) = attribute_value(self.store, ptr) {
                            write!(f, " {name}=\"{}\"", Escaped(&value))?;
                        }
                    }
                    f.write_str(">")?;
                    stack.push(Step::Close(tag));
                    self.push_children(&branch, &mut stack);
                }
                BranchKind::XmlText => write!(f, "{}", Escaped(&self.store.text(&branch)))?,
                BranchKind::XmlFragment => self.push_children(&branch, &mut stack),
                BranchKind::Map | BranchKind::Array | BranchKind::Text => {}
            }
        }
        Ok(())
    }
}

/// Writes text with the XML special characters replaced by entities.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(at) = rest.find(['&', '<', '>', '"']) {
            f.write_str(&rest[..at])?;
            f.write_str(match rest.as_bytes()[at] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                _ => "&quot;",
            })?;
            rest = &rest[at + 1..];
        }
        f.write_str(rest)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Doc, Out, XmlElementPrelim};

    #[test]
    fn elements_render_with_sorted_attributes() {
        let doc = Doc::with_client_id(1);
        let fragment = doc.get_or_insert_xml_fragment("xml").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        let p = fragment.insert_element(&mut txn, 0, "p").unwrap();
        p.insert_attribute(&mut txn, "id", "intro").unwrap();
        p.insert_attribute(&mut txn, "class", "lead").unwrap();
        p.insert_text(&mut txn, 0, "hello ").unwrap();
        let b = p.insert_element(&mut txn, 1, "b").unwrap();
        b.insert_text(&mut txn, 0, "world").unwrap();
        fragment.insert_text(&mut txn, 1, "!").unwrap();

        assert_eq!(p.tag(&txn).unwrap(), "p");
        assert_eq!(
            fragment.get_string(&txn).unwrap(),
            r#"<p class="lead" id="intro">hello <b>world</b></p>!"#
        );
        assert_eq!(
            p.attributes(&txn).unwrap(),
            [
                ("class".to_string(), "lead".to_string()),
                ("id".to_string(), "intro".to_string())
            ]
        );
    }

    #[test]
    fn attributes_can_be_removed() {
        let doc = Doc::with_client_id(1);
        let root = doc.get_or_insert_xml_element("div").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        root.insert_attribute(&mut txn, "hidden", "true").unwrap();
        assert_eq!(
            root.get_attribute(&txn, "hidden").unwrap().as_deref(),
            Some("true")
        );
        assert!(root.remove_attribute(&mut txn, "hidden").unwrap());
        assert_eq!(root.get_attribute(&txn, "hidden").unwrap(), None);
        assert_eq!(root.get_string(&txn).unwrap(), "<div></div>");
    }

    #[test]
    fn prelim_elements_carry_their_content() {
        let doc = Doc::with_client_id(1);
        let fragment = doc.get_or_insert_xml_fragment("xml").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        let prelim = XmlElementPrelim::new("a")
            .with_attribute("href", "#")
            .with_child("link")
            .with_child(XmlElementPrelim::new("br"));
        let out = fragment.insert(&mut txn, 0, prelim).unwrap();
        assert!(matches!(out, Out::XmlElement(_)));
        let out = fragment.insert(&mut txn, 1, " after").unwrap();
        assert!(matches!(out, Out::XmlText(_)));
        assert_eq!(
            fragment.get_string(&txn).unwrap(),
            r##"<a href="#">link<br></br></a> after"##
        );
        assert_eq!(fragment.children(&txn).unwrap().len(), 2);
    }

    #[test]
    fn special_characters_are_escaped() {
        let doc = Doc::with_client_id(1);
        let root = doc.get_or_insert_xml_element("p").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        root.insert_attribute(&mut txn, "title", r#"a"b<c"#).unwrap();
        let text = root.insert_text(&mut txn, 0, "1 < 2 & 3 > 0").unwrap();
        assert_eq!(
            root.get_string(&txn).unwrap(),
            r#"<p title="a&quot;b&lt;c">1 &lt; 2 &amp; 3 &gt; 0</p>"#
        );
        // attribute values and text nodes keep their raw content
        assert_eq!(
            root.get_attribute(&txn, "title").unwrap().as_deref(),
            Some(r#"a"b<c"#)
        );
        assert_eq!(text.get_string(&txn).unwrap(), "1 < 2 & 3 > 0");
    }

    #[test]
    fn foreign_children_are_not_rendered() {
        let doc = Doc::with_client_id(1);
        let fragment = doc.get_or_insert_xml_fragment("xml").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        fragment.insert_text(&mut txn, 0, "kept").unwrap();

        // a peer that registered the same root name as an array
        let remote = Doc::with_client_id(2);
        let array = remote.get_or_insert_array("xml").unwrap();
        let mut remote_txn = remote.try_transact_mut().unwrap();
        array.push_back(&mut remote_txn, 42).unwrap();
        array.push_back(&mut remote_txn, crate::In::array()).unwrap();
        let update = remote_txn.commit().unwrap();

        txn.apply(update).unwrap();
        assert_eq!(fragment.len(&txn).unwrap(), 3);
        assert_eq!(fragment.get_string(&txn).unwrap(), "kept");
    }

    #[test]
    fn deep_element_trees_render() {
        let doc = Doc::with_client_id(1);
        let fragment = doc.get_or_insert_xml_fragment("xml").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        let mut element = fragment.insert_element(&mut txn, 0, "d").unwrap();
        for _ in 0..20_000 {
            element = element.insert_element(&mut txn, 0, "d").unwrap();
        }
        element.insert_text(&mut txn, 0, "x").unwrap();
        let xml = fragment.get_string(&txn).unwrap();
        assert_eq!(xml.len(), 20_001 * 7 + 1);
        assert!(xml.starts_with("<d><d>"));
        assert!(xml.contains("<d>x</d>"));
    }

    #[test]
    fn text_nodes_edit_like_text() {
        let doc = Doc::with_client_id(1);
        let fragment = doc.get_or_insert_xml_fragment("xml").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        let text = fragment.insert_text(&mut txn, 0, "ac").unwrap();
        text.insert(&mut txn, 1, "b").unwrap();
        text.push(&mut txn, "d").unwrap();
        text.remove_range(&mut txn, 0, 1).unwrap();
        assert_eq!(text.get_string(&txn).unwrap(), "bcd");
        assert_eq!(text.len(&txn).unwrap(), 3);
    }
}
