// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Random editing sessions over several replicas, for property tests of the merge semantics.
use crate::{ArrayRef, Doc, In, MapRef, Out, ReadTxn, TextRef, Update, Value, XmlFragmentRef};
use quickcheck::{Arbitrary, Gen};
use std::fmt::Write;

/// Number of replicas in a [`Session`].
pub(crate) const REPLICAS: usize = 3;

const KEYS: [&str; 3] = ["a", "b", "c"];

const TAGS: [&str; 2] = ["p", "b"];

/// A single edit, or a partial synchronization between two replicas.
#[derive(Clone, Debug)]
pub(crate) enum Op {
    MapInsert { key: usize, value: Value },
    MapInsertArray { key: usize },
    MapRemove { key: usize },
    NestedPush { key: usize, value: Value },
    ArrayInsert { index: usize, values: Vec<Value> },
    ArrayRemove { index: usize, len: usize },
    TextInsert { index: usize, chunk: String },
    TextRemove { index: usize, len: usize },
    XmlInsertElement { index: usize, tag: usize },
    XmlSetAttribute { index: usize, key: usize, value: String },
    /// Edits the text node at `index`, or adds one to the element there.
    XmlTextInsert { index: usize, offset: usize, chunk: String },
    Sync { from: usize },
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        let key = usize::arbitrary(g) % KEYS.len();
        // keep values small so failures stay readable
        let value = match u8::arbitrary(g) % 4 {
            0 => Value::Null,
            1 => Value::Bool(bool::arbitrary(g)),
            2 => Value::Int(i64::from(u8::arbitrary(g))),
            _ => Value::String(char::arbitrary(g).to_string()),
        };
        let chunk: String = String::arbitrary(g).chars().take(4).collect();
        match u8::arbitrary(g) % 12 {
            0 => Op::MapInsert { key, value },
            1 => Op::MapInsertArray { key },
            2 => Op::MapRemove { key },
            3 => Op::NestedPush { key, value },
            4 => Op::ArrayInsert {
                index: usize::arbitrary(g),
                values: vec![value; usize::arbitrary(g) % 3 + 1],
            },
            5 => Op::ArrayRemove {
                index: usize::arbitrary(g),
                len: usize::arbitrary(g),
            },
            6 => Op::TextInsert {
                index: usize::arbitrary(g),
                chunk,
            },
            7 => Op::TextRemove {
                index: usize::arbitrary(g),
                len: usize::arbitrary(g),
            },
            8 => Op::XmlInsertElement {
                index: usize::arbitrary(g),
                tag: usize::arbitrary(g) % TAGS.len(),
            },
            9 => Op::XmlSetAttribute {
                index: usize::arbitrary(g),
                key,
                value: chunk,
            },
            10 => Op::XmlTextInsert {
                index: usize::arbitrary(g),
                offset: usize::arbitrary(g),
                chunk,
            },
            _ => Op::Sync {
                from: usize::arbitrary(g),
            },
        }
    }
}

/// Ops tagged with the replica performing them.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub ops: Vec<(usize, Op)>,
}

impl Arbitrary for Session {
    fn arbitrary(g: &mut Gen) -> Self {
        Self {
            ops: Vec::arbitrary(g),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.ops.shrink().map(|ops| Session { ops }))
    }
}

/// A replica with the root branches used by sessions.
pub(crate) struct Replica {
    pub doc: Doc,
    pub map: MapRef,
    pub array: ArrayRef,
    pub text: TextRef,
    pub xml: XmlFragmentRef,
}

impl Replica {
    pub fn new(client_id: u64) -> Self {
        let doc = Doc::with_client_id(client_id);
        Self {
            map: doc.get_or_insert_map("map").unwrap(),
            array: doc.get_or_insert_array("array").unwrap(),
            text: doc.get_or_insert_text("text").unwrap(),
            xml: doc.get_or_insert_xml_fragment("xml").unwrap(),
            doc,
        }
    }

    /// Performs a local edit in its own transaction and returns the committed update.
    pub fn edit(&self, op: &Op) -> Update {
        let mut txn = self.doc.try_transact_mut().unwrap();
        match op {
            Op::MapInsert { key, value } => {
                self.map
                    .insert(&mut txn, KEYS[*key], value.clone())
                    .unwrap();
            }
            Op::MapInsertArray { key } => {
                self.map.insert(&mut txn, KEYS[*key], In::array()).unwrap();
            }
            Op::MapRemove { key } => {
                self.map.remove(&mut txn, KEYS[*key]).unwrap();
            }
            Op::NestedPush { key, value } => {
                if let Some(Out::Array(nested)) = self.map.get(&txn, KEYS[*key]).unwrap() {
                    nested.push_back(&mut txn, value.clone()).unwrap();
                }
            }
            Op::ArrayInsert { index, values } => {
                let len = self.array.len(&txn).unwrap();
                self.array
                    .insert_range(&mut txn, index % (len + 1), values.clone())
                    .unwrap();
            }
            Op::ArrayRemove { index, len: n } => {
                let len = self.array.len(&txn).unwrap();
                if len > 0 {
                    let index = index % len;
                    let n = n % (len - index) + 1;
                    self.array.remove_range(&mut txn, index, n).unwrap();
                }
            }
            Op::TextInsert { index, chunk } => {
                let len = self.text.len(&txn).unwrap();
                self.text.insert(&mut txn, index % (len + 1), chunk).unwrap();
            }
            Op::TextRemove { index, len: n } => {
                let len = self.text.len(&txn).unwrap();
                if len > 0 {
                    let index = index % len;
                    let n = n % (len - index) + 1;
                    self.text.remove_range(&mut txn, index, n).unwrap();
                }
            }
            Op::XmlInsertElement { index, tag } => {
                let len = self.xml.len(&txn).unwrap();
                self.xml
                    .insert_element(&mut txn, index % (len + 1), TAGS[*tag])
                    .unwrap();
            }
            Op::XmlSetAttribute { index, key, value } => {
                let len = self.xml.len(&txn).unwrap();
                if len > 0 {
                    if let Out::XmlElement(element) = self.xml.get(&txn, index % len).unwrap() {
                        element
                            .insert_attribute(&mut txn, KEYS[*key], value.clone())
                            .unwrap();
                    }
                }
            }
            Op::XmlTextInsert {
                index,
                offset,
                chunk,
            } => {
                let len = self.xml.len(&txn).unwrap();
                if len == 0 {
                    self.xml.insert_text(&mut txn, 0, chunk.clone()).unwrap();
                } else {
                    match self.xml.get(&txn, index % len).unwrap() {
                        Out::XmlText(text) => {
                            let len = text.len(&txn).unwrap();
                            text.insert(&mut txn, offset % (len + 1), chunk).unwrap();
                        }
                        Out::XmlElement(element) => {
                            let len = element.len(&txn).unwrap();
                            element
                                .insert_text(&mut txn, offset % (len + 1), chunk.clone())
                                .unwrap();
                        }
                        _ => {}
                    }
                }
            }
            Op::Sync { .. } => {}
        }
        txn.commit().unwrap()
    }

    /// Pulls everything `other` has that this replica lacks, using state vectors.
    pub fn sync_from(&self, other: &Replica) -> Update {
        let sv = self.doc.try_transact().unwrap().state_vector().unwrap();
        let diff = other
            .doc
            .try_transact()
            .unwrap()
            .encode_state_as_update(&sv)
            .unwrap();
        self.apply(&diff)
    }

    pub fn apply(&self, update: &[u8]) -> Update {
        let mut txn = self.doc.try_transact_mut().unwrap();
        txn.apply_update(update).unwrap();
        txn.commit().unwrap()
    }

    /// Renders all content, recursing into nested branches.
    pub fn render(&self) -> String {
        let txn = self.doc.try_transact().unwrap();
        let mut out = String::new();
        render(&txn, &Out::Map(self.map.clone()), &mut out);
        out.push(' ');
        render(&txn, &Out::Array(self.array.clone()), &mut out);
        out.push(' ');
        render(&txn, &Out::Text(self.text.clone()), &mut out);
        out.push(' ');
        out.push_str(&self.xml.get_string(&txn).unwrap());
        out
    }

    pub fn has_pending(&self) -> bool {
        self.doc.try_transact().unwrap().has_pending().unwrap()
    }
}

fn render(txn: &impl ReadTxn, out: &Out, buf: &mut String) {
    match out {
        Out::Any(value) => write!(buf, "{value:?}").unwrap(),
        Out::Map(map) => {
            buf.push('{');
            for entry in map.iter(txn).unwrap() {
                write!(buf, "{}:", entry.key).unwrap();
                render(txn, &entry.value, buf);
                buf.push(',');
            }
            buf.push('}');
        }
        Out::Array(array) => {
            buf.push('[');
            for element in array.iter(txn).unwrap() {
                render(txn, &element, buf);
                buf.push(',');
            }
            buf.push(']');
        }
        Out::Text(text) => write!(buf, "{:?}", text.get_string(txn).unwrap()).unwrap(),
        other => write!(buf, "{other:?}").unwrap(),
    }
}

/// Runs a session and returns the replicas together with every update they committed.
pub(crate) fn run(session: &Session) -> (Vec<Replica>, Vec<Update>) {
    let replicas: Vec<_> = (1..=REPLICAS as u64).map(Replica::new).collect();
    let mut updates = Vec::new();
    for (replica, op) in &session.ops {
        let target = &replicas[replica % REPLICAS];
        let update = match op {
            Op::Sync { from } => {
                let from = &replicas[from % REPLICAS];
                if std::ptr::eq(from, target) {
                    continue;
                }
                target.sync_from(from)
            }
            op => target.edit(op),
        };
        updates.push(update);
    }
    (replicas, updates)
}
