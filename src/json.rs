// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! Documents convert to JSON through [`ToJson`], which reads every branch within a transaction:
//!
//! - maps become objects (keys in sorted order) and arrays become arrays,
//! - texts, XML text and XML trees become strings (XML trees in their serialized form),
//! - byte buffers become base64 strings, and both `undefined` and non-finite floats become `null`.
//!
//! In the other direction, any `serde_json::Value` converts into an [`In`], so JSON documents can
//! be inserted as nested maps and arrays.
//!
//! # Example
//!
//! ```
//! use crdoc::{Doc, In, json::ToJson};
//! use serde_json::json;
//!
//! let doc = Doc::with_client_id(1);
//! let profile = doc.get_or_insert_map("profile")?;
//! let mut txn = doc.try_transact_mut()?;
//! profile.insert(&mut txn, "name", "John Doe")?;
//! profile.insert(&mut txn, "phones", In::from(json!(["+44 1234567", "+44 2345678"])))?;
//! txn.commit()?;
//!
//! let txn = doc.try_transact()?;
//! assert_eq!(
//!     doc.to_json(&txn)?,
//!     json!({
//!         "profile": {
//!             "name": "John Doe",
//!             "phones": ["+44 1234567", "+44 2345678"]
//!         }
//!     })
//! );
//! # Ok::<(), crdoc::Error>(())
//! ```
use crate::{
    ArrayRef, BranchRef, Doc, MapRef, Out, ReadTxn, TextRef, Value, XmlElementRef,
    XmlFragmentRef, XmlTextRef, error::Result, value::In,
};

/// Converts a [`Value`] to a [`serde_json::Value`].
impl From<Value> for serde_json::Value {
    fn from(val: Value) -> Self {
        match val {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(v) => v.into(),
            Value::Int(v) => v.into(),
            // non-finite floats have no JSON representation and turn into null
            Value::Float(v) => v.into(),
            Value::String(v) => v.into(),
            Value::Buffer(v) => {
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, v).into()
            }
        }
    }
}

/// Converts JSON into preliminary content: objects become maps, arrays become arrays.
///
/// Integers outside the `i64` range are stored as floats.
impl From<serde_json::Value> for In {
    fn from(val: serde_json::Value) -> Self {
        match val {
            serde_json::Value::Null => In::Any(Value::Null),
            serde_json::Value::Bool(v) => v.into(),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => i.into(),
                None => n.as_f64().map_or(In::Any(Value::Null), In::from),
            },
            serde_json::Value::String(v) => v.into(),
            serde_json::Value::Array(items) => In::Array(items.into_iter().map(In::from).collect()),
            serde_json::Value::Object(entries) => In::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, In::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Reads shared content as a [`serde_json::Value`].
pub trait ToJson {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value>;
}

impl ToJson for Out {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        match self {
            Out::Any(v) => Ok(v.clone().into()),
            Out::Map(m) => m.to_json(txn),
            Out::Array(a) => a.to_json(txn),
            Out::Text(t) => t.to_json(txn),
            Out::XmlFragment(x) => x.to_json(txn),
            Out::XmlElement(x) => x.to_json(txn),
            Out::XmlText(x) => x.to_json(txn),
        }
    }
}

impl ToJson for MapRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        let obj = self
            .iter(txn)?
            .map(|entry| Ok((entry.key, entry.value.to_json(txn)?)))
            .collect::<Result<serde_json::Map<_, _>>>()?;
        Ok(serde_json::Value::Object(obj))
    }
}

impl ToJson for ArrayRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        let arr = self
            .iter(txn)?
            .map(|element| element.to_json(txn))
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::Value::Array(arr))
    }
}

impl ToJson for TextRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        Ok(self.get_string(txn)?.into())
    }
}

impl ToJson for XmlFragmentRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        Ok(self.get_string(txn)?.into())
    }
}

impl ToJson for XmlElementRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        Ok(self.get_string(txn)?.into())
    }
}

impl ToJson for XmlTextRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        Ok(self.get_string(txn)?.into())
    }
}

impl ToJson for BranchRef {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        self.clone().into_out().to_json(txn)
    }
}

/// An object with one entry per registered root branch.
impl ToJson for Doc {
    fn to_json<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<serde_json::Value> {
        let obj = self
            .roots()
            .into_iter()
            .map(|root| {
                let name = match root.id() {
                    crate::BranchId::Root(name) => name.to_string(),
                    crate::BranchId::Nested(id) => id.to_string(),
                };
                Ok((name, root.to_json(txn)?))
            })
            .collect::<Result<serde_json::Map<_, _>>>()?;
        Ok(serde_json::Value::Object(obj))
    }
}
