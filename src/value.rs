// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Values
//!
//! Three closely related types describe the content of a document:
//!
//! - [`Value`]: a JSON-like scalar (plus byte buffers and `undefined`). Scalars are stored as-is
//!   inside items and never merged; a concurrent overwrite replaces the whole value.
//! - [`In`]: what callers hand to insert operations. Either a [`Value`] or a *preliminary* nested
//!   container, that is, the initial content of a map, array, text or XML node that will be turned
//!   into a new nested branch when inserted.
//! - [`Out`]: what read operations hand back. Either an owned copy of a [`Value`] or a handle to a
//!   nested branch (for example a [`MapRef`]), which can be used with later transactions of the
//!   same document.
//!
//! Conversions from Rust primitives exist for all three, so most call sites can pass plain
//! literals:
//!
//! ```rust
//! # use crdoc::{In, Value};
//! assert_eq!(Value::from("hello"), "hello");
//! assert_eq!(Value::from(42), 42);
//! assert!(matches!(In::from(true), In::Any(Value::Bool(true))));
//! ```
use crate::types::{
    ArrayRef, BranchKind, BranchRef, MapRef, TextRef, XmlElementRef, XmlFragmentRef, XmlTextRef,
};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

/// A scalar stored in a document.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Value {
    /// Absence of a value that is distinct from `null`.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    // NOTE: the #[serde] here gives compact byte-array encodings in formats that support them.
    Buffer(#[cfg_attr(feature = "serde", serde(with = "serde_bytes"))] Vec<u8>),
}

impl Value {
    /// Short lowercase name of the variant, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Buffer(_) => "buffer",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(inner) => inner.fmt(f),
            Self::Int(inner) => write!(f, "{inner}"),
            // always print a decimal point so floats and ints can be told apart
            Self::Float(inner) => write!(f, "{inner:?}"),
            Self::String(inner) => inner.fmt(f),
            Self::Buffer(inner) => write!(f, "{inner:02X?}"),
        }
    }
}

/// Renders strings without quotes, everything else as in [`fmt::Debug`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(inner) => f.write_str(inner),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(b1), Bool(b2)) => b1 == b2,
            (Int(i1), Int(i2)) => i1 == i2,
            (Float(f1), Float(f2)) => f1.total_cmp(f2).is_eq(),
            (String(s1), String(s2)) => s1 == s2,
            (Buffer(b1), Buffer(b2)) => b1 == b2,
            _ => false,
        }
    }
}
impl Eq for Value {}

macro_rules! impl_from {
(
    $(
        $source:ty => $target:ident $(with $conv:ident)?
    ),* $(,)?
    ) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$target(impl_from!(value$(, $conv)?))
                }
            }
        )*
    };

    ($value:ident, $conv:ident) => {
        $value.$conv()
    };

    ($value:ident) => {
        $value
    };
}

impl_from!(
    &[u8]      => Buffer with into,
    Vec<u8>    => Buffer,
    String     => String,
    &str       => String with to_string,
    &String    => String with clone,
    f64        => Float,
    f32        => Float with into,
    u8         => Int with into,
    u16        => Int with into,
    u32        => Int with into,
    i8         => Int with into,
    i16        => Int with into,
    i32        => Int with into,
    i64        => Int,
    bool       => Bool,
);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

macro_rules! impl_partial_eq {
    ({$($t:ty),+}) => {
        $(impl_partial_eq!($t);)+
    };

    ($t:ty) => {
        impl PartialEq<$t> for Value {
            fn eq(&self, other: &$t) -> bool {
                *self == Value::from(other.clone())
            }
        }
    };
}
impl_partial_eq!({&[u8], &str, String, bool, f64, i64});
// i32 because it's the "default" inference integer type
impl_partial_eq!(i32);

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Self::String(s) if s == other)
    }
}
impl PartialEq<[u8]> for Value {
    fn eq(&self, other: &[u8]) -> bool {
        matches!(self, Self::Buffer(b) if b == other)
    }
}
// byte literals
impl<const N: usize> PartialEq<&[u8; N]> for Value {
    fn eq(&self, other: &&[u8; N]) -> bool {
        matches!(self, Self::Buffer(b) if b == other)
    }
}

/// Input to insert operations.
///
/// The container variants describe the initial content of a new nested branch. Inserting one
/// creates the branch together with its content in the same transaction, and the insert call
/// returns an [`Out`] handle to the new branch.
#[derive(Debug, Clone, PartialEq)]
pub enum In {
    Any(Value),
    Map(BTreeMap<String, In>),
    Array(Vec<In>),
    Text(String),
    XmlFragment(Vec<XmlNode>),
    XmlElement(XmlElementPrelim),
    XmlText(String),
}

/// Initial content of a new XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElementPrelim {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
}

/// A preliminary child of an XML fragment or element.
///
/// XML branches only ever hold elements and text nodes, so they take this type instead of [`In`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElementPrelim),
    Text(String),
}

impl From<XmlElementPrelim> for XmlNode {
    fn from(value: XmlElementPrelim) -> Self {
        XmlNode::Element(value)
    }
}

impl From<String> for XmlNode {
    fn from(value: String) -> Self {
        XmlNode::Text(value)
    }
}

impl From<&str> for XmlNode {
    fn from(value: &str) -> Self {
        XmlNode::Text(value.to_owned())
    }
}

impl From<XmlNode> for In {
    fn from(value: XmlNode) -> Self {
        match value {
            XmlNode::Element(element) => In::XmlElement(element),
            XmlNode::Text(text) => In::XmlText(text),
        }
    }
}

impl XmlElementPrelim {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Appends a child element, or a text node for strings.
    pub fn with_child(mut self, child: impl Into<XmlNode>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl Eq for In {}

impl In {
    /// An empty preliminary map.
    pub fn map() -> Self {
        In::Map(BTreeMap::new())
    }

    /// An empty preliminary array.
    pub fn array() -> Self {
        In::Array(Vec::new())
    }

    /// A preliminary text with the given initial content.
    pub fn text(content: impl Into<String>) -> Self {
        In::Text(content.into())
    }

    /// The branch kind this input creates, or `None` for scalars.
    pub fn kind(&self) -> Option<BranchKind> {
        match self {
            In::Any(_) => None,
            In::Map(_) => Some(BranchKind::Map),
            In::Array(_) => Some(BranchKind::Array),
            In::Text(_) => Some(BranchKind::Text),
            In::XmlFragment(_) => Some(BranchKind::XmlFragment),
            In::XmlElement(_) => Some(BranchKind::XmlElement),
            In::XmlText(_) => Some(BranchKind::XmlText),
        }
    }
}

impl Default for In {
    fn default() -> Self {
        In::Any(Value::Undefined)
    }
}

impl From<Value> for In {
    fn from(value: Value) -> Self {
        In::Any(value)
    }
}

macro_rules! impl_in_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for In {
                fn from(value: $t) -> Self {
                    In::Any(Value::from(value))
                }
            }
        )*
    };
}
impl_in_from_value!(
    &[u8], Vec<u8>, String, &str, &String, f64, f32, u8, u16, u32, i8, i16, i32, i64, bool, (),
);

impl<T> From<Option<T>> for In
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        In::Any(value.into())
    }
}

impl From<Vec<In>> for In {
    fn from(value: Vec<In>) -> Self {
        In::Array(value)
    }
}

impl From<BTreeMap<String, In>> for In {
    fn from(value: BTreeMap<String, In>) -> Self {
        In::Map(value)
    }
}

impl<S> From<HashMap<String, In, S>> for In {
    fn from(value: HashMap<String, In, S>) -> Self {
        In::Map(value.into_iter().collect())
    }
}

impl From<XmlElementPrelim> for In {
    fn from(value: XmlElementPrelim) -> Self {
        In::XmlElement(value)
    }
}

/// Output of read operations: an owned scalar or a handle to a nested branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Out {
    Any(Value),
    Map(MapRef),
    Array(ArrayRef),
    Text(TextRef),
    XmlFragment(XmlFragmentRef),
    XmlElement(XmlElementRef),
    XmlText(XmlTextRef),
}

impl Eq for Out {}

impl Out {
    /// The scalar, if this is not a branch.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Out::Any(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Out::Any(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.value().and_then(Value::as_bytes)
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Out::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Out::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextRef> {
        match self {
            Out::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_xml_fragment(&self) -> Option<&XmlFragmentRef> {
        match self {
            Out::XmlFragment(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_xml_element(&self) -> Option<&XmlElementRef> {
        match self {
            Out::XmlElement(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_xml_text(&self) -> Option<&XmlTextRef> {
        match self {
            Out::XmlText(x) => Some(x),
            _ => None,
        }
    }

    /// The untyped branch handle, or the scalar if this is not a branch.
    pub fn try_into_branch(self) -> Result<BranchRef, Value> {
        match self {
            Out::Any(v) => Err(v),
            Out::Map(b) => Ok(b.into()),
            Out::Array(b) => Ok(b.into()),
            Out::Text(b) => Ok(b.into()),
            Out::XmlFragment(b) => Ok(b.into()),
            Out::XmlElement(b) => Ok(b.into()),
            Out::XmlText(b) => Ok(b.into()),
        }
    }

    /// The branch kind of the handle, or `None` for scalars.
    pub fn kind(&self) -> Option<BranchKind> {
        match self {
            Out::Any(_) => None,
            Out::Map(_) => Some(BranchKind::Map),
            Out::Array(_) => Some(BranchKind::Array),
            Out::Text(_) => Some(BranchKind::Text),
            Out::XmlFragment(_) => Some(BranchKind::XmlFragment),
            Out::XmlElement(_) => Some(BranchKind::XmlElement),
            Out::XmlText(_) => Some(BranchKind::XmlText),
        }
    }
}

/// Scalars render as in [`Value`]'s `Display`, branch handles as in their `Debug`.
impl fmt::Display for Out {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Out::Any(v) => fmt::Display::fmt(v, f),
            Out::Map(b) => write!(f, "{b:?}"),
            Out::Array(b) => write!(f, "{b:?}"),
            Out::Text(b) => write!(f, "{b:?}"),
            Out::XmlFragment(b) => write!(f, "{b:?}"),
            Out::XmlElement(b) => write!(f, "{b:?}"),
            Out::XmlText(b) => write!(f, "{b:?}"),
        }
    }
}

impl From<Value> for Out {
    fn from(value: Value) -> Self {
        Out::Any(value)
    }
}

macro_rules! impl_out_partial_eq {
    ($($t:ty),+ $(,)?) => {
        $(
            impl PartialEq<$t> for Out {
                fn eq(&self, other: &$t) -> bool {
                    matches!(self, Out::Any(v) if v == other)
                }
            }
        )+
    };
}
impl_out_partial_eq!(Value, str, &str, String, [u8], &[u8], bool, f64, i64, i32);

#[cfg(any(test, feature = "arbitrary"))]
impl quickcheck::Arbitrary for Value {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        match *g
            .choose(&[0u8, 1, 2, 3, 4, 5, 6])
            .expect("choices are non-empty")
        {
            0 => Value::Undefined,
            1 => Value::Null,
            2 => Value::Bool(bool::arbitrary(g)),
            3 => Value::Int(i64::arbitrary(g)),
            4 => Value::Float(f64::arbitrary(g)),
            5 => Value::String(String::arbitrary(g)),
            _ => Value::Buffer(Vec::arbitrary(g)),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Value::String(s) => Box::new(s.shrink().map(Value::String)),
            Value::Buffer(b) => Box::new(b.shrink().map(Value::Buffer)),
            Value::Int(i) => Box::new(i.shrink().map(Value::Int)),
            _ => quickcheck::empty_shrinker(),
        }
    }
}
