// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{
    block::{Block, BranchId, Content},
    id::Id,
    value::Value,
};
use bytes::BufMut;

/// Appends the primitives of the version 1 layout to a byte buffer.
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Starts a new encoding with the version tag already written.
    pub fn new(version: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.put_u8(version);
        Self { buf }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Unsigned LEB128.
    pub fn var(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn len(&mut self, value: usize) {
        self.var(value as u64);
    }

    /// Zigzag-mapped LEB128, so small negative numbers stay short.
    pub fn ivar(&mut self, value: i64) {
        self.var(((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.len(value.len());
        self.buf.put_slice(value);
    }

    pub fn str(&mut self, value: &str) {
        self.bytes(value.as_bytes());
    }

    pub fn id(&mut self, id: Id) {
        self.var(id.client);
        self.var(id.clock);
    }

    pub fn value(&mut self, value: &Value) {
        match value {
            Value::Undefined => self.u8(0),
            Value::Null => self.u8(1),
            Value::Bool(false) => self.u8(2),
            Value::Bool(true) => self.u8(3),
            Value::Int(i) => {
                self.u8(4);
                self.ivar(*i);
            }
            Value::Float(f) => {
                self.u8(5);
                self.f64(*f);
            }
            Value::String(s) => {
                self.u8(6);
                self.str(s);
            }
            Value::Buffer(b) => {
                self.u8(7);
                self.bytes(b);
            }
        }
    }

    /// A block without its id, which the surrounding run implies.
    pub fn block(&mut self, block: &Block) {
        let info = u8::from(block.origin.is_some())
            | u8::from(block.right_origin.is_some()) << 1
            | u8::from(block.parent_sub.is_some()) << 2;
        self.u8(info);
        if let Some(origin) = block.origin {
            self.id(origin);
        }
        if let Some(right_origin) = block.right_origin {
            self.id(right_origin);
        }
        match &block.parent {
            BranchId::Root(name) => {
                self.u8(0);
                self.str(name);
            }
            BranchId::Nested(id) => {
                self.u8(1);
                self.id(*id);
            }
        }
        if let Some(key) = &block.parent_sub {
            self.str(key);
        }
        match &block.content {
            Content::Any(value) => {
                self.u8(0);
                self.value(value);
            }
            Content::Char(c) => {
                self.u8(1);
                self.var(u64::from(u32::from(*c)));
            }
            Content::Type { kind, tag } => {
                self.u8(2);
                self.u8(kind.tag());
                match tag {
                    Some(tag) => {
                        self.u8(1);
                        self.str(tag);
                    }
                    None => self.u8(0),
                }
            }
        }
    }
}
