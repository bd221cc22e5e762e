// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{
    block::{Block, BranchId, Content},
    error::{CodecError, Error, Result},
    id::Id,
    types::BranchKind,
    value::Value,
};
use bytes::Buf;
use std::sync::Arc;

type DecodeResult<T> = Result<T, CodecError>;

/// Reads the primitives of the version 1 layout from a byte slice.
///
/// Every read checks the remaining input first, so truncated or hostile input turns into a
/// [`CodecError`] instead of a panic or an oversized allocation.
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Checks the version tag and positions the decoder after it.
    pub fn new(mut buf: &'a [u8], supported: u8) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(CodecError::UnexpectedEnd.into());
        }
        let found = buf.get_u8();
        if found != supported {
            return Err(Error::Version { found, supported });
        }
        Ok(Self { buf })
    }

    /// Fails if any input is left.
    pub fn finish(self) -> DecodeResult<()> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    pub fn u8(&mut self) -> DecodeResult<u8> {
        if !self.buf.has_remaining() {
            return Err(CodecError::UnexpectedEnd);
        }
        Ok(self.buf.get_u8())
    }

    pub fn var(&mut self) -> DecodeResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            let bits = u64::from(byte & 0x7f);
            if shift == 63 && bits > 1 || shift > 63 {
                return Err(CodecError::VarIntOverflow);
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// A length prefix. Every counted element takes at least one byte, so a length beyond the
    /// remaining input is truncated input.
    pub fn len(&mut self) -> DecodeResult<usize> {
        let len = self.var()?;
        match usize::try_from(len) {
            Ok(len) if len <= self.buf.remaining() => Ok(len),
            _ => Err(CodecError::UnexpectedEnd),
        }
    }

    pub fn ivar(&mut self) -> DecodeResult<i64> {
        let raw = self.var()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    pub fn f64(&mut self) -> DecodeResult<f64> {
        if self.buf.remaining() < 8 {
            return Err(CodecError::UnexpectedEnd);
        }
        Ok(self.buf.get_f64_le())
    }

    pub fn bytes(&mut self) -> DecodeResult<&'a [u8]> {
        let len = self.len()?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn string(&mut self) -> DecodeResult<String> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn shared_str(&mut self) -> DecodeResult<Arc<str>> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(Arc::from)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn id(&mut self) -> DecodeResult<Id> {
        Ok(Id::new(self.var()?, self.var()?))
    }

    pub fn value(&mut self) -> DecodeResult<Value> {
        Ok(match self.u8()? {
            0 => Value::Undefined,
            1 => Value::Null,
            2 => Value::Bool(false),
            3 => Value::Bool(true),
            4 => Value::Int(self.ivar()?),
            5 => Value::Float(self.f64()?),
            6 => Value::String(self.string()?),
            7 => Value::Buffer(self.bytes()?.to_vec()),
            tag => return Err(CodecError::UnknownTag { field: "value", tag }),
        })
    }

    /// The block with the given id, as written by [`Encoder::block`](super::encoder::Encoder::block).
    pub fn block(&mut self, id: Id) -> DecodeResult<Block> {
        let info = self.u8()?;
        if info & !0b111 != 0 {
            return Err(CodecError::UnknownTag {
                field: "block info",
                tag: info,
            });
        }
        let origin = if info & 0b001 != 0 {
            Some(self.id()?)
        } else {
            None
        };
        let right_origin = if info & 0b010 != 0 {
            Some(self.id()?)
        } else {
            None
        };
        let parent = match self.u8()? {
            0 => BranchId::Root(self.shared_str()?),
            1 => BranchId::Nested(self.id()?),
            tag => return Err(CodecError::UnknownTag { field: "parent", tag }),
        };
        let parent_sub = if info & 0b100 != 0 {
            Some(self.shared_str()?)
        } else {
            None
        };
        let content = match self.u8()? {
            0 => Content::Any(self.value()?),
            1 => {
                let code = self.var()?;
                let c = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(CodecError::InvalidChar(code.min(u64::from(u32::MAX)) as u32))?;
                Content::Char(c)
            }
            2 => {
                let tag = self.u8()?;
                let kind = BranchKind::from_tag(tag).ok_or(CodecError::UnknownTag {
                    field: "branch kind",
                    tag,
                })?;
                let tag = match self.u8()? {
                    0 => None,
                    1 => Some(self.shared_str()?),
                    tag => {
                        return Err(CodecError::UnknownTag {
                            field: "element tag",
                            tag,
                        });
                    }
                };
                Content::Type { kind, tag }
            }
            tag => return Err(CodecError::UnknownTag { field: "content", tag }),
        };
        Ok(Block {
            id,
            origin,
            right_origin,
            parent,
            parent_sub,
            content,
        })
    }
}
