// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Updates
//!
//! An [`Update`] is a causal delta: the blocks one replica has and another lacks, grouped by
//! client, plus a delete set. Updates are produced by [`TransactionMut::commit`] and
//! [`ReadTxn::encode_state_as_update`], and consumed by [`TransactionMut::apply_update`].
//! Applying an update is idempotent and commutes with every other update, so a transport only
//! needs to deliver each update at least once, in any order.
//!
//! ## Encoding
//!
//! [`Update::encode_v1`] produces a compact binary form. All integers are unsigned LEB128
//! varints unless stated otherwise:
//!
//! ```text
//! update      = version:u8 clients delete_set
//! clients     = n:var { client:var runs }*n          clients ascending
//! runs        = n:var { start_clock:var n:var block*n }*n
//! block       = info:u8 [origin:id] [right_origin:id] parent [key:string] content
//! info        = bit 0: origin, bit 1: right origin, bit 2: map key
//! parent      = 0 name:string | 1 id
//! content     = 0 value | 1 char:var | 2 kind:u8 (0 | 1 tag:string)
//! value       = 0 undefined | 1 null | 2 false | 3 true | 4 zigzag:var | 5 f64le
//!             | 6 string | 7 len:var bytes
//! delete_set  = n:var { client:var n:var { start:var len:var }*n }*n
//! ```
//!
//! Runs hold consecutive clocks, in ascending and non-overlapping order. Decoding validates
//! every tag, length and clock, and rejects trailing bytes.
//!
//! [`TransactionMut::commit`]: crate::TransactionMut::commit
//! [`TransactionMut::apply_update`]: crate::TransactionMut::apply_update
//! [`ReadTxn::encode_state_as_update`]: crate::ReadTxn::encode_state_as_update
use crate::{
    block::Block,
    error::{CodecError, Result},
    id::{ClientId, Id, StateVector},
    id_set::IdSet,
};
use std::{collections::BTreeMap, fmt};

mod decoder;
mod encoder;

use decoder::Decoder;
use encoder::Encoder;

/// The only encoding version understood by this crate.
pub const VERSION_V1: u8 = 1;

/// A set of changes to a document.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Blocks per client, sorted by clock without duplicates.
    blocks: BTreeMap<ClientId, Vec<Block>>,
    delete_set: IdSet,
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("blocks", &self.blocks.values().flatten().collect::<Vec<_>>())
            .field("delete_set", &self.delete_set)
            .finish()
    }
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(blocks: BTreeMap<ClientId, Vec<Block>>, delete_set: IdSet) -> Self {
        Self { blocks, delete_set }
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<ClientId, Vec<Block>>, IdSet) {
        (self.blocks, self.delete_set)
    }

    /// Returns true if applying this update cannot change any document.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.delete_set.is_empty()
    }

    /// Number of items this update inserts.
    pub fn block_count(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Ids of the items this update inserts, ordered by client and clock.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.blocks.values().flatten().map(|block| block.id)
    }

    /// The items this update deletes.
    pub fn delete_set(&self) -> &IdSet {
        &self.delete_set
    }

    /// For every client with items in this update, the clock following its last one.
    pub fn state_vector(&self) -> StateVector {
        self.blocks
            .iter()
            .filter_map(|(&client, blocks)| Some((client, blocks.last()?.id.clock + 1)))
            .collect()
    }

    /// Combines several updates into one that has the same effect as applying all of them.
    pub fn merge<I>(updates: I) -> Self
    where
        I: IntoIterator<Item = Update>,
    {
        let mut merged = Update::new();
        for update in updates {
            for (client, blocks) in update.blocks {
                merged.blocks.entry(client).or_default().extend(blocks);
            }
            merged.delete_set.merge(update.delete_set);
        }
        for blocks in merged.blocks.values_mut() {
            blocks.sort_by_key(|block| block.id.clock);
            blocks.dedup_by_key(|block| block.id.clock);
        }
        merged
    }

    /// Encodes this update in the version 1 layout.
    ///
    /// The encoding is deterministic: equal updates produce equal bytes.
    pub fn encode_v1(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(VERSION_V1);
        encoder.len(self.blocks.len());
        for (&client, blocks) in &self.blocks {
            encoder.var(client);
            let runs = runs(blocks);
            encoder.len(runs.len());
            for run in runs {
                encoder.var(run[0].id.clock);
                encoder.len(run.len());
                for block in run {
                    encoder.block(block);
                }
            }
        }
        encode_id_set(&mut encoder, &self.delete_set);
        encoder.finish()
    }

    /// Decodes an update produced by [`Update::encode_v1`].
    ///
    /// Either the complete input is valid and decoded, or an error is returned.
    pub fn decode_v1(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes, VERSION_V1)?;
        let mut blocks: BTreeMap<ClientId, Vec<Block>> = BTreeMap::new();
        for _ in 0..decoder.len()? {
            let client = decoder.var()?;
            let client_blocks = blocks.entry(client).or_default();
            for _ in 0..decoder.len()? {
                let start = decoder.var()?;
                let expected = client_blocks.last().map_or(0, |b| b.id.clock + 1);
                let n = decoder.len()? as u64;
                if start < expected || start.checked_add(n).is_none() {
                    return Err(CodecError::ClockOrder {
                        client,
                        clock: start,
                    }
                    .into());
                }
                for clock in start..start + n {
                    client_blocks.push(decoder.block(Id::new(client, clock))?);
                }
            }
        }
        blocks.retain(|_, blocks| !blocks.is_empty());
        let delete_set = decode_id_set(&mut decoder)?;
        decoder.finish()?;
        Ok(Self { blocks, delete_set })
    }
}

/// Splits blocks sorted by clock into runs of consecutive clocks.
fn runs(blocks: &[Block]) -> Vec<&[Block]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=blocks.len() {
        if i == blocks.len() || blocks[i].id.clock != blocks[i - 1].id.clock + 1 {
            runs.push(&blocks[start..i]);
            start = i;
        }
    }
    runs
}

fn encode_id_set(encoder: &mut Encoder, set: &IdSet) {
    encoder.len(set.iter().len());
    for (&client, ranges) in set.iter() {
        encoder.var(client);
        encoder.len(ranges.len());
        for range in ranges {
            encoder.var(range.start);
            encoder.var(range.end - range.start);
        }
    }
}

fn decode_id_set(decoder: &mut Decoder<'_>) -> Result<IdSet> {
    let mut set = IdSet::new();
    for _ in 0..decoder.len()? {
        let client = decoder.var()?;
        for _ in 0..decoder.len()? {
            let start = decoder.var()?;
            let len = decoder.var()?;
            let end = start.checked_add(len).ok_or(CodecError::ClockOrder {
                client,
                clock: start,
            })?;
            set.insert_range(client, start..end);
        }
    }
    Ok(set)
}

impl StateVector {
    /// Encodes this state vector as `version n:var { client:var clock:var }*n`.
    pub fn encode_v1(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(VERSION_V1);
        encoder.len(self.len());
        for (&client, &clock) in self {
            encoder.var(client);
            encoder.var(clock);
        }
        encoder.finish()
    }

    pub fn decode_v1(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes, VERSION_V1)?;
        let mut sv = StateVector::new();
        for _ in 0..decoder.len()? {
            let client = decoder.var()?;
            let clock = decoder.var()?;
            sv.set_max(client, clock);
        }
        decoder.finish()?;
        Ok(sv)
    }
}
