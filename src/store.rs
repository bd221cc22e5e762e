// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # The block store
//!
//! A [`Store`] holds every item a replica has integrated, grouped by branch. It is the single
//! place that knows how to position new items among concurrent siblings, and the only place that
//! mutates items.
//!
//! ## Sequences
//!
//! The children of a branch form a doubly linked list starting at [`Branch::start`]. Deleted
//! items stay in the list (there is no garbage collection), which keeps the origins of later items
//! resolvable forever. Concurrent insertions at the same position are ordered with the YATA rules:
//! an item is placed after its origin and before its right origin, and among concurrent items
//! sharing both, the one created by the lower client id goes first.
//!
//! ## Maps
//!
//! Map entries use the same integration, but every key forms its own list. The rightmost item of
//! that list is the live value and all others are deleted, which turns the sequence ordering into
//! last-writer-wins: an overwrite always names the value it replaced as its origin and therefore
//! lands to its right, and among concurrent overwrites the higher client id ends up rightmost.
//!
//! ## Remote content
//!
//! Blocks received from other replicas are integrated once all their causal dependencies are
//! present (the preceding clock of the same client, both origins and the item owning their parent
//! branch). Until then they wait in a pending queue. Deletions of items that have not arrived yet
//! are parked the same way.
//!
//! ## Rollback
//!
//! Write transactions edit the store in place. While a transaction is open the store keeps a
//! journal of the previous value of everything it overwrites, so dropping the transaction can undo
//! its changes in time proportional to the changes, not to the size of the document.
use crate::{
    DocRandomState, create_map,
    block::{Block, BranchId, Content, Item, ItemPtr},
    error::{Error, Result},
    id::{ClientId, Id, StateVector},
    id_set::IdSet,
    types::{BranchKind, BranchRef},
    update::Update,
    value::{In, Out, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    iter,
    sync::Arc,
};
use tracing::{debug, trace};

/// Per-branch bookkeeping of a [`Store`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Branch {
    /// First item of the sequence part of this branch.
    pub start: Option<ItemPtr>,
    /// Rightmost item for every key of the map part of this branch.
    pub map: HashMap<Arc<str>, ItemPtr, DocRandomState>,
    /// Number of live sequence items.
    pub len: usize,
}

/// Whether a remote block can be integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// The block was integrated before.
    Known,
    /// All dependencies are present.
    Ready,
    /// Some dependency has not arrived yet.
    Missing,
}

/// Reverts a single change to a [`Store`].
#[derive(Debug, Clone)]
enum Undo {
    BranchCreated(BranchId),
    Start(BranchId, Option<ItemPtr>),
    Len(BranchId, usize),
    MapHead(BranchId, Arc<str>, Option<ItemPtr>),
    Left(ItemPtr, Option<ItemPtr>),
    Right(ItemPtr, Option<ItemPtr>),
    Deleted(ItemPtr),
    Pending(Vec<Block>, IdSet),
}

/// Changes made since a write transaction began.
#[derive(Debug, Clone)]
struct Journal {
    /// Number of items when the transaction began. Later items are removed on rollback.
    items: usize,
    undo: Vec<Undo>,
}

/// All content of a document, as seen by one replica.
///
/// Only reachable through [`ReadTxn`](crate::ReadTxn).
#[derive(Debug, Clone)]
pub struct Store {
    doc_id: u64,
    client_id: ClientId,
    items: Vec<Item>,
    /// Items of every client, indexed by clock.
    clients: HashMap<ClientId, Vec<ItemPtr>, DocRandomState>,
    branches: HashMap<BranchId, Branch, DocRandomState>,
    /// Remote blocks waiting for missing dependencies, sorted by id.
    pending: Vec<Block>,
    /// Remote deletions of items that have not been integrated yet.
    pending_deletes: IdSet,
    journal: Option<Journal>,
}

impl Store {
    pub(crate) fn new(doc_id: u64, client_id: ClientId) -> Self {
        Self {
            doc_id,
            client_id,
            items: Vec::new(),
            clients: create_map(),
            branches: create_map(),
            pending: Vec::new(),
            pending_deletes: IdSet::new(),
            journal: None,
        }
    }

    /// Starts recording changes so that they can be undone by [`Store::rollback`].
    pub(crate) fn begin(&mut self) {
        self.journal = Some(Journal {
            items: self.items.len(),
            undo: Vec::new(),
        });
    }

    /// Keeps every change made since [`Store::begin`].
    pub(crate) fn settle(&mut self) {
        self.journal = None;
    }

    /// Undoes every change made since [`Store::begin`]. Returns the number of removed items.
    pub(crate) fn rollback(&mut self) -> usize {
        let Some(journal) = self.journal.take() else {
            return 0;
        };
        for undo in journal.undo.into_iter().rev() {
            match undo {
                Undo::BranchCreated(id) => {
                    self.branches.remove(&id);
                }
                Undo::Start(id, start) => {
                    if let Some(branch) = self.branches.get_mut(&id) {
                        branch.start = start;
                    }
                }
                Undo::Len(id, len) => {
                    if let Some(branch) = self.branches.get_mut(&id) {
                        branch.len = len;
                    }
                }
                Undo::MapHead(id, key, head) => {
                    if let Some(branch) = self.branches.get_mut(&id) {
                        match head {
                            Some(ptr) => branch.map.insert(key, ptr),
                            None => branch.map.remove(&key),
                        };
                    }
                }
                Undo::Left(ptr, left) => self.items[ptr.0].left = left,
                Undo::Right(ptr, right) => self.items[ptr.0].right = right,
                Undo::Deleted(ptr) => self.items[ptr.0].deleted = false,
                Undo::Pending(blocks, deletes) => {
                    self.pending = blocks;
                    self.pending_deletes = deletes;
                }
            }
        }
        let removed = self.items.len().saturating_sub(journal.items);
        for item in self.items.drain(journal.items..).rev() {
            let client = item.id().client;
            let emptied = self.clients.get_mut(&client).is_some_and(|ptrs| {
                ptrs.pop();
                ptrs.is_empty()
            });
            if emptied {
                self.clients.remove(&client);
            }
        }
        removed
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = &mut self.journal {
            journal.undo.push(undo);
        }
    }

    /// The bookkeeping of `id`, created if missing.
    fn branch_mut(&mut self, id: &BranchId) -> &mut Branch {
        if !self.branches.contains_key(id) {
            self.record(Undo::BranchCreated(id.clone()));
        }
        self.branches.entry(id.clone()).or_default()
    }

    fn set_left(&mut self, ptr: ItemPtr, left: Option<ItemPtr>) {
        let old = std::mem::replace(&mut self.items[ptr.0].left, left);
        self.record(Undo::Left(ptr, old));
    }

    fn set_right(&mut self, ptr: ItemPtr, right: Option<ItemPtr>) {
        let old = std::mem::replace(&mut self.items[ptr.0].right, right);
        self.record(Undo::Right(ptr, old));
    }

    fn set_start(&mut self, id: &BranchId, start: Option<ItemPtr>) {
        let old = std::mem::replace(&mut self.branch_mut(id).start, start);
        self.record(Undo::Start(id.clone(), old));
    }

    fn set_map_head(&mut self, id: &BranchId, key: Arc<str>, head: ItemPtr) {
        let old = self.branch_mut(id).map.insert(Arc::clone(&key), head);
        self.record(Undo::MapHead(id.clone(), key, old));
    }

    /// Adds `delta` to the number of live sequence items of `id`.
    fn adjust_len(&mut self, id: &BranchId, delta: isize) {
        let branch = self.branch_mut(id);
        let old = branch.len;
        branch.len = old.saturating_add_signed(delta);
        self.record(Undo::Len(id.clone(), old));
    }

    pub(crate) fn doc_id(&self) -> u64 {
        self.doc_id
    }

    pub(crate) fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// The clock the next item of `client` will carry.
    pub(crate) fn next_clock(&self, client: ClientId) -> u64 {
        self.clients.get(&client).map_or(0, |ptrs| ptrs.len() as u64)
    }

    pub(crate) fn state_vector(&self) -> StateVector {
        self.clients
            .iter()
            .map(|(&client, ptrs)| (client, ptrs.len() as u64))
            .collect()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.pending_deletes.is_empty()
    }

    pub(crate) fn find(&self, id: Id) -> Option<ItemPtr> {
        let clock = usize::try_from(id.clock).ok()?;
        self.clients.get(&id.client)?.get(clock).copied()
    }

    pub(crate) fn item(&self, ptr: ItemPtr) -> &Item {
        &self.items[ptr.0]
    }

    fn branch(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.get(id)
    }

    /// Checks that `id` names a branch of this store with the given kind.
    ///
    /// Root branches always exist. Nested branches exist once the item creating them has been
    /// integrated.
    pub(crate) fn validate_branch(&self, id: &BranchId, kind: BranchKind) -> Result<()> {
        match id {
            BranchId::Root(_) => Ok(()),
            BranchId::Nested(item) => match self.find(*item).map(|p| &self.item(p).block.content) {
                Some(Content::Type { kind: k, .. }) if *k == kind => Ok(()),
                _ => Err(Error::InvalidHandle),
            },
        }
    }

    /// The tag of an XML element branch. Root elements are tagged with their name.
    pub(crate) fn tag(&self, id: &BranchId) -> Option<Arc<str>> {
        match id {
            BranchId::Root(name) => Some(name.clone()),
            BranchId::Nested(item) => match &self.item(self.find(*item)?).block.content {
                Content::Type { tag, .. } => tag.clone(),
                _ => None,
            },
        }
    }

    /// Turns the content of an item into an owned output value.
    pub(crate) fn out(&self, ptr: ItemPtr) -> Out {
        let item = self.item(ptr);
        match &item.block.content {
            Content::Any(value) => Out::Any(value.clone()),
            Content::Char(c) => Out::Any(Value::String(c.to_string())),
            Content::Type { kind, .. } => {
                BranchRef::new(self.doc_id, BranchId::Nested(item.id()), *kind).into_out()
            }
        }
    }

    /// Walks the sequence of `branch`, including deleted items.
    fn walk(&self, branch: &BranchId) -> impl Iterator<Item = (ItemPtr, &Item)> + '_ {
        let start = self.branch(branch).and_then(|b| b.start);
        iter::successors(start.map(|p| (p, self.item(p))), |(_, item)| {
            item.right.map(|p| (p, self.item(p)))
        })
    }

    /// Live sequence items of `branch`, in order.
    pub(crate) fn seq(&self, branch: &BranchId) -> impl Iterator<Item = ItemPtr> + '_ {
        self.walk(branch)
            .filter(|(_, item)| !item.deleted)
            .map(|(p, _)| p)
    }

    pub(crate) fn seq_len(&self, branch: &BranchId) -> usize {
        self.branch(branch).map_or(0, |b| b.len)
    }

    pub(crate) fn seq_get(&self, branch: &BranchId, index: usize) -> Result<ItemPtr> {
        let available = self.seq_len(branch);
        if index >= available {
            return Err(Error::Range {
                index,
                len: 1,
                available,
            });
        }
        self.seq(branch).nth(index).ok_or(Error::Range {
            index,
            len: 1,
            available,
        })
    }

    /// Finds the neighbours a new item inserted at `index` goes between.
    fn seq_neighbours(
        &self,
        branch: &BranchId,
        index: usize,
    ) -> Result<(Option<ItemPtr>, Option<ItemPtr>)> {
        let available = self.seq_len(branch);
        if index > available {
            return Err(Error::Range {
                index,
                len: 0,
                available,
            });
        }
        if index == 0 {
            return Ok((None, self.branch(branch).and_then(|b| b.start)));
        }
        let left = self.seq(branch).nth(index - 1).ok_or(Error::Range {
            index,
            len: 0,
            available,
        })?;
        Ok((Some(left), self.item(left).right))
    }

    /// Concatenates the characters of a text branch.
    pub(crate) fn text(&self, branch: &BranchId) -> String {
        self.seq(branch)
            .filter_map(|p| match self.item(p).block.content {
                Content::Char(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// The live value of `key`, if any.
    pub(crate) fn map_get(&self, branch: &BranchId, key: &str) -> Option<ItemPtr> {
        self.branch(branch)?
            .map
            .get(key)
            .copied()
            .filter(|p| !self.item(*p).deleted)
    }

    /// Live entries of a map branch, sorted by key.
    pub(crate) fn map_entries(&self, branch: &BranchId) -> Vec<(Arc<str>, ItemPtr)> {
        let Some(b) = self.branch(branch) else {
            return Vec::new();
        };
        let mut entries: Vec<_> = b
            .map
            .iter()
            .filter(|(_, p)| !self.item(**p).deleted)
            .map(|(k, p)| (k.clone(), *p))
            .collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    pub(crate) fn map_len(&self, branch: &BranchId) -> usize {
        self.branch(branch).map_or(0, |b| {
            b.map.values().filter(|p| !self.item(**p).deleted).count()
        })
    }

    /// Leftmost item of the list holding the values of `key`.
    fn map_chain_head(&self, branch: &BranchId, key: &str) -> Option<ItemPtr> {
        let mut current = *self.branch(branch)?.map.get(key)?;
        while let Some(left) = self.item(current).left {
            current = left;
        }
        Some(current)
    }

    /// First item a new item without a left neighbour would be placed before.
    fn first_sibling(&self, branch: &BranchId, key: Option<&str>) -> Option<ItemPtr> {
        match key {
            Some(key) => self.map_chain_head(branch, key),
            None => self.branch(branch).and_then(|b| b.start),
        }
    }

    /// Places `block` among its siblings and links it in.
    ///
    /// The caller guarantees that every dependency of `block` is present and that its clock is the
    /// next clock of its client.
    fn integrate(&mut self, block: Block, ds: &mut IdSet) -> ItemPtr {
        let ptr = ItemPtr(self.items.len());
        // origins pointing outside of the block's own list cannot be neighbours
        let sibling = |id: Option<Id>| {
            id.and_then(|id| self.find(id))
                .filter(|p| self.item(*p).is_sibling_of(&block))
        };
        let origin = sibling(block.origin);
        let right_origin = sibling(block.right_origin);

        let conflict = match (origin, right_origin) {
            (Some(left), _) => self.item(left).right != right_origin,
            (None, Some(right)) => self.item(right).left.is_some(),
            (None, None) => true,
        };
        let left = if conflict {
            self.resolve_conflict(&block, origin, right_origin)
        } else {
            origin
        };

        let key = block.parent_sub.clone();
        let right = match left {
            Some(left) => self.item(left).right,
            None => self.first_sibling(&block.parent, key.as_deref()),
        };
        let parent = block.parent.clone();
        let id = block.id;
        let nested = block.nested_branch();
        trace!(%id, ?parent, ?left, ?right, "integrating item");

        self.items.push(Item {
            block,
            left,
            right,
            deleted: false,
        });
        self.clients.entry(id.client).or_default().push(ptr);
        if let Some(nested) = &nested {
            self.branch_mut(nested);
        }

        self.branch_mut(&parent);
        match left {
            Some(left) => self.set_right(left, Some(ptr)),
            None if key.is_none() => self.set_start(&parent, Some(ptr)),
            None => {}
        }
        if key.is_none() {
            self.adjust_len(&parent, 1);
        }
        let mut replaced = None;
        match (right, &key) {
            (Some(right), _) => self.set_left(right, Some(ptr)),
            (None, Some(key)) => {
                self.set_map_head(&parent, Arc::clone(key), ptr);
                replaced = left;
            }
            (None, None) => {}
        }
        if let Some(replaced) = replaced {
            self.delete(replaced, ds);
        }

        let parent_deleted = match parent {
            BranchId::Nested(owner) => self.find(owner).is_some_and(|p| self.item(p).deleted),
            BranchId::Root(_) => false,
        };
        // a map value with a right neighbour lost against a concurrent overwrite
        if parent_deleted || (key.is_some() && right.is_some()) {
            self.delete(ptr, ds);
        }
        ptr
    }

    /// Scans the items between the origins of `block` for concurrent insertions and returns the
    /// item `block` has to be placed after.
    fn resolve_conflict(
        &self,
        block: &Block,
        origin: Option<ItemPtr>,
        right_origin: Option<ItemPtr>,
    ) -> Option<ItemPtr> {
        let mut left = origin;
        let mut current = match origin {
            Some(origin) => self.item(origin).right,
            None => self.first_sibling(&block.parent, block.parent_sub.as_deref()),
        };
        let mut conflicting = BTreeSet::new();
        let mut before_origin = BTreeSet::new();
        while let Some(ptr) = current {
            if Some(ptr) == right_origin {
                break;
            }
            let item = self.item(ptr);
            before_origin.insert(ptr);
            conflicting.insert(ptr);
            if item.block.origin == block.origin {
                // concurrent insertion at the same position
                if item.id().client < block.id.client {
                    left = Some(ptr);
                    conflicting.clear();
                } else if item.block.right_origin == block.right_origin {
                    break;
                }
            } else {
                match item.block.origin.and_then(|id| self.find(id)) {
                    Some(o) if before_origin.contains(&o) => {
                        if !conflicting.contains(&o) {
                            left = Some(ptr);
                            conflicting.clear();
                        }
                    }
                    _ => break,
                }
            }
            current = item.right;
        }
        left
    }

    /// Marks an item and, for nested branches, its entire content as deleted.
    ///
    /// Returns false if the item was deleted already.
    pub(crate) fn delete(&mut self, ptr: ItemPtr, ds: &mut IdSet) -> bool {
        if self.items[ptr.0].deleted {
            return false;
        }
        // nested branches are walked with an explicit stack, their depth is up to remote peers
        let mut stack = vec![ptr];
        while let Some(ptr) = stack.pop() {
            let item = &mut self.items[ptr.0];
            if item.deleted {
                continue;
            }
            item.deleted = true;
            let id = item.id();
            let counted = item.block.parent_sub.is_none();
            let parent = item.block.parent.clone();
            let nested = item.block.nested_branch();
            self.record(Undo::Deleted(ptr));
            ds.insert(id, 1);

            if counted && self.branches.contains_key(&parent) {
                self.adjust_len(&parent, -1);
            }
            if let Some(nested) = nested {
                stack.extend(self.seq(&nested));
                if let Some(branch) = self.branch(&nested) {
                    stack.extend(branch.map.values().copied());
                }
            }
            trace!(%id, "deleted item");
        }
        true
    }

    fn next_id(&self) -> Id {
        Id::new(self.client_id, self.next_clock(self.client_id))
    }

    /// Creates a local item between `left` and `right` and fills in the content of preliminary
    /// branches.
    fn insert_between(
        &mut self,
        parent: &BranchId,
        key: Option<Arc<str>>,
        left: Option<ItemPtr>,
        right: Option<ItemPtr>,
        value: In,
        ds: &mut IdSet,
    ) -> ItemPtr {
        let content = match &value {
            In::Any(v) => Content::Any(v.clone()),
            In::XmlElement(el) => Content::Type {
                kind: BranchKind::XmlElement,
                tag: Some(Arc::from(el.tag.as_str())),
            },
            other => Content::Type {
                kind: other.kind().unwrap_or(BranchKind::Map),
                tag: None,
            },
        };
        let block = Block {
            id: self.next_id(),
            origin: left.map(|p| self.item(p).id()),
            right_origin: right.map(|p| self.item(p).id()),
            parent: parent.clone(),
            parent_sub: key,
            content,
        };
        let ptr = self.integrate(block, ds);
        if let Some(nested) = self.item(ptr).block.nested_branch() {
            self.fill(&nested, value, ds);
        }
        ptr
    }

    /// Writes the initial content of a freshly created branch.
    fn fill(&mut self, branch: &BranchId, prelim: In, ds: &mut IdSet) {
        match prelim {
            In::Any(_) => {}
            In::Map(entries) => {
                for (key, value) in entries {
                    self.map_insert(branch, &key, value, ds);
                }
            }
            In::Array(values) => {
                self.seq_append(branch, None, None, values, ds);
            }
            In::XmlFragment(nodes) => {
                self.seq_append(branch, None, None, nodes.into_iter().map(In::from), ds);
            }
            In::Text(text) | In::XmlText(text) => {
                self.seq_append(branch, None, None, text.chars().map(Char), ds);
            }
            In::XmlElement(element) => {
                for (name, value) in element.attributes {
                    self.map_insert(branch, &name, In::Any(Value::String(value)), ds);
                }
                let children = element.children.into_iter().map(In::from);
                self.seq_append(branch, None, None, children, ds);
            }
        }
    }

    /// Inserts `values` one after another between `left` and `right`.
    fn seq_append<V>(
        &mut self,
        branch: &BranchId,
        mut left: Option<ItemPtr>,
        right: Option<ItemPtr>,
        values: impl IntoIterator<Item = V>,
        ds: &mut IdSet,
    ) where
        V: Into<SeqInput>,
    {
        for value in values {
            let ptr = match value.into() {
                SeqInput::Value(value) => {
                    self.insert_between(branch, None, left, right, value, ds)
                }
                SeqInput::Char(c) => {
                    let block = Block {
                        id: self.next_id(),
                        origin: left.map(|p| self.item(p).id()),
                        right_origin: right.map(|p| self.item(p).id()),
                        parent: branch.clone(),
                        parent_sub: None,
                        content: Content::Char(c),
                    };
                    self.integrate(block, ds)
                }
            };
            left = Some(ptr);
        }
    }

    /// Inserts `values` at `index` of a sequence branch.
    pub(crate) fn seq_insert(
        &mut self,
        branch: &BranchId,
        index: usize,
        values: Vec<In>,
        ds: &mut IdSet,
    ) -> Result<()> {
        let (left, right) = self.seq_neighbours(branch, index)?;
        self.seq_append(branch, left, right, values, ds);
        Ok(())
    }

    /// Inserts a single value at `index` of a sequence branch.
    pub(crate) fn seq_insert_one(
        &mut self,
        branch: &BranchId,
        index: usize,
        value: In,
        ds: &mut IdSet,
    ) -> Result<ItemPtr> {
        let (left, right) = self.seq_neighbours(branch, index)?;
        Ok(self.insert_between(branch, None, left, right, value, ds))
    }

    /// Inserts the characters of `text` at character offset `index` of a text branch.
    pub(crate) fn text_insert(
        &mut self,
        branch: &BranchId,
        index: usize,
        text: &str,
        ds: &mut IdSet,
    ) -> Result<()> {
        let (left, right) = self.seq_neighbours(branch, index)?;
        self.seq_append(branch, left, right, text.chars().map(Char), ds);
        Ok(())
    }

    /// Deletes `len` live items starting at `index`.
    pub(crate) fn seq_remove(
        &mut self,
        branch: &BranchId,
        index: usize,
        len: usize,
        ds: &mut IdSet,
    ) -> Result<()> {
        let available = self.seq_len(branch);
        if index.checked_add(len).is_none_or(|end| end > available) {
            return Err(Error::Range {
                index,
                len,
                available,
            });
        }
        let doomed: Vec<ItemPtr> = self.seq(branch).skip(index).take(len).collect();
        for ptr in doomed {
            self.delete(ptr, ds);
        }
        Ok(())
    }

    /// Sets `key` of a map branch, replacing the current value.
    pub(crate) fn map_insert(
        &mut self,
        branch: &BranchId,
        key: &str,
        value: In,
        ds: &mut IdSet,
    ) -> ItemPtr {
        let left = self.branch(branch).and_then(|b| b.map.get(key).copied());
        self.insert_between(branch, Some(Arc::from(key)), left, None, value, ds)
    }

    /// Deletes the live value of `key`. Returns false if there was none.
    pub(crate) fn map_remove(&mut self, branch: &BranchId, key: &str, ds: &mut IdSet) -> bool {
        match self.map_get(branch, key) {
            Some(ptr) => self.delete(ptr, ds),
            None => false,
        }
    }

    fn readiness(&self, block: &Block) -> Readiness {
        let next = self.next_clock(block.id.client);
        if block.id.clock < next {
            return Readiness::Known;
        }
        let missing = |id: &Option<Id>| id.is_some_and(|id| self.find(id).is_none());
        let parent_missing = match block.parent {
            BranchId::Nested(owner) => self.find(owner).is_none(),
            BranchId::Root(_) => false,
        };
        if block.id.clock > next
            || missing(&block.origin)
            || missing(&block.right_origin)
            || parent_missing
        {
            Readiness::Missing
        } else {
            Readiness::Ready
        }
    }

    /// Integrates a remote update.
    ///
    /// Blocks whose dependencies are missing and deletions of unknown items are kept until a later
    /// update provides what they need. Applying the same update twice has no further effect.
    pub(crate) fn apply(&mut self, update: Update, ds: &mut IdSet) {
        let (blocks, delete_set) = update.into_parts();
        if self.journal.is_some() {
            self.record(Undo::Pending(
                self.pending.clone(),
                self.pending_deletes.clone(),
            ));
        }
        let mut queue = std::mem::take(&mut self.pending);
        queue.extend(blocks.into_values().flatten());
        queue.sort_by_key(|b| b.id);
        queue.dedup_by_key(|b| b.id);

        let mut integrated = 0usize;
        loop {
            let mut waiting = Vec::new();
            let before = integrated;
            for block in queue {
                match self.readiness(&block) {
                    Readiness::Known => {}
                    Readiness::Ready => {
                        self.integrate(block, ds);
                        integrated += 1;
                    }
                    Readiness::Missing => waiting.push(block),
                }
            }
            queue = waiting;
            if queue.is_empty() || integrated == before {
                break;
            }
        }
        self.pending = queue;

        let mut deletes = std::mem::take(&mut self.pending_deletes);
        deletes.merge(delete_set);
        let mut deleted = 0usize;
        for (&client, ranges) in deletes.iter() {
            let known = self.next_clock(client);
            for range in ranges {
                for clock in range.start..range.end.min(known) {
                    if let Some(ptr) = self.find(Id::new(client, clock)) {
                        deleted += usize::from(self.delete(ptr, ds));
                    }
                }
                if range.end > known {
                    self.pending_deletes
                        .insert_range(client, range.start.max(known)..range.end);
                }
            }
        }
        debug!(
            integrated,
            deleted,
            pending = self.pending.len(),
            pending_deletes = self.pending_deletes.len(),
            "applied update"
        );
    }

    /// Every deleted item.
    pub(crate) fn delete_set(&self) -> IdSet {
        self.items
            .iter()
            .filter(|item| item.deleted)
            .map(Item::id)
            .collect()
    }

    /// Blocks a replica with state vector `sv` has not seen, grouped by client.
    pub(crate) fn blocks_since(&self, sv: &StateVector) -> BTreeMap<ClientId, Vec<Block>> {
        let mut blocks = BTreeMap::new();
        for (&client, ptrs) in &self.clients {
            let from = usize::try_from(sv.get(client)).unwrap_or(usize::MAX);
            if let Some(missing) = ptrs.get(from..).filter(|m| !m.is_empty()) {
                blocks.insert(
                    client,
                    missing.iter().map(|p| self.item(*p).block.clone()).collect(),
                );
            }
        }
        blocks
    }

    /// Everything a replica with state vector `sv` is missing, including all deletions.
    pub(crate) fn diff(&self, sv: &StateVector) -> Update {
        Update::from_parts(self.blocks_since(sv), self.delete_set())
    }
}

/// Content of a single sequence item created locally.
enum SeqInput {
    Value(In),
    Char(char),
}

impl From<In> for SeqInput {
    fn from(value: In) -> Self {
        SeqInput::Value(value)
    }
}

struct Char(char);

impl From<Char> for SeqInput {
    fn from(Char(c): Char) -> Self {
        SeqInput::Char(c)
    }
}
