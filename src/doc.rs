// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The replicated document.
//!
//! A [`Doc`] owns the state of one replica and hands out transactions over it. Cloning a `Doc`
//! is cheap and yields another handle to the same replica.
use crate::{
    DocRandomState, create_map,
    block::BranchId,
    error::{Error, Result},
    id::ClientId,
    store::Store,
    transaction::{Origin, Transaction, TransactionMut},
    types::{
        ArrayRef, BranchKind, BranchRef, MapRef, TextRef, XmlElementRef, XmlFragmentRef,
    },
    update::Update,
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, trace};

/// Source of process-wide unique document ids.
static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

/// Configuration of a [`Doc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Identifies this replica in every item it creates.
    ///
    /// Must be unique among all replicas that ever edit the same document.
    pub client_id: ClientId,
    /// Optional application-level identifier of the document.
    pub guid: Option<String>,
}

/// Uses a random 32-bit client id.
impl Default for Options {
    fn default() -> Self {
        Self {
            client_id: ClientId::from(rand::random::<u32>()),
            guid: None,
        }
    }
}

impl Options {
    pub fn with_client_id(client_id: ClientId) -> Self {
        Self {
            client_id,
            guid: None,
        }
    }
}

/// Delivered to update observers after every commit that changed the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    /// The committed changes, encoded with [`Update::encode_v1`].
    pub update: Vec<u8>,
    /// Origin of the committing transaction.
    pub origin: Option<Origin>,
}

type Callback = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

struct DocInner {
    id: u64,
    options: Options,
    store: Arc<RwLock<Store>>,
    roots: Mutex<HashMap<Arc<str>, BranchKind, DocRandomState>>,
    observers: Mutex<Observers>,
}

/// A replica of a collaborative document.
///
/// Content lives in named root branches, obtained through the `get_or_insert_*` methods. The
/// handles they return are plain identifiers that stay valid for the lifetime of the document;
/// all access goes through a [`Transaction`] or [`TransactionMut`].
///
/// ```
/// use crdoc::Doc;
///
/// let doc = Doc::with_client_id(1);
/// let settings = doc.get_or_insert_map("settings")?;
///
/// let mut txn = doc.try_transact_mut()?;
/// settings.insert(&mut txn, "theme", "dark")?;
/// txn.commit()?;
/// drop(txn);
///
/// let txn = doc.try_transact()?;
/// assert_eq!(settings.get(&txn, "theme")?.unwrap(), "dark");
/// # Ok::<(), crdoc::Error>(())
/// ```
#[derive(Clone)]
pub struct Doc {
    inner: Arc<DocInner>,
}

impl Default for Doc {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doc")
            .field("id", &self.inner.id)
            .field("client_id", &self.inner.options.client_id)
            .field("guid", &self.inner.options.guid)
            .finish_non_exhaustive()
    }
}

impl Doc {
    /// Creates an empty document with a random client id.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_client_id(client_id: ClientId) -> Self {
        Self::with_options(Options::with_client_id(client_id))
    }

    pub fn with_options(options: Options) -> Self {
        let id = NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed);
        debug!(doc = id, client_id = options.client_id, "created document");
        Self {
            inner: Arc::new(DocInner {
                id,
                store: Arc::new(RwLock::new(Store::new(id, options.client_id))),
                options,
                roots: Mutex::new(create_map()),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    /// Process-wide unique identifier of this document instance.
    ///
    /// Branch handles remember it and are rejected by transactions of other documents.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn client_id(&self) -> ClientId {
        self.inner.options.client_id
    }

    pub fn guid(&self) -> Option<&str> {
        self.inner.options.guid.as_deref()
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Opens a read-only transaction.
    ///
    /// Fails with [`Error::Concurrency`] while a write transaction is open.
    pub fn try_transact(&self) -> Result<Transaction> {
        let guard = self.inner.store.try_read_arc().ok_or(Error::Concurrency)?;
        trace!(doc = self.id(), "opened read transaction");
        Ok(Transaction::new(self.clone(), guard))
    }

    /// Opens a read-write transaction without an origin.
    ///
    /// Fails with [`Error::Concurrency`] while any other transaction is open.
    pub fn try_transact_mut(&self) -> Result<TransactionMut> {
        self.begin_write(None)
    }

    /// Opens a read-write transaction whose commit is reported with the given origin.
    pub fn try_transact_mut_with(&self, origin: impl Into<Origin>) -> Result<TransactionMut> {
        self.begin_write(Some(origin.into()))
    }

    fn begin_write(&self, origin: Option<Origin>) -> Result<TransactionMut> {
        let guard = self.inner.store.try_write_arc().ok_or(Error::Concurrency)?;
        trace!(doc = self.id(), ?origin, "opened write transaction");
        Ok(TransactionMut::new(self.clone(), guard, origin))
    }

    /// Returns the root branch `name`, registering it with `kind` on first use.
    ///
    /// Registration is local to this replica and needs no transaction: remote content addressed
    /// to a root that was never registered here is kept and shows up once it is.
    ///
    /// Fails with [`Error::TypeMismatch`] if `name` was registered with a different kind.
    pub fn get_or_insert(&self, name: &str, kind: BranchKind) -> Result<BranchRef> {
        let mut roots = self.inner.roots.lock();
        let name: Arc<str> = match roots.get_key_value(name) {
            Some((_, &existing)) if existing != kind => {
                return Err(Error::TypeMismatch {
                    name: name.to_owned(),
                    existing,
                    requested: kind,
                });
            }
            Some((name, _)) => Arc::clone(name),
            None => {
                let name: Arc<str> = Arc::from(name);
                roots.insert(Arc::clone(&name), kind);
                debug!(doc = self.id(), %kind, name = &*name, "registered root branch");
                name
            }
        };
        Ok(BranchRef::new(self.id(), BranchId::Root(name), kind))
    }

    pub fn get_or_insert_map(&self, name: &str) -> Result<MapRef> {
        Ok(MapRef(self.get_or_insert(name, BranchKind::Map)?))
    }

    pub fn get_or_insert_array(&self, name: &str) -> Result<ArrayRef> {
        Ok(ArrayRef(self.get_or_insert(name, BranchKind::Array)?))
    }

    pub fn get_or_insert_text(&self, name: &str) -> Result<TextRef> {
        Ok(TextRef(self.get_or_insert(name, BranchKind::Text)?))
    }

    pub fn get_or_insert_xml_fragment(&self, name: &str) -> Result<XmlFragmentRef> {
        Ok(XmlFragmentRef(self.get_or_insert(name, BranchKind::XmlFragment)?))
    }

    pub fn get_or_insert_xml_element(&self, name: &str) -> Result<XmlElementRef> {
        Ok(XmlElementRef(self.get_or_insert(name, BranchKind::XmlElement)?))
    }

    /// All registered root branches, sorted by name.
    pub fn roots(&self) -> Vec<BranchRef> {
        let roots = self.inner.roots.lock();
        let mut roots: Vec<_> = roots
            .iter()
            .map(|(name, &kind)| BranchRef::new(self.id(), BranchId::Root(Arc::clone(name)), kind))
            .collect();
        roots.sort_by(|a, b| a.id().cmp(b.id()));
        roots
    }

    /// Registers `f` to be called after every commit that changed this document.
    ///
    /// Callbacks run on the committing thread once the document is unlocked, so they may open
    /// transactions themselves. The callback stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn observe_update<F>(&self, f: F) -> Subscription
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        let mut observers = self.inner.observers.lock();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.callbacks.push((id, Arc::new(f)));
        Subscription {
            doc: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub(crate) fn notify(&self, update: &Update, origin: Option<&Origin>) {
        let callbacks: Vec<Callback> = self
            .inner
            .observers
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        if callbacks.is_empty() {
            return;
        }
        let event = UpdateEvent {
            update: update.encode_v1(),
            origin: origin.cloned(),
        };
        for callback in callbacks {
            callback(&event);
        }
    }
}

/// Keeps an update observer registered. Dropping it unregisters the observer.
#[must_use = "the observer is unregistered when the subscription is dropped"]
pub struct Subscription {
    doc: Weak<DocInner>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.doc.upgrade() {
            inner
                .observers
                .lock()
                .callbacks
                .retain(|(id, _)| *id != self.id);
        }
    }
}
