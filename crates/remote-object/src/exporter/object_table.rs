//! Export table
//!
//! Tracks every exported implementation twice: by [`ObjectId`] for incoming
//! calls and by implementation identity for unexport.

use crate::object::RemoteImpl;
use crate::proxy::MethodDescriptor;
use crate::reference::UnicastServerRef;
use crate::types::{ObjectId, RemoteError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identity of an implementation instance: the address of its data
pub type ImplKey = usize;

pub fn impl_key(implementation: &dyn RemoteImpl) -> ImplKey {
    implementation as *const dyn RemoteImpl as *const () as usize
}

/// Listener an object is reachable through: the port it is bound to and
/// the server socket factory it was created with
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub port: u16,
    pub factory: Option<String>,
}

/// One exported object
pub struct ExportRecord {
    pub id: ObjectId,
    pub implementation: Arc<dyn RemoteImpl>,
    pub server_ref: Arc<UnicastServerRef>,
    pub listener: ListenerKey,
    methods: HashMap<i64, &'static MethodDescriptor>,
    calls: AtomicUsize,
}

impl ExportRecord {
    pub fn new(
        id: ObjectId,
        implementation: Arc<dyn RemoteImpl>,
        server_ref: Arc<UnicastServerRef>,
        listener: ListenerKey,
        methods: HashMap<i64, &'static MethodDescriptor>,
    ) -> Self {
        Self {
            id,
            implementation,
            server_ref,
            listener,
            methods,
            calls: AtomicUsize::new(0),
        }
    }

    /// The method a call hash refers to
    pub fn method(&self, hash: i64) -> Option<&'static MethodDescriptor> {
        self.methods.get(&hash).copied()
    }

    pub fn calls_in_progress(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Marks a call in progress on a record until dropped
pub struct CallGuard {
    record: Arc<ExportRecord>,
}

impl Deref for CallGuard {
    type Target = ExportRecord;

    fn deref(&self) -> &ExportRecord {
        &self.record
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.record.calls.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<ObjectId, Arc<ExportRecord>>,
    by_impl: HashMap<ImplKey, ObjectId>,
}

/// Thread-safe table of exported objects
#[derive(Default)]
pub struct ObjectTable {
    tables: RwLock<Tables>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record; an implementation can only be exported once
    pub fn insert(&self, key: ImplKey, record: ExportRecord) -> Result<Arc<ExportRecord>> {
        let mut tables = self.tables.write();
        if let Some(id) = tables.by_impl.get(&key) {
            return Err(RemoteError::AlreadyExported(id.to_string()));
        }
        let record = Arc::new(record);
        tables.by_impl.insert(key, record.id);
        tables.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn contains(&self, key: ImplKey) -> bool {
        self.tables.read().by_impl.contains_key(&key)
    }

    pub fn lookup(&self, id: &ObjectId) -> Option<Arc<ExportRecord>> {
        self.tables.read().by_id.get(id).cloned()
    }

    pub fn id_of(&self, key: ImplKey) -> Option<ObjectId> {
        self.tables.read().by_impl.get(&key).copied()
    }

    /// Start a call on `id`. The count is raised under the read lock, so a
    /// non-forced removal either sees the call or the call sees no record.
    pub fn begin_call(&self, id: &ObjectId) -> Option<CallGuard> {
        let tables = self.tables.read();
        let record = tables.by_id.get(id)?.clone();
        record.calls.fetch_add(1, Ordering::SeqCst);
        Some(CallGuard { record })
    }

    /// Remove the record for `key`. Without `force`, a record with calls in
    /// progress stays and `None` is returned.
    pub fn remove_if(&self, key: ImplKey, force: bool) -> Result<Option<Arc<ExportRecord>>> {
        let mut tables = self.tables.write();
        let id = *tables
            .by_impl
            .get(&key)
            .ok_or_else(|| RemoteError::NotExported(format!("implementation at {:#x}", key)))?;

        let busy = tables
            .by_id
            .get(&id)
            .is_some_and(|record| record.calls_in_progress() > 0);
        if busy && !force {
            return Ok(None);
        }

        tables.by_impl.remove(&key);
        Ok(tables.by_id.remove(&id))
    }

    /// Remove every record
    pub fn drain(&self) -> Vec<Arc<ExportRecord>> {
        let mut tables = self.tables.write();
        tables.by_impl.clear();
        tables.by_id.drain().map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
