//! Export and unexport of remote objects
//!
//! Exporting binds an implementation to a listening endpoint and a fresh
//! [`ObjectId`], records it in the export table and returns a [`Proxy`]
//! over its remote interfaces. Listeners are shared by every export that
//! asks for the same port with the same server socket factory; asking for
//! port 0 reuses the listener an earlier port 0 export bound. A listener
//! bound for an explicit port is closed when its last export goes away.

use super::dispatch::CallDispatcher;
use super::object_table::{impl_key, ExportRecord, ListenerKey, ObjectTable};
use crate::config::RuntimeConfig;
use crate::object::{ExportParams, RemoteImpl};
use crate::proxy::{InterfaceDescriptor, MethodHashCache, Proxy};
use crate::reference::{Endpoint, LiveRef, RemoteRef, UnicastServerRef};
use crate::types::{ObjectId, RemoteError, Result};
use parking_lot::Mutex;
use remote_transport::{
    listen, spawn_accept_loop, ListenerHandle, ListenerStatsSnapshot, ServerSocketFactory,
    SocketFactories, TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static GLOBAL: LazyLock<Arc<Exporter>> = LazyLock::new(|| {
    Arc::new(Exporter::new(
        RuntimeConfig::from_env(),
        SocketFactories::global(),
    ))
});

struct ListenerEntry {
    handle: ListenerHandle,
    exports: usize,
    /// Bound for an explicit port rather than port 0
    fixed: bool,
}

#[derive(Default)]
struct Listeners {
    by_key: HashMap<ListenerKey, ListenerEntry>,
    /// Listener answering port 0 requests, per server socket factory
    anonymous: HashMap<Option<String>, ListenerKey>,
}

impl Listeners {
    /// Count one more export on the running listener serving `port`
    fn acquire(&mut self, port: u16, factory: &Option<String>) -> Option<(ListenerKey, u16)> {
        let key = if port == 0 {
            self.anonymous.get(factory)?.clone()
        } else {
            ListenerKey {
                port,
                factory: factory.clone(),
            }
        };

        if !self.by_key.get(&key)?.handle.is_running() {
            debug!("Replacing stopped listener on port {}", key.port);
            self.by_key.remove(&key);
            if port == 0 {
                self.anonymous.remove(factory);
            }
            return None;
        }

        let entry = self.by_key.get_mut(&key)?;
        entry.exports += 1;
        let bound = entry.handle.port();
        Some((key, bound))
    }

    /// Count one export less; returns the listener to close, if any
    fn release(&mut self, key: &ListenerKey) -> Option<ListenerHandle> {
        let entry = self.by_key.get_mut(key)?;
        entry.exports = entry.exports.saturating_sub(1);
        if entry.exports > 0 || !entry.fixed {
            return None;
        }
        self.by_key.remove(key).map(|entry| entry.handle)
    }
}

/// Exports implementations and tracks them until unexported
pub struct Exporter {
    config: RuntimeConfig,
    factories: Arc<SocketFactories>,
    table: Arc<ObjectTable>,
    listeners: Mutex<Listeners>,
    /// Serializes listener creation across the bind
    binding: tokio::sync::Mutex<()>,
}

impl Exporter {
    pub fn new(config: RuntimeConfig, factories: Arc<SocketFactories>) -> Self {
        Self {
            config,
            factories,
            table: Arc::new(ObjectTable::new()),
            listeners: Mutex::new(Listeners::default()),
            binding: tokio::sync::Mutex::new(()),
        }
    }

    /// The process-wide exporter, configured from the environment and
    /// using the process-wide socket factories
    pub fn global() -> Arc<Exporter> {
        GLOBAL.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn factories(&self) -> &Arc<SocketFactories> {
        &self.factories
    }

    /// Export on `port` (0 for any free port) with the default factories
    pub async fn export(&self, implementation: Arc<dyn RemoteImpl>, port: u16) -> Result<Proxy> {
        self.export_with(implementation, ExportParams::new(port)).await
    }

    /// Export with explicit socket factories.
    ///
    /// A bind failure is reported as [`RemoteError::ExportFailed`], marked
    /// retryable when the installed failure handler (or its absence) says
    /// so; retrying is up to the caller.
    pub async fn export_with(
        &self,
        implementation: Arc<dyn RemoteImpl>,
        params: ExportParams,
    ) -> Result<Proxy> {
        let interfaces: Vec<&'static InterfaceDescriptor> = implementation
            .interfaces()
            .iter()
            .copied()
            .filter(|i| i.is_remote())
            .collect();
        if interfaces.is_empty() {
            return Err(RemoteError::StubNotFound(format!(
                "{} implements no remote interface",
                implementation.type_name()
            )));
        }

        let key = impl_key(implementation.as_ref());
        if let Some(id) = self.table.id_of(key) {
            return Err(RemoteError::AlreadyExported(format!(
                "{} as {}",
                implementation.type_name(),
                id
            )));
        }

        let (listener, port) = self.listener_for(&params).await?;

        let id = if self.config.random_object_ids {
            // A fresh address space may wait out a saturated millisecond
            tokio::task::spawn_blocking(|| ObjectId::generate_with(true))
                .await
                .map_err(|e| {
                    RemoteError::InvalidState(format!("object id generation failed: {}", e))
                })?
        } else {
            ObjectId::generate_with(false)
        };
        let endpoint = Endpoint::with_factories(
            self.config.host_name.clone(),
            port,
            params.csf.clone(),
            params.ssf.clone(),
        );
        let server_ref = Arc::new(UnicastServerRef::new(
            LiveRef::local(id, endpoint),
            self.factories.clone(),
        ));

        let hashes = MethodHashCache::global();
        let methods = interfaces
            .iter()
            .flat_map(|i| i.all_methods())
            .map(|m| (hashes.hash(m), m))
            .collect();

        let record = ExportRecord::new(
            id,
            implementation.clone(),
            server_ref.clone(),
            listener.clone(),
            methods,
        );
        if let Err(e) = self.table.insert(key, record) {
            self.release_listener(&listener);
            return Err(e);
        }

        if let Some(object) = implementation.remote_object() {
            object.set_reference(Some(server_ref.clone()));
            object.set_export_params(params);
        }

        info!(
            "Exported {} as {} on port {}",
            implementation.type_name(),
            id,
            port
        );

        let client: Arc<dyn RemoteRef> = Arc::new(
            server_ref
                .client_ref()
                .clone()
                .with_max_frame_size(self.config.max_frame_size),
        );
        Proxy::with_ref(&interfaces, client)
    }

    /// Export an implementation again with the parameters its identity
    /// carries, as needed after cloning or reconstruction. The new export
    /// gets a fresh [`ObjectId`].
    pub async fn reexport(&self, implementation: Arc<dyn RemoteImpl>) -> Result<Proxy> {
        let params = implementation
            .remote_object()
            .and_then(|object| object.export_params())
            .ok_or_else(|| {
                RemoteError::Usage(format!(
                    "{} carries no export parameters",
                    implementation.type_name()
                ))
            })?;
        self.export_with(implementation, params).await
    }

    /// Remove an export. Without `force`, an object with calls in progress
    /// stays exported and `false` is returned.
    pub fn unexport(&self, implementation: &dyn RemoteImpl, force: bool) -> Result<bool> {
        match self.table.remove_if(impl_key(implementation), force)? {
            Some(record) => {
                let in_flight = record.calls_in_progress();
                if in_flight > 0 {
                    warn!(
                        "Force unexported {} with {} calls in progress",
                        record.id, in_flight
                    );
                }
                info!("Unexported {} ({})", implementation.type_name(), record.id);
                self.release_listener(&record.listener);
                Ok(true)
            }
            None => {
                debug!(
                    "Not unexporting {}: calls in progress",
                    implementation.type_name()
                );
                Ok(false)
            }
        }
    }

    pub fn is_exported(&self, implementation: &dyn RemoteImpl) -> bool {
        self.table.contains(impl_key(implementation))
    }

    /// The id an implementation is exported under
    pub fn object_id(&self, implementation: &dyn RemoteImpl) -> Option<ObjectId> {
        self.table.id_of(impl_key(implementation))
    }

    pub fn exported_count(&self) -> usize {
        self.table.len()
    }

    /// Actual port and counters of every listener
    pub async fn listener_stats(&self) -> Vec<(u16, ListenerStatsSnapshot)> {
        let _binding = self.binding.lock().await;
        let listeners = self.listeners.lock();
        listeners
            .by_key
            .values()
            .map(|entry| (entry.handle.port(), entry.handle.stats().snapshot()))
            .collect()
    }

    /// Stop every listener and drop every export
    pub async fn shutdown(&self) {
        let _binding = self.binding.lock().await;
        let closed = {
            let mut listeners = self.listeners.lock();
            listeners.anonymous.clear();
            listeners.by_key.drain().map(|(_, entry)| entry.handle).collect::<Vec<_>>()
        };
        for handle in &closed {
            handle.shutdown();
        }
        let dropped = self.table.drain();
        info!(
            "Exporter shut down, {} listeners closed, {} objects unexported",
            closed.len(),
            dropped.len()
        );
    }

    fn release_listener(&self, key: &ListenerKey) {
        let closed = self.listeners.lock().release(key);
        if let Some(handle) = closed {
            handle.shutdown();
            info!("Closed listener on port {}: no exports left", handle.port());
        }
    }

    /// The listener serving `params`, created on first use. Every call
    /// counts one export against the listener it returns.
    async fn listener_for(&self, params: &ExportParams) -> Result<(ListenerKey, u16)> {
        let factory_name = params.ssf.as_ref().map(|f| f.descriptor().to_string());

        let _binding = self.binding.lock().await;
        let existing = self.listeners.lock().acquire(params.port, &factory_name);
        if let Some(found) = existing {
            return Ok(found);
        }

        let factory: Arc<dyn ServerSocketFactory> = match &params.ssf {
            Some(ssf) => ssf.clone(),
            None => self.factories.effective(),
        };
        let socket = match listen(factory.as_ref(), params.port).await {
            Ok(socket) => socket,
            Err(TransportError::ListenFailed { port, source }) => {
                let retryable = self.factories.should_retry(&source);
                warn!(
                    "Cannot listen on port {} via {} (retryable: {}): {}",
                    port,
                    factory.descriptor(),
                    retryable,
                    source
                );
                return Err(RemoteError::ExportFailed {
                    port,
                    retryable,
                    source,
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Keyed by the bound port so a later request for that port finds it
        let key = ListenerKey {
            port: socket.local_addr()?.port(),
            factory: factory_name.clone(),
        };
        let dispatcher = Arc::new(CallDispatcher::new(
            self.table.clone(),
            key.clone(),
            self.config.max_frame_size,
        ));
        let handle = spawn_accept_loop(
            socket,
            self.config.listener_config(),
            self.factories.clone(),
            dispatcher,
        )?;
        let port = handle.port();

        let mut listeners = self.listeners.lock();
        if params.port == 0 {
            listeners.anonymous.insert(factory_name, key.clone());
        }
        listeners.by_key.insert(
            key.clone(),
            ListenerEntry {
                handle,
                exports: 1,
                fixed: params.port != 0,
            },
        );
        Ok((key, port))
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(RuntimeConfig::default(), SocketFactories::global())
    }
}
