//! Client and context registry.
//!
//! The device owns a [`ClientRegistry`]. Its mutex is the structural lock for
//! the client list: opening or closing a client and a liveness scan's walk of
//! the list are mutually exclusive. Each [`Client`] publishes its contexts
//! through a [`ReadMostly`] set, so a scan walking a client's contexts never
//! blocks context creation, and context removal waits for the scan to let go
//! of the old set before handing the removed context back.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::context::{ClientId, ContextId, ContextInfo, HwContext};
use crate::error::{TdrError, TdrResult};
use crate::rcu::ReadMostly;

/// Immutable view of a client's contexts.
pub type ContextSet = Vec<Arc<HwContext>>;

/// A process holding open hardware contexts on the device.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    pid: i64,
    contexts: ReadMostly<ContextSet>,
    next_context: Arc<AtomicU32>,
}

impl Client {
    fn new(id: ClientId, pid: i64, next_context: Arc<AtomicU32>) -> Self {
        Self {
            id,
            pid,
            contexts: ReadMostly::new(Vec::new()),
            next_context,
        }
    }

    /// Client id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Process id of the client.
    #[must_use]
    pub fn pid(&self) -> i64 {
        self.pid
    }

    /// Open a new hardware context for this client.
    pub fn create_context(&self, name: impl Into<String>) -> Arc<HwContext> {
        let id = ContextId::new(self.next_context.fetch_add(1, Ordering::Relaxed));
        let ctx = Arc::new(HwContext::new(id, self.id, self.pid, name));

        self.contexts.publish(|set| {
            let mut next = set.clone();
            next.push(Arc::clone(&ctx));
            (next, ())
        });

        tracing::debug!(client = %self.id, context = %id, name = ctx.name(), "Context created");
        ctx
    }

    /// Close a hardware context.
    ///
    /// Returns once no reader can still observe the context through this
    /// client's set.
    ///
    /// # Errors
    ///
    /// Returns an error if the context does not belong to this client.
    pub fn destroy_context(&self, id: ContextId) -> TdrResult<Arc<HwContext>> {
        let removed = self.contexts.update(|set| {
            let removed = set.iter().find(|ctx| ctx.id() == id).cloned();
            let next = set.iter().filter(|ctx| ctx.id() != id).cloned().collect();
            (next, removed)
        });

        let ctx = removed.ok_or_else(|| TdrError::context_not_found(id))?;
        tracing::debug!(client = %self.id, context = %id, "Context destroyed");
        Ok(ctx)
    }

    /// Snapshot of the client's contexts.
    #[must_use]
    pub fn contexts(&self) -> Arc<ContextSet> {
        self.contexts.read()
    }

    /// Look up one context.
    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<Arc<HwContext>> {
        self.contexts.read().iter().find(|ctx| ctx.id() == id).cloned()
    }

    /// Number of open contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }
}

/// The device's client list and its structural lock.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<Client>>>,
    next_client: AtomicU32,
    next_context: Arc<AtomicU32>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for the given process.
    pub fn open_client(&self, pid: i64) -> Arc<Client> {
        let id = ClientId::new(self.next_client.fetch_add(1, Ordering::Relaxed));
        let client = Arc::new(Client::new(id, pid, Arc::clone(&self.next_context)));
        self.clients.lock().push(Arc::clone(&client));

        tracing::debug!(client = %id, pid, "Client opened");
        client
    }

    /// Remove a client and, with it, all of its contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not registered.
    pub fn close_client(&self, id: ClientId) -> TdrResult<Arc<Client>> {
        let client = {
            let mut clients = self.clients.lock();
            let index = clients
                .iter()
                .position(|client| client.id() == id)
                .ok_or_else(|| TdrError::client_not_found(id))?;
            clients.remove(index)
        };

        tracing::debug!(client = %id, contexts = client.context_count(), "Client closed");
        Ok(client)
    }

    /// Look up one client.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<Arc<Client>> {
        self.clients
            .lock()
            .iter()
            .find(|client| client.id() == id)
            .cloned()
    }

    /// Run `f` over the client list while holding the structural lock.
    pub fn with_clients<R>(&self, f: impl FnOnce(&[Arc<Client>]) -> R) -> R {
        let clients = self.clients.lock();
        f(&clients)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Query records for every open context, grouped by client.
    #[must_use]
    pub fn context_infos(&self) -> Vec<ContextInfo> {
        self.with_clients(|clients| {
            let mut infos = Vec::new();
            for client in clients {
                infos.extend(client.contexts().iter().map(|ctx| ctx.info()));
            }
            infos
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_lifecycle() -> TdrResult<()> {
        let registry = ClientRegistry::new();
        let a = registry.open_client(100);
        let b = registry.open_client(200);
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.client_count(), 2);

        let closed = registry.close_client(a.id())?;
        assert_eq!(closed.pid(), 100);
        assert_eq!(registry.client_count(), 1);
        assert!(registry.client(a.id()).is_none());

        let result = registry.close_client(a.id());
        assert_eq!(result.err(), Some(TdrError::client_not_found(a.id())));
        Ok(())
    }

    #[test]
    fn test_context_ids_unique_across_clients() {
        let registry = ClientRegistry::new();
        let a = registry.open_client(1);
        let b = registry.open_client(2);

        let c1 = a.create_context("a0");
        let c2 = b.create_context("b0");
        let c3 = a.create_context("a1");

        assert_ne!(c1.id(), c2.id());
        assert_ne!(c1.id(), c3.id());
        assert_ne!(c2.id(), c3.id());
        assert_eq!(a.context_count(), 2);
        assert_eq!(c2.client_id(), b.id());
    }

    #[test]
    fn test_destroy_context() -> TdrResult<()> {
        let registry = ClientRegistry::new();
        let client = registry.open_client(1);
        let ctx = client.create_context("ctx");

        let removed = client.destroy_context(ctx.id())?;
        assert_eq!(removed.id(), ctx.id());
        assert_eq!(client.context_count(), 0);
        assert!(client.context(ctx.id()).is_none());

        let result = client.destroy_context(ctx.id());
        assert!(matches!(result, Err(TdrError::ContextNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_create_context_while_snapshot_held() {
        let registry = ClientRegistry::new();
        let client = registry.open_client(1);
        let a = client.create_context("a");

        let snapshot = client.contexts();
        let b = client.create_context("b");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
        assert_eq!(client.context_count(), 2);
        assert!(client.context(b.id()).is_some());
    }

    #[test]
    fn test_context_infos() {
        let registry = ClientRegistry::new();
        let client = registry.open_client(7);
        let ctx = client.create_context("render");
        ctx.record_submission();

        let infos = registry.context_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].pid, 7);
        assert_eq!(infos[0].name, "render");
        assert_eq!(infos[0].command_submissions, 1);
    }
}
