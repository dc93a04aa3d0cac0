//! Session Registry
//!
//! Maps opaque session identifiers to live [`ConnectionContext`]s. This map is
//! the only server-side state shared between sessions; everything else lives
//! inside a single context.

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::context::{ConnectionContext, HandlerFactory};

pub type SessionHook = Arc<dyn Fn(&ConnectionContext) + Send + Sync>;

/// Lifecycle callbacks injected into the registry.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_create: Option<SessionHook>,
    on_close: Option<SessionHook>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, hook: impl Fn(&ConnectionContext) + Send + Sync + 'static) -> Self {
        self.on_create = Some(Arc::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl Fn(&ConnectionContext) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(hook));
        self
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    /// Live sessions keyed by session id.
    /// DashMap shards the locking, so sessions on different keys never contend.
    sessions: DashMap<String, Arc<ConnectionContext>>,
    hooks: SessionHooks,
}

impl SessionRegistry {
    pub fn new(hooks: SessionHooks) -> Self {
        Self {
            sessions: DashMap::new(),
            hooks,
        }
    }

    /// Generates a fresh id, builds a context with a new handler from
    /// `factory` and registers it before returning.
    pub fn create(&self, factory: &HandlerFactory) -> Arc<ConnectionContext> {
        let context = loop {
            let session_id = Uuid::new_v4().to_string();
            // The factory runs before the shard lock is taken, so it may read
            // the registry.
            let context = Arc::new(ConnectionContext::new(&session_id, factory));
            if let Entry::Vacant(slot) = self.sessions.entry(session_id) {
                slot.insert(context.clone());
                break context;
            }
        };

        info!(session_id = %context.session_id(), active = self.sessions.len(), "session registered");
        if let Some(hook) = &self.hooks.on_create {
            hook(&context);
        }
        context
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<ConnectionContext>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Unregisters and closes a session. Safe to call from several paths:
    /// only the first call removes the entry and fires the close hook.
    pub fn remove(&self, session_id: &str) -> Option<Arc<ConnectionContext>> {
        let Some((_, context)) = self.sessions.remove(session_id) else {
            debug!(session_id, "session already removed");
            return None;
        };

        if context.close() {
            info!(session_id, active = self.sessions.len(), "session closed");
            if let Some(hook) = &self.hooks.on_close {
                hook(&context);
            }
        }
        Some(context)
    }

    /// Closes every registered session, returning how many were closed.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter_map(|id| self.remove(id)).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::context::testing::counting_factory;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted_hooks() -> (SessionHooks, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let (c, d) = (created.clone(), closed.clone());
        let hooks = SessionHooks::new()
            .on_create(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            });
        (hooks, created, closed)
    }

    #[test]
    fn create_registers_and_fires_hook() {
        let (hooks, created, _) = counted_hooks();
        let registry = SessionRegistry::new(hooks);

        let context = registry.create(&counting_factory());

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(context.session_id()));
        assert!(Arc::ptr_eq(
            &registry.get(context.session_id()).expect("registered"),
            &context
        ));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_is_idempotent() {
        let (hooks, _, closed) = counted_hooks();
        let registry = SessionRegistry::new(hooks);
        let context = registry.create(&counting_factory());
        let id = context.session_id().to_string();

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
        assert!(context.is_closed());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_ids_leave_registry_untouched() {
        let registry = SessionRegistry::default();
        registry.create(&counting_factory());

        assert!(registry.get("nope").is_none());
        assert!(registry.remove("nope").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn close_all_closes_each_session_once() {
        let (hooks, _, closed) = counted_hooks();
        let registry = SessionRegistry::new(hooks);
        for _ in 0..5 {
            registry.create(&counting_factory());
        }

        assert_eq!(registry.close_all(), 5);
        assert_eq!(registry.close_all(), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn factory_may_read_the_registry() {
        use crate::session::context::{testing::CountingHandler, ProtocolHandler, SessionPeer};

        let registry = Arc::new(SessionRegistry::default());
        let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let factory: HandlerFactory = {
            let registry = registry.clone();
            let observed = observed.clone();
            Arc::new(move |peer: SessionPeer| {
                observed
                    .lock()
                    .push((registry.len(), registry.contains(peer.session_id())));
                Box::new(CountingHandler { peer, seen: 0 }) as Box<dyn ProtocolHandler>
            })
        };

        registry.create(&factory);
        registry.create(&factory);

        assert_eq!(*observed.lock(), vec![(0, false), (1, false)]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation_yields_distinct_sessions() {
        let registry = Arc::new(SessionRegistry::default());
        let factory = counting_factory();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                let factory = factory.clone();
                tokio::spawn(async move { registry.create(&factory).session_id().to_string() })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.expect("task"));
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(registry.len(), 32);
    }
}
