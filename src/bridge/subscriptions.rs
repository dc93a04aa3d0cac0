//! Notification fan-out
//!
//! Handlers are registered per method name. Each registration hands back a
//! [`Subscription`] whose drop removes exactly that handler.

use std::{
    error::Error,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, warn};

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

type Handler = Arc<dyn Fn(&Value) -> HandlerResult + Send + Sync>;

#[derive(Default)]
pub struct NotificationHub {
    next_id: AtomicU64,
    handlers: DashMap<String, Vec<(u64, Handler)>>,
}

impl NotificationHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(
        self: &Arc<Self>,
        method: &str,
        handler: impl Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .entry(method.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            hub: Arc::downgrade(self),
            method: method.to_string(),
            id,
            active: true,
        }
    }

    /// Invokes every handler registered for `method` and returns how many ran.
    ///
    /// Handlers run on a snapshot, so they may subscribe or unsubscribe
    /// without deadlocking. A failing or panicking handler is logged and the
    /// rest still run.
    pub fn dispatch(&self, method: &str, params: &Value) -> usize {
        let snapshot: Vec<(u64, Handler)> = match self.handlers.get(method) {
            Some(list) => list.clone(),
            None => return 0,
        };

        for (id, handler) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(params))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(method, subscription = id, error = %err, "notification handler failed")
                }
                Err(_) => error!(method, subscription = id, "notification handler panicked"),
            }
        }
        snapshot.len()
    }

    pub fn handler_count(&self, method: &str) -> usize {
        self.handlers.get(method).map_or(0, |list| list.len())
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    fn remove(&self, method: &str, id: u64) -> bool {
        let removed = {
            let Some(mut list) = self.handlers.get_mut(method) else {
                return false;
            };
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            list.len() != before
        };
        self.handlers.remove_if(method, |_, list| list.is_empty());
        removed
    }
}

/// Disposer for one registered handler.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    hub: Weak<NotificationHub>,
    method: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Removes the handler. Returns whether it was still registered.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keeps the handler registered for the lifetime of the hub.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) -> bool {
        if !std::mem::take(&mut self.active) {
            return false;
        }
        self.hub
            .upgrade()
            .is_some_and(|hub| hub.remove(&self.method, self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
