//! # Event Bus - Typed Kernel Events
//!
//! A small in-process bus carrying the kernel's typed events. Handlers are
//! registered per event kind and invoked in registration order on dispatch.
//! Log payloads are redacted before any handler sees them, so secret
//! material never leaves the core via the bus.

use crate::types::{KernelMode, LogLevel};
use aegis_policy::redact;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Events dispatched by the kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KernelEvent {
    Log { level: LogLevel, message: String },
    ConfigReload { mode: KernelMode },
    SafeMode { active: bool },
}

/// Discriminant used for handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Log,
    ConfigReload,
    SafeMode,
}

impl KernelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            KernelEvent::Log { .. } => EventKind::Log,
            KernelEvent::ConfigReload { .. } => EventKind::ConfigReload,
            KernelEvent::SafeMode { .. } => EventKind::SafeMode,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe
pub type HandlerId = u64;

type Handler = Arc<dyn Fn(&KernelEvent) + Send + Sync>;

/// Typed event bus with ordered dispatch
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for one event kind
    pub async fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&KernelEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns whether it existed
    pub async fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().await;
        let mut removed = false;
        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|(handler_id, _)| *handler_id != id);
            removed |= entries.len() != before;
        }
        removed
    }

    /// Dispatch an event to its handlers in registration order
    ///
    /// Log messages are redacted before dispatch.
    pub async fn dispatch(&self, event: KernelEvent) {
        let event = match event {
            KernelEvent::Log { level, message } => KernelEvent::Log {
                level,
                message: redact(&message),
            },
            other => other,
        };

        let handlers: Vec<Handler> = {
            let map = self.handlers.read().await;
            map.get(&event.kind())
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(&event);
        }
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.values().map(Vec::len).sum()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
