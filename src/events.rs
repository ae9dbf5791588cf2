//! Tenant lifecycle events and the sinks they are published to. Publishing is fire-and-forget.

use crate::tenant::Tenant;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq)]
pub enum TenantEvent {
    /// A tenant was found, validated and activated.
    Resolved(Tenant),
    /// No usable tenant matched the selector (host, console flag or subdomain).
    NotResolved { selector: Option<String> },
    /// A tenant became active and the default connection now points at it.
    Activated(Tenant),
}

impl TenantEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TenantEvent::Resolved(_) => "tenant.resolved",
            TenantEvent::NotResolved { .. } => "tenant.not_resolved",
            TenantEvent::Activated(_) => "tenant.activated",
        }
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            TenantEvent::Resolved(t) | TenantEvent::Activated(t) => Some(t),
            TenantEvent::NotResolved { .. } => None,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: TenantEvent);
}

/// Logs every event; the default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: TenantEvent) {
        match &event {
            TenantEvent::NotResolved { selector } => {
                tracing::info!(event = event.name(), selector = ?selector, "tenant event");
            }
            TenantEvent::Resolved(t) | TenantEvent::Activated(t) => {
                tracing::info!(event = event.name(), tenant_id = %t.id, subdomain = ?t.subdomain(), "tenant event");
            }
        }
    }
}

/// Hands events to any number of in-process subscribers.
#[derive(Clone, Debug)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<TenantEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastEventSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TenantEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: TenantEvent) {
        // No receivers is not an error.
        let _ = self.tx.send(event);
    }
}

/// Publishes each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        FanoutEventSink { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn publish(&self, event: TenantEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone());
        }
    }
}
