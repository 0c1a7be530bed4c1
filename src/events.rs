//! Engine notifications.
//!
//! Listeners are called synchronously, in registration order, after the state
//! change they describe has been applied. Delivery is fire-and-forget: a
//! listener cannot veto or fail an operation.

use std::sync::Arc;

use crate::graph::isolate::IsolationState;
use crate::graph::metrics::MetricsSummary;
use crate::graph::{EdgeId, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeSelected(NodeId),
    EdgeSelected(EdgeId),
    IsolateStateChanged(IsolationState),
    MetricsUpdated(MetricsSummary),
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &GraphEvent);
}

impl<F> EventListener for F
where
    F: Fn(&GraphEvent) + Send + Sync,
{
    fn on_event(&self, event: &GraphEvent) {
        self(event)
    }
}

/// Typed listener set.
#[derive(Default, Clone)]
pub struct Listeners {
    inner: Vec<Arc<dyn EventListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.inner.push(listener);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn emit(&self, event: GraphEvent) {
        for listener in &self.inner {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.inner.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn listeners_receive_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            listeners.subscribe(Arc::new(move |e: &GraphEvent| {
                if let GraphEvent::NodeSelected(id) = e {
                    log.lock().unwrap().push(format!("{tag}:{id}"));
                }
            }));
        }
        listeners.emit(GraphEvent::NodeSelected("a.md".into()));
        assert_eq!(*log.lock().unwrap(), vec!["first:a.md", "second:a.md"]);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let listeners = Listeners::new();
        assert!(listeners.is_empty());
        listeners.emit(GraphEvent::EdgeSelected(EdgeId::composite(
            &"a".into(),
            &"b".into(),
            "reference",
        )));
    }
}
