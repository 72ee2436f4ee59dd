// Plugin registry and lifecycle events. Plugins run sequentially during the
// single-writer ingestion phase; events are dispatched synchronously in
// registration order.

use crate::error::Result;
use crate::store::Store;

/// Lifecycle events plugins can emit or observe.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    /// Ask the service to regenerate the route table.
    GenerateRoutes,
    /// A message for connected clients (dev-server hot reload and friends).
    Broadcast(serde_json::Value),
}

type EventHandler = Box<dyn FnMut(&PluginEvent) + Send + Sync>;

/// Publish/subscribe registry for lifecycle events. Handlers observe events;
/// emitted events are also queued so the service can react to them after the
/// plugin phase completes.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<EventHandler>,
    queued: Vec<PluginEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&PluginEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn emit(&mut self, event: PluginEvent) {
        for handler in &mut self.handlers {
            handler(&event);
        }
        self.queued.push(event);
    }

    pub fn drain(&mut self) -> Vec<PluginEvent> {
        std::mem::take(&mut self.queued)
    }
}

/// Context handed to plugins: the mutable store plus the event bus. No
/// ambient globals; everything a plugin touches is passed in explicitly.
pub struct PluginContext<'a> {
    pub store: &'a mut Store,
    pub events: &'a mut EventBus,
}

/// A source plugin: registers collections and writes nodes into the store
/// during the ingestion phase.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called during the init phase, before any ingestion. Subscribe to
    /// events here.
    fn init(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called during the ingestion phase. Register content types and insert
    /// nodes here.
    fn run(&mut self, ctx: &mut PluginContext<'_>) -> Result<()>;
}

/// Ordered plugin registry.
#[derive(Default)]
pub struct Plugins {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Plugins {
    pub fn new() -> Self {
        Plugins::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn call_init(&mut self, store: &mut Store, events: &mut EventBus) -> Result<()> {
        for plugin in &mut self.plugins {
            let mut ctx = PluginContext { store, events };
            plugin.init(&mut ctx)?;
        }
        Ok(())
    }

    pub fn run(&mut self, store: &mut Store, events: &mut EventBus) -> Result<()> {
        for plugin in &mut self.plugins {
            log::debug!("running plugin '{}'", plugin.name());
            let mut ctx = PluginContext { store, events };
            plugin.run(&mut ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ContentType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Source {
        name: &'static str,
        marker: &'static str,
    }

    impl Plugin for Source {
        fn name(&self) -> &str {
            self.name
        }

        fn run(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
            ctx.store.add_collection(ContentType::new(self.marker))?;
            ctx.events.emit(PluginEvent::Broadcast(json!(self.marker)));
            Ok(())
        }
    }

    #[test]
    fn plugins_run_in_registration_order() {
        let mut plugins = Plugins::new();
        plugins.register(Box::new(Source { name: "first", marker: "Alpha" }));
        plugins.register(Box::new(Source { name: "second", marker: "Beta" }));

        let mut store = Store::new();
        let mut events = EventBus::new();
        plugins.call_init(&mut store, &mut events).unwrap();
        plugins.run(&mut store, &mut events).unwrap();

        assert!(store.contains_type("Alpha"));
        assert!(store.contains_type("Beta"));
        assert_eq!(
            events.drain(),
            vec![
                PluginEvent::Broadcast(json!("Alpha")),
                PluginEvent::Broadcast(json!("Beta")),
            ]
        );
    }

    #[test]
    fn handlers_observe_events_in_registration_order() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let first = Arc::clone(&seen);
        bus.subscribe(move |_| {
            // first handler runs on an even count
            assert_eq!(first.fetch_add(1, Ordering::SeqCst) % 2, 0);
        });
        let second = Arc::clone(&seen);
        bus.subscribe(move |_| {
            assert_eq!(second.fetch_add(1, Ordering::SeqCst) % 2, 1);
        });

        bus.emit(PluginEvent::GenerateRoutes);
        bus.emit(PluginEvent::GenerateRoutes);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }
}
