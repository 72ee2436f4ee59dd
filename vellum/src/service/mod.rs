// Service: owns the store, plugins, transformers and compiled graph, and
// drives the phased bootstrap. Everything is threaded explicitly; there is
// no process-wide instance.

use crate::error::{Result, VellumError};
use crate::graph::{build_schema, SchemaGraph};
use crate::plugins::{EventBus, Plugin, PluginEvent, Plugins};
use crate::query::{Executor, QueryDocument, QueryResult, Variables};
use crate::routes::{prepare_routes, Route};
use crate::store::Store;
use crate::transformer::{Transformer, TransformerRegistry};
use std::sync::Arc;
use std::time::Instant;

/// How far to take the bootstrap. Earlier phases are always included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapPhase {
    Init,
    RunPlugins,
    CreateSchema,
    Full,
}

#[derive(Default)]
pub struct Service {
    store: Store,
    plugins: Plugins,
    transformers: TransformerRegistry,
    events: EventBus,
    graph: Option<SchemaGraph>,
    routes: Vec<Route>,
}

impl Service {
    pub fn new() -> Self {
        Service::default()
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    pub fn register_transformer(
        &mut self,
        mime_type: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) {
        self.transformers.register(mime_type, transformer);
    }

    /// Observe lifecycle events (broadcasts, route regeneration requests).
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&PluginEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler);
    }

    pub fn bootstrap(&mut self) -> Result<()> {
        self.bootstrap_to(BootstrapPhase::Full)
    }

    /// Run the bootstrap phases in order: init plugins, ingest, compile the
    /// schema, generate routes. Ingestion is single-writer; no query is
    /// served until schema compilation has completed.
    pub fn bootstrap_to(&mut self, phase: BootstrapPhase) -> Result<()> {
        let bootstrap_timer = Instant::now();
        log::info!("Bootstrapping...");

        self.timed("Initialize", Service::init)?;
        if phase >= BootstrapPhase::RunPlugins {
            self.timed("Run plugins", Service::run_plugins)?;
        }
        if phase >= BootstrapPhase::CreateSchema {
            self.timed("Create schema", Service::create_schema)?;
        }
        if phase >= BootstrapPhase::Full {
            self.timed("Generate routes", Service::generate_routes)?;
        }

        log::info!(
            "Bootstrap finish - {:.2}s",
            bootstrap_timer.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn timed(&mut self, title: &str, run: fn(&mut Service) -> Result<()>) -> Result<()> {
        let timer = Instant::now();
        run(self)?;
        log::info!("{title} - {:.2}s", timer.elapsed().as_secs_f64());
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        self.plugins.call_init(&mut self.store, &mut self.events)
    }

    fn run_plugins(&mut self) -> Result<()> {
        self.plugins.run(&mut self.store, &mut self.events)?;
        self.process_events()
    }

    fn create_schema(&mut self) -> Result<()> {
        self.graph = Some(build_schema(&self.store, &self.transformers)?);
        Ok(())
    }

    fn generate_routes(&mut self) -> Result<()> {
        self.routes = prepare_routes(&self.store);
        log::debug!("generated {} routes", self.routes.len());
        Ok(())
    }

    fn process_events(&mut self) -> Result<()> {
        for event in self.events.drain() {
            match event {
                PluginEvent::GenerateRoutes => self.generate_routes()?,
                PluginEvent::Broadcast(message) => {
                    log::debug!("broadcast: {message}");
                }
            }
        }
        Ok(())
    }

    /// Recompile the schema and route table after content types changed in
    /// an incremental re-ingestion. Takes `&mut self`, so no query can run
    /// concurrently with it.
    pub fn rebuild_schema(&mut self) -> Result<()> {
        self.create_schema()?;
        self.generate_routes()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable store access for incremental re-ingestion between builds.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn graph(&self) -> Option<&SchemaGraph> {
        self.graph.as_ref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn executor(&self) -> Result<Executor<'_>> {
        let graph = self.graph.as_ref().ok_or_else(|| {
            VellumError::Query("schema has not been compiled; run bootstrap first".into())
        })?;
        Ok(Executor::new(&self.store, graph))
    }

    /// Execute a query document against the compiled graph. Read-only; any
    /// number of executions may run concurrently.
    pub fn query(&self, document: &QueryDocument, variables: &Variables) -> Result<QueryResult> {
        Ok(self.executor()?.execute(document, variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::plugins::PluginContext;
    use crate::query::Selection;
    use crate::schema::{BelongsTo, ContentType, FieldDefinition, Reference};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct BlogSource;

    impl Plugin for BlogSource {
        fn name(&self) -> &str {
            "blog-source"
        }

        fn run(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
            ctx.store.add_collection(
                ContentType::new("Post")
                    .with_field("tags", FieldDefinition::list_of("string"))
                    .with_ref("tags", Reference::to("id", "Tag"))
                    .with_belongs_to("author", BelongsTo::new("id", "Author", "posts")),
            )?;
            ctx.store.add_collection(
                ContentType::new("Author")
                    .with_field("posts", FieldDefinition::list_of("string")),
            )?;
            ctx.store.add_collection(ContentType::new("Tag"))?;

            let posts = ctx.store.get_type_mut("Post")?;
            posts.insert(
                Node::new("Post", "post-1")
                    .with_title("Hello")
                    .with_field("tags", json!(["tag-a"])),
            )?;

            let authors = ctx.store.get_type_mut("Author")?;
            authors.insert(
                Node::new("Author", "author-1")
                    .with_title("Alice")
                    .with_field("posts", json!(["post-1"])),
            )?;

            let tags = ctx.store.get_type_mut("Tag")?;
            tags.insert(Node::new("Tag", "tag-a").with_title("A"))?;

            ctx.events.emit(PluginEvent::GenerateRoutes);
            Ok(())
        }
    }

    #[test]
    fn bootstrap_then_query_end_to_end() {
        let mut service = Service::new();
        service.register_plugin(Box::new(BlogSource));
        service.bootstrap().unwrap();

        assert!(service.graph().is_some());
        assert_eq!(service.routes().len(), 3);

        let document = QueryDocument::new(vec![Selection::new("post")
            .arg("id", "post-1")
            .child(Selection::new("title"))
            .child(
                Selection::new("belongsTo")
                    .child(Selection::new("author").child(Selection::new("id"))),
            )]);

        let result = service.query(&document, &Variables::new()).unwrap();
        assert!(result.is_ok(), "errors: {:?}", result.errors);
        assert_eq!(result.data["post"]["title"], json!("Hello"));
        assert_eq!(
            result.data["post"]["belongsTo"]["author"],
            json!([{ "id": "author-1" }])
        );
    }

    #[test]
    fn query_before_schema_compilation_fails() {
        let service = Service::new();
        let document = QueryDocument::new(vec![Selection::new("post")]);
        let result = service.query(&document, &Variables::new());
        assert!(result.is_err());
    }

    #[test]
    fn failing_schema_aborts_bootstrap() {
        struct Dangling;
        impl Plugin for Dangling {
            fn name(&self) -> &str {
                "dangling"
            }
            fn run(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
                ctx.store.add_collection(
                    ContentType::new("Post").with_ref("tags", Reference::to("id", "Tag")),
                )?;
                Ok(())
            }
        }

        let mut service = Service::new();
        service.register_plugin(Box::new(Dangling));
        let result = service.bootstrap();
        assert!(matches!(result, Err(VellumError::Schema(_))));
        assert!(service.graph().is_none());
    }

    #[test]
    fn rebuild_after_incremental_reingestion() {
        let mut service = Service::new();
        service.register_plugin(Box::new(BlogSource));
        service.bootstrap().unwrap();

        service
            .store_mut()
            .add_collection(ContentType::new("Page"))
            .unwrap();
        service
            .store_mut()
            .get_type_mut("Page")
            .unwrap()
            .insert(Node::new("Page", "about").with_path("/about"))
            .unwrap();
        service.rebuild_schema().unwrap();

        assert!(service.graph().unwrap().node_type("Page").is_some());
        assert_eq!(service.routes().len(), 4);
    }
}
