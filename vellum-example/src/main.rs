use actix_web::{middleware, web, App, HttpServer};
use serde_json::json;
use std::sync::Arc;
use vellum::graph::FieldKind;
use vellum::node::Node;
use vellum::plugins::{Plugin, PluginContext};
use vellum::schema::{BelongsTo, ContentType, FieldDefinition, Reference};
use vellum::transformer::{ExtensionField, Transformer};
use vellum::{Result, Service};

mod handlers;

/// Shared application state
pub struct AppState {
    pub service: Service,
}

/// Demo source plugin: a tiny blog with authors, posts and tags.
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
                .with_belongs_to("author", BelongsTo::new("id", "Author", "posts"))
                .with_mime_type("text/markdown"),
        )?;
        ctx.store.add_collection(
            ContentType::new("Author").with_field("posts", FieldDefinition::list_of("string")),
        )?;
        ctx.store.add_collection(ContentType::new("Tag"))?;

        let posts = ctx.store.get_type_mut("Post")?;
        posts.insert(
            Node::new("Post", "hello-world")
                .with_title("Hello World")
                .with_path("/hello-world")
                .with_content("Welcome to the blog.\n\nMore to come.")
                .with_field("tags", json!(["rust", "meta"])),
        )?;
        posts.insert(
            Node::new("Post", "second-post")
                .with_title("Second Post")
                .with_content("Still here.")
                .with_field("tags", json!(["meta"])),
        )?;

        let authors = ctx.store.get_type_mut("Author")?;
        authors.insert(
            Node::new("Author", "alice")
                .with_title("Alice")
                .with_field("posts", json!(["hello-world", "second-post"])),
        )?;

        let tags = ctx.store.get_type_mut("Tag")?;
        tags.insert(Node::new("Tag", "rust").with_title("Rust"))?;
        tags.insert(Node::new("Tag", "meta").with_title("Meta"))?;

        Ok(())
    }
}

/// Markdown transformer: contributes an `excerpt` field with the first
/// paragraph of the node's content.
struct MarkdownTransformer;

impl Transformer for MarkdownTransformer {
    fn extend_node_type(
        &self,
        _content_type: &ContentType,
    ) -> std::collections::BTreeMap<String, ExtensionField> {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert(
            "excerpt".to_string(),
            ExtensionField::new(FieldKind::String, |node| {
                let excerpt = node
                    .content
                    .as_deref()
                    .and_then(|content| content.split("\n\n").next())
                    .unwrap_or("");
                json!(excerpt)
            }),
        );
        fields
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting vellum example server");

    let host = std::env::var("VELLUM_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("VELLUM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let mut service = Service::new();
    service.register_transformer("text/markdown", Arc::new(MarkdownTransformer));
    service.register_plugin(Box::new(BlogSource));
    service.bootstrap().expect("Failed to bootstrap service");

    let state = web::Data::new(AppState { service });

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
