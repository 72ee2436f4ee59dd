// Mime-type keyed node-type extension point. Transformers contribute extra
// query fields to the node types of the content types that declare their
// mime type; the schema builder merges whatever field maps they return.

use crate::graph::FieldKind;
use crate::node::Node;
use crate::schema::ContentType;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ExtensionResolver = Arc<dyn Fn(&Node) -> serde_json::Value + Send + Sync>;

/// A single contributed field: its declared kind plus a resolver closure
/// evaluated against the node at query time.
#[derive(Clone)]
pub struct ExtensionField {
    pub kind: FieldKind,
    pub resolve: ExtensionResolver,
}

impl ExtensionField {
    pub fn new<F>(kind: FieldKind, resolve: F) -> Self
    where
        F: Fn(&Node) -> serde_json::Value + Send + Sync + 'static,
    {
        ExtensionField {
            kind,
            resolve: Arc::new(resolve),
        }
    }
}

/// Anything that can extend a node type with additional fields. Must be
/// side-effect free: the builder may invoke it any number of times.
pub trait Transformer: Send + Sync {
    fn extend_node_type(&self, content_type: &ContentType) -> BTreeMap<String, ExtensionField>;
}

/// Registry of transformers keyed by mime type.
#[derive(Default)]
pub struct TransformerRegistry {
    by_mime: BTreeMap<String, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        TransformerRegistry::default()
    }

    /// Register a transformer for a mime type. Re-registering a mime type
    /// replaces the previous transformer.
    pub fn register(&mut self, mime_type: impl Into<String>, transformer: Arc<dyn Transformer>) {
        self.by_mime.insert(mime_type.into(), transformer);
    }

    pub fn get(&self, mime_type: &str) -> Option<&Arc<dyn Transformer>> {
        self.by_mime.get(mime_type)
    }

    pub fn is_empty(&self) -> bool {
        self.by_mime.is_empty()
    }

    /// Collect the contributed fields for a content type. Mime types are
    /// visited in sorted order and later contributions win on key collision,
    /// so merging is deterministic regardless of registration order.
    pub fn fields_for(&self, content_type: &ContentType) -> BTreeMap<String, ExtensionField> {
        let mut mime_types: Vec<&String> = content_type.mime_types.iter().collect();
        mime_types.sort();
        mime_types.dedup();

        let mut fields = BTreeMap::new();
        for mime_type in mime_types {
            if let Some(transformer) = self.by_mime.get(mime_type) {
                fields.extend(transformer.extend_node_type(content_type));
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct WordCount;

    impl Transformer for WordCount {
        fn extend_node_type(
            &self,
            _content_type: &ContentType,
        ) -> BTreeMap<String, ExtensionField> {
            let mut fields = BTreeMap::new();
            fields.insert(
                "wordCount".to_string(),
                ExtensionField::new(FieldKind::Number, |node| {
                    let words = node
                        .content
                        .as_deref()
                        .map(|c| c.split_whitespace().count())
                        .unwrap_or(0);
                    json!(words)
                }),
            );
            fields
        }
    }

    #[test]
    fn fields_for_merges_declared_mime_types_only() {
        let mut registry = TransformerRegistry::new();
        registry.register("text/markdown", Arc::new(WordCount));

        let markdown = ContentType::new("Post").with_mime_type("text/markdown");
        let plain = ContentType::new("Tag");

        assert_eq!(registry.fields_for(&markdown).len(), 1);
        assert!(registry.fields_for(&plain).is_empty());

        let node = Node::new("Post", "p").with_content("one two three");
        let field = &registry.fields_for(&markdown)["wordCount"];
        assert_eq!((field.resolve)(&node), json!(3));
    }
}
