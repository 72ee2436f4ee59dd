// Node model - the unit of content handed to the store by source plugins

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Origin metadata attached to every node. The query engine treats this block
/// as opaque: it is serialized whole and never resolved field-by-field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Internal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// A single content record. `id` is unique within the owning collection and
/// `path`, when set, is unique within its route namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub type_name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub internal: Internal,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            type_name: type_name.into(),
            path: None,
            internal: Internal::default(),
            title: None,
            slug: None,
            content: None,
            date: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_internal(mut self, internal: Internal) -> Self {
        self.internal = internal;
        self
    }

    /// Uniform field access used by query matching: well-known top-level
    /// attributes first, then the custom `fields` map.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "typeName" => Some(Value::String(self.type_name.clone())),
            "path" => self.path.clone().map(Value::String),
            "title" => self.title.clone().map(Value::String),
            "slug" => self.slug.clone().map(Value::String),
            "content" => self.content.clone().map(Value::String),
            "date" => self.date.map(|d| Value::String(d.to_rfc3339())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// Partial update payload. `None` leaves the attribute untouched; entries in
/// `fields` are merged key-by-key, with explicit nulls ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub internal: Option<Internal>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl NodePatch {
    pub fn new() -> Self {
        NodePatch::default()
    }

    pub fn set_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn set_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Apply this patch to a node in place.
    pub fn apply(&self, node: &mut Node) {
        if let Some(path) = &self.path {
            node.path = Some(path.clone());
        }
        if let Some(title) = &self.title {
            node.title = Some(title.clone());
        }
        if let Some(slug) = &self.slug {
            node.slug = Some(slug.clone());
        }
        if let Some(content) = &self.content {
            node.content = Some(content.clone());
        }
        if let Some(date) = self.date {
            node.date = Some(date);
        }
        if let Some(internal) = &self.internal {
            node.internal = internal.clone();
        }
        for (key, value) in &self.fields {
            if *value != Value::Null {
                node.fields.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_value_prefers_top_level_attributes() {
        let node = Node::new("Post", "post-1")
            .with_title("Hello")
            .with_path("/hello")
            .with_field("category", "news");

        assert_eq!(node.field_value("id"), Some(json!("post-1")));
        assert_eq!(node.field_value("typeName"), Some(json!("Post")));
        assert_eq!(node.field_value("path"), Some(json!("/hello")));
        assert_eq!(node.field_value("category"), Some(json!("news")));
        assert_eq!(node.field_value("missing"), None);
    }

    #[test]
    fn patch_merges_fields_and_skips_nulls() {
        let mut node = Node::new("Post", "post-1")
            .with_field("category", "news")
            .with_field("draft", true);

        let patch = NodePatch::new()
            .set_title("Updated")
            .set_field("category", "tech")
            .set_field("draft", Value::Null);
        patch.apply(&mut node);

        assert_eq!(node.title.as_deref(), Some("Updated"));
        assert_eq!(node.fields["category"], json!("tech"));
        assert_eq!(node.fields["draft"], json!(true));
    }
}
