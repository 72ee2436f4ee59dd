// Schema builder: compiles the full set of registered content types into an
// immutable query graph. Runs once per build, after ingestion and before any
// query is served; fails atomically on bad references or name collisions.

use crate::error::{Result, VellumError};
use crate::node::Node;
use crate::schema::{FieldDefinition, FieldType, ItemType, RefTarget};
use crate::store::Store;
use crate::transformer::{ExtensionResolver, TransformerRegistry};
use heck::ToPascalCase;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The declared kind of a query field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    String,
    Number,
    Boolean,
    Date,
    /// Untyped JSON payload (nested objects, lists without item types).
    Json,
    /// The opaque internal metadata block.
    Internal,
    /// A generated object type, by name.
    Object(String),
    /// A node type, by content type name.
    Node(String),
    /// A generated union over several node types, by name.
    Union(String),
    List(Box<FieldKind>),
}

impl FieldKind {
    pub fn list_of(kind: FieldKind) -> Self {
        FieldKind::List(Box::new(kind))
    }

    fn label(&self) -> String {
        match self {
            FieldKind::Id => "Id".into(),
            FieldKind::String => "String".into(),
            FieldKind::Number => "Number".into(),
            FieldKind::Boolean => "Boolean".into(),
            FieldKind::Date => "Date".into(),
            FieldKind::Json => "Json".into(),
            FieldKind::Internal => "Internal".into(),
            FieldKind::Object(name) => name.clone(),
            FieldKind::Node(name) => name.clone(),
            FieldKind::Union(name) => name.clone(),
            FieldKind::List(inner) => format!("[{}]", inner.label()),
        }
    }
}

/// How a field's value is produced from the node being resolved.
#[derive(Clone)]
pub enum Resolver {
    Id,
    TypeName,
    Internal,
    Title,
    Slug,
    Path,
    Content,
    Date,
    /// The nested `{Type}Fields` object; resolution stays on the same node.
    Fields,
    /// The `{Type}References` object; resolution stays on the same node.
    Refs,
    /// The `{Type}BelongsTo` object; resolution stays on the same node.
    BelongsTo,
    /// Read `fields[name]` from the node.
    CustomField(String),
    /// Forward reference: match the target collection's `key` field against
    /// the id list held in this node's `fields[field]`.
    Ref {
        field: String,
        key: String,
        target: RefTarget,
    },
    /// Reverse reference: scan the foreign collection for nodes whose
    /// `fields[foreign_key]` list contains this node's `local_key` value.
    BelongsToRef {
        local_key: String,
        foreign_type: String,
        foreign_key: String,
    },
    /// Transformer-contributed field.
    Extension(ExtensionResolver),
}

impl Resolver {
    /// Relations are only resolved when explicitly selected; everything else
    /// expands by default. This keeps default selections cycle-free.
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            Resolver::Refs
                | Resolver::BelongsTo
                | Resolver::Ref { .. }
                | Resolver::BelongsToRef { .. }
        )
    }
}

#[derive(Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub resolver: Resolver,
}

impl FieldSpec {
    fn new(kind: FieldKind, resolver: Resolver) -> Self {
        FieldSpec { kind, resolver }
    }
}

/// A compiled object type: a node type or one of its generated sub-types.
#[derive(Clone)]
pub struct ObjectType {
    pub name: String,
    pub fields: BTreeMap<String, FieldSpec>,
}

/// A generated polymorphic target over several node types. Membership is
/// tagged by each node's own type discriminant.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub variants: Vec<String>,
}

impl UnionType {
    pub fn contains(&self, type_name: &str) -> bool {
        self.variants.iter().any(|variant| variant == type_name)
    }

    pub fn variant_for(&self, node: &Node) -> Option<&str> {
        self.variants
            .iter()
            .find(|variant| **variant == node.type_name)
            .map(String::as_str)
    }
}

/// Structural capability check: is this value a node? Nodes carry an `id`
/// and a `typeName` discriminant.
pub fn is_node(value: &Value) -> bool {
    value.get("id").is_some_and(Value::is_string)
        && value.get("typeName").is_some_and(Value::is_string)
}

/// Structural capability check: does this object type expose a scalar
/// `title` field, as every generated `{Type}Fields` object does?
pub fn has_title_field(object_type: &ObjectType) -> bool {
    object_type
        .fields
        .get("title")
        .is_some_and(|spec| spec.kind == FieldKind::String)
}

/// The compiled, immutable query graph: one node type per content type plus
/// all generated sub-types and unions. Every map is ordered, so compiling
/// the same definitions twice yields a structurally identical graph.
pub struct SchemaGraph {
    pub node_types: BTreeMap<String, ObjectType>,
    pub objects: BTreeMap<String, ObjectType>,
    pub unions: BTreeMap<String, UnionType>,
}

impl SchemaGraph {
    pub fn node_type(&self, name: &str) -> Option<&ObjectType> {
        self.node_types.get(name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.objects.get(name)
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    /// Deterministic structural description: type names, field names and
    /// field kinds, one line per type.
    pub fn signature(&self) -> String {
        let mut lines = Vec::new();
        for (name, object_type) in self.node_types.iter().chain(self.objects.iter()) {
            let fields: Vec<String> = object_type
                .fields
                .iter()
                .map(|(field, spec)| format!("{field}:{}", spec.kind.label()))
                .collect();
            lines.push(format!("{name}{{{}}}", fields.join(",")));
        }
        for (name, union) in &self.unions {
            lines.push(format!("{name}={}", union.variants.join("|")));
        }
        lines.join("\n")
    }
}

/// Compile the query graph from every content type registered in the store,
/// merging transformer-contributed fields along the way.
pub fn build_schema(store: &Store, transformers: &TransformerRegistry) -> Result<SchemaGraph> {
    let known: BTreeSet<String> = store.content_types().map(|ct| ct.name.clone()).collect();

    // Fail fast on dangling references before building anything.
    for content_type in store.content_types() {
        for (key, reference) in &content_type.refs {
            for target in reference.schema_type.targets() {
                if !known.contains(target) {
                    return Err(VellumError::Schema(format!(
                        "reference '{key}' on type '{}' targets unknown type '{target}'",
                        content_type.name
                    )));
                }
            }
        }
        for (key, belongs_to) in &content_type.belongs_to {
            if !known.contains(&belongs_to.foreign_schema_type) {
                return Err(VellumError::Schema(format!(
                    "belongsTo '{key}' on type '{}' targets unknown type '{}'",
                    content_type.name, belongs_to.foreign_schema_type
                )));
            }
        }
    }

    let mut graph = SchemaGraph {
        node_types: BTreeMap::new(),
        objects: BTreeMap::new(),
        unions: BTreeMap::new(),
    };
    let mut used_names = known.clone();

    for content_type in store.content_types() {
        build_node_type(content_type, transformers, &mut graph, &mut used_names)?;
    }

    Ok(graph)
}

fn build_node_type(
    content_type: &crate::schema::ContentType,
    transformers: &TransformerRegistry,
    graph: &mut SchemaGraph,
    used_names: &mut BTreeSet<String>,
) -> Result<()> {
    let type_name = &content_type.name;
    let mut fields = BTreeMap::new();

    fields.insert("id".into(), FieldSpec::new(FieldKind::Id, Resolver::Id));
    fields.insert(
        "typeName".into(),
        FieldSpec::new(FieldKind::String, Resolver::TypeName),
    );
    fields.insert(
        "internal".into(),
        FieldSpec::new(FieldKind::Internal, Resolver::Internal),
    );
    fields.insert(
        "title".into(),
        FieldSpec::new(FieldKind::String, Resolver::Title),
    );
    fields.insert(
        "slug".into(),
        FieldSpec::new(FieldKind::String, Resolver::Slug),
    );
    fields.insert(
        "path".into(),
        FieldSpec::new(FieldKind::String, Resolver::Path),
    );
    fields.insert(
        "content".into(),
        FieldSpec::new(FieldKind::String, Resolver::Content),
    );
    fields.insert(
        "date".into(),
        FieldSpec::new(FieldKind::Date, Resolver::Date),
    );

    for (name, extension) in transformers.fields_for(content_type) {
        fields.insert(
            name,
            FieldSpec::new(extension.kind, Resolver::Extension(extension.resolve)),
        );
    }

    // Nested custom-fields object, always present. Every one carries a
    // scalar `title`, the shared has-title capability.
    let fields_name = format!("{type_name}Fields");
    register_name(used_names, &fields_name)?;
    let mut custom_fields = BTreeMap::new();
    custom_fields.insert(
        "title".into(),
        FieldSpec::new(FieldKind::String, Resolver::CustomField("title".into())),
    );
    for (name, definition) in &content_type.fields {
        custom_fields.insert(
            name.clone(),
            FieldSpec::new(
                field_kind(definition),
                Resolver::CustomField(name.clone()),
            ),
        );
    }
    graph.objects.insert(
        fields_name.clone(),
        ObjectType {
            name: fields_name.clone(),
            fields: custom_fields,
        },
    );
    fields.insert(
        "fields".into(),
        FieldSpec::new(FieldKind::Object(fields_name), Resolver::Fields),
    );

    if !content_type.refs.is_empty() {
        let refs_name = format!("{type_name}References");
        register_name(used_names, &refs_name)?;
        let mut ref_fields = BTreeMap::new();

        for (key, reference) in &content_type.refs {
            let kind = match &reference.schema_type {
                RefTarget::Single(target) => FieldKind::list_of(FieldKind::Node(target.clone())),
                RefTarget::Multiple(targets) => {
                    let union_name =
                        format!("{type_name}{}Union", key.as_str().to_pascal_case());
                    register_name(used_names, &union_name)?;
                    graph.unions.insert(
                        union_name.clone(),
                        UnionType {
                            name: union_name.clone(),
                            variants: targets.clone(),
                        },
                    );
                    FieldKind::list_of(FieldKind::Union(union_name))
                }
            };

            ref_fields.insert(
                key.clone(),
                FieldSpec::new(
                    kind,
                    Resolver::Ref {
                        field: key.clone(),
                        key: reference.key.clone(),
                        target: reference.schema_type.clone(),
                    },
                ),
            );
        }

        graph.objects.insert(
            refs_name.clone(),
            ObjectType {
                name: refs_name.clone(),
                fields: ref_fields,
            },
        );
        fields.insert(
            "refs".into(),
            FieldSpec::new(FieldKind::Object(refs_name), Resolver::Refs),
        );
    }

    if !content_type.belongs_to.is_empty() {
        let belongs_to_name = format!("{type_name}BelongsTo");
        register_name(used_names, &belongs_to_name)?;
        let mut belongs_to_fields = BTreeMap::new();

        for (key, belongs_to) in &content_type.belongs_to {
            belongs_to_fields.insert(
                key.clone(),
                FieldSpec::new(
                    FieldKind::list_of(FieldKind::Node(belongs_to.foreign_schema_type.clone())),
                    Resolver::BelongsToRef {
                        local_key: belongs_to.local_key.clone(),
                        foreign_type: belongs_to.foreign_schema_type.clone(),
                        foreign_key: belongs_to.foreign_key.clone(),
                    },
                ),
            );
        }

        graph.objects.insert(
            belongs_to_name.clone(),
            ObjectType {
                name: belongs_to_name.clone(),
                fields: belongs_to_fields,
            },
        );
        fields.insert(
            "belongsTo".into(),
            FieldSpec::new(FieldKind::Object(belongs_to_name), Resolver::BelongsTo),
        );
    }

    graph.node_types.insert(
        type_name.clone(),
        ObjectType {
            name: type_name.clone(),
            fields,
        },
    );

    Ok(())
}

fn register_name(used_names: &mut BTreeSet<String>, name: &str) -> Result<()> {
    if !used_names.insert(name.to_string()) {
        return Err(VellumError::Schema(format!(
            "generated type name '{name}' collides with an existing type"
        )));
    }
    Ok(())
}

fn field_kind(definition: &FieldDefinition) -> FieldKind {
    match definition.field_type {
        FieldType::String => FieldKind::String,
        FieldType::Number => FieldKind::Number,
        FieldType::Boolean => FieldKind::Boolean,
        FieldType::Date => FieldKind::Date,
        FieldType::Object => FieldKind::Json,
        FieldType::List => match &definition.items {
            Some(ItemType::Simple(name)) => FieldKind::list_of(simple_kind(name)),
            Some(ItemType::Complex(inner)) => FieldKind::list_of(field_kind(inner)),
            None => FieldKind::list_of(FieldKind::Json),
        },
    }
}

fn simple_kind(name: &str) -> FieldKind {
    match name {
        "string" => FieldKind::String,
        "number" => FieldKind::Number,
        "boolean" => FieldKind::Boolean,
        "date" => FieldKind::Date,
        _ => FieldKind::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BelongsTo, ContentType, FieldDefinition, FieldType, Reference};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn blog_store() -> Store {
        let mut store = Store::new();
        store
            .add_collection(
                ContentType::new("Post")
                    .with_field("category", FieldDefinition::of(FieldType::String))
                    .with_field("tags", FieldDefinition::list_of("string"))
                    .with_ref("tags", Reference::to("id", "Tag"))
                    .with_ref(
                        "related",
                        Reference::to_any("id", vec!["Post".into(), "Author".into()]),
                    )
                    .with_belongs_to("author", BelongsTo::new("id", "Author", "posts")),
            )
            .unwrap();
        store
            .add_collection(
                ContentType::new("Author")
                    .with_field("posts", FieldDefinition::list_of("string")),
            )
            .unwrap();
        store.add_collection(ContentType::new("Tag")).unwrap();
        store
    }

    #[test]
    fn builds_node_types_with_generated_sub_types() {
        let store = blog_store();
        let graph = build_schema(&store, &TransformerRegistry::new()).unwrap();

        assert!(graph.node_type("Post").is_some());
        assert!(graph.object("PostFields").is_some());
        assert!(graph.object("PostReferences").is_some());
        assert!(graph.object("PostBelongsTo").is_some());
        assert!(graph.union("PostRelatedUnion").is_some());

        // refs/belongsTo blocks only exist where declared
        let tag = graph.node_type("Tag").unwrap();
        assert!(graph.object("TagFields").is_some());
        assert!(!tag.fields.contains_key("refs"));
        assert!(!tag.fields.contains_key("belongsTo"));

        let post = graph.node_type("Post").unwrap();
        for fixed in ["id", "typeName", "internal", "title", "slug", "path", "content", "date"] {
            assert!(post.fields.contains_key(fixed), "missing fixed field {fixed}");
        }
    }

    #[test]
    fn union_membership_follows_the_type_discriminant() {
        let store = blog_store();
        let graph = build_schema(&store, &TransformerRegistry::new()).unwrap();

        let union = graph.union("PostRelatedUnion").unwrap();
        assert_eq!(union.variants, vec!["Post".to_string(), "Author".to_string()]);
        assert!(union.contains("Author"));
        assert!(!union.contains("Tag"));

        let node = Node::new("Author", "a-1");
        assert_eq!(union.variant_for(&node), Some("Author"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let store = blog_store();
        let registry = TransformerRegistry::new();

        let first = build_schema(&store, &registry).unwrap();
        let second = build_schema(&store, &registry).unwrap();
        assert_eq!(first.signature(), second.signature());
    }

    #[test]
    fn unknown_ref_target_fails_compilation() {
        let mut store = Store::new();
        store
            .add_collection(
                ContentType::new("Post").with_ref("tags", Reference::to("id", "Tag")),
            )
            .unwrap();

        let result = build_schema(&store, &TransformerRegistry::new());
        match result {
            Err(VellumError::Schema(message)) => {
                assert!(message.contains("unknown type 'Tag'"), "got: {message}");
            }
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_belongs_to_target_fails_compilation() {
        let mut store = Store::new();
        store
            .add_collection(
                ContentType::new("Post")
                    .with_belongs_to("author", BelongsTo::new("id", "Author", "posts")),
            )
            .unwrap();

        assert!(matches!(
            build_schema(&store, &TransformerRegistry::new()),
            Err(VellumError::Schema(_))
        ));
    }

    #[test]
    fn generated_name_collision_fails_compilation() {
        let mut store = Store::new();
        store.add_collection(ContentType::new("Post")).unwrap();
        // a content type whose name matches Post's generated fields type
        store.add_collection(ContentType::new("PostFields")).unwrap();

        assert!(matches!(
            build_schema(&store, &TransformerRegistry::new()),
            Err(VellumError::Schema(_))
        ));
    }

    #[test]
    fn capability_checks_are_structural() {
        let store = blog_store();
        let graph = build_schema(&store, &TransformerRegistry::new()).unwrap();

        assert!(has_title_field(graph.object("PostFields").unwrap()));
        assert!(has_title_field(graph.object("TagFields").unwrap()));
        assert!(!has_title_field(graph.object("PostReferences").unwrap()));

        assert!(is_node(&json!({ "id": "x", "typeName": "Post" })));
        assert!(!is_node(&json!({ "id": "x" })));
    }

    #[test]
    fn transformer_fields_are_merged_into_the_node_type() {
        use crate::transformer::{ExtensionField, Transformer};
        use std::collections::BTreeMap as Map;
        use std::sync::Arc;

        struct Excerpt;
        impl Transformer for Excerpt {
            fn extend_node_type(&self, _ct: &ContentType) -> Map<String, ExtensionField> {
                let mut fields = Map::new();
                fields.insert(
                    "excerpt".into(),
                    ExtensionField::new(FieldKind::String, |node| {
                        json!(node.content.as_deref().unwrap_or("").lines().next().unwrap_or(""))
                    }),
                );
                fields
            }
        }

        let mut store = Store::new();
        store
            .add_collection(ContentType::new("Post").with_mime_type("text/markdown"))
            .unwrap();

        let mut registry = TransformerRegistry::new();
        registry.register("text/markdown", Arc::new(Excerpt));

        let graph = build_schema(&store, &registry).unwrap();
        let post = graph.node_type("Post").unwrap();
        assert!(post.fields.contains_key("excerpt"));
        assert_eq!(post.fields["excerpt"].kind, FieldKind::String);
    }
}
