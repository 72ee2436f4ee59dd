use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative schema for one collection of nodes: the shape of the custom
/// `fields` payload, forward references and reverse (belongs-to) references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default)]
    pub refs: BTreeMap<String, Reference>,
    #[serde(default)]
    pub belongs_to: BTreeMap<String, BelongsTo>,
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl ContentType {
    pub fn new(name: impl Into<String>) -> Self {
        ContentType {
            name: name.into(),
            description: None,
            fields: BTreeMap::new(),
            refs: BTreeMap::new(),
            belongs_to: BTreeMap::new(),
            mime_types: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.insert(name.into(), definition);
        self
    }

    pub fn with_ref(mut self, key: impl Into<String>, reference: Reference) -> Self {
        self.refs.insert(key.into(), reference);
        self
    }

    pub fn with_belongs_to(mut self, key: impl Into<String>, belongs_to: BelongsTo) -> Self {
        self.belongs_to.insert(key.into(), belongs_to);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_types.push(mime_type.into());
        self
    }
}

/// Definition of a single field in a content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub items: Option<ItemType>,
}

impl FieldDefinition {
    pub fn of(field_type: FieldType) -> Self {
        FieldDefinition {
            field_type,
            required: false,
            items: None,
        }
    }

    pub fn list_of(items: impl Into<String>) -> Self {
        FieldDefinition {
            field_type: FieldType::List,
            required: false,
            items: Some(ItemType::Simple(items.into())),
        }
    }
}

/// Field type enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    List,
    Object,
}

/// Item type for lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemType {
    Simple(String),
    Complex(Box<FieldDefinition>),
}

/// Forward reference: this node's `fields[<ref key>]` holds values matched
/// against the target collection's `key` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub key: String,
    pub schema_type: RefTarget,
    #[serde(default)]
    pub description: Option<String>,
}

impl Reference {
    pub fn to(key: impl Into<String>, schema_type: impl Into<String>) -> Self {
        Reference {
            key: key.into(),
            schema_type: RefTarget::Single(schema_type.into()),
            description: None,
        }
    }

    pub fn to_any(key: impl Into<String>, schema_types: Vec<String>) -> Self {
        Reference {
            key: key.into(),
            schema_type: RefTarget::Multiple(schema_types),
            description: None,
        }
    }
}

/// Reference target - single content type or multiple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefTarget {
    Single(String),
    Multiple(Vec<String>),
}

impl RefTarget {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            RefTarget::Single(name) => vec![name.as_str()],
            RefTarget::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Reverse reference: nodes in the foreign collection whose `fields[foreign_key]`
/// list contains this node's `local_key` value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BelongsTo {
    pub local_key: String,
    pub foreign_schema_type: String,
    pub foreign_key: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl BelongsTo {
    pub fn new(
        local_key: impl Into<String>,
        foreign_schema_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        BelongsTo {
            local_key: local_key.into(),
            foreign_schema_type: foreign_schema_type.into(),
            foreign_key: foreign_key.into(),
            description: None,
        }
    }
}
