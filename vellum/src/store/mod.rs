use crate::error::{Result, VellumError};
use crate::node::{Node, NodePatch};
use crate::schema::ContentType;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A single query term: strict equality or `$in` set membership. For `$in`,
/// a node matches when its field equals any listed value, or when the field
/// is a list containing any listed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Eq(Value),
    In(Vec<Value>),
}

impl Matcher {
    pub fn eq(value: impl Into<Value>) -> Self {
        Matcher::Eq(value.into())
    }

    pub fn within(values: Vec<Value>) -> Self {
        Matcher::In(values)
    }

    /// Accept the JSON form used in query documents: `{ "$in": [...] }`
    /// becomes a set-membership test, anything else is an equality test.
    pub fn from_value(value: &Value) -> Self {
        if let Some(object) = value.as_object() {
            if object.len() == 1 {
                if let Some(Value::Array(values)) = object.get("$in") {
                    return Matcher::In(values.clone());
                }
            }
        }
        Matcher::Eq(value.clone())
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else { return false };
        match self {
            Matcher::Eq(expected) => value == expected,
            Matcher::In(candidates) => candidates.iter().any(|candidate| {
                value == candidate
                    || value
                        .as_array()
                        .is_some_and(|items| items.contains(candidate))
            }),
        }
    }
}

/// A conjunction of per-field matchers. An empty query matches every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    terms: BTreeMap<String, Matcher>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn field(mut self, name: impl Into<String>, matcher: Matcher) -> Self {
        self.terms.insert(name.into(), matcher);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Build a query from the JSON filter form, e.g.
    /// `{ "category": "news", "tags": { "$in": ["a", "b"] } }`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| VellumError::Query("filter must be an object".into()))?;

        let mut query = Query::new();
        for (name, term) in object {
            query = query.field(name.clone(), Matcher::from_value(term));
        }
        Ok(query)
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.terms
            .iter()
            .all(|(name, matcher)| matcher.matches(node.field_value(name).as_ref()))
    }
}

/// An indexed set of nodes of one content type. Nodes keep insertion order;
/// a secondary `path -> id` index backs URL lookups and stays consistent
/// with the primary index across insert/update/remove.
pub struct Collection {
    content_type: ContentType,
    nodes: Vec<Node>,
    ids: HashMap<String, usize>,
    paths: HashMap<String, String>,
}

impl Collection {
    fn new(content_type: ContentType) -> Self {
        Collection {
            content_type,
            nodes: Vec::new(),
            ids: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.content_type.name
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn insert(&mut self, mut node: Node) -> Result<()> {
        if self.ids.contains_key(&node.id) {
            return Err(VellumError::DuplicateId {
                type_name: self.content_type.name.clone(),
                id: node.id.clone(),
            });
        }

        node.type_name = self.content_type.name.clone();

        if let Some(path) = &node.path {
            if self.paths.contains_key(path) {
                log::warn!(
                    "path '{}' is already mapped in collection '{}', remapping to '{}'",
                    path,
                    self.content_type.name,
                    node.id
                );
            }
            self.paths.insert(path.clone(), node.id.clone());
        }

        self.ids.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn update(&mut self, id: &str, patch: &NodePatch) -> Result<()> {
        let index = *self.ids.get(id).ok_or_else(|| VellumError::NotFound {
            type_name: self.content_type.name.clone(),
            id: id.to_string(),
        })?;

        let node = &mut self.nodes[index];
        let old_path = node.path.clone();
        patch.apply(node);
        let new_path = node.path.clone();

        if old_path != new_path {
            if let Some(old) = old_path {
                if self.paths.get(&old).map(String::as_str) == Some(id) {
                    self.paths.remove(&old);
                }
            }
            if let Some(new) = new_path {
                self.paths.insert(new, id.to_string());
            }
        }

        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Node> {
        let index = self.ids.remove(id).ok_or_else(|| VellumError::NotFound {
            type_name: self.content_type.name.clone(),
            id: id.to_string(),
        })?;

        let node = self.nodes.remove(index);
        for position in self.ids.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }

        if let Some(path) = &node.path {
            if self.paths.get(path).map(String::as_str) == Some(id) {
                self.paths.remove(path);
            }
        }

        Ok(node)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.ids.get(id).map(|index| &self.nodes[*index])
    }

    /// Exact match against the path index.
    pub fn find_by_path(&self, path: &str) -> Option<&Node> {
        self.paths.get(path).and_then(|id| self.get(id))
    }

    /// Filtered iteration in insertion order. An empty query returns all nodes.
    pub fn find(&self, query: &Query) -> Vec<&Node> {
        self.nodes.iter().filter(|node| query.matches(node)).collect()
    }

    /// Linear scan with an arbitrary predicate, used where the match target
    /// is nested inside a list field.
    pub fn filter<P>(&self, predicate: P) -> Vec<&Node>
    where
        P: Fn(&Node) -> bool,
    {
        self.nodes.iter().filter(|node| predicate(node)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

/// Registry of collections keyed by content type name. The central access
/// point for both the schema builder and query resolvers.
#[derive(Default)]
pub struct Store {
    collections: BTreeMap<String, Collection>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn add_collection(&mut self, content_type: ContentType) -> Result<&mut Collection> {
        let name = content_type.name.clone();
        if self.collections.contains_key(&name) {
            return Err(VellumError::DuplicateType(name));
        }

        self.collections
            .insert(name.clone(), Collection::new(content_type));
        Ok(self.collections.get_mut(&name).expect("just inserted"))
    }

    pub fn get_type(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| VellumError::UnknownType(name.to_string()))
    }

    pub fn get_type_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| VellumError::UnknownType(name.to_string()))
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn content_types(&self) -> impl Iterator<Item = &ContentType> {
        self.collections.values().map(Collection::content_type)
    }
}
