// Query executor: runs structured query documents against the store using
// the compiled graph. The store is read-only here; executions never mutate
// shared state and may be interleaved freely.

use crate::error::{Result, VellumError};
use crate::graph::{FieldKind, ObjectType, Resolver, SchemaGraph};
use crate::node::Node;
use crate::schema::RefTarget;
use crate::store::{Matcher, Query, Store};
use heck::ToLowerCamelCase;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A structured query: a list of root selections. Roots are the per-type
/// single-node fields (`post`) and connection fields (`allPost`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryDocument {
    #[serde(default)]
    pub fields: Vec<Selection>,
}

impl QueryDocument {
    pub fn new(fields: Vec<Selection>) -> Self {
        QueryDocument { fields }
    }
}

/// One selected field: arguments plus nested selections. An empty child
/// list expands to every non-relational field of the selected type.
#[derive(Debug, Clone, Deserialize)]
pub struct Selection {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, ArgValue>,
    #[serde(default)]
    pub children: Vec<Selection>,
}

impl Selection {
    pub fn new(name: impl Into<String>) -> Self {
        Selection {
            name: name.into(),
            args: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), ArgValue::Lit(value.into()));
        self
    }

    pub fn var_arg(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.args.insert(name.into(), ArgValue::Var(variable.into()));
        self
    }

    pub fn child(mut self, selection: Selection) -> Self {
        self.children.push(selection);
        self
    }
}

/// An argument value: a literal, or a reference into the variables mapping
/// (serialized as `{ "$var": "name" }`).
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Lit(Value),
    Var(String),
}

impl<'de> Deserialize<'de> for ArgValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if let Some(object) = value.as_object() {
            if object.len() == 1 {
                if let Some(Value::String(name)) = object.get("$var") {
                    return Ok(ArgValue::Var(name.clone()));
                }
            }
        }
        Ok(ArgValue::Lit(value))
    }
}

impl ArgValue {
    fn resolve(&self, variables: &Variables) -> std::result::Result<Value, String> {
        match self {
            ArgValue::Lit(value) => Ok(value.clone()),
            ArgValue::Var(name) => variables
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Unknown variable '${name}'")),
        }
    }
}

pub type Variables = BTreeMap<String, Value>;

/// A field-scoped execution error. Errors are attached to the field that
/// raised them; sibling fields in the same request are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryError {
    pub path: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub data: Value,
    pub errors: Vec<QueryError>,
}

impl QueryResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Arguments for the canonical single-node lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeQueryArgs {
    pub id: Option<String>,
    pub path: Option<String>,
    pub nullable: bool,
}

impl NodeQueryArgs {
    pub fn by_id(id: impl Into<String>) -> Self {
        NodeQueryArgs {
            id: Some(id.into()),
            ..NodeQueryArgs::default()
        }
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        NodeQueryArgs {
            path: Some(path.into()),
            ..NodeQueryArgs::default()
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

fn not_found_message(type_name: &str, id: Option<&str>, path: Option<&str>) -> String {
    match path {
        Some(path) => format!("{path} was not found"),
        None => format!(
            "A {type_name} with id {} was not found",
            id.unwrap_or_default()
        ),
    }
}

/// Executes query documents against a read-only store and compiled graph.
pub struct Executor<'a> {
    store: &'a Store,
    graph: &'a SchemaGraph,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a Store, graph: &'a SchemaGraph) -> Self {
        Executor { store, graph }
    }

    /// The canonical "fetch one node" operation. `id` takes precedence over
    /// `path`; a miss is an error unless `nullable` is set.
    pub fn find_node(&self, type_name: &str, args: &NodeQueryArgs) -> Result<Option<&'a Node>> {
        let collection = self.store.get_type(type_name)?;
        let node = if let Some(id) = &args.id {
            collection.get(id)
        } else if let Some(path) = &args.path {
            collection.find_by_path(path)
        } else {
            None
        };

        match node {
            Some(node) => Ok(Some(node)),
            None if args.nullable => Ok(None),
            None => Err(VellumError::Query(not_found_message(
                type_name,
                args.id.as_deref(),
                args.path.as_deref(),
            ))),
        }
    }

    pub fn execute(&self, document: &QueryDocument, variables: &Variables) -> QueryResult {
        let mut data = Map::new();
        let mut errors = Vec::new();

        for selection in &document.fields {
            let value = self.execute_root(selection, variables, &mut errors);
            data.insert(selection.name.clone(), value);
        }

        QueryResult {
            data: Value::Object(data),
            errors,
        }
    }

    fn execute_root(
        &self,
        selection: &Selection,
        variables: &Variables,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        for (type_name, node_type) in &self.graph.node_types {
            if selection.name == type_name.to_lower_camel_case() {
                return self.node_root(type_name, node_type, selection, variables, errors);
            }
            if selection.name == format!("all{type_name}") {
                return self.connection_root(type_name, node_type, selection, variables, errors);
            }
        }

        errors.push(QueryError {
            path: vec![selection.name.clone()],
            message: format!("Unknown query field '{}'", selection.name),
        });
        Value::Null
    }

    fn node_root(
        &self,
        type_name: &str,
        node_type: &ObjectType,
        selection: &Selection,
        variables: &Variables,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        let mut path = vec![selection.name.clone()];

        let args = match self.node_args(selection, variables) {
            Ok(args) => args,
            Err(message) => {
                errors.push(QueryError { path, message });
                return Value::Null;
            }
        };

        match self.find_node(type_name, &args) {
            Ok(Some(node)) => {
                self.resolve_object(node_type, node, &selection.children, &mut path, errors)
            }
            Ok(None) => Value::Null,
            Err(error) => {
                errors.push(QueryError {
                    path,
                    message: error.to_string(),
                });
                Value::Null
            }
        }
    }

    fn node_args(
        &self,
        selection: &Selection,
        variables: &Variables,
    ) -> std::result::Result<NodeQueryArgs, String> {
        let mut args = NodeQueryArgs::default();

        for (name, arg) in &selection.args {
            let value = arg.resolve(variables)?;
            match name.as_str() {
                "id" => args.id = as_string(&value, "id")?,
                "path" => args.path = as_string(&value, "path")?,
                "nullable" => {
                    args.nullable = value
                        .as_bool()
                        .ok_or_else(|| "Argument 'nullable' must be a boolean".to_string())?
                }
                other => return Err(format!("Unknown argument '{other}'")),
            }
        }

        Ok(args)
    }

    fn connection_root(
        &self,
        type_name: &str,
        node_type: &ObjectType,
        selection: &Selection,
        variables: &Variables,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        let mut path = vec![selection.name.clone()];

        let collection = match self.store.get_type(type_name) {
            Ok(collection) => collection,
            Err(error) => {
                errors.push(QueryError {
                    path,
                    message: error.to_string(),
                });
                return Value::Null;
            }
        };

        let mut query = Query::new();
        let mut skip = 0usize;
        let mut limit = usize::MAX;

        for (name, arg) in &selection.args {
            let value = match arg.resolve(variables) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(QueryError { path, message });
                    return Value::Null;
                }
            };
            let parsed = match name.as_str() {
                "filter" => Query::from_value(&value).map(|parsed| query = parsed),
                "skip" => as_usize(&value, "skip").map(|parsed| skip = parsed),
                "limit" => as_usize(&value, "limit").map(|parsed| limit = parsed),
                other => Err(VellumError::Query(format!("Unknown argument '{other}'"))),
            };
            if let Err(error) = parsed {
                errors.push(QueryError {
                    path,
                    message: error.to_string(),
                });
                return Value::Null;
            }
        }

        let matched = collection.find(&query);
        let total = matched.len();

        path.push("nodes".into());
        let nodes: Vec<Value> = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .enumerate()
            .map(|(index, node)| {
                path.push(index.to_string());
                let value =
                    self.resolve_object(node_type, node, &selection.children, &mut path, errors);
                path.pop();
                value
            })
            .collect();
        path.pop();

        json!({ "totalCount": total, "nodes": nodes })
    }

    fn resolve_object(
        &self,
        object_type: &ObjectType,
        node: &Node,
        children: &[Selection],
        path: &mut Vec<String>,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        let default_selection;
        let selected: &[Selection] = if children.is_empty() {
            default_selection = object_type
                .fields
                .iter()
                .filter(|(_, spec)| !spec.resolver.is_relation())
                .map(|(name, _)| Selection::new(name.clone()))
                .collect::<Vec<_>>();
            &default_selection
        } else {
            children
        };

        let mut out = Map::new();
        for child in selected {
            path.push(child.name.clone());
            let value = match object_type.fields.get(&child.name) {
                Some(spec) => self.resolve_field(spec, node, child, path, errors),
                None => {
                    errors.push(QueryError {
                        path: path.clone(),
                        message: format!(
                            "Unknown field '{}' on type '{}'",
                            child.name, object_type.name
                        ),
                    });
                    Value::Null
                }
            };
            out.insert(child.name.clone(), value);
            path.pop();
        }

        Value::Object(out)
    }

    fn resolve_field(
        &self,
        spec: &crate::graph::FieldSpec,
        node: &Node,
        selection: &Selection,
        path: &mut Vec<String>,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        match &spec.resolver {
            Resolver::Id => json!(node.id),
            Resolver::TypeName => json!(node.type_name),
            Resolver::Internal => serde_json::to_value(&node.internal).unwrap_or(Value::Null),
            Resolver::Title => opt_string(&node.title),
            Resolver::Slug => opt_string(&node.slug),
            Resolver::Path => opt_string(&node.path),
            Resolver::Content => opt_string(&node.content),
            Resolver::Date => node
                .date
                .map(|date| json!(date.to_rfc3339()))
                .unwrap_or(Value::Null),
            Resolver::CustomField(name) => node.fields.get(name).cloned().unwrap_or(Value::Null),
            Resolver::Extension(resolve) => resolve(node),
            Resolver::Fields | Resolver::Refs | Resolver::BelongsTo => {
                match self.object_for(&spec.kind) {
                    Some(object_type) => {
                        self.resolve_object(object_type, node, &selection.children, path, errors)
                    }
                    None => {
                        errors.push(QueryError {
                            path: path.clone(),
                            message: "Object type missing from compiled graph".into(),
                        });
                        Value::Null
                    }
                }
            }
            Resolver::Ref { field, key, target } => {
                self.resolve_ref(node, field, key, target, selection, path, errors)
            }
            Resolver::BelongsToRef {
                local_key,
                foreign_type,
                foreign_key,
            } => self.resolve_belongs_to(
                node,
                local_key,
                foreign_type,
                foreign_key,
                selection,
                path,
                errors,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_ref(
        &self,
        node: &Node,
        field: &str,
        key: &str,
        target: &RefTarget,
        selection: &Selection,
        path: &mut Vec<String>,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        // Resolving a union reference across several collections is not
        // supported; it degrades to an empty list rather than guessing.
        let target_name = match target {
            RefTarget::Multiple(_) => return json!([]),
            RefTarget::Single(name) => name,
        };

        let values = match node.fields.get(field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };

        let (collection, target_type) = match (
            self.store.get_type(target_name),
            self.graph.node_type(target_name),
        ) {
            (Ok(collection), Some(target_type)) => (collection, target_type),
            _ => {
                errors.push(QueryError {
                    path: path.clone(),
                    message: format!("Reference target '{target_name}' is not queryable"),
                });
                return Value::Null;
            }
        };

        let query = Query::new().field(key, Matcher::In(values));
        let matched = collection.find(&query);

        Value::Array(
            matched
                .into_iter()
                .enumerate()
                .map(|(index, target_node)| {
                    path.push(index.to_string());
                    let value = self.resolve_object(
                        target_type,
                        target_node,
                        &selection.children,
                        path,
                        errors,
                    );
                    path.pop();
                    value
                })
                .collect(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_belongs_to(
        &self,
        node: &Node,
        local_key: &str,
        foreign_type: &str,
        foreign_key: &str,
        selection: &Selection,
        path: &mut Vec<String>,
        errors: &mut Vec<QueryError>,
    ) -> Value {
        let Some(local_value) = node.field_value(local_key) else {
            return json!([]);
        };

        let (collection, target_type) = match (
            self.store.get_type(foreign_type),
            self.graph.node_type(foreign_type),
        ) {
            (Ok(collection), Some(target_type)) => (collection, target_type),
            _ => {
                errors.push(QueryError {
                    path: path.clone(),
                    message: format!("belongsTo target '{foreign_type}' is not queryable"),
                });
                return Value::Null;
            }
        };

        // Membership tests are list-only: a scalar foreign field never matches.
        let matched = collection.filter(|candidate| {
            candidate
                .fields
                .get(foreign_key)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(&local_value))
        });

        Value::Array(
            matched
                .into_iter()
                .enumerate()
                .map(|(index, foreign_node)| {
                    path.push(index.to_string());
                    let value = self.resolve_object(
                        target_type,
                        foreign_node,
                        &selection.children,
                        path,
                        errors,
                    );
                    path.pop();
                    value
                })
                .collect(),
        )
    }

    fn object_for(&self, kind: &FieldKind) -> Option<&ObjectType> {
        match kind {
            FieldKind::Object(name) => self.graph.object(name),
            _ => None,
        }
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value
        .as_deref()
        .map(|s| json!(s))
        .unwrap_or(Value::Null)
}

fn as_string(value: &Value, name: &str) -> std::result::Result<Option<String>, String> {
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Null => Ok(None),
        _ => Err(format!("Argument '{name}' must be a string")),
    }
}

fn as_usize(value: &Value, name: &str) -> Result<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| VellumError::Query(format!("Argument '{name}' must be a non-negative integer")))
}
