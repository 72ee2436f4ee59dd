pub mod error;
pub mod graph;
pub mod node;
pub mod plugins;
pub mod query;
pub mod routes;
pub mod schema;
pub mod service;
pub mod store;
pub mod transformer;

pub use error::{Result, VellumError};
pub use graph::{build_schema, SchemaGraph};
pub use node::{Internal, Node, NodePatch};
pub use query::{Executor, QueryDocument, QueryResult, Selection, Variables};
pub use schema::ContentType;
pub use service::Service;
pub use store::{Collection, Matcher, Query, Store};
