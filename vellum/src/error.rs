use thiserror::Error;

#[derive(Error, Debug)]
pub enum VellumError {
    #[error("Content type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Unknown content type '{0}'")]
    UnknownType(String),

    #[error("Duplicate node id '{id}' in collection '{type_name}'")]
    DuplicateId { type_name: String, id: String },

    #[error("Node not found: {type_name}/{id}")]
    NotFound { type_name: String, id: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("{0}")]
    Query(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VellumError>;
