pub mod parser;
pub mod types;

pub use parser::{parse_content_types, parse_content_types_str};
pub use types::{
    BelongsTo, ContentType, FieldDefinition, FieldType, ItemType, RefTarget, Reference,
};
