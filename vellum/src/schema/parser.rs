use super::types::ContentType;
use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    types: BTreeMap<String, ContentType>,
}

/// Parse content-type declarations from a YAML file
pub fn parse_content_types(path: &Path) -> Result<Vec<ContentType>> {
    let content = std::fs::read_to_string(path)?;
    parse_content_types_str(&content)
}

/// Parse content-type declarations from a YAML string. The map key becomes
/// the content type's name.
pub fn parse_content_types_str(content: &str) -> Result<Vec<ContentType>> {
    let file: SchemaFile = serde_yaml::from_str(content)?;
    Ok(file
        .types
        .into_iter()
        .map(|(name, mut content_type)| {
            content_type.name = name;
            content_type
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, RefTarget};

    #[test]
    fn parses_types_with_refs_and_belongs_to() {
        let yaml = r#"
types:
  Post:
    fields:
      category: { type: string }
      tags: { type: list, items: string }
    refs:
      tags: { key: id, schema_type: Tag }
      related: { key: id, schema_type: [Post, Author] }
    belongs_to:
      author: { local_key: id, foreign_schema_type: Author, foreign_key: posts }
    mime_types: [text/markdown]

  Tag:
    fields:
      color: { type: string }
"#;

        let types = parse_content_types_str(yaml).unwrap();
        assert_eq!(types.len(), 2);

        let post = types.iter().find(|t| t.name == "Post").unwrap();
        assert_eq!(post.fields["category"].field_type, FieldType::String);
        assert_eq!(
            post.refs["tags"].schema_type,
            RefTarget::Single("Tag".into())
        );
        assert_eq!(
            post.refs["related"].schema_type,
            RefTarget::Multiple(vec!["Post".into(), "Author".into()])
        );

        let author_link = &post.belongs_to["author"];
        assert_eq!(author_link.local_key, "id");
        assert_eq!(author_link.foreign_schema_type, "Author");
        assert_eq!(author_link.foreign_key, "posts");
        assert_eq!(post.mime_types, vec!["text/markdown".to_string()]);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = parse_content_types_str("types: [not, a, map]");
        assert!(result.is_err());
    }
}
