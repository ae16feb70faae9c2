use std::collections::BTreeMap;
use crate::db::{SchemaSnapshot, TableSchema};
use crate::error::DatabaseInformationError;
use crate::naming;
use crate::relationships::{self, RelationshipSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

/// Schema metadata for one generation run.
///
/// Holds the full schema snapshot, the tables the run was asked to generate
/// and the relationships inferred for them. Relationships are computed once on
/// construction and never change afterwards.
#[derive(Debug, Clone)]
pub struct DatabaseInformation {
    schema: SchemaSnapshot,
    requested: Vec<String>,
    relationships: BTreeMap<String, RelationshipSet>,
}

impl DatabaseInformation {
    pub fn new(schema: SchemaSnapshot, requested: Vec<String>) -> Self {
        let requested: Vec<String> = requested
            .into_iter()
            .filter(|table| schema.contains_key(table))
            .collect();
        let relationships = relationships::infer(&schema, &requested);

        Self {
            schema,
            requested,
            relationships,
        }
    }

    /// Requested tables, in request order.
    pub fn tables(&self) -> &[String] {
        &self.requested
    }

    /// Requested tables with their metadata.
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.requested.iter().filter_map(|t| self.schema.get(t))
    }

    /// Schema of any table in the snapshot.
    pub fn schema_of(&self, table: &str) -> Option<&TableSchema> {
        self.schema.get(table)
    }

    pub fn primary_key(&self, table: &str) -> Result<PrimaryKey, DatabaseInformationError> {
        let info = self
            .schema
            .get(table)
            .ok_or_else(|| DatabaseInformationError::UnknownTable(table.to_string()))?;

        match info.primary_key.as_slice() {
            [] => Err(DatabaseInformationError::MissingPrimaryKey(table.to_string())),
            [single] => Ok(PrimaryKey::Single(single.clone())),
            many => Ok(PrimaryKey::Composite(many.to_vec())),
        }
    }

    /// Translation table belonging to `table`, e.g. `post_translations` for `posts`.
    pub fn translation_table(&self, table: &str) -> Option<&str> {
        if naming::is_translation_table(table) {
            return None;
        }

        let singular = format!("{}_translations", naming::singular(table));
        let plural = format!("{}_translations", naming::plural(table));

        self.schema
            .keys()
            .find(|name| **name == singular || **name == plural)
            .map(String::as_str)
    }

    pub fn relationships(&self, table: &str) -> &RelationshipSet {
        static EMPTY: RelationshipSet = RelationshipSet {
            has_many: Vec::new(),
            has_one: Vec::new(),
            belongs_to: Vec::new(),
            belongs_to_many: Vec::new(),
        };
        self.relationships.get(table).unwrap_or(&EMPTY)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::fixtures::{blog_schema, blog_tables};

    #[test]
    fn test_requested_subset() {
        let info = DatabaseInformation::new(blog_schema(), vec!["users".into(), "ghosts".into()]);
        assert_eq!(info.tables(), ["users".to_string()]);
        let names: Vec<&str> = info.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users"]);
        assert!(info.schema_of("posts").is_some());
    }

    #[test]
    fn test_primary_key() {
        let info = DatabaseInformation::new(blog_schema(), blog_tables());
        assert_eq!(info.primary_key("users"), Ok(PrimaryKey::Single("id".into())));
        assert_eq!(
            info.primary_key("role_user"),
            Err(DatabaseInformationError::MissingPrimaryKey("role_user".into()))
        );
        assert_eq!(
            info.primary_key("nope"),
            Err(DatabaseInformationError::UnknownTable("nope".into()))
        );
    }

    #[test]
    fn test_translation_table() {
        let info = DatabaseInformation::new(blog_schema(), blog_tables());
        assert_eq!(info.translation_table("posts"), Some("post_translations"));
        assert_eq!(info.translation_table("users"), None);
        assert_eq!(info.translation_table("post_translations"), None);
    }

    #[test]
    fn test_relationships_are_inferred_once_for_requested_tables() {
        let info = DatabaseInformation::new(blog_schema(), blog_tables());
        let users = info.relationships("users");

        assert_eq!(users.belongs_to_many.len(), 1);
        assert_eq!(users.belongs_to_many[0].table, "roles");
        assert_eq!(users.has_one.len(), 1);
        assert_eq!(users.has_one[0].table, "profiles");
        // posts, role_user and the unrequested audits table all reference users.
        let many: Vec<&str> = users.has_many.iter().map(|l| l.table.as_str()).collect();
        assert_eq!(many, vec!["audits", "posts", "role_user"]);

        assert_eq!(info.relationships("audits").iter().count(), 0);
    }
}
