//! Relationship inference over foreign-key and primary-key metadata.
//!
//! Only declared foreign-key constraints drive inference; column names such as
//! `user_id` carry no meaning on their own.

use serde::Serialize;
use std::collections::BTreeMap;
use crate::db::{ForeignKeyRef, SchemaSnapshot, TableSchema};

/// A foreign-key link as seen from one side of a one-to-one or one-to-many pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyLink {
    /// The table on the other side of the relationship.
    pub table: String,
    /// Foreign-key column on the owning table.
    pub field: String,
    /// Column on the referenced table.
    pub references: String,
}

/// A many-to-many link through a junction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotLink {
    pub table: String,
    pub pivot: String,
    /// Junction column pointing back at the owner of this link.
    pub local_field: String,
    /// Junction column pointing at `table`.
    pub related_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationKind {
    BelongsTo,
    BelongsToMany,
    HasMany,
    HasOne,
}

impl RelationKind {
    pub fn method(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::BelongsToMany => "belongsToMany",
            RelationKind::HasMany => "hasMany",
            RelationKind::HasOne => "hasOne",
        }
    }

    /// Relationships that resolve to a collection of related rows.
    pub fn is_many(&self) -> bool {
        matches!(self, RelationKind::BelongsToMany | RelationKind::HasMany)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship<'a> {
    HasOne(&'a KeyLink),
    HasMany(&'a KeyLink),
    BelongsTo(&'a KeyLink),
    BelongsToMany(&'a PivotLink),
}

impl<'a> Relationship<'a> {
    pub fn kind(&self) -> RelationKind {
        match self {
            Relationship::HasOne(_) => RelationKind::HasOne,
            Relationship::HasMany(_) => RelationKind::HasMany,
            Relationship::BelongsTo(_) => RelationKind::BelongsTo,
            Relationship::BelongsToMany(_) => RelationKind::BelongsToMany,
        }
    }

    pub fn related_table(&self) -> &'a str {
        match self {
            Relationship::HasOne(link)
            | Relationship::HasMany(link)
            | Relationship::BelongsTo(link) => &link.table,
            Relationship::BelongsToMany(link) => &link.table,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipSet {
    pub has_many: Vec<KeyLink>,
    pub has_one: Vec<KeyLink>,
    pub belongs_to: Vec<KeyLink>,
    pub belongs_to_many: Vec<PivotLink>,
}

impl RelationshipSet {
    /// All relationships, grouped belongs-to, belongs-to-many, has-many, has-one.
    pub fn iter(&self) -> impl Iterator<Item = Relationship<'_>> {
        self.belongs_to
            .iter()
            .map(Relationship::BelongsTo)
            .chain(self.belongs_to_many.iter().map(Relationship::BelongsToMany))
            .chain(self.has_many.iter().map(Relationship::HasMany))
            .chain(self.has_one.iter().map(Relationship::HasOne))
    }
}

/// Infer relationships for `requested` tables.
///
/// `schema` must hold every table of the database, not just the requested
/// ones: a table only counts as a junction when nothing else references it,
/// and that can only be known by looking at all foreign keys.
pub fn infer<S: AsRef<str>>(schema: &SchemaSnapshot, requested: &[S]) -> BTreeMap<String, RelationshipSet> {
    let mut rules: BTreeMap<String, RelationshipSet> = schema
        .keys()
        .map(|name| (name.clone(), RelationshipSet::default()))
        .collect();

    for (name, table) in schema {
        if is_many_to_many(schema, name) {
            add_many_to_many(&mut rules, table);
        }

        // Junction tables still get their own belongs-to links.
        for fk in &table.foreign_keys {
            let link = |other: &str| KeyLink {
                table: other.to_string(),
                field: fk.field.clone(),
                references: fk.references.clone(),
            };

            if let Some(referenced) = rules.get_mut(&fk.on) {
                if is_one_to_one(fk, table) {
                    referenced.has_one.push(link(name.as_str()));
                } else {
                    referenced.has_many.push(link(name.as_str()));
                }
            }
            if let Some(owner) = rules.get_mut(name) {
                owner.belongs_to.push(link(fk.on.as_str()));
            }
        }
    }

    requested
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            rules.remove(name).map(|set| (name.to_string(), set))
        })
        .collect()
}

fn is_one_to_one(fk: &ForeignKeyRef, table: &TableSchema) -> bool {
    table.has_single_primary_key(&fk.field)
}

fn is_many_to_many(schema: &SchemaSnapshot, name: &str) -> bool {
    let Some(table) = schema.get(name) else {
        return false;
    };

    if table.foreign_keys.len() != 2 {
        return false;
    }

    // Exactly one key doubling as primary key marks an owned entity, not a junction.
    let keys_in_primary = table
        .foreign_keys
        .iter()
        .filter(|fk| table.primary_key.iter().any(|pk| *pk == fk.field))
        .count();
    if keys_in_primary == 1 {
        return false;
    }

    !schema
        .iter()
        .filter(|(other, _)| other.as_str() != name)
        .any(|(_, other)| other.foreign_keys.iter().any(|fk| fk.on == name))
}

fn add_many_to_many(rules: &mut BTreeMap<String, RelationshipSet>, pivot: &TableSchema) {
    let (first, second) = (&pivot.foreign_keys[0], &pivot.foreign_keys[1]);

    if let Some(set) = rules.get_mut(&first.on) {
        set.belongs_to_many.push(PivotLink {
            table: second.on.clone(),
            pivot: pivot.name.clone(),
            local_field: first.field.clone(),
            related_field: second.field.clone(),
        });
    }
    if let Some(set) = rules.get_mut(&second.on) {
        set.belongs_to_many.push(PivotLink {
            table: first.on.clone(),
            pivot: pivot.name.clone(),
            local_field: second.field.clone(),
            related_field: first.field.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ColumnInfo;

    fn table(name: &str, primary: &[&str], foreign: &[(&str, &str, &str)]) -> TableSchema {
        let mut t = TableSchema::new(name);
        for pk in primary {
            t.columns.push(ColumnInfo::new(*pk, "int4"));
        }
        for (field, on, references) in foreign {
            if t.column(field).is_none() {
                t.columns.push(ColumnInfo::new(*field, "int4"));
            }
            t.foreign_keys.push(ForeignKeyRef::new(*field, *on, *references));
        }
        t.primary_key = primary.iter().map(|s| s.to_string()).collect();
        t
    }

    fn snapshot(tables: Vec<TableSchema>) -> SchemaSnapshot {
        tables.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    fn link(table: &str, field: &str, references: &str) -> KeyLink {
        KeyLink {
            table: table.to_string(),
            field: field.to_string(),
            references: references.to_string(),
        }
    }

    fn pivot(table: &str, pivot: &str, local: &str, related: &str) -> PivotLink {
        PivotLink {
            table: table.to_string(),
            pivot: pivot.to_string(),
            local_field: local.to_string(),
            related_field: related.to_string(),
        }
    }

    #[test]
    fn test_one_to_many() {
        let schema = snapshot(vec![
            table("users", &["id"], &[]),
            table("posts", &["id"], &[("user_id", "users", "id")]),
        ]);
        let rules = infer(&schema, &["users", "posts"]);

        assert_eq!(rules["users"].has_many, vec![link("posts", "user_id", "id")]);
        assert!(rules["users"].has_one.is_empty());
        assert_eq!(rules["posts"].belongs_to, vec![link("users", "user_id", "id")]);
    }

    #[test]
    fn test_one_to_one_when_key_is_primary() {
        let schema = snapshot(vec![
            table("users", &["id"], &[]),
            table("profiles", &["user_id"], &[("user_id", "users", "id")]),
        ]);
        let rules = infer(&schema, &["users", "profiles"]);

        assert_eq!(rules["users"].has_one, vec![link("profiles", "user_id", "id")]);
        assert!(rules["users"].has_many.is_empty());
        assert_eq!(rules["profiles"].belongs_to, vec![link("users", "user_id", "id")]);
    }

    #[test]
    fn test_many_to_many_junction() {
        let schema = snapshot(vec![
            table("roles", &["id"], &[]),
            table("users", &["id"], &[]),
            table(
                "role_user",
                &[],
                &[("role_id", "roles", "id"), ("user_id", "users", "id")],
            ),
        ]);
        let rules = infer(&schema, &["roles", "users", "role_user"]);

        assert_eq!(
            rules["roles"].belongs_to_many,
            vec![pivot("users", "role_user", "role_id", "user_id")]
        );
        assert_eq!(
            rules["users"].belongs_to_many,
            vec![pivot("roles", "role_user", "user_id", "role_id")]
        );
        // Per-key classification still runs for the junction itself.
        assert_eq!(rules["role_user"].belongs_to.len(), 2);
        assert_eq!(rules["roles"].has_many, vec![link("role_user", "role_id", "id")]);
    }

    #[test]
    fn test_composite_primary_junction_is_many_to_many() {
        let schema = snapshot(vec![
            table("roles", &["id"], &[]),
            table("users", &["id"], &[]),
            table(
                "role_user",
                &["role_id", "user_id"],
                &[("role_id", "roles", "id"), ("user_id", "users", "id")],
            ),
        ]);
        let rules = infer(&schema, &["roles", "users"]);

        assert_eq!(rules["roles"].belongs_to_many.len(), 1);
        assert_eq!(rules["users"].belongs_to_many.len(), 1);
        // Composite key: neither side is one-to-one.
        assert_eq!(rules["roles"].has_many.len(), 1);
        assert!(rules["roles"].has_one.is_empty());
    }

    #[test]
    fn test_one_primary_foreign_key_is_not_junction() {
        let schema = snapshot(vec![
            table("users", &["id"], &[]),
            table("teams", &["id"], &[]),
            table(
                "captains",
                &["user_id"],
                &[("user_id", "users", "id"), ("team_id", "teams", "id")],
            ),
        ]);
        let rules = infer(&schema, &["users", "teams", "captains"]);

        assert!(rules["users"].belongs_to_many.is_empty());
        assert!(rules["teams"].belongs_to_many.is_empty());
        assert_eq!(rules["users"].has_one, vec![link("captains", "user_id", "id")]);
        assert_eq!(rules["teams"].has_many, vec![link("captains", "team_id", "id")]);
    }

    #[test]
    fn test_referenced_table_is_not_junction() {
        let schema = snapshot(vec![
            table("roles", &["id"], &[]),
            table("users", &["id"], &[]),
            table(
                "memberships",
                &["id"],
                &[("role_id", "roles", "id"), ("user_id", "users", "id")],
            ),
            table("audits", &["id"], &[("membership_id", "memberships", "id")]),
        ]);
        // The referencing table is excluded from the output but still counts.
        let rules = infer(&schema, &["roles", "users", "memberships"]);

        assert!(rules["roles"].belongs_to_many.is_empty());
        assert!(rules["users"].belongs_to_many.is_empty());
        assert!(!rules.contains_key("audits"));
        assert_eq!(
            rules["memberships"].has_many,
            vec![link("audits", "membership_id", "id")]
        );
    }

    #[test]
    fn test_three_foreign_keys_never_junction() {
        let schema = snapshot(vec![
            table("a", &["id"], &[]),
            table("b", &["id"], &[]),
            table("c", &["id"], &[]),
            table(
                "abc",
                &[],
                &[("a_id", "a", "id"), ("b_id", "b", "id"), ("c_id", "c", "id")],
            ),
        ]);
        let rules = infer(&schema, &["a", "b", "c"]);

        assert!(rules.values().all(|set| set.belongs_to_many.is_empty()));
        assert!(rules.values().all(|set| set.has_many.len() == 1));
    }

    #[test]
    fn test_self_reference() {
        let schema = snapshot(vec![table(
            "categories",
            &["id"],
            &[("parent_id", "categories", "id")],
        )]);
        let rules = infer(&schema, &["categories"]);

        assert_eq!(rules["categories"].has_many, vec![link("categories", "parent_id", "id")]);
        assert_eq!(rules["categories"].belongs_to, vec![link("categories", "parent_id", "id")]);
    }

    #[test]
    fn test_reference_outside_schema_only_adds_belongs_to() {
        let schema = snapshot(vec![table(
            "posts",
            &["id"],
            &[("tenant_id", "tenants", "id")],
        )]);
        let rules = infer(&schema, &["posts"]);

        assert_eq!(rules["posts"].belongs_to, vec![link("tenants", "tenant_id", "id")]);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_unknown_requested_table_is_ignored() {
        let schema = snapshot(vec![table("users", &["id"], &[])]);
        let rules = infer(&schema, &["users", "missing"]);

        assert_eq!(rules.len(), 1);
        assert_eq!(rules["users"].iter().count(), 0);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let schema = snapshot(vec![
            table("roles", &["id"], &[]),
            table("users", &["id"], &[]),
            table(
                "role_user",
                &[],
                &[("role_id", "roles", "id"), ("user_id", "users", "id")],
            ),
            table("posts", &["id"], &[("user_id", "users", "id")]),
        ]);
        let requested = ["roles", "users", "posts"];

        assert_eq!(infer(&schema, &requested), infer(&schema, &requested));
    }

    #[test]
    fn test_iter_groups_by_kind() {
        let schema = snapshot(vec![
            table("users", &["id"], &[("team_id", "teams", "id")]),
            table("teams", &["id"], &[]),
            table("posts", &["id"], &[("user_id", "users", "id")]),
            table("profiles", &["user_id"], &[("user_id", "users", "id")]),
        ]);
        let rules = infer(&schema, &["users"]);
        let kinds: Vec<RelationKind> = rules["users"].iter().map(|r| r.kind()).collect();

        assert_eq!(
            kinds,
            vec![RelationKind::BelongsTo, RelationKind::HasMany, RelationKind::HasOne]
        );
        assert_eq!(rules["users"].iter().count(), 3);
        let related: Vec<&str> = rules["users"].iter().map(|r| r.related_table()).collect();
        assert_eq!(related, vec!["teams", "posts", "profiles"]);
    }
}
