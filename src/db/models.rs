use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every base table of the inspected schema, keyed by table name.
pub type SchemaSnapshot = BTreeMap<String, TableSchema>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    pub indexes: Vec<IndexInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// True when the primary key is exactly the one given column.
    pub fn has_single_primary_key(&self, column: &str) -> bool {
        self.primary_key.len() == 1 && self.primary_key[0] == column
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as reported by the database, e.g. `character varying(255)`.
    pub data_type: String,
    /// Underlying type name, e.g. `varchar` or `int4`.
    pub udt_name: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, udt_name: impl Into<String>) -> Self {
        let udt_name = udt_name.into();
        Self {
            name: name.into(),
            data_type: udt_name.clone(),
            udt_name,
            is_nullable: false,
            default: None,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_udt(&self.udt_name)
    }

    /// Serial columns are backed by a sequence default.
    pub fn is_auto_increment(&self) -> bool {
        self.default
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("))
    }
}

/// Logical column type used when choosing form widgets and schema builder calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    String,
    Char,
    Text,
    SmallInteger,
    Integer,
    BigInteger,
    Boolean,
    Decimal,
    Float,
    Double,
    Date,
    DateTime,
    DateTimeTz,
    Time,
    Json,
    Jsonb,
    Uuid,
    Binary,
    Other,
}

impl ColumnKind {
    pub fn from_udt(udt_name: &str) -> Self {
        match udt_name.to_lowercase().as_str() {
            "varchar" | "character varying" | "citext" => ColumnKind::String,
            "bpchar" | "char" | "character" => ColumnKind::Char,
            "text" => ColumnKind::Text,
            "int2" | "smallint" => ColumnKind::SmallInteger,
            "int4" | "integer" | "int" => ColumnKind::Integer,
            "int8" | "bigint" => ColumnKind::BigInteger,
            "bool" | "boolean" => ColumnKind::Boolean,
            "numeric" | "decimal" | "money" => ColumnKind::Decimal,
            "float4" | "real" => ColumnKind::Float,
            "float8" | "double precision" => ColumnKind::Double,
            "date" => ColumnKind::Date,
            "timestamp" | "timestamp without time zone" => ColumnKind::DateTime,
            "timestamptz" | "timestamp with time zone" => ColumnKind::DateTimeTz,
            "time" | "timetz" => ColumnKind::Time,
            "json" => ColumnKind::Json,
            "jsonb" => ColumnKind::Jsonb,
            "uuid" => ColumnKind::Uuid,
            "bytea" => ColumnKind::Binary,
            _ => ColumnKind::Other,
        }
    }

    /// Name of the type in the framework's schema vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::String | ColumnKind::Char | ColumnKind::Other => "string",
            ColumnKind::Text => "text",
            ColumnKind::SmallInteger => "smallint",
            ColumnKind::Integer => "integer",
            ColumnKind::BigInteger => "bigint",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Float => "float",
            ColumnKind::Double => "float",
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
            ColumnKind::DateTimeTz => "datetimetz",
            ColumnKind::Time => "time",
            ColumnKind::Json | ColumnKind::Jsonb => "json",
            ColumnKind::Uuid => "guid",
            ColumnKind::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Column on the owning table.
    pub field: String,
    /// Referenced table.
    pub on: String,
    /// Referenced column.
    pub references: String,
    pub name: Option<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

impl ForeignKeyRef {
    pub fn new(
        field: impl Into<String>,
        on: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            on: on.into(),
            references: references.into(),
            name: None,
            on_update: None,
            on_delete: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
}
