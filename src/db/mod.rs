mod models;
mod client;

pub use models::{ColumnInfo, ColumnKind, ForeignKeyRef, IndexInfo, SchemaSnapshot, TableSchema};
pub use client::Database;
