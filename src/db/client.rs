use anyhow::{Context, Result};
use log::{debug, error};
use tokio_postgres::{Client, NoTls};
use crate::db::{ColumnInfo, ForeignKeyRef, IndexInfo, SchemaSnapshot, TableSchema};

pub struct Database {
    client: Client,
}

impl Database {
    pub async fn connect(connection_string: &str, tls: bool) -> Result<Self> {
        let client = if tls {
            let connector = native_tls::TlsConnector::new()?;
            let connector = postgres_native_tls::MakeTlsConnector::new(connector);
            let (client, connection) = tokio_postgres::connect(connection_string, connector).await?;

            // Keep connection alive in background task
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Database connection error: {}", e);
                }
            });
            client
        } else {
            let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Database connection error: {}", e);
                }
            });
            client
        };

        Ok(Database { client })
    }

    pub async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name::text FROM information_schema.tables
                 WHERE table_schema = $1
                 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[&schema],
            )
            .await?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Reads columns, keys and indexes of every table in `schema`.
    ///
    /// The whole schema is loaded even when only a few tables are requested:
    /// relationship inference needs to see every foreign key that points at a
    /// candidate junction table.
    pub async fn snapshot(&self, schema: &str) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        for table in self.list_tables(schema).await? {
            snapshot.insert(table.clone(), TableSchema::new(table));
        }

        self.load_columns(schema, &mut snapshot)
            .await
            .context("Failed to read column metadata")?;
        self.load_primary_keys(schema, &mut snapshot)
            .await
            .context("Failed to read primary keys")?;
        self.load_foreign_keys(schema, &mut snapshot)
            .await
            .context("Failed to read foreign keys")?;
        self.load_indexes(schema, &mut snapshot)
            .await
            .context("Failed to read indexes")?;

        debug!("Loaded {} tables from schema {}", snapshot.len(), schema);
        Ok(snapshot)
    }

    async fn load_columns(&self, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
        let rows = self
            .client
            .query(
                "SELECT
                    c.table_name::text,
                    c.column_name::text,
                    CASE
                        WHEN c.character_maximum_length IS NOT NULL THEN c.data_type || '(' || c.character_maximum_length || ')'
                        WHEN c.numeric_precision IS NOT NULL AND c.numeric_scale IS NOT NULL AND c.data_type = 'numeric' THEN c.data_type || '(' || c.numeric_precision || ',' || c.numeric_scale || ')'
                        ELSE c.data_type
                    END::text AS full_data_type,
                    c.udt_name::text,
                    c.is_nullable = 'YES' AS nullable,
                    c.column_default::text,
                    c.character_maximum_length::int4,
                    c.numeric_precision::int4,
                    c.numeric_scale::int4
                 FROM information_schema.columns c
                 WHERE c.table_schema = $1
                 ORDER BY c.table_name, c.ordinal_position",
                &[&schema],
            )
            .await?;

        for row in rows {
            let table: String = row.get(0);
            if let Some(info) = snapshot.get_mut(&table) {
                info.columns.push(ColumnInfo {
                    name: row.get(1),
                    data_type: row.get(2),
                    udt_name: row.get(3),
                    is_nullable: row.get(4),
                    default: row.get(5),
                    max_length: row.get(6),
                    numeric_precision: row.get(7),
                    numeric_scale: row.get(8),
                });
            }
        }

        Ok(())
    }

    async fn load_primary_keys(&self, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
        let rows = self
            .client
            .query(
                "SELECT tc.table_name::text, kcu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                     ON tc.constraint_name = kcu.constraint_name
                     AND tc.table_schema = kcu.table_schema
                     AND tc.table_name = kcu.table_name
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                     AND tc.table_schema = $1
                 ORDER BY tc.table_name, kcu.ordinal_position",
                &[&schema],
            )
            .await?;

        for row in rows {
            let table: String = row.get(0);
            if let Some(info) = snapshot.get_mut(&table) {
                info.primary_key.push(row.get(1));
            }
        }

        Ok(())
    }

    /// One row per column pair of every foreign key, paired by position
    /// within the constraint.
    async fn load_foreign_keys(&self, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
        let rows = self
            .client
            .query(
                "SELECT
                    t.relname::text,
                    con.conname::text,
                    a.attname::text,
                    ft.relname::text AS foreign_table,
                    fa.attname::text AS foreign_column,
                    con.confupdtype::text,
                    con.confdeltype::text
                 FROM pg_constraint con
                 JOIN pg_class t ON t.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 JOIN pg_class ft ON ft.oid = con.confrelid
                 JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, foreign_attnum, ord) ON true
                 JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
                 JOIN pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = k.foreign_attnum
                 WHERE con.contype = 'f'
                     AND n.nspname = $1
                 ORDER BY t.relname, con.conname, k.ord",
                &[&schema],
            )
            .await?;

        for row in rows {
            let table: String = row.get(0);
            let on_update: String = row.get(5);
            let on_delete: String = row.get(6);
            if let Some(info) = snapshot.get_mut(&table) {
                info.foreign_keys.push(ForeignKeyRef {
                    name: Some(row.get(1)),
                    field: row.get(2),
                    on: row.get(3),
                    references: row.get(4),
                    on_update: referential_action(&on_update),
                    on_delete: referential_action(&on_delete),
                });
            }
        }

        Ok(())
    }

    async fn load_indexes(&self, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
        let rows = self
            .client
            .query(
                "SELECT t.relname::text, i.relname::text, ix.indisunique, a.attname::text
                 FROM pg_class t
                 JOIN pg_index ix ON t.oid = ix.indrelid
                 JOIN pg_class i ON i.oid = ix.indexrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                 WHERE n.nspname = $1
                     AND NOT ix.indisprimary
                 ORDER BY t.relname, i.relname, k.ord",
                &[&schema],
            )
            .await?;

        for row in rows {
            let table: String = row.get(0);
            let index_name: String = row.get(1);
            let is_unique: bool = row.get(2);
            let column: String = row.get(3);

            let Some(info) = snapshot.get_mut(&table) else {
                continue;
            };

            match info.indexes.iter_mut().find(|idx| idx.name == index_name) {
                Some(index) => index.columns.push(column),
                None => info.indexes.push(IndexInfo {
                    name: index_name,
                    columns: vec![column],
                    is_unique,
                }),
            }
        }

        Ok(())
    }
}

/// Action name for a `pg_constraint` update or delete code.
fn referential_action(code: &str) -> Option<String> {
    let action = match code {
        "a" => "NO ACTION",
        "r" => "RESTRICT",
        "c" => "CASCADE",
        "n" => "SET NULL",
        "d" => "SET DEFAULT",
        _ => return None,
    };
    Some(action.to_string())
}
