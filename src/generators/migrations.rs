use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use super::{GenerationContext, GenerationReport, Generator, BINDINGS_MARKER};
use crate::db::{ColumnInfo, ColumnKind, ForeignKeyRef, IndexInfo, TableSchema};
use crate::naming;
use crate::template::Tokens;

const INDENT: &str = "        ";

/// Create-table migrations for every requested table, followed by a second
/// batch adding the foreign keys once all tables exist.
pub struct MigrationsGenerator;

impl Generator for MigrationsGenerator {
    fn name(&self) -> &'static str {
        "migrations"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating Migrations");
        let mut report = GenerationReport::default();
        let create_prefix = date_prefix(ctx.options.started_at);
        let fk_prefix = date_prefix(ctx.options.started_at + Duration::seconds(1));

        for table in ctx.info.iter() {
            let name = format!("create_{}_table", table.name);
            let tokens = Tokens::new()
                .with("CLASS", naming::studly(&name))
                .with("UP", create_up(table, ctx.options.default_index_names))
                .with("DOWN", format!("Schema::drop('{}');", table.name));
            let target = migration_path(ctx, &create_prefix, &name);

            if let Err(e) = ctx.write(&mut report, "migration.txt", &tokens, &target, "migration") {
                report.fail(&format!("create migration for {}", table.name), e);
            }
        }

        for table in ctx.info.iter().filter(|t| !t.foreign_keys.is_empty()) {
            let name = format!("add_foreign_keys_to_{}_table", table.name);
            let default_names = ctx.options.default_fk_names;
            let tokens = Tokens::new()
                .with("CLASS", naming::studly(&name))
                .with("UP", foreign_keys_up(table, default_names))
                .with("DOWN", foreign_keys_down(table, default_names));
            let target = migration_path(ctx, &fk_prefix, &name);

            if let Err(e) = ctx.write(&mut report, "migration.txt", &tokens, &target, "migration") {
                report.fail(&format!("foreign key migration for {}", table.name), e);
            }
        }

        add_to_publish_list(ctx, &mut report)?;
        Ok(report)
    }
}

fn date_prefix(at: NaiveDateTime) -> String {
    at.format("%Y_%m_%d_%H%M%S").to_string()
}

fn migration_path(ctx: &GenerationContext, prefix: &str, name: &str) -> PathBuf {
    ctx.module
        .path()
        .join("Database")
        .join("Migrations")
        .join(format!("{}_{}.php", prefix, name))
}

fn add_to_publish_list(ctx: &GenerationContext, report: &mut GenerationReport) -> Result<()> {
    let provider = ctx.module.service_provider();
    let published = fs::read_to_string(&provider)
        .map(|content| content.contains("databasePath().'/migrations'"))
        .unwrap_or(false);
    if published {
        debug!("Migrations already published by {}", provider.display());
        return Ok(());
    }

    let block = ctx.templates.render("migrations-publish.txt", &Tokens::new())?;
    ctx.append(report, &provider, BINDINGS_MARKER, &block);
    Ok(())
}

fn block(lines: &[String]) -> String {
    lines.join(&format!("\n{}", INDENT))
}

fn create_up(table: &TableSchema, default_index_names: bool) -> String {
    let mut lines = vec![format!(
        "Schema::create('{}', function (Blueprint $table) {{",
        table.name
    )];

    for column in &table.columns {
        let auto_increment = column.is_auto_increment() && table.has_single_primary_key(&column.name);
        lines.push(format!("    {}", column_line(column, auto_increment)));
    }

    match table.primary_key.as_slice() {
        [] => {}
        [single] => {
            let serial = table.column(single).is_some_and(|c| c.is_auto_increment());
            if !serial {
                lines.push(format!("    $table->primary('{}');", single));
            }
        }
        many => lines.push(format!("    $table->primary({});", php_list(many))),
    }

    for index in &table.indexes {
        lines.push(format!("    {}", index_line(index, default_index_names)));
    }

    lines.push("});".to_string());
    block(&lines)
}

/// Schema builder call for one column.
pub(crate) fn column_line(column: &ColumnInfo, auto_increment: bool) -> String {
    let name = &column.name;
    let kind = column.kind();

    if auto_increment {
        let method = match kind {
            ColumnKind::BigInteger => "bigIncrements",
            ColumnKind::SmallInteger => "smallIncrements",
            _ => "increments",
        };
        return format!("$table->{}('{}');", method, name);
    }

    let mut call = match (kind, column.max_length, column.numeric_precision) {
        (ColumnKind::String, Some(len), _) => format!("$table->string('{}', {})", name, len),
        (ColumnKind::Char, Some(len), _) => format!("$table->char('{}', {})", name, len),
        (ColumnKind::Decimal, _, Some(precision)) => format!(
            "$table->decimal('{}', {}, {})",
            name,
            precision,
            column.numeric_scale.unwrap_or(0)
        ),
        _ => format!("$table->{}('{}')", builder_method(kind), name),
    };

    if column.is_nullable {
        call.push_str("->nullable()");
    }
    if let Some(default) = column.default.as_deref().and_then(default_literal) {
        call.push_str(&format!("->default({})", default));
    }

    call.push(';');
    call
}

fn builder_method(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::String | ColumnKind::Other => "string",
        ColumnKind::Char => "char",
        ColumnKind::Text => "text",
        ColumnKind::SmallInteger => "smallInteger",
        ColumnKind::Integer => "integer",
        ColumnKind::BigInteger => "bigInteger",
        ColumnKind::Boolean => "boolean",
        ColumnKind::Decimal => "decimal",
        ColumnKind::Float => "float",
        ColumnKind::Double => "double",
        ColumnKind::Date => "date",
        ColumnKind::DateTime => "timestamp",
        ColumnKind::DateTimeTz => "timestampTz",
        ColumnKind::Time => "time",
        ColumnKind::Json => "json",
        ColumnKind::Jsonb => "jsonb",
        ColumnKind::Uuid => "uuid",
        ColumnKind::Binary => "binary",
    }
}

/// PHP literal for a column default, or `None` for expressions such as
/// `now()` or sequence defaults that the schema builder cannot express.
fn default_literal(raw: &str) -> Option<String> {
    let value = strip_casts(raw);

    if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
        let text = value[1..value.len() - 1]
            .replace("''", "'")
            .replace('\\', "\\\\")
            .replace('\'', "\\'");
        return Some(format!("'{}'", text));
    }
    match value.to_lowercase().as_str() {
        "true" | "false" => return Some(value.to_lowercase()),
        "null" => return None,
        _ => {}
    }

    let numeric = value.trim_start_matches('(').trim_end_matches(')');
    if numeric.parse::<f64>().is_ok() {
        return Some(numeric.to_string());
    }

    debug!("Skipping column default {}", raw);
    None
}

/// Drops trailing casts such as `::character varying`, leaving any `::`
/// inside a quoted literal alone.
fn strip_casts(raw: &str) -> &str {
    let mut value = raw.trim();
    while let Some(at) = value.rfind("::") {
        if value[at..].contains('\'') {
            break;
        }
        value = value[..at].trim_end();
    }
    value
}

pub(crate) fn index_line(index: &IndexInfo, default_names: bool) -> String {
    let method = if index.is_unique { "unique" } else { "index" };
    let columns = php_list(&index.columns);

    if default_names {
        format!("$table->{}({});", method, columns)
    } else {
        format!("$table->{}({}, '{}');", method, columns, index.name)
    }
}

fn foreign_keys_up(table: &TableSchema, default_names: bool) -> String {
    let mut lines = vec![format!(
        "Schema::table('{}', function (Blueprint $table) {{",
        table.name
    )];
    lines.extend(
        table
            .foreign_keys
            .iter()
            .map(|fk| format!("    {}", foreign_line(fk, default_names))),
    );
    lines.push("});".to_string());
    block(&lines)
}

fn foreign_line(fk: &ForeignKeyRef, default_names: bool) -> String {
    let mut call = match fk.name.as_deref() {
        Some(name) if !default_names => format!("$table->foreign('{}', '{}')", fk.field, name),
        _ => format!("$table->foreign('{}')", fk.field),
    };
    call.push_str(&format!("->references('{}')->on('{}')", fk.references, fk.on));

    if let Some(rule) = &fk.on_update {
        call.push_str(&format!("->onUpdate('{}')", rule));
    }
    if let Some(rule) = &fk.on_delete {
        call.push_str(&format!("->onDelete('{}')", rule));
    }

    call.push(';');
    call
}

fn foreign_keys_down(table: &TableSchema, default_names: bool) -> String {
    let mut lines = vec![format!(
        "Schema::table('{}', function (Blueprint $table) {{",
        table.name
    )];
    for fk in &table.foreign_keys {
        let line = match fk.name.as_deref() {
            Some(name) if !default_names => format!("    $table->dropForeign('{}');", name),
            _ => format!("    $table->dropForeign(['{}']);", fk.field),
        };
        lines.push(line);
    }
    lines.push("});".to_string());
    block(&lines)
}

/// `'a'` for one column, `['a', 'b']` for several.
fn php_list<S: AsRef<str>>(columns: &[S]) -> String {
    match columns {
        [single] => format!("'{}'", single.as_ref()),
        many => {
            let quoted: Vec<String> = many.iter().map(|c| format!("'{}'", c.as_ref())).collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}
