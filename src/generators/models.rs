use anyhow::Result;
use log::info;
use std::collections::HashSet;
use super::{GenerationContext, GenerationReport, Generator};
use crate::db::TableSchema;
use crate::naming;
use crate::relationships::{Relationship, RelationshipSet};
use crate::template::Tokens;

/// Columns never mass assignable.
pub const NON_FILLABLE: &[&str] = &["created_at", "updated_at", "deleted_at", "password", "locale"];

/// Eloquent models with relationship accessors and pivot syncing.
pub struct ModelsGenerator;

impl Generator for ModelsGenerator {
    fn name(&self) -> &'static str {
        "models"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating Eloquent models");
        let mut report = GenerationReport::default();

        for table in ctx.info.iter() {
            if let Err(e) = generate_model(ctx, table, &mut report) {
                report.fail(&format!("model for table {}", table.name), e);
            }
        }

        Ok(report)
    }
}

fn generate_model(ctx: &GenerationContext, table: &TableSchema, report: &mut GenerationReport) -> Result<()> {
    let entity = naming::entity_name(&table.name);
    let target = ctx
        .module
        .path()
        .join("Entities")
        .join(format!("{}.php", entity));

    let translated = translated_attributes(ctx, &table.name);
    let mut fillable: Vec<&str> = table.column_names().collect();
    fillable.extend(translated.iter().map(String::as_str));
    let mut seen = HashSet::new();
    let fillable: Vec<String> = fillable
        .into_iter()
        .filter(|column| !NON_FILLABLE.contains(column) && seen.insert(*column))
        .map(|column| format!("'{}'", column))
        .collect();

    let relations = ctx.info.relationships(&table.name);
    let named = accessor_names(relations);
    let functions: String = named
        .iter()
        .map(|(relation, name)| accessor(ctx, relation, name))
        .collect();
    let sync: String = named
        .iter()
        .filter(|(relation, _)| matches!(relation, Relationship::BelongsToMany(_)))
        .map(|(_, name)| sync_statement(name))
        .collect();

    let traits = match ctx.info.translation_table(&table.name) {
        Some(translation) if !translated.is_empty() => translation_trait(ctx, translation, &translated),
        _ => String::new(),
    };

    let tokens = Tokens::new()
        .with("NAMESPACE", format!("{}\\Entities", ctx.namespace()))
        .with("NAME", entity.as_str())
        .with("TABLENAME", table.name.as_str())
        .with("TRAITS", traits)
        .with("FILLABLE", fillable.join(", "))
        .with("FUNCTIONS", functions)
        .with("SYNC", sync);

    ctx.write(report, "model.txt", &tokens, &target, "model")
}

/// Columns of the table's translation table that hold per-locale values.
pub(crate) fn translated_attributes(ctx: &GenerationContext, table: &str) -> Vec<String> {
    let Some(translation) = ctx
        .info
        .translation_table(table)
        .and_then(|name| ctx.info.schema_of(name))
    else {
        return Vec::new();
    };

    translation
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|column| {
            *column != "id"
                && !NON_FILLABLE.contains(column)
                && !translation.primary_key.iter().any(|pk| pk == column)
                && !translation.foreign_keys.iter().any(|fk| fk.field == *column)
        })
        .map(str::to_string)
        .collect()
}

/// Accessor method name for every relationship, unique within the model.
///
/// Single-row relations use the singular related model name, collections the
/// plural one; clashes get a numeric suffix starting at 2.
pub(crate) fn accessor_names(relations: &RelationshipSet) -> Vec<(Relationship<'_>, String)> {
    let mut taken = HashSet::new();

    relations
        .iter()
        .map(|relation| {
            let model = naming::camel(&naming::entity_name(relation.related_table()));
            let base = if relation.kind().is_many() {
                naming::plural(&model)
            } else {
                naming::singular(&model)
            };
            (relation, unique_name(base, &mut taken))
        })
        .collect()
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut suffix = 2;
    while !taken.insert(name.clone()) {
        name = format!("{}{}", base, suffix);
        suffix += 1;
    }
    name
}

fn accessor(ctx: &GenerationContext, relation: &Relationship<'_>, name: &str) -> String {
    let related = relation.related_table();
    let class = format!(
        "\\{}\\{}::class",
        ctx.class_namespace(related, "Entities"),
        naming::entity_name(related)
    );

    let arguments = match relation {
        Relationship::HasOne(link) | Relationship::HasMany(link) | Relationship::BelongsTo(link) => {
            format!("{}, '{}', '{}'", class, link.field, link.references)
        }
        Relationship::BelongsToMany(link) => format!(
            "{}, '{}', '{}', '{}'",
            class, link.pivot, link.local_field, link.related_field
        ),
    };

    format!(
        "\n    public function {}()\n    {{\n        return $this->{}({});\n    }}\n",
        name,
        relation.kind().method(),
        arguments
    )
}

fn sync_statement(name: &str) -> String {
    format!(
        "\n        if (isset($attributes['{name}'])) {{\n            $model->{name}()->sync($attributes['{name}']);\n        }}",
        name = name
    )
}

fn translation_trait(ctx: &GenerationContext, translation_table: &str, translated: &[String]) -> String {
    format!(
        "use \\Dimsav\\Translatable\\Translatable;\n\n    public $translatedAttributes = {};\n    public $translationModel = \\Modules\\{}\\Entities\\{}::class;\n",
        naming::php_array(translated),
        ctx.module.studly_name(),
        naming::entity_name(translation_table)
    )
}
