use anyhow::Result;
use log::{debug, info};
use super::models::{accessor_names, translated_attributes};
use super::{GenerationContext, GenerationReport, Generator};
use crate::db::{ColumnKind, TableSchema};
use crate::information::PrimaryKey;
use crate::naming;
use crate::relationships::Relationship;
use crate::template::Tokens;

/// Columns left out of listings and forms.
const HIDDEN: &[&str] = &["created_at", "updated_at", "password"];

const PARTIALS: &[&str] = &["text", "textarea", "date", "select", "select-multiple"];

const VIEWS: &[&str] = &["index", "show", "create", "edit", "fields", "fields-translatable"];

/// Blade admin views for every entity plus the field partials they include.
pub struct ViewsGenerator;

impl Generator for ViewsGenerator {
    fn name(&self) -> &'static str {
        "views"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating Views");
        let mut report = GenerationReport::default();

        install_partials(ctx, &mut report);

        for table in ctx.info.iter().filter(|t| !naming::is_translation_table(&t.name)) {
            for view in VIEWS {
                if let Err(e) = generate_view(ctx, table, view, &mut report) {
                    report.fail(&format!("{} view for {}", view, table.name), e);
                }
            }
        }

        Ok(report)
    }
}

fn install_partials(ctx: &GenerationContext, report: &mut GenerationReport) {
    let dir = ctx.module.path().join("Resources/views/partials/fields");

    for partial in PARTIALS {
        let name = format!("{}.blade.php", partial);
        let target = dir.join(&name);
        if target.exists() && !ctx.options.overwrite {
            debug!("Partial {} already installed", target.display());
            continue;
        }
        if let Err(e) = ctx.write(report, &format!("partials/fields/{}", name), &Tokens::new(), &target, "partial") {
            report.fail(&format!("partial {}", partial), e);
        }
    }
}

fn generate_view(
    ctx: &GenerationContext,
    table: &TableSchema,
    view: &str,
    report: &mut GenerationReport,
) -> Result<()> {
    let entity = naming::entity_name(&table.name);
    let model = naming::camel(&entity);
    let directory = naming::snake(&naming::plural(&entity));

    let mut tokens = Tokens::new()
        .with("LOWERCASE_MODULE_NAME", ctx.module.lower_name())
        .with("LOWERCASE_CLASS_NAME", entity.to_lowercase())
        .with("PLURAL_LOWERCASE_CLASS_NAME", naming::plural(&entity.to_lowercase()))
        .with("SNAKE_CASE_ENTITY", directory.as_str())
        .with("MODEL", model.as_str())
        .with("MODELS", naming::camel(&naming::plural(&entity)));

    let visible: Vec<&str> = table
        .column_names()
        .filter(|column| !HIDDEN.contains(column))
        .collect();

    match view {
        "index" => {
            let headers: Vec<String> = visible
                .iter()
                .map(|column| format!("                            <th>{}</th>", column))
                .collect();
            let cells: Vec<String> = visible
                .iter()
                .map(|column| format!("                            <td>{{{{ ${}->{} }}}}</td>", model, column))
                .collect();
            tokens.set("TABLE_HEADERS", headers.join("\n"));
            tokens.set("TABLE_CONTENT", cells.join("\n"));
        }
        "show" => {
            let rows: Vec<String> = visible
                .iter()
                .map(|column| {
                    format!(
                        "                <dt>{}</dt>\n                <dd>{{{{ ${}->{} }}}}</dd>",
                        naming::title_from_column(column),
                        model,
                        column
                    )
                })
                .collect();
            tokens.set("TITLE", title_column(ctx, table));
            tokens.set("TABLE_CONTENT", rows.join("\n"));
        }
        "fields" => tokens.set("FIELDS", form_fields(ctx, table, &visible)),
        "fields-translatable" => {
            let translated = translated_attributes(ctx, &table.name);
            let fields: Vec<String> = translated
                .iter()
                .map(|column| {
                    let kind = ctx
                        .info
                        .translation_table(&table.name)
                        .and_then(|t| ctx.info.schema_of(t))
                        .and_then(|t| t.column(column))
                        .map(|c| c.kind())
                        .unwrap_or(ColumnKind::String);
                    input(ctx, partial_for(kind), column, true)
                })
                .collect();
            tokens.set("HAS_TRANSLATION_FIELDS", if fields.is_empty() { "false" } else { "true" });
            tokens.set("FIELDS", fields.join("\n"));
        }
        _ => {}
    }

    let target = ctx
        .module
        .path()
        .join("Resources/views/admin")
        .join(&directory)
        .join(format!("{}.blade.php", view));

    ctx.write(report, &format!("views/{}.txt", view), &tokens, &target, "view")
}

/// Column shown as the page title of the show view: the first string column,
/// falling back to the primary key.
fn title_column(ctx: &GenerationContext, table: &TableSchema) -> String {
    let string_column = table
        .columns
        .iter()
        .filter(|c| !HIDDEN.contains(&c.name.as_str()))
        .find(|c| c.kind() == ColumnKind::String);

    match string_column {
        Some(column) => column.name.clone(),
        None => primary_key_or_id(ctx, &table.name),
    }
}

fn primary_key_or_id(ctx: &GenerationContext, table: &str) -> String {
    match ctx.info.primary_key(table) {
        Ok(PrimaryKey::Single(column)) => column,
        Ok(PrimaryKey::Composite(columns)) => columns.join(", "),
        Err(e) => {
            debug!("{}, falling back to id", e);
            "id".to_string()
        }
    }
}

fn partial_for(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "textarea",
        ColumnKind::Date | ColumnKind::DateTime | ColumnKind::DateTimeTz => "date",
        _ => "text",
    }
}

fn form_fields(ctx: &GenerationContext, table: &TableSchema, visible: &[&str]) -> String {
    let single_key = match table.primary_key.as_slice() {
        [single] => Some(single.as_str()),
        _ => None,
    };

    let relations = ctx.info.relationships(&table.name);
    // Foreign keys get a select below instead of a text input.
    let selected_keys: Vec<&str> = relations
        .belongs_to
        .iter()
        .filter(|link| !naming::is_translation_table(&link.table))
        .map(|link| link.field.as_str())
        .collect();

    let mut fields: Vec<String> = visible
        .iter()
        .filter(|column| Some(**column) != single_key && !selected_keys.contains(*column))
        .filter_map(|column| table.column(column))
        .map(|column| input(ctx, partial_for(column.kind()), &column.name, false))
        .collect();

    for (relation, accessor) in accessor_names(relations) {
        let related = relation.related_table();
        if naming::is_translation_table(related) {
            continue;
        }

        let (partial, name, selected) = match relation {
            Relationship::BelongsTo(link) => ("select", link.field.clone(), "null"),
            Relationship::HasOne(_) => ("select", accessor, "null"),
            Relationship::HasMany(_) | Relationship::BelongsToMany(_) => ("select-multiple", accessor, "[]"),
        };

        fields.push(format!(
            "        @include('{module}::partials.fields.{partial}', [\n            'title' => '{title}',\n            'name' => '{name}',\n            'options' => ${options},\n            'primary_key' => '{key}',\n            'selected' => {selected},\n        ])\n",
            module = ctx.module.lower_name(),
            partial = partial,
            title = naming::entity_name(related),
            name = name,
            options = options_variable(related),
            key = primary_key_or_id(ctx, related),
            selected = selected,
        ));
    }

    fields.join("\n")
}

/// View variable holding the select options for a related table.
pub(crate) fn options_variable(related_table: &str) -> String {
    naming::camel(&naming::plural(&naming::entity_name(related_table)))
}

fn input(ctx: &GenerationContext, partial: &str, column: &str, translation: bool) -> String {
    let translation = if translation { "\n            'is_translation' => 1," } else { "" };

    format!(
        "        @include('{}::partials.fields.{}', [\n            'title' => '{}',\n            'name' => '{}',\n            'value' => null,\n            'placeholder' => '',{}\n        ])\n",
        ctx.module.lower_name(),
        partial,
        naming::title_from_column(column),
        column,
        translation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::testing::blog_context;
    use std::fs;
    use std::path::PathBuf;

    fn views_dir(ctx: &GenerationContext, directory: &str) -> PathBuf {
        ctx.module.path().join("Resources/views/admin").join(directory)
    }

    #[test]
    fn test_views_for_every_entity() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        let report = ViewsGenerator.execute(&ctx).unwrap();
        assert!(report.failed.is_empty());

        for view in VIEWS {
            assert!(views_dir(&ctx, "posts").join(format!("{}.blade.php", view)).is_file());
            assert!(views_dir(&ctx, "role_users").join(format!("{}.blade.php", view)).is_file());
        }
        assert!(!views_dir(&ctx, "post_translations").exists());

        let partials = ctx.module.path().join("Resources/views/partials/fields");
        assert!(partials.join("select-multiple.blade.php").is_file());
    }

    #[test]
    fn test_index_hides_columns() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        ViewsGenerator.execute(&ctx).unwrap();

        let index = fs::read_to_string(views_dir(&ctx, "users").join("index.blade.php")).unwrap();
        assert!(index.contains("<th>email</th>"));
        assert!(index.contains("<td>{{ $user->email }}</td>"));
        assert!(!index.contains("password"));
        assert!(!index.contains("created_at"));
        assert!(index.contains("@foreach ($users as $user)"));
        assert!(index.contains("trans('blog::users.title.users')"));

        let show = fs::read_to_string(views_dir(&ctx, "users").join("show.blade.php")).unwrap();
        assert!(show.contains("{{ $user->email }}"));
        assert!(show.contains("<dt>Email</dt>"));
    }

    #[test]
    fn test_form_fields() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        ViewsGenerator.execute(&ctx).unwrap();

        let fields = fs::read_to_string(views_dir(&ctx, "posts").join("fields.blade.php")).unwrap();
        assert!(!fields.contains("'name' => 'id'"));
        assert_eq!(fields.matches("'name' => 'user_id'").count(), 1);
        assert!(fields.contains("@include('blog::partials.fields.date', [\n            'title' => 'Published at',"));
        assert!(fields.contains("@include('blog::partials.fields.select', [\n            'title' => 'User',\n            'name' => 'user_id',\n            'options' => $users,"));
        // Translation rows are edited through the translatable form.
        assert!(!fields.contains("PostTranslation"));

        let users = fs::read_to_string(views_dir(&ctx, "users").join("fields.blade.php")).unwrap();
        assert!(users.contains("partials.fields.select-multiple', [\n            'title' => 'Role',\n            'name' => 'roles',"));
        assert!(users.contains("'options' => $profiles,"));

        let create = fs::read_to_string(views_dir(&ctx, "posts").join("create.blade.php")).unwrap();
        assert!(create.contains("@include('blog::admin.posts.fields')"));
        assert!(create.contains("route' => ['admin.blog.post.store']"));
    }

    #[test]
    fn test_translatable_fields() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        ViewsGenerator.execute(&ctx).unwrap();

        let posts = fs::read_to_string(views_dir(&ctx, "posts").join("fields-translatable.blade.php")).unwrap();
        assert!(posts.starts_with("@if(true)"));
        assert!(posts.contains("partials.fields.textarea', [\n            'title' => 'Body',"));
        assert!(posts.contains("'is_translation' => 1,"));

        let users = fs::read_to_string(views_dir(&ctx, "users").join("fields-translatable.blade.php")).unwrap();
        assert!(users.starts_with("@if(false)"));
    }

    #[test]
    fn test_partials_are_not_reinstalled() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        let partials = ctx.module.path().join("Resources/views/partials/fields");
        fs::create_dir_all(&partials).unwrap();
        fs::write(partials.join("text.blade.php"), "custom").unwrap();

        let report = ViewsGenerator.execute(&ctx).unwrap();
        assert_eq!(fs::read_to_string(partials.join("text.blade.php")).unwrap(), "custom");
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_partial_failures_do_not_stop_views() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = blog_context(dir.path());
        let views = ctx.module.path().join("Resources/views");
        fs::create_dir_all(&views).unwrap();
        fs::write(views.join("partials"), "").unwrap();

        let report = ViewsGenerator.execute(&ctx).unwrap();
        assert_eq!(report.failed.len(), PARTIALS.len());
        assert!(report.failed.iter().all(|f| f.starts_with("partial ")));
        assert!(views_dir(&ctx, "posts").join("index.blade.php").is_file());
    }

    #[test]
    fn test_options_variable() {
        assert_eq!(options_variable("role_user"), "roleUsers");
        assert_eq!(options_variable("people"), "people");
    }
}
