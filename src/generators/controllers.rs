use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use super::views::options_variable;
use super::{GenerationContext, GenerationReport, Generator, APPEND_MARKER, SIDEBAR_MARKER};
use crate::information::PrimaryKey;
use crate::naming;
use crate::template::Tokens;

/// Entities with a longer lowercase name get a note instead of generated routes.
const MAX_ROUTE_ENTITY_LENGTH: usize = 32;

/// Admin controllers plus the routes, permissions and sidebar entries that
/// expose them.
pub struct ControllersGenerator;

impl Generator for ControllersGenerator {
    fn name(&self) -> &'static str {
        "controllers"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating Admin Controllers");
        let mut report = GenerationReport::default();
        let mut generated = Vec::new();

        for table in ctx.info.tables() {
            let entity = naming::entity_name(table);
            if naming::is_translation_entity(&entity) {
                continue;
            }

            let written = report.generated.len();
            match generate_controller(ctx, table, &entity, &mut report) {
                Ok(()) if report.generated.len() > written => generated.push(entity),
                Ok(()) => {}
                Err(e) => report.fail(&format!("controller for {}", entity), e),
            }
        }

        if generated.is_empty() {
            debug!("No new controllers, leaving routes, permissions and sidebar alone");
            return Ok(report);
        }

        if let Err(e) = create_routes(ctx, &generated, &mut report) {
            report.fail("routes", e);
        }
        if let Err(e) = create_permissions(ctx, &generated, &mut report) {
            report.fail("permissions", e);
        }
        if let Err(e) = create_sidebar(ctx, &generated, &mut report) {
            report.fail("sidebar", e);
        }
        Ok(report)
    }
}

fn generate_controller(
    ctx: &GenerationContext,
    table: &str,
    entity: &str,
    report: &mut GenerationReport,
) -> Result<()> {
    let (relationships, variables) = relationship_data(ctx, table);
    let lower = entity.to_lowercase();

    let tokens = Tokens::new()
        .with("NAMESPACE", format!("{}\\Http\\Controllers\\Admin", ctx.namespace()))
        .with("CLASS_NAME", entity)
        .with("LOWERCASE_CLASS_NAME", naming::camel(entity))
        .with("PLURAL_LOWERCASE_CLASS_NAME", naming::camel(&naming::plural(entity)))
        .with("MODULE_NAME", ctx.module.studly_name())
        .with("LOWERCASE_MODULE_NAME", ctx.module.lower_name())
        .with("RELATIONSHIPS", relationships)
        .with("VARIABLES", variables)
        .with("SNAKE_CASE_ENTITY", naming::snake(&naming::plural(entity)))
        .with("LOWERCASE_SINGLE_ENTITY", lower.as_str())
        .with("LOWERCASE_PLURAL_ENTITY", naming::plural(&lower));

    let target = ctx
        .module
        .path()
        .join("Http/Controllers/Admin")
        .join(format!("{}Controller.php", entity));

    ctx.write(report, "admin-controller.txt", &tokens, &target, "controller")
}

/// Repository wiring for the constructor and the select options handed to
/// the create and edit views, one entry per related entity.
fn relationship_data(ctx: &GenerationContext, table: &str) -> (String, String) {
    let mut related: BTreeMap<String, &str> = BTreeMap::new();
    for relation in ctx.info.relationships(table).iter() {
        let other = relation.related_table();
        if !naming::is_translation_table(other) {
            related.entry(options_variable(other)).or_insert(other);
        }
    }

    let mut repositories = Vec::new();
    let mut variables = Vec::new();
    for (variable, other) in &related {
        repositories.push(format!(
            "$this->{} = app(\\{}\\{}Repository::class);",
            variable,
            ctx.class_namespace(other, "Repositories"),
            naming::entity_name(other)
        ));

        let key = match ctx.info.primary_key(other) {
            Ok(PrimaryKey::Single(column)) => column,
            Ok(PrimaryKey::Composite(_)) | Err(_) => "id".to_string(),
        };
        variables.push(format!(
            "'{}' => $this->{}->all()->pluck('{}', '{}')->all(),",
            variable, variable, key, key
        ));
    }

    (repositories.join("\n        "), variables.join("\n            "))
}

fn route_block(ctx: &GenerationContext, entity: &str) -> Result<String> {
    let lower = entity.to_lowercase();
    if lower.len() > MAX_ROUTE_ENTITY_LENGTH {
        return Ok(format!("// @todo: create routes for {} manually\n", entity));
    }

    let tokens = Tokens::new()
        .with("CLASS_NAME", entity)
        .with("PLURAL_LOWERCASE_CLASS_NAME", naming::plural(&lower))
        .with("MODULE_NAME", ctx.module.studly_name())
        .with("LOWERCASE_MODULE_NAME", ctx.module.lower_name())
        .with("LOWERCASE_CLASS_NAME", lower.as_str());
    ctx.templates.render("route-resource.txt", &tokens)
}

/// Current content of a shared file, empty when it cannot be read.
fn existing_content(file: &Path) -> String {
    fs::read_to_string(file).unwrap_or_default()
}

fn create_routes(ctx: &GenerationContext, entities: &[String], report: &mut GenerationReport) -> Result<()> {
    let file = ctx.module.routes_file();
    let existing = existing_content(&file);
    let mut routes = String::new();

    for entity in entities {
        if existing.contains(&format!("'{}Controller'", entity))
            || existing.contains(&format!("create routes for {} manually", entity))
        {
            debug!("Routes for {} already registered", entity);
            continue;
        }
        routes.push_str(&route_block(ctx, entity)?);
        routes.push('\n');
    }

    if !routes.is_empty() {
        ctx.append(report, &file, APPEND_MARKER, &routes);
    }
    Ok(())
}

fn create_permissions(ctx: &GenerationContext, entities: &[String], report: &mut GenerationReport) -> Result<()> {
    let module = ctx.module.lower_name();
    let file = ctx.module.permissions_file();
    let existing = existing_content(&file);
    let mut permissions = String::new();

    for entity in entities {
        let plural = naming::plural(&entity.to_lowercase());
        if existing.contains(&format!("'{}.{}' => [", module, plural)) {
            debug!("Permissions for {} already listed", entity);
            continue;
        }
        let tokens = Tokens::new()
            .with("LOWERCASE_MODULE_NAME", module.as_str())
            .with("PLURAL_LOWERCASE_CLASS_NAME", plural);
        permissions.push_str(&ctx.templates.render("permissions-append.txt", &tokens)?);
    }

    if !permissions.is_empty() {
        let failed = report.failed.len();
        ctx.append(report, &file, APPEND_MARKER, &permissions);
        if report.failed.len() > failed {
            return Ok(());
        }
    }

    if let Some(app_config) = &ctx.options.app_config_path {
        match publish_permissions(&file, app_config, &module) {
            Ok(published) => {
                info!("File {} published.", published.display());
                report.generated.push(published);
            }
            Err(e) => report.fail("published permissions", e),
        }
    }

    Ok(())
}

/// Copies the module permissions into the application config directory.
fn publish_permissions(file: &Path, app_config: &Path, module: &str) -> Result<PathBuf> {
    let published = app_config.join(format!("asgard.{}.permissions.php", module));
    fs::create_dir_all(app_config)
        .with_context(|| format!("Failed to create {}", app_config.display()))?;
    fs::copy(file, &published)
        .with_context(|| format!("Failed to publish permissions to {}", published.display()))?;
    Ok(published)
}

fn create_sidebar(ctx: &GenerationContext, entities: &[String], report: &mut GenerationReport) -> Result<()> {
    let module = ctx.module.lower_name();
    let file = ctx.module.sidebar_file();
    let existing = existing_content(&file);
    let mut items = Vec::new();

    for entity in entities {
        let lower = entity.to_lowercase();
        if lower.len() > MAX_ROUTE_ENTITY_LENGTH {
            continue;
        }
        let single = naming::singular(&lower);
        if existing.contains(&format!("route('admin.{}.{}.index')", module, single)) {
            debug!("Sidebar item for {} already present", entity);
            continue;
        }
        let tokens = Tokens::new()
            .with("LOWERCASE_MODULE_NAME", module.as_str())
            .with("LOWERCASE_SINGLE_ENTITY", single)
            .with("LOWERCASE_PLURAL_ENTITY", naming::plural(&lower));
        items.push(ctx.templates.render("sidebar-item.txt", &tokens)?);
    }

    if items.is_empty() {
        return Ok(());
    }

    let group = format!(
        "$menu->group('{}', function (Group $group) {{\n{}\n    }});\n",
        module,
        items.join("\n")
    );
    ctx.append(report, &file, SIDEBAR_MARKER, &group);
    Ok(())
}
