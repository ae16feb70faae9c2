use anyhow::Result;
use log::{debug, info};
use std::fs;
use super::{GenerationContext, GenerationReport, Generator, BINDINGS_MARKER};
use crate::naming;
use crate::template::Tokens;

/// Repository interface, Eloquent implementation and cache decorator per
/// entity, bound in the module service provider.
pub struct RepositoryGenerator;

impl Generator for RepositoryGenerator {
    fn name(&self) -> &'static str {
        "repositories"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating repositories");
        let mut report = GenerationReport::default();

        for table in ctx.info.tables() {
            let entity = naming::entity_name(table);
            if let Err(e) = generate_repositories(ctx, &entity, &mut report) {
                report.fail(&format!("repositories for {}", entity), e);
                continue;
            }
            if let Err(e) = bind(ctx, &entity, &mut report) {
                report.fail(&format!("bindings for {}", entity), e);
            }
        }

        Ok(report)
    }
}

fn generate_repositories(ctx: &GenerationContext, entity: &str, report: &mut GenerationReport) -> Result<()> {
    let namespace = ctx.namespace();
    let dir = ctx.module.path().join("Repositories");

    let interface = Tokens::new()
        .with("CLASS_NAME", entity)
        .with("NAMESPACE", format!("{}\\Repositories", namespace));
    ctx.write(
        report,
        "repository-interface.txt",
        &interface,
        &dir.join(format!("{}Repository.php", entity)),
        "interface",
    )?;

    let decorator = Tokens::new()
        .with("CLASS_NAME", entity)
        .with("LOWERCASE_CLASS_NAME", naming::camel(entity))
        .with("NAMESPACE", format!("{}\\Repositories\\Cache", namespace))
        .with("REPOSITORY_NAMESPACE", format!("{}\\Repositories", namespace))
        .with("PLURAL_LOWERCASE_CLASS_NAME", naming::plural(&entity.to_lowercase()));
    ctx.write(
        report,
        "cache-repository-decorator.txt",
        &decorator,
        &dir.join("Cache").join(format!("Cache{}Decorator.php", entity)),
        "decorator",
    )?;

    let eloquent = Tokens::new()
        .with("CLASS_NAME", entity)
        .with("NAMESPACE", format!("{}\\Repositories\\Eloquent", namespace))
        .with("INTERFACE_NAMESPACE", format!("{}\\Repositories", namespace));
    ctx.write(
        report,
        "eloquent-repository.txt",
        &eloquent,
        &dir.join("Eloquent").join(format!("Eloquent{}Repository.php", entity)),
        "eloquent",
    )
}

fn bind(ctx: &GenerationContext, entity: &str, report: &mut GenerationReport) -> Result<()> {
    let provider = ctx.module.service_provider();
    let namespace = ctx.namespace();
    let interface = format!("'{}\\Repositories\\{}Repository'", namespace, entity);

    let bound = fs::read_to_string(&provider)
        .map(|content| content.contains(&interface))
        .unwrap_or(false);
    if bound {
        debug!("{} already bound in {}", entity, provider.display());
        return Ok(());
    }

    let tokens = Tokens::new()
        .with("NAMESPACE", namespace)
        .with("CLASS_NAME", entity);
    let binding = ctx.templates.render("bindings.txt", &tokens)?;
    ctx.append(report, &provider, BINDINGS_MARKER, &binding);
    Ok(())
}
