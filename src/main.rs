//! Scaffolds framework modules (migrations, models, repositories, views,
//! controllers and translations) from an existing PostgreSQL schema.

mod config;
mod db;
mod error;
mod generators;
mod information;
mod module;
mod naming;
mod relationships;
mod template;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{info, warn};
use std::path::PathBuf;
use serde_json::json;
use std::process;

use config::{Config, DatabaseConnection};
use db::{Database, SchemaSnapshot};
use error::ScaffoldError;
use generators::{GenerationContext, GenerationReport, Generator, GeneratorOptions};
use information::DatabaseInformation;
use module::Module;
use template::TemplateSet;

/// Tables that never get scaffolding.
const ALWAYS_EXCLUDED: &[&str] = &["migrations"];

#[derive(Parser)]
#[command(name = "schema-scaffold")]
#[command(about = "Generate module scaffolding from an existing PostgreSQL schema")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate files for a module from the database schema
    Generate(GenerateArgs),

    /// Print the inferred relationships as JSON
    Inspect {
        /// Comma separated tables to inspect (default: all)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Manage saved database connections
    Connections {
        #[command(subcommand)]
        action: ConnectionCommands,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Module to generate into, e.g. "Blog"
    module: String,

    /// Comma separated tables to generate (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Comma separated tables to skip
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Run only these generators: migrations, models, repositories, views,
    /// controllers, translations
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Replace files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Namespace of generated classes (default: Modules\<Module>)
    #[arg(long)]
    namespace: Option<String>,

    /// Directory with template overrides
    #[arg(long)]
    template_path: Option<PathBuf>,

    /// Directory holding the modules
    #[arg(long)]
    modules_path: Option<PathBuf>,

    /// Application config directory the permissions file is published to
    #[arg(long)]
    app_config_path: Option<PathBuf>,

    /// Leave index names to the framework
    #[arg(long)]
    default_index_names: bool,

    /// Leave foreign key names to the framework
    #[arg(long)]
    default_fk_names: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Name of a saved connection
    #[arg(long)]
    connection: Option<String>,

    /// Connect over TLS (with --database-url)
    #[arg(long)]
    tls: bool,

    /// Database schema to inspect
    #[arg(long, default_value = "public")]
    schema: String,
}

#[derive(Subcommand)]
enum ConnectionCommands {
    /// List saved connections
    List,

    /// Save a connection, replacing one with the same name
    Add {
        name: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(long, default_value = "postgres")]
        user: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long)]
        database: String,
        #[arg(long)]
        tls: bool,
    },

    /// Remove a saved connection
    Remove { name: String },

    /// Make a saved connection the default
    Use { name: String },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let result = match cli.command {
        Commands::Generate(args) => handle_generate(args, cli.quiet),
        Commands::Inspect { tables, connection } => handle_inspect(&tables, &connection),
        Commands::Connections { action } => handle_connections(action),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn handle_generate(args: GenerateArgs, quiet: bool) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let generators = select_generators(&args.only)?;

    let modules_path = args.modules_path.unwrap_or_else(|| config.modules_path.clone());
    let module = Module::find(&modules_path, &args.module)?;
    module.capitalize_service_providers()?;

    let snapshot = load_snapshot(&args.connection, &mut config)?;
    let tables = select_tables(&snapshot, &args.tables, &args.ignore, &config.excluded_tables)?;
    info!("Generating {} for {} table(s)", module.studly_name(), tables.len());

    let mut options = GeneratorOptions::new(
        args.namespace.unwrap_or_else(|| module.default_namespace()),
        chrono::Local::now().naive_local(),
    );
    options.overwrite = args.overwrite;
    options.default_index_names = args.default_index_names;
    options.default_fk_names = args.default_fk_names;
    options.app_config_path = args.app_config_path.or_else(|| config.app_config_path.clone());
    options.table_modules = config.table_modules.clone();

    let ctx = GenerationContext {
        module,
        info: DatabaseInformation::new(snapshot, tables),
        templates: TemplateSet::new(args.template_path.or_else(|| config.template_path.clone())),
        options,
    };

    let summary = run_generators(&generators, &ctx);
    if !quiet {
        print_summary(&summary);
    }
    Ok(())
}

/// Runs every generator in order. A generator that fails as a whole is
/// recorded and the next one still runs.
fn run_generators(generators: &[Box<dyn Generator>], ctx: &GenerationContext) -> GenerationReport {
    let mut summary = GenerationReport::default();
    for generator in generators {
        match generator.execute(ctx) {
            Ok(report) => summary.merge(report),
            Err(e) => summary.fail(&format!("{} generator", generator.name()), e),
        }
    }
    summary
}

fn handle_inspect(tables: &[String], connection: &ConnectionArgs) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let snapshot = load_snapshot(connection, &mut config)?;
    let tables = select_tables(&snapshot, tables, &[], &[])?;

    let info = DatabaseInformation::new(snapshot, tables);
    println!("{}", serde_json::to_string_pretty(&inspection(&info))?);
    Ok(())
}

/// Columns and inferred relationships of the requested tables.
fn inspection(info: &DatabaseInformation) -> serde_json::Value {
    let tables: serde_json::Map<String, serde_json::Value> = info
        .iter()
        .map(|table| {
            let columns: Vec<serde_json::Value> = table
                .columns
                .iter()
                .map(|column| {
                    json!({
                        "name": column.name,
                        "type": column.data_type,
                        "kind": column.kind().as_str(),
                        "nullable": column.is_nullable,
                        "default": column.default,
                    })
                })
                .collect();
            let value = json!({
                "columns": columns,
                "primary_key": table.primary_key,
                "relationships": info.relationships(&table.name),
            });
            (table.name.clone(), value)
        })
        .collect();
    serde_json::Value::Object(tables)
}

fn handle_connections(action: ConnectionCommands) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;

    match action {
        ConnectionCommands::List => {
            if config.connections.is_empty() {
                println!("No saved connections");
            }
            for (index, conn) in config.connections.iter().enumerate() {
                let marker = if config.last_connection_index == Some(index) { "*" } else { " " };
                println!(
                    "{} {} {}@{}:{}/{}{}",
                    marker.green().bold(),
                    conn.name.bold(),
                    conn.user,
                    conn.host,
                    conn.port,
                    conn.database,
                    if conn.tls { " (tls)" } else { "" }
                );
            }
            return Ok(());
        }
        ConnectionCommands::Add { name, host, port, user, password, database, tls } => {
            config.add_connection(DatabaseConnection {
                name: name.clone(),
                host,
                port,
                user,
                password,
                database,
                tls,
            });
            println!("Saved connection {}", name.bold());
        }
        ConnectionCommands::Remove { name } => {
            let index = config
                .find_connection(&name)
                .ok_or_else(|| ScaffoldError::UnknownConnection(name.clone()))?;
            config.delete_connection(index);
            println!("Removed connection {}", name.bold());
        }
        ConnectionCommands::Use { name } => {
            let index = config
                .find_connection(&name)
                .ok_or_else(|| ScaffoldError::UnknownConnection(name.clone()))?;
            config.last_connection_index = Some(index);
            println!("Using connection {}", name.bold());
        }
    }

    config.save().context("Failed to save config")
}

/// Connection string and TLS flag, by precedence: `--database-url`,
/// `--connection`, the last used saved connection, then `DATABASE_URL`.
fn resolve_connection(args: &ConnectionArgs, config: &mut Config) -> Result<(String, bool)> {
    if let Some(url) = &args.database_url {
        return Ok((url.clone(), args.tls));
    }

    if let Some(name) = &args.connection {
        let index = config
            .find_connection(name)
            .ok_or_else(|| ScaffoldError::UnknownConnection(name.clone()))?;
        config.last_connection_index = Some(index);
        if let Err(e) = config.save() {
            warn!("Failed to remember connection {}: {}", name, e);
        }
        let conn = &config.connections[index];
        return Ok((conn.to_connection_string(), conn.tls));
    }

    if let Some(conn) = config.get_last_connection() {
        info!("Using saved connection {}", conn.name);
        return Ok((conn.to_connection_string(), conn.tls));
    }

    match std::env::var("DATABASE_URL") {
        Ok(url) => Ok((url, args.tls)),
        Err(_) => Err(ScaffoldError::NoConnection.into()),
    }
}

fn load_snapshot(args: &ConnectionArgs, config: &mut Config) -> Result<SchemaSnapshot> {
    let (connection_string, tls) = resolve_connection(args, config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    runtime.block_on(async {
        let db = Database::connect(&connection_string, tls)
            .await
            .context("Failed to connect to database")?;
        db.snapshot(&args.schema).await
    })
}

/// Tables to generate: the requested ones that exist (all when none are
/// requested) minus ignored and excluded tables.
fn select_tables(
    snapshot: &SchemaSnapshot,
    requested: &[String],
    ignore: &[String],
    excluded: &[String],
) -> Result<Vec<String>> {
    let candidates: Vec<String> = if requested.is_empty() {
        snapshot.keys().cloned().collect()
    } else {
        requested
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| {
                let exists = snapshot.contains_key(t);
                if !exists {
                    warn!("Table {} does not exist, skipping", t);
                }
                exists
            })
            .collect()
    };

    let tables: Vec<String> = candidates
        .into_iter()
        .filter(|t| {
            !ALWAYS_EXCLUDED.contains(&t.as_str())
                && !ignore.iter().any(|i| i.trim() == t)
                && !excluded.contains(t)
        })
        .collect();

    if tables.is_empty() {
        return Err(ScaffoldError::NothingToGenerate.into());
    }
    Ok(tables)
}

fn select_generators(only: &[String]) -> Result<Vec<Box<dyn Generator>>> {
    let all = generators::all();
    if only.is_empty() {
        return Ok(all);
    }

    for name in only {
        if !all.iter().any(|g| g.name() == name.trim()) {
            let known: Vec<&str> = all.iter().map(|g| g.name()).collect();
            bail!("Unknown generator {}, expected one of: {}", name, known.join(", "));
        }
    }

    Ok(all
        .into_iter()
        .filter(|g| only.iter().any(|name| name.trim() == g.name()))
        .collect())
}

fn print_summary(report: &GenerationReport) {
    println!(
        "\n{} {} generated, {} updated, {} skipped, {} failed",
        "Summary:".bold(),
        report.generated.len().to_string().green(),
        report.updated.len().to_string().cyan(),
        report.skipped.len().to_string().yellow(),
        report.failed.len().to_string().red()
    );
    for failed in &report.failed {
        println!("  {} {}", "✗".red(), failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::information::fixtures::blog_schema;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_all_tables() {
        let mut schema = blog_schema();
        schema.insert("migrations".into(), db::TableSchema::new("migrations"));

        let tables = select_tables(&schema, &[], &names(&["audits"]), &names(&["roles"])).unwrap();
        assert_eq!(
            tables,
            names(&["post_translations", "posts", "profiles", "role_user", "users"])
        );
    }

    #[test]
    fn test_select_requested_tables() {
        let schema = blog_schema();
        let tables = select_tables(&schema, &names(&["users", " posts", "ghosts"]), &[], &[]).unwrap();
        assert_eq!(tables, names(&["users", "posts"]));
    }

    #[test]
    fn test_nothing_to_generate() {
        let schema = blog_schema();
        let err = select_tables(&schema, &names(&["ghosts"]), &[], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScaffoldError>(),
            Some(ScaffoldError::NothingToGenerate)
        ));
    }

    #[test]
    fn test_inspection_lists_columns_and_relationships() {
        let info = DatabaseInformation::new(blog_schema(), names(&["users"]));
        let value = inspection(&info);

        let users = &value["users"];
        assert!(value.get("posts").is_none());
        assert_eq!(users["primary_key"], json!(["id"]));
        assert_eq!(users["columns"][0]["name"], "id");
        assert_eq!(users["columns"][0]["kind"], "integer");
        assert_eq!(users["relationships"]["has_one"][0]["table"], "profiles");
    }

    struct BrokenGenerator;

    impl Generator for BrokenGenerator {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn execute(&self, _ctx: &GenerationContext) -> Result<GenerationReport> {
            bail!("template directory vanished")
        }
    }

    #[test]
    fn test_failing_generator_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = generators::testing::blog_context(dir.path());
        let pipeline: Vec<Box<dyn Generator>> =
            vec![Box::new(BrokenGenerator), Box::new(generators::TranslationsGenerator)];

        let summary = run_generators(&pipeline, &ctx);
        assert_eq!(summary.failed, vec!["broken generator".to_string()]);
        assert_eq!(summary.generated.len(), 5);
    }

    #[test]
    fn test_select_generators_keeps_run_order() {
        let all: Vec<&str> = select_generators(&[]).unwrap().iter().map(|g| g.name()).collect();
        assert_eq!(
            all,
            vec!["migrations", "models", "repositories", "views", "controllers", "translations"]
        );

        let some: Vec<&str> = select_generators(&names(&["views", "models"]))
            .unwrap()
            .iter()
            .map(|g| g.name())
            .collect();
        assert_eq!(some, vec!["models", "views"]);

        assert!(select_generators(&names(&["seeders"])).is_err());
    }

    #[test]
    fn test_database_url_wins() {
        let mut config = Config::new();
        config.add_connection(DatabaseConnection {
            name: "local".into(),
            ..DatabaseConnection::new()
        });
        config.last_connection_index = Some(0);

        let args = ConnectionArgs {
            database_url: Some("postgres://u@h/db".into()),
            connection: None,
            tls: true,
            schema: "public".into(),
        };
        let (url, tls) = resolve_connection(&args, &mut config).unwrap();
        assert_eq!(url, "postgres://u@h/db");
        assert!(tls);

        let args = ConnectionArgs { database_url: None, tls: false, ..args };
        let (url, _) = resolve_connection(&args, &mut config).unwrap();
        assert!(url.starts_with("host=localhost port=5432"));
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "schema-scaffold",
            "-v",
            "generate",
            "blog",
            "--tables",
            "users,posts",
            "--only",
            "models",
            "--overwrite",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.module, "blog");
                assert_eq!(args.tables, names(&["users", "posts"]));
                assert_eq!(args.only, names(&["models"]));
                assert!(args.overwrite);
                assert_eq!(args.connection.schema, "public");
            }
            _ => panic!("expected generate"),
        }
    }
}
