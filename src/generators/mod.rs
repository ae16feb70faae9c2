//! File generators. Each one walks the requested tables and renders templates
//! into the target module; some also append to shared module files.

mod controllers;
mod migrations;
mod models;
mod repositories;
mod translations;
mod views;

pub use controllers::ControllersGenerator;
pub use migrations::MigrationsGenerator;
pub use models::ModelsGenerator;
pub use repositories::RepositoryGenerator;
pub use translations::TranslationsGenerator;
pub use views::ViewsGenerator;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::ScaffoldError;
use crate::information::DatabaseInformation;
use crate::module::Module;
use crate::naming;
use crate::template::{TemplateSet, Tokens};

/// Marker in the module service provider that bindings are inserted before.
pub const BINDINGS_MARKER: &str = "// add bindings";
/// Marker in the routes and permissions files.
pub const APPEND_MARKER: &str = "// append";
/// Marker in the sidebar extender.
pub const SIDEBAR_MARKER: &str = "return $menu;";

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Base namespace of generated classes, `/` or `\` separated.
    pub namespace: String,
    pub overwrite: bool,
    pub default_index_names: bool,
    pub default_fk_names: bool,
    pub app_config_path: Option<PathBuf>,
    pub table_modules: HashMap<String, String>,
    /// Timestamp used for migration file names.
    pub started_at: NaiveDateTime,
}

impl GeneratorOptions {
    pub fn new(namespace: impl Into<String>, started_at: NaiveDateTime) -> Self {
        Self {
            namespace: namespace.into(),
            overwrite: false,
            default_index_names: false,
            default_fk_names: false,
            app_config_path: None,
            table_modules: HashMap::new(),
            started_at,
        }
    }
}

pub struct GenerationContext {
    pub module: Module,
    pub info: DatabaseInformation,
    pub templates: TemplateSet,
    pub options: GeneratorOptions,
}

impl GenerationContext {
    pub fn namespace(&self) -> String {
        self.options.namespace.replace('/', "\\")
    }

    /// Namespace of a class in `layer` (e.g. `Entities`) generated for `table`.
    /// Tables mapped to another module resolve to that module's namespace.
    pub fn class_namespace(&self, table: &str, layer: &str) -> String {
        match self.options.table_modules.get(table) {
            Some(module) => format!("Modules\\{}\\{}", naming::studly(module), layer),
            None => format!("{}\\{}", self.namespace(), layer),
        }
    }

    /// Render `template` into `target` unless an existing file blocks it.
    pub fn write(
        &self,
        report: &mut GenerationReport,
        template: &str,
        tokens: &Tokens,
        target: &Path,
        kind: &str,
    ) -> Result<()> {
        if !can_generate(target, self.options.overwrite, kind) {
            report.skipped.push(target.to_path_buf());
            return Ok(());
        }

        self.templates.make(template, tokens, target)?;
        info!("File {} generated.", target.display());
        report.generated.push(target.to_path_buf());
        Ok(())
    }

    /// Insert `addition` before `marker` in a shared file, keeping the marker
    /// so later runs can append again. Failures are reported, not raised.
    pub fn append(&self, report: &mut GenerationReport, file: &Path, marker: &str, addition: &str) {
        match append_at_marker(file, marker, addition) {
            Ok(()) => {
                info!("File {} updated.", file.display());
                report.updated.push(file.to_path_buf());
            }
            Err(e) => {
                warn!("Could not update {}: {:#}", file.display(), e);
                report.failed.push(file.display().to_string());
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub generated: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<String>,
}

impl GenerationReport {
    pub fn merge(&mut self, other: GenerationReport) {
        self.generated.extend(other.generated);
        self.updated.extend(other.updated);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    /// Record a failed table and keep going.
    pub fn fail(&mut self, what: &str, err: anyhow::Error) {
        error!("Failed to generate {}: {:#}", what, err);
        self.failed.push(what.to_string());
    }
}

pub trait Generator {
    fn name(&self) -> &'static str;

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport>;
}

/// Every generator, in the order a full run executes them.
pub fn all() -> Vec<Box<dyn Generator>> {
    vec![
        Box::new(MigrationsGenerator),
        Box::new(ModelsGenerator),
        Box::new(RepositoryGenerator),
        Box::new(ViewsGenerator),
        Box::new(ControllersGenerator),
        Box::new(TranslationsGenerator),
    ]
}

/// Decide whether `file` may be written, deleting it first when overwriting.
pub fn can_generate(file: &Path, overwrite: bool, kind: &str) -> bool {
    if !file.exists() {
        return true;
    }

    if !overwrite {
        warn!(
            "Skipped {} generation, file already exists. (force using --overwrite) {}",
            kind,
            file.display()
        );
        return false;
    }

    if let Err(e) = fs::remove_file(file) {
        warn!("Failed to delete existing {} {}: {}", kind, file.display(), e);
        return false;
    }

    true
}

pub fn append_at_marker(file: &Path, marker: &str, addition: &str) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let Some(at) = content.find(marker) else {
        return Err(ScaffoldError::MarkerNotFound {
            marker: marker.to_string(),
            file: file.to_path_buf(),
        }
        .into());
    };

    // The marker keeps its indentation; the addition takes its place.
    let line_start = content[..at].rfind('\n').map_or(0, |i| i + 1);
    let indent = &content[line_start..at];
    let indent = if indent.trim().is_empty() { indent } else { "" };

    let replacement = format!("{}\n{}{}", addition.trim(), indent, marker);
    fs::write(file, content.replacen(marker, &replacement, 1))
        .with_context(|| format!("Failed to write {}", file.display()))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::NaiveDate;
    use crate::information::fixtures::{blog_schema, blog_tables};

    /// A `Blog` module in a temporary directory with the shared files the
    /// generators append to.
    pub fn blog_context(dir: &Path) -> GenerationContext {
        let root = dir.join("Blog");
        for sub in ["Providers", "Http", "Config", "Sidebar"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(
            root.join("Providers/BlogServiceProvider.php"),
            "<?php\nclass BlogServiceProvider\n{\n    public function register()\n    {\n        // add bindings\n    }\n}\n",
        )
        .unwrap();
        fs::write(root.join("Http/backendRoutes.php"), "<?php\n\n// append\n").unwrap();
        fs::write(root.join("Config/permissions.php"), "<?php\n\nreturn [\n// append\n];\n").unwrap();
        fs::write(
            root.join("Sidebar/SidebarExtender.php"),
            "<?php\nfunction extendWith(Menu $menu)\n{\n    return $menu;\n}\n",
        )
        .unwrap();

        let started_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 59)
            .unwrap();

        GenerationContext {
            module: Module::new("Blog", root),
            info: DatabaseInformation::new(blog_schema(), blog_tables()),
            templates: TemplateSet::default(),
            options: GeneratorOptions::new("Modules/Blog", started_at),
        }
    }
}
