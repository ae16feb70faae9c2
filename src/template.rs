//! Template lookup and `$TOKEN$` substitution.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::ScaffoldError;

/// Templates compiled into the binary, keyed by their relative name.
const BUILTIN: &[(&str, &str)] = &[
    ("migration.txt", include_str!("../templates/migration.txt")),
    ("model.txt", include_str!("../templates/model.txt")),
    ("repository-interface.txt", include_str!("../templates/repository-interface.txt")),
    ("eloquent-repository.txt", include_str!("../templates/eloquent-repository.txt")),
    ("cache-repository-decorator.txt", include_str!("../templates/cache-repository-decorator.txt")),
    ("bindings.txt", include_str!("../templates/bindings.txt")),
    ("migrations-publish.txt", include_str!("../templates/migrations-publish.txt")),
    ("admin-controller.txt", include_str!("../templates/admin-controller.txt")),
    ("route-resource.txt", include_str!("../templates/route-resource.txt")),
    ("permissions-append.txt", include_str!("../templates/permissions-append.txt")),
    ("sidebar-item.txt", include_str!("../templates/sidebar-item.txt")),
    ("translation.txt", include_str!("../templates/translation.txt")),
    ("views/index.txt", include_str!("../templates/views/index.txt")),
    ("views/show.txt", include_str!("../templates/views/show.txt")),
    ("views/create.txt", include_str!("../templates/views/create.txt")),
    ("views/edit.txt", include_str!("../templates/views/edit.txt")),
    ("views/fields.txt", include_str!("../templates/views/fields.txt")),
    ("views/fields-translatable.txt", include_str!("../templates/views/fields-translatable.txt")),
    ("partials/fields/text.blade.php", include_str!("../templates/partials/fields/text.blade.php")),
    ("partials/fields/textarea.blade.php", include_str!("../templates/partials/fields/textarea.blade.php")),
    ("partials/fields/date.blade.php", include_str!("../templates/partials/fields/date.blade.php")),
    ("partials/fields/select.blade.php", include_str!("../templates/partials/fields/select.blade.php")),
    ("partials/fields/select-multiple.blade.php", include_str!("../templates/partials/fields/select-multiple.blade.php")),
];

/// Ordered token values for one rendered file.
#[derive(Debug, Clone, Default)]
pub struct Tokens(Vec<(&'static str, String)>);

impl Tokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }
}

/// Replace every `$KEY$` occurrence in `template`.
pub fn render(template: &str, tokens: &Tokens) -> String {
    tokens.0.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("${}$", key), value)
    })
}

/// Resolves templates from an optional override directory, then the built-in set.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    override_dir: Option<PathBuf>,
}

impl TemplateSet {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self { override_dir }
    }

    pub fn load(&self, name: &str) -> Result<String> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                debug!("Using template override {}", path.display());
                return fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template {}", path.display()));
            }
        }

        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, content)| content.to_string())
            .ok_or_else(|| ScaffoldError::TemplateNotFound(name.to_string()).into())
    }

    pub fn render(&self, name: &str, tokens: &Tokens) -> Result<String> {
        Ok(render(&self.load(name)?, tokens))
    }

    /// Render `name` and write it to `target`, creating parent directories.
    pub fn make(&self, name: &str, tokens: &Tokens, target: &Path) -> Result<()> {
        let content = self.render(name, tokens)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }
}
