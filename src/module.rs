use anyhow::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::ScaffoldError;
use crate::naming;

/// A framework module directory that generated files are written into.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    path: PathBuf,
}

impl Module {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Locate `name` under `root`, matching the directory name case-insensitively.
    pub fn find(root: &Path, name: &str) -> Result<Self> {
        let not_found = || ScaffoldError::ModuleNotFound {
            name: name.to_string(),
            root: root.to_path_buf(),
        };

        let exact = root.join(naming::studly(name));
        if exact.is_dir() {
            return Ok(Self::new(naming::studly(name), exact));
        }

        let entries = fs::read_dir(root).map_err(|_| not_found())?;
        for entry in entries.flatten() {
            let dir_name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && dir_name.eq_ignore_ascii_case(name) {
                return Ok(Self::new(dir_name, entry.path()));
            }
        }

        Err(not_found().into())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn studly_name(&self) -> String {
        naming::studly(&self.name)
    }

    pub fn lower_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Default namespace of generated classes: `Modules\<Module>`.
    pub fn default_namespace(&self) -> String {
        format!("Modules\\{}", self.studly_name())
    }

    pub fn service_provider(&self) -> PathBuf {
        self.path
            .join("Providers")
            .join(format!("{}ServiceProvider.php", self.studly_name()))
    }

    pub fn routes_file(&self) -> PathBuf {
        self.path.join("Http").join("backendRoutes.php")
    }

    pub fn permissions_file(&self) -> PathBuf {
        self.path.join("Config").join("permissions.php")
    }

    pub fn sidebar_file(&self) -> PathBuf {
        self.path.join("Sidebar").join("SidebarExtender.php")
    }

    /// Make sure every service provider file name starts with a capital letter,
    /// so the provider path derived from the module name resolves.
    pub fn capitalize_service_providers(&self) -> Result<()> {
        let providers = self.path.join("Providers");
        if !providers.is_dir() {
            return Ok(());
        }

        for entry in fs::read_dir(&providers)?.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.ends_with(".php") {
                continue;
            }

            let mut chars = file_name.chars();
            let capitalized: String = match chars.next() {
                Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
                _ => continue,
            };
            debug!("Renaming provider {} to {}", file_name, capitalized);
            fs::rename(entry.path(), providers.join(capitalized))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_module_case_insensitive() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("Blog")).unwrap();

        let module = Module::find(root.path(), "blog").unwrap();
        assert_eq!(module.studly_name(), "Blog");
        assert_eq!(module.lower_name(), "blog");
        assert_eq!(module.default_namespace(), "Modules\\Blog");
        assert!(module.service_provider().ends_with("Providers/BlogServiceProvider.php"));

        assert!(Module::find(root.path(), "shop").is_err());
    }

    #[test]
    fn test_capitalize_service_providers() {
        let root = tempfile::tempdir().unwrap();
        let providers = root.path().join("Providers");
        fs::create_dir_all(&providers).unwrap();
        fs::write(providers.join("blogServiceProvider.php"), "<?php").unwrap();
        fs::write(providers.join("notes.txt"), "").unwrap();

        Module::new("Blog", root.path()).capitalize_service_providers().unwrap();

        assert!(providers.join("BlogServiceProvider.php").is_file());
        assert!(providers.join("notes.txt").is_file());
    }
}
