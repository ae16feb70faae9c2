use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConnection {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub tls: bool,
}

impl DatabaseConnection {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            tls: false,
        }
    }

    pub fn to_connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.database
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub connections: Vec<DatabaseConnection>,
    pub last_connection_index: Option<usize>,
    /// Directory holding the framework modules.
    #[serde(default = "default_modules_path")]
    pub modules_path: PathBuf,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    /// Application config directory the permissions file is published to.
    #[serde(default)]
    pub app_config_path: Option<PathBuf>,
    /// Tables never generated, on top of `migrations`.
    #[serde(default)]
    pub excluded_tables: Vec<String>,
    /// Module owning a table when it lives outside the generated module.
    #[serde(default)]
    pub table_modules: HashMap<String, String>,
}

fn default_modules_path() -> PathBuf {
    PathBuf::from("Modules")
}

impl Config {
    pub fn new() -> Self {
        Self {
            connections: vec![],
            last_connection_index: None,
            modules_path: default_modules_path(),
            template_path: None,
            app_config_path: None,
            excluded_tables: vec![],
            table_modules: HashMap::new(),
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".config").join("schema-scaffold").join("config.json"))
    }

    /// Adds `connection`, replacing a saved connection with the same name.
    pub fn add_connection(&mut self, connection: DatabaseConnection) {
        match self.find_connection(&connection.name) {
            Some(index) => self.connections[index] = connection,
            None => self.connections.push(connection),
        }
    }

    pub fn delete_connection(&mut self, index: usize) {
        if index < self.connections.len() {
            self.connections.remove(index);

            // Update last_connection_index if needed
            if let Some(last_idx) = self.last_connection_index {
                if last_idx == index {
                    self.last_connection_index = None;
                } else if last_idx > index {
                    self.last_connection_index = Some(last_idx - 1);
                }
            }
        }
    }

    pub fn find_connection(&self, name: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.name == name)
    }

    pub fn get_last_connection(&self) -> Option<&DatabaseConnection> {
        self.last_connection_index
            .and_then(|idx| self.connections.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(name: &str) -> DatabaseConnection {
        DatabaseConnection {
            name: name.to_string(),
            ..DatabaseConnection::new()
        }
    }

    #[test]
    fn test_connection_string() {
        let conn = DatabaseConnection {
            password: "secret".into(),
            database: "shop".into(),
            ..connection("local")
        };
        assert_eq!(
            conn.to_connection_string(),
            "host=localhost port=5432 user=postgres password=secret dbname=shop"
        );
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut config = Config::new();
        config.add_connection(connection("a"));
        config.add_connection(DatabaseConnection {
            port: 6543,
            ..connection("a")
        });
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.connections[0].port, 6543);
    }

    #[test]
    fn test_delete_updates_last_connection() {
        let mut config = Config::new();
        config.add_connection(connection("a"));
        config.add_connection(connection("b"));
        config.add_connection(connection("c"));
        config.last_connection_index = Some(2);

        config.delete_connection(0);
        assert_eq!(config.get_last_connection().map(|c| c.name.as_str()), Some("c"));

        config.delete_connection(1);
        assert!(config.get_last_connection().is_none());
        assert_eq!(config.connections[0].name, "b");
    }

    #[test]
    fn test_old_config_files_still_load() {
        let json = r#"{"connections": [], "last_connection_index": null}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.modules_path, PathBuf::from("Modules"));
        assert!(config.table_modules.is_empty());
    }
}
