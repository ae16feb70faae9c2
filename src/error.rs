use std::path::PathBuf;
use thiserror::Error;

/// Lookups against the inspected schema that have no usable answer.
///
/// Callers usually recover by falling back to an `id` primary key.
#[derive(Debug, Error, PartialEq)]
pub enum DatabaseInformationError {
    #[error("Table {0} is not part of the inspected schema")]
    UnknownTable(String),
    #[error("Primary key for table: {0} could not be detected.")]
    MissingPrimaryKey(String),
}

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Module {name} not found in {}", root.display())]
    ModuleNotFound { name: String, root: PathBuf },
    #[error("There is nothing to generate.")]
    NothingToGenerate,
    #[error("Template {0} not found")]
    TemplateNotFound(String),
    #[error("Marker `{marker}` not found in {}", file.display())]
    MarkerNotFound { marker: String, file: PathBuf },
    #[error("No database connection configured. Use --database-url, --connection, a saved connection or DATABASE_URL.")]
    NoConnection,
    #[error("Saved connection {0} does not exist")]
    UnknownConnection(String),
}
