use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Errors originating from the core scfermi library.
    #[error("Calculation error: {0}")]
    Calculation(#[from] scfermi::ScFermiError),

    /// I/O errors associated with a specific file path.
    #[error("I/O error for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O errors not tied to a specific file.
    #[error("I/O error: {0}")]
    GenericIo(#[from] std::io::Error),

    /// Errors parsing a two-column DOS data file.
    #[error("Failed to parse DOS data from '{}': {details}", .path.display())]
    DosParse { path: PathBuf, details: String },
}
