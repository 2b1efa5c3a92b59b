use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    #[error("Definition file '{path}' does not exist.")]
    DefinitionNotFound { path: PathBuf },

    #[error("Variables file '{path}' does not exist.")]
    VarsFileNotFound { path: PathBuf },

    /// Malformed YAML or an invalid definition structure.
    #[error("Error loading definition '{path}': {description}")]
    ParseError { path: PathBuf, description: String },

    /// A definition includes itself, directly or through other definitions.
    #[error("Cyclic definition: {}", format_chain(.chain))]
    CyclicDefinition { chain: Vec<PathBuf> },

    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Raised by the `mandatory` filter.
    #[error("Mandatory variable '{variable}' is undefined{}", format_message(.message))]
    MissingVariable { variable: String, message: Option<String> },

    #[error("Cannot write '{path}': {description}")]
    DestinationWrite { path: PathBuf, description: String },

    #[error("Cannot read template '{path}': {description}")]
    TemplateSourceError { path: PathBuf, description: String },

    #[error("Failed to parse YAML. Original error: {0}")]
    YAMLParseError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON. Original error: {0}")]
    JSONParseError(#[from] serde_json::Error),

    #[error("File watcher error: {0}")]
    WatchError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wraps the error with the path of the file it was raised for, keeping
    /// errors that already name their file untouched.
    pub fn in_file<P: Into<PathBuf>>(self, path: P) -> Self {
        match self {
            Error::TemplateError(e) => {
                Error::ParseError { path: path.into(), description: e.to_string() }
            }
            Error::YAMLParseError(e) => {
                Error::ParseError { path: path.into(), description: e.to_string() }
            }
            other => other,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain.iter().map(|p| format!("'{}'", p.display())).collect::<Vec<_>>().join(" -> ")
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

/// Convenience type alias for Results with templer's Error as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(crate::constants::exit_codes::FAILURE);
}
