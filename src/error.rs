use thiserror::Error;

use crate::exiftool::ExiftoolError;
use crate::validation::Diagnostic;

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExiftoolError),

    #[error("Invalid exiftool output: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigFile(#[source] serde_json::Error),

    #[error("Invalid field configuration: {}", format_diagnostics(.0))]
    Config(Vec<Diagnostic>),

    #[error("Could not save record: {0}")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, FieldError>;
