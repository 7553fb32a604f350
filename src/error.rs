use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NauticaError {
    #[error("invalid song id: {0}")]
    InvalidSongId(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid upload timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("only one of --song and --user may be given")]
    #[diagnostic(help("omit both to sync the whole catalog"))]
    ConflictingTargets,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("Nautica request failed: {0}")]
    Http(String),

    #[error("Nautica returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install `unar` or run with --extractor builtin"))]
    MissingTool(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("failed to parse meta.json: {0}")]
    MetadataParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl NauticaError {
    pub fn is_network(&self) -> bool {
        matches!(self, NauticaError::Http(_) | NauticaError::HttpStatus { .. })
    }

    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            NauticaError::Extraction(_) | NauticaError::MissingTool(_)
        )
    }
}
