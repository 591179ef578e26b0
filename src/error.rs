use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::forge::ForgeError;

/// Errors that can occur in gitcode-forge.
#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    /// An error from the forge (e.g. the GitCode API).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Forge(#[from] ForgeError),

    /// An authentication error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    /// A configuration error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {message}")]
    Usage { message: String },
}
