//! GitCode access token resolution for the command line.
//!
//! Resolves a token in priority order:
//! 1. the `--token` flag
//! 2. `GITCODE_TOKEN` environment variable
//! 3. `GITCODE_ACCESS_TOKEN` environment variable

use miette::Diagnostic;
use thiserror::Error;

/// How the token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// From the `--token` flag.
    Flag,
    /// From `GITCODE_TOKEN` environment variable.
    GitCodeTokenEnv,
    /// From `GITCODE_ACCESS_TOKEN` environment variable.
    AccessTokenEnv,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag => write!(f, "--token flag"),
            Self::GitCodeTokenEnv => write!(f, "GITCODE_TOKEN environment variable"),
            Self::AccessTokenEnv => write!(f, "GITCODE_ACCESS_TOKEN environment variable"),
        }
    }
}

/// A resolved access token with its source.
#[derive(Clone)]
pub struct AuthToken {
    pub token: String,
    pub source: TokenSource,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Errors from authentication resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    #[error("no GitCode access token found")]
    #[diagnostic(help(
        "Pass --token or set GITCODE_TOKEN/GITCODE_ACCESS_TOKEN to a personal access token"
    ))]
    NoAuthFound,
}

/// Resolve a GitCode access token from the flag or the process environment.
///
/// This does NOT validate the token against the GitCode API.
/// Use `Forge::auth()` to validate.
pub fn resolve_token(flag: Option<&str>) -> Result<AuthToken, AuthError> {
    resolve_token_with(flag, |key| std::env::var(key).ok())
}

/// `resolve_token` with an injectable environment.
pub fn resolve_token_with(
    flag: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AuthToken, AuthError> {
    if let Some(token) = flag
        && !token.is_empty()
    {
        return Ok(AuthToken {
            token: token.to_string(),
            source: TokenSource::Flag,
        });
    }

    for (key, source) in [
        ("GITCODE_TOKEN", TokenSource::GitCodeTokenEnv),
        ("GITCODE_ACCESS_TOKEN", TokenSource::AccessTokenEnv),
    ] {
        if let Some(token) = env(key)
            && !token.is_empty()
        {
            return Ok(AuthToken { token, source });
        }
    }

    Err(AuthError::NoAuthFound)
}
