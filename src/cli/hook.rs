use std::path::PathBuf;

use clap::Args;

/// Arguments for the `hook` subcommand.
#[derive(Debug, Args)]
pub struct HookArgs {
    /// Event header value, e.g. "Push Hook" or "merge_request".
    pub event: String,

    /// File holding the JSON request body.
    pub payload: PathBuf,

    /// Look up extra details (tag commits, changed files) with the token.
    #[arg(long)]
    pub enrich: bool,
}
