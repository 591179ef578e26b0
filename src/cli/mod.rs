pub mod auth;
pub mod hook;
pub mod repo;

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::cli::auth::AuthArgs;
use crate::cli::hook::HookArgs;
use crate::cli::repo::BranchesArgs;

/// gitcode-forge: query GitCode and parse its webhooks the way a CI server does.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// GitCode access token. Falls back to GITCODE_TOKEN and GITCODE_ACCESS_TOKEN.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Config file to read instead of the default location.
    #[arg(long, global = true, env = "GITCODE_FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage authentication.
    Auth(AuthArgs),
    /// List repositories the token can access.
    Repos,
    /// List the branches of a repository.
    Branches(BranchesArgs),
    /// Parse a webhook payload and print the resulting repo and pipeline.
    Hook(HookArgs),
}
