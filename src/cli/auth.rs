use clap::Args;
use clap::Subcommand;

/// Arguments for the `auth` subcommand.
#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommands {
    /// Check that GitCode accepts the access token.
    Test,
    /// Explain where the token and forge settings come from.
    Setup,
}
