use clap::Args;

/// Arguments for the `branches` subcommand.
#[derive(Debug, Args)]
pub struct BranchesArgs {
    /// Repository as `owner/name`.
    pub repo: String,
}

/// Split `owner/name`.
pub fn parse_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (owner, name) = full_name.trim_matches('/').split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}
