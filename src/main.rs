mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitcode_forge::auth;
use gitcode_forge::auth::TokenSource;
use gitcode_forge::config::ForgeConfig;
use gitcode_forge::error::AppError;
use gitcode_forge::forge::Forge;
use gitcode_forge::forge::gitcode::GitCode;
use gitcode_forge::forge::gitcode::hook::HOOK_EVENT;
use gitcode_forge::model::ListOptions;
use gitcode_forge::model::Repo;
use gitcode_forge::model::User;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::auth::AuthCommands;
use crate::cli::hook::HookArgs;
use crate::cli::repo::BranchesArgs;
use crate::cli::repo::parse_full_name;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Auth(args) => match args.command {
            AuthCommands::Test => auth_test(&cli).await?,
            AuthCommands::Setup => auth_setup(),
        },
        Commands::Repos => list_repos(&cli).await?,
        Commands::Branches(args) => list_branches(&cli, args).await?,
        Commands::Hook(args) => parse_hook(&cli, args).await?,
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_forge(cli: &Cli) -> Result<GitCode, AppError> {
    let config = ForgeConfig::load(cli.config.as_deref())?;
    Ok(GitCode::new(config)?)
}

/// A user carrying only the resolved token; enough for API calls.
fn token_user(cli: &Cli) -> Result<(User, TokenSource), AppError> {
    let auth_token = auth::resolve_token(cli.token.as_deref())?;
    let user = User {
        access_token: auth_token.token,
        ..User::default()
    };
    Ok((user, auth_token.source))
}

async fn auth_test(cli: &Cli) -> Result<(), AppError> {
    let (user, source) = token_user(cli)?;
    println!("Authentication source: {source}");

    let forge = load_forge(cli)?;
    let login = forge.auth(&user.access_token, "").await?;
    println!("Authenticated as: {login}");

    Ok(())
}

fn auth_setup() {
    println!("gitcode-forge resolves the GitCode access token in this order:\n");
    println!("  1. --token:               Pass a personal access token on the command line.\n");
    println!("  2. GITCODE_TOKEN:         Set the GITCODE_TOKEN environment variable");
    println!("                            to a personal access token.\n");
    println!("  3. GITCODE_ACCESS_TOKEN:  Same as GITCODE_TOKEN, alternative name.\n");
    match gitcode_forge::config::default_path() {
        Some(path) => println!("Forge settings are read from {}", path.display()),
        None => println!("Forge settings are read from the file given with --config"),
    }
    println!("and can be overridden with GITCODE_URL, GITCODE_API_URL, GITCODE_CLIENT_ID,");
    println!("GITCODE_CLIENT_SECRET, GITCODE_OAUTH_HOST, GITCODE_SKIP_VERIFY and GITCODE_PAGE_SIZE.\n");
    println!("To verify: run `gitcode-forge auth test`");
}

async fn list_repos(cli: &Cli) -> Result<(), AppError> {
    let (user, _) = token_user(cli)?;
    let forge = load_forge(cli)?;

    let repos = forge.repos(&user).await?;
    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }
    for repo in &repos {
        let visibility = if repo.is_scm_private {
            "private"
        } else {
            "public"
        };
        println!("{} ({visibility}) {}", repo.full_name, repo.forge_url);
    }

    Ok(())
}

async fn list_branches(cli: &Cli, args: &BranchesArgs) -> Result<(), AppError> {
    let (owner, name) = parse_full_name(&args.repo).ok_or_else(|| AppError::Usage {
        message: format!("expected a repository as owner/name, got '{}'", args.repo),
    })?;
    let (user, _) = token_user(cli)?;
    let forge = load_forge(cli)?;

    let repo = Repo {
        owner: owner.to_string(),
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        ..Repo::default()
    };
    let opts = ListOptions {
        all: true,
        ..ListOptions::default()
    };
    for branch in forge.branches(&user, &repo, &opts).await? {
        println!("{branch}");
    }

    Ok(())
}

async fn parse_hook(cli: &Cli, args: &HookArgs) -> Result<(), AppError> {
    let body = tokio::fs::read(&args.payload)
        .await
        .map_err(|source| AppError::Io {
            path: args.payload.clone(),
            source,
        })?;
    let request = http::Request::builder()
        .method(http::Method::POST)
        .header(HOOK_EVENT, args.event.as_str())
        .body(body)
        .map_err(|e| AppError::Usage {
            message: format!("invalid event '{}': {e}", args.event),
        })?;

    let user = if args.enrich {
        Some(token_user(cli)?.0)
    } else {
        None
    };
    let forge = load_forge(cli)?;

    let (repo, pipeline) = match forge.hook(&request, user.as_ref()).await {
        Ok(parsed) => parsed,
        Err(err) if err.is_ignored_event() => {
            println!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let output = serde_json::json!({ "repo": repo, "pipeline": pipeline });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
