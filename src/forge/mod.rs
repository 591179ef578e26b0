//! Forge trait and implementations.
//!
//! The CI host talks to every forge through the `Forge` trait. Implementations
//! translate provider-specific REST and webhook shapes into `crate::model`
//! types; nothing provider-specific crosses this boundary.

pub mod gitcode;

use std::future::Future;

use miette::Diagnostic;
use thiserror::Error;

use crate::model::Commit;
use crate::model::FileMeta;
use crate::model::ForgeRemoteId;
use crate::model::ListOptions;
use crate::model::Netrc;
use crate::model::OAuthRequest;
use crate::model::Org;
use crate::model::OrgPerm;
use crate::model::Perm;
use crate::model::Pipeline;
use crate::model::PullRequest;
use crate::model::Repo;
use crate::model::Team;
use crate::model::User;

/// Errors from forge operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ForgeError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {message}")]
    #[diagnostic(help("check that the access token is valid and has not expired"))]
    AuthFailed { message: String },

    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("failed to decode response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("OAuth error: {message}")]
    OAuth { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("could not find repository")]
    RepoNotFound,

    #[error("config file(s) not found: {}", configs.join(", "))]
    ConfigNotFound { configs: Vec<String> },

    #[error("webhook request has no event header")]
    #[diagnostic(help("GitCode sends the event type in the X-GitCode-Event header"))]
    MissingEventHeader,

    #[error("ignoring '{event}' webhook: {reason}")]
    IgnoredEvent { event: String, reason: String },

    #[error("invalid '{event}' webhook payload")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ForgeError {
    /// Whether the forge reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api { status: 404, .. }
                | Self::NotFound { .. }
                | Self::RepoNotFound
                | Self::ConfigNotFound { .. }
        )
    }

    /// Whether a webhook was well-formed but describes nothing to build.
    pub fn is_ignored_event(&self) -> bool {
        matches!(self, Self::IgnoredEvent { .. })
    }
}

/// The contract a forge plugin fulfils for the CI host.
///
/// OAuth token storage belongs to the host: methods receive the `User` whose
/// token they should act with and never persist anything themselves.
pub trait Forge: Send + Sync {
    /// Short identifier of the forge, e.g. `"gitcode"`.
    fn name(&self) -> &'static str;

    /// Web URL of the forge.
    fn url(&self) -> &str;

    /// Run one step of the OAuth authorization code flow.
    ///
    /// Returns the redirect URL to the forge's authorize page together with the
    /// user, which is only present once `req.code` has been exchanged.
    fn login(
        &self,
        req: &OAuthRequest,
    ) -> impl Future<Output = Result<(Option<User>, String), ForgeError>> + Send;

    /// Validate a raw access token and return the login it belongs to.
    fn auth(
        &self,
        token: &str,
        secret: &str,
    ) -> impl Future<Output = Result<String, ForgeError>> + Send;

    /// Refresh the user's access token if it has expired.
    ///
    /// Returns `true` when `user` was updated and should be saved.
    fn refresh(&self, user: &mut User) -> impl Future<Output = Result<bool, ForgeError>> + Send;

    /// Organisations the user belongs to.
    fn teams(&self, user: &User) -> impl Future<Output = Result<Vec<Team>, ForgeError>> + Send;

    /// The user's permissions inside an organisation, if the forge exposes them.
    fn team_perm(&self, user: &User, org: &str) -> Result<Option<Perm>, ForgeError>;

    /// Look up one repository by remote id, or by owner and name when the id
    /// is not valid.
    fn repo(
        &self,
        user: &User,
        remote_id: &ForgeRemoteId,
        owner: &str,
        name: &str,
    ) -> impl Future<Output = Result<Repo, ForgeError>> + Send;

    /// All repositories the user can access.
    fn repos(&self, user: &User) -> impl Future<Output = Result<Vec<Repo>, ForgeError>> + Send;

    /// Raw content of one file at the pipeline's commit.
    fn file(
        &self,
        user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> impl Future<Output = Result<Vec<u8>, ForgeError>> + Send;

    /// Files directly inside a directory at the pipeline's commit.
    fn dir(
        &self,
        user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> impl Future<Output = Result<Vec<FileMeta>, ForgeError>> + Send;

    /// Report pipeline status back to the forge.
    fn status(
        &self,
        user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> impl Future<Output = Result<(), ForgeError>> + Send;

    /// Credentials for cloning `repo`.
    fn netrc(&self, user: Option<&User>, repo: &Repo) -> Result<Netrc, ForgeError>;

    /// Register `link` as the repository's webhook.
    fn activate(
        &self,
        user: &User,
        repo: &Repo,
        link: &str,
    ) -> impl Future<Output = Result<(), ForgeError>> + Send;

    /// Remove the webhook pointing at `link`.
    fn deactivate(
        &self,
        user: &User,
        repo: &Repo,
        link: &str,
    ) -> impl Future<Output = Result<(), ForgeError>> + Send;

    /// Branch names of a repository.
    fn branches(
        &self,
        user: &User,
        repo: &Repo,
        opts: &ListOptions,
    ) -> impl Future<Output = Result<Vec<String>, ForgeError>> + Send;

    /// The commit a branch points at.
    fn branch_head(
        &self,
        user: &User,
        repo: &Repo,
        branch: &str,
    ) -> impl Future<Output = Result<Commit, ForgeError>> + Send;

    /// Open pull requests of a repository.
    fn pull_requests(
        &self,
        user: &User,
        repo: &Repo,
        opts: &ListOptions,
    ) -> impl Future<Output = Result<Vec<PullRequest>, ForgeError>> + Send;

    /// Parse an incoming webhook request into the repository and pipeline it
    /// describes.
    ///
    /// `user` is the owner of the repository's token, when the host knows it.
    /// Without it, details that need extra API calls are left empty.
    fn hook(
        &self,
        request: &http::Request<Vec<u8>>,
        user: Option<&User>,
    ) -> impl Future<Output = Result<(Repo, Pipeline), ForgeError>> + Send;

    /// The user's membership in an organisation.
    fn org_membership(
        &self,
        user: &User,
        org: &str,
    ) -> impl Future<Output = Result<OrgPerm, ForgeError>> + Send;

    /// Organisation details.
    fn org(&self, user: &User, name: &str) -> impl Future<Output = Result<Org, ForgeError>> + Send;
}
