//! Domain types handed to the CI host.
//!
//! Everything a forge produces is expressed in these types. Forge-specific
//! API shapes never leak past the `forge` module.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identifier a forge assigns to a user, repository or pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForgeRemoteId(pub String);

impl ForgeRemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether the id refers to something. Empty and `"0"` do not.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0 != "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ForgeRemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated forge account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub email: String,
    pub avatar: String,
    pub forge_remote_id: ForgeRemoteId,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry as a unix timestamp (seconds).
    pub expiry: i64,
}

/// Permissions the current user holds on a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perm {
    pub pull: bool,
    pub push: bool,
    pub admin: bool,
}

/// A repository as the host sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub forge_remote_id: ForgeRemoteId,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub avatar: String,
    pub forge_url: String,
    pub clone: String,
    pub clone_ssh: String,
    /// Default branch.
    pub branch: String,
    pub is_scm_private: bool,
    pub perm: Option<Perm>,
}

/// The kind of repository event that started a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Push,
    Tag,
    PullRequest,
    PullRequestClosed,
    Release,
}

impl WebhookEvent {
    pub fn is_pull_request(self) -> bool {
        matches!(self, Self::PullRequest | Self::PullRequestClosed)
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Push => "push",
            Self::Tag => "tag",
            Self::PullRequest => "pull_request",
            Self::PullRequestClosed => "pull_request_closed",
            Self::Release => "release",
        };
        f.write_str(s)
    }
}

/// One CI run, as far as the forge can describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub event: WebhookEvent,
    pub commit: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub forge_url: String,
    pub branch: String,
    pub message: String,
    pub avatar: String,
    pub author: String,
    pub email: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub sender: String,
    pub title: String,
    pub refspec: String,
    pub changed_files: Vec<String>,
    pub pr_labels: Vec<String>,
    pub from_fork: bool,
    pub is_prerelease: bool,
}

impl Pipeline {
    /// An empty pipeline for `event`; parsers fill in the rest.
    pub fn new(event: WebhookEvent) -> Self {
        Self {
            event,
            commit: String::new(),
            git_ref: String::new(),
            forge_url: String::new(),
            branch: String::new(),
            message: String::new(),
            avatar: String::new(),
            author: String::new(),
            email: String::new(),
            timestamp: 0,
            sender: String::new(),
            title: String::new(),
            refspec: String::new(),
            changed_files: Vec::new(),
            pr_labels: Vec::new(),
            from_fork: false,
            is_prerelease: false,
        }
    }
}

/// An open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub index: ForgeRemoteId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub forge_url: String,
}

/// Which forge a credential record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeType {
    GitCode,
}

/// HTTP basic-auth credentials for the clone step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
    pub forge_type: ForgeType,
}

/// A file fetched from a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Path relative to the repository root.
    pub name: String,
    pub data: Vec<u8>,
}

/// Parameters of an OAuth callback. An empty `code` starts the flow.
#[derive(Debug, Clone, Default)]
pub struct OAuthRequest {
    pub code: String,
    pub state: String,
}

/// Paging parameters for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
    /// Fetch every page instead of just `page`.
    pub all: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            all: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub login: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub name: String,
    pub is_user: bool,
    pub private: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgPerm {
    pub member: bool,
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_validity() {
        assert!(ForgeRemoteId::new("42").is_valid());
        assert!(!ForgeRemoteId::new("").is_valid());
        assert!(!ForgeRemoteId::new("0").is_valid());
    }

    #[test]
    fn webhook_event_serializes_snake_case() {
        let json = serde_json::to_string(&WebhookEvent::PullRequestClosed).unwrap();
        assert_eq!(json, "\"pull_request_closed\"");
        assert_eq!(WebhookEvent::PullRequestClosed.to_string(), "pull_request_closed");
    }

    #[test]
    fn pull_request_events() {
        assert!(WebhookEvent::PullRequest.is_pull_request());
        assert!(WebhookEvent::PullRequestClosed.is_pull_request());
        assert!(!WebhookEvent::Push.is_pull_request());
    }

    #[test]
    fn pipeline_ref_field_is_named_ref() {
        let mut pipeline = Pipeline::new(WebhookEvent::Push);
        pipeline.git_ref = "refs/heads/main".to_string();
        let value = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(value["ref"], "refs/heads/main");
        assert_eq!(value["event"], "push");
    }
}
