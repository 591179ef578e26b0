//! Serde structs for GitCode webhook payloads.
//!
//! Push and merge request hooks use GitLab-style shapes (`object_kind`,
//! `project`, `merge_request`) or Gitea-style ones (`repository`, `sender`,
//! `pull_request`); release hooks reuse the API repository and user shapes.

use serde::Deserialize;

use super::types;
use super::types::flexible_id;
use super::types::nullable;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookUser {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
}

impl HookUser {
    /// The account handle, whichever field the payload used.
    pub fn handle(&self) -> &str {
        if self.username.is_empty() {
            &self.login
        } else {
            &self.username
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookProject {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub web_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_ssh_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_http_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub namespace: String,
    /// `0` is private.
    #[serde(default, deserialize_with = "nullable")]
    pub visibility_level: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub path_with_namespace: String,
    #[serde(default, deserialize_with = "nullable")]
    pub default_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub homepage: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ssh_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub http_url: String,
}

/// The `repository` block. Older payloads carry only the GitLab-style
/// fields; newer ones use the Gitea-style `full_name`/`clone_url` shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookRepository {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub clone_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ssh_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub default_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub private: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub owner: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub homepage: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_http_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_ssh_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub visibility_level: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookCommit {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author: CommitAuthor,
    #[serde(default, deserialize_with = "nullable")]
    pub added: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub removed: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub modified: Vec<String>,
}

/// Push and tag push events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushHook {
    #[serde(default, deserialize_with = "nullable")]
    pub object_kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub before: String,
    #[serde(default, deserialize_with = "nullable")]
    pub after: String,
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub checkout_sha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user_username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user_email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user_avatar: String,
    #[serde(default, deserialize_with = "flexible_id")]
    pub project_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub project: HookProject,
    #[serde(default, deserialize_with = "nullable")]
    pub commits: Vec<HookCommit>,
    #[serde(default, deserialize_with = "nullable")]
    pub head_commit: HookCommit,
    #[serde(default, deserialize_with = "nullable")]
    pub total_commits_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub sender: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub repository: HookRepository,
    #[serde(default, deserialize_with = "nullable")]
    pub git_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_commit_no: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub iid: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub target_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub source_branch: String,
    #[serde(default, deserialize_with = "flexible_id")]
    pub target_project_id: String,
    #[serde(default, deserialize_with = "flexible_id")]
    pub source_project_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub last_commit: HookCommit,
    #[serde(default, deserialize_with = "nullable")]
    pub source: HookProject,
    #[serde(default, deserialize_with = "nullable")]
    pub target: HookProject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookPullRequestRef {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub repo: HookRepository,
}

/// The `pull_request` block of a Gitea-style event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookPullRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub merged: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub user: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub head: HookPullRequestRef,
    #[serde(default, deserialize_with = "nullable")]
    pub base: HookPullRequestRef,
}

/// Merge request (pull request) events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestHook {
    #[serde(default, deserialize_with = "nullable")]
    pub object_kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub git_commit_no: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub project: HookProject,
    #[serde(default, deserialize_with = "nullable")]
    pub merge_request: MergeRequest,
    #[serde(default, deserialize_with = "nullable")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub pull_request: HookPullRequest,
    #[serde(default, deserialize_with = "nullable")]
    pub sender: HookUser,
    #[serde(default, deserialize_with = "nullable")]
    pub repository: HookRepository,
    /// Label objects (`{"title": …}`) or plain strings.
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Release {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable")]
    pub draft: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub prerelease: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub target_commitish: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseHook {
    #[serde(default, deserialize_with = "nullable")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub repository: types::Repository,
    #[serde(default, deserialize_with = "nullable")]
    pub sender: types::User,
    #[serde(default, deserialize_with = "nullable")]
    pub release: Release,
}
