//! Serde structs for GitCode API v5 responses and requests.
//!
//! GitCode returns `null` for many unset fields and is inconsistent about
//! whether ids are numbers or strings, so most fields go through
//! `nullable` and `flexible_id`.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// Deserialize `null` as `T::default()`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an id that may be a number, a string or `null` into a string.
pub(crate) fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Uint(u64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Int(n)) => n.to_string(),
        Some(RawId::Uint(n)) => n.to_string(),
        Some(RawId::Text(s)) => s,
        None => String::new(),
    })
}

/// The account behind an access token, or a webhook sender.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Namespace {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Creator {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub nickname: String,
    #[serde(default, deserialize_with = "nullable")]
    pub photo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// Permissions of the authenticated user on a repository.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Permission {
    #[serde(default, deserialize_with = "nullable")]
    pub pull: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub push: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub admin: bool,
}

/// A repository from `/user/repos` or `/repos/{owner}/{repo}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub namespace: Namespace,
    #[serde(default, deserialize_with = "nullable")]
    pub ssh_url_to_repo: String,
    #[serde(default, deserialize_with = "nullable")]
    pub http_url_to_repo: String,
    #[serde(default, deserialize_with = "nullable")]
    pub web_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub creator: Creator,
    #[serde(default, deserialize_with = "nullable")]
    pub owner: Owner,
    #[serde(default, deserialize_with = "nullable")]
    pub default_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fork: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub private: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub permission: Permission,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitRef {
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
}

impl CommitRef {
    /// GitCode fills either `sha` or `id` depending on the endpoint.
    pub fn head_sha(&self) -> &str {
        if self.sha.is_empty() {
            &self.id
        } else {
            &self.sha
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequest {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub head: PullRequestRef,
    #[serde(default, deserialize_with = "nullable")]
    pub base: PullRequestRef,
}

/// One entry of `/pulls/{number}/files`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestFile {
    #[serde(default, deserialize_with = "nullable")]
    pub filename: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hook {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub events: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateHookRequest {
    pub url: String,
    pub content_type: String,
    pub events: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tree {
    #[serde(default, deserialize_with = "nullable")]
    pub tree: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeEntry {
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// `"blob"` or `"tree"`.
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}
