//! Webhook dispatch: turn a GitCode webhook request into a repo and pipeline.

use std::borrow::Cow;
use std::collections::HashSet;

use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::convert;
use super::convert::dedupe_url;
use super::convert::expand_avatar;
use super::convert::first_non_empty;
use super::convert::fix_malformed_avatar;
use super::payload::HookCommit;
use super::payload::HookProject;
use super::payload::HookRepository;
use super::payload::MergeRequest;
use super::payload::PullRequestHook;
use super::payload::PushHook;
use super::payload::ReleaseHook;
use crate::forge::ForgeError;
use crate::model::ForgeRemoteId;
use crate::model::Pipeline;
use crate::model::Repo;
use crate::model::WebhookEvent;

/// Header carrying the event type.
pub const HOOK_EVENT: &str = "X-GitCode-Event";

/// Sent by GitCode instances that still speak the Gitee protocol.
const GITEE_HOOK_EVENT: &str = "X-Gitee-Event";

/// The webhook kinds this forge builds pipelines for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Push,
    TagPush,
    PullRequest,
    Release,
}

impl HookKind {
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "Push Hook" | "push" => Some(Self::Push),
            "Tag Push Hook" | "tag_push" => Some(Self::TagPush),
            "Merge Request Hook" | "merge_request" | "pull_request" => Some(Self::PullRequest),
            "Release Hook" | "release" => Some(Self::Release),
            _ => None,
        }
    }
}

/// The raw event header value, if any.
pub fn event_header(headers: &HeaderMap) -> Option<&str> {
    [HOOK_EVENT, GITEE_HOOK_EVENT]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
}

/// Parse a webhook request.
///
/// `base` is the forge web URL and `now` the current Unix time, used when the
/// payload carries no usable timestamp. Events that describe nothing to build
/// (unknown types, deletions, drafts) yield `ForgeError::IgnoredEvent`.
pub fn parse_hook(
    request: &http::Request<Vec<u8>>,
    base: &str,
    now: i64,
) -> Result<(Repo, Pipeline), ForgeError> {
    let event = event_header(request.headers()).ok_or(ForgeError::MissingEventHeader)?;
    let kind =
        HookKind::from_header(event).ok_or_else(|| ignored(event, "unsupported event type"))?;
    debug!(event, ?kind, "parsing webhook");

    match kind {
        HookKind::Push | HookKind::TagPush => {
            let hook: PushHook = decode(event, request.body())?;
            let is_tag = kind == HookKind::TagPush || hook.git_ref.starts_with("refs/tags/");
            parse_push(event, &hook, is_tag, base, now)
        }
        HookKind::PullRequest => {
            let hook: PullRequestHook = decode(event, request.body())?;
            parse_pull_request(event, &hook, base, now)
        }
        HookKind::Release => {
            let hook: ReleaseHook = decode(event, request.body())?;
            parse_release(event, &hook, base, now)
        }
    }
}

fn decode<T: DeserializeOwned>(event: &str, body: &[u8]) -> Result<T, ForgeError> {
    serde_json::from_slice(body).map_err(|source| ForgeError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

fn ignored(event: &str, reason: impl Into<String>) -> ForgeError {
    ForgeError::IgnoredEvent {
        event: event.to_string(),
        reason: reason.into(),
    }
}

fn parse_push(
    event: &str,
    hook: &PushHook,
    is_tag: bool,
    base: &str,
    now: i64,
) -> Result<(Repo, Pipeline), ForgeError> {
    if is_zero_sha(&hook.after) {
        return Err(ignored(event, "ref was deleted"));
    }

    let mut repo = repo_from_project(&hook.project, &hook.repository, base);
    if !repo.forge_remote_id.is_valid() {
        repo.forge_remote_id = ForgeRemoteId::new(hook.project_id.clone());
    }

    let commit = first_non_empty(&[
        hook.after.as_str(),
        hook.checkout_sha.as_str(),
        hook.git_commit_no.as_str(),
    ])
    .unwrap_or_default()
    .to_string();
    let head = head_commit(hook);

    let mut pipeline = if is_tag {
        let tag = hook
            .git_ref
            .strip_prefix("refs/tags/")
            .unwrap_or(&hook.git_ref);
        let mut pipeline = Pipeline::new(WebhookEvent::Tag);
        pipeline.git_ref = format!("refs/tags/{tag}");
        pipeline.forge_url = format!("{}/src/tag/{tag}", repo.forge_url);
        pipeline.message = format!("created tag {tag}");
        pipeline
    } else {
        let mut pipeline = Pipeline::new(WebhookEvent::Push);
        pipeline.git_ref.clone_from(&hook.git_ref);
        pipeline.branch = hook
            .git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&hook.git_ref)
            .to_string();
        pipeline.message = head
            .map(|c| c.message.as_str())
            .and_then(|m| first_non_empty(&[m]))
            .unwrap_or(&hook.message)
            .to_string();
        pipeline.forge_url = head
            .map(|c| c.url.as_str())
            .and_then(|u| first_non_empty(&[u]))
            .unwrap_or(&repo.forge_url)
            .to_string();
        pipeline.changed_files = changed_files(&hook.commits);
        pipeline
    };

    let head_author = head.map(|c| &c.author);
    let login = first_non_empty(&[
        hook.user_username.as_str(),
        hook.sender.handle(),
        hook.user_name.as_str(),
        head_author.map_or("", |a| a.name.as_str()),
    ])
    .unwrap_or_default();
    pipeline.commit = commit;
    pipeline.author = login.to_string();
    pipeline.sender = login.to_string();
    pipeline.email = first_non_empty(&[
        hook.user_email.as_str(),
        hook.sender.email.as_str(),
        head_author.map_or("", |a| a.email.as_str()),
    ])
    .unwrap_or_default()
    .to_string();
    let avatar = first_non_empty(&[hook.user_avatar.as_str(), hook.sender.avatar_url.as_str()])
        .unwrap_or_default();
    pipeline.avatar = expand_avatar(base, &fix_malformed_avatar(avatar));
    pipeline.timestamp = head.and_then(commit_timestamp).unwrap_or(now);

    Ok((repo, pipeline))
}

/// The commit matching `after`, else the payload's head commit, else the first.
fn head_commit(hook: &PushHook) -> Option<&HookCommit> {
    hook.commits
        .iter()
        .find(|c| !c.id.is_empty() && c.id == hook.after)
        .or_else(|| (!hook.head_commit.id.is_empty()).then_some(&hook.head_commit))
        .or_else(|| hook.commits.first())
}

fn commit_timestamp(commit: &HookCommit) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(&commit.timestamp)
        .ok()
        .map(|t| t.timestamp())
}

fn is_zero_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}

/// Union of added, removed and modified paths, first occurrence wins.
fn changed_files(commits: &[HookCommit]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for commit in commits {
        for file in commit
            .added
            .iter()
            .chain(&commit.removed)
            .chain(&commit.modified)
        {
            if seen.insert(file.as_str()) {
                files.push(file.clone());
            }
        }
    }
    files
}

fn parse_pull_request(
    event: &str,
    hook: &PullRequestHook,
    base: &str,
    now: i64,
) -> Result<(Repo, Pipeline), ForgeError> {
    let mr = merge_request_of(hook)
        .ok_or_else(|| ignored(event, "pull request has no number"))?;
    let mr: &MergeRequest = &mr;
    let user = if hook.user.handle().is_empty() {
        &hook.sender
    } else {
        &hook.user
    };
    let closed_by_action = match mr.action.as_str() {
        "" | "open" | "opened" | "reopen" | "reopened" | "update" | "updated" => false,
        "close" | "closed" | "merge" | "merged" => true,
        other => {
            return Err(ignored(
                event,
                format!("pull request action '{other}' is not handled"),
            ));
        }
    };
    let closed = closed_by_action || matches!(mr.state.as_str(), "closed" | "merged");

    let project = if is_blank(&hook.project) {
        &mr.target
    } else {
        &hook.project
    };
    let mut repo = repo_from_project(project, &hook.repository, base);
    if !repo.forge_remote_id.is_valid() {
        repo.forge_remote_id = ForgeRemoteId::new(mr.target_project_id.clone());
    }

    let mut pipeline = Pipeline::new(if closed {
        WebhookEvent::PullRequestClosed
    } else {
        WebhookEvent::PullRequest
    });
    pipeline.commit = first_non_empty(&[mr.last_commit.id.as_str(), hook.git_commit_no.as_str()])
        .unwrap_or_default()
        .to_string();
    pipeline.git_ref = format!("refs/pull/{}/head", mr.iid);
    pipeline.refspec = format!("{}:{}", mr.source_branch, mr.target_branch);
    pipeline.branch.clone_from(&mr.target_branch);
    pipeline.forge_url = first_non_empty(&[mr.url.as_str()])
        .map_or_else(|| format!("{}/pulls/{}", repo.forge_url, mr.iid), dedupe_url);
    pipeline.title.clone_from(&mr.title);
    pipeline.message.clone_from(&mr.title);
    pipeline.author = first_non_empty(&[mr.author.handle(), user.handle()])
        .unwrap_or_default()
        .to_string();
    pipeline.sender = first_non_empty(&[user.handle(), mr.author.handle()])
        .unwrap_or_default()
        .to_string();
    pipeline.email = first_non_empty(&[
        mr.author.email.as_str(),
        user.email.as_str(),
        mr.last_commit.author.email.as_str(),
    ])
    .unwrap_or_default()
    .to_string();
    let avatar = first_non_empty(&[user.avatar_url.as_str(), mr.author.avatar_url.as_str()])
        .unwrap_or_default();
    pipeline.avatar = expand_avatar(base, &fix_malformed_avatar(avatar));
    pipeline.pr_labels = label_names(&hook.labels);
    pipeline.from_fork = is_set_id(&mr.source_project_id)
        && is_set_id(&mr.target_project_id)
        && mr.source_project_id != mr.target_project_id;
    pipeline.timestamp = commit_timestamp(&mr.last_commit).unwrap_or(now);

    Ok((repo, pipeline))
}

/// The merge request block, or one built from a Gitea-style `pull_request`.
///
/// `None` when neither shape carries a pull request number.
fn merge_request_of(hook: &PullRequestHook) -> Option<Cow<'_, MergeRequest>> {
    if hook.merge_request.iid > 0 {
        return Some(Cow::Borrowed(&hook.merge_request));
    }
    let pr = &hook.pull_request;
    let number = if hook.number > 0 { hook.number } else { pr.number };
    if number == 0 {
        return None;
    }
    let state = if pr.merged { "merged" } else { pr.state.as_str() };
    Some(Cow::Owned(MergeRequest {
        iid: number,
        title: pr.title.clone(),
        state: state.to_string(),
        target_branch: pr.base.git_ref.clone(),
        source_branch: pr.head.git_ref.clone(),
        target_project_id: pr.base.repo.id.clone(),
        source_project_id: pr.head.repo.id.clone(),
        action: hook.action.clone(),
        url: pr.html_url.clone(),
        author: pr.user.clone(),
        last_commit: HookCommit {
            id: pr.head.sha.clone(),
            ..HookCommit::default()
        },
        ..MergeRequest::default()
    }))
}

fn is_set_id(id: &str) -> bool {
    !id.is_empty() && id != "0"
}

/// Label names from either `["bug"]` or `[{"title": "bug"}]`.
fn label_names(labels: &[Value]) -> Vec<String> {
    labels
        .iter()
        .filter_map(|label| match label {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => ["title", "name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_release(
    event: &str,
    hook: &ReleaseHook,
    base: &str,
    now: i64,
) -> Result<(Repo, Pipeline), ForgeError> {
    let release = &hook.release;
    if release.draft {
        return Err(ignored(event, "draft release"));
    }
    if matches!(hook.action.as_str(), "delete" | "deleted") {
        return Err(ignored(event, "release was deleted"));
    }
    if release.tag_name.is_empty() {
        return Err(ignored(event, "release has no tag"));
    }

    let repo = convert::to_repo(&hook.repository, base);
    let tag = &release.tag_name;
    let name = first_non_empty(&[release.name.as_str()]).unwrap_or(tag);

    let mut pipeline = Pipeline::new(WebhookEvent::Release);
    pipeline.git_ref = format!("refs/tags/{tag}");
    pipeline.forge_url = format!(
        "{}/{}/releases/tag/{tag}",
        base.trim_end_matches('/'),
        repo.full_name
    );
    pipeline.branch.clone_from(&repo.branch);
    pipeline.message = format!("created release {name}");
    pipeline.title = name.to_string();
    pipeline.is_prerelease = release.prerelease;
    pipeline.author.clone_from(&hook.sender.login);
    pipeline.sender.clone_from(&hook.sender.login);
    pipeline.email.clone_from(&hook.sender.email);
    pipeline.avatar = expand_avatar(&repo.clone, &fix_malformed_avatar(&hook.sender.avatar_url));
    pipeline.timestamp = now;

    Ok((repo, pipeline))
}

fn is_blank(project: &HookProject) -> bool {
    project.path_with_namespace.is_empty() && project.web_url.is_empty()
}

/// Build the repository a push or merge request hook refers to.
///
/// Prefers the `project` block and falls back to `repository`.
fn repo_from_project(project: &HookProject, fallback: &HookRepository, base: &str) -> Repo {
    let base = base.trim_end_matches('/');
    let web_url = first_non_empty(&[
        project.web_url.as_str(),
        project.homepage.as_str(),
        fallback.html_url.as_str(),
        fallback.homepage.as_str(),
        fallback.url.as_str(),
    ])
    .map(dedupe_url);

    let full_name = first_non_empty(&[
        project.path_with_namespace.as_str(),
        fallback.full_name.as_str(),
    ])
    .map(str::to_string)
    .or_else(|| web_url.as_deref().and_then(path_of))
    .unwrap_or_default();

    let (owner, name) = match full_name.rsplit_once('/') {
        Some((owner, name)) => (owner.to_string(), name.to_string()),
        None => (
            first_non_empty(&[project.namespace.as_str(), fallback.owner.handle()])
                .unwrap_or_default()
                .to_string(),
            first_non_empty(&[project.name.as_str(), fallback.name.as_str()])
                .unwrap_or(&full_name)
                .to_string(),
        ),
    };

    let clone = first_non_empty(&[
        project.git_http_url.as_str(),
        project.http_url.as_str(),
        fallback.clone_url.as_str(),
        fallback.git_http_url.as_str(),
    ])
    .map_or_else(|| format!("{base}/{full_name}.git"), dedupe_url);
    let clone_ssh = first_non_empty(&[
        project.git_ssh_url.as_str(),
        project.ssh_url.as_str(),
        fallback.ssh_url.as_str(),
        fallback.git_ssh_url.as_str(),
    ])
    .map(dedupe_url)
    .unwrap_or_default();

    let is_scm_private = match project.visibility_level.or(fallback.visibility_level) {
        Some(level) => level == 0,
        None => fallback.private,
    };

    Repo {
        forge_remote_id: ForgeRemoteId::new(
            first_non_empty(&[project.id.as_str(), fallback.id.as_str()]).unwrap_or_default(),
        ),
        owner,
        name,
        forge_url: web_url.unwrap_or_else(|| format!("{base}/{full_name}")),
        full_name,
        avatar: expand_avatar(base, &project.avatar_url),
        clone,
        clone_ssh,
        branch: first_non_empty(&[
            project.default_branch.as_str(),
            fallback.default_branch.as_str(),
        ])
        .unwrap_or_default()
        .to_string(),
        is_scm_private,
        perm: None,
    }
}

/// `owner/name` from a repository web URL.
fn path_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let path = url.path().trim_matches('/');
    path.contains('/').then(|| path.to_string())
}
