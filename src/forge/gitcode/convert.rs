//! Conversions from GitCode API shapes to domain types, plus the URL cleanup
//! GitCode payloads need.

use url::Url;

use super::types;
use crate::forge::ForgeError;
use crate::model::ForgeRemoteId;
use crate::model::Perm;
use crate::model::PullRequest;
use crate::model::Repo;
use crate::model::Team;
use crate::model::User;

/// Convert an API repository. `base` is the forge web URL used for fallbacks.
pub fn to_repo(from: &types::Repository, base: &str) -> Repo {
    let base = base.trim_end_matches('/');
    let full_name = if from.full_name.is_empty() {
        match (from.namespace.path.as_str(), from.path.as_str()) {
            ("", _) | (_, "") => String::new(),
            (owner, path) => format!("{owner}/{path}"),
        }
    } else {
        from.full_name.clone()
    };

    let (mut owner, mut name) = match full_name.split_once('/') {
        Some((owner, rest)) => (
            owner.to_string(),
            rest.split('/').next().unwrap_or_default().to_string(),
        ),
        None => (String::new(), String::new()),
    };
    if owner.is_empty() {
        owner.clone_from(&from.namespace.path);
    }
    if name.is_empty() {
        name.clone_from(&from.name);
    }

    let forge_url = first_non_empty(&[from.web_url.as_str(), from.html_url.as_str()])
        .map_or_else(|| format!("{base}/{full_name}"), dedupe_url);
    let clone = non_empty(&from.http_url_to_repo)
        .map_or_else(|| format!("{base}/{full_name}.git"), dedupe_url);
    let clone_ssh = non_empty(&from.ssh_url_to_repo).map_or_else(
        || format!("git@{}:{full_name}.git", host_of(base)),
        dedupe_url,
    );

    Repo {
        forge_remote_id: ForgeRemoteId::new(from.id.clone()),
        owner,
        name,
        full_name,
        avatar: expand_avatar(base, &from.creator.photo),
        forge_url,
        clone,
        clone_ssh,
        branch: from.default_branch.clone(),
        is_scm_private: from.private,
        perm: Some(Perm {
            pull: from.permission.pull,
            push: from.permission.push,
            admin: from.permission.admin,
        }),
    }
}

/// Convert the account behind a token. Token fields are left for the caller.
pub fn to_user(from: &types::User, base: &str) -> User {
    User {
        login: from.login.clone(),
        email: from.email.clone(),
        avatar: expand_avatar(base, &from.avatar_url),
        forge_remote_id: ForgeRemoteId::new(from.id.clone()),
        ..User::default()
    }
}

pub fn to_team(from: &types::Organization, base: &str) -> Team {
    let login = non_empty(&from.login).unwrap_or(&from.name);
    Team {
        login: login.to_string(),
        avatar: expand_avatar(base, &from.avatar_url),
    }
}

pub fn to_pull_request(from: &types::PullRequest) -> PullRequest {
    PullRequest {
        index: ForgeRemoteId::new(from.number.to_string()),
        title: from.title.clone(),
    }
}

/// Make an avatar URL absolute.
///
/// - empty stays empty
/// - `http…` is returned unchanged
/// - `//host/x` becomes `https://host/x`
/// - `/x` is resolved against the scheme and host of `base`
/// - anything else is appended to `base`
pub fn expand_avatar(base: &str, avatar: &str) -> String {
    if avatar.is_empty() {
        return String::new();
    }
    if avatar.starts_with("http") {
        return avatar.to_string();
    }
    if let Some(rest) = avatar.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if avatar.starts_with('/') {
        return Url::parse(base)
            .and_then(|base| base.join(avatar))
            .map_or_else(|_| avatar.to_string(), String::from);
    }
    format!("{}/{avatar}", base.trim_end_matches('/'))
}

/// Repair the avatar URLs GitCode sometimes emits with doubled slashes.
pub fn fix_malformed_avatar(url: &str) -> String {
    if let Some(index) = url.find("///") {
        return url[index + 1..].to_string();
    }
    if url.contains("//avatars/") {
        return url.replace("//avatars/", "/avatars/");
    }
    url.to_string()
}

/// Collapse a URL that repeats its `scheme://host` prefix, and a doubled
/// `.git` suffix, both of which show up in GitCode webhook payloads.
///
/// `https://gitcode.com/https://gitcode.com/o/r` becomes
/// `https://gitcode.com/o/r`.
pub fn dedupe_url(url: &str) -> String {
    let last_scheme = [url.rfind("https://"), url.rfind("http://")]
        .into_iter()
        .flatten()
        .max();
    let mut url = match last_scheme {
        Some(index) if index > 0 => &url[index..],
        _ => url,
    };
    while let Some(stripped) = url.strip_suffix(".git.git") {
        url = &url[..stripped.len() + ".git".len()];
    }
    url.to_string()
}

/// Host (with port, if any) of an HTTP(S) or scp-style SSH clone URL.
pub fn clone_host(clone: &str) -> Result<String, ForgeError> {
    if let Ok(url) = Url::parse(clone)
        && let Some(host) = url.host_str()
    {
        return Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        });
    }

    // scp-like syntax: [user@]host:path
    if let Some((user_host, _)) = clone.split_once(':') {
        let host = user_host.rsplit('@').next().unwrap_or_default();
        if !host.is_empty() && !host.contains('/') {
            return Ok(host.to_string());
        }
    }

    Err(ForgeError::InvalidUrl {
        url: clone.to_string(),
        reason: "no host in clone URL".to_string(),
    })
}

/// Host part of a URL string, or the input itself when it does not parse.
fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

pub(crate) fn first_non_empty<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|s| !s.is_empty())
}
