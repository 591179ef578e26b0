//! GitCode implementation of the `Forge` trait.

pub mod client;
pub mod convert;
pub mod hook;
pub mod oauth;
pub mod payload;
pub mod transport;
pub mod types;

use std::future::Future;

use futures::StreamExt;
use futures::stream;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use self::client::GitCodeClient;
use self::convert::first_non_empty;
use self::oauth::OAuthClient;
use self::transport::ReqwestTransport;
use self::transport::Transport;
use super::Forge;
use super::ForgeError;
use crate::config::ForgeConfig;
use crate::model::Commit;
use crate::model::FileMeta;
use crate::model::ForgeRemoteId;
use crate::model::ForgeType;
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
use crate::model::WebhookEvent;
use crate::paginate::paginate;

/// Branch used when neither the pipeline nor the repository names one.
const DEFAULT_BRANCH: &str = "main";

/// Events every registered webhook subscribes to.
const HOOK_EVENTS: [&str; 3] = ["push", "pull_request", "release"];

/// Upper bound on file downloads in flight while listing a directory.
const MAX_CONCURRENT_FETCHES: usize = 8;

/// A GitCode forge.
pub struct GitCode<T = ReqwestTransport> {
    config: ForgeConfig,
    web_url: Url,
    api_url: Url,
    transport: T,
}

impl GitCode<ReqwestTransport> {
    /// Create a forge that talks HTTP through `reqwest`.
    pub fn new(config: ForgeConfig) -> Result<Self, ForgeError> {
        let transport = ReqwestTransport::new(config.skip_verify)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> GitCode<T> {
    pub fn with_transport(config: ForgeConfig, transport: T) -> Result<Self, ForgeError> {
        let web_url = parse_url(&config.url)?;
        let api_url = parse_url(&config.api_url)?;
        Ok(Self {
            config,
            web_url,
            api_url,
            transport,
        })
    }

    fn client(&self, token: &str) -> GitCodeClient<'_, T> {
        GitCodeClient::new(&self.transport, &self.api_url, token)
    }

    fn oauth(&self) -> OAuthClient<'_, T> {
        OAuthClient::new(
            &self.transport,
            &self.web_url,
            &self.config.client_id,
            &self.config.client_secret,
            &self.config.oauth_host,
        )
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn page_size(&self) -> u32 {
        self.config.page_size.max(1)
    }

    /// Run `fetch` for the page `opts` asks for, or for every page.
    async fn list<I, F, Fut>(&self, opts: &ListOptions, mut fetch: F) -> Result<Vec<I>, ForgeError>
    where
        F: FnMut(u32, u32) -> Fut,
        Fut: Future<Output = Result<Vec<I>, ForgeError>>,
    {
        if opts.all {
            let per_page = self.page_size();
            return paginate(|page| fetch(page, per_page), per_page, None).await;
        }
        let per_page = if opts.per_page == 0 {
            self.page_size()
        } else {
            opts.per_page
        };
        fetch(opts.page.max(1), per_page).await
    }

    async fn all_repos(
        &self,
        client: &GitCodeClient<'_, T>,
    ) -> Result<Vec<types::Repository>, ForgeError> {
        let per_page = self.page_size();
        paginate(
            |page| client.get_user_repos(page, per_page),
            per_page,
            None,
        )
        .await
    }

    /// The commit to read files at: the pipeline's, else the head of the
    /// repository branch.
    async fn resolve_commit(
        &self,
        client: &GitCodeClient<'_, T>,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<String, ForgeError> {
        if !pipeline.commit.is_empty() {
            return Ok(pipeline.commit.clone());
        }
        let branch = first_non_empty(&[repo.branch.as_str()]).unwrap_or(DEFAULT_BRANCH);
        let branch = client.get_branch(&repo.owner, &repo.name, branch).await?;
        Ok(branch.commit.head_sha().to_string())
    }

    async fn tag_commit(
        &self,
        client: &GitCodeClient<'_, T>,
        repo: &Repo,
        tag: &str,
    ) -> Result<String, ForgeError> {
        let per_page = self.page_size();
        let tags = paginate(
            |page| client.get_tags(&repo.owner, &repo.name, page, per_page),
            per_page,
            None,
        )
        .await?;
        tags.iter()
            .find(|t| t.name == tag)
            .map(|t| t.commit.head_sha().to_string())
            .ok_or_else(|| ForgeError::NotFound {
                what: format!("tag '{tag}' in {}", repo.full_name),
            })
    }
}

impl<T: Transport> Forge for GitCode<T> {
    fn name(&self) -> &'static str {
        "gitcode"
    }

    fn url(&self) -> &str {
        self.base()
    }

    async fn login(&self, req: &OAuthRequest) -> Result<(Option<User>, String), ForgeError> {
        let oauth = self.oauth();
        let redirect = oauth.authorize_url(&req.state)?.to_string();
        if req.code.is_empty() {
            return Ok((None, redirect));
        }

        let token = oauth.exchange_code(&req.code, now()).await?;
        let account = self.client(&token.access_token).get_user().await?;
        let mut user = convert::to_user(&account, self.base());
        user.access_token = token.access_token;
        user.refresh_token = token.refresh_token;
        user.expiry = token.expiry;
        info!(login = %user.login, "GitCode login complete");

        Ok((Some(user), redirect))
    }

    async fn auth(&self, token: &str, _secret: &str) -> Result<String, ForgeError> {
        let user = self.client(token).get_user().await?;
        if user.login.is_empty() {
            return Err(ForgeError::AuthFailed {
                message: "token does not belong to a user".to_string(),
            });
        }
        Ok(user.login)
    }

    async fn refresh(&self, user: &mut User) -> Result<bool, ForgeError> {
        let now = now();
        if user.refresh_token.is_empty() || !oauth::is_expired(user.expiry, now) {
            return Ok(false);
        }

        let token = self.oauth().refresh(&user.refresh_token, now).await?;
        user.access_token = token.access_token;
        if !token.refresh_token.is_empty() {
            user.refresh_token = token.refresh_token;
        }
        user.expiry = token.expiry;
        debug!(login = %user.login, expiry = user.expiry, "refreshed GitCode token");
        Ok(true)
    }

    async fn teams(&self, user: &User) -> Result<Vec<Team>, ForgeError> {
        let client = self.client(&user.access_token);
        let per_page = self.page_size();
        let orgs = paginate(
            |page| client.get_user_orgs(page, per_page),
            per_page,
            None,
        )
        .await?;
        Ok(orgs
            .iter()
            .map(|org| convert::to_team(org, self.base()))
            .collect())
    }

    fn team_perm(&self, _user: &User, _org: &str) -> Result<Option<Perm>, ForgeError> {
        Ok(None)
    }

    async fn repo(
        &self,
        user: &User,
        remote_id: &ForgeRemoteId,
        owner: &str,
        name: &str,
    ) -> Result<Repo, ForgeError> {
        let client = self.client(&user.access_token);

        // The API has no lookup by id.
        if remote_id.is_valid() {
            let repos = self.all_repos(&client).await?;
            return repos
                .iter()
                .find(|r| r.id == remote_id.as_str())
                .map(|r| convert::to_repo(r, self.base()))
                .ok_or(ForgeError::RepoNotFound);
        }

        let repo = client
            .get_repo(owner, name)
            .await
            .map_err(repo_not_found)?;
        Ok(convert::to_repo(&repo, self.base()))
    }

    async fn repos(&self, user: &User) -> Result<Vec<Repo>, ForgeError> {
        debug!(login = %user.login, "listing GitCode repositories");
        let client = self.client(&user.access_token);
        let repos = self.all_repos(&client).await?;
        Ok(repos
            .iter()
            .map(|r| convert::to_repo(r, self.base()))
            .collect())
    }

    async fn file(
        &self,
        user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> Result<Vec<u8>, ForgeError> {
        let git_ref = first_non_empty(&[pipeline.commit.as_str(), repo.branch.as_str()])
            .unwrap_or(DEFAULT_BRANCH);
        self.client(&user.access_token)
            .get_file_content(&repo.owner, &repo.name, path, git_ref)
            .await
            .map_err(|err| match err {
                ForgeError::Api { status: 404, .. } => ForgeError::ConfigNotFound {
                    configs: vec![path.to_string()],
                },
                other => other,
            })
    }

    async fn dir(
        &self,
        user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> Result<Vec<FileMeta>, ForgeError> {
        let client = self.client(&user.access_token);

        let sha = match self.resolve_commit(&client, repo, pipeline).await {
            Ok(sha) => sha,
            Err(err) => {
                warn!(repo = %repo.full_name, error = %err, "could not resolve commit for directory listing");
                return Ok(Vec::new());
            }
        };
        let tree = match client.get_tree(&repo.owner, &repo.name, &sha, true).await {
            Ok(tree) => tree,
            Err(err) => {
                warn!(repo = %repo.full_name, %sha, error = %err, "could not fetch tree");
                return Ok(Vec::new());
            }
        };

        let paths = entries_in_dir(&tree.tree, path);
        let client = &client;
        let sha = sha.as_str();
        let fetches = paths.into_iter().map(|file| async move {
            let result = client
                .get_file_content(&repo.owner, &repo.name, &file, sha)
                .await;
            (file, result)
        });

        let results: Vec<_> = stream::iter(fetches)
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;
        Ok(results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(data) => Some(FileMeta { name, data }),
                Err(err) => {
                    warn!(file = %name, error = %err, "skipping file that could not be fetched");
                    None
                }
            })
            .collect())
    }

    async fn status(
        &self,
        _user: &User,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<(), ForgeError> {
        debug!(
            repo = %repo.full_name,
            commit = %pipeline.commit,
            "GitCode has no commit status API, skipping status report"
        );
        Ok(())
    }

    fn netrc(&self, user: Option<&User>, repo: &Repo) -> Result<Netrc, ForgeError> {
        let (login, password) = user.map_or_else(Default::default, |u| {
            (u.login.clone(), u.access_token.clone())
        });
        Ok(Netrc {
            machine: convert::clone_host(&repo.clone)?,
            login,
            password,
            forge_type: ForgeType::GitCode,
        })
    }

    async fn activate(&self, user: &User, repo: &Repo, link: &str) -> Result<(), ForgeError> {
        let client = self.client(&user.access_token);

        let hooks = client
            .get_hooks(&repo.owner, &repo.name)
            .await
            .map_err(repo_not_found)?;
        if hooks.iter().any(|hook| hook.url == link) {
            debug!(repo = %repo.full_name, "webhook already registered");
            return Ok(());
        }

        let request = types::CreateHookRequest {
            url: link.to_string(),
            content_type: "json".to_string(),
            events: HOOK_EVENTS.iter().map(ToString::to_string).collect(),
            active: true,
        };
        client
            .create_hook(&repo.owner, &repo.name, &request)
            .await
            .map_err(repo_not_found)?;
        info!(repo = %repo.full_name, "registered GitCode webhook");
        Ok(())
    }

    async fn deactivate(&self, user: &User, repo: &Repo, link: &str) -> Result<(), ForgeError> {
        let client = self.client(&user.access_token);

        let hooks = client.get_hooks(&repo.owner, &repo.name).await?;
        let Some(hook) = hooks.iter().find(|hook| hook.url == link) else {
            debug!(repo = %repo.full_name, "no webhook to remove");
            return Ok(());
        };

        client
            .delete_hook(&repo.owner, &repo.name, &hook.id)
            .await?;
        info!(repo = %repo.full_name, hook_id = %hook.id, "removed GitCode webhook");
        Ok(())
    }

    async fn branches(
        &self,
        user: &User,
        repo: &Repo,
        opts: &ListOptions,
    ) -> Result<Vec<String>, ForgeError> {
        let client = self.client(&user.access_token);
        let branches = self
            .list(opts, |page, per_page| {
                client.get_branches(&repo.owner, &repo.name, page, per_page)
            })
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn branch_head(
        &self,
        user: &User,
        repo: &Repo,
        branch: &str,
    ) -> Result<Commit, ForgeError> {
        let branch = self
            .client(&user.access_token)
            .get_branch(&repo.owner, &repo.name, branch)
            .await?;
        let sha = branch.commit.head_sha().to_string();
        Ok(Commit {
            forge_url: format!(
                "{}/{}/{}/commit/{sha}",
                self.base(),
                repo.owner,
                repo.name
            ),
            sha,
        })
    }

    async fn pull_requests(
        &self,
        user: &User,
        repo: &Repo,
        opts: &ListOptions,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let client = self.client(&user.access_token);
        let result = self
            .list(opts, |page, per_page| {
                client.get_pull_requests(&repo.owner, &repo.name, page, per_page)
            })
            .await;

        match result {
            Ok(pulls) => Ok(pulls.iter().map(convert::to_pull_request).collect()),
            // Repositories without commits answer 404.
            Err(ForgeError::Api { status: 404, .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn hook(
        &self,
        request: &http::Request<Vec<u8>>,
        user: Option<&User>,
    ) -> Result<(Repo, Pipeline), ForgeError> {
        let (repo, mut pipeline) = hook::parse_hook(request, self.base(), now())?;
        let Some(user) = user else {
            return Ok((repo, pipeline));
        };
        let client = self.client(&user.access_token);

        if pipeline.event == WebhookEvent::Release && pipeline.commit.is_empty() {
            let tag = pipeline
                .git_ref
                .strip_prefix("refs/tags/")
                .unwrap_or(&pipeline.git_ref)
                .to_string();
            pipeline.commit = self.tag_commit(&client, &repo, &tag).await?;
        }

        if pipeline.event.is_pull_request()
            && pipeline.changed_files.is_empty()
            && let Some(number) = pull_request_number(&pipeline.git_ref)
        {
            match client
                .get_pull_request_files(&repo.owner, &repo.name, number)
                .await
            {
                Ok(files) => {
                    pipeline.changed_files = files.into_iter().map(|f| f.filename).collect();
                }
                Err(err) => {
                    warn!(repo = %repo.full_name, number, error = %err, "could not list pull request files");
                }
            }
        }

        Ok((repo, pipeline))
    }

    async fn org_membership(&self, _user: &User, _org: &str) -> Result<OrgPerm, ForgeError> {
        Ok(OrgPerm::default())
    }

    async fn org(&self, _user: &User, name: &str) -> Result<Org, ForgeError> {
        Ok(Org {
            name: name.to_string(),
            is_user: true,
            private: false,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ForgeError> {
    Url::parse(raw).map_err(|e| ForgeError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn repo_not_found(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::Api { status: 404, .. } => ForgeError::RepoNotFound,
        other => other,
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The number in `refs/pull/{n}/head`.
fn pull_request_number(git_ref: &str) -> Option<u64> {
    git_ref
        .strip_prefix("refs/pull/")?
        .strip_suffix("/head")?
        .parse()
        .ok()
}

/// Paths of the blobs directly inside `dir`. The root is `""` or `"/"`.
pub fn entries_in_dir(entries: &[types::TreeEntry], dir: &str) -> Vec<String> {
    let dir = dir.trim_matches('/');
    entries
        .iter()
        .filter(|entry| entry.is_blob())
        .filter(|entry| {
            let parent = entry.path.rsplit_once('/').map_or("", |(parent, _)| parent);
            parent == dir
        })
        .map(|entry| entry.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::client::tests::MockTransport;
    use super::client::tests::json_response;
    use super::transport::ApiRequest;
    use super::transport::ApiResponse;
    use super::*;

    fn config() -> ForgeConfig {
        ForgeConfig {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            oauth_host: "https://ci.example.com".to_string(),
            page_size: 2,
            ..ForgeConfig::default()
        }
    }

    fn forge<F>(handler: F) -> GitCode<MockTransport<F>>
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync,
    {
        GitCode::with_transport(config(), MockTransport::new(handler)).unwrap()
    }

    fn alice() -> User {
        User {
            login: "alice".to_string(),
            access_token: "tok".to_string(),
            ..User::default()
        }
    }

    fn widgets() -> Repo {
        Repo {
            owner: "alice".to_string(),
            name: "widgets".to_string(),
            full_name: "alice/widgets".to_string(),
            clone: "https://gitcode.com/alice/widgets.git".to_string(),
            branch: "develop".to_string(),
            ..Repo::default()
        }
    }

    fn query(req: &ApiRequest, key: &str) -> Option<String> {
        req.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn page(req: &ApiRequest) -> u32 {
        query(req, "page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    #[test]
    fn name_and_url() {
        let forge = forge(|_| json_response(200, "{}"));
        assert_eq!(forge.name(), "gitcode");
        assert_eq!(forge.url(), "https://gitcode.com");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let config = ForgeConfig {
            url: "not a url".to_string(),
            ..ForgeConfig::default()
        };
        let result = GitCode::with_transport(config, MockTransport::new(|_| json_response(200, "{}")));
        assert!(matches!(result, Err(ForgeError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn login_without_code_returns_redirect() {
        let forge = forge(|_| panic!("no request expected"));
        let (user, redirect) = forge
            .login(&OAuthRequest {
                code: String::new(),
                state: "st".to_string(),
            })
            .await
            .unwrap();

        assert!(user.is_none());
        assert!(redirect.starts_with("https://gitcode.com/oauth/authorize?"));
        assert!(redirect.contains("state=st"));
    }

    #[tokio::test]
    async fn login_with_code_exchanges_and_fetches_user() {
        let forge = forge(|req| match req.url.path() {
            "/oauth/token" => json_response(
                200,
                r#"{"access_token":"at","refresh_token":"rt","expires_in":7200}"#,
            ),
            "/api/v5/user" => {
                assert_eq!(query(req, "access_token").as_deref(), Some("at"));
                json_response(
                    200,
                    r#"{"id":42,"login":"alice","email":"a@example.com","avatar_url":"/a.png"}"#,
                )
            }
            other => panic!("unexpected path {other}"),
        });

        let (user, _) = forge
            .login(&OAuthRequest {
                code: "code".to_string(),
                state: String::new(),
            })
            .await
            .unwrap();
        let user = user.unwrap();

        assert_eq!(user.login, "alice");
        assert_eq!(user.forge_remote_id.as_str(), "42");
        assert_eq!(user.avatar, "https://gitcode.com/a.png");
        assert_eq!(user.access_token, "at");
        assert_eq!(user.refresh_token, "rt");
        assert!(user.expiry > 0);
    }

    #[tokio::test]
    async fn auth_returns_login() {
        let forge = forge(|_| json_response(200, r#"{"login":"alice"}"#));
        assert_eq!(forge.auth("tok", "").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn auth_rejects_bad_token() {
        let forge = forge(|_| json_response(401, r#"{"message":"401 Unauthorized"}"#));
        let err = forge.auth("bad", "").await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn refresh_skips_fresh_tokens() {
        let forge = forge(|_| panic!("no request expected"));
        let mut user = User {
            refresh_token: "rt".to_string(),
            expiry: now() + 3600,
            ..alice()
        };
        assert!(!forge.refresh(&mut user).await.unwrap());

        let mut no_refresh = User {
            expiry: 1,
            ..alice()
        };
        assert!(!forge.refresh(&mut no_refresh).await.unwrap());
    }

    #[tokio::test]
    async fn refresh_updates_expired_token() {
        let forge = forge(|_| json_response(200, r#"{"access_token":"new","expires_in":3600}"#));
        let mut user = User {
            refresh_token: "rt".to_string(),
            expiry: 1,
            ..alice()
        };

        assert!(forge.refresh(&mut user).await.unwrap());
        assert_eq!(user.access_token, "new");
        assert_eq!(user.refresh_token, "rt");
        assert!(user.expiry > now());
    }

    #[tokio::test]
    async fn teams_pages_through_orgs() {
        let forge = forge(|req| match page(req) {
            1 => json_response(200, r#"[{"login":"org-a"},{"login":"","name":"Org B"}]"#),
            _ => json_response(200, r#"[{"login":"org-c","avatar_url":"//cdn/c.png"}]"#),
        });
        let teams = forge.teams(&alice()).await.unwrap();

        let logins: Vec<_> = teams.iter().map(|t| t.login.as_str()).collect();
        assert_eq!(logins, vec!["org-a", "Org B", "org-c"]);
        assert_eq!(teams[2].avatar, "https://cdn/c.png");
    }

    #[test]
    fn team_perm_is_unsupported() {
        let forge = forge(|_| json_response(200, "{}"));
        assert_eq!(forge.team_perm(&alice(), "org").unwrap(), None);
    }

    #[tokio::test]
    async fn repo_by_id_scans_all_pages() {
        let forge = forge(|req| {
            assert_eq!(req.url.path(), "/api/v5/user/repos");
            match page(req) {
                1 => json_response(
                    200,
                    r#"[{"id":1,"full_name":"alice/a"},{"id":2,"full_name":"alice/b"}]"#,
                ),
                _ => json_response(200, r#"[{"id":3,"full_name":"alice/c"}]"#),
            }
        });

        let repo = forge
            .repo(&alice(), &ForgeRemoteId::new("3"), "", "")
            .await
            .unwrap();
        assert_eq!(repo.full_name, "alice/c");

        let missing = forge
            .repo(&alice(), &ForgeRemoteId::new("99"), "", "")
            .await
            .unwrap_err();
        assert!(matches!(missing, ForgeError::RepoNotFound));
    }

    #[tokio::test]
    async fn repo_by_name_fetches_directly() {
        let forge = forge(|req| {
            assert_eq!(req.url.path(), "/api/v5/repos/alice/widgets");
            json_response(200, r#"{"id":7,"full_name":"alice/widgets","private":true}"#)
        });
        let repo = forge
            .repo(&alice(), &ForgeRemoteId::new("0"), "alice", "widgets")
            .await
            .unwrap();
        assert_eq!(repo.forge_remote_id.as_str(), "7");
        assert!(repo.is_scm_private);
    }

    #[tokio::test]
    async fn repo_by_name_missing_is_repo_not_found() {
        let forge = forge(|_| json_response(404, r#"{"message":"Not Found"}"#));
        let err = forge
            .repo(&alice(), &ForgeRemoteId::new(""), "alice", "gone")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::RepoNotFound), "got: {err:?}");
    }

    #[tokio::test]
    async fn repos_converts_every_page() {
        let forge = forge(|req| match page(req) {
            1 => json_response(
                200,
                r#"[{"id":1,"full_name":"alice/a"},{"id":2,"full_name":"alice/b"}]"#,
            ),
            _ => json_response(200, "[]"),
        });
        let repos = forge.repos(&alice()).await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[1].clone, "https://gitcode.com/alice/b.git");
    }

    #[tokio::test]
    async fn file_uses_commit_then_branch() {
        let forge = forge(|req| json_response(200, query(req, "ref").unwrap_or_default().as_str()));
        let mut pipeline = Pipeline::new(WebhookEvent::Push);

        let data = forge
            .file(&alice(), &widgets(), &pipeline, ".woodpecker.yaml")
            .await
            .unwrap();
        assert_eq!(data, b"develop");

        pipeline.commit = "abc123".to_string();
        let data = forge
            .file(&alice(), &widgets(), &pipeline, ".woodpecker.yaml")
            .await
            .unwrap();
        assert_eq!(data, b"abc123");

        let requests = forge.transport.recorded();
        assert_eq!(
            requests[0].url.path(),
            "/api/v5/repos/alice/widgets/raw/.woodpecker.yaml"
        );
    }

    #[tokio::test]
    async fn missing_file_is_config_not_found() {
        let forge = forge(|_| json_response(404, "not found"));
        let err = forge
            .file(&alice(), &widgets(), &Pipeline::new(WebhookEvent::Push), ".woodpecker.yaml")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ForgeError::ConfigNotFound { ref configs } if configs == &[".woodpecker.yaml"])
        );
    }

    #[tokio::test]
    async fn dir_fetches_direct_children() {
        let forge = forge(|req| {
            let path = req.url.path();
            if path == "/api/v5/repos/alice/widgets/branches/develop" {
                json_response(200, r#"{"name":"develop","commit":{"sha":"head"}}"#)
            } else if path == "/api/v5/repos/alice/widgets/git/trees/head" {
                assert_eq!(query(req, "recursive").as_deref(), Some("1"));
                json_response(
                    200,
                    r#"{"tree":[
                        {"path":".woodpecker","type":"tree"},
                        {"path":".woodpecker/build.yaml","type":"blob"},
                        {"path":".woodpecker/test.yaml","type":"blob"},
                        {"path":".woodpecker/broken.yaml","type":"blob"},
                        {"path":".woodpecker/nested/deep.yaml","type":"blob"},
                        {"path":"README.md","type":"blob"}
                    ]}"#,
                )
            } else if path.ends_with("broken.yaml") {
                json_response(500, "boom")
            } else {
                assert_eq!(query(req, "ref").as_deref(), Some("head"));
                json_response(200, "steps: []")
            }
        });

        let mut files = forge
            .dir(&alice(), &widgets(), &Pipeline::new(WebhookEvent::Push), ".woodpecker")
            .await
            .unwrap();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![".woodpecker/build.yaml", ".woodpecker/test.yaml"]
        );
        assert_eq!(files[0].data, b"steps: []");
    }

    #[tokio::test]
    async fn dir_fetches_large_directories_in_order() {
        let tree: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"path":"ci/{i:02}.yaml","type":"blob"}}"#))
            .collect();
        let tree = format!(r#"{{"tree":[{}]}}"#, tree.join(","));
        let forge = forge(move |req| {
            let path = req.url.path();
            if path.ends_with("/branches/develop") {
                json_response(200, r#"{"name":"develop","commit":{"sha":"head"}}"#)
            } else if path.ends_with("/git/trees/head") {
                json_response(200, &tree)
            } else {
                json_response(200, path.rsplit('/').next().unwrap_or_default())
            }
        });

        let files = forge
            .dir(&alice(), &widgets(), &Pipeline::new(WebhookEvent::Push), "ci")
            .await
            .unwrap();

        assert_eq!(files.len(), 20);
        assert_eq!(files[0].name, "ci/00.yaml");
        assert_eq!(files[19].name, "ci/19.yaml");
        assert_eq!(files[19].data, b"19.yaml");
    }

    #[tokio::test]
    async fn dir_without_branch_is_empty() {
        let forge = forge(|_| json_response(404, "no branch"));
        let files = forge
            .dir(&alice(), &widgets(), &Pipeline::new(WebhookEvent::Push), ".woodpecker")
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn status_is_noop() {
        let forge = forge(|_| panic!("no request expected"));
        forge
            .status(&alice(), &widgets(), &Pipeline::new(WebhookEvent::Push))
            .await
            .unwrap();
    }

    #[test]
    fn netrc_uses_clone_host_and_token() {
        let forge = forge(|_| json_response(200, "{}"));
        let netrc = forge.netrc(Some(&alice()), &widgets()).unwrap();
        assert_eq!(netrc.machine, "gitcode.com");
        assert_eq!(netrc.login, "alice");
        assert_eq!(netrc.password, "tok");
        assert_eq!(netrc.forge_type, ForgeType::GitCode);

        let anonymous = forge.netrc(None, &widgets()).unwrap();
        assert_eq!(anonymous.login, "");
        assert_eq!(anonymous.password, "");
    }

    #[tokio::test]
    async fn activate_creates_hook() {
        let forge = forge(|req| {
            if req.method == Method::GET {
                json_response(200, r#"[{"id":1,"url":"https://other.example.com/hook"}]"#)
            } else {
                json_response(201, r#"{"id":2,"url":"https://ci.example.com/hook"}"#)
            }
        });
        forge
            .activate(&alice(), &widgets(), "https://ci.example.com/hook")
            .await
            .unwrap();

        let requests = forge.transport.recorded();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::POST);
        let body: serde_json::Value =
            serde_json::from_slice(&requests[1].body.as_ref().unwrap().bytes).unwrap();
        assert_eq!(body["url"], "https://ci.example.com/hook");
        assert_eq!(body["content_type"], "json");
        assert_eq!(
            body["events"],
            serde_json::json!(["push", "pull_request", "release"])
        );
        assert_eq!(body["active"], true);
    }

    #[tokio::test]
    async fn activate_skips_existing_hook() {
        let forge = forge(|_| json_response(200, r#"[{"id":1,"url":"https://ci.example.com/hook"}]"#));
        forge
            .activate(&alice(), &widgets(), "https://ci.example.com/hook")
            .await
            .unwrap();
        assert_eq!(forge.transport.recorded().len(), 1);
    }

    #[tokio::test]
    async fn activate_on_missing_repo() {
        let forge = forge(|_| json_response(404, "not found"));
        let err = forge
            .activate(&alice(), &widgets(), "https://ci.example.com/hook")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::RepoNotFound));
    }

    #[tokio::test]
    async fn deactivate_deletes_matching_hook() {
        let forge = forge(|req| {
            if req.method == Method::GET {
                json_response(
                    200,
                    r#"[{"id":1,"url":"https://other.example.com/hook"},
                        {"id":"9","url":"https://ci.example.com/hook"}]"#,
                )
            } else {
                json_response(204, "")
            }
        });
        forge
            .deactivate(&alice(), &widgets(), "https://ci.example.com/hook")
            .await
            .unwrap();

        let requests = forge.transport.recorded();
        assert_eq!(requests[1].method, Method::DELETE);
        assert_eq!(
            requests[1].url.path(),
            "/api/v5/repos/alice/widgets/hooks/9"
        );
    }

    #[tokio::test]
    async fn deactivate_without_matching_hook_deletes_nothing() {
        let forge = forge(|req| {
            assert_eq!(req.method, Method::GET, "no DELETE expected");
            json_response(200, r#"[{"id":1,"url":"https://other.example.com/hook"}]"#)
        });
        forge
            .deactivate(&alice(), &widgets(), "https://ci.example.com/hook")
            .await
            .unwrap();
        assert_eq!(forge.transport.recorded().len(), 1);
    }

    #[tokio::test]
    async fn branches_single_page_and_all() {
        let forge = forge(|req| match page(req) {
            1 => json_response(200, r#"[{"name":"main"},{"name":"develop"}]"#),
            _ => json_response(200, r#"[{"name":"feature"}]"#),
        });

        let first = forge
            .branches(&alice(), &widgets(), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(first, vec!["main", "develop"]);

        let all = forge
            .branches(
                &alice(),
                &widgets(),
                &ListOptions {
                    all: true,
                    ..ListOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all, vec!["main", "develop", "feature"]);
    }

    #[tokio::test]
    async fn branch_head_links_commit() {
        let forge = forge(|_| json_response(200, r#"{"name":"main","commit":{"id":"cafe"}}"#));
        let commit = forge.branch_head(&alice(), &widgets(), "main").await.unwrap();
        assert_eq!(commit.sha, "cafe");
        assert_eq!(
            commit.forge_url,
            "https://gitcode.com/alice/widgets/commit/cafe"
        );
    }

    #[tokio::test]
    async fn pull_requests_on_empty_repo() {
        let forge = forge(|_| json_response(404, "empty repository"));
        let pulls = forge
            .pull_requests(&alice(), &widgets(), &ListOptions::default())
            .await
            .unwrap();
        assert!(pulls.is_empty());
    }

    #[tokio::test]
    async fn pull_requests_are_converted() {
        let forge = forge(|req| {
            assert_eq!(query(req, "state").as_deref(), Some("open"));
            json_response(200, r#"[{"number":4,"title":"Fix it"}]"#)
        });
        let pulls = forge
            .pull_requests(&alice(), &widgets(), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(pulls[0].index.as_str(), "4");
        assert_eq!(pulls[0].title, "Fix it");
    }

    #[tokio::test]
    async fn pull_requests_all_pages_through() {
        let forge = forge(|req| match page(req) {
            1 => json_response(200, r#"[{"number":1,"title":"a"},{"number":2,"title":"b"}]"#),
            2 => json_response(200, r#"[{"number":3,"title":"c"}]"#),
            other => panic!("unexpected page {other}"),
        });
        let pulls = forge
            .pull_requests(
                &alice(),
                &widgets(),
                &ListOptions {
                    all: true,
                    ..ListOptions::default()
                },
            )
            .await
            .unwrap();

        let numbers: Vec<_> = pulls.iter().map(|p| p.index.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
        assert_eq!(forge.transport.recorded().len(), 2);
    }

    fn webhook(event: &str, body: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method("POST")
            .header(hook::HOOK_EVENT, event)
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    #[tokio::test]
    async fn release_hook_gets_tag_commit() {
        let forge = forge(|req| {
            assert_eq!(req.url.path(), "/api/v5/repos/alice/widgets/tags");
            match page(req) {
                1 => json_response(
                    200,
                    r#"[{"name":"v0.9.0","commit":{"sha":"t0"}},{"name":"v1.0.0","commit":{"sha":"t1"}}]"#,
                ),
                _ => json_response(200, r#"[{"name":"v2.0.0","commit":{"sha":"t2"}}]"#),
            }
        });
        let body = r#"{
          "action": "published",
          "repository": {"id": 5, "full_name": "alice/widgets"},
          "sender": {"login": "alice"},
          "release": {"tag_name": "v2.0.0"}
        }"#;

        let (_, pipeline) = forge
            .hook(&webhook("Release Hook", body), Some(&alice()))
            .await
            .unwrap();
        assert_eq!(pipeline.commit, "t2");

        let (_, anonymous) = forge
            .hook(&webhook("Release Hook", body), None)
            .await
            .unwrap();
        assert_eq!(anonymous.commit, "");
    }

    #[tokio::test]
    async fn release_hook_with_unknown_tag_is_not_found() {
        let forge = forge(|_| json_response(200, r#"[{"name":"v1.0.0","commit":{"sha":"t1"}}]"#));
        let body = r#"{
          "repository": {"id": 5, "full_name": "alice/widgets"},
          "release": {"tag_name": "v9.9.9"}
        }"#;

        let err = forge
            .hook(&webhook("Release Hook", body), Some(&alice()))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::NotFound { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn gitea_style_pull_request_hook_gets_changed_files() {
        let forge = forge(|req| {
            assert_eq!(req.url.path(), "/api/v5/repos/alice/widgets/pulls/7/files");
            json_response(200, r#"[{"filename":"build.rs"}]"#)
        });
        let body = r#"{
          "action": "opened",
          "number": 7,
          "pull_request": {"number": 7, "title": "t",
                           "head": {"ref": "fast", "sha": "ffff"},
                           "base": {"ref": "main"}},
          "repository": {"id": 5, "full_name": "alice/widgets"},
          "sender": {"login": "carol"}
        }"#;

        let (_, pipeline) = forge
            .hook(&webhook("pull_request", body), Some(&alice()))
            .await
            .unwrap();
        assert_eq!(pipeline.git_ref, "refs/pull/7/head");
        assert_eq!(pipeline.changed_files, vec!["build.rs"]);
    }

    #[tokio::test]
    async fn pull_request_hook_gets_changed_files() {
        let forge = forge(|req| {
            assert_eq!(
                req.url.path(),
                "/api/v5/repos/alice/widgets/pulls/12/files"
            );
            json_response(200, r#"[{"filename":"src/lib.rs"},{"filename":"README.md"}]"#)
        });
        let body = r#"{
          "project": {"path_with_namespace": "alice/widgets",
                      "web_url": "https://gitcode.com/alice/widgets"},
          "merge_request": {"iid": 12, "action": "open", "title": "t",
                            "source_branch": "f", "target_branch": "main",
                            "last_commit": {"id": "abc"}}
        }"#;

        let (_, pipeline) = forge
            .hook(&webhook("Merge Request Hook", body), Some(&alice()))
            .await
            .unwrap();
        assert_eq!(pipeline.changed_files, vec!["src/lib.rs", "README.md"]);
    }

    #[tokio::test]
    async fn pull_request_file_errors_are_not_fatal() {
        let forge = forge(|_| json_response(500, "boom"));
        let body = r#"{
          "project": {"path_with_namespace": "alice/widgets",
                      "web_url": "https://gitcode.com/alice/widgets"},
          "merge_request": {"iid": 3, "action": "update"}
        }"#;

        let (_, pipeline) = forge
            .hook(&webhook("merge_request", body), Some(&alice()))
            .await
            .unwrap();
        assert!(pipeline.changed_files.is_empty());
    }

    #[tokio::test]
    async fn org_defaults() {
        let forge = forge(|_| panic!("no request expected"));
        assert_eq!(
            forge.org_membership(&alice(), "acme").await.unwrap(),
            OrgPerm::default()
        );
        let org = forge.org(&alice(), "acme").await.unwrap();
        assert_eq!(org.name, "acme");
        assert!(org.is_user);
        assert!(!org.private);
    }

    #[test]
    fn entries_in_dir_keeps_direct_blobs() {
        let entry = |path: &str, kind: &str| types::TreeEntry {
            path: path.to_string(),
            kind: kind.to_string(),
            ..types::TreeEntry::default()
        };
        let tree = vec![
            entry("a.yaml", "blob"),
            entry("ci", "tree"),
            entry("ci/b.yaml", "blob"),
            entry("ci/sub/c.yaml", "blob"),
        ];

        assert_eq!(entries_in_dir(&tree, "ci/"), vec!["ci/b.yaml"]);
        assert_eq!(entries_in_dir(&tree, ""), vec!["a.yaml"]);
    }

    #[test]
    fn pull_request_number_from_ref() {
        assert_eq!(pull_request_number("refs/pull/12/head"), Some(12));
        assert_eq!(pull_request_number("refs/heads/main"), None);
    }
}
