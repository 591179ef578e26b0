//! GitCode REST API v5 client.
//!
//! Authentication is the `access_token` query parameter. Path segments are
//! percent-encoded, so branch names and file paths may contain any character.

use http::Method;
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::warn;
use url::Url;

use super::transport::ApiRequest;
use super::transport::ApiResponse;
use super::transport::RequestBody;
use super::transport::Transport;
use super::types;
use crate::forge::ForgeError;

/// A GitCode API client bound to one access token.
pub struct GitCodeClient<'a, T> {
    transport: &'a T,
    api_url: &'a Url,
    token: String,
}

impl<'a, T: Transport> GitCodeClient<'a, T> {
    pub fn new(transport: &'a T, api_url: &'a Url, token: impl Into<String>) -> Self {
        Self {
            transport,
            api_url,
            token: token.into(),
        }
    }

    /// The account the token belongs to.
    pub async fn get_user(&self) -> Result<types::User, ForgeError> {
        let user: types::User = self.get(&["user"], &[]).await?;
        debug!(login = %user.login, "fetched GitCode user");
        Ok(user)
    }

    /// One page of the user's repositories, most recently updated first.
    pub async fn get_user_repos(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<types::Repository>, ForgeError> {
        let repos: Vec<types::Repository> = self
            .get(
                &["user", "repos"],
                &[
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                ],
            )
            .await?;
        debug!(page, count = repos.len(), "fetched GitCode repositories");
        Ok(repos)
    }

    /// One page of the organisations the user belongs to.
    pub async fn get_user_orgs(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<types::Organization>, ForgeError> {
        self.get(&["user", "orgs"], &paging(page, per_page)).await
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<types::Repository, ForgeError> {
        self.get(&["repos", owner, repo], &[]).await
    }

    pub async fn get_branches(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<types::Branch>, ForgeError> {
        self.get(&["repos", owner, repo, "branches"], &paging(page, per_page))
            .await
    }

    pub async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<types::Branch, ForgeError> {
        self.get(&["repos", owner, repo, "branches", branch], &[])
            .await
    }

    pub async fn get_tags(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<types::Tag>, ForgeError> {
        self.get(&["repos", owner, repo, "tags"], &paging(page, per_page))
            .await
    }

    /// One page of open pull requests.
    pub async fn get_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<types::PullRequest>, ForgeError> {
        let mut query = paging(page, per_page);
        query.push(("state", "open".to_string()));
        self.get(&["repos", owner, repo, "pulls"], &query).await
    }

    /// Files touched by a pull request.
    pub async fn get_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<types::PullRequestFile>, ForgeError> {
        let number = number.to_string();
        self.get(&["repos", owner, repo, "pulls", &number, "files"], &[])
            .await
    }

    /// Raw bytes of a file at `git_ref`. An empty ref means the default branch.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, ForgeError> {
        let mut segments = vec!["repos", owner, repo, "raw"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let query = if git_ref.is_empty() {
            Vec::new()
        } else {
            vec![("ref", git_ref.to_string())]
        };

        let url = self.endpoint(&segments, &query)?;
        let response = self.execute(Method::GET, url, None).await?;
        Ok(response.body)
    }

    pub async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<types::Tree, ForgeError> {
        let query = if recursive {
            vec![("recursive", "1".to_string())]
        } else {
            Vec::new()
        };
        self.get(&["repos", owner, repo, "git", "trees", sha], &query)
            .await
    }

    pub async fn create_hook(
        &self,
        owner: &str,
        repo: &str,
        hook: &types::CreateHookRequest,
    ) -> Result<types::Hook, ForgeError> {
        self.post(&["repos", owner, repo, "hooks"], hook).await
    }

    pub async fn get_hooks(&self, owner: &str, repo: &str) -> Result<Vec<types::Hook>, ForgeError> {
        self.get(&["repos", owner, repo, "hooks"], &[]).await
    }

    pub async fn delete_hook(&self, owner: &str, repo: &str, hook_id: &str) -> Result<(), ForgeError> {
        let url = self.endpoint(&["repos", owner, repo, "hooks", hook_id], &[])?;
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn get<R: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<R, ForgeError> {
        let url = self.endpoint(segments, query)?;
        let endpoint = url.path().to_string();
        let response = self.execute(Method::GET, url, None).await?;
        decode(&endpoint, &response)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<R, ForgeError> {
        let url = self.endpoint(segments, &[])?;
        let endpoint = url.path().to_string();
        let bytes = serde_json::to_vec(body).map_err(|source| ForgeError::Decode {
            endpoint: endpoint.clone(),
            source,
        })?;
        let response = self
            .execute(Method::POST, url, Some(RequestBody::json(bytes)))
            .await?;
        decode(&endpoint, &response)
    }

    /// Send a request and turn HTTP error statuses into errors.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
    ) -> Result<ApiResponse, ForgeError> {
        let endpoint = url.path().to_string();
        debug!(%method, endpoint = %endpoint, "GitCode API request");

        let response = self
            .transport
            .send(ApiRequest {
                method: method.clone(),
                url,
                body,
            })
            .await?;

        if response.status.is_client_error() || response.status.is_server_error() {
            let message = response.text();
            warn!(
                %method,
                endpoint = %endpoint,
                status = response.status.as_u16(),
                "GitCode API error"
            );
            return Err(status_error(response.status, message));
        }

        Ok(response)
    }

    /// Build `{api_url}/{segments...}?{query}&access_token={token}`.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ForgeError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ForgeError::InvalidUrl {
                url: self.api_url.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() || !self.token.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if !self.token.is_empty() {
                pairs.append_pair("access_token", &self.token);
            }
        }

        Ok(url)
    }
}

fn paging(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("per_page", per_page.to_string())]
}

fn decode<R: DeserializeOwned>(endpoint: &str, response: &ApiResponse) -> Result<R, ForgeError> {
    serde_json::from_slice(&response.body).map_err(|source| {
        warn!(endpoint, error = %source, "failed to decode GitCode API response");
        ForgeError::Decode {
            endpoint: endpoint.to_string(),
            source,
        }
    })
}

fn status_error(status: StatusCode, message: String) -> ForgeError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ForgeError::AuthFailed { message };
    }
    ForgeError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Closure-driven transport that records every request it sees.
    pub(crate) struct MockTransport<F: Fn(&ApiRequest) -> ApiResponse + Send + Sync> {
        handler: F,
        pub(crate) requests: Mutex<Vec<ApiRequest>>,
    }

    impl<F> MockTransport<F>
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync,
    {
        pub(crate) fn new(handler: F) -> Self {
            Self {
                handler,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn recorded(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl<F> Transport for MockTransport<F>
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync,
    {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError> {
            let response = (self.handler)(&request);
            self.requests.lock().unwrap().push(request);
            Ok(response)
        }
    }

    pub(crate) fn json_response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn api_url() -> Url {
        Url::parse("https://api.gitcode.com/api/v5").unwrap()
    }

    #[tokio::test]
    async fn token_is_sent_as_query_parameter() {
        let transport = MockTransport::new(|_| json_response(200, r#"{"id":1,"login":"alice"}"#));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "secret-token");

        let user = client.get_user().await.unwrap();
        assert_eq!(user.login, "alice");

        let requests = transport.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(
            requests[0].url.as_str(),
            "https://api.gitcode.com/api/v5/user?access_token=secret-token"
        );
    }

    #[tokio::test]
    async fn empty_token_sends_no_query() {
        let transport = MockTransport::new(|_| json_response(200, r#"{"login":"anon"}"#));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        client.get_user().await.unwrap();
        assert_eq!(
            transport.recorded()[0].url.as_str(),
            "https://api.gitcode.com/api/v5/user"
        );
    }

    #[tokio::test]
    async fn repos_query_includes_paging_and_sort() {
        let transport = MockTransport::new(|_| json_response(200, "[]"));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "t");

        let repos = client.get_user_repos(3, 50).await.unwrap();
        assert!(repos.is_empty());

        let url = &transport.recorded()[0].url;
        assert_eq!(url.path(), "/api/v5/user/repos");
        assert_eq!(
            url.query(),
            Some("page=3&per_page=50&sort=updated&direction=desc&access_token=t")
        );
    }

    #[tokio::test]
    async fn branch_names_are_percent_encoded() {
        let transport =
            MockTransport::new(|_| json_response(200, r#"{"name":"feature/x","commit":{"sha":"abc"}}"#));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        let branch = client.get_branch("alice", "widgets", "feature/x").await.unwrap();
        assert_eq!(branch.commit.head_sha(), "abc");
        assert_eq!(
            transport.recorded()[0].url.path(),
            "/api/v5/repos/alice/widgets/branches/feature%2Fx"
        );
    }

    #[tokio::test]
    async fn file_content_keeps_path_separators() {
        let transport = MockTransport::new(|_| json_response(200, "steps: []"));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        let data = client
            .get_file_content("alice", "widgets", ".woodpecker/build.yaml", "main")
            .await
            .unwrap();
        assert_eq!(data, b"steps: []");

        let url = &transport.recorded()[0].url;
        assert_eq!(url.path(), "/api/v5/repos/alice/widgets/raw/.woodpecker/build.yaml");
        assert_eq!(url.query(), Some("ref=main"));
    }

    #[tokio::test]
    async fn not_found_maps_to_api_error() {
        let transport = MockTransport::new(|_| json_response(404, r#"{"message":"Not Found"}"#));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        let err = client.get_repo("alice", "missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_failed() {
        let transport = MockTransport::new(|_| json_response(401, "bad token"));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "expired");

        let err = client.get_user().await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthFailed { ref message } if message == "bad token"));
    }

    #[tokio::test]
    async fn invalid_json_is_decode_error() {
        let transport = MockTransport::new(|_| json_response(200, "<html>"));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        let err = client.get_user().await.unwrap_err();
        assert!(matches!(err, ForgeError::Decode { ref endpoint, .. } if endpoint == "/api/v5/user"));
    }

    #[tokio::test]
    async fn create_hook_posts_json() {
        let transport = MockTransport::new(|_| {
            json_response(200, r#"{"id":17,"url":"https://ci.example.com/hook","active":true}"#)
        });
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "t");

        let request = types::CreateHookRequest {
            url: "https://ci.example.com/hook".to_string(),
            content_type: "json".to_string(),
            events: vec!["push".to_string()],
            active: true,
        };
        let hook = client.create_hook("alice", "widgets", &request).await.unwrap();
        assert_eq!(hook.id, "17");

        let recorded = transport.recorded();
        assert_eq!(recorded[0].method, Method::POST);
        let body = recorded[0].body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        let sent: serde_json::Value = serde_json::from_slice(&body.bytes).unwrap();
        assert_eq!(sent["url"], "https://ci.example.com/hook");
    }

    #[tokio::test]
    async fn delete_hook_uses_delete() {
        let transport = MockTransport::new(|_| json_response(204, ""));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        client.delete_hook("alice", "widgets", "17").await.unwrap();
        let recorded = transport.recorded();
        assert_eq!(recorded[0].method, Method::DELETE);
        assert_eq!(recorded[0].url.path(), "/api/v5/repos/alice/widgets/hooks/17");
    }

    #[tokio::test]
    async fn recursive_tree_query() {
        let transport = MockTransport::new(|_| json_response(200, r#"{"tree":[]}"#));
        let api = api_url();
        let client = GitCodeClient::new(&transport, &api, "");

        client.get_tree("alice", "widgets", "abc", true).await.unwrap();
        let url = &transport.recorded()[0].url;
        assert_eq!(url.path(), "/api/v5/repos/alice/widgets/git/trees/abc");
        assert_eq!(url.query(), Some("recursive=1"));
    }
}
