//! OAuth2 authorization code flow against GitCode.

use http::Method;
use serde::Deserialize;
use tracing::debug;
use url::Url;
use url::form_urlencoded;

use super::transport::ApiRequest;
use super::transport::RequestBody;
use super::transport::Transport;
use crate::forge::ForgeError;

/// Tokens are treated as expired this many seconds early.
pub const EXPIRY_LEEWAY_SECS: i64 = 10;

/// An access token as issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp; `0` when the forge did not say.
    pub expiry: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client credentials and endpoints for one OAuth application.
pub struct OAuthClient<'a, T> {
    transport: &'a T,
    web_url: &'a Url,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: Option<String>,
}

impl<'a, T: Transport> OAuthClient<'a, T> {
    /// `oauth_host` is the CI host's public URL; the callback is
    /// `{oauth_host}/authorize`. An empty host sends no redirect URI.
    pub fn new(
        transport: &'a T,
        web_url: &'a Url,
        client_id: &'a str,
        client_secret: &'a str,
        oauth_host: &str,
    ) -> Self {
        let redirect_uri = if oauth_host.is_empty() {
            None
        } else {
            Some(format!("{}/authorize", oauth_host.trim_end_matches('/')))
        };
        Self {
            transport,
            web_url,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// URL of the forge's consent page for `state`.
    pub fn authorize_url(&self, state: &str) -> Result<Url, ForgeError> {
        let mut url = self.oauth_endpoint("authorize")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("client_id", self.client_id);
            if let Some(redirect_uri) = &self.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }
            pairs.append_pair("response_type", "code");
            if !state.is_empty() {
                pairs.append_pair("state", state);
            }
        }
        Ok(url)
    }

    /// Trade an authorization code for a token.
    pub async fn exchange_code(&self, code: &str, now: i64) -> Result<Token, ForgeError> {
        let mut params = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(redirect_uri) = &self.redirect_uri {
            params.push(("redirect_uri", redirect_uri.as_str()));
        }
        self.request_token(&params, now).await
    }

    /// Trade a refresh token for a new token.
    pub async fn refresh(&self, refresh_token: &str, now: i64) -> Result<Token, ForgeError> {
        self.request_token(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            now,
        )
        .await
    }

    async fn request_token(&self, params: &[(&str, &str)], now: i64) -> Result<Token, ForgeError> {
        let url = self.oauth_endpoint("token")?;
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().copied())
            .append_pair("client_id", self.client_id)
            .append_pair("client_secret", self.client_secret)
            .finish();

        debug!(endpoint = %url.path(), "requesting OAuth token");
        let response = self
            .transport
            .send(ApiRequest {
                method: Method::POST,
                url,
                body: Some(RequestBody::form(body)),
            })
            .await?;

        let parsed: Option<TokenResponse> = serde_json::from_slice(&response.body).ok();
        if let Some(TokenResponse {
            error: Some(error),
            error_description,
            ..
        }) = &parsed
        {
            let message = match error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            return Err(ForgeError::OAuth { message });
        }
        if !response.status.is_success() {
            return Err(ForgeError::OAuth {
                message: format!("token endpoint returned {}: {}", response.status, response.text()),
            });
        }

        let parsed = parsed.ok_or_else(|| ForgeError::OAuth {
            message: "token endpoint returned an unreadable response".to_string(),
        })?;
        if parsed.access_token.is_empty() {
            return Err(ForgeError::OAuth {
                message: "token endpoint returned no access token".to_string(),
            });
        }

        Ok(Token {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token.unwrap_or_default(),
            expiry: parsed
                .expires_in
                .filter(|secs| *secs > 0)
                .map_or(0, |secs| now.saturating_add(secs)),
        })
    }

    fn oauth_endpoint(&self, name: &str) -> Result<Url, ForgeError> {
        let mut url = self.web_url.clone();
        url.path_segments_mut()
            .map_err(|()| ForgeError::InvalidUrl {
                url: self.web_url.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["oauth", name]);
        Ok(url)
    }
}

/// Whether a token expiring at `expiry` should be refreshed at `now`.
pub fn is_expired(expiry: i64, now: i64) -> bool {
    expiry > 0 && expiry <= now.saturating_add(EXPIRY_LEEWAY_SECS)
}
