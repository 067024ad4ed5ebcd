//! OAuth token cache (authorization-code and refresh-token grants)

use super::{CredentialError, CredentialProvider};
use arf_common::config::SfmcConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cap on the lifetime the token endpoint may grant (one day)
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// OAuth client registration and authentication base URL
#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl From<&SfmcConfig> for OAuthSettings {
    fn from(config: &SfmcConfig) -> Self {
        Self {
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    organization: Organization,
}

#[derive(Debug, Deserialize)]
struct Organization {
    enterprise_id: f64,
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: String,
    refresh_token: String,
    expires_at: Option<Instant>,
}

impl TokenState {
    fn current(&self) -> Option<&str> {
        match self.expires_at {
            Some(at) if Instant::now() < at && !self.access_token.is_empty() => {
                Some(&self.access_token)
            }
            _ => None,
        }
    }

    fn apply(&mut self, response: TokenResponse) {
        self.access_token = response.access_token;
        if !response.refresh_token.is_empty() {
            self.refresh_token = response.refresh_token;
        }
        let lifetime = Duration::from_secs(response.expires_in).min(MAX_TOKEN_LIFETIME);
        self.expires_at = Some(Instant::now() + lifetime);
    }
}

enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

/// Process-wide access/refresh token holder
pub struct TokenCache {
    http: reqwest::Client,
    settings: OAuthSettings,
    state: Mutex<TokenState>,
}

impl TokenCache {
    pub fn new(http: reqwest::Client, settings: OAuthSettings) -> Self {
        Self {
            http,
            settings,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Browser redirect target that starts the authorization-code flow
    pub fn authorize_url(&self) -> Result<String, CredentialError> {
        let base = format!("{}/v2/authorize", self.settings.auth_url);
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| CredentialError::Parse(format!("authorization URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens and store them
    pub async fn exchange_code(&self, code: &str) -> Result<(), CredentialError> {
        let mut state = self.state.lock().await;
        let response = self.request_tokens(Grant::AuthorizationCode(code)).await?;
        state.apply(response);
        info!("Authorization code exchanged for tokens");
        Ok(())
    }

    /// Whether an authorization has happened (a refresh token is held)
    pub async fn is_authorized(&self) -> bool {
        !self.state.lock().await.refresh_token.is_empty()
    }

    /// Enterprise (parent business unit) id of the logged-in user
    pub async fn enterprise_id(&self) -> Result<String, CredentialError> {
        let token = self.token().await?;
        let url = format!("{}/v2/userinfo", self.settings.auth_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::Status(status.as_u16()));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| CredentialError::Parse(e.to_string()))?;

        let enterprise_id = format!("{:.0}", info.organization.enterprise_id);
        debug!(enterprise_id = %enterprise_id, "Resolved enterprise id");
        Ok(enterprise_id)
    }

    async fn request_tokens(&self, grant: Grant<'_>) -> Result<TokenResponse, CredentialError> {
        let mut body = json!({
            "client_id": self.settings.client_id,
            "client_secret": self.settings.client_secret,
            "redirect_uri": self.settings.redirect_uri,
        });
        match grant {
            Grant::AuthorizationCode(code) => {
                body["grant_type"] = json!("authorization_code");
                body["code"] = json!(code);
            }
            Grant::RefreshToken(refresh_token) => {
                body["grant_type"] = json!("refresh_token");
                body["refresh_token"] = json!(refresh_token);
            }
        }

        let url = format!("{}/v2/token", self.settings.auth_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected request");
            return Err(CredentialError::Status(status.as_u16()));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CredentialProvider for TokenCache {
    async fn token(&self) -> Result<String, CredentialError> {
        // Held across the refresh so concurrent callers wait for one refresh
        let mut state = self.state.lock().await;

        if let Some(token) = state.current() {
            return Ok(token.to_string());
        }

        if state.refresh_token.is_empty() {
            return Err(CredentialError::NoRefreshToken);
        }

        debug!("Access token expired, refreshing");
        let refresh_token = state.refresh_token.clone();
        let response = self.request_tokens(Grant::RefreshToken(&refresh_token)).await?;
        state.apply(response);
        Ok(state.access_token.clone())
    }

    async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        *state = TokenState::default();
        info!("Tokens invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TokenCache {
        TokenCache::new(
            reqwest::Client::new(),
            OAuthSettings {
                auth_url: "https://auth.example.test".to_string(),
                client_id: "client id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://app.example.test/".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn token_without_login_is_rejected() {
        let err = cache().token().await.unwrap_err();
        assert!(matches!(err, CredentialError::NoRefreshToken));
    }

    #[tokio::test]
    async fn unexpired_token_is_served_from_state() {
        let cache = cache();
        cache.state.lock().await.apply(TokenResponse {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            expires_in: 600,
        });
        assert_eq!(cache.token().await.unwrap(), "abc");
        assert!(cache.is_authorized().await);
    }

    #[tokio::test]
    async fn invalidate_clears_everything() {
        let cache = cache();
        cache.state.lock().await.apply(TokenResponse {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            expires_in: 600,
        });
        cache.invalidate().await;
        assert!(!cache.is_authorized().await);
        assert!(matches!(
            cache.token().await.unwrap_err(),
            CredentialError::NoRefreshToken
        ));
    }

    #[tokio::test]
    async fn absurd_lifetime_is_capped() {
        let cache = cache();
        cache.state.lock().await.apply(TokenResponse {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            expires_in: u64::MAX,
        });
        assert_eq!(cache.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .and(body_partial_json(json!({ "grant_type": "authorization_code", "code": "code-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a",
                "refresh_token": "r1",
                "expires_in": 0
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .and(body_partial_json(json!({ "grant_type": "refresh_token", "refresh_token": "r1" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "b", "expires_in": 600 }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(
            reqwest::Client::new(),
            OAuthSettings {
                auth_url: server.uri(),
                client_id: "client-123".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost/".to_string(),
            },
        );
        cache.exchange_code("code-1").await.unwrap();

        let (first, second, third) = tokio::join!(cache.token(), cache.token(), cache.token());

        assert_eq!(first.unwrap(), "b");
        assert_eq!(second.unwrap(), "b");
        assert_eq!(third.unwrap(), "b");
        // Refresh grant kept the old refresh token
        assert!(cache.is_authorized().await);
        server.verify().await;
    }

    #[test]
    fn authorize_url_encodes_parameters() {
        let url = cache().authorize_url().unwrap();
        assert!(url.starts_with("https://auth.example.test/v2/authorize?response_type=code"));
        assert!(url.contains("client_id=client+id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.test%2F"));
    }
}
