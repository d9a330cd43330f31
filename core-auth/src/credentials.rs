//! Client credentials grant against the Microsoft identity platform.
//!
//! ```no_run
//! # use core_auth::{ClientCredentials, ClientCredentialsProvider, TokenProvider};
//! # use bridge_traits::http::HttpClient;
//! # use std::sync::Arc;
//! # async fn example(http_client: Arc<dyn HttpClient>) -> core_auth::Result<()> {
//! let provider = ClientCredentialsProvider::new(ClientCredentials::from_env()?, http_client);
//! let token = provider.access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, ClientCredentials};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are renewed this many seconds before they expire.
const REFRESH_BUFFER_SECONDS: i64 = 300;

/// Source of bearer tokens for Graph requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid access token, acquiring one if needed.
    async fn access_token(&self) -> Result<String>;
}

/// Acquires app-only tokens with the OAuth 2.0 client credentials grant.
///
/// Tokens are cached in memory and reused until they are within five minutes
/// of expiry. Concurrent callers share one in-flight acquisition.
pub struct ClientCredentialsProvider {
    credentials: ClientCredentials,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    authority_host: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(credentials: ClientCredentials, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            credentials,
            http_client,
            clock: Arc::new(SystemClock),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            scope: GRAPH_DEFAULT_SCOPE.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Use a custom clock (for deterministic expiry in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the authority host, e.g. for sovereign clouds.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Token endpoint for the configured directory.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.credentials.directory_id
        )
    }

    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    async fn request_token(&self) -> Result<AccessToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let encoded_body = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.token_url())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded_body));

        let issued_at = self.clock.now();
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error: TokenErrorResponse = response.json().unwrap_or_default();
            let reason = error
                .error_description
                .unwrap_or_else(|| format!("token endpoint returned {}", status));

            warn!(
                status = status,
                error = error.error.as_deref().unwrap_or("unknown"),
                "Token acquisition failed"
            );

            return Err(match error.error.as_deref() {
                Some("invalid_client") | Some("unauthorized_client") => {
                    AuthError::InvalidClient(reason)
                }
                _ if response.is_server_error() => {
                    AuthError::NetworkError(format!("{}: {}", status, reason))
                }
                _ => AuthError::AuthenticationFailed { status, reason },
            });
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "Acquired app-only access token");

        Ok(AccessToken::new(token.access_token, issued_at, token.expires_in))
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired_at(self.clock.now(), REFRESH_BUFFER_SECONDS) {
                return Ok(token.secret.clone());
            }
            debug!("Cached access token is about to expire, renewing");
        }

        let token = self.request_token().await?;
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self(StdMutex::new(now))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn credentials() -> ClientCredentials {
        ClientCredentials::new("app-id", "s3cr3t", "contoso-tenant")
    }

    #[test]
    fn test_token_url_uses_directory() {
        let provider =
            ClientCredentialsProvider::new(credentials(), Arc::new(MockHttpClient::new()));

        assert_eq!(
            provider.token_url(),
            "https://login.microsoftonline.com/contoso-tenant/oauth2/v2.0/token"
        );

        let sovereign = ClientCredentialsProvider::new(credentials(), Arc::new(MockHttpClient::new()))
            .with_authority_host("https://login.microsoftonline.us/");
        assert!(sovereign
            .token_url()
            .starts_with("https://login.microsoftonline.us/contoso-tenant/"));
    }

    #[tokio::test]
    async fn test_posts_client_credentials_form() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|request| {
                let body = request
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).to_string())
                    .unwrap_or_default();
                request.method == HttpMethod::Post
                    && request.url.ends_with("/contoso-tenant/oauth2/v2.0/token")
                    && body.contains("grant_type=client_credentials")
                    && body.contains("client_id=app-id")
                    && body.contains("client_secret=s3cr3t")
                    && body.contains("scope=https%3A%2F%2Fgraph.microsoft.com%2F.default")
            })
            .returning(|_| Ok(response(200, r#"{"access_token":"tok-1","expires_in":3600}"#)));

        let provider = ClientCredentialsProvider::new(credentials(), Arc::new(http));

        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_caches_until_refresh_buffer() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::at(issued));
        let calls = Arc::new(StdMutex::new(0));

        let mut http = MockHttpClient::new();
        let counter = calls.clone();
        http.expect_execute().times(2).returning(move |_| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            Ok(response(
                200,
                &format!(r#"{{"access_token":"tok-{}","expires_in":3600}}"#, *n),
            ))
        });

        let provider =
            ClientCredentialsProvider::new(credentials(), Arc::new(http)).with_clock(clock.clone());

        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        clock.advance(Duration::minutes(30));
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        clock.advance(Duration::minutes(26));
        assert_eq!(provider.access_token().await.unwrap(), "tok-2");
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_client_is_reported() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(response(
                401,
                r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
            ))
        });

        let provider = ClientCredentialsProvider::new(credentials(), Arc::new(http));
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidClient(ref msg) if msg.contains("AADSTS7000215")));
        assert!(err.is_credential_rejection());
    }

    #[tokio::test]
    async fn test_other_rejections_are_authentication_failures() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(400, r#"{"error":"invalid_scope"}"#)));

        let provider = ClientCredentialsProvider::new(credentials(), Arc::new(http));
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::AuthenticationFailed { status: 400, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Err(BridgeError::Timeout("token endpoint".to_string())));

        let provider = ClientCredentialsProvider::new(credentials(), Arc::new(http));
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(err, AuthError::NetworkError(_)));
        assert!(!err.is_credential_rejection());
    }

    #[tokio::test]
    async fn test_unparsable_success_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(200, "<html>proxy login</html>")));

        let provider = ClientCredentialsProvider::new(credentials(), Arc::new(http));

        assert!(matches!(
            provider.access_token().await,
            Err(AuthError::Other(_))
        ));
    }
}
