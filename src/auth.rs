use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::types::{LeadError, Result};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const USER_AGENT: &str = "reddit-lead-aggregator/0.1";

/// Margin subtracted from the advertised lifetime so a token is refreshed
/// before clock skew or request latency can make it arrive expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(value: String, expires_in_secs: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: issued_at + Duration::seconds(expires_in_secs - EXPIRY_MARGIN_SECS),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Cached bearer token for the content API, obtained through the
/// client-credentials exchange. The whole read-check-refresh sequence runs
/// under one lock so concurrent callers can neither double-refresh nor read
/// a token that is already known to be expired.
pub struct TokenCache {
    http: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(StdDuration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, url: &str) -> Self {
        self.token_url = url.to_string();
        self
    }

    /// Returns a bearer token, or the empty string when the API should be
    /// used unauthenticated (no credentials configured, or the token
    /// endpoint failed). Callers must tolerate the unauthenticated mode.
    pub async fn token(&self) -> String {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return token.value().to_string();
            }
            debug!("Cached access token expired, refreshing");
        }

        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                warn!("Reddit credentials not set, using public API");
                return String::new();
            }
        };

        match self.request_token(&client_id, &client_secret).await {
            Ok(response) => {
                let token = CachedToken::new(response.access_token, response.expires_in, Utc::now());
                let value = token.value().to_string();
                *cached = Some(token);
                value
            }
            Err(e) => {
                error!("Failed to obtain Reddit access token: {}", e);
                String::new()
            }
        }
    }

    async fn request_token(&self, client_id: &str, client_secret: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LeadError::General(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}
