use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::FcmConfig;
use crate::error::{AppError, AppResult};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// A single push message: the human-visible banner plus string-typed data
/// fields (FCM rejects numeric or nested values in `data`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Delivery boundary toward the push platform. The coordinator only ever
/// issues a single synchronous attempt per dispatch; retries, if any,
/// belong to the platform itself.
#[async_trait]
pub trait PushGateway: Send + Sync + 'static {
    async fn send(&self, token: &str, message: &PushMessage) -> AppResult<()>;
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    project_id: String,
    private_key: String,
    client_email: String,
    token_uri: String,
}

/// Service-account JWT assertion claims for the OAuth2 token exchange.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: usize,
    exp: usize,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// FCM HTTP v1 client. Authenticates with an RS256-signed service-account
/// assertion exchanged for an OAuth2 access token, cached until shortly
/// before expiry.
pub struct FcmGateway {
    client: reqwest::Client,
    key: ServiceAccountKey,
    project_id: String,
    cached_token: RwLock<Option<CachedToken>>,
}

impl FcmGateway {
    /// Loads the service-account key and verifies it by minting one access
    /// token, so a bad key fails at startup rather than on the first
    /// dispatch.
    pub async fn new(config: &FcmConfig) -> AppResult<Self> {
        let raw = std::fs::read_to_string(&config.credentials_path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read FCM credentials {}: {}",
                config.credentials_path, e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("Invalid FCM credentials file: {}", e)))?;

        let project_id = config
            .project_id
            .clone()
            .unwrap_or_else(|| key.project_id.clone());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Gateway(format!("Failed to create HTTP client: {}", e)))?;

        let gateway = Self {
            client,
            key,
            project_id,
            cached_token: RwLock::new(None),
        };

        gateway.access_token().await?;
        tracing::info!("FCM gateway initialized for project {}", gateway.project_id);

        Ok(gateway)
    }

    fn send_url(&self) -> String {
        format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        )
    }

    /// Returns a cached access token, minting a new one when the cached
    /// token is within 60 seconds of expiry.
    async fn access_token(&self) -> AppResult<String> {
        if let Some(cached) = self.cached_token.read().await.as_ref() {
            if cached.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                return Ok(cached.access_token.clone());
            }
        }

        let minted = self.mint_access_token().await?;
        let access_token = minted.access_token.clone();
        *self.cached_token.write().await = Some(minted);

        Ok(access_token)
    }

    async fn mint_access_token(&self) -> AppResult<CachedToken> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: FCM_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp() as usize,
            exp: (now + chrono::Duration::minutes(60)).timestamp() as usize,
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AppError::Gateway(format!("Invalid service-account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| AppError::Gateway(format!("Failed to sign assertion: {}", e)))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "Token exchange error ({}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid token response: {}", e)))?;

        tracing::debug!("Minted FCM access token, expires in {}s", token.expires_in);

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, token: &str, message: &PushMessage) -> AppResult<()> {
        let access_token = self.access_token().await?;

        let payload = serde_json::json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Failed to reach FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!(
                "FCM API error ({}): {}",
                status, error_text
            )));
        }

        tracing::debug!("FCM message accepted for delivery");
        Ok(())
    }
}
