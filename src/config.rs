use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub fcm: FcmConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// Path to the Google service-account key file (JSON).
    pub credentials_path: String,
    /// Overrides the `project_id` from the key file when set.
    pub project_id: Option<String>,
    /// Timeout for gateway requests, in seconds.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the trigger endpoints
    pub trigger_per_second: u32,
    /// Burst size for the trigger endpoints
    pub trigger_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "4000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            fcm: FcmConfig {
                credentials_path: env::var("FCM_CREDENTIALS_PATH")
                    .unwrap_or_else(|_| "service-account.json".to_string()),
                project_id: env::var("FCM_PROJECT_ID").ok(),
                request_timeout_seconds: env::var("FCM_REQUEST_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            rate_limit: RateLimitConfig {
                trigger_per_second: env::var("RATE_LIMIT_TRIGGER_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                trigger_burst: env::var("RATE_LIMIT_TRIGGER_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
                frontend_url: "http://localhost:3000".to_string(),
            },
            fcm: FcmConfig {
                credentials_path: "service-account.json".to_string(),
                project_id: None,
                request_timeout_seconds: 30,
            },
            rate_limit: RateLimitConfig {
                trigger_per_second: 10,
                trigger_burst: 50,
            },
        }
    }
}
