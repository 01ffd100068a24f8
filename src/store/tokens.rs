use std::collections::HashMap;

use tokio::sync::RwLock;

/// Device-token registry: one token per user, last write wins. Lifetime is
/// tied to the process, like the notification logs.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, user_id: &str, token: &str) {
        self.tokens
            .write()
            .await
            .insert(user_id.to_string(), token.to_string());
    }

    pub async fn get(&self, user_id: &str) -> Option<String> {
        self.tokens.read().await.get(user_id).cloned()
    }
}
