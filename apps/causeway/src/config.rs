use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_group_id: u64,
    pub answer_ttl_seconds: u64,
    /// JSON map of user ID to password, for offerer HMAC checks.
    pub user_passwords_path: Option<String>,
    /// JSON map of group ID to shared secret, for edge-server checks.
    pub group_secrets_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("CAUSEWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            max_group_id: env::var("CAUSEWAY_MAX_GROUP_ID")
                .ok()
                .and_then(|g| g.parse().ok())
                .unwrap_or(3),
            answer_ttl_seconds: env::var("CAUSEWAY_ANSWER_TTL")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(120), // default 2 minutes
            user_passwords_path: env::var("CAUSEWAY_USER_PASSWORDS").ok(),
            group_secrets_path: env::var("CAUSEWAY_GROUP_SECRETS").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            max_group_id: 3,
            answer_ttl_seconds: 120,
            user_passwords_path: None,
            group_secrets_path: None,
        }
    }
}
