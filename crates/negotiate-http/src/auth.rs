use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Per-user passwords and per-group shared secrets the gateway checks
/// requests against. Users prove themselves with an HMAC over the
/// payload; servers present their group's secret in the clear.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    user_passwords: HashMap<u64, String>,
    group_secrets: HashMap<u64, String>,
}

impl Credentials {
    pub fn new(user_passwords: HashMap<u64, String>, group_secrets: HashMap<u64, String>) -> Self {
        Self {
            user_passwords,
            group_secrets,
        }
    }

    /// Constant-time check of a user's MAC over `payload`. Unknown users
    /// fail closed.
    pub fn verify_user_mac(&self, user: u64, payload: &[u8], mac: &[u8]) -> bool {
        let Some(password) = self.user_passwords.get(&user) else {
            return false;
        };
        let mut verifier =
            HmacSha256::new_from_slice(password.as_bytes()).expect("invalid hmac key");
        verifier.update(payload);
        verifier.verify_slice(mac).is_ok()
    }

    pub fn verify_group_secret(&self, group: u64, secret: &str) -> bool {
        self.group_secrets
            .get(&group)
            .map(|expected| expected == secret)
            .unwrap_or(false)
    }
}

/// MAC a payload the way the gateway expects: HMAC-SHA256 keyed by the
/// user's password.
pub fn sign(password: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(password.as_bytes()).expect("invalid hmac key");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}
