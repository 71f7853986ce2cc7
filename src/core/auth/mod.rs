use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Non-authenticated identity used for offline-mode play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineIdentity {
    pub username: String,
    pub uuid: Uuid,
}

impl OfflineIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let uuid = offline_uuid(&username);
        Self { username, uuid }
    }

    /// Offline sessions carry a dummy token.
    pub fn access_token(&self) -> &'static str {
        "0"
    }
}

/// Name-based (MD5, version 3) UUID of `OfflinePlayer:<username>`, matching
/// what servers in offline mode assign to the same name.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}
