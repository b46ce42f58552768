use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::task;
use tracing::warn;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
    #[error("Invalid bcrypt cost: {0}")]
    InvalidCost(u32),
}

/// Salted bcrypt password hashing.
///
/// Every bcrypt call runs on the blocking pool so request workers stay free.
pub struct PasswordHasher {
    cost: u32,
    // Hash verified against when the username is unknown, so the failure path
    // costs the same as a wrong password.
    decoy: Arc<OnceLock<Option<String>>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, CryptoError> {
        if !(4..=31).contains(&cost) {
            return Err(CryptoError::InvalidCost(cost));
        }
        if cost < 10 {
            warn!(cost, "bcrypt cost below 10 is only suitable for tests");
        }

        Ok(Self {
            cost,
            decoy: Arc::new(OnceLock::new()),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String, CryptoError> {
        let password = password.to_string();
        let cost = self.cost;
        task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))?
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))
    }

    /// Constant-time check of `password` against a stored hash.
    ///
    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        match task::spawn_blocking(move || bcrypt::verify(password, &stored_hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Password verification task failed");
                false
            }
        }
    }

    /// Spend one verification without a real account.
    pub async fn verify_decoy(&self, password: &str) {
        let password = password.to_string();
        let cost = self.cost;
        let decoy = Arc::clone(&self.decoy);
        let spent = task::spawn_blocking(move || {
            let hash = decoy.get_or_init(|| bcrypt::hash("decoy-password", cost).ok());
            if let Some(hash) = hash {
                let _ = bcrypt::verify(password, hash);
            }
        })
        .await;
        if let Err(e) = spent {
            warn!(error = %e, "Decoy verification task failed");
        }
    }
}

/// Byte comparison whose running time depends only on the lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Content digest recorded alongside stored evidence.
pub fn sha256_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256:{:x}", digest)
}
