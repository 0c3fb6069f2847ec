use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashingError(pub String);

/// Salted Argon2id hashing with the cost factor fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct PasswordCodec {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl PasswordCodec {
    pub fn new(cfg: &PasswordConfig) -> Self {
        Self {
            memory_kib: cfg.memory_kib,
            iterations: cfg.iterations,
            parallelism: cfg.parallelism,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, HashingError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| {
                error!(error = %e, "argon2 params error");
                HashingError(e.to_string())
            })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Salt and cost are embedded in the returned PHC string.
    pub fn hash(&self, plain: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashingError(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `Err` only when `hash` is not a parseable PHC string.
    pub fn verify(&self, hash: &str, plain: &str) -> Result<bool, HashingError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            HashingError(e.to_string())
        })?;
        // parameters come from the hash itself, not from our config
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}
