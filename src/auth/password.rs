use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use secrecy::{ExposeSecret, SecretString};
use tracing::error;

use crate::{
    config::PasswordConfig,
    error::{AppError, AppResult},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password policy: at least [`MIN_PASSWORD_LENGTH`] characters.
pub fn check_policy(password: &SecretString) -> AppResult<()> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::WeakPassword);
    }
    Ok(())
}

/// Hashes and verifies passwords with a configured Argon2id work factor.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
    // verified against when the account does not exist, so both login paths cost the same
    dummy_hash: String,
}

impl CredentialManager {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let filler: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(filler.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("argon2 dummy hash: {e}"))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }

    /// Hash a password. Fails with `WeakPassword` below the minimum length.
    pub fn hash(&self, password: &SecretString) -> AppResult<String> {
        check_policy(password)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AppError::Internal(anyhow::anyhow!(e.to_string()))
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `CorruptCredential` only if the stored hash cannot be parsed.
    pub fn verify(&self, hash: &str, candidate: &SecretString) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AppError::CorruptCredential
        })?;
        Ok(self
            .argon2
            .verify_password(candidate.expose_secret().as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CredentialManager {
        CredentialManager::new(&fast_config()).expect("valid params")
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let creds = manager();
        for password in ["Secur3P@ssw0rd!", "12345678", "pässwörd-ünïcode"] {
            let hash = creds.hash(&secret(password)).expect("hashing should succeed");
            assert!(creds.verify(&hash, &secret(password)).expect("verify should succeed"));
        }
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let creds = manager();
        let hash = creds
            .hash(&secret("correct-horse-battery-staple"))
            .expect("hashing should succeed");
        assert!(!creds
            .verify(&hash, &secret("wrong-password"))
            .expect("verify should not error"));
    }

    #[test]
    fn hash_embeds_algorithm_and_salt() {
        let creds = manager();
        let a = creds.hash(&secret("password123")).unwrap();
        let b = creds.hash(&secret("password123")).unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn short_passwords_are_weak() {
        let creds = manager();
        assert!(matches!(
            creds.hash(&secret("short")),
            Err(AppError::WeakPassword)
        ));
        assert!(matches!(creds.hash(&secret("")), Err(AppError::WeakPassword)));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let creds = manager();
        assert!(matches!(
            creds.verify("not-a-valid-hash", &secret("anything")),
            Err(AppError::CorruptCredential)
        ));
    }

    #[test]
    fn hashes_from_other_work_factors_still_verify() {
        let strong = CredentialManager::new(&PasswordConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash(&secret("password123")).unwrap();
        assert!(manager().verify(&hash, &secret("password123")).unwrap());
    }

    #[test]
    fn dummy_hash_never_matches_user_input() {
        let creds = manager();
        assert!(!creds
            .verify(creds.dummy_hash(), &secret("password123"))
            .unwrap());
    }
}
