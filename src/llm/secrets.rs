use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use thiserror::Error;

use crate::utils::trim_line;

pub const VAULT_KEY_ENV: &str = "QUIZGEN_VAULT_KEY";
pub const VAULT_KEY_FILE_ENV: &str = "QUIZGEN_VAULT_KEY_FILE";

const KEY_DERIVATION_CONTEXT: &str = "quizgen 2025-01-01 provider credential vault";
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultKeySource {
    Environment,
    SecretFile,
}

impl VaultKeySource {
    pub fn description(&self) -> &'static str {
        match self {
            VaultKeySource::Environment => "environment variable",
            VaultKeySource::SecretFile => "secret file",
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no vault secret configured; set QUIZGEN_VAULT_KEY or QUIZGEN_VAULT_KEY_FILE")]
    MissingSecret,

    #[error("failed to read vault secret file {path}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored credential is not valid vault ciphertext: {0}")]
    Malformed(String),

    #[error("stored credential could not be decrypted with the configured vault secret")]
    Decrypt,

    #[error("credential encryption failed")]
    Encrypt,
}

/// Encrypts provider credentials at rest with AES-256-GCM.
///
/// The key is derived from a secret injected from outside the application's
/// own configuration (environment or a mounted secret file), never from
/// values that are stored next to the ciphertext.
pub struct Vault {
    cipher: Aes256Gcm,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Vault { .. }")
    }
}

impl Vault {
    pub fn new(secret: &str) -> Result<Self, VaultError> {
        let secret = trim_line(secret).ok_or(VaultError::MissingSecret)?;
        let derived = blake3::derive_key(KEY_DERIVATION_CONTEXT, secret.as_bytes());
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        Ok(Self { cipher })
    }

    pub fn from_env() -> Result<(Self, VaultKeySource), VaultError> {
        let (secret, source) = resolve_secret(
            env::var(VAULT_KEY_ENV).ok(),
            env::var(VAULT_KEY_FILE_ENV).ok(),
        )?;
        Ok((Self::new(&secret)?, source))
    }

    /// Returns `base64(nonce || sealed)`; a fresh nonce is drawn per call.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|err| VaultError::Malformed(err.to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(VaultError::Malformed("ciphertext too short".to_string()));
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| VaultError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|err| VaultError::Malformed(err.to_string()))
    }
}

fn resolve_secret(
    env_value: Option<String>,
    file_path: Option<String>,
) -> Result<(String, VaultKeySource), VaultError> {
    // 1. Environment variable
    if let Some(value) = env_value.as_deref().and_then(trim_line) {
        return Ok((value.to_string(), VaultKeySource::Environment));
    }

    // 2. Secret file (e.g. a secret-manager mount)
    if let Some(path) = file_path.as_deref().and_then(trim_line) {
        let path = PathBuf::from(path);
        let contents = fs::read_to_string(&path).map_err(|source| VaultError::SecretFile {
            path: path.clone(),
            source,
        })?;
        let secret = trim_line(&contents).ok_or(VaultError::MissingSecret)?;
        return Ok((secret.to_string(), VaultKeySource::SecretFile));
    }

    Err(VaultError::MissingSecret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decrypts_what_it_encrypts() {
        let vault = Vault::new("correct horse battery staple").unwrap();
        let sealed = vault.encrypt("sk-live-123").unwrap();

        assert_ne!(sealed, "sk-live-123");
        assert!(!sealed.contains("sk-live"));
        assert_eq!(vault.decrypt(&sealed).unwrap(), "sk-live-123");
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let vault = Vault::new("secret").unwrap();
        assert_ne!(vault.encrypt("same").unwrap(), vault.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_secret_cannot_decrypt() {
        let sealed = Vault::new("one").unwrap().encrypt("sk-live-123").unwrap();
        let err = Vault::new("two").unwrap().decrypt(&sealed).unwrap_err();
        assert!(matches!(err, VaultError::Decrypt));
    }

    #[test]
    fn tampered_or_foreign_input_is_rejected() {
        let vault = Vault::new("secret").unwrap();
        assert!(matches!(
            vault.decrypt("not base64!"),
            Err(VaultError::Malformed(_))
        ));
        assert!(matches!(vault.decrypt("AAAA"), Err(VaultError::Malformed(_))));

        let mut sealed = STANDARD.decode(vault.encrypt("sk").unwrap()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            vault.decrypt(&STANDARD.encode(sealed)),
            Err(VaultError::Decrypt)
        ));
    }

    #[test]
    fn blank_secret_is_refused() {
        assert!(matches!(Vault::new("   "), Err(VaultError::MissingSecret)));
    }

    #[test]
    fn environment_wins_over_secret_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.key");
        fs::write(&path, "from-file\n").unwrap();

        let (secret, source) = resolve_secret(
            Some("from-env".to_string()),
            Some(path.to_string_lossy().to_string()),
        )
        .unwrap();
        assert_eq!(secret, "from-env");
        assert_eq!(source, VaultKeySource::Environment);

        let (secret, source) =
            resolve_secret(Some(" ".to_string()), Some(path.to_string_lossy().to_string()))
                .unwrap();
        assert_eq!(secret, "from-file");
        assert_eq!(source, VaultKeySource::SecretFile);
    }

    #[test]
    fn missing_sources_are_reported() {
        assert!(matches!(
            resolve_secret(None, None),
            Err(VaultError::MissingSecret)
        ));

        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.key");
        assert!(matches!(
            resolve_secret(None, Some(missing.to_string_lossy().to_string())),
            Err(VaultError::SecretFile { .. })
        ));
    }
}
