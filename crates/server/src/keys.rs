//! SFTP host key storage and fingerprints.
//!
//! The host key is an Ed25519 key pair. Only the 32-byte secret seed is
//! persisted; the public half is derived on load.

use base64::Engine;
use bridgeftpd_platform::{BridgeError, BridgeResult};
use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// File name of the persisted secret seed.
pub const HOST_KEY_FILE: &str = "ssh_host_ed25519_key";

const ALGORITHM: &str = "ssh-ed25519";

/// Fingerprints of the host public key, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFingerprintProvider {
    sha256: String,
    sha1: String,
}

impl KeyFingerprintProvider {
    /// Fingerprints of an SSH wire-format public key blob.
    pub fn from_public_key_blob(blob: &[u8]) -> Self {
        let sha256 = format!(
            "SHA256:{}",
            base64::engine::general_purpose::STANDARD_NO_PAD.encode(Sha256::digest(blob))
        );
        let sha1 = Sha1::digest(blob)
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(":");
        Self { sha256, sha1 }
    }

    /// `SHA256:<base64>` as printed by OpenSSH.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Colon separated SHA-1 hex.
    pub fn sha1(&self) -> &str {
        &self.sha1
    }
}

/// A loaded host key.
pub struct HostKey {
    signing_key: SigningKey,
}

impl HostKey {
    fn from_seed(seed: &[u8]) -> BridgeResult<Self> {
        if seed.len() != SECRET_KEY_LENGTH {
            return Err(BridgeError::Security("Ed25519 secret key must be 32 bytes".into()));
        }
        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        bytes.copy_from_slice(seed);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    /// Signing key for the SSH transport.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Public half.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key in SSH wire format: `string "ssh-ed25519", string key`.
    pub fn public_key_blob(&self) -> Vec<u8> {
        let key = self.verifying_key().to_bytes();
        let mut blob = Vec::with_capacity(4 + ALGORITHM.len() + 4 + key.len());
        blob.extend_from_slice(&(ALGORITHM.len() as u32).to_be_bytes());
        blob.extend_from_slice(ALGORITHM.as_bytes());
        blob.extend_from_slice(&(key.len() as u32).to_be_bytes());
        blob.extend_from_slice(&key);
        blob
    }

    /// Fingerprints of the public key.
    pub fn fingerprints(&self) -> KeyFingerprintProvider {
        KeyFingerprintProvider::from_public_key_blob(&self.public_key_blob())
    }
}

impl std::fmt::Debug for HostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKey")
            .field("fingerprint", &self.fingerprints().sha256)
            .finish()
    }
}

/// Host key directory.
#[derive(Debug, Clone)]
pub struct HostKeyStore {
    dir: PathBuf,
}

impl HostKeyStore {
    /// Store rooted at `dir`. Nothing is read until asked.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the secret seed file.
    pub fn key_path(&self) -> PathBuf {
        self.dir.join(HOST_KEY_FILE)
    }

    /// Whether a key file exists.
    pub fn is_key_present(&self) -> bool {
        self.key_path().is_file()
    }

    /// Generates a fresh key pair and persists it, replacing any old key.
    ///
    /// # Errors
    ///
    /// I/O errors while creating the directory or writing the key
    pub fn generate(&self) -> BridgeResult<HostKey> {
        let mut csprng = rand::thread_rng();
        let seed: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
            Zeroizing::new(rand::Rng::gen(&mut csprng));
        let key = HostKey::from_seed(seed.as_slice())?;

        fs::create_dir_all(&self.dir)?;
        let path = self.key_path();
        let temp_path = path.with_extension("tmp");
        {
            let mut file = create_private(&temp_path)?;
            file.write_all(seed.as_slice())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        info!(
            path = %path.display(),
            fingerprint = %key.fingerprints().sha256(),
            "host key generated"
        );
        Ok(key)
    }

    /// Loads the persisted key.
    ///
    /// # Errors
    ///
    /// `BridgeError::Io` when the file is missing or unreadable,
    /// `BridgeError::Security` when it is not a 32-byte seed
    pub fn load(&self) -> BridgeResult<HostKey> {
        let seed = Zeroizing::new(fs::read(self.key_path())?);
        HostKey::from_seed(&seed)
    }

    /// Fingerprints of the persisted key, or `None` when there is none.
    pub fn fingerprints(&self) -> Option<KeyFingerprintProvider> {
        self.load().ok().map(|k| k.fingerprints())
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = HostKeyStore::new(dir.path().join("keys"));
        assert!(!store.is_key_present());
        assert!(store.fingerprints().is_none());

        let key = store.generate().unwrap();
        assert!(store.is_key_present());
        assert_eq!(fs::read(store.key_path()).unwrap().len(), 32);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.verifying_key(), key.verifying_key());
        assert_eq!(store.fingerprints(), Some(key.fingerprints()));
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = KeyFingerprintProvider::from_public_key_blob(b"blob");
        assert!(fp.sha256().starts_with("SHA256:"));
        assert!(!fp.sha256().ends_with('='));
        assert_eq!(fp.sha1().split(':').count(), 20);
    }

    #[test]
    fn test_corrupt_key_is_security_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = HostKeyStore::new(dir.path());
        fs::write(store.key_path(), b"short").unwrap();
        assert!(store.is_key_present());
        assert!(matches!(store.load(), Err(BridgeError::Security(_))));
    }

    #[test]
    fn test_public_key_blob_layout() {
        let dir = tempfile::tempdir().unwrap();
        let key = HostKeyStore::new(dir.path()).generate().unwrap();
        let blob = key.public_key_blob();
        assert_eq!(blob.len(), 4 + 11 + 4 + 32);
        assert_eq!(&blob[4..15], b"ssh-ed25519");
    }
}
