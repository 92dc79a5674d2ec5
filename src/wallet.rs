//! On-disk wallet: stores a secp256k1 secret key encrypted with AES-256-GCM,
//! key-derived from a passphrase via Argon2. Implements `WalletSigner` so the
//! agent can sign heartbeats and dismissal votes directly.

use crate::address::Address;
use crate::error::MasternodeError;
use crate::interfaces::WalletSigner;
use crate::message::{DismissVote, Heartbeat, Reason};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use zeroize::Zeroize;

/// Encrypted wallet file format.
#[derive(Serialize, Deserialize)]
struct EncryptedWalletFile {
    version: u32,
    /// Argon2 salt for key derivation.
    salt: String,
    /// AES-GCM nonce (12 bytes).
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// A secp256k1 secret key, held only in memory once decrypted.
pub struct Wallet {
    secret_key: SecretKey,
    address: Address,
}

impl Wallet {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, _pk) = secp.generate_keypair(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let uncompressed = PublicKey::from_secret_key(&secp, &secret_key).serialize_uncompressed();
        let mut body = [0u8; 64];
        body.copy_from_slice(&uncompressed[1..]);
        let address = Address::from_uncompressed_pubkey_body(&body);
        Self { secret_key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn load<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Self, MasternodeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MasternodeError::SigningFailed(format!(
                "wallet file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read(path)?;
        let encrypted_file: EncryptedWalletFile = bincode::deserialize(&contents)
            .map_err(|e| MasternodeError::SigningFailed(format!("corrupt wallet file: {e}")))?;

        let mut key = Self::derive_key(passphrase, &encrypted_file.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| MasternodeError::SigningFailed(e.to_string()))?;
        let nonce = Nonce::from_slice(&encrypted_file.nonce);

        let plaintext = cipher
            .decrypt(nonce, encrypted_file.ciphertext.as_ref())
            .map_err(|_| MasternodeError::SigningFailed("wrong passphrase".to_string()))?;
        key.zeroize();

        let mut key_bytes: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| MasternodeError::SigningFailed("wallet payload has wrong length".to_string()))?;
        let secret_key = SecretKey::from_slice(&key_bytes)
            .map_err(|e| MasternodeError::SigningFailed(e.to_string()))?;
        key_bytes.zeroize();

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, passphrase: &str) -> Result<(), MasternodeError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let salt = SaltString::generate(&mut OsRng);
        let mut key = Self::derive_key(passphrase, salt.as_str())?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| MasternodeError::SigningFailed(e.to_string()))?;

        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut secret_bytes = self.secret_key.secret_bytes();
        let ciphertext = cipher
            .encrypt(nonce, secret_bytes.as_ref())
            .map_err(|e| MasternodeError::SigningFailed(e.to_string()))?;
        secret_bytes.zeroize();
        key.zeroize();

        let encrypted_file = EncryptedWalletFile {
            version: 1,
            salt: salt.to_string(),
            nonce: nonce_bytes.to_vec(),
            ciphertext,
        };
        let contents = bincode::serialize(&encrypted_file)
            .map_err(|e| MasternodeError::SigningFailed(e.to_string()))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn derive_key(passphrase: &str, salt_str: &str) -> Result<[u8; 32], MasternodeError> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(salt_str)
            .map_err(|e| MasternodeError::SigningFailed(format!("invalid salt: {e}")))?;
        let hash = argon2
            .hash_password(passphrase.as_bytes(), &salt)
            .map_err(|e| MasternodeError::SigningFailed(format!("key derivation failed: {e}")))?;
        let hash_bytes = hash
            .hash
            .ok_or_else(|| MasternodeError::SigningFailed("no hash output".to_string()))?;
        let mut key = [0u8; 32];
        let slice = hash_bytes.as_bytes();
        key.copy_from_slice(&slice[..32.min(slice.len())]);
        Ok(key)
    }
}

/// `WalletSigner` backed by an in-memory decrypted `Wallet`. Produced by
/// unlocking a file with a passphrase at agent start, per §6's
/// `account_manager.find` / `wallet.open(passphrase)` contract.
pub struct FileWalletSigner {
    wallet: Wallet,
}

impl FileWalletSigner {
    pub fn unlock<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Self, MasternodeError> {
        Ok(Self {
            wallet: Wallet::load(path, passphrase)?,
        })
    }

    pub fn from_wallet(wallet: Wallet) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletSigner for FileWalletSigner {
    fn cra_address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_heartbeat(&self, timestamp: u64) -> Result<Heartbeat, MasternodeError> {
        Ok(Heartbeat::sign(timestamp, self.wallet.secret_key()))
    }

    async fn sign_dismiss_vote(
        &self,
        target_cra: Address,
        expiration_height: u64,
        reason: Reason,
        timestamp: u64,
    ) -> Result<DismissVote, MasternodeError> {
        Ok(DismissVote::sign(
            target_cra,
            expiration_height,
            reason,
            timestamp,
            self.wallet.secret_key(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn wallet_save_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.dat");

        let wallet = Wallet::generate();
        let address = wallet.address();
        wallet.save(&path, "correct horse battery staple").unwrap();

        let loaded = Wallet::load(&path, "correct horse battery staple").unwrap();
        assert_eq!(loaded.address(), address);
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.dat");

        let wallet = Wallet::generate();
        wallet.save(&path, "right passphrase").unwrap();

        let err = Wallet::load(&path, "wrong passphrase").unwrap_err();
        assert!(matches!(err, MasternodeError::SigningFailed(_)));
    }

    #[tokio::test]
    async fn file_wallet_signer_signs_with_the_unlocked_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let wallet = Wallet::generate();
        wallet.save(&path, "pw").unwrap();

        let signer = FileWalletSigner::unlock(&path, "pw").unwrap();
        let hb = signer.sign_heartbeat(1234).await.unwrap();
        assert_eq!(hb.recover_signer().unwrap(), signer.cra_address());
    }
}
