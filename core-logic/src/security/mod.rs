//! # Secret Loading
//!
//! Loads the signing key (and optionally the recipient address) of the
//! monitored wallet from one of the supported [`WalletSource`]s.

use aes_gcm::{
    aead::{Aead, NewAead}, // NewAead for 0.9/0.4
    Aes256Gcm,
    Nonce,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::WalletSource;
use crate::error::SecurityError;

/// Content written over a plain secrets file once it has been read.
pub const WIPED_LINE: &str = "0000000000000";

const GCM_NONCE_LEN: usize = 12;

#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletSecrets {
    #[serde(alias = "evm_private_key")]
    pub private_key: String,
    #[serde(default)]
    pub recipient: Option<String>,
}

impl fmt::Debug for WalletSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecrets")
            .field("private_key", &"***REDACTED***")
            .field("recipient", &self.recipient)
            .finish()
    }
}

pub struct SecurityUtils;

impl SecurityUtils {
    /// Loads wallet secrets from `source`.
    ///
    /// A plain secrets file holds the private key on its first line and the
    /// recipient address on its second. With `wipe` set the file is overwritten
    /// with placeholder lines right after reading, so the key does not stay on
    /// disk. Encrypted files are JSON wallets and need `password`.
    pub fn load_wallet_secrets(
        source: &WalletSource,
        password: Option<&str>,
        wipe: bool,
    ) -> Result<WalletSecrets, SecurityError> {
        match source {
            WalletSource::Env { key } => {
                let private_key = std::env::var(key)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| SecurityError::SecretMissing { name: key.clone() })?;
                Ok(WalletSecrets {
                    private_key: private_key.trim().to_string(),
                    recipient: None,
                })
            }
            WalletSource::File {
                path,
                encrypted: false,
            } => Self::read_plain_file(Path::new(path), wipe),
            WalletSource::File {
                path,
                encrypted: true,
            } => {
                let pass = password.ok_or(SecurityError::PasswordRequired)?;
                Self::read_encrypted_file(Path::new(path), pass)
            }
        }
    }

    fn read_plain_file(path: &Path, wipe: bool) -> Result<WalletSecrets, SecurityError> {
        let malformed = |reason: &str| SecurityError::MalformedSecrets {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let mut content = fs::read_to_string(path).map_err(|e| malformed(&e.to_string()))?;
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

        let private_key = lines
            .next()
            .ok_or_else(|| malformed("file is empty"))?
            .to_string();
        if private_key == WIPED_LINE {
            content.zeroize();
            return Err(malformed("file has already been wiped"));
        }
        let recipient = lines.next().map(str::to_string);
        content.zeroize();

        if wipe {
            let placeholder = format!("{}\n", WIPED_LINE).repeat(2);
            fs::write(path, placeholder).map_err(|e| malformed(&e.to_string()))?;
        }

        Ok(WalletSecrets {
            private_key,
            recipient,
        })
    }

    fn read_encrypted_file(path: &Path, password: &str) -> Result<WalletSecrets, SecurityError> {
        let malformed = |reason: String| SecurityError::MalformedSecrets {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let json: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;

        let block = json
            .get("encrypted")
            .filter(|v| v.is_object())
            .ok_or_else(|| malformed("missing 'encrypted' object".to_string()))?;
        let mut decrypted = Self::decrypt_components(
            Self::hex_field(block, "ciphertext", path)?,
            Self::hex_field(block, "iv", path)?,
            Self::hex_field(block, "salt", path)?,
            Self::hex_field(block, "tag", path)?,
            password,
        )?;
        let secrets = serde_json::from_str::<WalletSecrets>(&decrypted)
            .map_err(|e| malformed(format!("decrypted payload: {}", e)));
        decrypted.zeroize();
        secrets
    }

    fn hex_field<'a>(block: &'a Value, name: &str, path: &Path) -> Result<&'a str, SecurityError> {
        block
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SecurityError::MalformedSecrets {
                path: path.display().to_string(),
                reason: format!("missing '{}'", name),
            })
    }

    /// AES-256-GCM decryption with an scrypt-derived key (N=16384, r=8, p=1).
    pub fn decrypt_components(
        ciphertext_hex: &str,
        iv_hex: &str,
        salt_hex: &str,
        tag_hex: &str,
        password: &str,
    ) -> Result<String, SecurityError> {
        let crypto_err = |reason: String| SecurityError::CryptographyFailed { reason };

        let ciphertext =
            hex::decode(ciphertext_hex).map_err(|e| crypto_err(format!("ciphertext: {}", e)))?;
        let iv = hex::decode(iv_hex).map_err(|e| crypto_err(format!("iv: {}", e)))?;
        let salt = hex::decode(salt_hex).map_err(|e| crypto_err(format!("salt: {}", e)))?;
        let mut tag = hex::decode(tag_hex).map_err(|e| crypto_err(format!("tag: {}", e)))?;

        if iv.len() != GCM_NONCE_LEN {
            return Err(crypto_err(format!(
                "iv must be {} bytes, got {}",
                GCM_NONCE_LEN,
                iv.len()
            )));
        }

        let params = scrypt::Params::new(14, 8, 1, 32)
            .map_err(|e| crypto_err(format!("invalid scrypt params: {}", e)))?;
        let mut key = [0u8; 32];
        scrypt::scrypt(password.as_bytes(), &salt, &params, &mut key)
            .map_err(|e| crypto_err(format!("scrypt failed: {}", e)))?;

        let cipher = Aes256Gcm::new(&key.into());
        key.zeroize();
        let nonce = Nonce::from_slice(&iv);

        let mut payload = ciphertext;
        payload.append(&mut tag);

        let plaintext = cipher
            .decrypt(nonce, payload.as_ref())
            .map_err(|_| crypto_err("wrong password or corrupted data".to_string()))?;

        String::from_utf8(plaintext).map_err(|_| crypto_err("payload is not UTF-8".to_string()))
    }

    /// Masks a secret for display, keeping only a short prefix and suffix.
    pub fn mask(secret: &str) -> String {
        let secret = secret.trim();
        let chars: Vec<char> = secret.chars().collect();
        if chars.len() <= 10 {
            return "*".repeat(chars.len().max(3));
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
