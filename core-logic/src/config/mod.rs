use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where the signing key of the monitored wallet comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WalletSource {
    /// Plain two-line secrets file (key, then recipient) or an encrypted JSON wallet.
    #[serde(rename = "file")]
    File {
        path: String,
        #[serde(default)]
        encrypted: bool,
    },
    /// Hex private key held in an environment variable.
    #[serde(rename = "env")]
    Env { key: String },
}

impl Default for WalletSource {
    fn default() -> Self {
        WalletSource::Env {
            key: "PRIVATE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.rpc_url.trim();
        if url.is_empty() {
            return Err(ConfigError::missing("chain.rpc_url"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidRpcUrl {
                url: url.to_string(),
            });
        }
        if self.chain_id == 0 {
            return Err(ConfigError::invalid("chain.chain_id", "must be non-zero"));
        }
        Ok(())
    }
}

/// SMTP credentials and the single fixed recipient of every notification.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub recipient: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl MailConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::missing("mail.username"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::missing("mail.password"));
        }
        if !self.recipient.contains('@') {
            return Err(ConfigError::invalid(
                "mail.recipient",
                format!("'{}' is not an email address", self.recipient),
            ));
        }
        Ok(())
    }
}
