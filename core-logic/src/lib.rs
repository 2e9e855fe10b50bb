//! # Core Logic - Shared Utilities for the Token Sweeper
//!
//! This crate provides the chain-agnostic plumbing used by the sweeper binary.
//!
//! ## Modules
//!
//! - [`config`] - Shared configuration structures (chain, mail, wallet source)
//! - [`error`] - Typed error handling with thiserror
//! - [`security`] - Secret loading, decryption and masking
//! - [`utils`] - Logging setup, gas configuration, retry and supervision

pub mod config;
pub mod error;
pub mod security;
pub(crate) mod utils;

pub use config::{ChainConfig, MailConfig, WalletSource};
pub use error::{ConfigError, NetworkError, SecurityError};
pub use security::{SecurityUtils, WalletSecrets};

pub use utils::{
    format_ether, gwei_to_wei, setup_logger, with_retry, GasConfig, GasConfigToml, RetryConfig,
    Supervisor, WEI_PER_ETHER, WEI_PER_GWEI,
};
