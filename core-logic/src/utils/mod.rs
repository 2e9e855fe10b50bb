//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod gas;
pub(crate) mod logger;
pub(crate) mod retry;

pub use gas::{format_ether, gwei_to_wei, GasConfig, GasConfigToml, WEI_PER_ETHER, WEI_PER_GWEI};
pub use logger::setup_logger;
pub use retry::{with_retry, RetryConfig, Supervisor};
