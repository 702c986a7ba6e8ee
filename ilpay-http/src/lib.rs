//! HTTP clients for wallet address discovery and quoting.
//!
//! Implements the [`ilpay::wallet::WalletAddressResolver`] and
//! [`ilpay::quote::QuoteService`] traits with reqwest.
//!
//! # Modules
//!
//! - [`constants`] - Media types and endpoint paths
//! - [`error`] - HTTP client error type
//! - [`quote_client`] - Quote service client
//! - [`wallet_client`] - Wallet address resolver

pub mod constants;
pub mod error;
pub mod quote_client;
pub mod wallet_client;

mod transport;

pub use error::ClientError;
pub use quote_client::HttpQuoteClient;
pub use wallet_client::{HttpWalletAddressResolver, WalletAddressDocument};
