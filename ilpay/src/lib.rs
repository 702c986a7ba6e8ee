#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Payment-intent negotiation for Open Payments wallets.
//!
//! A user who wants to pay from one wallet to another goes through a short
//! multi-step flow: enter an amount, name a receiver, look at a quote from the
//! payment network, confirm it. This crate holds everything in that flow that
//! does not depend on a particular transport.
//!
//! # Overview
//!
//! Amounts are entered as decimal strings and kept as fixed-point integers in
//! the sender's asset. Wallet addresses (URLs or `$` payment pointers) are
//! discovered through a [`wallet::WalletAddressResolver`]. Quotes come from a
//! [`quote::QuoteService`]. A [`session::IntentSession`] carries the state
//! between steps, refuses out-of-order transitions, and expires.
//!
//! # Modules
//!
//! - [`amount`] - Decimal to fixed-point conversion and display formatting
//! - [`config`] - Timeouts, session lifetime, quote service URL
//! - [`error`] - Error taxonomy shared by all modules
//! - [`flow`] - The payment flow tying the other modules together
//! - [`quote`] - Quote requests and the quote service abstraction
//! - [`session`] - The per-attempt session, its handle and its storage
//! - [`submission`] - Validation of the receiver form
//! - [`wallet`] - Wallet addresses and their discovery
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod config;
pub mod error;
pub mod flow;
pub mod quote;
pub mod session;
pub mod submission;
pub mod wallet;

#[cfg(test)]
mod test_support;
