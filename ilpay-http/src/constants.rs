//! HTTP-specific constants for wallet discovery and quoting.

/// Media type requested from wallet address servers and the quote service.
pub const ACCEPT_JSON: &str = "application/json";

/// Path of the quote endpoint, relative to the quote service base URL.
pub const QUOTES_PATH: &str = "./quotes";
