//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Barrier;
use url::Url;

use crate::amount::FixedPointAmount;
use crate::quote::{Quote, QuoteError, QuoteRequest, QuoteService};
use crate::wallet::{WalletAddress, WalletAddressError, WalletAddressResolver};

pub fn wallet(id: &str, asset_code: &str, asset_scale: u8) -> WalletAddress {
    WalletAddress::new(Url::parse(id).unwrap(), asset_code, asset_scale)
}

pub fn quote_for(amount: &FixedPointAmount, now: DateTime<Utc>, ttl: TimeDelta) -> Quote {
    Quote {
        id: format!("quote-{}", amount.value),
        send_amount: amount.clone(),
        receive_amount: FixedPointAmount::new(amount.value * 9 / 10, "EUR", 2),
        expires_at: now + ttl,
        created_at: now,
    }
}

/// Resolves from a fixed table and records every URL it was asked for.
#[derive(Debug, Default)]
pub struct StubResolver {
    wallets: HashMap<String, WalletAddress>,
    requested: Mutex<Vec<String>>,
    rendezvous: Option<Barrier>,
    stalled: HashSet<String>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(mut self, id: &str, asset_code: &str, asset_scale: u8) -> Self {
        self.wallets
            .insert(id.to_owned(), wallet(id, asset_code, asset_scale));
        self
    }

    /// Makes each lookup wait until `n` lookups are in flight at once.
    pub fn with_rendezvous(mut self, n: usize) -> Self {
        self.rendezvous = Some(Barrier::new(n));
        self
    }

    /// Makes lookups of `id` hang forever.
    pub fn with_stalled(mut self, id: &str) -> Self {
        self.stalled.insert(id.to_owned());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl WalletAddressResolver for StubResolver {
    async fn resolve(&self, url: &Url) -> Result<WalletAddress, WalletAddressError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
        if self.stalled.contains(url.as_str()) {
            std::future::pending::<()>().await;
        }
        self.wallets
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| WalletAddressError::unresolvable(url.clone(), "no such wallet"))
    }
}

/// Quotes 1:1 with a fixed time-to-live and records every request.
#[derive(Debug)]
pub struct StubQuoteService {
    ttl: TimeDelta,
    reject: bool,
    stall: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl StubQuoteService {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            reject: false,
            stall: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Never answers.
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl QuoteService for StubQuoteService {
    async fn create_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.reject {
            return Err(QuoteError::Rejected {
                status: 422,
                body: "receiver cannot accept this asset".into(),
            });
        }
        Ok(quote_for(&request.send_amount, Utc::now(), self.ttl))
    }
}
