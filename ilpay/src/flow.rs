//! The payment flow: amount entry, receiver entry, quoting, confirmation.
//!
//! [`PaymentFlow`] drives an [`IntentSession`] through its stages using a
//! wallet resolver and a quote service. Every mutation goes through the
//! session's [`SessionHandle`], so two requests of the same attempt can never
//! interleave their updates.
//!
//! Wallet discovery and quoting are bounded by the configured timeouts
//! regardless of what the collaborators do themselves.

use std::time::Duration;

use chrono::Utc;

use crate::amount::FixedPointAmount;
use crate::config::NegotiationConfig;
use crate::error::NegotiationError;
use crate::quote::{Quote, QuoteNegotiator, QuoteService};
use crate::session::{IntentSession, SessionHandle, SessionTransport, Stage};
use crate::submission::{RawSubmission, SubmissionResult, SubmissionValidator};
use crate::wallet::{WalletAddressError, WalletAddressResolver, normalize_address};

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// Result of submitting the receiver form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The form was valid and the network quoted it.
    Quoted(Quote),
    /// The form had field errors; nothing was sent to the quote service.
    Rejected(SubmissionResult),
}

/// Orchestrates one kind of payment attempt.
#[derive(Debug)]
pub struct PaymentFlow<R, Q> {
    resolver: R,
    negotiator: QuoteNegotiator<Q>,
    session_lifetime: Duration,
    discovery_timeout: Duration,
}

impl<R, Q> PaymentFlow<R, Q>
where
    R: WalletAddressResolver,
    Q: QuoteService,
{
    /// Creates a flow over the given collaborators.
    pub const fn new(resolver: R, quotes: Q, config: &NegotiationConfig) -> Self {
        Self {
            resolver,
            negotiator: QuoteNegotiator::new(quotes)
                .with_timeout(config.quote_timeout),
            session_lifetime: config.session_lifetime,
            discovery_timeout: config.discovery_timeout,
        }
    }

    /// The wallet resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The quote service.
    pub const fn quotes(&self) -> &Q {
        self.negotiator.service()
    }

    /// Starts a session for the wallet at `sender`.
    ///
    /// # Errors
    ///
    /// The sender address is malformed or cannot be discovered within the
    /// discovery timeout.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "ilpay.flow.begin", skip(self), err)
    )]
    pub async fn begin(&self, sender: &str) -> Result<SessionHandle, NegotiationError> {
        let url = normalize_address(sender)?;
        let wallet = tokio::time::timeout(self.discovery_timeout, self.resolver.resolve(&url))
            .await
            .map_err(|elapsed| WalletAddressError::unresolvable(url.clone(), elapsed))??;
        #[cfg(feature = "telemetry")]
        tracing::debug!(
            sender = %wallet.id,
            asset = %wallet.asset_code,
            "payment session started"
        );
        Ok(SessionHandle::new(IntentSession::start(
            wallet,
            self.session_lifetime,
            Utc::now(),
        )))
    }

    /// Restores the session stored in `transport`.
    ///
    /// # Errors
    ///
    /// The session is missing, undecodable, expired or discarded.
    pub fn resume<T>(&self, transport: &T) -> Result<SessionHandle, NegotiationError>
    where
        T: SessionTransport + ?Sized,
    {
        Ok(SessionHandle::new(IntentSession::load(transport, Utc::now())?))
    }

    /// Parses `input` in the sender's asset and stores it as the amount.
    ///
    /// May be called repeatedly while the session is in
    /// [`Stage::AmountEntry`]; the last amount wins.
    ///
    /// # Errors
    ///
    /// The input is not a valid amount for the sender, or the session refuses
    /// the update.
    pub async fn enter_amount(
        &self,
        handle: &SessionHandle,
        input: &str,
    ) -> Result<FixedPointAmount, NegotiationError> {
        handle
            .update(|session| -> Result<_, NegotiationError> {
                let now = Utc::now();
                let amount = session.sender_wallet(now)?.amount(input)?;
                session.enter_amount(amount.clone(), now)?;
                Ok(amount)
            })
            .await
    }

    /// Moves on to receiver entry.
    ///
    /// # Errors
    ///
    /// No amount, a zero amount, or the session refuses the transition.
    pub async fn continue_to_receiver(
        &self,
        handle: &SessionHandle,
    ) -> Result<(), NegotiationError> {
        handle
            .update(|session| session.advance_to_receiver_entry(Utc::now()))
            .await
            .map_err(NegotiationError::from)
    }

    /// Validates the receiver form and, if it is valid, requests a quote.
    ///
    /// A missing sender address in `raw` is taken from the session. The
    /// session stays locked for the whole call, so a concurrent submit of the
    /// same attempt waits for this one to finish.
    ///
    /// # Errors
    ///
    /// Stage and liveness errors before any remote call; quote service
    /// failures; a quote that disagrees with the session or is already stale.
    /// The session stays in [`Stage::ReceiverEntry`] on any error.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "ilpay.flow.submit", skip_all, err)
    )]
    pub async fn submit(
        &self,
        handle: &SessionHandle,
        raw: &RawSubmission,
    ) -> Result<SubmitOutcome, NegotiationError> {
        let mut session = handle.lock().await;
        session.ensure_stage(Stage::ReceiverEntry, Utc::now())?;

        let mut raw = raw.clone();
        if raw.wallet_address.is_none() {
            raw.wallet_address = Some(session.sender_wallet(Utc::now())?.id.to_string());
        }
        let result = SubmissionValidator::new(&self.resolver)
            .with_timeout(self.discovery_timeout)
            .validate(&raw)
            .await;
        let Some(submission) = result.value().cloned() else {
            #[cfg(feature = "telemetry")]
            tracing::debug!(fields = result.field_errors().len(), "submission rejected");
            return Ok(SubmitOutcome::Rejected(result));
        };

        session.check_submission(&submission, Utc::now())?;
        let quote = self
            .negotiator
            .request_quote(&submission.sender, &submission.receiver, &submission.amount)
            .await?;
        session.record_quote(submission, quote.clone(), Utc::now())?;
        Ok(SubmitOutcome::Quoted(quote))
    }

    /// Accepts the quote held by the session.
    ///
    /// # Errors
    ///
    /// The session is not at [`Stage::QuoteObtained`], or the quote expired.
    /// Either way a session that reaches this point is spent afterwards: a
    /// confirmed or expired session can not be used or resumed again.
    pub async fn confirm(&self, handle: &SessionHandle) -> Result<Quote, NegotiationError> {
        handle
            .update(|session| session.confirm(Utc::now()).cloned())
            .await
            .map_err(NegotiationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::MemoryTransport;
    use crate::submission::{Field, INVALID_WALLET_ADDRESS, RECEIVER_NOT_VALID};
    use crate::test_support::{StubQuoteService, StubResolver};
    use chrono::TimeDelta;

    const ALICE: &str = "https://wallet.example/alice";
    const BOB: &str = "https://wallet.example/bob";

    fn resolver() -> StubResolver {
        StubResolver::new()
            .with_wallet(ALICE, "USD", 2)
            .with_wallet(BOB, "EUR", 2)
    }

    fn flow(quotes: StubQuoteService) -> PaymentFlow<StubResolver, StubQuoteService> {
        PaymentFlow::new(resolver(), quotes, &NegotiationConfig::default())
    }

    fn impatient() -> NegotiationConfig {
        NegotiationConfig {
            discovery_timeout: Duration::from_millis(50),
            quote_timeout: Duration::from_millis(50),
            ..NegotiationConfig::default()
        }
    }

    fn to(receiver: &str) -> RawSubmission {
        RawSubmission {
            receiver: Some(receiver.into()),
            amount: Some("12.50".into()),
            ..RawSubmission::default()
        }
    }

    async fn at_receiver_entry(
        flow: &PaymentFlow<StubResolver, StubQuoteService>,
    ) -> SessionHandle {
        let handle = flow.begin("$wallet.example/alice").await.unwrap();
        flow.enter_amount(&handle, "12.50").await.unwrap();
        flow.continue_to_receiver(&handle).await.unwrap();
        handle
    }

    #[tokio::test]
    async fn test_happy_path_reaches_confirmed() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;

        let SubmitOutcome::Quoted(quote) = flow.submit(&handle, &to(BOB)).await.unwrap() else {
            panic!("expected a quote");
        };
        assert_eq!(quote.send_amount, FixedPointAmount::new(1250, "USD", 2));
        assert_eq!(handle.snapshot().stage(), Stage::QuoteObtained);

        let confirmed = flow.confirm(&handle).await.unwrap();
        assert_eq!(confirmed, quote);
        assert_eq!(handle.snapshot().stage(), Stage::Confirmed);

        let request = &flow.quotes().requests()[0];
        assert_eq!(request.sender_wallet_id.as_str(), ALICE);
        assert_eq!(request.receiver_wallet_id.as_str(), BOB);
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_quote_service() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;

        let outcome = flow
            .submit(&handle, &to("https://wallet.example/nobody"))
            .await
            .unwrap();
        let SubmitOutcome::Rejected(result) = outcome else {
            panic!("expected field errors");
        };
        assert_eq!(result.errors_for(Field::Receiver), [RECEIVER_NOT_VALID]);
        assert_eq!(flow.quotes().calls(), 0);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_malformed_receiver_is_a_single_field_error() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;

        let outcome = flow.submit(&handle, &to("not a url")).await.unwrap();
        let SubmitOutcome::Rejected(result) = outcome else {
            panic!("expected field errors");
        };
        assert!(!result.is_ok());
        assert_eq!(result.field_errors().len(), 1);
        assert_eq!(result.errors_for(Field::Receiver), [INVALID_WALLET_ADDRESS]);
        assert_eq!(flow.quotes().calls(), 0);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_silent_quote_service_times_out() {
        let quotes = StubQuoteService::new(TimeDelta::minutes(5)).stalling();
        let flow = PaymentFlow::new(resolver(), quotes, &impatient());
        let handle = at_receiver_entry(&flow).await;

        let err = flow.submit(&handle, &to(BOB)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuoteServiceUnreachable);
        assert_eq!(flow.quotes().calls(), 1);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_silent_receiver_wallet_times_out() {
        let quotes = StubQuoteService::new(TimeDelta::minutes(5));
        let flow = PaymentFlow::new(resolver().with_stalled(BOB), quotes, &impatient());
        let handle = at_receiver_entry(&flow).await;

        let SubmitOutcome::Rejected(result) = flow.submit(&handle, &to(BOB)).await.unwrap() else {
            panic!("expected field errors");
        };
        assert_eq!(result.errors_for(Field::Receiver), [RECEIVER_NOT_VALID]);
        assert_eq!(flow.quotes().calls(), 0);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_silent_sender_wallet_cannot_begin() {
        let quotes = StubQuoteService::new(TimeDelta::minutes(5));
        let flow = PaymentFlow::new(resolver().with_stalled(ALICE), quotes, &impatient());

        let err = flow.begin(ALICE).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvableAddress);
    }

    #[tokio::test]
    async fn test_confirmed_session_cannot_be_resumed() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;
        flow.submit(&handle, &to(BOB)).await.unwrap();
        flow.confirm(&handle).await.unwrap();

        let mut transport = MemoryTransport::new();
        handle.snapshot().save(&mut transport).unwrap();
        let err = flow.resume(&transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionDiscarded);
    }

    #[tokio::test]
    async fn test_submit_before_amount_makes_no_remote_calls() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = flow.begin(ALICE).await.unwrap();
        let lookups = flow.resolver().requested().len();

        let err = flow.submit(&handle, &to(BOB)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StageViolation);
        assert_eq!(flow.resolver().requested().len(), lookups);
        assert_eq!(flow.quotes().calls(), 0);
    }

    #[tokio::test]
    async fn test_changed_amount_is_inconsistent() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;

        let mut raw = to(BOB);
        raw.amount = Some("99".into());
        let err = flow.submit(&handle, &raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
        assert_eq!(flow.quotes().calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_rejection_keeps_receiver_entry() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)).rejecting());
        let handle = at_receiver_entry(&flow).await;

        let err = flow.submit(&handle, &to(BOB)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuoteUnavailable);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_stale_quote_is_not_recorded() {
        let flow = flow(StubQuoteService::new(TimeDelta::seconds(-1)));
        let handle = at_receiver_entry(&flow).await;

        let err = flow.submit(&handle, &to(BOB)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuoteExpired);
        assert_eq!(handle.snapshot().stage(), Stage::ReceiverEntry);
    }

    #[tokio::test]
    async fn test_quote_expiring_before_confirm_discards_session() {
        let flow = flow(StubQuoteService::new(TimeDelta::milliseconds(200)));
        let handle = at_receiver_entry(&flow).await;
        flow.submit(&handle, &to(BOB)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let err = flow.confirm(&handle).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuoteExpired);
        assert!(handle.snapshot().is_discarded());

        let err = flow.confirm(&handle).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionDiscarded);
    }

    #[tokio::test]
    async fn test_zero_amount_cannot_advance() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = flow.begin(ALICE).await.unwrap();
        flow.enter_amount(&handle, "0").await.unwrap();
        let err = flow.continue_to_receiver(&handle).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[tokio::test]
    async fn test_unknown_sender_cannot_begin() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let err = flow.begin("$wallet.example/mallory").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvableAddress);
    }

    #[tokio::test]
    async fn test_resume_from_transport() {
        let flow = flow(StubQuoteService::new(TimeDelta::minutes(5)));
        let handle = at_receiver_entry(&flow).await;
        let mut transport = MemoryTransport::new();
        handle.snapshot().save(&mut transport).unwrap();

        let resumed = flow.resume(&transport).unwrap();
        assert_eq!(resumed.snapshot().stage(), Stage::ReceiverEntry);
        assert!(matches!(
            flow.submit(&resumed, &to(BOB)).await.unwrap(),
            SubmitOutcome::Quoted(_)
        ));
    }
}
