//! JSON-over-HTTP plumbing shared by the clients.

use std::fmt::Display;
use std::time::Duration;

use http::HeaderMap;
use http::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::Span;

use crate::constants::ACCEPT_JSON;
use crate::error::ClientError;

/// A reqwest client with per-request headers and timeout.
#[derive(Clone, Debug)]
pub(crate) struct JsonTransport {
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl JsonTransport {
    pub(crate) fn new(client: Client, timeout: Option<Duration>) -> Self {
        Self {
            client,
            headers: HeaderMap::new(),
            timeout,
        }
    }

    pub(crate) const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn set_client(&mut self, client: Client) {
        self.client = client;
    }

    pub(crate) fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub(crate) const fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Sends a `GET` and decodes a 2xx JSON body.
    ///
    /// `context` is a human-readable identifier used in tracing and error
    /// messages (e.g. `"GET wallet address"`).
    pub(crate) async fn get_json<R>(
        &self,
        url: &Url,
        context: &'static str,
    ) -> Result<R, ClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.get(url.clone());
        self.send(req, context).await
    }

    /// Sends a JSON `POST` and decodes a 2xx JSON body.
    pub(crate) async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, ClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.post(url.clone()).json(payload);
        self.send(req, context).await
    }

    async fn send<R>(
        &self,
        mut req: RequestBuilder,
        context: &'static str,
    ) -> Result<R, ClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        req = req.header(ACCEPT, ACCEPT_JSON);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::transport(context, e))?;

        let result = if http_response.status().is_success() {
            http_response.json::<R>().await.map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout { context, source: e }
                } else {
                    ClientError::JsonDeserialization { context, source: e }
                }
            })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| ClientError::ResponseBodyRead { context, source: e })?;
            Err(ClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }
}

/// Records the outcome of a request on the current tracing span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::WARN, error = %err, "request failed");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
