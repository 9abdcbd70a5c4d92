//! Paystack-compatible HTTPS gateway client.
//!
//! ## Endpoints
//! ```text
//! POST /transaction/initialize        open hosted checkout
//! GET  /transaction/verify/{ref}      authoritative charge status
//! POST /refund                        refund a charge
//!
//! Every response is wrapped as { "status": bool, "message": str, "data": T }
//! ```
//!
//! ## Retry Policy
//! Initialize and verify are keyed by the order reference, so repeating them
//! is safe; they are retried with exponential backoff while the error is
//! retryable and the retry budget lasts. Refunds are sent exactly once.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use async_trait::async_trait;

use super::{Charge, ChargeStatus, PaymentGateway, Refund, Session, SessionRequest};
use crate::config::GatewaySettings;
use crate::error::{GatewayError, GatewayResult, PaymentError, PaymentResult};

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: ChargeStatus,
    reference: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    transaction: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct RefundData {
    #[serde(default)]
    amount: Option<i64>,
}

// =============================================================================
// Client
// =============================================================================

/// Gateway client over HTTPS with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
    request_timeout: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    max_retry_elapsed: Duration,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> PaymentResult<Self> {
        let secret_key = settings
            .secret_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PaymentError::InvalidConfig("gateway.secret_key is required for the http provider".into()))?;

        let base = Url::parse(&settings.base_url)?;

        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| PaymentError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpGateway {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            secret_key,
            callback_url: settings.callback_url.clone(),
            request_timeout: settings.request_timeout(),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
            max_retry_elapsed: settings.max_retry_elapsed(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates the exponential backoff for one logical call.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        }
    }

    /// Runs `call` until it succeeds, fails permanently, or the retry budget
    /// is spent.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(operation, attempt, ?delay, error = %err, "Gateway call failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(operation, attempt, error = %err, "Gateway retry budget exhausted");
                        return Err(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.request_timeout.as_secs())
        } else {
            GatewayError::from(err)
        }
    }

    /// Maps an HTTP response onto the envelope's `data` or a [`GatewayError`].
    async fn read<T: DeserializeOwned>(response: Response, reference: &str) -> GatewayResult<T> {
        let status = response.status();

        if status.is_success() {
            let envelope: Envelope<T> = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

            return match envelope {
                Envelope {
                    status: true,
                    data: Some(data),
                    ..
                } => Ok(data),
                Envelope { message, .. } => Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                }),
            };
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited),
            StatusCode::NOT_FOUND => Err(GatewayError::UnknownReference(reference.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .map(|parsed| parsed.message)
                    .unwrap_or(body);

                // Paystack answers an unknown reference with 400.
                if status == StatusCode::BAD_REQUEST && message.to_lowercase().contains("reference not found") {
                    return Err(GatewayError::UnknownReference(reference.to_string()));
                }

                Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn initialize_once(&self, request: &SessionRequest) -> GatewayResult<Session> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount_cents,
            currency: &request.currency,
            reference: &request.reference,
            callback_url: self.callback_url.as_deref(),
            metadata: &request.metadata,
        };

        let response = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::read(response, &request.reference).await
    }

    async fn verify_once(&self, reference: &str) -> GatewayResult<Charge> {
        let response = self
            .client
            .get(self.url(&format!("/transaction/verify/{reference}")))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let data: VerifyData = Self::read(response, reference).await?;
        Ok(Charge {
            reference: data.reference,
            status: data.status,
            amount_cents: data.amount,
            currency: data.currency,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initialize_session(&self, request: &SessionRequest) -> GatewayResult<Session> {
        debug!(reference = %request.reference, amount = request.amount_cents, "Initializing hosted checkout");
        let session = self
            .with_retry("initialize", || self.initialize_once(request))
            .await?;
        info!(reference = %session.reference, "Hosted checkout initialized");
        Ok(session)
    }

    async fn verify_charge(&self, reference: &str) -> GatewayResult<Charge> {
        debug!(reference = %reference, "Verifying charge");
        self.with_retry("verify", || self.verify_once(reference)).await
    }

    async fn refund(&self, reference: &str, amount_cents: i64) -> GatewayResult<Refund> {
        info!(reference = %reference, amount = amount_cents, "Requesting refund");

        let response = self
            .client
            .post(self.url("/refund"))
            .bearer_auth(&self.secret_key)
            .json(&RefundBody {
                transaction: reference,
                amount: amount_cents,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let data: RefundData = Self::read(response, reference).await?;
        Ok(Refund {
            reference: reference.to_string(),
            amount_cents: data.amount.unwrap_or(amount_cents),
        })
    }
}
