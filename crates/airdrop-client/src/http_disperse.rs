//! # HTTP Disperse Relay Client
//!
//! Implements [`DisperseAdapter`] against a signing relay that holds the
//! sender key, broadcasts disperse transactions, and answers once they are
//! confirmed (or reverted, or given up on).
//!
//! ## Relay API
//!
//! | Method | Path                   | Body                       |
//! |--------|------------------------|----------------------------|
//! | GET    | `/v1/allowance`        | query `token owner spender`|
//! | POST   | `/v1/approve`          | [`ApproveRequest`]         |
//! | POST   | `/v1/disperse/token`   | [`TokenDisperseRequest`]   |
//! | POST   | `/v1/disperse/native`  | [`NativeDisperseRequest`]  |
//!
//! Submissions answer `{"tx_hash": "0x..", "status": "confirmed" | "reverted"
//! | "pending"}`. Every submission carries an `Idempotency-Key` header.
//!
//! ## Retry
//!
//! Only the allowance query is retried. Submissions are sent exactly once;
//! a transport failure after the relay accepted one is reported as ambiguous.

use std::time::Duration;

use airdrop_core::{Address, ProofRef, TokenAmount};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{endpoint_url, ClientConfig};
use crate::disperse::{
    ApproveRequest, Confirmation, DisperseAdapter, DisperseError, NativeDisperseRequest,
    TokenDisperseRequest,
};
use crate::retry::{retry_send, RetryPolicy};

/// Header carrying the deterministic batch key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct AllowanceResponse {
    allowance: TokenAmount,
}

/// Final state the relay reports for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Confirmed,
    Reverted,
    Pending,
}

/// Relay answer to a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResponse {
    pub tx_hash: String,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Disperse relay over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDisperseAdapter {
    client: reqwest::Client,
    base_url: Url,
    query_timeout: Duration,
    confirmation_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpDisperseAdapter {
    pub fn new(config: &ClientConfig) -> Result<Self, DisperseError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.relay_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|_| DisperseError::NotConfigured {
                    reason: "relay token contains characters not allowed in an HTTP header".into(),
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DisperseError::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.disperse_url.clone(),
            query_timeout: Duration::from_secs(config.timeout_secs),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            retry: RetryPolicy::default(),
        })
    }

    /// POST a submission once and interpret the relay's answer.
    async fn submit<B: Serialize + Sync>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
        idempotency_key: &str,
    ) -> Result<Confirmation, DisperseError> {
        let url = endpoint_url(&self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .timeout(self.confirmation_timeout)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            let body = resp.text().await.unwrap_or_default();
            return Err(DisperseError::Unconfirmed {
                operation: operation.to_string(),
                proof: None,
                reason: format!("relay reports an earlier submission with this idempotency key: {body}"),
            });
        }
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DisperseError::Rejected {
                operation: operation.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DisperseError::Unavailable {
                operation: operation.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let tx: TxResponse = resp.json().await.map_err(|e| DisperseError::InvalidResponse {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;
        interpret(operation, tx)
    }

    fn transport_error(&self, operation: &str, e: reqwest::Error) -> DisperseError {
        if e.is_timeout() {
            DisperseError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: u64::try_from(self.confirmation_timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if e.is_connect() {
            DisperseError::Unreachable {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        } else {
            DisperseError::Unavailable {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Map a relay answer onto the confirmation contract.
fn interpret(operation: &str, tx: TxResponse) -> Result<Confirmation, DisperseError> {
    let proof = ProofRef::new(tx.tx_hash.clone()).map_err(|e| DisperseError::InvalidResponse {
        operation: operation.to_string(),
        reason: e.to_string(),
    })?;
    match tx.status {
        TxStatus::Confirmed => Ok(Confirmation {
            proof,
            block_number: tx.block_number,
        }),
        TxStatus::Reverted => Err(DisperseError::Reverted {
            operation: operation.to_string(),
            proof,
        }),
        TxStatus::Pending => Err(DisperseError::Unconfirmed {
            operation: operation.to_string(),
            proof: Some(proof),
            reason: tx
                .reason
                .unwrap_or_else(|| "relay stopped waiting for confirmation".into()),
        }),
    }
}

impl DisperseAdapter for HttpDisperseAdapter {
    async fn token_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<TokenAmount, DisperseError> {
        let operation = "token_allowance";
        let url = endpoint_url(&self.base_url, "v1/allowance");
        let query = [
            ("token", token.as_str()),
            ("owner", owner.as_str()),
            ("spender", spender.as_str()),
        ];

        let resp = retry_send(&self.retry, "GET /v1/allowance", || {
            self.client
                .get(&url)
                .timeout(self.query_timeout)
                .query(&query)
                .send()
        })
        .await
        .map_err(|e| DisperseError::Unavailable {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = format!("HTTP {status}: {body}");
            return Err(if status.is_client_error() {
                DisperseError::Rejected {
                    operation: operation.to_string(),
                    reason,
                }
            } else {
                DisperseError::Unavailable {
                    operation: operation.to_string(),
                    reason,
                }
            });
        }

        let body: AllowanceResponse = resp.json().await.map_err(|e| DisperseError::InvalidResponse {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.allowance)
    }

    async fn approve(&self, request: &ApproveRequest) -> Result<Confirmation, DisperseError> {
        self.submit("approve", "v1/approve", request, &request.idempotency_key)
            .await
    }

    async fn disperse_token(&self, request: &TokenDisperseRequest) -> Result<Confirmation, DisperseError> {
        self.submit(
            "disperse_token",
            "v1/disperse/token",
            request,
            &request.idempotency_key,
        )
        .await
    }

    async fn disperse_native(&self, request: &NativeDisperseRequest) -> Result<Confirmation, DisperseError> {
        self.submit(
            "disperse_native",
            "v1/disperse/native",
            request,
            &request.idempotency_key,
        )
        .await
    }

    fn adapter_name(&self) -> &str {
        "http-relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(status: TxStatus) -> TxResponse {
        TxResponse {
            tx_hash: "0xfeed".into(),
            status,
            block_number: Some(7),
            reason: None,
        }
    }

    #[test]
    fn confirmed_yields_proof() {
        let c = interpret("disperse_token", tx(TxStatus::Confirmed)).unwrap();
        assert_eq!(c.proof.as_str(), "0xfeed");
        assert_eq!(c.block_number, Some(7));
    }

    #[test]
    fn reverted_is_definite() {
        let err = interpret("disperse_token", tx(TxStatus::Reverted)).unwrap_err();
        assert!(err.is_definite());
    }

    #[test]
    fn pending_is_ambiguous_and_keeps_proof() {
        let err = interpret("disperse_token", tx(TxStatus::Pending)).unwrap_err();
        assert!(!err.is_definite());
        assert!(matches!(err, DisperseError::Unconfirmed { proof: Some(_), .. }));
    }

    #[test]
    fn empty_hash_is_invalid_response() {
        let mut t = tx(TxStatus::Confirmed);
        t.tx_hash = String::new();
        let err = interpret("approve", t).unwrap_err();
        assert!(matches!(err, DisperseError::InvalidResponse { .. }));
    }

    #[test]
    fn status_wire_format_is_lowercase() {
        let parsed: TxResponse =
            serde_json::from_str(r#"{"tx_hash":"0x1","status":"reverted"}"#).unwrap();
        assert_eq!(parsed.status, TxStatus::Reverted);
    }
}
