//! Central error type with HTTP status code mapping.
//!
//! [`SyncError`] is the single error enum for the whole service. Variants
//! follow the failure taxonomy of the synchronization pipeline: transport
//! failures are retriable and drive the reconnection supervisor, read and
//! decode failures are surfaced or skipped, and transaction-submission
//! failures are reported verbatim to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ContractTag;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "transport error: ws stream ended",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`SyncError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                |
/// |-----------|-----------------------|----------------------------|
/// | 1000–1999 | Configuration         | 400 Bad Request            |
/// | 2000–2999 | Chain / transport     | 502 / 503                  |
/// | 3000–3999 | Server / persistence  | 500 Internal Server Error  |
/// | 4000–4999 | Transaction lifecycle | 422 / 504                  |
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// The node connection dropped or an RPC request failed in transit.
    /// Retriable; the reconnection supervisor reacts to these.
    #[error("transport error: {0}")]
    Transport(String),

    /// A one-shot read call failed. Surfaced to the caller, never retried
    /// automatically.
    #[error("read call failed: {0}")]
    Read(String),

    /// An on-chain log did not match the expected event signature. Logged
    /// and skipped; never crashes the pipeline.
    #[error("decode error: {0}")]
    Decode(String),

    /// A configured contract address has no code deployed. The listener
    /// for that contract is disabled with a warning.
    #[error("no contract code deployed for {0}")]
    DeploymentMissing(ContractTag),

    /// The connected wallet refused to sign. Non-retriable, surfaced
    /// verbatim.
    #[error("user rejected transaction: {0}")]
    UserRejection(String),

    /// Gas estimation / simulation indicates the call would revert
    /// on-chain. Non-retriable; the reason explains why.
    #[error("transaction would revert: {0}")]
    SimulatedRevert(String),

    /// A mined transaction reverted on-chain.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// A submitted transaction was not confirmed within the local timeout.
    /// Its real on-chain fate is unaffected.
    #[error("transaction confirmation timed out")]
    ConfirmationTimeout,

    /// Mirror Store (persistence collaborator) failure.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid or unparsable configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::Transport(_) => 2001,
            Self::Decode(_) => 2002,
            Self::Read(_) => 2003,
            Self::DeploymentMissing(_) => 2004,
            Self::Internal(_) => 3000,
            Self::Store(_) => 3001,
            Self::UserRejection(_) => 4001,
            Self::SimulatedRevert(_) => 4002,
            Self::Reverted(_) => 4003,
            Self::ConfirmationTimeout => 4004,
        }
    }

    /// Returns `true` if the operation may be retried (transient failures
    /// of the transport or store).
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Store(_))
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::Read(_) | Self::Decode(_) => StatusCode::BAD_GATEWAY,
            Self::Transport(_) | Self::DeploymentMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UserRejection(_) | Self::SimulatedRevert(_) | Self::Reverted(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::ConfirmationTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
