//! API error type.
//!
//! Every failing handler answers with `{ ok: false, error, details? }`.
//! `error` is a short human message; `details` carries the provider body or
//! transport message verbatim when there is one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::bkash_client::GatewayError;
use crate::ledger::LedgerError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request fields (400).
    #[error("{0}")]
    Validation(String),

    /// No valid gateway token in the cache (401).
    #[error("Invalid or expired token. Please get a new token first.")]
    Unauthorized,

    /// A gateway call failed. `context` is the user-facing summary (500).
    #[error("{context}")]
    Gateway {
        context: &'static str,
        #[source]
        source: GatewayError,
    },

    /// Ledger could not be written (500).
    #[error("Failed to record payment")]
    Ledger(#[from] LedgerError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn gateway(context: &'static str, source: GatewayError) -> Self {
        Self::Gateway { context, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Gateway { .. } | Self::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// An invalid token cache is the caller's problem (401); anything else
    /// is reported under `context`.
    pub fn from_gateway(context: &'static str, err: GatewayError) -> Self {
        match err {
            GatewayError::NoValidToken => Self::Unauthorized,
            other => Self::gateway(context, other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let details = match &self {
            Self::Gateway { source, .. } => {
                tracing::error!(error = %source, "[BKASH] {}", self);
                Some(source.details())
            }
            Self::Ledger(err) => {
                tracing::error!(error = %err, "[LEDGER] failed to record payment");
                None
            }
            Self::Unauthorized => {
                tracing::warn!("[BKASH] request rejected, token cache invalid");
                None
            }
            Self::Validation(msg) => {
                tracing::debug!(%msg, "validation failed");
                None
            }
        };

        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
