// neon_pay/src/bkash_handler.rs
// HTTP handlers for the bKash checkout flow

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bkash_client::{CreatePayment, ExecutedPayment, GatewayError, GatewayOutcome};
use crate::error::AppError;
use crate::token_cache::TokenSource;
use crate::AppState;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct TokenResponse {
    pub ok: bool,
    pub message: &'static str,
    pub expires_at: DateTime<Utc>,
}

pub async fn token_handler(State(state): State<AppState>) -> Result<Json<TokenResponse>, AppError> {
    let (token, source) = state
        .bkash
        .ensure_token()
        .await
        .map_err(|e| AppError::from_gateway("Failed to get bKash token", e))?;

    let message = match source {
        TokenSource::Cached => "Token already valid",
        TokenSource::Granted => {
            tracing::info!("[BKASH] 🔑 Token obtained");
            "Token obtained successfully"
        }
    };

    Ok(Json(TokenResponse {
        ok: true,
        message,
        expires_at: token.expires_at,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CREATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payer_reference: Option<String>,
    pub merchant_invoice_number: Option<String>,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub ok: bool,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    #[serde(rename = "gatewayUrl")]
    pub gateway_url: Option<String>,
    pub message: &'static str,
}

pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateBody>, JsonRejection>,
) -> Result<Json<CreateResponse>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::validation(e.body_text()))?;

    if body.amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be greater than 0"));
    }
    let merchant_invoice_number = body
        .merchant_invoice_number
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::validation("merchantInvoiceNumber is required"))?;

    let created = state
        .bkash
        .create_payment(&CreatePayment {
            amount: body.amount,
            payer_reference: body.payer_reference,
            merchant_invoice_number,
        })
        .await
        .map_err(|e| AppError::from_gateway("Failed to create bKash payment", e))?;

    tracing::info!(payment_id = %created.payment_id, amount = %body.amount, "[BKASH] 🧾 Payment created");

    Ok(Json(CreateResponse {
        ok: true,
        payment_id: created.payment_id,
        gateway_url: created.gateway_url,
        message: "Payment created successfully",
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXECUTE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    #[serde(rename = "paymentID")]
    pub payment_id: Option<String>,
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub ok: bool,
    pub status: &'static str,
    #[serde(rename = "trxID")]
    pub trx_id: Option<String>,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub amount: Value,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ExecuteFailure {
    pub ok: bool,
    pub status: &'static str,
    pub error: &'static str,
    pub details: Value,
}

impl IntoResponse for GatewayOutcome<ExecutedPayment> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(payment) => Json(ExecuteResponse {
                ok: true,
                status: "completed",
                trx_id: payment.trx_id,
                payment_id: payment.payment_id,
                amount: payment.amount,
                message: "Payment executed successfully",
            })
            .into_response(),
            // The gateway answered; the payment just didn't go through.
            Self::BusinessFailure { status, details } => {
                tracing::warn!(status = ?status, "[BKASH] ❌ Payment not completed");
                (
                    StatusCode::OK,
                    Json(ExecuteFailure {
                        ok: false,
                        status: "failed",
                        error: "Payment execution failed",
                        details,
                    }),
                )
                    .into_response()
            }
            Self::TransportFailure(GatewayError::NoValidToken) => AppError::Unauthorized.into_response(),
            Self::TransportFailure(err) => {
                tracing::error!(error = %err, "[BKASH] Failed to execute bKash payment");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ExecuteFailure {
                        ok: false,
                        status: "error",
                        error: "Failed to execute bKash payment",
                        details: err.details(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

pub async fn execute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteBody>, JsonRejection>,
) -> Result<GatewayOutcome<ExecutedPayment>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let payment_id = body
        .payment_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::validation("Payment ID is required"))?;

    let outcome = state.bkash.execute_payment(&payment_id).await;
    if let GatewayOutcome::Success(payment) = &outcome {
        tracing::info!(payment_id = %payment.payment_id, trx_id = ?payment.trx_id, "[BKASH] 💰 Payment executed");
    }
    Ok(outcome)
}
