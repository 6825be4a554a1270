// neon_pay/src/ledger.rs
// Append-only payment ledger (JSON lines) and the record endpoint

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORD TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Provider label as reported by the client. Known names match
/// case-insensitively; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    Bkash,
    Nagad,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bkash => "bkash",
            Self::Nagad => "nagad",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Provider {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "bkash" => Self::Bkash,
            "nagad" => Self::Nagad,
            _ => Self::Other(label),
        }
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub invoice: String,
    pub provider: Provider,
    pub status: String,
    #[serde(rename = "timeISO")]
    pub time_iso: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One JSON object per line, in append order. Appends within a process are
/// serialized; each record is written with a single append-mode write.
#[derive(Clone)]
pub struct Ledger {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Ledger {
    /// Open the ledger, creating the file and its parent directory if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &PaymentRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Every record in insertion order. Unparseable lines are skipped.
    pub async fn records(&self) -> Result<Vec<PaymentRecord>, LedgerError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let records = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(line = n + 1, error = %e, "[LEDGER] skipping unreadable entry");
                    None
                }
            })
            .collect();

        Ok(records)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORD ENDPOINT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub invoice: String,
    pub provider: Provider,
    pub status: String,
}

impl RecordRequest {
    fn into_record(self, now: DateTime<Utc>) -> Result<PaymentRecord, AppError> {
        if self.name.trim().chars().count() < 2 {
            return Err(AppError::validation("Name must be at least 2 characters"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than 0"));
        }
        if self.invoice.trim().is_empty() {
            return Err(AppError::validation("Invoice is required"));
        }
        if self.provider.as_str().trim().is_empty() {
            return Err(AppError::validation("Provider is required"));
        }
        if self.status.trim().is_empty() {
            return Err(AppError::validation("Status is required"));
        }

        Ok(PaymentRecord {
            name: self.name,
            amount: self.amount,
            invoice: self.invoice,
            provider: self.provider,
            status: self.status,
            time_iso: now,
        })
    }
}

#[derive(Serialize)]
pub struct RecordResponse {
    pub ok: bool,
    pub message: &'static str,
}

pub async fn record_payment_handler(
    State(state): State<AppState>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let record = request.into_record(Utc::now())?;

    state.ledger.append(&record).await?;

    tracing::info!(
        invoice = %record.invoice,
        provider = %record.provider,
        status = %record.status,
        "[LEDGER] payment recorded"
    );

    Ok(Json(RecordResponse {
        ok: true,
        message: "Payment recorded successfully",
    }))
}
