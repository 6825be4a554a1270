// neon_pay/src/intent.rs
// Client-side payment state: the in-progress intent and its saved copy

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::invoice::generate_invoice_id;

#[derive(Debug, Error, PartialEq)]
pub enum IntentError {
    #[error("Please enter your name")]
    NameRequired,
    #[error("Name must be at least 2 characters")]
    NameTooShort,
    #[error("Please enter a valid amount greater than 0")]
    InvalidAmount,
}

/// Form contents before submission.
#[derive(Debug, Clone, Default)]
pub struct PaymentDraft {
    pub name: String,
    pub amount: Decimal,
}

impl PaymentDraft {
    pub fn new(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), IntentError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(IntentError::NameRequired);
        }
        if name.chars().count() < 2 {
            return Err(IntentError::NameTooShort);
        }
        if self.amount <= Decimal::ZERO {
            return Err(IntentError::InvalidAmount);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub invoice_id: String,
}

impl PaymentIntent {
    fn is_payable(&self) -> bool {
        !self.name.is_empty() && self.amount > Decimal::ZERO
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayScreen {
    Ready(PaymentIntent),
    RedirectToEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuccessScreen {
    Show { invoice_id: String },
    RedirectToEntry,
}

/// The current intent, mirrored to a JSON file so it survives a reload.
///
/// Storage failures are logged and otherwise ignored: the in-memory copy
/// stays authoritative for the session.
pub struct IntentStore {
    path: PathBuf,
    current: Option<PaymentIntent>,
}

impl IntentStore {
    /// Open the store. Nothing is loaded until a screen asks for it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&PaymentIntent> {
        self.current.as_ref()
    }

    /// Validate the draft, assign an invoice id and save the intent.
    pub fn submit(&mut self, draft: &PaymentDraft) -> Result<PaymentIntent, IntentError> {
        draft.validate()?;

        let intent = PaymentIntent {
            name: draft.name.clone(),
            amount: draft.amount,
            invoice_id: generate_invoice_id(&draft.name),
        };
        self.save(&intent);
        self.current = Some(intent.clone());
        Ok(intent)
    }

    /// Forget the intent so a new payment can start.
    pub fn reset(&mut self) {
        self.current = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "could not clear saved intent");
            }
        }
    }

    pub fn pay_screen(&self) -> PayScreen {
        match self.resolve() {
            Some(intent) => PayScreen::Ready(intent),
            None => PayScreen::RedirectToEntry,
        }
    }

    /// Invoice to show after payment: the saved intent's, else the one
    /// carried in the redirect URL.
    pub fn success_screen(&self, url_invoice: Option<&str>) -> SuccessScreen {
        let from_intent = self
            .resolve()
            .map(|i| i.invoice_id)
            .filter(|id| !id.is_empty());

        match from_intent.or_else(|| url_invoice.filter(|s| !s.is_empty()).map(str::to_string)) {
            Some(invoice_id) => SuccessScreen::Show { invoice_id },
            None => SuccessScreen::RedirectToEntry,
        }
    }

    fn resolve(&self) -> Option<PaymentIntent> {
        self.current
            .clone()
            .filter(PaymentIntent::is_payable)
            .or_else(|| self.load().filter(PaymentIntent::is_payable))
    }

    fn load(&self) -> Option<PaymentIntent> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(intent) => Some(intent),
            Err(e) => {
                tracing::warn!(error = %e, "error parsing saved intent");
                None
            }
        }
    }

    fn save(&self, intent: &PaymentIntent) {
        let result = serde_json::to_vec_pretty(intent)
            .map_err(std::io::Error::from)
            .and_then(|bytes| std::fs::write(&self.path, bytes));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "could not save intent");
        }
    }
}
