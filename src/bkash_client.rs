// neon_pay/src/bkash_client.rs
// bKash tokenized checkout client: grant -> create -> execute

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::BkashConfig;
use crate::token_cache::{GatewayToken, TokenCache, TokenSource};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED CHECKOUT PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

const CHECKOUT_MODE: &str = "0011";
const CALLBACK_URL: &str = "https://yoursite.com/callback";
const CURRENCY: &str = "BDT";
const INTENT: &str = "sale";
const DEFAULT_PAYER_REFERENCE: &str = "test-payer";
const STATUS_COMPLETED: &str = "Completed";

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS & OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Token cache was invalid; no request was sent.
    #[error("no valid bKash token")]
    NoValidToken,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer. `body` is the provider payload as received.
    #[error("gateway responded with HTTP {status}")]
    Rejected { status: u16, body: Value },

    /// 2xx answer without the field we needed.
    #[error("unexpected gateway response: {reason}")]
    Malformed { reason: &'static str, body: Value },
}

impl GatewayError {
    /// Provider detail to hand back to the caller verbatim.
    pub fn details(&self) -> Value {
        match self {
            Self::Rejected { body, .. } | Self::Malformed { body, .. } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

/// Result of a gateway call that can fail for business reasons as well as
/// transport ones.
#[derive(Debug)]
pub enum GatewayOutcome<T> {
    Success(T),
    /// The gateway answered, but the payment is not complete.
    BusinessFailure {
        status: Option<String>,
        details: Value,
    },
    TransportFailure(GatewayError),
}

impl<T> From<GatewayError> for GatewayOutcome<T> {
    fn from(err: GatewayError) -> Self {
        Self::TransportFailure(err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct GrantRequest<'a> {
    app_key: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct GrantResponse {
    id_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    mode: &'static str,
    payer_reference: &'a str,
    #[serde(rename = "callbackURL")]
    callback_url: &'static str,
    amount: String,
    currency: &'static str,
    intent: &'static str,
    merchant_invoice_number: &'a str,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "paymentID")]
    payment_id: Option<String>,
    #[serde(rename = "bkashURL")]
    bkash_url: Option<String>,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    #[serde(rename = "paymentID")]
    payment_id: &'a str,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    #[serde(rename = "transactionStatus")]
    transaction_status: Option<String>,
    #[serde(rename = "trxID")]
    trx_id: Option<String>,
    #[serde(rename = "paymentID")]
    payment_id: Option<String>,
    #[serde(default)]
    amount: Value,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub amount: Decimal,
    pub payer_reference: Option<String>,
    pub merchant_invoice_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub gateway_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedPayment {
    pub trx_id: Option<String>,
    pub payment_id: String,
    /// Passed through as the gateway sent it (bKash uses a decimal string).
    pub amount: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BkashClient {
    config: BkashConfig,
    http: Client,
    tokens: TokenCache,
}

impl BkashClient {
    pub fn new(config: BkashConfig, tokens: TokenCache) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Ask the gateway for a fresh token. Does not touch the cache.
    pub async fn grant_token(&self) -> Result<String, GatewayError> {
        let body = GrantRequest {
            app_key: &self.config.app_key,
            app_secret: &self.config.app_secret,
        };

        let request = self
            .http
            .post(self.config.endpoint("token/grant"))
            .header("Accept", "application/json")
            .header("username", &self.config.username)
            .header("password", &self.config.password)
            .json(&body);

        let raw = send(request).await?;
        let parsed: GrantResponse = serde_json::from_value(raw.clone()).map_err(|_| {
            GatewayError::Malformed {
                reason: "grant response is not an object",
                body: raw.clone(),
            }
        })?;

        match parsed.id_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(GatewayError::Malformed {
                reason: "missing id_token",
                body: raw,
            }),
        }
    }

    /// Cached token, or a newly granted one when the cache is invalid.
    pub async fn ensure_token(&self) -> Result<(GatewayToken, TokenSource), GatewayError> {
        self.tokens.get_or_refresh(|| self.grant_token()).await
    }

    async fn authorized_token(&self) -> Result<String, GatewayError> {
        self.tokens
            .current()
            .await
            .map(|t| t.access_token)
            .ok_or(GatewayError::NoValidToken)
    }

    pub async fn create_payment(&self, payment: &CreatePayment) -> Result<CreatedPayment, GatewayError> {
        let token = self.authorized_token().await?;

        let body = CreateRequest {
            mode: CHECKOUT_MODE,
            payer_reference: payment
                .payer_reference
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_PAYER_REFERENCE),
            callback_url: CALLBACK_URL,
            amount: payment.amount.to_string(),
            currency: CURRENCY,
            intent: INTENT,
            merchant_invoice_number: &payment.merchant_invoice_number,
        };

        let request = self
            .http
            .post(self.config.endpoint("create"))
            .header("Accept", "application/json")
            .header("authorization", token)
            .header("x-app-key", &self.config.app_key)
            .json(&body);

        let raw = send(request).await?;
        let parsed: Option<CreateResponse> = serde_json::from_value(raw.clone()).ok();

        match parsed {
            Some(CreateResponse {
                payment_id: Some(payment_id),
                bkash_url,
            }) if !payment_id.is_empty() => Ok(CreatedPayment {
                payment_id,
                gateway_url: bkash_url,
            }),
            _ => Err(GatewayError::Malformed {
                reason: "missing paymentID",
                body: raw,
            }),
        }
    }

    /// Execute a created payment. Only `transactionStatus == "Completed"`
    /// counts as success.
    pub async fn execute_payment(&self, payment_id: &str) -> GatewayOutcome<ExecutedPayment> {
        let token = match self.authorized_token().await {
            Ok(token) => token,
            Err(err) => return err.into(),
        };

        let request = self
            .http
            .post(self.config.endpoint("execute"))
            .header("Accept", "application/json")
            .header("authorization", token)
            .header("x-app-key", &self.config.app_key)
            .json(&ExecuteRequest { payment_id });

        let raw = match send(request).await {
            Ok(raw) => raw,
            Err(err) => return err.into(),
        };

        classify_execute(payment_id, raw)
    }
}

fn classify_execute(requested_id: &str, raw: Value) -> GatewayOutcome<ExecutedPayment> {
    let parsed: Option<ExecuteResponse> = serde_json::from_value(raw.clone()).ok();

    match parsed {
        Some(resp) if resp.transaction_status.as_deref() == Some(STATUS_COMPLETED) => {
            GatewayOutcome::Success(ExecutedPayment {
                trx_id: resp.trx_id,
                payment_id: resp.payment_id.unwrap_or_else(|| requested_id.to_string()),
                amount: resp.amount,
            })
        }
        Some(resp) => GatewayOutcome::BusinessFailure {
            status: resp.transaction_status,
            details: raw,
        },
        None => GatewayOutcome::BusinessFailure {
            status: None,
            details: raw,
        },
    }
}

/// Send a request and return its JSON body. Non-JSON bodies come back as a
/// JSON string so they can still be passed through as details.
async fn send(request: reqwest::RequestBuilder) -> Result<Value, GatewayError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    if !status.is_success() {
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_status_is_success() {
        let raw = json!({
            "transactionStatus": "Completed",
            "trxID": "TRX123",
            "paymentID": "PAY1",
            "amount": "100.00",
            "statusCode": "0000"
        });
        match classify_execute("PAY1", raw) {
            GatewayOutcome::Success(p) => {
                assert_eq!(p.trx_id.as_deref(), Some("TRX123"));
                assert_eq!(p.payment_id, "PAY1");
                assert_eq!(p.amount, json!("100.00"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn status_match_is_exact() {
        for status in ["completed", "COMPLETED", "Completed ", "Pending", "Initiated"] {
            let raw = json!({ "transactionStatus": status, "paymentID": "PAY1" });
            match classify_execute("PAY1", raw.clone()) {
                GatewayOutcome::BusinessFailure { status: s, details } => {
                    assert_eq!(s.as_deref(), Some(status));
                    assert_eq!(details, raw);
                }
                other => panic!("{} should fail, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn missing_status_is_business_failure() {
        let raw = json!({ "statusCode": "2056", "statusMessage": "Invalid Payment State" });
        assert!(matches!(
            classify_execute("PAY1", raw),
            GatewayOutcome::BusinessFailure { status: None, .. }
        ));
    }

    #[test]
    fn non_object_body_is_business_failure() {
        let raw = Value::String("<html>oops</html>".to_string());
        assert!(matches!(
            classify_execute("PAY1", raw),
            GatewayOutcome::BusinessFailure { status: None, .. }
        ));
    }

    #[test]
    fn payment_id_falls_back_to_request() {
        let raw = json!({ "transactionStatus": "Completed", "trxID": "T" });
        match classify_execute("PAY9", raw) {
            GatewayOutcome::Success(p) => assert_eq!(p.payment_id, "PAY9"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn create_request_uses_fixed_parameters() {
        let body = CreateRequest {
            mode: CHECKOUT_MODE,
            payer_reference: DEFAULT_PAYER_REFERENCE,
            callback_url: CALLBACK_URL,
            amount: Decimal::new(10050, 2).to_string(),
            currency: CURRENCY,
            intent: INTENT,
            merchant_invoice_number: "alice-1234",
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["mode"], "0011");
        assert_eq!(v["currency"], "BDT");
        assert_eq!(v["intent"], "sale");
        assert_eq!(v["amount"], "100.50");
        assert_eq!(v["payerReference"], "test-payer");
        assert_eq!(v["merchantInvoiceNumber"], "alice-1234");
        assert_eq!(v["callbackURL"], CALLBACK_URL);
    }

    #[test]
    fn details_prefer_provider_body() {
        let err = GatewayError::Rejected {
            status: 401,
            body: json!({ "message": "Unauthorized" }),
        };
        assert_eq!(err.details(), json!({ "message": "Unauthorized" }));
        assert_eq!(
            GatewayError::NoValidToken.details(),
            json!("no valid bKash token")
        );
    }

    #[tokio::test]
    async fn create_without_token_fails_fast() {
        // Unroutable base: any outbound call would error differently.
        let client = BkashClient::new(
            BkashConfig::for_fake_gateway("http://127.0.0.1:1"),
            TokenCache::new(),
        )
        .unwrap();
        let err = client
            .create_payment(&CreatePayment {
                amount: Decimal::ONE_HUNDRED,
                payer_reference: None,
                merchant_invoice_number: "alice-1234".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoValidToken));
    }

    #[tokio::test]
    async fn execute_with_expired_token_fails_fast() {
        let tokens = TokenCache::with_token("old", chrono::Utc::now() - chrono::Duration::minutes(1));
        let client = BkashClient::new(BkashConfig::for_fake_gateway("http://127.0.0.1:1"), tokens).unwrap();
        assert!(matches!(
            client.execute_payment("PAY1").await,
            GatewayOutcome::TransportFailure(GatewayError::NoValidToken)
        ));
    }
}
