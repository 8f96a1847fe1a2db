//! HTTP adapter for the upstream PIX processor.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use pix_types::{
    Amount, DomainError, GatewayError, LineItem, PaymentRequest, PixGateway, PixTransaction, ShippingAddress,
    TaxDocument, TransactionId, TransactionSnapshot, TransactionStatus,
};

use crate::normalizer;

/// Default processor endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.payevo.com.br/functions/v1";

/// Default bound on every upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the secret is presented to the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Basic base64(secret:x)`
    #[default]
    Basic,
    /// `Authorization: Bearer secret`
    Bearer,
}

impl std::str::FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "bearer" => Ok(AuthScheme::Bearer),
            other => Err(format!("Unknown auth scheme: {}", other)),
        }
    }
}

/// Upstream connection settings. Read-only after startup.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub secret: Option<String>,
    pub auth: AuthScheme,
    pub timeout: Duration,
    pub validity_secs: u32,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("validity_secs", &self.validity_secs)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionBody<'a> {
    payment_method: &'static str,
    amount: i64,
    customer: CustomerBody<'a>,
    items: Vec<ItemBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shipping: Option<ShippingBody<'a>>,
    pix: PixOptions,
}

#[derive(Debug, Serialize)]
struct CustomerBody<'a> {
    name: &'a str,
    email: &'a str,
    document: TaxDocument,
    phone: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    title: &'a str,
    quantity: u32,
    unit_price: i64,
    description: &'a str,
}

impl<'a> From<&'a LineItem> for ItemBody<'a> {
    fn from(item: &'a LineItem) -> Self {
        Self {
            title: &item.title,
            quantity: item.quantity,
            unit_price: item.price,
            description: &item.description,
        }
    }
}

#[derive(Debug, Serialize)]
struct ShippingBody<'a> {
    address: &'a ShippingAddress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PixOptions {
    expires_in_seconds: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway talking to the real processor over HTTPS.
pub struct UpstreamGateway {
    client: Client,
    base_url: String,
    secret: String,
    auth: AuthScheme,
    validity_secs: u32,
}

impl UpstreamGateway {
    /// Builds the gateway. A missing secret is a configuration error.
    pub fn new(config: UpstreamConfig) -> Result<Self, GatewayError> {
        let secret = config
            .secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Configuration("PIX_UPSTREAM_SECRET is not set".into())
            })?;

        if config.validity_secs == 0 {
            return Err(GatewayError::Configuration(
                "PIX validity window must be positive".into(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret,
            auth: config.auth,
            validity_secs: config.validity_secs,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth {
            AuthScheme::Basic => request.basic_auth(&self.secret, Some("x")),
            AuthScheme::Bearer => request.bearer_auth(&self.secret),
        }
    }

    fn transactions_url(&self) -> String {
        format!("{}/transactions", self.base_url)
    }

    fn transaction_url(&self, id: &TransactionId) -> String {
        format!("{}/transactions/{}", self.base_url, id)
    }

    /// Upstream request body for a payment request.
    pub fn build_payload(&self, request: &PaymentRequest) -> Result<Value, GatewayError> {
        let customer = &request.customer;
        let body = CreateTransactionBody {
            payment_method: "PIX",
            amount: request.amount.cents(),
            customer: CustomerBody {
                name: &customer.full_name,
                email: &customer.email,
                document: customer.document(),
                phone: &customer.phone,
            },
            items: request.items.iter().map(ItemBody::from).collect(),
            ip: request.ip.as_deref(),
            shipping: request
                .shipping
                .as_ref()
                .map(|address| ShippingBody { address }),
            pix: PixOptions {
                expires_in_seconds: self.validity_secs,
            },
        };
        serde_json::to_value(body).map_err(|e| {
            GatewayError::InvalidRequest(DomainError::Validation(format!(
                "Payment request cannot be encoded: {}",
                e
            )))
        })
    }

    /// Sends a request and splits the outcome into status + JSON body.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Value), GatewayError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            warn!("Upstream request failed: {}", e);
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            GatewayError::UpstreamUnavailable(reason)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            warn!("Failed to read upstream response body: {}", e);
            GatewayError::UpstreamUnavailable(e.to_string())
        })?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok((status, body))
    }

    fn rejected(status: StatusCode, body: Value) -> GatewayError {
        warn!(status = status.as_u16(), response = %body, "Upstream rejected request");
        let message = normalizer::error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Upstream error")
                .to_string()
        });
        GatewayError::UpstreamRejected {
            status: status.as_u16(),
            message,
            details: body,
        }
    }

    fn snapshot(requested: &TransactionId, body: &Value) -> TransactionSnapshot {
        let transaction_id = normalizer::transaction_id(body)
            .and_then(|id| TransactionId::new(id).ok())
            .unwrap_or_else(|| requested.clone());
        if &transaction_id != requested {
            warn!(%requested, returned = %transaction_id, "Upstream returned a different transaction id");
        }
        TransactionSnapshot {
            transaction_id,
            status: normalizer::status(body),
            amount: normalizer::amount_cents(body).and_then(|c| Amount::from_cents(c).ok()),
            paid_at: normalizer::paid_at(body),
        }
    }

    fn expiry(&self, created_at: DateTime<Utc>, body: &Value) -> DateTime<Utc> {
        normalizer::expires_at(body)
            .filter(|expires_at| *expires_at > created_at)
            .unwrap_or_else(|| {
                created_at + chrono::Duration::seconds(i64::from(self.validity_secs))
            })
    }
}

#[async_trait::async_trait]
impl PixGateway for UpstreamGateway {
    #[instrument(skip(self, request), fields(amount = request.amount.cents()))]
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError> {
        request.validate()?;

        let payload = self.build_payload(request)?;
        debug!(payload = %payload, "Creating PIX transaction upstream");

        let created_at = Utc::now();
        let (status, body) = self
            .send(self.client.post(self.transactions_url()).json(&payload))
            .await?;

        if !status.is_success() {
            return Err(Self::rejected(status, body));
        }

        let pix = normalizer::normalize_pix(&body).map_err(|e| {
            error!(response = %body, "No PIX data in upstream response");
            e
        })?;
        debug!(source = ?pix.source, "Located PIX data");

        let id = normalizer::transaction_id(&body)
            .and_then(|id| TransactionId::new(id).ok())
            .ok_or_else(|| {
                error!(response = %body, "No transaction id in upstream response");
                GatewayError::MissingPixData {
                    keys: body
                        .as_object()
                        .map(|o| o.keys().cloned().collect())
                        .unwrap_or_default(),
                }
            })?;

        if let Some(echoed) = normalizer::amount_cents(&body) {
            if echoed != request.amount.cents() {
                warn!(
                    requested = request.amount.cents(),
                    echoed, "Upstream echoed a different amount"
                );
            }
        }

        let transaction = PixTransaction::with_expiry(
            id,
            normalizer::status(&body),
            request.amount,
            pix.data,
            created_at,
            self.expiry(created_at, &body),
        )?;

        info!(transaction_id = %transaction.id(), status = %transaction.status(), "PIX transaction created");
        Ok(transaction)
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let (status, body) = self.send(self.client.get(self.transaction_url(id))).await?;

        match status {
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(id.to_string())),
            s if s.is_success() => Ok(Self::snapshot(id, &body)),
            s => Err(Self::rejected(s, body)),
        }
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let (status, body) = self
            .send(self.client.delete(self.transaction_url(id)))
            .await?;

        match status {
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(id.to_string())),
            s if s.is_success() => {
                debug!(upstream_status = ?body.get("status"), "Transaction cancelled upstream");
                let mut snapshot = Self::snapshot(id, &body);
                snapshot.status = TransactionStatus::Refunded;
                Ok(snapshot)
            }
            s => Err(Self::rejected(s, body)),
        }
    }

    fn kind(&self) -> &'static str {
        "upstream"
    }

    fn is_configured(&self) -> bool {
        true
    }
}
