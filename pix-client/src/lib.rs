//! # PIX Client SDK
//!
//! A typed Rust client for the PIX checkout proxy API.
//!
//! `PixClient` also implements `PixGateway`, so a checkout session can run
//! against a deployed proxy instead of talking to the processor directly.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use pix_types::{
    Amount, CancelResponse, CreatePixRequest, CustomerInput, DEFAULT_VALIDITY_SECS, GatewayError,
    HealthResponse, PaymentRequest, PixData, PixGateway, PixPaymentResponse, PixTransaction,
    TransactionId, TransactionSnapshot, TransactionStatusResponse,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api {
                status: 404,
                message,
            } => GatewayError::NotFound(message),
            ClientError::Api { status, message } => GatewayError::UpstreamRejected {
                status,
                message,
                details: serde_json::Value::Null,
            },
            ClientError::Http(e) => GatewayError::UpstreamUnavailable(e.to_string()),
            ClientError::Json(e) => GatewayError::UpstreamRejected {
                status: 502,
                message: format!("Invalid response from proxy: {}", e),
                details: serde_json::Value::Null,
            },
        }
    }
}

/// PIX checkout proxy client.
pub struct PixClient {
    base_url: String,
    timeout: Option<Duration>,
    validity_secs: u32,
    http: Client,
}

impl PixClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
            validity_secs: DEFAULT_VALIDITY_SECS,
            http: Client::new(),
        }
    }

    /// Bounds every request to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validity assumed when the proxy does not report an expiry.
    pub fn with_validity_secs(mut self, validity_secs: u32) -> Self {
        self.validity_secs = validity_secs;
        self
    }

    /// Reads the proxy's health report.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.http.get(self.url("/health"))).await
    }

    /// Creates a PIX charge.
    pub async fn create_pix(
        &self,
        req: &CreatePixRequest,
    ) -> Result<PixPaymentResponse, ClientError> {
        self.send(self.http.post(self.url("/api/payments/pix")).json(req))
            .await
    }

    /// Gets the status of a transaction.
    pub async fn get_transaction(&self, id: &str) -> Result<TransactionStatusResponse, ClientError> {
        self.send(self.http.get(self.url(&transaction_path(id))))
            .await
    }

    /// Cancels a transaction.
    pub async fn cancel_transaction(&self, id: &str) -> Result<CancelResponse, ClientError> {
        self.send(self.http.delete(self.url(&transaction_path(id))))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, mut req: RequestBuilder) -> Result<T, ClientError> {
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    ["message", "error"]
                        .iter()
                        .find_map(|key| v.get(*key).and_then(|e| e.as_str()).map(String::from))
                })
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn transaction_path(id: &str) -> String {
    format!("/api/payments/transaction/{}", id)
}

fn create_request(request: &PaymentRequest) -> CreatePixRequest {
    CreatePixRequest {
        amount: request.amount.cents(),
        customer: CustomerInput {
            name: request.customer.full_name.clone(),
            email: request.customer.email.clone(),
            document: request.customer.tax_id.clone(),
            phone: request.customer.phone.clone(),
        },
        items: request.items.clone(),
        ip: request.ip.clone(),
        shipping: request.shipping.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement PixGateway for PixClient
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PixGateway for PixClient {
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError> {
        request.validate()?;
        let resp = self.create_pix(&create_request(request)).await?;

        let created_at = Utc::now();
        let expires_at = resp
            .expires_at
            .filter(|at| *at > created_at)
            .unwrap_or_else(|| created_at + ChronoDuration::seconds(i64::from(self.validity_secs)));
        let pix = PixData {
            copy_and_paste: resp
                .pix
                .copy_and_paste
                .unwrap_or_else(|| resp.pix.qrcode.clone()),
            qr_code_payload: resp.pix.qrcode,
            qr_code_image_data: resp.pix.qrcode_base64,
        };

        Ok(PixTransaction::with_expiry(
            TransactionId::new(resp.transaction_id)?,
            resp.status,
            Amount::from_cents(resp.amount)?,
            pix,
            created_at,
            expires_at,
        )?)
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let resp = PixClient::get_transaction(self, id.as_str()).await?;
        Ok(TransactionSnapshot {
            transaction_id: TransactionId::new(resp.transaction_id)?,
            status: resp.status,
            amount: resp.amount.map(Amount::from_cents).transpose()?,
            paid_at: resp.paid_at,
        })
    }

    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let resp = PixClient::cancel_transaction(self, id.as_str()).await?;
        Ok(TransactionSnapshot {
            transaction_id: TransactionId::new(resp.transaction_id)?,
            status: resp.status,
            amount: None,
            paid_at: None,
        })
    }

    fn kind(&self) -> &'static str {
        "proxy"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use pix_gateway::SimulatedGateway;
    use pix_hex::{PixService, inbound::HttpServer};
    use pix_types::{Customer, LineItem, TransactionStatus, ValidationMode};

    #[test]
    fn test_client_creation() {
        let client = PixClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
        assert_eq!(client.validity_secs, 900);
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = PixClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_error_maps_to_gateway_error() {
        let not_found = GatewayError::from(ClientError::Api {
            status: 404,
            message: "Transaction not found: tx".into(),
        });
        assert!(matches!(not_found, GatewayError::NotFound(_)));

        let rejected = GatewayError::from(ClientError::Api {
            status: 422,
            message: "Documento inválido".into(),
        });
        assert!(matches!(
            rejected,
            GatewayError::UpstreamRejected { status: 422, .. }
        ));
    }

    /// Serves the proxy with the sandbox gateway and returns its base URL.
    async fn spawn_proxy() -> String {
        let service = PixService::new(SimulatedGateway::new(900), ValidationMode::Strict);
        let router = HttpServer::with_rate_limit(service, 100).router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("http://{}", addr)
    }

    fn payment_request() -> PaymentRequest {
        let amount = Amount::from_cents(4250).unwrap();
        PaymentRequest {
            amount,
            customer: Customer {
                full_name: "Maria Silva".into(),
                email: "maria@ex.com".into(),
                tax_id: "11144477735".into(),
                phone: "11987654321".into(),
            },
            items: vec![LineItem::single("Serviço", "Pagamento", amount)],
            ip: None,
            shipping: None,
        }
    }

    #[tokio::test]
    async fn test_health_against_proxy() {
        let client = PixClient::new(spawn_proxy().await);
        let health = client.health().await.unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.gateway, "simulated");
        assert!(!health.credentials_configured);
    }

    #[tokio::test]
    async fn test_gateway_roundtrip_against_proxy() {
        let client = PixClient::new(spawn_proxy().await).with_timeout(Duration::from_secs(5));

        let tx = client
            .create_pix_transaction(&payment_request())
            .await
            .unwrap();
        assert_eq!(tx.status(), TransactionStatus::WaitingPayment);
        assert_eq!(tx.amount().cents(), 4250);
        assert!(tx.pix().qr_code_payload.starts_with("00020126"));

        let snapshot = PixGateway::get_transaction(&client, tx.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::WaitingPayment);
        assert_eq!(snapshot.transaction_id, *tx.id());

        let cancelled = PixGateway::cancel_transaction(&client, tx.id())
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Refunded);
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_found() {
        let client = PixClient::new(spawn_proxy().await);
        let id = TransactionId::new("missing").unwrap();

        let err = PixGateway::get_transaction(&client, &id).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validation_error_carries_message() {
        let client = PixClient::new(spawn_proxy().await);
        let mut req = create_request(&payment_request());
        req.customer.document = "111.111.111-11".into();

        let err = client.create_pix(&req).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
