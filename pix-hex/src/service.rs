//! PIX Application Service
//!
//! Turns proxy requests into gateway calls through the `PixGateway` port.
//! Contains NO infrastructure logic - pure orchestration.

use pix_types::{
    Amount, AppError, CancelResponse, CreatePixRequest, CustomerForm, HealthResponse, LineItem,
    PaymentRequest, PixGateway, PixPaymentResponse, TransactionId, TransactionStatusResponse,
    ValidationMode, validation,
};

/// Title of the line item used when a request carries none.
pub const DEFAULT_ITEM_TITLE: &str = "Pagamento PIX";
/// Description of the line item used when a request carries none.
pub const DEFAULT_ITEM_DESCRIPTION: &str = "Pagamento via PIX";

/// Application service for the proxy endpoints.
///
/// Generic over `G: PixGateway` - the adapter is injected at compile time.
/// This enables:
/// - Running against the real processor or the sandbox
/// - Testing with an in-memory gateway
pub struct PixService<G: PixGateway> {
    gateway: G,
    validation: ValidationMode,
}

impl<G: PixGateway> PixService<G> {
    pub fn new(gateway: G, validation: ValidationMode) -> Self {
        Self {
            gateway,
            validation,
        }
    }

    /// Returns a reference to the underlying gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validation
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // PIX Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Validates the request and creates a PIX charge.
    ///
    /// `peer_ip` is used when the request does not name the payer's IP.
    pub async fn create_pix(
        &self,
        req: CreatePixRequest,
        peer_ip: Option<String>,
    ) -> Result<PixPaymentResponse, AppError> {
        let amount = Amount::from_cents(req.amount)?;
        let customer =
            validation::validate_customer(self.validation, &CustomerForm::from(req.customer))?;

        let items = if req.items.is_empty() {
            vec![LineItem::single(
                DEFAULT_ITEM_TITLE,
                DEFAULT_ITEM_DESCRIPTION,
                amount,
            )]
        } else {
            req.items
        };

        let request = PaymentRequest {
            amount,
            customer,
            items,
            ip: req.ip.filter(|ip| !ip.trim().is_empty()).or(peer_ip),
            shipping: req.shipping,
        };
        request.validate()?;

        let tx = self.gateway.create_pix_transaction(&request).await?;
        Ok(PixPaymentResponse::from(&tx))
    }

    /// Queries the current status of a transaction.
    pub async fn get_transaction(&self, id: &str) -> Result<TransactionStatusResponse, AppError> {
        let id = TransactionId::new(id)?;
        let snapshot = self.gateway.get_transaction(&id).await?;
        Ok(TransactionStatusResponse::from(&snapshot))
    }

    /// Cancels (refunds) a transaction.
    pub async fn cancel_transaction(&self, id: &str) -> Result<CancelResponse, AppError> {
        let id = TransactionId::new(id)?;
        let snapshot = self.gateway.cancel_transaction(&id).await?;
        Ok(CancelResponse {
            status: snapshot.status,
            transaction_id: snapshot.transaction_id.to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Health
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".into(),
            gateway: self.gateway.kind().into(),
            credentials_configured: self.gateway.is_configured(),
        }
    }
}
