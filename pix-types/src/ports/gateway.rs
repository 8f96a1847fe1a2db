//! Payment gateway port.
//!
//! Adapters: the HTTP upstream processor, the in-memory sandbox, and the
//! proxy client used by terminal checkouts.

use std::sync::Arc;

use crate::domain::{PaymentRequest, PixTransaction, TransactionId, TransactionSnapshot};
use crate::error::GatewayError;

/// Creates, queries and cancels PIX transactions.
///
/// Implementations never retry: a failed create may have been partially
/// processed upstream, so only the caller can decide to submit again.
#[async_trait::async_trait]
pub trait PixGateway: Send + Sync + 'static {
    /// Creates a PIX charge and returns the canonical transaction.
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError>;

    /// Read-only status query.
    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError>;

    /// Cancels a transaction. Returns the resulting snapshot (`refunded`).
    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError>;

    /// Short name of the adapter, reported by health checks.
    fn kind(&self) -> &'static str;

    /// Whether credentials for the processor are present.
    fn is_configured(&self) -> bool;
}

#[async_trait::async_trait]
impl<G: PixGateway + ?Sized> PixGateway for Arc<G> {
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError> {
        (**self).create_pix_transaction(request).await
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        (**self).get_transaction(id).await
    }

    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        (**self).cancel_transaction(id).await
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }
}
