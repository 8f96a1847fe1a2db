//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use pix_types::domain::{LineItem, ShippingAddress, TransactionStatus};
use pix_types::dto::{
    CancelResponse, CreatePixRequest, CustomerInput, ErrorResponse, HealthResponse,
    PixCodeResponse, PixPaymentResponse, TransactionStatusResponse,
};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
async fn health() {}

/// Create a PIX charge
///
/// Validates the payer, forwards the charge to the payment processor and
/// returns the BR Code to show as QR code and copy-paste text.
#[utoipa::path(
    post,
    path = "/api/payments/pix",
    tag = "payments",
    request_body = CreatePixRequest,
    responses(
        (status = 200, description = "PIX charge created", body = PixPaymentResponse),
        (status = 400, description = "Malformed body or invalid payer data", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Proxy is not configured", body = ErrorResponse),
        (status = 502, description = "Processor answered without PIX data", body = ErrorResponse),
        (status = 503, description = "Processor unreachable", body = ErrorResponse)
    )
)]
async fn create_pix() {}

/// Get transaction status
#[utoipa::path(
    get,
    path = "/api/payments/transaction/{id}",
    tag = "payments",
    params(
        ("id" = String, Path, description = "Transaction ID assigned by the processor")
    ),
    responses(
        (status = 200, description = "Current status", body = TransactionStatusResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 503, description = "Processor unreachable", body = ErrorResponse)
    )
)]
async fn get_transaction() {}

/// Cancel a transaction
#[utoipa::path(
    delete,
    path = "/api/payments/transaction/{id}",
    tag = "payments",
    params(
        ("id" = String, Path, description = "Transaction ID assigned by the processor")
    ),
    responses(
        (status = 200, description = "Transaction refunded", body = CancelResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 503, description = "Processor unreachable", body = ErrorResponse)
    )
)]
async fn cancel_transaction() {}

/// OpenAPI documentation for the PIX checkout proxy.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PIX Checkout Proxy API",
        version = "1.0.0",
        description = "Creates PIX charges through the payment processor and reports their status.\n\nAmounts are integer centavos. Processor credentials stay on the server.",
        license(name = "MIT"),
    ),
    paths(health, create_pix, get_transaction, cancel_transaction),
    components(
        schemas(
            CreatePixRequest,
            CustomerInput,
            LineItem,
            ShippingAddress,
            PixPaymentResponse,
            PixCodeResponse,
            TransactionStatusResponse,
            TransactionStatus,
            CancelResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "PIX charge operations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_endpoints() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| *p == "/api/payments/pix"));
        assert!(paths.iter().any(|p| *p == "/api/payments/transaction/{id}"));
        assert!(paths.iter().any(|p| *p == "/health"));
    }
}
