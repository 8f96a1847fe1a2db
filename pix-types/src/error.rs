//! Error types for the PIX checkout.

use serde::Serialize;

use crate::domain::TransactionStatus;
use crate::validation::Field;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be positive, got {0} centavos")]
    NonPositiveAmount(i64),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// A single rejected payer field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Every field that failed validation in one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Invalid customer data: {}", summary(.0))]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Message for a given field, if it failed.
    pub fn message_for(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Errors from talking to the upstream PIX processor.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request rejected locally before any upstream call.
    #[error("Invalid payment request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// Missing or unusable credentials. Fatal at startup.
    #[error("Gateway configuration error: {0}")]
    Configuration(String),

    /// The processor answered with a non-2xx status.
    #[error("Upstream rejected the request with status {status}: {message}")]
    UpstreamRejected {
        status: u16,
        message: String,
        details: serde_json::Value,
    },

    /// No response at all (connection failure or timeout).
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A 2xx response carried no recognizable PIX data.
    #[error("PIX data missing from upstream response (keys: {})", keys.join(", "))]
    MissingPixData { keys: Vec<String> },

    #[error("Transaction not found: {0}")]
    NotFound(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Payment processor unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid response from payment processor: {0}")]
    InvalidUpstreamResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidRequest(e) => AppError::BadRequest(e.to_string()),
            GatewayError::Configuration(msg) => AppError::Configuration(msg),
            GatewayError::UpstreamRejected {
                status, message, ..
            } => AppError::UpstreamRejected { status, message },
            GatewayError::UpstreamUnavailable(msg) => AppError::UpstreamUnavailable(msg),
            e @ GatewayError::MissingPixData { .. } => {
                AppError::InvalidUpstreamResponse(e.to_string())
            }
            GatewayError::NotFound(id) => AppError::NotFound(format!("Transaction {}", id)),
        }
    }
}
