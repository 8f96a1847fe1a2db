//! # PIX Types
//!
//! Domain types, validation rules and port traits for the PIX checkout proxy.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Amount, PixTransaction, PaymentRequest)
//! - `validation/` - Payer field validation and display masks
//! - `ports/` - Trait definitions that gateway adapters must implement
//! - `dto/` - Data Transfer Objects for the HTTP contract
//! - `error/` - Domain, gateway and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;
pub mod validation;

// Re-export commonly used types
pub use domain::{
    Amount, Customer, DEFAULT_VALIDITY_SECS, LineItem, PaymentRequest, PixData, PixTransaction,
    ShippingAddress, TaxDocument, TransactionId, TransactionSnapshot, TransactionStatus,
};
pub use dto::*;
pub use error::{AppError, DomainError, FieldError, GatewayError, ValidationErrors};
pub use ports::PixGateway;
pub use validation::{CustomerForm, Field, FieldValidation, ValidationMode};
