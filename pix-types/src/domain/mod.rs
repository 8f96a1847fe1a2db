//! Domain models for the PIX checkout.

pub mod money;
pub mod payment;
pub mod transaction;

pub use money::Amount;
pub use payment::{Customer, LineItem, PaymentRequest, ShippingAddress, TaxDocument};
pub use transaction::{
    DEFAULT_VALIDITY_SECS, PixData, PixTransaction, TransactionId, TransactionSnapshot,
    TransactionStatus,
};
