//! # PIX Hex
//!
//! Checkout coordination, application service and HTTP adapter for the
//! PIX checkout proxy.
//!
//! ## Architecture
//!
//! - `countdown/` - One-second countdown task with a releasing handle
//! - `lifecycle/` - Transaction state machine for one checkout
//! - `session/` - Checkout session controller driving the lifecycle
//! - `service/` - Application service behind the proxy endpoints
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! Everything is generic over `G: PixGateway`, allowing the upstream
//! processor, the sandbox, or a test double to be injected.

pub mod countdown;
pub mod inbound;
pub mod lifecycle;
pub mod openapi;
pub mod service;
pub mod session;


pub use countdown::{Countdown, format_countdown};
pub use lifecycle::{LifecycleError, LifecycleSnapshot, Phase, TransactionLifecycle};
pub use service::PixService;
pub use session::{CheckoutConfig, CheckoutSession, CheckoutView};
