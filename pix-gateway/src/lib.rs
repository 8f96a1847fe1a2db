//! # PIX Gateway
//!
//! Concrete gateway implementations (adapters) for the PIX checkout proxy.
//! This crate provides the adapters that implement the `PixGateway` port:
//! the HTTP client for the upstream processor and an in-memory sandbox.

use std::time::Duration;

use async_trait::async_trait;
use pix_types::{
    GatewayError, PaymentRequest, PixGateway, PixTransaction, TransactionId, TransactionSnapshot,
};

pub mod normalizer;
pub mod simulated;
pub mod upstream;

pub use simulated::SimulatedGateway;
pub use upstream::{AuthScheme, UpstreamConfig, UpstreamGateway};

/// Which adapter serves the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatewayMode {
    #[default]
    Upstream,
    Simulated,
}

impl std::str::FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" => Ok(GatewayMode::Upstream),
            "simulated" | "sandbox" => Ok(GatewayMode::Simulated),
            other => Err(format!("Unknown gateway mode: {}", other)),
        }
    }
}

/// Everything needed to build a gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub mode: GatewayMode,
    pub upstream: UpstreamConfig,
    /// Sandbox only: transactions report `paid` once this much time passed.
    pub simulated_pay_after: Option<Duration>,
}

/// Unified gateway wrapper over the upstream and sandbox adapters.
pub enum Gateway {
    Upstream(UpstreamGateway),
    Simulated(SimulatedGateway),
}

/// Build a gateway from settings.
///
/// In upstream mode a missing secret fails here, so the server refuses to
/// start rather than answering every request with an error.
///
/// # Examples
///
/// ```ignore
/// let gateway = build_gateway(settings)?;
/// let tx = gateway.create_pix_transaction(&request).await?;
/// ```
pub fn build_gateway(settings: GatewaySettings) -> Result<Gateway, GatewayError> {
    Gateway::new(settings)
}

impl Gateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        match settings.mode {
            GatewayMode::Upstream => Ok(Gateway::Upstream(UpstreamGateway::new(
                settings.upstream,
            )?)),
            GatewayMode::Simulated => {
                let mut gateway = SimulatedGateway::new(settings.upstream.validity_secs);
                if let Some(delay) = settings.simulated_pay_after {
                    gateway = gateway.with_auto_pay(delay);
                }
                Ok(Gateway::Simulated(gateway))
            }
        }
    }

    /// The sandbox adapter, if that is what is running.
    pub fn as_simulated(&self) -> Option<&SimulatedGateway> {
        match self {
            Gateway::Simulated(gateway) => Some(gateway),
            Gateway::Upstream(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement PixGateway for Gateway (delegation)
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PixGateway for Gateway {
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError> {
        match self {
            Gateway::Upstream(inner) => inner.create_pix_transaction(request).await,
            Gateway::Simulated(inner) => inner.create_pix_transaction(request).await,
        }
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        match self {
            Gateway::Upstream(inner) => inner.get_transaction(id).await,
            Gateway::Simulated(inner) => inner.get_transaction(id).await,
        }
    }

    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        match self {
            Gateway::Upstream(inner) => inner.cancel_transaction(id).await,
            Gateway::Simulated(inner) => inner.cancel_transaction(id).await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Gateway::Upstream(inner) => inner.kind(),
            Gateway::Simulated(inner) => inner.kind(),
        }
    }

    fn is_configured(&self) -> bool {
        match self {
            Gateway::Upstream(inner) => inner.is_configured(),
            Gateway::Simulated(inner) => inner.is_configured(),
        }
    }
}
