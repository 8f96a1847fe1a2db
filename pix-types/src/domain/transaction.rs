//! PIX transaction domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::Amount;
use crate::error::DomainError;

/// Default validity window of a PIX charge, in seconds (15 minutes).
pub const DEFAULT_VALIDITY_SECS: u32 = 900;

/// Opaque, upstream-assigned identifier for a PIX transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps an upstream identifier. Empty identifiers are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::Validation(
                "Transaction ID cannot be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Status of a PIX transaction as reported by the upstream processor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    WaitingPayment,
    Pending,
    Paid,
    Expired,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Parses an upstream status string. Unknown values yield `None`.
    pub fn parse_upstream(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting_payment" | "waiting" | "created" => Some(Self::WaitingPayment),
            "pending" | "processing" => Some(Self::Pending),
            "paid" | "approved" | "completed" => Some(Self::Paid),
            "expired" => Some(Self::Expired),
            "failed" | "refused" | "canceled" | "cancelled" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Returns true while the payer can still pay.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self, Self::WaitingPayment | Self::Pending)
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Failed | Self::Refunded)
    }

    /// Status only moves forward: awaiting states may go anywhere,
    /// `paid` may only be refunded, the rest are terminal.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::WaitingPayment | Self::Pending => true,
            Self::Paid => next == Self::Refunded,
            Self::Expired | Self::Failed | Self::Refunded => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingPayment => "waiting_payment",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PIX payment data as extracted from an upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixData {
    /// Raw BR Code payload, opaque to this system.
    pub qr_code_payload: String,
    /// Base64 QR image, when the upstream renders one.
    pub qr_code_image_data: Option<String>,
    /// "Copia e cola" code. Same as the payload unless upstream sends a distinct one.
    pub copy_and_paste: String,
}

impl PixData {
    /// Builds PIX data whose copy-paste code is the payload itself.
    pub fn from_payload(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            copy_and_paste: payload.clone(),
            qr_code_payload: payload,
            qr_code_image_data: None,
        }
    }
}

/// Canonical PIX transaction record.
///
/// Everything except `status` and `paid_at` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixTransaction {
    id: TransactionId,
    status: TransactionStatus,
    amount: Amount,
    pix: PixData,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl PixTransaction {
    /// Creates a transaction valid for `validity_secs` from `created_at`.
    pub fn new(
        id: TransactionId,
        status: TransactionStatus,
        amount: Amount,
        pix: PixData,
        created_at: DateTime<Utc>,
        validity_secs: u32,
    ) -> Result<Self, DomainError> {
        let expires_at = created_at + Duration::seconds(i64::from(validity_secs));
        Self::with_expiry(id, status, amount, pix, created_at, expires_at)
    }

    /// Creates a transaction with an explicit expiry (e.g. from upstream).
    pub fn with_expiry(
        id: TransactionId,
        status: TransactionStatus,
        amount: Amount,
        pix: PixData,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if expires_at <= created_at {
            return Err(DomainError::Validation(format!(
                "Expiry {} must be after creation {}",
                expires_at, created_at
            )));
        }
        Ok(Self {
            id,
            status,
            amount,
            pix,
            created_at,
            expires_at,
            paid_at: None,
        })
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn pix(&self) -> &PixData {
        &self.pix
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Moves the transaction to `next`, refusing backward transitions.
    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Merges a status query result into this transaction.
    pub fn apply(&mut self, snapshot: &TransactionSnapshot) -> Result<(), DomainError> {
        if snapshot.transaction_id != self.id {
            return Err(DomainError::Validation(format!(
                "Snapshot for {} applied to {}",
                snapshot.transaction_id, self.id
            )));
        }
        self.transition_to(snapshot.status)?;
        if snapshot.status == TransactionStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(snapshot.paid_at.unwrap_or_else(Utc::now));
        }
        Ok(())
    }

    /// Snapshot of the mutable part of this transaction.
    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            transaction_id: self.id.clone(),
            status: self.status,
            amount: Some(self.amount),
            paid_at: self.paid_at,
        }
    }
}

/// Result of a read-only status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Amount, when the upstream echoes it back.
    pub amount: Option<Amount>,
    pub paid_at: Option<DateTime<Utc>>,
}
