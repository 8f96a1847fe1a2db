//! In-memory sandbox gateway.
//!
//! Issues `waiting_payment` transactions carrying a synthetic BR Code so the
//! checkout can be exercised without processor credentials. Selected only by
//! configuration; never used as a fallback for a failing upstream.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, instrument};

use pix_types::{
    GatewayError, PaymentRequest, PixData, PixGateway, PixTransaction, TransactionId,
    TransactionSnapshot, TransactionStatus,
};

const MERCHANT_NAME: &str = "PIX CHECKOUT SANDBOX";
const MERCHANT_CITY: &str = "SAO PAULO";

/// How long a transaction stays queryable after its PIX code expires.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Sandbox gateway backed by a process-local map.
pub struct SimulatedGateway {
    transactions: DashMap<TransactionId, PixTransaction>,
    validity_secs: u32,
    pay_after: Option<Duration>,
    retention: Duration,
}

impl SimulatedGateway {
    pub fn new(validity_secs: u32) -> Self {
        Self {
            transactions: DashMap::new(),
            validity_secs,
            pay_after: None,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep transactions for `retention` past their expiry, then forget them.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Number of transactions currently held.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions queried after `delay` report `paid`.
    pub fn with_auto_pay(mut self, delay: Duration) -> Self {
        self.pay_after = Some(delay);
        self
    }

    /// Marks a transaction paid, as if the payer had scanned the code.
    pub fn mark_paid(&self, id: &TransactionId) -> Result<TransactionSnapshot, GatewayError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        Self::settle(&mut entry, TransactionStatus::Paid)?;
        info!(transaction_id = %id, "Sandbox transaction marked paid");
        Ok(entry.snapshot())
    }

    fn settle(tx: &mut PixTransaction, status: TransactionStatus) -> Result<(), GatewayError> {
        let snapshot = TransactionSnapshot {
            transaction_id: tx.id().clone(),
            status,
            amount: None,
            paid_at: (status == TransactionStatus::Paid).then(Utc::now),
        };
        tx.apply(&snapshot)?;
        Ok(())
    }

    /// Drops transactions whose retention window has passed.
    fn evict_stale(&self) {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return;
        };
        let now = Utc::now();
        let before = self.transactions.len();
        self.transactions.retain(|_, tx| {
            tx.expires_at()
                .checked_add_signed(retention)
                .is_none_or(|until| now < until)
        });
        let evicted = before.saturating_sub(self.transactions.len());
        if evicted > 0 {
            debug!(evicted, "Evicted stale sandbox transactions");
        }
    }

    /// Advances a stored transaction according to the wall clock.
    fn refresh(&self, tx: &mut PixTransaction) -> Result<(), GatewayError> {
        if !tx.status().is_awaiting_payment() {
            return Ok(());
        }
        let now = Utc::now();
        if now >= tx.expires_at() {
            return Self::settle(tx, TransactionStatus::Expired);
        }
        if let Some(delay) = self.pay_after {
            let elapsed = (now - tx.created_at()).to_std().unwrap_or_default();
            if elapsed >= delay {
                return Self::settle(tx, TransactionStatus::Paid);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PixGateway for SimulatedGateway {
    #[instrument(skip(self, request), fields(amount = request.amount.cents()))]
    async fn create_pix_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<PixTransaction, GatewayError> {
        request.validate()?;
        self.evict_stale();

        let key = uuid::Uuid::new_v4();
        let id = TransactionId::new(key.to_string())?;
        let payload = br_code(&key.to_string(), &request.amount.to_reais().to_string());

        let tx = PixTransaction::new(
            id.clone(),
            TransactionStatus::WaitingPayment,
            request.amount,
            PixData::from_payload(payload),
            Utc::now(),
            self.validity_secs,
        )?;
        self.transactions.insert(id.clone(), tx.clone());

        info!(transaction_id = %id, "Sandbox PIX transaction created");
        Ok(tx)
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        self.refresh(&mut entry)?;
        Ok(entry.snapshot())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn cancel_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionSnapshot, GatewayError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        self.refresh(&mut entry)?;
        Self::settle(&mut entry, TransactionStatus::Refunded)?;
        info!("Sandbox transaction refunded");
        Ok(entry.snapshot())
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BR Code
// ─────────────────────────────────────────────────────────────────────────────

fn tlv(id: &str, value: &str) -> String {
    format!("{}{:02}{}", id, value.len(), value)
}

/// Static BR Code for `key` charging `amount` reais.
pub fn br_code(key: &str, amount: &str) -> String {
    let account = format!("{}{}", tlv("00", "br.gov.bcb.pix"), tlv("01", key));
    let mut payload = [
        tlv("00", "01"),
        tlv("26", &account),
        tlv("52", "0000"),
        tlv("53", "986"),
        tlv("54", amount),
        tlv("58", "BR"),
        tlv("59", MERCHANT_NAME),
        tlv("60", MERCHANT_CITY),
        tlv("62", &tlv("05", "***")),
    ]
    .concat();
    // The checksum covers its own tag and length.
    payload.push_str("6304");
    let crc = crc16_ccitt(payload.as_bytes());
    payload.push_str(&format!("{:04X}", crc));
    payload
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::looks_like_br_code;
    use pix_types::{Amount, Customer, LineItem};

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: Amount::from_cents(4250).unwrap(),
            customer: Customer {
                full_name: "Maria Silva".into(),
                email: "maria@ex.com".into(),
                tax_id: "11144477735".into(),
                phone: "11987654321".into(),
            },
            items: vec![LineItem {
                title: "Serviço".into(),
                quantity: 1,
                price: 4250,
                description: "Pagamento".into(),
            }],
            ip: None,
            shipping: None,
        }
    }

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_br_code_layout() {
        let key = "7c1f2a9e-51d4-4a07-b1e3-2f8a3c0d9e11";
        let code = br_code(key, "42.50");

        assert!(code.starts_with(&format!("00020126580014br.gov.bcb.pix0136{}", key)));
        assert!(code.contains("540542.50"));
        assert!(code.contains("5303986"));
        assert!(looks_like_br_code(&code));

        let (body, crc) = code.split_at(code.len() - 4);
        assert!(body.ends_with("6304"));
        assert_eq!(crc, format!("{:04X}", crc16_ccitt(body.as_bytes())));
    }

    #[tokio::test]
    async fn test_create_and_query() {
        let gateway = SimulatedGateway::new(900);
        let tx = gateway.create_pix_transaction(&request()).await.unwrap();

        assert_eq!(tx.status(), TransactionStatus::WaitingPayment);
        assert!(looks_like_br_code(&tx.pix().qr_code_payload));

        let snapshot = gateway.get_transaction(tx.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::WaitingPayment);
        assert_eq!(snapshot.amount, Some(tx.amount()));
    }

    #[tokio::test]
    async fn test_mark_paid() {
        let gateway = SimulatedGateway::new(900);
        let tx = gateway.create_pix_transaction(&request()).await.unwrap();

        gateway.mark_paid(tx.id()).unwrap();
        let snapshot = gateway.get_transaction(tx.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::Paid);
        assert!(snapshot.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_auto_pay() {
        let gateway = SimulatedGateway::new(900).with_auto_pay(Duration::ZERO);
        let tx = gateway.create_pix_transaction(&request()).await.unwrap();

        let snapshot = gateway.get_transaction(tx.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_refunds() {
        let gateway = SimulatedGateway::new(900);
        let tx = gateway.create_pix_transaction(&request()).await.unwrap();

        let snapshot = gateway.cancel_transaction(tx.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::Refunded);

        // refunded is terminal
        assert!(gateway.mark_paid(tx.id()).is_err());
    }

    #[tokio::test]
    async fn test_stale_transactions_are_evicted() {
        let gateway = SimulatedGateway::new(1).with_retention(Duration::ZERO);
        let old = gateway.create_pix_transaction(&request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let fresh = gateway.create_pix_transaction(&request()).await.unwrap();

        assert_eq!(gateway.len(), 1);
        assert!(matches!(
            gateway.get_transaction(old.id()).await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(gateway.get_transaction(fresh.id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_transactions_kept_during_retention() {
        let gateway = SimulatedGateway::new(1);
        let old = gateway.create_pix_transaction(&request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        gateway.create_pix_transaction(&request()).await.unwrap();

        assert_eq!(gateway.len(), 2);
        let snapshot = gateway.get_transaction(old.id()).await.unwrap();
        assert_eq!(snapshot.status, TransactionStatus::Expired);
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let gateway = SimulatedGateway::new(900);
        let id = TransactionId::new("nope").unwrap();
        assert!(matches!(
            gateway.get_transaction(&id).await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            gateway.cancel_transaction(&id).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_items() {
        let gateway = SimulatedGateway::new(900);
        let mut req = request();
        req.items.clear();
        assert!(matches!(
            gateway.create_pix_transaction(&req).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
