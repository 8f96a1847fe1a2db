//! Data Transfer Objects for the proxy's HTTP contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    LineItem, PixTransaction, ShippingAddress, TransactionSnapshot, TransactionStatus,
};
use crate::error::FieldError;
use crate::validation::CustomerForm;

// ─────────────────────────────────────────────────────────────────────────────
// Create PIX
// ─────────────────────────────────────────────────────────────────────────────

/// Payer data as submitted by the checkout form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerInput {
    #[schema(example = "Maria Silva")]
    pub name: String,
    #[schema(example = "maria@ex.com")]
    pub email: String,
    /// CPF, masked or digits only
    #[schema(example = "111.444.777-35")]
    pub document: String,
    #[schema(example = "(11) 98765-4321")]
    pub phone: String,
}

impl From<CustomerInput> for CustomerForm {
    fn from(input: CustomerInput) -> Self {
        CustomerForm {
            full_name: input.name,
            email: input.email,
            tax_id: input.document,
            phone: input.phone,
        }
    }
}

impl From<&CustomerForm> for CustomerInput {
    fn from(form: &CustomerForm) -> Self {
        CustomerInput {
            name: form.full_name.clone(),
            email: form.email.clone(),
            document: form.tax_id.clone(),
            phone: form.phone.clone(),
        }
    }
}

/// Request to create a PIX charge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePixRequest {
    /// Amount in centavos
    #[schema(example = 4250)]
    pub amount: i64,
    pub customer: CustomerInput,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Payer IP; defaults to the connecting peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "127.0.0.1")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingAddress>,
}

/// PIX codes handed to the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PixCodeResponse {
    /// BR Code payload to render as a QR code
    #[schema(example = "00020126580014br.gov.bcb.pix0136...")]
    pub qrcode: String,
    /// Base64 QR image, when the processor renders one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qrcode_base64: Option<String>,
    /// "Copia e cola" code
    #[serde(
        rename = "copyAndPaste",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub copy_and_paste: Option<String>,
}

/// Response after creating a PIX charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PixPaymentResponse {
    pub status: TransactionStatus,
    #[schema(example = "7c1f2a9e-51d4-4a07-b1e3-2f8a3c0d9e11")]
    pub transaction_id: String,
    pub pix: PixCodeResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Amount in centavos
    #[schema(example = 4250)]
    pub amount: i64,
}

impl From<&PixTransaction> for PixPaymentResponse {
    fn from(tx: &PixTransaction) -> Self {
        Self {
            status: tx.status(),
            transaction_id: tx.id().to_string(),
            pix: PixCodeResponse {
                qrcode: tx.pix().qr_code_payload.clone(),
                qrcode_base64: tx.pix().qr_code_image_data.clone(),
                copy_and_paste: Some(tx.pix().copy_and_paste.clone()),
            },
            expires_at: Some(tx.expires_at()),
            amount: tx.amount().cents(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status & cancel
// ─────────────────────────────────────────────────────────────────────────────

/// Current status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusResponse {
    pub status: TransactionStatus,
    pub transaction_id: String,
    /// Amount in centavos, when the processor reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&TransactionSnapshot> for TransactionStatusResponse {
    fn from(snapshot: &TransactionSnapshot) -> Self {
        Self {
            status: snapshot.status,
            transaction_id: snapshot.transaction_id.to_string(),
            amount: snapshot.amount.map(|a| a.cents()),
            paid_at: snapshot.paid_at,
        }
    }
}

/// Response after cancelling a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub status: TransactionStatus,
    pub transaction_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Health & errors
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    /// Gateway adapter in use (`upstream` or `simulated`)
    #[schema(example = "upstream")]
    pub gateway: String,
    pub credentials_configured: bool,
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind
    #[schema(example = "validation_error")]
    pub error: String,
    /// Human-readable message
    pub message: String,
    pub code: u16,
    /// Per-field validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub fields: Vec<FieldErrorBody>,
}

/// One rejected field in an error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

impl From<&FieldError> for FieldErrorBody {
    fn from(err: &FieldError) -> Self {
        Self {
            field: err.field.to_string(),
            message: err.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, DEFAULT_VALIDITY_SECS, PixData, TransactionId};

    #[test]
    fn test_payment_response_shape() {
        let tx = PixTransaction::new(
            TransactionId::new("tx_42").unwrap(),
            TransactionStatus::WaitingPayment,
            Amount::from_cents(4250).unwrap(),
            PixData::from_payload("00020126abc"),
            Utc::now(),
            DEFAULT_VALIDITY_SECS,
        )
        .unwrap();

        let json = serde_json::to_value(PixPaymentResponse::from(&tx)).unwrap();
        assert_eq!(json["status"], "waiting_payment");
        assert_eq!(json["transactionId"], "tx_42");
        assert_eq!(json["amount"], 4250);
        assert_eq!(json["pix"]["qrcode"], "00020126abc");
        assert_eq!(json["pix"]["copyAndPaste"], "00020126abc");
        assert!(json["pix"].get("qrcode_base64").is_none());
        assert!(json["expiresAt"].is_string());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreatePixRequest = serde_json::from_value(serde_json::json!({
            "amount": 4250,
            "customer": {
                "name": "Maria Silva",
                "email": "maria@ex.com",
                "document": "11144477735",
                "phone": "11987654321"
            }
        }))
        .unwrap();
        assert!(req.items.is_empty());
        assert!(req.ip.is_none());

        let form = CustomerForm::from(req.customer);
        assert_eq!(form.tax_id, "11144477735");
    }

    #[test]
    fn test_create_request_requires_amount() {
        let result: Result<CreatePixRequest, _> = serde_json::from_value(serde_json::json!({
            "customer": {"name": "a b", "email": "a@b.c", "document": "1", "phone": "1"}
        }));
        assert!(result.is_err());
    }
}
