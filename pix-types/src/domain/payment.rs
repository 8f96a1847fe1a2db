//! Payment request built for each checkout submission.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::Amount;
use crate::error::DomainError;

/// Payer identity, already validated and normalized (digits-only tax ID and phone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub full_name: String,
    pub email: String,
    /// CPF, 11 digits.
    pub tax_id: String,
    /// 10 or 11 digits including area code.
    pub phone: String,
}

/// Structured tax document expected by the upstream processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

impl TaxDocument {
    /// A CPF document (individual taxpayer).
    pub fn cpf(number: impl Into<String>) -> Self {
        Self {
            kind: "CPF".to_string(),
            number: number.into(),
        }
    }
}

impl Customer {
    pub fn document(&self) -> TaxDocument {
        TaxDocument::cpf(self.tax_id.clone())
    }
}

/// One purchased item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    #[schema(example = "Pagamento de Serviço Público")]
    pub title: String,
    #[schema(example = 1)]
    pub quantity: u32,
    /// Unit price in centavos
    #[schema(example = 4250)]
    pub price: i64,
    #[schema(example = "Pagamento via Portal")]
    pub description: String,
}

impl LineItem {
    /// One unit charging the whole amount.
    pub fn single(title: impl Into<String>, description: impl Into<String>, amount: Amount) -> Self {
        Self {
            title: title.into(),
            quantity: 1,
            price: amount.cents(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("Item title cannot be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::Validation(
                "Item description cannot be empty".into(),
            ));
        }
        if self.quantity == 0 {
            return Err(DomainError::Validation(
                "Item quantity must be positive".into(),
            ));
        }
        if self.price <= 0 {
            return Err(DomainError::Validation("Item price must be positive".into()));
        }
        Ok(())
    }
}

/// Optional delivery address forwarded to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub street_number: String,
    #[serde(default)]
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub zip_code: String,
}

fn default_country() -> String {
    "BR".to_string()
}

/// Everything needed to ask the processor for one PIX charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Amount,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub ip: Option<String>,
    pub shipping: Option<ShippingAddress>,
}

impl PaymentRequest {
    /// Checks the invariants the upstream requires before any call is made.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::Validation(
                "At least one item is required".into(),
            ));
        }
        self.items.iter().try_for_each(LineItem::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LineItem {
        LineItem {
            title: "Serviço".into(),
            quantity: 1,
            price: 4250,
            description: "Pagamento".into(),
        }
    }

    fn request(items: Vec<LineItem>) -> PaymentRequest {
        PaymentRequest {
            amount: Amount::from_cents(4250).unwrap(),
            customer: Customer {
                full_name: "Maria Silva".into(),
                email: "maria@ex.com".into(),
                tax_id: "11144477735".into(),
                phone: "11987654321".into(),
            },
            items,
            ip: None,
            shipping: None,
        }
    }

    #[test]
    fn test_document_is_structured_cpf() {
        let doc = request(vec![item()]).customer.document();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "CPF", "number": "11144477735"})
        );
    }

    #[test]
    fn test_request_requires_items() {
        assert!(request(vec![]).validate().is_err());
        assert!(request(vec![item()]).validate().is_ok());
    }

    #[test]
    fn test_item_rules() {
        let mut bad = item();
        bad.quantity = 0;
        assert!(request(vec![bad]).validate().is_err());

        let mut bad = item();
        bad.description = "  ".into();
        assert!(request(vec![bad]).validate().is_err());

        let mut bad = item();
        bad.price = 0;
        assert!(request(vec![bad]).validate().is_err());
    }
}
