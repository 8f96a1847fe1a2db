//! Checkout Session Controller
//!
//! One payer interaction: validate the form, create the charge, wait for
//! payment. The UI layer renders [`CheckoutView`] and calls back into the
//! session; it holds no checkout state of its own.

use pix_types::{
    Amount, Customer, CustomerForm, Field, FieldValidation, LineItem, PaymentRequest, PixGateway,
    PixTransaction, ShippingAddress, ValidationMode, validation,
};
use tokio::sync::watch;

use crate::countdown::format_countdown;
use crate::lifecycle::{LifecycleError, LifecycleSnapshot, Phase, TransactionLifecycle};
use crate::service::{DEFAULT_ITEM_DESCRIPTION, DEFAULT_ITEM_TITLE};

/// What a checkout charges and how strictly it checks the payer.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub amount: Amount,
    pub item_title: String,
    pub item_description: String,
    pub ip: Option<String>,
    pub shipping: Option<ShippingAddress>,
    pub validation: ValidationMode,
}

impl CheckoutConfig {
    pub fn new(amount: Amount) -> Self {
        Self {
            amount,
            item_title: DEFAULT_ITEM_TITLE.into(),
            item_description: DEFAULT_ITEM_DESCRIPTION.into(),
            ip: None,
            shipping: None,
            validation: ValidationMode::default(),
        }
    }

    pub fn with_item(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.item_title = title.into();
        self.item_description = description.into();
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_shipping(mut self, shipping: ShippingAddress) -> Self {
        self.shipping = Some(shipping);
        self
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }
}

/// What the payer should see right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutView {
    Form,
    AwaitingPayment {
        transaction_id: String,
        qr_code: String,
        qr_image: Option<String>,
        copy_code: String,
        remaining_secs: u64,
        /// `MM:SS`
        countdown: String,
    },
    Paid {
        transaction_id: String,
    },
    Expired,
    Refunded,
    Failed {
        message: String,
    },
}

impl From<&LifecycleSnapshot> for CheckoutView {
    fn from(snapshot: &LifecycleSnapshot) -> Self {
        match (snapshot.phase, snapshot.transaction.as_ref()) {
            (Phase::WaitingPayment, Some(tx)) => CheckoutView::AwaitingPayment {
                transaction_id: tx.id().to_string(),
                qr_code: tx.pix().qr_code_payload.clone(),
                qr_image: tx.pix().qr_code_image_data.clone(),
                copy_code: tx.pix().copy_and_paste.clone(),
                remaining_secs: snapshot.remaining_secs,
                countdown: format_countdown(snapshot.remaining_secs),
            },
            (Phase::Paid, Some(tx)) => CheckoutView::Paid {
                transaction_id: tx.id().to_string(),
            },
            (Phase::Expired, _) => CheckoutView::Expired,
            (Phase::Refunded, _) => CheckoutView::Refunded,
            (Phase::Failed, _) => CheckoutView::Failed {
                message: snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unable to create the PIX payment".into()),
            },
            _ => CheckoutView::Form,
        }
    }
}

/// A single payer's checkout.
///
/// Dropping the session stops its countdown.
pub struct CheckoutSession<G: PixGateway> {
    config: CheckoutConfig,
    lifecycle: TransactionLifecycle<G>,
}

impl<G: PixGateway> CheckoutSession<G> {
    pub fn new(gateway: G, config: CheckoutConfig) -> Self {
        Self {
            config,
            lifecycle: TransactionLifecycle::new(gateway),
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &TransactionLifecycle<G> {
        &self.lifecycle
    }

    /// State changes, countdown ticks included.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.lifecycle.subscribe()
    }

    /// Checks one field as the payer types, with this checkout's strictness.
    pub fn validate_field(&self, field: Field, raw: &str) -> FieldValidation {
        validation::validate_with(self.config.validation, field, raw)
    }

    /// Validates the form and creates the charge.
    ///
    /// Invalid fields are all reported at once and the gateway is not called.
    pub async fn submit(&self, form: &CustomerForm) -> Result<PixTransaction, LifecycleError> {
        let customer = validation::validate_customer(self.config.validation, form)?;
        self.lifecycle.start(self.payment_request(customer)).await
    }

    /// "I already paid": asks the gateway whether the payment settled.
    pub async fn confirm_payment(&self) -> Result<CheckoutView, LifecycleError> {
        self.lifecycle.check_status().await?;
        Ok(self.view())
    }

    /// Back to the form. The transaction is abandoned, not cancelled.
    pub fn back(&self) -> CheckoutView {
        self.lifecycle.reset();
        self.view()
    }

    /// Cancels the transaction with the gateway.
    pub async fn cancel(&self) -> Result<CheckoutView, LifecycleError> {
        self.lifecycle.cancel().await?;
        Ok(self.view())
    }

    pub fn view(&self) -> CheckoutView {
        CheckoutView::from(&self.lifecycle.snapshot())
    }

    fn payment_request(&self, customer: Customer) -> PaymentRequest {
        let config = &self.config;
        PaymentRequest {
            amount: config.amount,
            customer,
            items: vec![LineItem::single(
                config.item_title.clone(),
                config.item_description.clone(),
                config.amount,
            )],
            ip: config.ip.clone(),
            shipping: config.shipping.clone(),
        }
    }
}
