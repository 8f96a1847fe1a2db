//! End-to-end checkout against a stub payment processor.
//!
//! Runs on real time: the processor is reached over TCP, and paused time
//! would let the client timeout fire while the stub is still answering.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use pix_gateway::{AuthScheme, UpstreamConfig, UpstreamGateway};
use pix_hex::{CheckoutConfig, CheckoutSession, CheckoutView, LifecycleError, Phase};
use pix_types::{Amount, CustomerForm, ValidationMode};
use serde_json::{Value, json};

const BR_CODE: &str = "00020126580014br.gov.bcb.pix0136123e4567-e12b-12d1-a456-4266554400005204000053039865406042.505802BR5913Fulano de Tal6008BRASILIA62070503***63041D3D";

#[derive(Default)]
struct Processor {
    created: Option<Value>,
    authorization: Option<String>,
    status: String,
    polls: usize,
}

type Shared = Arc<Mutex<Processor>>;

async fn create(
    State(processor): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut processor = processor.lock().unwrap();
    processor.created = Some(body);
    processor.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    processor.status = "waiting_payment".into();
    Json(json!({
        "id": "tx_e2e",
        "status": "waiting_payment",
        "pix": {"qrCode": BR_CODE}
    }))
}

async fn status(State(processor): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let mut processor = processor.lock().unwrap();
    processor.polls += 1;
    Json(json!({"id": id, "status": processor.status, "amount": 4250}))
}

async fn spawn_processor() -> (String, Shared) {
    let processor = Shared::default();
    let router = Router::new()
        .route("/transactions", post(create))
        .route("/transactions/{id}", get(status))
        .with_state(processor.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), processor)
}

fn gateway(base_url: String) -> UpstreamGateway {
    UpstreamGateway::new(UpstreamConfig {
        base_url,
        secret: Some("sk_live_e2e".into()),
        auth: AuthScheme::Basic,
        timeout: Duration::from_secs(5),
        validity_secs: 900,
    })
    .unwrap()
}

fn maria() -> CustomerForm {
    CustomerForm {
        full_name: "Maria Silva".into(),
        email: "maria@ex.com".into(),
        tax_id: "11144477735".into(),
        phone: "11987654321".into(),
    }
}

fn session(base_url: String) -> CheckoutSession<UpstreamGateway> {
    let config = CheckoutConfig::new(Amount::parse_reais("42.50").unwrap())
        .with_ip("127.0.0.1")
        .with_validation(ValidationMode::Strict);
    CheckoutSession::new(gateway(base_url), config)
}

#[tokio::test]
async fn test_checkout_reaches_processor_and_waits_for_payment() {
    let (base_url, processor) = spawn_processor().await;
    let session = session(base_url);

    let tx = session.submit(&maria()).await.unwrap();
    assert_eq!(tx.id().as_str(), "tx_e2e");

    {
        let processor = processor.lock().unwrap();
        let body = processor.created.as_ref().unwrap();
        assert_eq!(body["amount"], 4250);
        assert_eq!(body["paymentMethod"], "PIX");
        assert_eq!(body["customer"]["name"], "Maria Silva");
        assert_eq!(body["customer"]["document"]["type"], "CPF");
        assert_eq!(body["customer"]["document"]["number"], "11144477735");
        assert_eq!(body["items"][0]["quantity"], 1);
        assert_eq!(body["items"][0]["unitPrice"], 4250);
        assert!(
            processor
                .authorization
                .as_deref()
                .unwrap()
                .starts_with("Basic ")
        );
    }

    match session.view() {
        CheckoutView::AwaitingPayment {
            transaction_id,
            qr_code,
            copy_code,
            remaining_secs,
            ..
        } => {
            assert_eq!(transaction_id, "tx_e2e");
            assert_eq!(qr_code, BR_CODE);
            assert_eq!(copy_code, BR_CODE);
            assert!((899..=900).contains(&remaining_secs));
        }
        other => panic!("unexpected view: {:?}", other),
    }
}

#[tokio::test]
async fn test_confirm_payment_settles_checkout() {
    let (base_url, processor) = spawn_processor().await;
    let session = session(base_url);
    session.submit(&maria()).await.unwrap();

    // Not paid yet: still waiting
    let view = session.confirm_payment().await.unwrap();
    assert!(matches!(view, CheckoutView::AwaitingPayment { .. }));

    processor.lock().unwrap().status = "paid".into();
    let view = session.confirm_payment().await.unwrap();
    assert_eq!(
        view,
        CheckoutView::Paid {
            transaction_id: "tx_e2e".into()
        }
    );
    assert_eq!(session.lifecycle().snapshot().phase, Phase::Paid);
    assert_eq!(processor.lock().unwrap().polls, 2);
}

#[tokio::test]
async fn test_invalid_form_never_reaches_processor() {
    let (base_url, processor) = spawn_processor().await;
    let session = session(base_url);

    let mut form = maria();
    form.tax_id = "111.111.111-11".into();
    form.email = "maria@".into();

    let err = session.submit(&form).await.unwrap_err();
    match err {
        LifecycleError::Validation(errors) => {
            assert_eq!(errors.iter().count(), 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(processor.lock().unwrap().created.is_none());
    assert_eq!(session.view(), CheckoutView::Form);
}

#[tokio::test]
async fn test_back_abandons_checkout() {
    let (base_url, _processor) = spawn_processor().await;
    let session = session(base_url);
    session.submit(&maria()).await.unwrap();

    assert_eq!(session.back(), CheckoutView::Form);
    assert!(matches!(
        session.confirm_payment().await,
        Err(LifecycleError::NotActive)
    ));
}
