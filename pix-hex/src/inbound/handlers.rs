//! HTTP request handlers.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Path, State, rejection::JsonRejection},
    http::{Extensions, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use pix_types::{AppError, CreatePixRequest, ErrorResponse, FieldErrorBody, PixGateway};

use crate::PixService;

/// Application state shared across handlers.
pub struct AppState<G: PixGateway> {
    pub service: PixService<G>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, "validation_error", errors.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::UpstreamRejected { status, message } => (
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_rejected",
                message.clone(),
            ),
            AppError::UpstreamUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream_unavailable",
                "Payment processor is unavailable. Please try again.".into(),
            ),
            AppError::InvalidUpstreamResponse(_) => (
                StatusCode::BAD_GATEWAY,
                "invalid_upstream_response",
                "Payment processor returned no PIX data".into(),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Payment service is not configured".into(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".into(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        let fields = match &self.0 {
            AppError::Validation(errors) => errors.iter().map(FieldErrorBody::from).collect(),
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            error: kind.to_string(),
            message,
            code: status.as_u16(),
            fields,
        };

        (status, Json(body)).into_response()
    }
}

/// IP of the connecting peer, when the server runs with connect info.
pub(crate) fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Extractor for the connecting peer's IP. Never rejects.
pub struct PeerIp(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for PeerIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerIp(peer_ip(&parts.extensions)))
    }
}

/// Health check endpoint.
pub async fn health<G: PixGateway>(State(state): State<Arc<AppState<G>>>) -> impl IntoResponse {
    Json(state.service.health())
}

/// Create a PIX charge.
#[tracing::instrument(skip(state, payload))]
pub async fn create_pix<G: PixGateway>(
    State(state): State<Arc<AppState<G>>>,
    PeerIp(peer): PeerIp,
    payload: Result<Json<CreatePixRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    tracing::info!(amount = req.amount, items = req.items.len(), "Creating PIX charge");

    let resp = state
        .service
        .create_pix(req, peer.map(|ip| ip.to_string()))
        .await?;
    tracing::info!(transaction_id = %resp.transaction_id, "PIX charge created");
    Ok(Json(resp))
}

/// Get the status of a transaction.
#[tracing::instrument(skip(state), fields(transaction_id = %id))]
pub async fn get_transaction<G: PixGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.service.get_transaction(&id).await?;
    Ok(Json(status))
}

/// Cancel (refund) a transaction.
#[tracing::instrument(skip(state), fields(transaction_id = %id))]
pub async fn cancel_transaction<G: PixGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.cancel_transaction(&id).await?;
    tracing::info!(status = %resp.status, "Transaction cancelled");
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pix_types::{FieldError, ValidationErrors};

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_status_passthrough() {
        let (status, body) = render(AppError::UpstreamRejected {
            status: 422,
            message: "Documento inválido".into(),
        })
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "upstream_rejected");
        assert_eq!(body["message"], "Documento inválido");
        assert_eq!(body["code"], 422);

        let (status, _) = render(AppError::UpstreamRejected {
            status: 302,
            message: "moved".into(),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) =
            render(AppError::Configuration("PIX_UPSTREAM_SECRET is not set".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("SECRET"));

        let (status, body) = render(AppError::UpstreamUnavailable("connect refused".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "upstream_unavailable");

        let (status, _) = render(AppError::InvalidUpstreamResponse("keys: id".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let errors = ValidationErrors::new(vec![FieldError {
            field: pix_types::Field::TaxId,
            message: "Enter a valid CPF".into(),
        }]);
        let (status, body) = render(AppError::Validation(errors)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["fields"][0]["field"], "tax_id");
        assert_eq!(body["fields"][0]["message"], "Enter a valid CPF");
    }

    #[tokio::test]
    async fn test_not_found_has_no_fields() {
        let (status, body) = render(AppError::NotFound("Transaction tx_1".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("fields").is_none());
    }
}
