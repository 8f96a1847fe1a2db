//! Upstream response normalizer.
//!
//! Processors return the PIX code under inconsistent key names and nesting
//! depths. The rules below are tried in a fixed order and the first match
//! wins; upstream contract drift is caught here instead of leaking into the
//! rest of the system.
//!
//! Resolution order:
//! 1. `pix.{qrCode|qr_code|qrcode}`
//! 2. top-level `{qrCode|qr_code|qrcode}`
//! 3. any top-level key containing "qr" or "pix": objects are searched for
//!    the same keys, strings are accepted only if they look like a BR Code
//!
//! Anything else fails with [`GatewayError::MissingPixData`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use pix_types::{GatewayError, PixData, TransactionStatus};

/// Fixed prefix of a static/dynamic PIX BR Code (payload format + merchant info tag).
pub const BR_CODE_PREFIX: &str = "00020126";

const QR_KEYS: [&str; 3] = ["qrCode", "qr_code", "qrcode"];
const IMAGE_KEYS: [&str; 5] = [
    "qrCodeBase64",
    "qrcode_base64",
    "qr_code_base64",
    "qrCodeImage",
    "qr_code_image",
];
const COPY_PASTE_KEYS: [&str; 4] = ["copyAndPaste", "copy_paste", "copiaECola", "copia_e_cola"];
const ID_KEYS: [&str; 3] = ["id", "transactionId", "transaction_id"];
const PAID_AT_KEYS: [&str; 2] = ["paidAt", "paid_at"];
const EXPIRY_KEYS: [&str; 4] = ["expirationDate", "expiresAt", "expires_at", "expiration_date"];

/// Which rule located the PIX data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixSource {
    PixObject,
    TopLevel,
    ScannedObject,
    ScannedString,
}

/// PIX data plus where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPix {
    pub data: PixData,
    pub source: PixSource,
}

type Rule = fn(&Map<String, Value>) -> Option<NormalizedPix>;

const RULES: [Rule; 3] = [from_pix_object, from_top_level, from_scanned_keys];

/// Extracts the PIX payload, image and copy-paste code from an upstream response.
pub fn normalize_pix(response: &Value) -> Result<NormalizedPix, GatewayError> {
    let Some(object) = response.as_object() else {
        return Err(GatewayError::MissingPixData { keys: Vec::new() });
    };

    RULES
        .iter()
        .find_map(|rule| rule(object))
        .ok_or_else(|| GatewayError::MissingPixData {
            keys: object.keys().cloned().collect(),
        })
}

/// True if `value` structurally resembles a BR Code.
///
/// Purely numeric strings are refused even with the right prefix, since a
/// real payload always carries the `br.gov.bcb.pix` GUI.
pub fn looks_like_br_code(value: &str) -> bool {
    value.starts_with(BR_CODE_PREFIX) && !value.chars().all(|c| c.is_ascii_digit())
}

fn from_pix_object(response: &Map<String, Value>) -> Option<NormalizedPix> {
    let pix = response.get("pix")?.as_object()?;
    pix_from_container(pix).map(|data| NormalizedPix {
        data,
        source: PixSource::PixObject,
    })
}

fn from_top_level(response: &Map<String, Value>) -> Option<NormalizedPix> {
    pix_from_container(response).map(|data| NormalizedPix {
        data,
        source: PixSource::TopLevel,
    })
}

fn from_scanned_keys(response: &Map<String, Value>) -> Option<NormalizedPix> {
    response
        .iter()
        .filter(|(key, _)| {
            let key = key.to_ascii_lowercase();
            key.contains("qr") || key.contains("pix")
        })
        .find_map(|(_, value)| match value {
            Value::Object(nested) => pix_from_container(nested).map(|data| NormalizedPix {
                data,
                source: PixSource::ScannedObject,
            }),
            Value::String(candidate) if looks_like_br_code(candidate) => Some(NormalizedPix {
                data: PixData::from_payload(candidate.clone()),
                source: PixSource::ScannedString,
            }),
            _ => None,
        })
}

/// Reads payload, image and copy-paste code that sit side by side in one object.
fn pix_from_container(container: &Map<String, Value>) -> Option<PixData> {
    let payload = first_string(container, &QR_KEYS)?;
    let image = first_string(container, &IMAGE_KEYS).map(str::to_string);
    let copy_and_paste = first_string(container, &COPY_PASTE_KEYS).unwrap_or(payload);

    Some(PixData {
        qr_code_payload: payload.to_string(),
        qr_code_image_data: image,
        copy_and_paste: copy_and_paste.to_string(),
    })
}

fn first_string<'a>(container: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| container.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Upstream transaction id, as a string even when sent as a number.
pub fn transaction_id(response: &Value) -> Option<String> {
    let object = response.as_object()?;
    ID_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Upstream status; absent or unrecognized values mean `waiting_payment`.
pub fn status(response: &Value) -> TransactionStatus {
    let raw = response.get("status").and_then(Value::as_str);
    match raw.map(|s| (s, TransactionStatus::parse_upstream(s))) {
        Some((_, Some(status))) => status,
        Some((s, None)) => {
            tracing::warn!(status = s, "Unrecognized upstream status, assuming waiting_payment");
            TransactionStatus::default()
        }
        None => TransactionStatus::default(),
    }
}

/// Amount in centavos, if the upstream echoes an integer amount.
pub fn amount_cents(response: &Value) -> Option<i64> {
    response.get("amount").and_then(Value::as_i64)
}

/// Payment confirmation time.
pub fn paid_at(response: &Value) -> Option<DateTime<Utc>> {
    let object = response.as_object()?;
    PAID_AT_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

/// Expiration reported by the upstream, looked up inside `pix` first.
pub fn expires_at(response: &Value) -> Option<DateTime<Utc>> {
    let object = response.as_object()?;
    let pix = object.get("pix").and_then(Value::as_object);
    pix.into_iter()
        .chain(std::iter::once(object))
        .flat_map(|container| EXPIRY_KEYS.iter().filter_map(move |key| container.get(*key)))
        .filter_map(Value::as_str)
        .find_map(parse_timestamp)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable message from an upstream error body.
pub fn error_message(response: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .filter_map(|key| response.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(nested) => nested
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
