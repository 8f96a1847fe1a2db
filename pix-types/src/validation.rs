//! Payer identity validation and display masks.
//!
//! Everything here is pure: the UI layer decides how to show messages.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Customer;
use crate::error::{FieldError, ValidationErrors};

/// Number of digits in a CPF.
pub const TAX_ID_DIGITS: usize = 11;
/// Masked CPF length, `000.000.000-00`.
pub const TAX_ID_MASKED_LEN: usize = 14;
/// Masked phone length, `(00) 00000-0000`.
pub const PHONE_MASKED_LEN: usize = 15;

/// A payer input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FullName,
    Email,
    TaxId,
    Phone,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FullName => "full_name",
            Field::Email => "email",
            Field::TaxId => "tax_id",
            Field::Phone => "phone",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "name" | "full_name" | "fullname" => Ok(Field::FullName),
            "email" => Ok(Field::Email),
            "tax_id" | "taxid" | "cpf" | "document" => Ok(Field::TaxId),
            "phone" => Ok(Field::Phone),
            other => Err(format!(
                "Unknown field: {}. Supported: name, email, tax-id, phone",
                other
            )),
        }
    }
}

/// How strictly payer input is checked.
///
/// `Strict` runs the full CPF checksum and requires 10 or 11 phone digits.
/// `Lenient` only checks CPF length and repeated digits, and accepts any
/// phone with at least 10 digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Strict,
    Lenient,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "lenient" => Ok(ValidationMode::Lenient),
            other => Err(format!("Unknown validation mode: {}", other)),
        }
    }
}

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValidation {
    pub valid: bool,
    pub normalized_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl FieldValidation {
    fn ok(normalized_value: String) -> Self {
        Self {
            valid: true,
            normalized_value,
            error_message: None,
        }
    }

    fn fail(normalized_value: String, message: &str) -> Self {
        Self {
            valid: false,
            normalized_value,
            error_message: Some(message.to_string()),
        }
    }
}

/// Raw, possibly masked, payer input as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerForm {
    pub full_name: String,
    pub email: String,
    pub tax_id: String,
    pub phone: String,
}

/// Validates a field with strict rules.
pub fn validate(field: Field, raw: &str) -> FieldValidation {
    validate_with(ValidationMode::Strict, field, raw)
}

/// Validates a field under the given mode.
pub fn validate_with(mode: ValidationMode, field: Field, raw: &str) -> FieldValidation {
    match field {
        Field::FullName => {
            let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if normalized.is_empty() {
                FieldValidation::fail(normalized, "Full name is required")
            } else if !is_valid_full_name(&normalized) {
                FieldValidation::fail(normalized, "Enter your full name")
            } else {
                FieldValidation::ok(normalized)
            }
        }
        Field::Email => {
            let normalized = raw.trim().to_string();
            if normalized.is_empty() {
                FieldValidation::fail(normalized, "Email is required")
            } else if !is_valid_email(&normalized) {
                FieldValidation::fail(normalized, "Enter a valid email address")
            } else {
                FieldValidation::ok(normalized)
            }
        }
        Field::TaxId => {
            let normalized = digits(raw);
            if raw.trim().is_empty() {
                return FieldValidation::fail(normalized, "CPF is required");
            }
            match mode {
                ValidationMode::Strict if !is_valid_tax_id(&normalized) => {
                    FieldValidation::fail(normalized, "Enter a valid CPF")
                }
                ValidationMode::Lenient if normalized.len() != TAX_ID_DIGITS => {
                    FieldValidation::fail(normalized, "CPF must have 11 digits")
                }
                ValidationMode::Lenient if all_same_digit(&normalized) => {
                    FieldValidation::fail(normalized, "Invalid CPF")
                }
                _ => FieldValidation::ok(normalized),
            }
        }
        Field::Phone => {
            let normalized = digits(raw);
            if raw.trim().is_empty() {
                return FieldValidation::fail(normalized, "Phone is required");
            }
            let valid = match mode {
                ValidationMode::Strict => is_valid_phone(&normalized),
                ValidationMode::Lenient => normalized.len() >= 10,
            };
            if valid {
                FieldValidation::ok(normalized)
            } else {
                FieldValidation::fail(normalized, "Enter a valid phone number")
            }
        }
    }
}

/// Validates every field of the form and collects all failures.
pub fn validate_customer(
    mode: ValidationMode,
    form: &CustomerForm,
) -> Result<Customer, ValidationErrors> {
    let checks = [
        (Field::FullName, validate_with(mode, Field::FullName, &form.full_name)),
        (Field::Email, validate_with(mode, Field::Email, &form.email)),
        (Field::TaxId, validate_with(mode, Field::TaxId, &form.tax_id)),
        (Field::Phone, validate_with(mode, Field::Phone, &form.phone)),
    ];

    let errors: Vec<FieldError> = checks
        .iter()
        .filter_map(|(field, check)| {
            check.error_message.as_ref().map(|message| FieldError {
                field: *field,
                message: message.clone(),
            })
        })
        .collect();

    if !errors.is_empty() {
        return Err(ValidationErrors::new(errors));
    }

    let [name, email, tax_id, phone] = checks.map(|(_, check)| check.normalized_value);
    Ok(Customer {
        full_name: name,
        email,
        tax_id,
        phone,
    })
}

/// Strips everything but ASCII digits.
pub fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn all_same_digit(digits: &str) -> bool {
    let bytes = digits.as_bytes();
    bytes.first().is_some_and(|first| bytes.iter().all(|b| b == first))
}

/// Mod-11 check digit over `digits`, with weights descending to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let top_weight = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=top_weight).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let remainder = (sum * 10) % 11;
    if remainder >= 10 { 0 } else { remainder }
}

/// Full CPF check: 11 digits, not all repeated, both check digits match.
pub fn is_valid_tax_id(raw: &str) -> bool {
    let clean = digits(raw);
    if clean.len() != TAX_ID_DIGITS || all_same_digit(&clean) {
        return false;
    }
    let values: Vec<u32> = clean.chars().filter_map(|c| c.to_digit(10)).collect();
    check_digit(&values[..9]) == values[9] && check_digit(&values[..10]) == values[10]
}

/// Computes the two check digits for a 9-digit CPF base.
pub fn tax_id_check_digits(base: &str) -> Option<(u32, u32)> {
    let mut values: Vec<u32> = digits(base).chars().filter_map(|c| c.to_digit(10)).collect();
    if values.len() != 9 {
        return None;
    }
    let first = check_digit(&values);
    values.push(first);
    Some((first, check_digit(&values)))
}

/// 10 or 11 digits once formatting is stripped.
pub fn is_valid_phone(raw: &str) -> bool {
    let clean = digits(raw);
    clean.len() == 10 || clean.len() == 11
}

/// `local@domain.tld` shape: no whitespace, a single `@`, a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// At least two whitespace-separated tokens.
pub fn is_valid_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

/// Masks a CPF as `000.000.000-00` while it is being typed.
pub fn format_tax_id(raw: &str) -> String {
    let digits: String = digits(raw).chars().take(TAX_ID_DIGITS).collect();
    let mut out = String::with_capacity(TAX_ID_MASKED_LEN);
    for (i, c) in digits.chars().enumerate() {
        match i {
            3 | 6 => out.push('.'),
            9 => out.push('-'),
            _ => {}
        }
        out.push(c);
    }
    out
}

/// Masks a phone as `(00) 0000-0000` or `(00) 00000-0000` while it is being typed.
pub fn format_phone(raw: &str) -> String {
    let digits: Vec<char> = digits(raw).chars().take(11).collect();
    if digits.len() <= 2 {
        return digits.into_iter().collect();
    }

    let (area, local) = digits.split_at(2);
    let split_at = if digits.len() == 11 { 5 } else { 4 };
    let mut out = String::with_capacity(PHONE_MASKED_LEN);
    out.push('(');
    out.extend(area);
    out.push_str(") ");
    for (i, c) in local.iter().enumerate() {
        if i == split_at {
            out.push('-');
        }
        out.push(*c);
    }
    out
}
