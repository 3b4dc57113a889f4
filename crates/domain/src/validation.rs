//! Checkout form validation.
//!
//! Both forms are checked synchronously and field by field, so the caller
//! gets every problem in one pass. Card data is checked and then dropped;
//! nothing here is persisted.

use serde::{Deserialize, Serialize};
use store::{Address, CustomerDetails};

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field error found while validating a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding one error.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if `field` has at least one error.
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn check_length(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        errors.add(field, format!("must be between {min} and {max} characters"));
    }
}

/// `local@domain.tld` with no whitespace and a non-empty part on each side.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// 10 to 15 digits; spaces, dashes, parentheses and one leading `+` allowed.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return false;
    }
    let digits = body.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

fn is_valid_zip(zip: &str) -> bool {
    let zip = zip.trim();
    (3..=10).contains(&zip.chars().count())
        && zip
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-'))
}

/// Shipping details collected in the first checkout step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_length(&mut errors, "firstName", &self.first_name, 2, 50);
        check_length(&mut errors, "lastName", &self.last_name, 2, 50);
        if !is_valid_email(self.email.trim()) {
            errors.add("email", "must be a valid email address");
        }
        if !is_valid_phone(&self.phone) {
            errors.add("phone", "must contain 10 to 15 digits");
        }
        check_length(&mut errors, "address", &self.address, 5, 100);
        check_length(&mut errors, "city", &self.city, 2, 50);
        check_length(&mut errors, "state", &self.state, 2, 50);
        if !is_valid_zip(&self.zip_code) {
            errors.add("zipCode", "must be 3 to 10 letters, digits, spaces or dashes");
        }
        if self.country.trim().is_empty() {
            errors.add("country", "is required");
        }

        errors.into_result()
    }

    /// Customer details as stored on the order.
    pub fn to_customer(&self) -> CustomerDetails {
        CustomerDetails {
            name: format!("{} {}", self.first_name.trim(), self.last_name.trim()),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: Address {
                line1: self.address.trim().to_string(),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                postal_code: self.zip_code.trim().to_string(),
                country: self.country.trim().to_string(),
            },
        }
    }
}

/// Card details collected in the second checkout step.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    pub card_name: String,
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
}

// keep card numbers out of logs
impl std::fmt::Debug for PaymentForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentForm")
            .field("card_name", &self.card_name)
            .field("card_number", &"****")
            .finish_non_exhaustive()
    }
}

impl PaymentForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_length(&mut errors, "cardName", &self.card_name, 2, 50);

        let number: String = self.card_number.chars().filter(|c| *c != ' ').collect();
        if !number.chars().all(|c| c.is_ascii_digit()) || !(13..=19).contains(&number.len()) {
            errors.add("cardNumber", "must be 13 to 19 digits");
        }

        if !is_valid_expiry(self.expiry.trim()) {
            errors.add("expiry", "must be MM/YY");
        }

        let cvv = self.cvv.trim();
        if !cvv.chars().all(|c| c.is_ascii_digit()) || !(3..=4).contains(&cvv.len()) {
            errors.add("cvv", "must be 3 or 4 digits");
        }

        errors.into_result()
    }
}

fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 {
        return false;
    }
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(month.parse::<u8>(), Ok(1..=12))
}
