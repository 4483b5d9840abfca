//! Customer contact details attached to offers and reservations.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

const MIN_NAME_CHARS: usize = 3;
const MIN_PHONE_DIGITS: usize = 7;

/// Contact snapshot captured at submission time.
///
/// Offers and reservations copy these fields; there is no customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub comments: String,
}

impl ValueObject for Customer {}

impl Customer {
    /// Validate and normalize (trim) contact fields.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        comments: Option<String>,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();
        let phone = phone.into().trim().to_string();
        let comments = comments.unwrap_or_default().trim().to_string();

        if name.chars().count() < MIN_NAME_CHARS {
            return Err(DomainError::validation(format!(
                "customer name must have at least {MIN_NAME_CHARS} characters"
            )));
        }
        if !is_plausible_email(&email) {
            return Err(DomainError::validation("customer email is not valid"));
        }
        if phone.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS {
            return Err(DomainError::validation(format!(
                "customer phone must have at least {MIN_PHONE_DIGITS} digits"
            )));
        }

        Ok(Self {
            name,
            email,
            phone,
            comments,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
