use core::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use storefront_core::DomainError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Human-shareable reservation code: exactly 10 characters of `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReservationCode(String);

impl ReservationCode {
    pub const LENGTH: usize = 10;

    /// Draw a fresh code. Uniqueness is the caller's concern (check the ledger
    /// and draw again on collision).
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..Self::LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ReservationCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReservationCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == Self::LENGTH
            && s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if !valid {
            return Err(DomainError::invalid_id(format!(
                "ReservationCode: expected {} characters of A-Z0-9, got '{s}'",
                Self::LENGTH
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ReservationCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReservationCode> for String {
    fn from(value: ReservationCode) -> Self {
        value.0
    }
}
