//! # Recipient Addresses
//!
//! [`Address`] is the canonical identifier of an airdrop recipient: `0x`
//! followed by 40 hexadecimal digits. Input is accepted in any letter case
//! (including EIP-55 mixed-case checksums) and stored lowercased, so equality
//! and hashing operate on the canonical form.
//!
//! ## Extraction from free-form text
//!
//! Ledgers written by earlier tooling are not structured; the only reliable
//! signal in them is the address shape itself. [`extract_addresses`] scans
//! text for address tokens with word boundaries on both sides. A 40-digit hex
//! run that continues into further hex digits (such as the first 40 digits
//! of a 64-digit transaction hash) is not an address.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of hex digits after the `0x` prefix.
pub const ADDRESS_HEX_LEN: usize = 40;

/// Total length of an address string including the `0x` prefix.
pub const ADDRESS_LEN: usize = ADDRESS_HEX_LEN + 2;

/// A canonical (lowercase) recipient address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and canonicalize an address.
    ///
    /// Surrounding whitespace is ignored. The prefix may be `0x` or `0X`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != ADDRESS_LEN
            || bytes[0] != b'0'
            || !matches!(bytes[1], b'x' | b'X')
            || !bytes[2..].iter().all(u8::is_ascii_hexdigit)
        {
            return Err(ValidationError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", trimmed[2..].to_ascii_lowercase())))
    }

    /// Access the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Extract every address token from free-form text, in order of appearance.
///
/// Duplicates are returned as they occur; callers that need a set build one.
pub fn extract_addresses(text: &str) -> Vec<Address> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i + ADDRESS_LEN <= bytes.len() {
        let starts_token = i == 0 || !is_word_byte(bytes[i - 1]);
        let has_prefix = bytes[i] == b'0' && matches!(bytes[i + 1], b'x' | b'X');
        if starts_token && has_prefix {
            let end = i + ADDRESS_LEN;
            let hex_ok = bytes[i + 2..end].iter().all(u8::is_ascii_hexdigit);
            let ends_token = end == bytes.len() || !is_word_byte(bytes[end]);
            if hex_ok && ends_token {
                // All matched bytes are ASCII, so the slice is on char boundaries.
                if let Ok(addr) = Address::parse(&text[i..end]) {
                    found.push(addr);
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }

    found
}
