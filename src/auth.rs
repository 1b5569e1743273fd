//! Gateway access check for inbound requests.

use crate::error::{GatewayError, Result};
use secrecy::{ExposeSecret, SecretString};

const BEARER_PREFIX: &str = "Bearer ";

pub const INVALID_KEY_MESSAGE: &str = "Invalid gateway API key.";

/// Check an `Authorization` header value against the gateway secret.
///
/// The `Bearer ` prefix is optional; whatever remains must equal the secret exactly.
pub fn authorize(header: Option<&str>, secret: &SecretString) -> Result<()> {
    let Some(value) = header else {
        return Err(GatewayError::unauthorized(INVALID_KEY_MESSAGE));
    };

    let credential = value.strip_prefix(BEARER_PREFIX).unwrap_or(value);

    if constant_time_eq(credential.as_bytes(), secret.expose_secret().as_bytes()) {
        Ok(())
    } else {
        Err(GatewayError::unauthorized(INVALID_KEY_MESSAGE))
    }
}

// Running time depends only on the lengths, not on where the bytes differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
