//! PIN and username input validation
//!
//! Runs before any store I/O so malformed input never reaches the backend.

use crate::error::InputError;

/// Exact number of digits in a PIN
pub const PIN_LENGTH: usize = 5;

/// Check that `pin` is exactly [`PIN_LENGTH`] ASCII digits
pub fn validate_pin(pin: &str) -> Result<(), InputError> {
    if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::InvalidPinFormat);
    }
    Ok(())
}

/// Trim `username` and reject it if nothing is left
pub fn validate_username(username: &str) -> Result<&str, InputError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(InputError::MissingUsername);
    }
    Ok(trimmed)
}

/// Validate both form fields, username first
pub fn validate_credentials<'a>(username: &'a str, pin: &str) -> Result<&'a str, InputError> {
    let username = validate_username(username)?;
    validate_pin(pin)?;
    Ok(username)
}
