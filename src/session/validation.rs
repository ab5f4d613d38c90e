//! Local form validation. Runs before any network call.

use crate::api::types::PredictionRequest;
use crate::error::{ClientError, ClientResult};

pub const MIN_PASSWORD_CHARS: usize = 6;
/// The server hashes passwords with bcrypt, which only reads 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 50;

/// Validate a registration form. Returns the trimmed username.
pub fn validate_registration<'a>(
    username: &'a str,
    password: &str,
    confirm: &str,
) -> ClientResult<&'a str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(invalid("Username cannot be empty"));
    }
    let name_len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&name_len) {
        return Err(invalid(&format!(
            "Username must be {MIN_USERNAME_CHARS}-{MAX_USERNAME_CHARS} characters"
        )));
    }
    if password != confirm {
        return Err(invalid("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(invalid(&format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters long"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(invalid(&format!(
            "Password cannot be longer than {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(username)
}

/// Validate login input. Only checks that both fields are present.
pub fn validate_login(username: &str, password: &str) -> ClientResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(invalid("Username and password are required"));
    }
    Ok(())
}

/// A statement is the only required field of an analysis request.
pub fn validate_prediction(request: &PredictionRequest) -> ClientResult<()> {
    if request.statement.trim().is_empty() {
        return Err(invalid("Statement is required"));
    }
    Ok(())
}

fn invalid(msg: &str) -> ClientError {
    ClientError::Validation(msg.to_string())
}
