//! Client-side checks that run before any network call.

use thiserror::Error;

/// Minimum length accepted for a new password
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("New password and confirmation do not match")]
    PasswordMismatch,

    #[error("New password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("New password must differ from the current password")]
    PasswordUnchanged,

    #[error("End date must not be before start date")]
    InvalidDateRange,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

pub fn validate_credentials(identifier: &str, password: &str) -> Result<(), ValidationError> {
    require(identifier, "Username")?;
    require(password, "Password")
}

pub fn validate_otp(identifier: &str, code: &str) -> Result<(), ValidationError> {
    require(identifier, "Username")?;
    require(code, "OTP code")
}

pub fn validate_reset(
    email: &str,
    otp_code: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    require(email, "Email")?;
    require(otp_code, "Reset code")?;
    require(new_password, "New password")?;
    if new_password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn validate_password_change(
    current_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    require(current_password, "Current password")?;
    require(new_password, "New password")?;
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
    require(confirm_password, "Password confirmation")?;
    if new_password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if new_password == current_password {
        return Err(ValidationError::PasswordUnchanged);
    }
    Ok(())
}
