//! Registration and login input rules.
//!
//! Checks run in a fixed order so callers always see the same first error:
//! master code, required fields, username length, password length.

use validator::{Validate, ValidationErrors};

use crate::error::CoreError;

/// A registration request after the master code has been accepted.
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "API key is required"))]
    pub api_key: String,
}

/// Validate a registration request.
///
/// `master_code` is compared against `expected_master_code` before any other
/// field is looked at.
pub fn validate_registration(
    expected_master_code: &str,
    master_code: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
    api_key: Option<&str>,
) -> Result<NewAccount, CoreError> {
    if master_code != Some(expected_master_code) {
        return Err(CoreError::Forbidden("Invalid master access code".into()));
    }

    let (Some(username), Some(password), Some(api_key)) = (
        non_blank(username),
        non_blank(password),
        non_blank(api_key),
    ) else {
        return Err(CoreError::Validation("All fields required".into()));
    };

    let account = NewAccount {
        username: username.to_string(),
        password: password.to_string(),
        api_key: api_key.to_string(),
    };

    if let Err(errors) = account.validate() {
        let message = ["username", "password", "api_key"]
            .iter()
            .find_map(|field| first_message(&errors, field))
            .unwrap_or_else(|| errors.to_string());
        return Err(CoreError::Validation(message));
    }

    Ok(account)
}

/// Require both login fields to be present and non-blank.
pub fn validate_login<'a>(
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), CoreError> {
    match (non_blank(username), non_blank(password)) {
        (Some(u), Some(p)) => Ok((u, p)),
        _ => Err(CoreError::Validation(
            "Username and password required".into(),
        )),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_message(errors: &ValidationErrors, field: &str) -> Option<String> {
    errors
        .field_errors()
        .get(field)
        .and_then(|errs| errs.first())
        .and_then(|err| err.message.as_ref())
        .map(|msg| msg.to_string())
}
