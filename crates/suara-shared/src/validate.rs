//! Required-field checks, applied before any remote call.

use crate::constants::PASSWORD_MIN_LEN;
use crate::error::ValidationError;
use crate::models::NewAccount;

fn required(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(name));
    }
    Ok(())
}

pub fn complaint(category: &str, body: &str) -> Result<(), ValidationError> {
    required("category", category)?;
    required("body", body)
}

pub fn news_post(title: &str, body: &str) -> Result<(), ValidationError> {
    required("title", title)?;
    required("body", body)
}

pub fn message(body: &str) -> Result<(), ValidationError> {
    required("message", body)
}

pub fn group_name(name: &str) -> Result<(), ValidationError> {
    required("group name", name)
}

pub fn display_name(name: &str) -> Result<(), ValidationError> {
    required("name", name)
}

pub fn credentials(identifier: &str, secret: &str) -> Result<(), ValidationError> {
    required("NIK/NIS", identifier)?;
    required("password", secret)
}

pub fn password(secret: &str) -> Result<(), ValidationError> {
    if secret.len() < PASSWORD_MIN_LEN {
        return Err(ValidationError::PasswordTooShort(PASSWORD_MIN_LEN));
    }
    Ok(())
}

pub fn account(account: &NewAccount) -> Result<(), ValidationError> {
    required("NIK/NIS", &account.identifier)?;
    required("name", &account.name)?;
    password(&account.secret)
}
