//! Client-side form checks, run before any request is sent.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 150;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid email pattern"));
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username pattern"));

fn require(fields: &[&str]) -> Result<(), AuthError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AuthError::invalid("Please fill in all fields"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL.is_match(email.trim()) {
        Ok(())
    } else {
        Err(AuthError::invalid("Please enter a valid email address"))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Length plus one uppercase, one lowercase, and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    validate_password(password)?;
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(upper && lower && digit) {
        return Err(AuthError::invalid(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(AuthError::invalid(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if len > MAX_USERNAME_LEN {
        return Err(AuthError::invalid(format!(
            "Username must not exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !USERNAME.is_match(username) {
        return Err(AuthError::invalid(
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    require(&[email, password])?;
    validate_email(email)?;
    validate_password(password)
}

/// Registration form as entered, including the confirmation field.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            confirm_password: password.clone(),
            password,
        }
    }

    pub fn with_confirmation(mut self, confirm: impl Into<String>) -> Self {
        self.confirm_password = confirm.into();
        self
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        require(&[
            &self.username,
            &self.email,
            &self.password,
            &self.confirm_password,
        ])?;
        validate_username(self.username.trim())?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(AuthError::invalid("Passwords do not match"));
        }
        validate_password_strength(&self.password)
    }
}
