//! HTTP routes.
pub mod create;
pub mod login;
pub mod users;

use std::sync::LazyLock;

use axum::Json;
use axum::extract::{FromRequest, Request};
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError};

use crate::error::ServerError;

static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9,.&\-']{2,50}$").ok());
static NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Zα-ωΑ-Ω.,\-' ]{2,50}$").ok());
static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[+ 0-9]{10,15}$").ok());
static COUNTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Zα-ωΑ-Ω.,&()\-' ]{3,100}$").ok());
static CITY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Zα-ωΑ-Ω.,&()\-' ]{3,50}$").ok());
static ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Zα-ωΑ-Ω0-9.,&()\-' ]{3,50}$").ok());

fn check(pattern: &LazyLock<Option<Regex>>, value: &str, code: &'static str) -> Result<(), ValidationError> {
    if pattern.as_ref().is_some_and(|re| re.is_match(value)) {
        Ok(())
    } else {
        Err(ValidationError::new(code))
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    check(&USERNAME, username.trim(), "invalid_username")
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    check(&NAME, name.trim(), "invalid_name")
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    check(&PHONE, phone, "invalid_phone")
}

pub fn validate_country(country: &str) -> Result<(), ValidationError> {
    check(&COUNTRY, country.trim(), "invalid_country")
}

pub fn validate_city(city: &str) -> Result<(), ValidationError> {
    check(&CITY, city.trim(), "invalid_city")
}

pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    check(&ADDRESS, address.trim(), "invalid_address")
}

/// Read blank strings as missing values.
pub fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

/// JSON body checked with [`Validate`] before reaching handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Valid(value))
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> ServerError {
    ServerError::PageNotFound
}

/// Fallback for known routes called with another method.
pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}
