//! Access control on verified tokens.
//!
//! Guards are plain functions over [`Claims`]; handlers call them in order,
//! always after [`Authenticated`] has extracted the claims.

use axum::extract::FromRequestParts;
use axum::http::HeaderName;
use axum::http::header::InvalidHeaderName;
use axum::http::request::Parts;

use crate::config;
use crate::error::ServerError;
use crate::token::Claims;
use crate::user::Role;
use crate::AppState;

/// Access denials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no token was presented")]
    Unauthenticated,
    #[error("not allowed to perform this action")]
    Unauthorized,
}

/// Where bearer tokens travel on requests and responses.
#[derive(Debug, Clone)]
pub struct BearerScheme {
    pub header: HeaderName,
    pub prefix: String,
}

impl BearerScheme {
    pub fn new(config: &config::Token) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::try_from(config.header.as_str())?,
            prefix: config.prefix.clone(),
        })
    }

    /// Extract the raw token from a header value.
    ///
    /// Values without the prefix are passed through untouched, so they
    /// fail later as invalid tokens rather than as missing ones.
    pub fn token<'a>(&self, value: &'a str) -> &'a str {
        value.strip_prefix(self.prefix.as_str()).unwrap_or(value)
    }

    /// Format a token to be written in [`BearerScheme::header`].
    pub fn format(&self, token: &str) -> String {
        format!("{}{token}", self.prefix)
    }
}

pub fn require_authenticated(claims: Option<Claims>) -> Result<Claims, AccessError> {
    claims.ok_or(AccessError::Unauthenticated)
}

pub fn require_self(claims: &Claims, owner: &str) -> Result<(), AccessError> {
    if claims.sub == owner {
        Ok(())
    } else {
        Err(AccessError::Unauthorized)
    }
}

pub fn require_admin(claims: &Claims) -> Result<(), AccessError> {
    if claims.role == Role::Admin {
        Ok(())
    } else {
        Err(AccessError::Unauthorized)
    }
}

pub fn require_self_or_admin(claims: &Claims, owner: &str) -> Result<(), AccessError> {
    require_self(claims, owner).or_else(|_| require_admin(claims))
}

/// Claims of the bearer token sent with the request.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = match parts.headers.get(&state.bearer.header) {
            Some(value) => {
                let value = value.to_str().unwrap_or_default();
                Some(state.token.decode(state.bearer.token(value))?)
            },
            None => None,
        };

        Ok(Self(require_authenticated(claims)?))
    }
}
