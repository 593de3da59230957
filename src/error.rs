//! Error handler for the accounts service.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::crypto::CryptoError;
use crate::guard::AccessError;
use crate::image::ImageError;
use crate::lockout::AuthError;
use crate::token::TokenError;
use crate::user::StoreError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    MultipartRejection(#[from] MultipartRejection),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("no user `{0}` was found")]
    UserNotFound(String),

    #[error("page not found")]
    PageNotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Error codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownError,
    PageNotFound,
    MethodNotAllowed,
    BadRequest,
    NotAuthenticated,
    NotAuthorized,
    ExpiredToken,
    InvalidToken,
    AccountNotEnabled,
    AccountLocked,
    BadCredentials,
    FileSizeLimit,
    FileFormatNotSupported,
    NoFile,
    ProfileImageNotFound,
    UserNotFound,
    UsernameTaken,
    EmailTaken,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::PageNotFound
            | ErrorCode::ProfileImageNotFound
            | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::BadRequest
            | ErrorCode::InvalidToken
            | ErrorCode::FileSizeLimit
            | ErrorCode::FileFormatNotSupported
            | ErrorCode::NoFile => StatusCode::BAD_REQUEST,
            ErrorCode::NotAuthenticated | ErrorCode::ExpiredToken => StatusCode::UNAUTHORIZED,
            ErrorCode::NotAuthorized
            | ErrorCode::AccountNotEnabled
            | ErrorCode::AccountLocked
            | ErrorCode::BadCredentials => StatusCode::FORBIDDEN,
            ErrorCode::UsernameTaken | ErrorCode::EmailTaken => StatusCode::CONFLICT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::PageNotFound => "PAGE_NOT_FOUND",
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorCode::NotAuthorized => "NOT_AUTHORIZED",
            ErrorCode::ExpiredToken => "EXPIRED_TOKEN",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::AccountNotEnabled => "ACCOUNT_NOT_ENABLED",
            ErrorCode::AccountLocked => "ACCOUNT_LOCKED",
            ErrorCode::BadCredentials => "BAD_CREDENTIALS",
            ErrorCode::FileSizeLimit => "FILE_SIZE_LIMIT",
            ErrorCode::FileFormatNotSupported => "FILE_FORMAT_NOT_SUPPORTED",
            ErrorCode::NoFile => "NO_FILE",
            ErrorCode::ProfileImageNotFound => "PROFILE_IMAGE_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::UsernameTaken => "USERNAME_TAKEN",
            ErrorCode::EmailTaken => "EMAIL_TAKEN",
        }
    }

    /// Default human readable message.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::UnknownError => "Unknown Internal Server Error",
            ErrorCode::PageNotFound => "Page Not Found",
            ErrorCode::MethodNotAllowed => "Method Not Allowed",
            ErrorCode::BadRequest => "Bad Request",
            ErrorCode::NotAuthenticated | ErrorCode::InvalidToken => "You have to log in first",
            ErrorCode::NotAuthorized => "You don't have permission for this action",
            ErrorCode::ExpiredToken => "You have to log in again",
            ErrorCode::AccountNotEnabled => {
                "Your account is pending activation by admins. Try again later"
            },
            ErrorCode::AccountLocked => {
                "Your account has been locked due to many failed login attempts. Try again later"
            },
            ErrorCode::BadCredentials => "User credentials are wrong (username or password)",
            ErrorCode::FileSizeLimit => "Max file size exceeded",
            ErrorCode::FileFormatNotSupported => "File format is not supported",
            ErrorCode::NoFile => "No file was sent to the server",
            ErrorCode::ProfileImageNotFound => "Profile image not found",
            ErrorCode::UserNotFound => "No user was found with that username",
            ErrorCode::UsernameTaken => "Username is already used by another user",
            ErrorCode::EmailTaken => "Email is already used by another user",
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    status: u16,
    code: &'static str,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: code.status().as_u16(),
            code: code.as_str(),
            message: code.message().to_owned(),
            timestamp: Utc::now(),
            errors: None,
        }
    }

    /// Replace default message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        match serde_json::to_string(&self) {
            Ok(body) => Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into()),
            Err(_) => Ok(internal_server_error()),
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl ServerError {
    /// Client facing code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Query(_) => ErrorCode::BadRequest,
            ServerError::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ErrorCode::FileSizeLimit
            },
            ServerError::Multipart(_) => ErrorCode::BadRequest,
            ServerError::MultipartRejection(_) => ErrorCode::NoFile,
            ServerError::Auth(AuthError::BadCredentials) => ErrorCode::BadCredentials,
            ServerError::Auth(AuthError::AccountLocked) => ErrorCode::AccountLocked,
            ServerError::Auth(AuthError::AccountNotEnabled) => ErrorCode::AccountNotEnabled,
            ServerError::Token(TokenError::Expired) => ErrorCode::ExpiredToken,
            ServerError::Token(TokenError::Invalid) => ErrorCode::InvalidToken,
            ServerError::Access(AccessError::Unauthenticated) => ErrorCode::NotAuthenticated,
            ServerError::Access(AccessError::Unauthorized) => ErrorCode::NotAuthorized,
            ServerError::Store(StoreError::UsernameTaken(_)) => ErrorCode::UsernameTaken,
            ServerError::Store(StoreError::EmailTaken(_)) => ErrorCode::EmailTaken,
            ServerError::Image(ImageError::TooLarge { .. }) => ErrorCode::FileSizeLimit,
            ServerError::Image(ImageError::Unsupported { .. }) => {
                ErrorCode::FileFormatNotSupported
            },
            ServerError::Image(ImageError::NoFile) => ErrorCode::NoFile,
            ServerError::Image(ImageError::InvalidOwner(_)) => ErrorCode::BadRequest,
            ServerError::Image(ImageError::NotFound) => ErrorCode::ProfileImageNotFound,
            ServerError::UserNotFound(_) => ErrorCode::UserNotFound,
            ServerError::PageNotFound => ErrorCode::PageNotFound,
            ServerError::MethodNotAllowed => ErrorCode::MethodNotAllowed,
            ServerError::Token(TokenError::Signing)
            | ServerError::Store(StoreError::Database(_))
            | ServerError::Image(ImageError::Io(_))
            | ServerError::Crypto(_)
            | ServerError::Internal { .. } => ErrorCode::UnknownError,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let code = self.code();
        let response = ResponseError::new(code);

        let response = match &self {
            ServerError::Validation(errors) => response.errors(errors),
            ServerError::Store(StoreError::UsernameTaken(username)) => {
                response.message(format!("Username {username} already used by another user."))
            },
            ServerError::Store(StoreError::EmailTaken(email)) => {
                response.message(format!("Email {email} already used by another user."))
            },
            ServerError::UserNotFound(username) => {
                response.message(format!("No user with username '{username}' was found."))
            },
            ServerError::Image(err @ (ImageError::TooLarge { .. } | ImageError::Unsupported { .. })) => {
                response.message(err.to_string())
            },
            _ if code == ErrorCode::UnknownError => {
                tracing::error!(error = %self, source = ?std::error::Error::source(&self), "server returned 500 status");
                response
            },
            _ => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    let code = ErrorCode::UnknownError;

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "status": code.status().as_u16(),
                "code": code.as_str(),
                "message": code.message(),
                "timestamp": Utc::now(),
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_auth_errors() {
        let (status, json) = body(AuthError::AccountLocked.into()).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["status"], 403);
        assert_eq!(json["code"], "ACCOUNT_LOCKED");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_token_and_access_errors() {
        let (status, json) = body(TokenError::Expired.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "EXPIRED_TOKEN");

        let (status, json) = body(TokenError::Invalid.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_TOKEN");

        let (status, json) = body(AccessError::Unauthenticated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "NOT_AUTHENTICATED");

        let (status, _) = body(AccessError::Unauthorized.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_conflicts() {
        let (status, json) = body(StoreError::UsernameTaken("alice".into()).into()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "USERNAME_TAKEN");
        assert_eq!(json["message"], "Username alice already used by another user.");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = ServerError::Internal {
            details: "database password is hunter2".into(),
            source: None,
        };
        let (status, json) = body(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "UNKNOWN_ERROR");
        assert_eq!(json["message"], "Unknown Internal Server Error");
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "username",
            validator::ValidationError::new("invalid_username")
                .with_message("Invalid username.".into()),
        );
        let (status, json) = body(errors.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
        assert_eq!(json["errors"][0]["field"], "username");
        assert_eq!(json["errors"][0]["message"], "Invalid username.");
    }
}
