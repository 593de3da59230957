use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::AccountBuilder;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(custom(
        function = "crate::router::validate_username",
        message = "Username must be 2 to 50 letters, digits or ,.&-' characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 2,
        message = "Password must contain at least 2 characters."
    ))]
    pub password: String,
    #[validate(custom(
        function = "crate::router::validate_name",
        message = "First name must be 2 to 50 letters."
    ))]
    pub first_name: String,
    #[validate(custom(
        function = "crate::router::validate_name",
        message = "Last name must be 2 to 50 letters."
    ))]
    pub last_name: String,
    #[validate(
        email(message = "Email must be formatted."),
        length(max = 50, message = "Email must be at most 50 characters.")
    )]
    pub email: String,
    #[validate(custom(
        function = "crate::router::validate_phone",
        message = "Phone must be 10 to 15 digits."
    ))]
    pub phone: Option<String>,
    #[validate(custom(function = "crate::router::validate_country"))]
    pub country: Option<String>,
    #[validate(custom(function = "crate::router::validate_city"))]
    pub city: Option<String>,
    #[validate(custom(function = "crate::router::validate_address"))]
    pub address: Option<String>,
}

/// Handler to register a user.
///
/// New accounts wait for an admin activation before being able to log in.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<StatusCode> {
    let builder = AccountBuilder::new()
        .username(&body.username)
        .email(&body.email)
        .name(&body.first_name, &body.last_name)
        .phone(body.phone)
        .location(body.country, body.city, body.address);

    state.accounts.register(builder, body.password).await?;

    Ok(StatusCode::CREATED)
}
