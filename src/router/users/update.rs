//! Update the profile of the logged user.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_self};
use crate::router::non_empty;
use crate::user::{AccountUpdate, Profile};

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(length(
        min = 2,
        message = "Password must contain at least 2 characters."
    ))]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(
        function = "crate::router::validate_name",
        message = "First name must be 2 to 50 letters."
    ))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(
        function = "crate::router::validate_name",
        message = "Last name must be 2 to 50 letters."
    ))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(
        email(message = "Email must be formatted."),
        length(max = 50, message = "Email must be at most 50 characters.")
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(
        function = "crate::router::validate_phone",
        message = "Phone must be 10 to 15 digits."
    ))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(function = "crate::router::validate_country"))]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(function = "crate::router::validate_city"))]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    #[validate(custom(function = "crate::router::validate_address"))]
    pub address: Option<String>,
}

impl From<Body> for AccountUpdate {
    fn from(body: Body) -> Self {
        Self {
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone: body.phone,
            country: body.country,
            city: body.city,
            address: body.address,
        }
    }
}

/// Handler to update the profile of the token owner.
///
/// The body is checked only once the caller is known to own the profile.
pub async fn handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
    body: std::result::Result<Json<Body>, JsonRejection>,
) -> Result<Json<Profile>> {
    require_self(&claims, &username)?;
    let Json(body) = body?;
    body.validate()?;

    let account = state.accounts.update(&username, body.into()).await?;
    tracing::info!(username, "profile updated");

    Ok(Json(account.into()))
}
