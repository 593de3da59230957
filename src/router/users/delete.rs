use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_self_or_admin};
use crate::image::ImageError;

/// Handler to delete an account and its profile image.
pub async fn handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    require_self_or_admin(&claims, &username)?;

    state.accounts.delete(&username).await?;

    match state.images.remove(&username).await {
        Ok(()) | Err(ImageError::NotFound) => {},
        Err(err) => {
            tracing::error!(username, error = %err, "profile image of a deleted account was kept")
        },
    }

    Ok(StatusCode::NO_CONTENT)
}
