use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_admin};

/// Handler to enable an account pending activation.
pub async fn handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    require_admin(&claims)?;

    state.accounts.activate(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}
