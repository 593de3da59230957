//! Profile image of a user.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_self, require_self_or_admin};
use crate::image::ImageError;

/// Multipart field holding the uploaded image.
const FIELD: &str = "profileImage";

/// Handler to download a profile image.
///
/// Users without image answer `204 No Content`.
pub async fn download(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    Path(username): Path<String>,
) -> Result<Response> {
    let response = match state.images.find(&username).await? {
        Some(image) => ([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };

    Ok(response)
}

/// Handler to replace the profile image of the token owner.
pub async fn upload(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<StatusCode> {
    require_self(&claims, &username)?;
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FIELD) {
            continue;
        }

        let ext = state.images.extension_for(field.content_type())?;
        let bytes = field.bytes().await?;
        state.images.store(&username, ext, &bytes).await?;

        return Ok(StatusCode::NO_CONTENT);
    }

    Err(ImageError::NoFile.into())
}

/// Handler to delete a profile image.
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    require_self_or_admin(&claims, &username)?;

    state.images.remove(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}
