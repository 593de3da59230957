//! Users-related HTTP API.
mod activate;
mod delete;
mod get;
mod image;
mod list;
mod update;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};

use crate::AppState;
use crate::router::{create, login, method_not_allowed};

/// Multipart boundaries and headers sent around the image itself.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

pub fn router(state: &AppState) -> Router<AppState> {
    let upload_limit = state.images.max_file_size().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // `POST /users` registers, `GET /users` lists. Admin only.
        .route("/", post(create::handler).get(list::handler))
        .route("/login", post(login::handler))
        // `POST /users/search` lists with filters. Admin only.
        .route("/search", post(list::search))
        .route(
            "/{username}",
            get(get::handler).put(update::handler).delete(delete::handler),
        )
        .route("/{username}/activate", put(activate::handler))
        .route(
            "/{username}/profile-image",
            get(image::download)
                .put(image::upload)
                .delete(image::delete)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .method_not_allowed_fallback(method_not_allowed)
}
