//! Get a user profile.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_self_or_admin};
use crate::user::Profile;

pub async fn handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(username): Path<String>,
) -> Result<Json<Profile>> {
    require_self_or_admin(&claims, &username)?;

    let account = state.accounts.profile(&username).await?;
    Ok(Json(account.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{TimeDelta, Utc};
    use http_body_util::BodyExt;

    use crate::router::tests::{seed, state, token};
    use crate::user::{CredentialStore, Profile, Role};
    use crate::*;

    #[tokio::test]
    async fn test_get_handler() {
        let (state, store, _dir) = state().await;
        let mut alice = seed(&store, "alice", Role::User, true).await;
        alice.non_locked = false;
        alice.last_login_attempt_date = Utc::now() - TimeDelta::hours(1);
        store.save(&alice).await.unwrap();

        let response = make_request(
            Some(&token(&state, "alice", Role::User)),
            app(state.clone()),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let profile: Profile = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(profile.username, "alice");
        assert!(profile.non_locked);
        assert!(store.find_by_username("alice").await.unwrap().unwrap().non_locked);
    }

    #[tokio::test]
    async fn test_get_guards() {
        let (state, store, _dir) = state().await;
        seed(&store, "alice", Role::User, true).await;

        let response = make_request(
            None,
            app(state.clone()),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = make_request(
            Some("garbage"),
            app(state.clone()),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            Some(&token(&state, "bob", Role::User)),
            app(state.clone()),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = make_request(
            Some(&token(&state, "root", Role::Admin)),
            app(state.clone()),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(
            Some(&token(&state, "root", Role::Admin)),
            app(state),
            Method::GET,
            "/users/nobody",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_token() {
        let (state, store, _dir) = state().await;
        seed(&store, "alice", Role::User, true).await;

        let issued_at = Utc::now() - TimeDelta::days(1);
        let expired = state
            .token
            .create_at("alice", Role::User, issued_at)
            .unwrap();

        let response = make_request(
            Some(&expired),
            app(state),
            Method::GET,
            "/users/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
