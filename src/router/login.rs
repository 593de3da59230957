//! Log in with username and password.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::user::Profile;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Missing username."))]
    pub username: String,
    #[validate(length(min = 1, message = "Missing password."))]
    pub password: String,
}

/// Handler to log in.
///
/// The signed token travels back in the configured token header, the body
/// holds the profile.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(HeaderMap, Json<Profile>)> {
    let account = state.accounts.login(&body.username, body.password).await?;
    let token = state.token.create(&account.username, account.role)?;

    let value = HeaderValue::try_from(state.bearer.format(&token)).map_err(|err| {
        ServerError::Internal {
            details: "token cannot be written in a header".into(),
            source: Some(Box::new(err)),
        }
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(state.bearer.header.clone(), value);

    Ok((headers, Json(Profile::from(account))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::tests::{PASSWORD, seed, state};
    use crate::user::{CredentialStore, Role};
    use crate::*;
    use axum::http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;

    fn body(username: &str, password: &str) -> String {
        json!({ "username": username, "password": password }).to_string()
    }

    async fn code(response: axum::http::Response<axum::body::Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["code"].as_str().unwrap_or_default().to_owned()
    }

    #[tokio::test]
    async fn test_login_handler() {
        let (state, store, _dir) = state().await;
        seed(&store, "alice", Role::Admin, true).await;

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/users/login",
            body("alice", PASSWORD),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response
            .headers()
            .get(header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let claims = state.token.decode(state.bearer.token(&value)).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Admin);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let profile: Profile = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(profile.username, "alice");
        assert!(profile.last_login_date.is_some());
        assert!(!String::from_utf8_lossy(&bytes).contains("password"));
    }

    #[tokio::test]
    async fn test_login_lockout() {
        let (state, store, _dir) = state().await;
        seed(&store, "alice", Role::User, true).await;
        let allowed = state.config.lockout.failed_attempts_allowed;

        for _ in 1..allowed {
            let response = make_request(
                None,
                app(state.clone()),
                Method::POST,
                "/users/login",
                body("alice", "wrong"),
            )
            .await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_eq!(code(response).await, "BAD_CREDENTIALS");
        }

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/users/login",
            body("alice", "wrong"),
        )
        .await;
        assert_eq!(code(response).await, "ACCOUNT_LOCKED");

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/users/login",
            body("alice", PASSWORD),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::AUTHORIZATION).is_none());
        assert_eq!(code(response).await, "ACCOUNT_LOCKED");

        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(!alice.non_locked);
        assert_eq!(alice.failed_login_attempts as u32, allowed);
    }

    #[tokio::test]
    async fn test_login_refusals() {
        let (state, store, _dir) = state().await;
        seed(&store, "bob", Role::User, false).await;

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/users/login",
            body("bob", PASSWORD),
        )
        .await;
        assert_eq!(code(response).await, "ACCOUNT_NOT_ENABLED");

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/users/login",
            body("nobody", PASSWORD),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(code(response).await, "BAD_CREDENTIALS");

        let response = make_request(
            None,
            app(state),
            Method::POST,
            "/users/login",
            body("", ""),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
