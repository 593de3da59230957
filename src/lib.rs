//! Accounts is a user account manager with login lockout and bearer tokens.

#![forbid(unsafe_code)]
pub mod config;
mod crypto;
mod database;
pub mod error;
mod guard;
mod image;
mod lockout;
mod router;
pub mod telemetry;
mod token;
mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// Environment variable holding the token signing secret.
const TOKEN_SECRET_KEY: &str = "TOKEN_SECRET_KEY";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub accounts: user::AccountService,
    pub token: token::TokenManager,
    pub bearer: guard::BearerScheme,
    pub images: Arc<image::ImageStore>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let token_header = state.bearer.header.clone();
    // Empty list or `*` allows any origin.
    let any_origin = state.config.origins.is_empty()
        || state.config.origins.iter().any(|origin| origin == "*");
    let origins = if any_origin {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            state
                .config
                .origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, token_header.clone()]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .expose_headers([token_header.clone()])
                .vary([token_header]),
        );

    Router::new()
        .nest("/users", router::users::router(&state))
        .fallback(router::not_found)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, BoxError> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let Some(postgres) = &config.postgres else {
        tracing::error!("missing `postgres` entry on `config.yaml` file");
        return Err("a PostgreSQL database is required".into());
    };
    // migrations run on connect.
    let pool = database::connect(postgres).await?;

    let secret = std::env::var(TOKEN_SECRET_KEY)
        .ok()
        .filter(|secret| !secret.is_empty())
        .ok_or("missing `TOKEN_SECRET_KEY` environment variable")?;
    let token = token::TokenManager::new(&config.token, secret);
    let bearer = guard::BearerScheme::new(&config.token)?;

    let passwords = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);
    let accounts = user::AccountService::new(
        Arc::new(user::PgCredentialStore::new(pool)),
        passwords,
        lockout::LockoutPolicy::from(&config.lockout),
    );

    let images = Arc::new(image::ImageStore::new(&config.images).await?);

    Ok(AppState {
        config,
        accounts,
        token,
        bearer,
        images,
    })
}
