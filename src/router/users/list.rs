//! Admin listing of accounts.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::guard::{Authenticated, require_admin};
use crate::user::{Brief, Listing, Page, PageQuery, SearchBody};

#[derive(Debug, Serialize, Deserialize)]
pub struct Rows {
    pub count: i64,
    pub rows: Vec<Brief>,
}

impl From<Page> for Rows {
    fn from(page: Page) -> Self {
        Self {
            count: page.count,
            rows: page.rows.into_iter().map(Brief::from).collect(),
        }
    }
}

/// Handler to list every account.
pub async fn handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Rows>> {
    require_admin(&claims)?;
    let Query(query) = query?;

    let listing = Listing::new(&query, None, &state.config.listing);
    Ok(Json(state.accounts.list(&listing).await?.into()))
}

/// Handler to list accounts matching a filter.
pub async fn search(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
    body: std::result::Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<Rows>> {
    require_admin(&claims)?;
    let Query(query) = query?;
    let Json(body) = body?;

    let listing = Listing::new(&query, Some(&body), &state.config.listing);
    tracing::debug!(filter = ?listing.filter, "searching accounts");

    Ok(Json(state.accounts.list(&listing).await?.into()))
}
