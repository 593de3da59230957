//! Paging, sorting and filtering of user listings.
//!
//! Listing parameters are lenient: anything unparsable falls back to the
//! configured default instead of rejecting the request.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::user::{Account, Role};

/// Column a listing is sorted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Username,
    Enabled,
    NonLocked,
    Role,
    JoinDate,
}

impl SortField {
    /// Column name on `users` table.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Username => "username",
            SortField::Enabled => "enabled",
            SortField::NonLocked => "non_locked",
            SortField::Role => "role",
            SortField::JoinDate => "join_date",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "username" => Some(SortField::Username),
            "enabled" | "isEnabled" => Some(SortField::Enabled),
            "nonLocked" | "isNonLocked" => Some(SortField::NonLocked),
            "role" => Some(SortField::Role),
            "joinDate" => Some(SortField::JoinDate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Query string of listing routes.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub pagesize: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Boolean sent either as JSON boolean or as a `"true"`/`"false"` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn value(&self) -> Option<bool> {
        match self {
            Flag::Bool(value) => Some(*value),
            Flag::Text(text) => match text.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

/// Body of the search route.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub username: Option<String>,
    #[serde(alias = "isEnabled")]
    pub enabled: Option<Flag>,
    #[serde(alias = "isNonLocked")]
    pub non_locked: Option<Flag>,
    pub role: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Conditions an account must meet to be listed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Substring of the username, empty matches everyone.
    pub username: String,
    pub enabled: Option<bool>,
    pub non_locked: Option<bool>,
    pub role: Option<Role>,
    /// Join date range, start included and end excluded.
    pub joined: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Filter {
    pub fn matches(&self, account: &Account) -> bool {
        account.username.contains(&self.username)
            && self.enabled.is_none_or(|enabled| account.enabled == enabled)
            && self
                .non_locked
                .is_none_or(|non_locked| account.non_locked == non_locked)
            && self.role.is_none_or(|role| account.role == role)
            && self
                .joined
                .is_none_or(|(from, until)| account.join_date >= from && account.join_date < until)
    }
}

impl From<&SearchBody> for Filter {
    fn from(body: &SearchBody) -> Self {
        let joined = body.start_date.as_deref().and_then(parse_date).map(|start| {
            // Without a valid end date, only the start day is matched.
            let end = body
                .end_date
                .as_deref()
                .and_then(parse_date)
                .unwrap_or(start);
            (start_of_day(start), start_of_day(end) + TimeDelta::days(1))
        });

        Self {
            username: body.username.clone().unwrap_or_default(),
            enabled: body.enabled.as_ref().and_then(Flag::value),
            non_locked: body.non_locked.as_ref().and_then(Flag::value),
            role: body.role.as_deref().and_then(|role| role.parse().ok()),
            joined,
        }
    }
}

/// Normalized listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub page: u32,
    pub page_size: u32,
    pub sort: SortField,
    pub order: SortOrder,
    pub filter: Filter,
}

impl Listing {
    pub fn new(
        query: &PageQuery,
        search: Option<&SearchBody>,
        defaults: &config::Listing,
    ) -> Self {
        Self {
            page: query
                .page
                .as_deref()
                .and_then(|page| page.parse().ok())
                .unwrap_or(0),
            page_size: query
                .pagesize
                .as_deref()
                .and_then(|size| size.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            sort: query
                .sort
                .as_deref()
                .and_then(SortField::parse)
                .unwrap_or(defaults.sort),
            order: query
                .order
                .as_deref()
                .and_then(SortOrder::parse)
                .unwrap_or(defaults.order),
            filter: search.map(Filter::from).unwrap_or_default(),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Rows to skip. Saturates so huge pages come back empty.
    pub fn offset(&self) -> i64 {
        i64::from(self.page).saturating_mul(i64::from(self.page_size))
    }
}

/// One page of accounts and the number of accounts matching the filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Page {
    pub count: i64,
    pub rows: Vec<Account>,
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|date| date.with_timezone(&Utc).date_naive())
        })
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
