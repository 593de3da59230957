mod builder;
#[cfg(test)]
pub(crate) mod memory;
mod query;
mod repository;
mod service;

pub use builder::*;
pub use query::*;
pub use repository::*;
pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account as saved on database.
#[derive(Clone, Debug, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string.
    pub password: String,
    pub enabled: bool,
    pub non_locked: bool,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub join_date: DateTime<Utc>,
    pub last_login_date: Option<DateTime<Utc>>,
    pub last_login_attempt_date: DateTime<Utc>,
    pub failed_login_attempts: i32,
}

/// Role of an [`Account`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Role stored on database is neither `ADMIN` nor `USER`.
#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Detailed public view of an [`Account`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub enabled: bool,
    pub non_locked: bool,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub join_date: DateTime<Utc>,
    pub last_login_date: Option<DateTime<Utc>>,
}

impl From<Account> for Profile {
    fn from(account: Account) -> Self {
        Self {
            username: account.username,
            enabled: account.enabled,
            non_locked: account.non_locked,
            role: account.role,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            phone: account.phone,
            country: account.country,
            city: account.city,
            address: account.address,
            join_date: account.join_date,
            last_login_date: account.last_login_date,
        }
    }
}

/// Short view of an [`Account`], used on listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub username: String,
    pub enabled: bool,
    pub non_locked: bool,
    pub role: Role,
    pub join_date: DateTime<Utc>,
}

impl From<Account> for Brief {
    fn from(account: Account) -> Self {
        Self {
            username: account.username,
            enabled: account.enabled,
            non_locked: account.non_locked,
            role: account.role,
            join_date: account.join_date,
        }
    }
}
