//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::user::{Account, Filter, Listing, Page};

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Errors raised by a [`CredentialStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username `{0}` is already used by another user")]
    UsernameTaken(String),
    #[error("email `{0}` is already used by another user")]
    EmailTaken(String),
    #[error("SQL request failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence of accounts.
///
/// Usernames and emails are unique; implementations report collisions with
/// [`StoreError::UsernameTaken`] and [`StoreError::EmailTaken`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account and return it with its generated `id`.
    async fn create(&self, account: &Account) -> Result<Account, StoreError>;

    /// Overwrite every mutable column of the account with the same `id`.
    async fn save(&self, account: &Account) -> Result<(), StoreError>;

    /// Returns `false` when no account has this username.
    async fn delete(&self, username: &str) -> Result<bool, StoreError>;

    async fn list(&self, listing: &Listing) -> Result<Page, StoreError>;

    /// Set `non_locked` on every listed username.
    async fn unlock(&self, usernames: &[String]) -> Result<(), StoreError>;
}

/// [`CredentialStore`] backed by the PostgreSQL `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: Pool<Postgres>,
}

impl PgCredentialStore {
    /// Create a new [`PgCredentialStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(r#"SELECT * FROM users WHERE username = $1"#)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn create(&self, account: &Account) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"INSERT INTO users (username, password, enabled, non_locked, role,
                    first_name, last_name, email, phone, country, city, address,
                    join_date, last_login_date, last_login_attempt_date, failed_login_attempts)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                RETURNING *"#,
        )
        .bind(&account.username)
        .bind(&account.password)
        .bind(account.enabled)
        .bind(account.non_locked)
        .bind(account.role.as_str())
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.country)
        .bind(&account.city)
        .bind(&account.address)
        .bind(account.join_date)
        .bind(account.last_login_date)
        .bind(account.last_login_attempt_date)
        .bind(account.failed_login_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_violation(err, account))
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE users
                SET password = $1, enabled = $2, non_locked = $3, role = $4,
                    first_name = $5, last_name = $6, email = $7, phone = $8,
                    country = $9, city = $10, address = $11, last_login_date = $12,
                    last_login_attempt_date = $13, failed_login_attempts = $14
                WHERE id = $15"#,
        )
        .bind(&account.password)
        .bind(account.enabled)
        .bind(account.non_locked)
        .bind(account.role.as_str())
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.country)
        .bind(&account.city)
        .bind(&account.address)
        .bind(account.last_login_date)
        .bind(account.last_login_attempt_date)
        .bind(account.failed_login_attempts)
        .bind(account.id)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, account))?;

        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE username = $1"#)
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, listing: &Listing) -> Result<Page, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut count, &listing.filter);
        let count = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut rows = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        push_filter(&mut rows, &listing.filter);
        rows.push(format!(
            " ORDER BY {} {}, username ASC",
            listing.sort.column(),
            listing.order.keyword()
        ));
        rows.push(" LIMIT ")
            .push_bind(listing.limit())
            .push(" OFFSET ")
            .push_bind(listing.offset());
        let rows = rows
            .build_query_as::<Account>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { count, rows })
    }

    async fn unlock(&self, usernames: &[String]) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE users SET non_locked = TRUE WHERE username = ANY($1)"#)
            .bind(usernames)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    builder
        .push(" WHERE strpos(username, ")
        .push_bind(filter.username.clone())
        .push(") > 0");

    if let Some(enabled) = filter.enabled {
        builder.push(" AND enabled = ").push_bind(enabled);
    }
    if let Some(non_locked) = filter.non_locked {
        builder.push(" AND non_locked = ").push_bind(non_locked);
    }
    if let Some(role) = filter.role {
        builder.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some((from, until)) = filter.joined {
        builder
            .push(" AND join_date >= ")
            .push_bind(from)
            .push(" AND join_date < ")
            .push_bind(until);
    }
}

/// Turn unique constraint violations into their domain error.
fn unique_violation(err: sqlx::Error, account: &Account) -> StoreError {
    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint())
        .map(str::to_owned);

    match constraint.as_deref() {
        Some(USERNAME_CONSTRAINT) => StoreError::UsernameTaken(account.username.clone()),
        Some(EMAIL_CONSTRAINT) => StoreError::EmailTaken(account.email.clone()),
        _ => StoreError::Database(err),
    }
}
