use std::sync::Arc;

use chrono::Utc;
use metrics::counter;

use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError};
use crate::lockout::{Attempt, AuthError, LockoutPolicy};
use crate::user::{Account, AccountBuilder, CredentialStore, Listing, Page, Present, StoreError};

/// Profile changes sent by the account owner.
///
/// `None` keeps the stored value for password, names and email, but clears
/// the optional contact fields.
#[derive(Debug, Default, Clone)]
pub struct AccountUpdate {
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

/// Account manager.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<PasswordManager>,
    policy: LockoutPolicy,
}

impl AccountService {
    /// Create a new [`AccountService`].
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: Arc<PasswordManager>,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            store,
            passwords,
            policy,
        }
    }

    /// Register a builded account, hashing its clear `password`.
    pub async fn register(
        &self,
        builder: AccountBuilder<Present<String>, Present<String>>,
        password: String,
    ) -> Result<Account> {
        let hash = self.passwords.hash(password).await?;
        let account = builder.password_hash(hash).build(Utc::now());

        let account = self.store.create(&account).await?;
        tracing::info!(username = %account.username, "account registered");

        Ok(account)
    }

    /// Run one login attempt through the lockout policy.
    pub async fn login(&self, username: &str, password: String) -> Result<Account> {
        let now = Utc::now();

        let Some(mut account) = self.store.find_by_username(username).await? else {
            self.passwords.verify_dummy(password).await;
            counter!("login_attempts_total", "outcome" => "unknown_user").increment(1);
            return Err(AuthError::BadCredentials.into());
        };

        let unlocked = self.policy.reconcile_lock(&mut account, now);
        let matches = self
            .passwords
            .verify(password, account.password.clone())
            .await?;

        match self.policy.attempt(&mut account, matches, now) {
            Attempt::Granted => {
                self.store.save(&account).await?;
                counter!("login_attempts_total", "outcome" => "granted").increment(1);
                tracing::info!(username, "login granted");
                Ok(account)
            },
            Attempt::Failed(err) => {
                self.store.save(&account).await?;
                counter!("login_attempts_total", "outcome" => outcome(err)).increment(1);
                tracing::info!(
                    username,
                    failed_attempts = account.failed_login_attempts,
                    allowed = self.policy.failed_attempts_allowed(),
                    "login failed"
                );
                Err(err.into())
            },
            Attempt::Refused(err) => {
                if unlocked {
                    self.store.save(&account).await?;
                }
                counter!("login_attempts_total", "outcome" => outcome(err)).increment(1);
                tracing::info!(
                    username,
                    state = ?self.policy.state(&account),
                    "login refused"
                );
                Err(err.into())
            },
        }
    }

    /// Find an account, reopening it when its lock has expired.
    pub async fn profile(&self, username: &str) -> Result<Account> {
        let mut account = self.find(username).await?;

        if self.policy.reconcile_lock(&mut account, Utc::now()) {
            self.store.save(&account).await?;
        }

        Ok(account)
    }

    /// Apply owner changes on an account.
    pub async fn update(&self, username: &str, update: AccountUpdate) -> Result<Account> {
        let mut account = self.find(username).await?;

        if let Some(email) = update.email {
            let email = email.trim().to_lowercase();
            if let Some(other) = self.store.find_by_email(&email).await? {
                if other.id != account.id {
                    return Err(StoreError::EmailTaken(email).into());
                }
            }
            account.email = email;
        }
        if let Some(password) = update.password {
            account.password = self.passwords.hash(password).await?;
        }
        if let Some(first_name) = update.first_name {
            account.first_name = first_name.trim().to_owned();
        }
        if let Some(last_name) = update.last_name {
            account.last_name = last_name.trim().to_owned();
        }

        let trim = |value: Option<String>| value.map(|v| v.trim().to_owned());
        account.phone = update.phone;
        account.country = trim(update.country);
        account.city = trim(update.city);
        account.address = trim(update.address);

        self.store.save(&account).await?;
        Ok(account)
    }

    pub async fn delete(&self, username: &str) -> Result<()> {
        if self.store.delete(username).await? {
            tracing::info!(username, "account deleted");
            Ok(())
        } else {
            Err(ServerError::UserNotFound(username.to_owned()))
        }
    }

    /// Enable an account pending activation.
    pub async fn activate(&self, username: &str) -> Result<()> {
        let mut account = self.find(username).await?;

        if !account.enabled {
            account.enabled = true;
            self.store.save(&account).await?;
            tracing::info!(username, "account activated");
        }

        Ok(())
    }

    /// List one page of accounts, reopening expired locks on the way.
    pub async fn list(&self, listing: &Listing) -> Result<Page> {
        let mut page = self.store.list(listing).await?;
        let now = Utc::now();

        let unlocked: Vec<String> = page
            .rows
            .iter_mut()
            .filter_map(|account| {
                self.policy
                    .reconcile_lock(account, now)
                    .then(|| account.username.clone())
            })
            .collect();

        if !unlocked.is_empty() {
            self.store.unlock(&unlocked).await?;
        }

        Ok(page)
    }

    async fn find(&self, username: &str) -> Result<Account> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServerError::UserNotFound(username.to_owned()))
    }
}

fn outcome(err: AuthError) -> &'static str {
    match err {
        AuthError::BadCredentials => "bad_credentials",
        AuthError::AccountLocked => "locked",
        AuthError::AccountNotEnabled => "not_enabled",
    }
}
