//! Typed builder for Account.

use chrono::{DateTime, Utc};

use crate::user::{Account, Role};

/// [`Account`] builder.
///
/// `username` and `email` are required before [`AccountBuilder::build`]
/// becomes available.
#[derive(Debug, Clone)]
pub struct AccountBuilder<Username, Email> {
    username: Username,
    email: Email,
    password: String,
    role: Role,
    enabled: bool,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    country: Option<String>,
    city: Option<String>,
    address: Option<String>,
}

/// Value is missing on [`AccountBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`AccountBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl Default for AccountBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountBuilder<Missing, Missing> {
    /// Create a new [`AccountBuilder`].
    pub fn new() -> Self {
        Self {
            username: Missing,
            email: Missing,
            password: String::default(),
            role: Role::User,
            enabled: false,
            first_name: String::default(),
            last_name: String::default(),
            phone: None,
            country: None,
            city: None,
            address: None,
        }
    }
}

impl<Email> AccountBuilder<Missing, Email> {
    /// Update `username` field on [`AccountBuilder`].
    pub fn username(
        self,
        username: impl AsRef<str>,
    ) -> AccountBuilder<Present<String>, Email> {
        AccountBuilder {
            username: Present(username.as_ref().trim().to_owned()),
            email: self.email,
            password: self.password,
            role: self.role,
            enabled: self.enabled,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            country: self.country,
            city: self.city,
            address: self.address,
        }
    }
}

impl<Username> AccountBuilder<Username, Missing> {
    /// Update `email` field on [`AccountBuilder`].
    ///
    /// Emails are stored trimmed and lower-cased.
    pub fn email(
        self,
        email: impl AsRef<str>,
    ) -> AccountBuilder<Username, Present<String>> {
        AccountBuilder {
            username: self.username,
            email: Present(email.as_ref().trim().to_lowercase()),
            password: self.password,
            role: self.role,
            enabled: self.enabled,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            country: self.country,
            city: self.city,
            address: self.address,
        }
    }
}

impl<Username, Email> AccountBuilder<Username, Email> {
    /// Update `password` field with an already hashed password.
    pub fn password_hash(mut self, hash: impl ToString) -> Self {
        self.password = hash.to_string();
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn name(mut self, first_name: impl AsRef<str>, last_name: impl AsRef<str>) -> Self {
        self.first_name = first_name.as_ref().trim().to_owned();
        self.last_name = last_name.as_ref().trim().to_owned();
        self
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    /// Update `country`, `city` and `address` fields.
    pub fn location(
        mut self,
        country: Option<String>,
        city: Option<String>,
        address: Option<String>,
    ) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_owned());
        self.country = trim(country);
        self.city = trim(city);
        self.address = trim(address);
        self
    }
}

impl AccountBuilder<Present<String>, Present<String>> {
    /// Build a freshly registered [`Account`].
    pub fn build(self, now: DateTime<Utc>) -> Account {
        Account {
            id: 0,
            username: self.username.0,
            password: self.password,
            enabled: self.enabled,
            non_locked: true,
            role: self.role,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email.0,
            phone: self.phone,
            country: self.country,
            city: self.city,
            address: self.address,
            join_date: now,
            last_login_date: None,
            last_login_attempt_date: now,
            failed_login_attempts: 0,
        }
    }
}
