//! Failed login attempts tracking and account locking.
//!
//! Every decision is computed from the stored counters of an [`Account`]
//! and the current time, so the policy never keeps state between requests.
//! Locked accounts are reopened lazily by [`LockoutPolicy::reconcile_lock`]
//! when they are read, listed or used to log in.

use chrono::{DateTime, TimeDelta, Utc};

use crate::config;
use crate::user::Account;

/// Reasons a login attempt is turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password on an unlocked account.
    #[error("user credentials are wrong (username or password)")]
    BadCredentials,
    #[error("account has been locked due to many failed login attempts")]
    AccountLocked,
    #[error("account is pending activation by admins")]
    AccountNotEnabled,
}

/// Login state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    PendingActivation,
    Locked,
}

/// Result of [`LockoutPolicy::attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Password accepted, counters reset. Account must be saved.
    Granted,
    /// Wrong password, counters moved. Account must be saved.
    Failed(AuthError),
    /// Right password but login is not possible. Account is untouched.
    Refused(AuthError),
}

/// Thresholds driving the lockout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    failed_attempts_allowed: i32,
    failed_attempts_period: TimeDelta,
    account_unlock_time: TimeDelta,
}

impl LockoutPolicy {
    /// Create a new [`LockoutPolicy`].
    pub fn new(
        failed_attempts_allowed: u32,
        failed_attempts_period: TimeDelta,
        account_unlock_time: TimeDelta,
    ) -> Self {
        Self {
            failed_attempts_allowed: i32::try_from(failed_attempts_allowed)
                .unwrap_or(i32::MAX),
            failed_attempts_period,
            account_unlock_time,
        }
    }

    pub fn failed_attempts_allowed(&self) -> i32 {
        self.failed_attempts_allowed
    }

    /// Current state of `account`, without lazy unlocking.
    pub fn state(&self, account: &Account) -> AccountState {
        if !account.non_locked {
            AccountState::Locked
        } else if !account.enabled {
            AccountState::PendingActivation
        } else {
            AccountState::Active
        }
    }

    /// Reopen a locked account once the unlock time has passed since its
    /// last login attempt. Returns `true` when `account` changed.
    pub fn reconcile_lock(&self, account: &mut Account, now: DateTime<Utc>) -> bool {
        let elapsed = now - account.last_login_attempt_date;

        if !account.non_locked && elapsed > self.account_unlock_time {
            account.non_locked = true;
            true
        } else {
            false
        }
    }

    /// Apply one login attempt on an existing account.
    pub fn attempt(
        &self,
        account: &mut Account,
        password_matches: bool,
        now: DateTime<Utc>,
    ) -> Attempt {
        let elapsed = now - account.last_login_attempt_date;

        if !password_matches {
            account.last_login_attempt_date = now;

            if elapsed < self.failed_attempts_period {
                account.failed_login_attempts =
                    account.failed_login_attempts.saturating_add(1);
                if account.failed_login_attempts >= self.failed_attempts_allowed {
                    account.non_locked = false;
                }
            } else {
                // A new window starts with this failure.
                account.non_locked = true;
                account.failed_login_attempts = 1;
            }

            return if account.non_locked {
                Attempt::Failed(AuthError::BadCredentials)
            } else {
                Attempt::Failed(AuthError::AccountLocked)
            };
        }

        if !account.enabled {
            Attempt::Refused(AuthError::AccountNotEnabled)
        } else if !account.non_locked && elapsed < self.account_unlock_time {
            Attempt::Refused(AuthError::AccountLocked)
        } else {
            account.failed_login_attempts = 0;
            account.non_locked = true;
            account.last_login_date = Some(now);
            Attempt::Granted
        }
    }
}

impl From<&config::Lockout> for LockoutPolicy {
    fn from(config: &config::Lockout) -> Self {
        Self::new(
            config.failed_attempts_allowed,
            config.failed_attempts_period(),
            config.account_unlock_time(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Role;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, TimeDelta::minutes(15), TimeDelta::minutes(15))
    }

    fn account(now: DateTime<Utc>) -> Account {
        Account {
            username: "alice".into(),
            enabled: true,
            non_locked: true,
            role: Role::User,
            last_login_attempt_date: now,
            ..Default::default()
        }
    }

    #[test]
    fn test_five_quick_failures_lock_account() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);

        for i in 1..=4 {
            let now = start + TimeDelta::seconds(i * 20);
            assert_eq!(
                policy.attempt(&mut account, false, now),
                Attempt::Failed(AuthError::BadCredentials)
            );
            assert_eq!(account.failed_login_attempts, i as i32);
        }

        let fifth = start + TimeDelta::minutes(2);
        assert_eq!(
            policy.attempt(&mut account, false, fifth),
            Attempt::Failed(AuthError::AccountLocked)
        );
        assert!(!account.non_locked);
        assert_eq!(policy.state(&account), AccountState::Locked);

        // Even the right password is refused inside the unlock window.
        let sixth = fifth + TimeDelta::minutes(1);
        let before = account.clone();
        assert_eq!(
            policy.attempt(&mut account, true, sixth),
            Attempt::Refused(AuthError::AccountLocked)
        );
        assert_eq!(account, before);
    }

    #[test]
    fn test_locked_account_opens_after_unlock_time() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);
        account.non_locked = false;
        account.failed_login_attempts = 5;

        let later = start + TimeDelta::minutes(16);
        assert_eq!(policy.attempt(&mut account, true, later), Attempt::Granted);
        assert!(account.non_locked);
        assert_eq!(account.failed_login_attempts, 0);
        assert_eq!(account.last_login_date, Some(later));
    }

    #[test]
    fn test_gap_resets_counter_to_one() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);

        for i in 1..=3 {
            policy.attempt(&mut account, false, start + TimeDelta::seconds(i));
        }
        assert_eq!(account.failed_login_attempts, 3);

        let later = start + TimeDelta::minutes(30);
        assert_eq!(
            policy.attempt(&mut account, false, later),
            Attempt::Failed(AuthError::BadCredentials)
        );
        assert_eq!(account.failed_login_attempts, 1);
        assert!(account.non_locked);
        assert_eq!(account.last_login_attempt_date, later);
    }

    #[test]
    fn test_failure_after_window_unlocks_account() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);
        account.non_locked = false;
        account.failed_login_attempts = 5;

        let later = start + TimeDelta::hours(1);
        assert_eq!(
            policy.attempt(&mut account, false, later),
            Attempt::Failed(AuthError::BadCredentials)
        );
        assert!(account.non_locked);
        assert_eq!(account.failed_login_attempts, 1);
    }

    #[test]
    fn test_disabled_account_is_not_mutated() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);
        account.enabled = false;
        account.failed_login_attempts = 2;
        let before = account.clone();

        assert_eq!(policy.state(&account), AccountState::PendingActivation);
        assert_eq!(
            policy.attempt(&mut account, true, start + TimeDelta::seconds(5)),
            Attempt::Refused(AuthError::AccountNotEnabled)
        );
        assert_eq!(account, before);
    }

    #[test]
    fn test_success_resets_counters() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);
        account.failed_login_attempts = 4;

        let now = start + TimeDelta::seconds(10);
        assert_eq!(policy.attempt(&mut account, true, now), Attempt::Granted);
        assert_eq!(account.failed_login_attempts, 0);
        assert!(account.non_locked);
        assert_eq!(account.last_login_date, Some(now));
        // Only failures move the attempt date.
        assert_eq!(account.last_login_attempt_date, start);
    }

    #[test]
    fn test_reconcile_lock() {
        let policy = policy();
        let start = Utc::now();
        let mut account = account(start);
        account.non_locked = false;

        assert!(!policy.reconcile_lock(&mut account, start + TimeDelta::minutes(15)));
        assert!(!account.non_locked);

        assert!(policy.reconcile_lock(&mut account, start + TimeDelta::minutes(16)));
        assert!(account.non_locked);

        // Idempotent.
        let before = account.clone();
        assert!(!policy.reconcile_lock(&mut account, start + TimeDelta::minutes(17)));
        assert_eq!(account, before);
    }

    #[test]
    fn test_policy_from_config() {
        let config = config::Lockout {
            failed_attempts_allowed: 3,
            failed_attempts_period: 60,
            account_unlock_time: 120,
        };
        let policy = LockoutPolicy::from(&config);

        assert_eq!(policy.failed_attempts_allowed(), 3);
        assert_eq!(policy.failed_attempts_period, TimeDelta::minutes(1));
        assert_eq!(policy.account_unlock_time, TimeDelta::minutes(2));
    }
}
