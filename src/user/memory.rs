//! In-memory [`CredentialStore`], used by the test-suite.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::user::{Account, CredentialStore, Listing, Page, SortField, SortOrder, StoreError};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, Vec<Account>> {
        self.accounts.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn collision(accounts: &[Account], account: &Account) -> Option<StoreError> {
    let others = accounts.iter().filter(|other| other.id != account.id);

    for other in others {
        if other.username == account.username {
            return Some(StoreError::UsernameTaken(account.username.clone()));
        }
        if other.email == account.email {
            return Some(StoreError::EmailTaken(account.email.clone()));
        }
    }

    None
}

fn compare(a: &Account, b: &Account, sort: SortField) -> Ordering {
    match sort {
        SortField::Username => a.username.cmp(&b.username),
        SortField::Enabled => a.enabled.cmp(&b.enabled),
        SortField::NonLocked => a.non_locked.cmp(&b.non_locked),
        SortField::Role => a.role.as_str().cmp(b.role.as_str()),
        SortField::JoinDate => a.join_date.cmp(&b.join_date),
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts()
            .iter()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts()
            .iter()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn create(&self, account: &Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts();
        let mut created = account.clone();
        created.id = accounts.iter().map(|a| a.id).max().unwrap_or(0) + 1;

        if let Some(err) = collision(&accounts, &created) {
            return Err(err);
        }

        accounts.push(created.clone());
        Ok(created)
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts();

        if let Some(err) = collision(&accounts, account) {
            return Err(err);
        }

        if let Some(stored) = accounts.iter_mut().find(|stored| stored.id == account.id) {
            // Usernames and join dates never change.
            let username = std::mem::take(&mut stored.username);
            let join_date = stored.join_date;
            *stored = Account {
                username,
                join_date,
                ..account.clone()
            };
        }

        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        let mut accounts = self.accounts();
        let before = accounts.len();
        accounts.retain(|account| account.username != username);

        Ok(accounts.len() < before)
    }

    async fn list(&self, listing: &Listing) -> Result<Page, StoreError> {
        let mut rows: Vec<Account> = self
            .accounts()
            .iter()
            .filter(|account| listing.filter.matches(account))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = compare(a, b, listing.sort);
            let ordering = match listing.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.username.cmp(&b.username))
        });

        let count = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(usize::try_from(listing.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(listing.limit()).unwrap_or(usize::MAX))
            .collect();

        Ok(Page { count, rows })
    }

    async fn unlock(&self, usernames: &[String]) -> Result<(), StoreError> {
        self.accounts()
            .iter_mut()
            .filter(|account| usernames.contains(&account.username))
            .for_each(|account| account.non_locked = true);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::user::{AccountBuilder, PageQuery, SearchBody};
    use chrono::{TimeDelta, Utc};

    fn account(username: &str) -> Account {
        AccountBuilder::new()
            .username(username)
            .email(format!("{username}@example.com"))
            .build(Utc::now())
    }

    #[tokio::test]
    async fn test_unique_usernames_and_emails() {
        let store = MemoryCredentialStore::new();
        let alice = store.create(&account("alice")).await.unwrap();
        assert_eq!(alice.id, 1);

        assert!(matches!(
            store.create(&account("alice")).await,
            Err(StoreError::UsernameTaken(_))
        ));

        let mut bob = store.create(&account("bob")).await.unwrap();
        bob.email = "alice@example.com".into();
        assert!(matches!(store.save(&bob).await, Err(StoreError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_list_sorts_and_pages() {
        let store = MemoryCredentialStore::new();
        let start = Utc::now();
        for (i, name) in ["dave", "carol", "bob", "alice"].into_iter().enumerate() {
            let mut account = account(name);
            account.join_date = start + TimeDelta::days(i as i64);
            store.create(&account).await.unwrap();
        }

        let query = PageQuery {
            page: Some("1".into()),
            pagesize: Some("3".into()),
            sort: Some("joinDate".into()),
            order: Some("desc".into()),
        };
        let page = store
            .list(&Listing::new(&query, None, &config::Listing::default()))
            .await
            .unwrap();

        assert_eq!(page.count, 4);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].username, "dave");

        let search = SearchBody {
            username: Some("o".into()),
            ..Default::default()
        };
        let page = store
            .list(&Listing::new(&PageQuery::default(), Some(&search), &config::Listing::default()))
            .await
            .unwrap();
        let names: Vec<_> = page.rows.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, ["bob", "carol"]);
    }
}
