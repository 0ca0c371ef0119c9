//! In-memory store used by the test suite.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::error::ApiError;
use crate::models::{LotteryTicket, PasswordResetToken, User};

use super::Store;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tickets: Vec<LotteryTicket>,
    reset_tokens: Vec<PasswordResetToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock")
    }

    /// Snapshot of the outstanding reset tokens, for assertions.
    pub fn reset_tokens(&self) -> Vec<PasswordResetToken> {
        self.lock().reset_tokens.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(ApiError::Conflict("email"));
        }
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::Conflict("username"));
        }
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_password(&self, id: ObjectId, new_hash: &str) -> Result<(), ApiError> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.password_hash = new_hash.to_string();
        }
        Ok(())
    }

    async fn insert_tickets(&self, tickets: &[LotteryTicket]) -> Result<(), ApiError> {
        self.lock().tickets.extend_from_slice(tickets);
        Ok(())
    }

    async fn find_ticket_by_wallet(&self, wallet: &str) -> Result<Option<LotteryTicket>, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .find(|t| t.wallet_address == wallet)
            .cloned())
    }

    async fn max_ticket_number(&self) -> Result<u32, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .flat_map(|t| t.numbers.iter().copied())
            .max()
            .unwrap_or(0))
    }

    async fn all_tickets(&self) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self.lock().tickets.clone())
    }

    async fn tickets_by_owner(&self, owner: ObjectId) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .filter(|t| t.user_id == owner && !t.is_batch_marker())
            .cloned()
            .collect())
    }

    async fn tickets_with_numbers(&self, numbers: &[u32]) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .filter(|t| t.numbers.iter().any(|n| numbers.contains(n)))
            .cloned()
            .collect())
    }

    async fn tickets_since(&self, since: DateTime) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .filter(|t| t.purchase_date >= since)
            .cloned()
            .collect())
    }

    async fn mark_ticket_checked(&self, id: ObjectId) -> Result<(), ApiError> {
        if let Some(ticket) = self.lock().tickets.iter_mut().find(|t| t.id == id) {
            ticket.checked_status = true;
        }
        Ok(())
    }

    async fn latest_batch_marker(&self) -> Result<Option<LotteryTicket>, ApiError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .filter(|t| t.is_batch_marker())
            .max_by_key(|t| t.purchase_date)
            .cloned())
    }

    async fn close_batch(&self, id: ObjectId, end_time: DateTime) -> Result<(), ApiError> {
        if let Some(marker) = self.lock().tickets.iter_mut().find(|t| t.id == id) {
            marker.end_time = Some(end_time);
        }
        Ok(())
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ApiError> {
        self.lock().reset_tokens.push(token.clone());
        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>, ApiError> {
        Ok(self
            .lock()
            .reset_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_reset_token(&self, token: &str) -> Result<(), ApiError> {
        self.lock().reset_tokens.retain(|t| t.token != token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(name: &str) -> User {
        User::new(
            name.to_string(),
            format!("{name}@example.com"),
            "hash".to_string(),
            Role::User,
        )
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user(user("alice")).await.unwrap();

        let mut dup = user("alice2");
        dup.email = "alice@example.com".to_string();
        let err = store.create_user(dup).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict("email")));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(user("alice")).await.unwrap();

        let mut dup = user("alice");
        dup.email = "other@example.com".to_string();
        let err = store.create_user(dup).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict("username")));
    }

    #[tokio::test]
    async fn update_password_persists() {
        let store = MemoryStore::new();
        let alice = store.create_user(user("alice")).await.unwrap();

        store.update_password(alice.id, "new-hash").await.unwrap();
        let reloaded = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn max_number_is_zero_on_empty_ledger() {
        let store = MemoryStore::new();
        assert_eq!(store.max_ticket_number().await.unwrap(), 0);
    }
}
