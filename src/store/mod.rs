//! Storage layer: one trait of named operations over the three
//! collections, with a MongoDB implementation and an in-memory
//! implementation for tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::error::ApiError;
use crate::models::{LotteryTicket, PasswordResetToken, User};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Named operations the rest of the crate is allowed to run against
/// persistent state. No ad-hoc queries or implicit joins elsewhere.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user, failing with `Conflict` when the username or
    /// email is already taken.
    async fn create_user(&self, user: User) -> Result<User, ApiError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError>;
    async fn update_password(&self, id: ObjectId, new_hash: &str) -> Result<(), ApiError>;

    async fn insert_tickets(&self, tickets: &[LotteryTicket]) -> Result<(), ApiError>;
    async fn find_ticket_by_wallet(&self, wallet: &str) -> Result<Option<LotteryTicket>, ApiError>;
    /// Highest lottery number issued so far, across the whole ledger.
    /// Zero when no numbers have been issued.
    async fn max_ticket_number(&self) -> Result<u32, ApiError>;
    async fn all_tickets(&self) -> Result<Vec<LotteryTicket>, ApiError>;
    async fn tickets_by_owner(&self, owner: ObjectId) -> Result<Vec<LotteryTicket>, ApiError>;
    async fn tickets_with_numbers(&self, numbers: &[u32]) -> Result<Vec<LotteryTicket>, ApiError>;
    async fn tickets_since(&self, since: DateTime) -> Result<Vec<LotteryTicket>, ApiError>;
    async fn mark_ticket_checked(&self, id: ObjectId) -> Result<(), ApiError>;
    /// Most recently opened batch marker, closed or not.
    async fn latest_batch_marker(&self) -> Result<Option<LotteryTicket>, ApiError>;
    async fn close_batch(&self, id: ObjectId, end_time: DateTime) -> Result<(), ApiError>;

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ApiError>;
    async fn find_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>, ApiError>;
    async fn delete_reset_token(&self, token: &str) -> Result<(), ApiError>;
}
