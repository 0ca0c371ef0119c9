//! Persistent document types for the users, lottery, and reset-token
//! collections.

use chrono::Duration;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Highest lottery number that will ever be issued.
pub const MAX_LOTTERY_NUMBER: u32 = 500;

/// How long a purchased ticket stays live.
pub const TICKET_LIFETIME_HOURS: i64 = 24;

/// How long a password-reset token stays valid.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// User role, carried on the user document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: ObjectId::new(),
            username,
            email,
            password_hash,
            role,
        }
    }
}

/// One document in the lottery collection.
///
/// Two shapes share the collection: purchased tickets carry exactly one
/// number, and batch markers (written by `start_lottery`) carry none. A
/// marker's `end_time` stays empty until the batch is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryTicket {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub numbers: Vec<u32>,
    pub purchase_date: DateTime,
    pub end_time: Option<DateTime>,
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub checked_status: bool,
    pub user_id: ObjectId,
}

impl LotteryTicket {
    /// A ticket bought at `now`, live for the next 24 hours.
    pub fn purchased(number: u32, wallet: &str, owner: ObjectId, now: DateTime) -> Self {
        let end = now.to_chrono() + Duration::hours(TICKET_LIFETIME_HOURS);
        Self {
            id: ObjectId::new(),
            numbers: vec![number],
            purchase_date: now,
            end_time: Some(DateTime::from_chrono(end)),
            wallet_address: wallet.to_string(),
            checked_status: false,
            user_id: owner,
        }
    }

    /// A batch marker opening a lottery run at `now`.
    pub fn batch_marker(owner: ObjectId, now: DateTime) -> Self {
        Self {
            id: ObjectId::new(),
            numbers: Vec::new(),
            purchase_date: now,
            end_time: None,
            wallet_address: String::new(),
            checked_status: false,
            user_id: owner,
        }
    }

    pub fn is_batch_marker(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// A single-use password-reset token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetToken {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub token: String,
    pub user_id: ObjectId,
    pub expires_at: DateTime,
}

impl PasswordResetToken {
    /// Issue a token at `now`, valid for one hour.
    pub fn new(token: String, user_id: ObjectId, now: DateTime) -> Self {
        let expires = now.to_chrono() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        Self {
            id: ObjectId::new(),
            token,
            user_id,
            expires_at: DateTime::from_chrono(expires),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchased_ticket_lives_24_hours() {
        let now = DateTime::now();
        let ticket = LotteryTicket::purchased(7, "0xabc", ObjectId::new(), now);
        let end = ticket.end_time.unwrap().to_chrono();
        assert_eq!(end - now.to_chrono(), Duration::hours(24));
        assert_eq!(ticket.numbers, vec![7]);
        assert!(!ticket.is_batch_marker());
    }

    #[test]
    fn batch_marker_has_no_numbers_and_no_end() {
        let marker = LotteryTicket::batch_marker(ObjectId::new(), DateTime::now());
        assert!(marker.is_batch_marker());
        assert!(marker.end_time.is_none());
        assert!(marker.wallet_address.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"user\"").unwrap(),
            Role::User
        );
    }
}
