//! MongoDB-backed store.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{LotteryTicket, PasswordResetToken, User};

use super::Store;

pub struct MongoStore {
    users: Collection<User>,
    tickets: Collection<LotteryTicket>,
    reset_tokens: Collection<PasswordResetToken>,
}

impl MongoStore {
    /// Connect to the configured database and make sure the indexes the
    /// schema relies on exist.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(&config.db_uri).await?;
        let db = client.database(&config.db_name);

        let store = Self {
            users: db.collection("users"),
            tickets: db.collection("lottery"),
            reset_tokens: db.collection("password_reset_tokens"),
        };
        store.ensure_indexes().await?;

        info!("connected to database {}", config.db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.tickets
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "wallet_address": 1 })
                    .build(),
            )
            .await?;
        self.reset_tokens
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "token": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(ApiError::Conflict("email"));
        }
        if self.find_user_by_username(&user.username).await?.is_some() {
            return Err(ApiError::Conflict("username"));
        }
        self.users.insert_one(&user).await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.find_one(doc! { "username": username }).await?)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn update_password(&self, id: ObjectId, new_hash: &str) -> Result<(), ApiError> {
        self.users
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "password_hash": new_hash } },
            )
            .await?;
        Ok(())
    }

    async fn insert_tickets(&self, tickets: &[LotteryTicket]) -> Result<(), ApiError> {
        if tickets.is_empty() {
            return Ok(());
        }
        self.tickets.insert_many(tickets).await?;
        Ok(())
    }

    async fn find_ticket_by_wallet(&self, wallet: &str) -> Result<Option<LotteryTicket>, ApiError> {
        Ok(self
            .tickets
            .find_one(doc! { "wallet_address": wallet })
            .await?)
    }

    async fn max_ticket_number(&self) -> Result<u32, ApiError> {
        let pipeline = vec![
            doc! { "$unwind": "$numbers" },
            doc! { "$group": { "_id": null, "max": { "$max": "$numbers" } } },
        ];
        let mut cursor = self.tickets.aggregate(pipeline).await?;
        match cursor.try_next().await? {
            Some(group) => Ok(read_number(&group, "max")),
            None => Ok(0),
        }
    }

    async fn all_tickets(&self) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self.tickets.find(doc! {}).await?.try_collect().await?)
    }

    async fn tickets_by_owner(&self, owner: ObjectId) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self
            .tickets
            .find(doc! { "user_id": owner, "numbers": { "$ne": [] } })
            .await?
            .try_collect()
            .await?)
    }

    async fn tickets_with_numbers(&self, numbers: &[u32]) -> Result<Vec<LotteryTicket>, ApiError> {
        let numbers: Vec<i32> = numbers.iter().map(|n| *n as i32).collect();
        Ok(self
            .tickets
            .find(doc! { "numbers": { "$in": numbers } })
            .await?
            .try_collect()
            .await?)
    }

    async fn tickets_since(&self, since: DateTime) -> Result<Vec<LotteryTicket>, ApiError> {
        Ok(self
            .tickets
            .find(doc! { "purchase_date": { "$gte": since } })
            .await?
            .try_collect()
            .await?)
    }

    async fn mark_ticket_checked(&self, id: ObjectId) -> Result<(), ApiError> {
        self.tickets
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "checked_status": true } },
            )
            .await?;
        Ok(())
    }

    async fn latest_batch_marker(&self) -> Result<Option<LotteryTicket>, ApiError> {
        Ok(self
            .tickets
            .find_one(doc! { "numbers": { "$size": 0 } })
            .sort(doc! { "purchase_date": -1 })
            .await?)
    }

    async fn close_batch(&self, id: ObjectId, end_time: DateTime) -> Result<(), ApiError> {
        self.tickets
            .update_one(doc! { "_id": id }, doc! { "$set": { "end_time": end_time } })
            .await?;
        Ok(())
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ApiError> {
        self.reset_tokens.insert_one(token).await?;
        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>, ApiError> {
        Ok(self.reset_tokens.find_one(doc! { "token": token }).await?)
    }

    async fn delete_reset_token(&self, token: &str) -> Result<(), ApiError> {
        self.reset_tokens
            .delete_one(doc! { "token": token })
            .await?;
        Ok(())
    }
}

/// Aggregation output may come back as either int width.
fn read_number(document: &Document, key: &str) -> u32 {
    document
        .get_i32(key)
        .map(|v| v as i64)
        .or_else(|_| document.get_i64(key))
        .unwrap_or(0) as u32
}
