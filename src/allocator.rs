//! Ticket allocation: contiguous runs of globally-unique lottery
//! numbers, capped at 500.

use mongodb::bson::DateTime;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::models::{LotteryTicket, User, MAX_LOTTERY_NUMBER};
use crate::store::Store;

/// Allocates lottery numbers for purchases.
///
/// The read-max/insert sequence runs under one async mutex so that
/// concurrent purchases serialize and can never issue the same number
/// twice.
pub struct TicketAllocator {
    alloc_lock: Mutex<()>,
}

impl TicketAllocator {
    pub fn new() -> Self {
        Self {
            alloc_lock: Mutex::new(()),
        }
    }

    /// Buy `requested` tickets for `owner` against `wallet`.
    ///
    /// A wallet with no ledger history binds to the purchasing user;
    /// afterwards only that user may buy through it. Requests are clamped
    /// to 500 tickets, and a run that would pass number 500 is refused
    /// outright.
    pub async fn purchase(
        &self,
        store: &dyn Store,
        owner: &User,
        wallet: &str,
        requested: i64,
        now: DateTime,
    ) -> Result<Vec<LotteryTicket>, ApiError> {
        if let Some(existing) = store.find_ticket_by_wallet(wallet).await? {
            if existing.user_id != owner.id {
                return Err(ApiError::InvalidWallet);
            }
        }

        let _guard = self.alloc_lock.lock().await;

        let next = store.max_ticket_number().await? + 1;
        let count = requested.min(i64::from(MAX_LOTTERY_NUMBER));
        if count <= 0 {
            return Err(ApiError::InvalidCount);
        }
        let count = count as u32;

        let last = next + count - 1;
        if last > MAX_LOTTERY_NUMBER {
            return Err(ApiError::CapacityExceeded);
        }

        let tickets: Vec<LotteryTicket> = (next..=last)
            .map(|number| LotteryTicket::purchased(number, wallet, owner.id, now))
            .collect();
        store.insert_tickets(&tickets).await?;

        Ok(tickets)
    }
}

impl Default for TicketAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn test_user(name: &str) -> User {
        User::new(
            name.to_string(),
            format!("{name}@example.com"),
            "hash".to_string(),
            Role::User,
        )
    }

    #[tokio::test]
    async fn first_purchase_binds_wallet_and_starts_at_one() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();

        let now = DateTime::now();
        let tickets = allocator
            .purchase(&store, &alice, "0xabc", 3, now)
            .await
            .unwrap();

        let numbers: Vec<u32> = tickets.iter().flat_map(|t| t.numbers.clone()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        for ticket in &tickets {
            assert_eq!(ticket.wallet_address, "0xabc");
            assert_eq!(ticket.user_id, alice.id);
            assert!(!ticket.checked_status);
            let lifetime = ticket.end_time.unwrap().to_chrono() - ticket.purchase_date.to_chrono();
            assert_eq!(lifetime, chrono::Duration::hours(24));
        }
    }

    #[tokio::test]
    async fn numbering_continues_across_purchases() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();

        allocator
            .purchase(&store, &alice, "0xabc", 3, DateTime::now())
            .await
            .unwrap();
        let second = allocator
            .purchase(&store, &alice, "0xabc", 2, DateTime::now())
            .await
            .unwrap();

        let numbers: Vec<u32> = second.iter().flat_map(|t| t.numbers.clone()).collect();
        assert_eq!(numbers, vec![4, 5]);
    }

    #[tokio::test]
    async fn wallet_bound_to_another_user_is_rejected() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();
        let bob = store.create_user(test_user("bob")).await.unwrap();

        allocator
            .purchase(&store, &alice, "0xabc", 1, DateTime::now())
            .await
            .unwrap();
        let err = allocator
            .purchase(&store, &bob, "0xabc", 1, DateTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidWallet));
    }

    #[tokio::test]
    async fn non_positive_counts_are_invalid() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();

        for requested in [0, -5] {
            let err = allocator
                .purchase(&store, &alice, "0xabc", requested, DateTime::now())
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidCount));
        }
        assert!(store.all_tickets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_requests_clamp_to_the_cap() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();

        let tickets = allocator
            .purchase(&store, &alice, "0xabc", 600, DateTime::now())
            .await
            .unwrap();
        assert_eq!(tickets.len(), 500);
        assert_eq!(store.max_ticket_number().await.unwrap(), 500);
    }

    #[tokio::test]
    async fn runs_past_the_cap_are_refused() {
        let store = MemoryStore::new();
        let allocator = TicketAllocator::new();
        let alice = store.create_user(test_user("alice")).await.unwrap();

        allocator
            .purchase(&store, &alice, "0xabc", 498, DateTime::now())
            .await
            .unwrap();
        let err = allocator
            .purchase(&store, &alice, "0xabc", 5, DateTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded));

        // Nothing past 498 was written.
        assert_eq!(store.max_ticket_number().await.unwrap(), 498);
    }

    #[tokio::test]
    async fn concurrent_purchases_never_duplicate_numbers() {
        let store = Arc::new(MemoryStore::new());
        let allocator = Arc::new(TicketAllocator::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let user = store
                .create_user(test_user(&format!("user{i}")))
                .await
                .unwrap();
            let store = store.clone();
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator
                    .purchase(&*store, &user, &format!("0x{i}"), 10, DateTime::now())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut numbers: Vec<u32> = store
            .all_tickets()
            .await
            .unwrap()
            .iter()
            .flat_map(|t| t.numbers.clone())
            .collect();
        assert_eq!(numbers.len(), 80);
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), 80);
    }
}
