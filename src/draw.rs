//! Draw engine: winning-number selection and lottery batch lifecycle.
//!
//! Selection is uniform pseudo-random over whatever source the caller
//! injects. Production hands in an entropy-seeded rng, so draws are not
//! reproducible; tests hand in a seeded one.

use mongodb::bson::{oid::ObjectId, DateTime};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ApiError;
use crate::models::{LotteryTicket, User};
use crate::store::Store;

/// How many winning numbers a draw selects.
pub const WINNING_NUMBER_COUNT: usize = 5;

/// Shuffle every issued number, take the first five as winners, and
/// return the owners of the tickets holding them, in ticket order.
///
/// Owners holding several winning numbers appear once per winning
/// ticket. An empty ledger yields an empty list. Winning tickets are
/// marked checked.
pub async fn generate_winners<R: Rng>(
    store: &dyn Store,
    rng: &mut R,
) -> Result<Vec<User>, ApiError> {
    let tickets = store.all_tickets().await?;
    let mut pool: Vec<u32> = tickets
        .iter()
        .flat_map(|t| t.numbers.iter().copied())
        .collect();
    pool.shuffle(rng);

    let winning: Vec<u32> = pool.into_iter().take(WINNING_NUMBER_COUNT).collect();
    if winning.is_empty() {
        return Ok(Vec::new());
    }

    let winning_tickets = store.tickets_with_numbers(&winning).await?;
    let mut winners = Vec::new();
    for ticket in &winning_tickets {
        store.mark_ticket_checked(ticket.id).await?;
        if let Some(owner) = store.find_user_by_id(ticket.user_id).await? {
            winners.push(owner);
        }
    }
    Ok(winners)
}

/// Open a new lottery batch at `now`.
pub async fn start_lottery(
    store: &dyn Store,
    admin: &User,
    now: DateTime,
) -> Result<LotteryTicket, ApiError> {
    let marker = LotteryTicket::batch_marker(admin.id, now);
    store.insert_tickets(&[marker.clone()]).await?;
    Ok(marker)
}

/// Close the most recent batch and pick one winner among its
/// participants.
///
/// Participants are the distinct owners of tickets purchased at or
/// after the batch opened. A batch with no participants closes cleanly
/// with no winner; closing before any batch was started is an error.
pub async fn close_lottery<R: Rng>(
    store: &dyn Store,
    rng: &mut R,
    now: DateTime,
) -> Result<Option<User>, ApiError> {
    let marker = store
        .latest_batch_marker()
        .await?
        .ok_or(ApiError::NotFound("lottery"))?;
    store.close_batch(marker.id, now).await?;

    let tickets = store.tickets_since(marker.purchase_date).await?;
    let mut participants: Vec<ObjectId> = Vec::new();
    for ticket in tickets.iter().filter(|t| !t.is_batch_marker()) {
        if !participants.contains(&ticket.user_id) {
            participants.push(ticket.user_id);
        }
    }
    if participants.is_empty() {
        return Ok(None);
    }

    let picked = participants[rng.gen_range(0..participants.len())];
    store.find_user_by_id(picked).await
}
