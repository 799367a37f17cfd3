//! Persistence collaborators
//!
//! The engines only see these traits. `InMemoryStore` implements all of them
//! over a JSON snapshot; a hosted backend would implement the same traits.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::market::journal::TransferIntent;
use crate::model::{MarketListing, Note, Review, UserAccount, Word};
use crate::study::policy::TestSlot;
use crate::types::{ListingId, NoteId, ReviewId, UserId};

pub use memory::{InMemoryStore, Snapshot};

/// A user's note library
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn get(&self, user: &UserId) -> CoreResult<Vec<Note>>;

    /// Insert or replace a note
    async fn put(&self, user: &UserId, note: &Note) -> CoreResult<()>;

    async fn delete(&self, user: &UserId, note: &NoteId) -> CoreResult<()>;

    async fn increment_repeat_count(&self, user: &UserId, note: &NoteId) -> CoreResult<()>;

    async fn set_test_result(&self, user: &UserId, note: &NoteId, slot: TestSlot, value: f64) -> CoreResult<()>;

    /// Zero the repeat count and both test results
    async fn reset_repeat_count(&self, user: &UserId, note: &NoteId) -> CoreResult<()>;
}

/// The public catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Every listing, in insertion order
    async fn list_all(&self) -> CoreResult<Vec<MarketListing>>;

    /// Insert or replace a listing
    async fn put(&self, listing: &MarketListing) -> CoreResult<()>;

    async fn get_words(&self, listing: &ListingId) -> CoreResult<Vec<Word>>;

    async fn delete(&self, listing: &ListingId) -> CoreResult<()>;
}

/// Currency balances
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, user: &UserId) -> CoreResult<i64>;

    /// Add `delta` (negative to debit) to the user's balance
    async fn adjust(&self, user: &UserId, delta: i64) -> CoreResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn post(&self, listing: &ListingId, review: &Review) -> CoreResult<()>;

    async fn list(&self, listing: &ListingId) -> CoreResult<Vec<Review>>;

    async fn delete(&self, listing: &ListingId, review: &ReviewId) -> CoreResult<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user: &UserId) -> CoreResult<UserAccount>;

    async fn put(&self, account: &UserAccount) -> CoreResult<()>;
}

/// Durable record of balance transfers, written before any leg is applied
#[async_trait]
pub trait TransferLog: Send + Sync {
    async fn put_intent(&self, intent: &TransferIntent) -> CoreResult<()>;

    async fn get_intent(&self, id: &Uuid) -> CoreResult<TransferIntent>;

    async fn list_intents(&self) -> CoreResult<Vec<TransferIntent>>;
}

/// The full set of collaborators the engines need
#[derive(Clone)]
pub struct Stores {
    pub notes: Arc<dyn NoteStore>,
    pub market: Arc<dyn MarketStore>,
    pub balances: Arc<dyn BalanceStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub transfers: Arc<dyn TransferLog>,
}

impl Stores {
    /// Every collaborator served by the same in-memory store
    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            notes: Arc::new(store.clone()),
            market: Arc::new(store.clone()),
            balances: Arc::new(store.clone()),
            reviews: Arc::new(store.clone()),
            accounts: Arc::new(store.clone()),
            transfers: Arc::new(store.clone()),
        }
    }
}
