//! Word-list marketplace
//!
//! Listing eligibility and catalog browsing are pure functions in
//! `listing`; `Marketplace` runs them against the stores together with the
//! purchase flow (`purchase`) and review aggregation (`review`).

pub mod journal;
pub mod listing;
pub mod purchase;
pub mod review;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{MarketListing, Note};
use crate::store::Stores;
use crate::types::{ListingId, NoteId, UserId};

pub use journal::{TransferIntent, TransferStatus};
pub use listing::{CatalogQuery, SortKey, MIN_SELLABLE_WORDS};
pub use purchase::PurchaseReceipt;

/// Marketplace rules that can be tuned from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Minimum word count for a note to be listed
    #[serde(default = "default_min_sellable_words")]
    pub min_sellable_words: usize,
    /// Currency credited to a review's author once the review is posted
    #[serde(default)]
    pub review_reward: i64,
}

fn default_min_sellable_words() -> usize {
    MIN_SELLABLE_WORDS
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            min_sellable_words: default_min_sellable_words(),
            review_reward: 0,
        }
    }
}

/// Marketplace operations for explicitly identified users
pub struct Marketplace {
    stores: Stores,
    settings: MarketSettings,
}

impl Marketplace {
    pub fn new(stores: Stores, settings: MarketSettings) -> Self {
        Self { stores, settings }
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    /// Filter and sort the public catalog
    pub async fn browse(&self, query: &CatalogQuery) -> CoreResult<Vec<MarketListing>> {
        let catalog = self.stores.market.list_all().await?;
        Ok(listing::list(&catalog, query).into_iter().cloned().collect())
    }

    pub async fn find_listing(&self, id: &ListingId) -> CoreResult<MarketListing> {
        self.stores
            .market
            .list_all()
            .await?
            .into_iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| CoreError::not_found("listing", id))
    }

    /// Apply `change` to the stored copy of the listing and write it back.
    ///
    /// Working from a fresh read keeps concurrent updates to other fields
    /// intact. `listing` is replaced with the changed copy even when the
    /// write fails.
    async fn update_listing(
        &self,
        listing: &mut MarketListing,
        change: impl FnOnce(&mut MarketListing) + Send,
    ) -> CoreResult<()> {
        let mut current = self.find_listing(&listing.id).await?;
        change(&mut current);
        let written = self.stores.market.put(&current).await;
        *listing = current;
        written
    }

    /// The user's notes that are long enough to sell
    pub async fn sellable_notes(&self, user: &UserId) -> CoreResult<Vec<Note>> {
        let notes = self.stores.notes.get(user).await?;
        Ok(listing::sellable_notes(&notes, self.settings.min_sellable_words)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Notes the user bought on the marketplace
    pub async fn purchase_history(&self, user: &UserId) -> CoreResult<Vec<Note>> {
        let notes = self.stores.notes.get(user).await?;
        Ok(listing::purchase_history(&notes, user).into_iter().cloned().collect())
    }

    /// List one of the seller's notes at `price`
    pub async fn publish(
        &self,
        seller: &UserId,
        note_id: &NoteId,
        price: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<MarketListing> {
        let notes = self.stores.notes.get(seller).await?;
        let note = notes
            .iter()
            .find(|n| &n.id == note_id)
            .ok_or_else(|| CoreError::not_found("note", note_id))?;

        let listing = listing::publish(seller, note, price, self.settings.min_sellable_words, now)?;
        self.stores.market.put(&listing).await?;
        tracing::info!("Published note {} as listing {} for {}", note_id, listing.id, price);
        Ok(listing)
    }

    /// Remove a listing. Only its seller may do this.
    pub async fn unpublish(&self, seller: &UserId, listing_id: &ListingId) -> CoreResult<()> {
        let listing = self.find_listing(listing_id).await?;
        if &listing.seller_user_id != seller {
            return Err(CoreError::Validation(format!(
                "listing {} belongs to another seller",
                listing_id
            )));
        }
        self.stores.market.delete(listing_id).await
    }
}
