//! Listing eligibility and catalog browsing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{Category, MarketListing, Note};
use crate::types::{ListingId, UserId};

/// Minimum word count for a note to be listed
pub const MIN_SELLABLE_WORDS: usize = 20;

pub fn is_sellable(note: &Note, min_words: usize) -> bool {
    note.word_count() >= min_words
}

/// Notes in `notes` that are long enough to sell
pub fn sellable_notes(notes: &[Note], min_words: usize) -> Vec<&Note> {
    notes.iter().filter(|n| is_sellable(n, min_words)).collect()
}

/// Notes `user` received through marketplace purchases
pub fn purchase_history<'a>(notes: &'a [Note], user: &UserId) -> Vec<&'a Note> {
    notes
        .iter()
        .filter(|n| &n.owner_user_id == user && n.is_purchased())
        .collect()
}

/// Build a listing from one of the seller's notes
pub fn publish(
    seller: &UserId,
    note: &Note,
    price: i64,
    min_words: usize,
    now: DateTime<Utc>,
) -> CoreResult<MarketListing> {
    if &note.owner_user_id != seller {
        return Err(CoreError::Validation(format!("note {} is not owned by {}", note.id, seller)));
    }
    if !is_sellable(note, min_words) {
        return Err(CoreError::Validation(format!(
            "note '{}' has {} words; at least {} are required to sell",
            note.title,
            note.word_count(),
            min_words
        )));
    }
    if price <= 0 {
        return Err(CoreError::Validation(format!("price must be positive, got {}", price)));
    }

    Ok(MarketListing {
        id: ListingId::generate(),
        title: note.title.clone(),
        category: note.category,
        seller_user_id: seller.clone(),
        price,
        update_timestamp: now,
        sales_count: 0,
        score_sum: 0.0,
        review_count: 0,
        words: note.words.iter().map(|w| w.fresh_copy()).collect(),
    })
}

/// Catalog orderings. All sort descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    AverageScore,
    ReviewCount,
    SalesCount,
    /// Most recently updated first
    Newest,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "average_score" | "score" | "rating" => Ok(SortKey::AverageScore),
            "review_count" | "reviews" => Ok(SortKey::ReviewCount),
            "sales_count" | "sales" => Ok(SortKey::SalesCount),
            "newest" | "update" | "recent" => Ok(SortKey::Newest),
            other => Err(format!(
                "unknown sort '{}'. Use score, reviews, sales or newest",
                other
            )),
        }
    }
}

/// Filters and ordering applied together to the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<Category>,
    /// Case-sensitive title substring; empty means no filter
    pub query: Option<String>,
    pub sort: Option<SortKey>,
}

impl CatalogQuery {
    fn matches(&self, listing: &MarketListing) -> bool {
        let category_ok = self.category.map_or(true, |c| listing.category == c);
        let query_ok = match self.query.as_deref() {
            None | Some("") => true,
            Some(q) => listing.title.contains(q),
        };
        category_ok && query_ok
    }
}

/// Apply `query` to `catalog`. Without a sort key, catalog order is kept.
pub fn list<'a>(catalog: &'a [MarketListing], query: &CatalogQuery) -> Vec<&'a MarketListing> {
    let mut results: Vec<&MarketListing> = catalog.iter().filter(|l| query.matches(l)).collect();

    // Stable sorts keep catalog order among ties
    match query.sort {
        None => {}
        Some(SortKey::AverageScore) => results.sort_by(|a, b| b.average_score().total_cmp(&a.average_score())),
        Some(SortKey::ReviewCount) => results.sort_by(|a, b| b.review_count.cmp(&a.review_count)),
        Some(SortKey::SalesCount) => results.sort_by(|a, b| b.sales_count.cmp(&a.sales_count)),
        Some(SortKey::Newest) => results.sort_by(|a, b| b.update_timestamp.cmp(&a.update_timestamp)),
    }

    results
}
