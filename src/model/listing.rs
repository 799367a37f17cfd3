//! Published marketplace listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Word};
use crate::types::{ListingId, UserId};

/// A note published for sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: ListingId,
    pub title: String,
    #[serde(default)]
    pub category: Category,
    pub seller_user_id: UserId,
    /// Price in the in-app currency, always positive
    pub price: i64,
    pub update_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sales_count: u64,
    /// Running sum of review scores
    #[serde(default)]
    pub score_sum: f64,
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl MarketListing {
    /// Mean review score. Computed on every read; never stored.
    pub fn average_score(&self) -> f64 {
        self.score_sum / self.review_count.max(1) as f64
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}
