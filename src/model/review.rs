//! Listing reviews

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ListingId, ReviewId, UserId};

/// Lowest and highest score a review may carry
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub listing_id: ListingId,
    pub author_user_id: UserId,
    pub text: String,
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn is_valid_score(score: u8) -> bool {
        (MIN_SCORE..=MAX_SCORE).contains(&score)
    }
}
