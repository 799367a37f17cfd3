//! Review aggregation
//!
//! A listing keeps a running score sum and review count. Posting a review
//! stores it first and then updates the listing as a separate write, so
//! the two can disagree if the second write fails. Totals are always
//! folded into the stored listing, not the caller's copy.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::Marketplace;
use crate::error::{CoreError, CoreResult};
use crate::model::review::{MAX_SCORE, MIN_SCORE};
use crate::model::{MarketListing, Review};
use crate::types::{ListingId, ReviewId, UserId};

/// Add a score to the listing's running totals
pub fn fold_score(listing: &mut MarketListing, score: u8) {
    listing.score_sum += f64::from(score);
    listing.review_count += 1;
}

/// Remove a previously folded score
pub fn unfold_score(listing: &mut MarketListing, score: u8) {
    if listing.review_count == 0 {
        return;
    }
    listing.score_sum = (listing.score_sum - f64::from(score)).max(0.0);
    listing.review_count -= 1;
}

impl Marketplace {
    /// Post a review and fold its score into `listing`.
    ///
    /// Fails with `NotFound` once the listing is unpublished. `listing` is
    /// refreshed from the store with the new totals, even if persisting
    /// them fails.
    pub async fn post_review(
        &self,
        author: &UserId,
        listing: &mut MarketListing,
        score: u8,
        text: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Review> {
        if !Review::is_valid_score(score) {
            return Err(CoreError::Validation(format!(
                "score must be between {} and {}, got {}",
                MIN_SCORE, MAX_SCORE, score
            )));
        }
        if author == &listing.seller_user_id {
            return Err(CoreError::Validation("sellers cannot review their own listing".to_string()));
        }
        self.find_listing(&listing.id).await?;

        let review = Review {
            id: ReviewId::generate(),
            listing_id: listing.id.clone(),
            author_user_id: author.clone(),
            text: text.to_string(),
            score,
            created_at: now,
        };
        self.stores.reviews.post(&listing.id, &review).await?;

        if let Err(e) = self.update_listing(listing, |l| fold_score(l, score)).await {
            error!(
                "Review {} stored but listing {} totals not updated: {}",
                review.id, listing.id, e
            );
            return Err(totals_error(&listing.id, e));
        }

        if self.settings.review_reward > 0 {
            if let Err(e) = self.stores.balances.adjust(author, self.settings.review_reward).await {
                warn!("Failed to credit review reward to {}: {}", author, e);
            }
        }

        info!("Review {} posted on {} (score {})", review.id, listing.id, score);
        Ok(review)
    }

    pub async fn reviews(&self, listing: &MarketListing) -> CoreResult<Vec<Review>> {
        self.stores.reviews.list(&listing.id).await
    }

    /// Delete the author's review and take its score out of the totals
    pub async fn delete_review(
        &self,
        author: &UserId,
        listing: &mut MarketListing,
        review_id: &ReviewId,
    ) -> CoreResult<()> {
        self.find_listing(&listing.id).await?;
        let reviews = self.stores.reviews.list(&listing.id).await?;
        let review = reviews
            .iter()
            .find(|r| &r.id == review_id)
            .ok_or_else(|| CoreError::not_found("review", review_id))?;
        if &review.author_user_id != author {
            return Err(CoreError::Validation("only the author can delete a review".to_string()));
        }

        self.stores.reviews.delete(&listing.id, review_id).await?;

        let score = review.score;
        if let Err(e) = self.update_listing(listing, |l| unfold_score(l, score)).await {
            error!(
                "Review {} deleted but listing {} totals not updated: {}",
                review_id, listing.id, e
            );
            return Err(totals_error(&listing.id, e));
        }
        Ok(())
    }
}

/// A listing unpublished mid-update stays `NotFound`; anything else is a
/// failed write
fn totals_error(listing: &ListingId, e: CoreError) -> CoreError {
    match e {
        CoreError::NotFound { .. } => e,
        e => CoreError::persistence(format!("listing {} totals: {}", listing, e)),
    }
}
