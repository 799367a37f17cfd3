//! Purchase transactions
//!
//! A purchase checks the listing and the buyer's balance, moves the price
//! from buyer to seller with two independent balance updates, delivers a
//! copy of the listing into the buyer's library and counts the sale. There
//! is no shared transaction: the transfer intent in the `TransferLog` is the
//! only record tying these steps together, and `reconcile` finishes
//! transfers that stopped partway.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::journal::TransferIntent;
use super::Marketplace;
use crate::error::{CoreError, CoreResult};
use crate::model::{MarketListing, Note, Word};
use crate::types::UserId;

/// Outcome of a completed purchase
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub transfer_id: Uuid,
    /// The buyer's new copy of the listing
    pub note: Note,
    pub price: i64,
    /// Buyer balance after the debit, as computed from the pre-purchase read
    pub buyer_balance: i64,
}

/// The note a buyer receives: the listing's words, unrated, under new ids
pub fn buyer_copy(buyer: &UserId, listing: &MarketListing, words: &[Word], now: DateTime<Utc>) -> Note {
    let mut note = Note::new(buyer.clone(), listing.title.clone(), listing.category, now);
    note.words = words.iter().map(|w| w.fresh_copy()).collect();
    note.market_purchase_timestamp = Some(now);
    note.purchase_price = Some(listing.price);
    note
}

impl Marketplace {
    /// Buy `listing` for `buyer`.
    ///
    /// Fails with `NotFound` when the listing is no longer published and
    /// with `InsufficientBalance` when the buyer cannot afford the price,
    /// both before anything is written. A balance equal to the price is
    /// enough. On success `listing` reflects the stored sales count.
    pub async fn purchase(
        &self,
        buyer: &UserId,
        listing: &mut MarketListing,
        now: DateTime<Utc>,
    ) -> CoreResult<PurchaseReceipt> {
        if buyer == &listing.seller_user_id {
            return Err(CoreError::Validation("cannot buy your own listing".to_string()));
        }
        let words = self.stores.market.get_words(&listing.id).await?;

        // Read-then-write without a lock: concurrent purchases by the same
        // buyer can both pass this check.
        let balance = self.stores.balances.get(buyer).await?;
        if balance < listing.price {
            return Err(CoreError::InsufficientBalance { balance, price: listing.price });
        }

        let mut intent = TransferIntent::new(
            buyer.clone(),
            listing.seller_user_id.clone(),
            listing.id.clone(),
            listing.price,
            buyer_copy(buyer, listing, &words, now),
            now,
        );
        self.stores.transfers.put_intent(&intent).await?;

        self.apply_outstanding_legs(&mut intent).await?;
        if let Some(updated) = self.finish_delivery(&mut intent).await? {
            *listing = updated;
        }

        info!(
            "Purchase {}: {} bought listing {} from {} for {}",
            intent.id, buyer, intent.listing_id, intent.seller, intent.amount
        );
        Ok(PurchaseReceipt {
            transfer_id: intent.id,
            price: intent.amount,
            buyer_balance: balance - intent.amount,
            note: intent.copy,
        })
    }

    /// Finish a transfer that stopped partway: apply the legs that never
    /// landed, then deliver the note and count the sale if either is still
    /// outstanding.
    ///
    /// A pending debit is only applied while the buyer can still cover it;
    /// otherwise this fails with `InsufficientBalance` and the transfer
    /// stays partial.
    pub async fn reconcile(&self, transfer_id: &Uuid) -> CoreResult<TransferIntent> {
        let mut intent = self.stores.transfers.get_intent(transfer_id).await?;
        if !intent.is_complete() {
            info!("Reconciling transfer {}", intent.id);
            if !intent.debit_applied {
                let balance = self.stores.balances.get(&intent.buyer).await?;
                if balance < intent.amount {
                    warn!(
                        "Transfer {} still owes {} from {}, who now has {}",
                        intent.id, intent.amount, intent.buyer, balance
                    );
                    return Err(CoreError::InsufficientBalance { balance, price: intent.amount });
                }
            }
            self.apply_outstanding_legs(&mut intent).await?;
        }
        self.finish_delivery(&mut intent).await?;
        Ok(intent)
    }

    /// Transfers that still need operator attention
    pub async fn unsettled_transfers(&self) -> CoreResult<Vec<TransferIntent>> {
        Ok(self
            .stores
            .transfers
            .list_intents()
            .await?
            .into_iter()
            .filter(|t| !t.is_settled())
            .collect())
    }

    /// Issue every unapplied leg concurrently and wait for all of them
    async fn apply_outstanding_legs(&self, intent: &mut TransferIntent) -> CoreResult<()> {
        let legs = intent.outstanding_legs();
        let balances = &self.stores.balances;
        let results = join_all(legs.iter().map(|(leg, user, delta)| async move {
            (*leg, balances.adjust(user, *delta).await)
        }))
        .await;

        let mut failures = Vec::new();
        for (leg, result) in results {
            match result {
                Ok(()) => intent.mark_applied(leg),
                Err(e) => failures.push(format!("{:?} leg: {}", leg, e)),
            }
        }
        intent.settle();
        self.record(intent).await;

        if failures.is_empty() {
            return Ok(());
        }
        error!(
            "Transfer {} left partial (debit applied: {}, credit applied: {}): {}",
            intent.id,
            intent.debit_applied,
            intent.credit_applied,
            failures.join("; ")
        );
        Err(CoreError::persistence(format!(
            "transfer {} incomplete: {}",
            intent.id,
            failures.join("; ")
        )))
    }

    /// Deliver the buyer's copy and count the sale, skipping whichever step
    /// the intent already records. Returns the updated listing when the
    /// sales count was written.
    ///
    /// Delivery is idempotent because the copy's id is fixed by the transfer.
    /// The sales count is not: if it lands but the intent write after it
    /// fails, a later reconcile counts the sale again.
    async fn finish_delivery(&self, intent: &mut TransferIntent) -> CoreResult<Option<MarketListing>> {
        if !intent.is_complete() {
            return Ok(None);
        }

        if intent.delivered_note.is_none() {
            if let Err(e) = self.stores.notes.put(&intent.buyer, &intent.copy).await {
                error!("Transfer {} paid but delivery to {} failed: {}", intent.id, intent.buyer, e);
                return Err(CoreError::persistence(format!("delivery for transfer {}: {}", intent.id, e)));
            }
            intent.delivered_note = Some(intent.copy.id.clone());
            self.record(intent).await;
        }

        if intent.sale_recorded {
            return Ok(None);
        }
        let listing = match self.find_listing(&intent.listing_id).await {
            Ok(mut current) => {
                current.sales_count += 1;
                if let Err(e) = self.stores.market.put(&current).await {
                    error!("Sales count of listing {} not updated for transfer {}: {}", current.id, intent.id, e);
                    return Err(CoreError::persistence(format!("listing {} sales count: {}", current.id, e)));
                }
                Some(current)
            }
            Err(CoreError::NotFound { .. }) => {
                warn!(
                    "Listing {} was unpublished; sale from transfer {} not counted",
                    intent.listing_id, intent.id
                );
                None
            }
            Err(e) => return Err(e),
        };
        intent.sale_recorded = true;
        self.record(intent).await;
        Ok(listing)
    }

    /// Persist the intent's progress. A failed write only costs a repeated
    /// step on reconcile.
    async fn record(&self, intent: &TransferIntent) {
        if let Err(e) = self.stores.transfers.put_intent(intent).await {
            warn!("Failed to record progress of transfer {}: {}", intent.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::journal::copy_id;
    use crate::market::{MarketSettings, TransferStatus};
    use crate::model::{Category, UserAccount, Word};
    use crate::store::{AccountStore, BalanceStore, InMemoryStore, MarketStore, NoteStore, Stores, TransferLog};
    use crate::types::ListingId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Balance store whose first credit (or first debit) fails
    struct FlakyLeg {
        inner: InMemoryStore,
        credit: bool,
        failed_once: AtomicBool,
    }

    impl FlakyLeg {
        fn credit(inner: &InMemoryStore) -> Self {
            Self { inner: inner.clone(), credit: true, failed_once: AtomicBool::new(false) }
        }

        fn debit(inner: &InMemoryStore) -> Self {
            Self { inner: inner.clone(), credit: false, failed_once: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl BalanceStore for FlakyLeg {
        async fn get(&self, user: &UserId) -> CoreResult<i64> {
            BalanceStore::get(&self.inner, user).await
        }

        async fn adjust(&self, user: &UserId, delta: i64) -> CoreResult<()> {
            if (delta > 0) == self.credit && !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(CoreError::persistence("ledger unavailable"));
            }
            self.inner.adjust(user, delta).await
        }
    }

    /// Listing store whose first write fails
    struct FlakyListings {
        inner: InMemoryStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl MarketStore for FlakyListings {
        async fn list_all(&self) -> CoreResult<Vec<MarketListing>> {
            self.inner.list_all().await
        }

        async fn put(&self, listing: &MarketListing) -> CoreResult<()> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(CoreError::persistence("catalog unavailable"));
            }
            MarketStore::put(&self.inner, listing).await
        }

        async fn get_words(&self, listing: &ListingId) -> CoreResult<Vec<Word>> {
            self.inner.get_words(listing).await
        }

        async fn delete(&self, listing: &ListingId) -> CoreResult<()> {
            MarketStore::delete(&self.inner, listing).await
        }
    }

    /// Transfer log that drops one numbered write (1-based)
    struct LossyLog {
        inner: InMemoryStore,
        writes: AtomicUsize,
        drop_write: usize,
    }

    #[async_trait]
    impl TransferLog for LossyLog {
        async fn put_intent(&self, intent: &TransferIntent) -> CoreResult<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.drop_write {
                return Err(CoreError::persistence("transfer log unavailable"));
            }
            self.inner.put_intent(intent).await
        }

        async fn get_intent(&self, id: &Uuid) -> CoreResult<TransferIntent> {
            self.inner.get_intent(id).await
        }

        async fn list_intents(&self) -> CoreResult<Vec<TransferIntent>> {
            self.inner.list_intents().await
        }
    }

    async fn seeded(buyer_balance: i64, price: i64) -> (InMemoryStore, MarketListing) {
        let store = InMemoryStore::new();
        AccountStore::put(&store, &UserAccount { balance: buyer_balance, ..UserAccount::new("buyer".into(), "Buyer", "b@x") })
            .await
            .unwrap();
        AccountStore::put(&store, &UserAccount { balance: 50, ..UserAccount::new("seller".into(), "Seller", "s@x") })
            .await
            .unwrap();

        let listing = MarketListing {
            id: ListingId::from("listing"),
            title: "TOEFL core".to_string(),
            category: Category::Exam,
            seller_user_id: UserId::from("seller"),
            price,
            update_timestamp: Utc::now(),
            sales_count: 0,
            score_sum: 0.0,
            review_count: 0,
            words: (0..20).map(|i| Word::new(format!("w{}", i), "m")).collect(),
        };
        MarketStore::put(&store, &listing).await.unwrap();
        (store, listing)
    }

    fn marketplace(stores: Stores) -> Marketplace {
        Marketplace::new(stores, MarketSettings::default())
    }

    #[tokio::test]
    async fn test_full_balance_purchase() {
        let (store, mut listing) = seeded(1000, 1000).await;
        let market = marketplace(Stores::in_memory(&store));
        let buyer = UserId::from("buyer");

        let receipt = market.purchase(&buyer, &mut listing, Utc::now()).await.unwrap();

        assert_eq!(receipt.buyer_balance, 0);
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 0);
        assert_eq!(BalanceStore::get(&store, &UserId::from("seller")).await.unwrap(), 1050);
        assert_eq!(listing.sales_count, 1);
        assert_eq!(store.list_all().await.unwrap()[0].sales_count, 1);

        assert_eq!(receipt.note.owner_user_id, buyer);
        assert_eq!(receipt.note.purchase_price, Some(1000));
        assert!(receipt.note.market_purchase_timestamp.is_some());
        assert_eq!(receipt.note.word_count(), 20);
        let library = NoteStore::get(&store, &buyer).await.unwrap();
        assert_eq!(library.len(), 1);

        let intent = store.get_intent(&receipt.transfer_id).await.unwrap();
        assert_eq!(intent.status, TransferStatus::Completed);
        assert_eq!(intent.delivered_note, Some(receipt.note.id.clone()));
        assert!(intent.is_settled());
    }

    #[tokio::test]
    async fn test_unpublished_listing_cannot_be_bought() {
        let (store, mut listing) = seeded(1000, 100).await;
        let market = marketplace(Stores::in_memory(&store));
        let buyer = UserId::from("buyer");
        MarketStore::delete(&store, &listing.id).await.unwrap();

        let result = market.purchase(&buyer, &mut listing, Utc::now()).await;
        assert!(matches!(result, Err(CoreError::NotFound { entity: "listing", .. })));

        // No money moved and nothing is left to reconcile
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 1000);
        assert_eq!(BalanceStore::get(&store, &UserId::from("seller")).await.unwrap(), 50);
        assert!(store.list_intents().await.unwrap().is_empty());
        assert!(NoteStore::get(&store, &buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_counted_on_stored_listing() {
        let (store, listing) = seeded(1000, 100).await;
        let market = marketplace(Stores::in_memory(&store));
        let mut reviewed = listing.clone();
        let mut stale = listing;

        market.post_review(&UserId::from("reader"), &mut reviewed, 4, "", Utc::now()).await.unwrap();
        market.purchase(&UserId::from("buyer"), &mut stale, Utc::now()).await.unwrap();

        let stored = store.list_all().await.unwrap();
        assert_eq!(stored[0].review_count, 1);
        assert_eq!(stored[0].sales_count, 1);
        assert_eq!(stale.review_count, 1);
        assert_eq!(stale.sales_count, 1);
    }

    #[tokio::test]
    async fn test_reconcile_refuses_debit_buyer_cannot_cover() {
        let (store, mut listing) = seeded(1000, 1000).await;
        let mut stores = Stores::in_memory(&store);
        stores.balances = Arc::new(FlakyLeg::debit(&store));
        let market = marketplace(stores);
        let buyer = UserId::from("buyer");

        let first = market.purchase(&buyer, &mut listing, Utc::now()).await;
        assert!(matches!(first, Err(CoreError::PersistenceFailure(_))));
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 1000);
        let stuck = market.unsettled_transfers().await.unwrap().remove(0);
        assert!(!stuck.debit_applied);

        // The untouched balance pays for a second purchase in full
        market.purchase(&buyer, &mut listing, Utc::now()).await.unwrap();
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 0);

        let result = market.reconcile(&stuck.id).await;
        assert!(matches!(result, Err(CoreError::InsufficientBalance { balance: 0, price: 1000 })));
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 0);
        let stored = store.get_intent(&stuck.id).await.unwrap();
        assert_eq!(stored.status, TransferStatus::Partial);
        assert!(!stored.debit_applied);
        assert_eq!(NoteStore::get(&store, &buyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sales_count_retried_by_reconcile() {
        let (store, mut listing) = seeded(1000, 100).await;
        let mut stores = Stores::in_memory(&store);
        stores.market = Arc::new(FlakyListings { inner: store.clone(), failed_once: AtomicBool::new(false) });
        let market = marketplace(stores);
        let buyer = UserId::from("buyer");

        let result = market.purchase(&buyer, &mut listing, Utc::now()).await;
        assert!(matches!(result, Err(CoreError::PersistenceFailure(_))));
        assert_eq!(store.list_all().await.unwrap()[0].sales_count, 0);

        let pending = market.unsettled_transfers().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].delivered_note.is_some());
        assert!(!pending[0].sale_recorded);

        let intent = market.reconcile(&pending[0].id).await.unwrap();
        assert!(intent.is_settled());
        assert_eq!(store.list_all().await.unwrap()[0].sales_count, 1);
        assert_eq!(NoteStore::get(&store, &buyer).await.unwrap().len(), 1);

        // Nothing left to do on a settled transfer
        market.reconcile(&intent.id).await.unwrap();
        assert_eq!(store.list_all().await.unwrap()[0].sales_count, 1);
    }

    #[tokio::test]
    async fn test_redelivery_replaces_copy() {
        let (store, mut listing) = seeded(1000, 100).await;
        let mut stores = Stores::in_memory(&store);
        // Writes: intent, legs applied, note delivered
        stores.transfers = Arc::new(LossyLog { inner: store.clone(), writes: AtomicUsize::new(0), drop_write: 3 });
        stores.market = Arc::new(FlakyListings { inner: store.clone(), failed_once: AtomicBool::new(false) });
        let market = marketplace(stores);
        let buyer = UserId::from("buyer");

        assert!(market.purchase(&buyer, &mut listing, Utc::now()).await.is_err());
        let stored = market.unsettled_transfers().await.unwrap().remove(0);
        assert!(stored.is_complete());
        assert!(stored.delivered_note.is_none());
        assert_eq!(NoteStore::get(&store, &buyer).await.unwrap().len(), 1);

        let intent = market.reconcile(&stored.id).await.unwrap();
        let library = NoteStore::get(&store, &buyer).await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].id, copy_id(&intent.id));
        assert_eq!(intent.delivered_note, Some(library[0].id.clone()));
        assert_eq!(store.list_all().await.unwrap()[0].sales_count, 1);
        assert!(market.unsettled_transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_short_is_rejected_without_mutation() {
        let (store, mut listing) = seeded(999, 1000).await;
        let market = marketplace(Stores::in_memory(&store));
        let buyer = UserId::from("buyer");

        let result = market.purchase(&buyer, &mut listing, Utc::now()).await;
        assert!(matches!(
            result,
            Err(CoreError::InsufficientBalance { balance: 999, price: 1000 })
        ));
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 999);
        assert_eq!(listing.sales_count, 0);
        assert!(store.list_intents().await.unwrap().is_empty());
        assert!(NoteStore::get(&store, &buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_buy_own_listing() {
        let (store, mut listing) = seeded(1000, 10).await;
        let market = marketplace(Stores::in_memory(&store));
        let result = market.purchase(&UserId::from("seller"), &mut listing, Utc::now()).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_seller_history_excludes_sold_copy() {
        let (store, mut listing) = seeded(1000, 100).await;
        let market = marketplace(Stores::in_memory(&store));
        market.purchase(&UserId::from("buyer"), &mut listing, Utc::now()).await.unwrap();

        assert_eq!(market.purchase_history(&UserId::from("buyer")).await.unwrap().len(), 1);
        assert!(market.purchase_history(&UserId::from("seller")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_failure_leaves_partial_intent_then_reconciles() {
        let (store, mut listing) = seeded(1000, 400).await;

        let mut stores = Stores::in_memory(&store);
        stores.balances = Arc::new(FlakyLeg::credit(&store));
        let market = marketplace(stores);
        let buyer = UserId::from("buyer");

        let result = market.purchase(&buyer, &mut listing, Utc::now()).await;
        assert!(matches!(result, Err(CoreError::PersistenceFailure(_))));

        // Debit landed, credit did not, nothing delivered
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 600);
        assert_eq!(BalanceStore::get(&store, &UserId::from("seller")).await.unwrap(), 50);
        assert!(NoteStore::get(&store, &buyer).await.unwrap().is_empty());

        let pending = market.unsettled_transfers().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, TransferStatus::Partial);
        assert!(pending[0].debit_applied);
        assert!(!pending[0].credit_applied);

        let intent = market.reconcile(&pending[0].id).await.unwrap();
        assert!(intent.is_complete());
        assert!(intent.delivered_note.is_some());
        // Debit was not applied a second time
        assert_eq!(BalanceStore::get(&store, &buyer).await.unwrap(), 600);
        assert_eq!(BalanceStore::get(&store, &UserId::from("seller")).await.unwrap(), 450);
        assert_eq!(NoteStore::get(&store, &buyer).await.unwrap().len(), 1);
        assert!(market.unsettled_transfers().await.unwrap().is_empty());
    }
}
