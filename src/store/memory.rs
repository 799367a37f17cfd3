//! In-memory store with JSON snapshot persistence

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{AccountStore, BalanceStore, MarketStore, NoteStore, ReviewStore, TransferLog};
use crate::error::{CoreError, CoreResult};
use crate::market::journal::TransferIntent;
use crate::model::{MarketListing, Note, Review, UserAccount, Word};
use crate::study::policy::TestSlot;
use crate::types::{ListingId, NoteId, ReviewId, UserId};

/// Everything the store holds, in a serializable form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub accounts: BTreeMap<UserId, UserAccount>,
    #[serde(default)]
    pub notes: BTreeMap<UserId, Vec<Note>>,
    /// Catalog in insertion order
    #[serde(default)]
    pub listings: Vec<MarketListing>,
    #[serde(default)]
    pub reviews: BTreeMap<ListingId, Vec<Review>>,
    #[serde(default)]
    pub transfers: Vec<TransferIntent>,
}

/// Store backed by a shared in-memory `Snapshot`
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Snapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { inner: Arc::new(Mutex::new(snapshot)) }
    }

    /// Load a snapshot file, or start empty if it does not exist yet
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to `path`
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create snapshot directory")?;
        }
        let contents = {
            let snapshot = self.inner.lock().await;
            serde_json::to_string_pretty(&*snapshot).context("Failed to serialize snapshot")?
        };
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(())
    }

    /// Copy of the current contents
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.lock().await.clone()
    }
}

fn find_note<'a>(snapshot: &'a mut Snapshot, user: &UserId, note: &NoteId) -> CoreResult<&'a mut Note> {
    snapshot
        .notes
        .get_mut(user)
        .and_then(|notes| notes.iter_mut().find(|n| &n.id == note))
        .ok_or_else(|| CoreError::not_found("note", note))
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn get(&self, user: &UserId) -> CoreResult<Vec<Note>> {
        let snapshot = self.inner.lock().await;
        Ok(snapshot.notes.get(user).cloned().unwrap_or_default())
    }

    async fn put(&self, user: &UserId, note: &Note) -> CoreResult<()> {
        debug!("put note {} for {}", note.id, user);
        let mut snapshot = self.inner.lock().await;
        let notes = snapshot.notes.entry(user.clone()).or_default();
        match notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => notes.push(note.clone()),
        }
        Ok(())
    }

    async fn delete(&self, user: &UserId, note: &NoteId) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        let notes = snapshot
            .notes
            .get_mut(user)
            .ok_or_else(|| CoreError::not_found("note", note))?;
        let before = notes.len();
        notes.retain(|n| &n.id != note);
        if notes.len() == before {
            return Err(CoreError::not_found("note", note));
        }
        Ok(())
    }

    async fn increment_repeat_count(&self, user: &UserId, note: &NoteId) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        find_note(&mut snapshot, user, note)?.repeat_count += 1;
        Ok(())
    }

    async fn set_test_result(&self, user: &UserId, note: &NoteId, slot: TestSlot, value: f64) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        let note = find_note(&mut snapshot, user, note)?;
        match slot {
            TestSlot::First => note.first_test_result = value,
            TestSlot::Last => note.last_test_result = value,
        }
        Ok(())
    }

    async fn reset_repeat_count(&self, user: &UserId, note: &NoteId) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        let note = find_note(&mut snapshot, user, note)?;
        note.repeat_count = 0;
        note.first_test_result = 0.0;
        note.last_test_result = 0.0;
        Ok(())
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn list_all(&self) -> CoreResult<Vec<MarketListing>> {
        Ok(self.inner.lock().await.listings.clone())
    }

    async fn put(&self, listing: &MarketListing) -> CoreResult<()> {
        debug!("put listing {}", listing.id);
        let mut snapshot = self.inner.lock().await;
        match snapshot.listings.iter_mut().find(|l| l.id == listing.id) {
            Some(existing) => *existing = listing.clone(),
            None => snapshot.listings.push(listing.clone()),
        }
        Ok(())
    }

    async fn get_words(&self, listing: &ListingId) -> CoreResult<Vec<Word>> {
        let snapshot = self.inner.lock().await;
        snapshot
            .listings
            .iter()
            .find(|l| &l.id == listing)
            .map(|l| l.words.clone())
            .ok_or_else(|| CoreError::not_found("listing", listing))
    }

    async fn delete(&self, listing: &ListingId) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        let before = snapshot.listings.len();
        snapshot.listings.retain(|l| &l.id != listing);
        if snapshot.listings.len() == before {
            return Err(CoreError::not_found("listing", listing));
        }
        snapshot.reviews.remove(listing);
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    async fn get(&self, user: &UserId) -> CoreResult<i64> {
        let snapshot = self.inner.lock().await;
        snapshot
            .accounts
            .get(user)
            .map(|a| a.balance)
            .ok_or_else(|| CoreError::not_found("account", user))
    }

    async fn adjust(&self, user: &UserId, delta: i64) -> CoreResult<()> {
        debug!("adjust balance of {} by {}", user, delta);
        let mut snapshot = self.inner.lock().await;
        let account = snapshot
            .accounts
            .get_mut(user)
            .ok_or_else(|| CoreError::not_found("account", user))?;
        account.balance += delta;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn post(&self, listing: &ListingId, review: &Review) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        snapshot.reviews.entry(listing.clone()).or_default().push(review.clone());
        Ok(())
    }

    async fn list(&self, listing: &ListingId) -> CoreResult<Vec<Review>> {
        let snapshot = self.inner.lock().await;
        Ok(snapshot.reviews.get(listing).cloned().unwrap_or_default())
    }

    async fn delete(&self, listing: &ListingId, review: &ReviewId) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        let reviews = snapshot
            .reviews
            .get_mut(listing)
            .ok_or_else(|| CoreError::not_found("review", review))?;
        let before = reviews.len();
        reviews.retain(|r| &r.id != review);
        if reviews.len() == before {
            return Err(CoreError::not_found("review", review));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get(&self, user: &UserId) -> CoreResult<UserAccount> {
        let snapshot = self.inner.lock().await;
        snapshot
            .accounts
            .get(user)
            .cloned()
            .ok_or_else(|| CoreError::not_found("account", user))
    }

    async fn put(&self, account: &UserAccount) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        snapshot.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }
}

#[async_trait]
impl TransferLog for InMemoryStore {
    async fn put_intent(&self, intent: &TransferIntent) -> CoreResult<()> {
        let mut snapshot = self.inner.lock().await;
        match snapshot.transfers.iter_mut().find(|t| t.id == intent.id) {
            Some(existing) => *existing = intent.clone(),
            None => snapshot.transfers.push(intent.clone()),
        }
        Ok(())
    }

    async fn get_intent(&self, id: &Uuid) -> CoreResult<TransferIntent> {
        let snapshot = self.inner.lock().await;
        snapshot
            .transfers
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("transfer", id))
    }

    async fn list_intents(&self) -> CoreResult<Vec<TransferIntent>> {
        Ok(self.inner.lock().await.transfers.clone())
    }
}
