//! Transfer intents
//!
//! A purchase moves currency with two independent balance updates. Each
//! transfer gets an intent record before either leg runs, and each leg is
//! marked on the record once it lands, so a partial transfer can be found
//! and finished later without applying a leg twice. The buyer's copy of the
//! note is prepared up front under an id derived from the transfer id, so
//! delivering it again replaces the first copy instead of adding another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Note;
use crate::types::{ListingId, NoteId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Written, no leg confirmed yet
    Pending,
    /// At least one leg failed; needs reconciliation
    Partial,
    Completed,
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Partial => write!(f, "partial"),
            TransferStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One side of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub id: Uuid,
    pub buyer: UserId,
    pub seller: UserId,
    pub listing_id: ListingId,
    pub amount: i64,
    #[serde(default)]
    pub debit_applied: bool,
    #[serde(default)]
    pub credit_applied: bool,
    pub status: TransferStatus,
    /// The note the buyer receives once both legs have landed
    pub copy: Note,
    /// Set once `copy` is in the buyer's library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_note: Option<NoteId>,
    /// Set once the listing's sales count includes this transfer
    #[serde(default)]
    pub sale_recorded: bool,
    pub created_at: DateTime<Utc>,
}

/// Note id of the copy delivered by transfer `id`
pub fn copy_id(id: &Uuid) -> NoteId {
    NoteId::from(format!("purchase-{}", id))
}

impl TransferIntent {
    /// `copy` is re-keyed with `copy_id` of the new transfer
    pub fn new(
        buyer: UserId,
        seller: UserId,
        listing_id: ListingId,
        amount: i64,
        mut copy: Note,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        copy.id = copy_id(&id);
        Self {
            id,
            buyer,
            seller,
            listing_id,
            amount,
            debit_applied: false,
            credit_applied: false,
            status: TransferStatus::Pending,
            copy,
            delivered_note: None,
            sale_recorded: false,
            created_at: now,
        }
    }

    /// Legs not yet confirmed, with the account and signed delta each applies
    pub fn outstanding_legs(&self) -> Vec<(Leg, UserId, i64)> {
        let mut legs = Vec::new();
        if !self.debit_applied {
            legs.push((Leg::Debit, self.buyer.clone(), -self.amount));
        }
        if !self.credit_applied {
            legs.push((Leg::Credit, self.seller.clone(), self.amount));
        }
        legs
    }

    pub fn mark_applied(&mut self, leg: Leg) {
        match leg {
            Leg::Debit => self.debit_applied = true,
            Leg::Credit => self.credit_applied = true,
        }
    }

    /// Recompute the status from the leg flags
    pub fn settle(&mut self) {
        self.status = if self.debit_applied && self.credit_applied {
            TransferStatus::Completed
        } else {
            TransferStatus::Partial
        };
    }

    pub fn is_complete(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// Every step done: both legs, delivery and the sales count
    pub fn is_settled(&self) -> bool {
        self.is_complete() && self.delivered_note.is_some() && self.sale_recorded
    }
}
