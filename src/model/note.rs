//! Notes: a user's ordered word list plus its study history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, MasteryLevel, Word};
use crate::types::{NoteId, UserId};

/// A word list owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub category: Category,
    pub owner_user_id: UserId,
    /// Completed study sessions since creation or the last reset
    #[serde(default)]
    pub repeat_count: u32,
    /// Result of the first scored session, in [0, 1]
    #[serde(default)]
    pub first_test_result: f64,
    /// Result of the most recent mastery session, in [0, 1]
    #[serde(default)]
    pub last_test_result: f64,
    pub update_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_study_timestamp: Option<DateTime<Utc>>,
    /// Set when the note was delivered by a marketplace purchase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_purchase_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<i64>,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Note {
    pub fn new(owner: UserId, title: impl Into<String>, category: Category, now: DateTime<Utc>) -> Self {
        Self {
            id: NoteId::generate(),
            title: title.into(),
            category,
            owner_user_id: owner,
            repeat_count: 0,
            first_test_result: 0.0,
            last_test_result: 0.0,
            update_timestamp: now,
            next_study_timestamp: None,
            market_purchase_timestamp: None,
            purchase_price: None,
            words: Vec::new(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_purchased(&self) -> bool {
        self.market_purchase_timestamp.is_some()
    }

    /// Whether the note is due for study at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_study_timestamp.map_or(true, |at| at <= now)
    }

    /// Zero the study history. Repeat count and both test results always
    /// reset together.
    pub fn reset_progress(&mut self) {
        self.repeat_count = 0;
        self.first_test_result = 0.0;
        self.last_test_result = 0.0;
        self.next_study_timestamp = None;
    }

    /// Count of words at each mastery level
    pub fn mastery_summary(&self) -> MasterySummary {
        let mut summary = MasterySummary::default();
        for word in &self.words {
            match word.mastery_level {
                MasteryLevel::Unrated => summary.unrated += 1,
                MasteryLevel::Hard => summary.hard += 1,
                MasteryLevel::Normal => summary.normal += 1,
                MasteryLevel::Easy => summary.easy += 1,
            }
        }
        summary
    }
}

/// Per-level word counts for a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterySummary {
    pub unrated: usize,
    pub hard: usize,
    pub normal: usize,
    pub easy: usize,
}

impl std::fmt::Display for MasterySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "easy {} / normal {} / hard {} / unrated {}",
            self.easy, self.normal, self.hard, self.unrated
        )
    }
}
