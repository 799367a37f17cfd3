//! Repetition policy
//!
//! Decides whether a session is scored from the note's repeat count, and
//! encodes what each exit action does to the note's study history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Note;

/// Repeat count from which every session is a scored mastery session
pub const MASTERY_REPEAT_COUNT: u32 = 3;

/// First session (repeat 0) and every session from the fourth on are scored.
pub fn is_boundary_session(repeat_count: u32) -> bool {
    repeat_count == 0 || repeat_count >= MASTERY_REPEAT_COUNT
}

/// Which command set a session accepts. Fixed when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// Scored: every word is rated, the session ends with a test result
    Boundary,
    /// Unscored: plain paging through the word list
    Interior,
}

impl SessionKind {
    pub fn classify(repeat_count: u32) -> Self {
        if is_boundary_session(repeat_count) {
            SessionKind::Boundary
        } else {
            SessionKind::Interior
        }
    }

    pub fn is_scored(self) -> bool {
        self == SessionKind::Boundary
    }
}

/// User-initiated ways to leave a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitAction {
    /// Leave an interior session, counting it as a repetition
    End,
    /// Leave a completed boundary session, recording its test result
    Finish,
    /// Clear the note's study history
    Reset,
}

impl ExitAction {
    /// Whether this exit is legal for a session of `kind`
    pub fn allowed_for(self, kind: SessionKind) -> bool {
        match self {
            ExitAction::End => kind == SessionKind::Interior,
            ExitAction::Finish => kind == SessionKind::Boundary,
            ExitAction::Reset => true,
        }
    }
}

/// Which test-result field a scored session writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestSlot {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatChange {
    Increment,
    Reset,
}

/// Change to a note's study history produced by a session exit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteDelta {
    pub repeat: RepeatChange,
    pub test_result: Option<(TestSlot, f64)>,
}

impl NoteDelta {
    /// Build the delta for `action` on a note currently at `repeat_count`.
    pub fn for_exit(repeat_count: u32, action: ExitAction, test_result: f64) -> Self {
        match action {
            ExitAction::End => Self { repeat: RepeatChange::Increment, test_result: None },
            ExitAction::Finish => {
                let slot = if repeat_count == 0 { TestSlot::First } else { TestSlot::Last };
                Self {
                    repeat: RepeatChange::Increment,
                    test_result: Some((slot, test_result)),
                }
            }
            ExitAction::Reset => Self { repeat: RepeatChange::Reset, test_result: None },
        }
    }

    /// Apply to the parent-owned note
    pub fn apply(&self, note: &mut Note) {
        match self.repeat {
            RepeatChange::Reset => note.reset_progress(),
            RepeatChange::Increment => {
                if let Some((slot, value)) = self.test_result {
                    match slot {
                        TestSlot::First => note.first_test_result = value,
                        TestSlot::Last => note.last_test_result = value,
                    }
                }
                note.repeat_count += 1;
            }
        }
    }
}

/// Spacing between repetitions, in days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySchedule {
    intervals_days: Vec<u32>,
}

impl Default for StudySchedule {
    fn default() -> Self {
        Self { intervals_days: vec![1, 2, 4, 7, 15] }
    }
}

impl StudySchedule {
    pub fn new(intervals_days: Vec<u32>) -> Self {
        Self { intervals_days }
    }

    /// When a note that has completed `repeat_count` sessions is next due.
    /// Counts past the end of the table reuse the last interval. `None` when
    /// the note has no history or the table is empty.
    pub fn next_after(&self, repeat_count: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if repeat_count == 0 {
            return None;
        }
        let idx = (repeat_count as usize - 1).min(self.intervals_days.len().checked_sub(1)?);
        Some(now + Duration::days(i64::from(self.intervals_days[idx])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use crate::types::UserId;

    #[test]
    fn test_boundary_table() {
        assert!(is_boundary_session(0));
        assert!(!is_boundary_session(1));
        assert!(!is_boundary_session(2));
        assert!(is_boundary_session(3));
        assert!(is_boundary_session(10));
    }

    #[test]
    fn test_exit_actions_by_kind() {
        assert!(ExitAction::End.allowed_for(SessionKind::Interior));
        assert!(!ExitAction::End.allowed_for(SessionKind::Boundary));
        assert!(ExitAction::Finish.allowed_for(SessionKind::Boundary));
        assert!(!ExitAction::Finish.allowed_for(SessionKind::Interior));
        assert!(ExitAction::Reset.allowed_for(SessionKind::Interior));
    }

    #[test]
    fn test_finish_writes_first_then_last() {
        let mut note = Note::new(UserId::from("u"), "n", Category::Exam, Utc::now());

        NoteDelta::for_exit(note.repeat_count, ExitAction::Finish, 0.5).apply(&mut note);
        assert_eq!(note.first_test_result, 0.5);
        assert_eq!(note.repeat_count, 1);

        NoteDelta::for_exit(note.repeat_count, ExitAction::End, 0.0).apply(&mut note);
        NoteDelta::for_exit(note.repeat_count, ExitAction::End, 0.0).apply(&mut note);
        NoteDelta::for_exit(note.repeat_count, ExitAction::Finish, 0.75).apply(&mut note);
        assert_eq!(note.first_test_result, 0.5);
        assert_eq!(note.last_test_result, 0.75);
        assert_eq!(note.repeat_count, 4);
    }

    #[test]
    fn test_reset_zeroes_regardless_of_history() {
        let mut note = Note::new(UserId::from("u"), "n", Category::Exam, Utc::now());
        note.repeat_count = 7;
        note.first_test_result = 0.3;
        note.last_test_result = 1.0;
        NoteDelta::for_exit(note.repeat_count, ExitAction::Reset, 0.9).apply(&mut note);
        assert_eq!(note.repeat_count, 0);
        assert_eq!(note.first_test_result, 0.0);
        assert_eq!(note.last_test_result, 0.0);
    }

    #[test]
    fn test_schedule() {
        let now = Utc::now();
        let schedule = StudySchedule::new(vec![1, 3]);
        assert_eq!(schedule.next_after(0, now), None);
        assert_eq!(schedule.next_after(1, now), Some(now + Duration::days(1)));
        assert_eq!(schedule.next_after(2, now), Some(now + Duration::days(3)));
        assert_eq!(schedule.next_after(9, now), Some(now + Duration::days(3)));
        assert_eq!(StudySchedule::new(vec![]).next_after(1, now), None);
    }
}
