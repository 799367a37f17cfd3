//! Study session state machine
//!
//! A session walks through one note's word list. The reducer is pure: it
//! takes the current state and a command and returns the next state plus
//! the effects the caller should carry out. It never talks to a store.
//!
//! ```text
//! Active(index, revealed) --rate last / advance past last--> Complete
//! Active | Complete --end | finish | reset--> Exited
//! ```

use serde::{Deserialize, Serialize};

use super::policy::{ExitAction, NoteDelta, SessionKind};
use crate::model::{MasteryLevel, Note, Word};
use crate::types::NoteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Active,
    Complete,
    /// An exit action was taken; every further command is ignored
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

/// Commands a user can issue during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleReveal,
    /// Swap which side of the word is shown as the prompt
    ToggleReversed,
    /// Scored sessions only
    Rate(MasteryLevel),
    /// Unscored sessions only
    Advance(Direction),
    Exit(ExitAction),
}

/// Emitted when a session exits. The note's owner applies `delta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFinished {
    pub note_id: NoteId,
    pub action: ExitAction,
    /// Set for finished scored sessions
    pub test_result: Option<f64>,
    pub delta: NoteDelta,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A word's rating changed and should be persisted
    WordRated { note_id: NoteId, index: usize, word: Word },
    SessionFinished(SessionFinished),
}

/// Result of one reducer call
#[derive(Debug, Clone)]
pub struct Step {
    pub state: StudySessionState,
    pub effects: Vec<Effect>,
    /// False when the command was not legal in the current state
    pub accepted: bool,
}

impl Step {
    fn accepted(state: StudySessionState, effects: Vec<Effect>) -> Self {
        Self { state, effects, accepted: true }
    }

    fn rejected(state: &StudySessionState) -> Self {
        Self { state: state.clone(), effects: Vec::new(), accepted: false }
    }
}

/// Ephemeral state for one study invocation
#[derive(Debug, Clone, PartialEq)]
pub struct StudySessionState {
    note: Note,
    kind: SessionKind,
    current_word_index: usize,
    is_answer_revealed: bool,
    is_reversed: bool,
    phase: Phase,
}

impl StudySessionState {
    /// Start a session on a copy of `note`. The session kind is decided here
    /// and never re-evaluated.
    pub fn start(note: Note) -> Self {
        let kind = SessionKind::classify(note.repeat_count);
        let phase = if note.words.is_empty() { Phase::Complete } else { Phase::Active };
        Self {
            note,
            kind,
            current_word_index: 0,
            is_answer_revealed: false,
            is_reversed: false,
            phase,
        }
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_word_index(&self) -> usize {
        self.current_word_index
    }

    pub fn is_answer_revealed(&self) -> bool {
        self.is_answer_revealed
    }

    pub fn is_reversed(&self) -> bool {
        self.is_reversed
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn current_word(&self) -> Option<&Word> {
        self.note.words.get(self.current_word_index)
    }

    /// Prompt side and, once revealed, the answer side of the current word
    pub fn card(&self) -> Option<(&str, Option<&str>)> {
        let word = self.current_word()?;
        let (front, back) = if self.is_reversed {
            (word.meaning.as_str(), word.text.as_str())
        } else {
            (word.text.as_str(), word.meaning.as_str())
        };
        Some((front, self.is_answer_revealed.then_some(back)))
    }

    /// 1-based position and total, for progress display
    pub fn progress(&self) -> (usize, usize) {
        let total = self.note.words.len();
        ((self.current_word_index + 1).min(total), total)
    }

    /// Fraction of the maximum score earned by the current ratings
    pub fn test_result(&self) -> f64 {
        test_result(&self.note.words)
    }

    fn last_index(&self) -> usize {
        self.note.words.len().saturating_sub(1)
    }

    fn move_to(&mut self, index: usize) {
        if index != self.current_word_index {
            self.current_word_index = index;
            self.is_answer_revealed = false;
        }
    }
}

/// `sum(score) / (word_count * MAX_SCORE)`, or 0.0 for an empty list
pub fn test_result(words: &[Word]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let earned: u32 = words.iter().map(|w| w.mastery_level.score()).sum();
    f64::from(earned) / (words.len() as f64 * f64::from(MasteryLevel::MAX_SCORE))
}

/// Apply one command to a session state
pub fn reduce(state: &StudySessionState, command: Command) -> Step {
    if state.phase == Phase::Exited {
        return Step::rejected(state);
    }

    match command {
        Command::ToggleReveal => {
            if state.phase != Phase::Active {
                return Step::rejected(state);
            }
            let mut next = state.clone();
            next.is_answer_revealed = !next.is_answer_revealed;
            Step::accepted(next, Vec::new())
        }
        Command::ToggleReversed => {
            if state.phase != Phase::Active {
                return Step::rejected(state);
            }
            let mut next = state.clone();
            next.is_reversed = !next.is_reversed;
            Step::accepted(next, Vec::new())
        }
        Command::Rate(level) => {
            if state.phase != Phase::Active || state.kind != SessionKind::Boundary {
                return Step::rejected(state);
            }
            let mut next = state.clone();
            let index = next.current_word_index;
            next.note.words[index].mastery_level = level;
            let effect = Effect::WordRated {
                note_id: next.note.id.clone(),
                index,
                word: next.note.words[index].clone(),
            };
            if index == next.last_index() {
                next.phase = Phase::Complete;
            } else {
                next.move_to(index + 1);
            }
            Step::accepted(next, vec![effect])
        }
        Command::Advance(direction) => {
            if state.phase != Phase::Active || state.kind != SessionKind::Interior {
                return Step::rejected(state);
            }
            let mut next = state.clone();
            let index = next.current_word_index;
            match direction {
                Direction::Next if index == next.last_index() => next.phase = Phase::Complete,
                Direction::Next => next.move_to(index + 1),
                Direction::Previous => next.move_to(index.saturating_sub(1)),
            }
            Step::accepted(next, Vec::new())
        }
        Command::Exit(action) => {
            if !action.allowed_for(state.kind) {
                return Step::rejected(state);
            }
            if action == ExitAction::Finish && state.phase != Phase::Complete {
                return Step::rejected(state);
            }
            let score = state.test_result();
            let finished = SessionFinished {
                note_id: state.note.id.clone(),
                action,
                test_result: (action == ExitAction::Finish).then_some(score),
                delta: NoteDelta::for_exit(state.note.repeat_count, action, score),
            };
            let mut next = state.clone();
            next.phase = Phase::Exited;
            Step::accepted(next, vec![Effect::SessionFinished(finished)])
        }
    }
}
