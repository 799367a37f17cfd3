//! Flashcard study
//!
//! `policy` holds the repetition rules, `session` the pure session state
//! machine, and `executor` applies a session's effects to the note and the
//! note store.

pub mod executor;
pub mod policy;
pub mod session;

pub use executor::StudyExecutor;
pub use policy::{ExitAction, NoteDelta, SessionKind, StudySchedule, MASTERY_REPEAT_COUNT};
pub use session::{reduce, Command, Direction, Effect, Phase, SessionFinished, Step, StudySessionState};
