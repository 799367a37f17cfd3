//! Study executor
//!
//! Owns the note being studied, feeds commands to the session reducer and
//! carries out the effects it returns. Store writes go through a single
//! queue drained by a background task, so they land in the order they were
//! issued. `flush` waits for the queue; `cancel` (or dropping the executor)
//! abandons whatever has not been written yet. In-memory changes are never
//! rolled back either way.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::policy::{RepeatChange, StudySchedule, TestSlot};
use super::session::{self, Command, Effect, StudySessionState, SessionFinished};
use crate::error::{CoreError, CoreResult};
use crate::model::Note;
use crate::store::NoteStore;
use crate::types::{NoteId, UserId};

/// A queued store write
#[derive(Debug, Clone)]
enum WriteOp {
    PutNote(Note),
    SetTestResult(NoteId, TestSlot, f64),
    IncrementRepeatCount(NoteId),
    ResetRepeatCount(NoteId),
}

impl WriteOp {
    async fn execute(&self, notes: &dyn NoteStore, user: &UserId) -> CoreResult<()> {
        match self {
            WriteOp::PutNote(note) => notes.put(user, note).await,
            WriteOp::SetTestResult(id, slot, value) => notes.set_test_result(user, id, *slot, *value).await,
            WriteOp::IncrementRepeatCount(id) => notes.increment_repeat_count(user, id).await,
            WriteOp::ResetRepeatCount(id) => notes.reset_repeat_count(user, id).await,
        }
    }
}

async fn drain_writes(
    notes: Arc<dyn NoteStore>,
    user: UserId,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
) -> Vec<CoreError> {
    let mut failures = Vec::new();
    while let Some(op) = rx.recv().await {
        debug!("Study write for {}: {:?}", user, op);
        if let Err(e) = op.execute(notes.as_ref(), &user).await {
            warn!("Study write failed for {}: {}", user, e);
            failures.push(e);
        }
    }
    failures
}

/// Runs one study session for one user's note
pub struct StudyExecutor {
    user: UserId,
    note: Note,
    session: StudySessionState,
    schedule: StudySchedule,
    writes: Option<mpsc::UnboundedSender<WriteOp>>,
    writer: Option<JoinHandle<Vec<CoreError>>>,
    finished: Option<SessionFinished>,
}

impl StudyExecutor {
    /// Start a session on `note`. Must be called inside a tokio runtime.
    pub fn start(notes: Arc<dyn NoteStore>, user: UserId, note: Note, schedule: StudySchedule) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(drain_writes(notes, user.clone(), rx));
        let session = StudySessionState::start(note.clone());
        info!(
            "Study session started on note {} ({:?}, {} words)",
            note.id,
            session.kind(),
            note.word_count()
        );
        Self {
            user,
            note,
            session,
            schedule,
            writes: Some(tx),
            writer: Some(writer),
            finished: None,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn session(&self) -> &StudySessionState {
        &self.session
    }

    /// The parent-owned note with every applied change
    pub fn note(&self) -> &Note {
        &self.note
    }

    /// Set once an exit action has been applied
    pub fn finished(&self) -> Option<&SessionFinished> {
        self.finished.as_ref()
    }

    /// Apply a command. Returns false if the session rejected it.
    pub fn dispatch(&mut self, command: Command, now: DateTime<Utc>) -> bool {
        let step = session::reduce(&self.session, command);
        if !step.accepted {
            debug!("Rejected {:?} in phase {:?}", command, self.session.phase());
            return false;
        }
        self.session = step.state;
        for effect in step.effects {
            self.apply(effect, now);
        }
        true
    }

    fn apply(&mut self, effect: Effect, now: DateTime<Utc>) {
        match effect {
            Effect::WordRated { note_id, index, word } => {
                if note_id != self.note.id {
                    return;
                }
                if let Some(slot) = self.note.words.get_mut(index).filter(|w| w.id == word.id) {
                    *slot = word;
                    self.note.update_timestamp = now;
                    self.enqueue(WriteOp::PutNote(self.note.clone()));
                }
            }
            Effect::SessionFinished(finished) => {
                finished.delta.apply(&mut self.note);
                self.note.next_study_timestamp = self.schedule.next_after(self.note.repeat_count, now);
                self.note.update_timestamp = now;

                let id = self.note.id.clone();
                match finished.delta.repeat {
                    RepeatChange::Increment => {
                        if let Some((slot, value)) = finished.delta.test_result {
                            self.enqueue(WriteOp::SetTestResult(id.clone(), slot, value));
                        }
                        self.enqueue(WriteOp::IncrementRepeatCount(id));
                    }
                    RepeatChange::Reset => self.enqueue(WriteOp::ResetRepeatCount(id)),
                }
                // Counter writes go first for backends that keep the counters
                // themselves. The full note follows with the same counter values
                // plus the next study time and update timestamp, which have no
                // granular write.
                self.enqueue(WriteOp::PutNote(self.note.clone()));

                info!(
                    "Study session on note {} ended with {:?} (repeat count now {})",
                    self.note.id, finished.action, self.note.repeat_count
                );
                self.finished = Some(finished);
            }
        }
    }

    fn enqueue(&self, op: WriteOp) {
        match &self.writes {
            Some(tx) if tx.send(op).is_ok() => {}
            _ => warn!("Study writes for note {} are closed; dropping write", self.note.id),
        }
    }

    /// Wait for every queued write. Reports failures without undoing the
    /// in-memory changes.
    pub async fn flush(&mut self) -> CoreResult<()> {
        self.writes.take();
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let failures = match writer.await {
            Ok(failures) => failures,
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => return Err(CoreError::persistence(format!("study writer crashed: {}", e))),
        };
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(CoreError::persistence(format!(
                "{} study write(s) failed for note {}; first: {}",
                failures.len(),
                self.note.id,
                first
            ))),
        }
    }

    /// Abandon writes that have not run yet
    pub fn cancel(&mut self) {
        self.writes.take();
        if let Some(writer) = self.writer.take() {
            writer.abort();
            debug!("Cancelled pending study writes for note {}", self.note.id);
        }
    }

}

impl Drop for StudyExecutor {
    fn drop(&mut self) {
        // Leaving without flushing cancels whatever is still queued
        self.cancel();
    }
}
