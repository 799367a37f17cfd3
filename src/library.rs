//! A user's note library
//!
//! Plain CRUD over `NoteStore`, plus the entry point that opens a study
//! session on a stored note.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::model::{Category, Note, Word};
use crate::store::NoteStore;
use crate::study::{StudyExecutor, StudySchedule};
use crate::types::{NoteId, UserId, WordId};

pub struct NoteLibrary {
    notes: Arc<dyn NoteStore>,
}

impl NoteLibrary {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }

    pub async fn list(&self, user: &UserId) -> CoreResult<Vec<Note>> {
        self.notes.get(user).await
    }

    pub async fn get(&self, user: &UserId, id: &NoteId) -> CoreResult<Note> {
        self.notes
            .get(user)
            .await?
            .into_iter()
            .find(|n| &n.id == id)
            .ok_or_else(|| CoreError::not_found("note", id))
    }

    /// Notes whose next study time has passed
    pub async fn due(&self, user: &UserId, now: DateTime<Utc>) -> CoreResult<Vec<Note>> {
        Ok(self.notes.get(user).await?.into_iter().filter(|n| n.is_due(now)).collect())
    }

    pub async fn create(
        &self,
        user: &UserId,
        title: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> CoreResult<Note> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("note title cannot be empty".to_string()));
        }
        let note = Note::new(user.clone(), title, category, now);
        self.notes.put(user, &note).await?;
        info!("Created note {} for {}", note.id, user);
        Ok(note)
    }

    /// Append a word. New words start unrated.
    pub async fn add_word(
        &self,
        user: &UserId,
        id: &NoteId,
        text: &str,
        meaning: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Word> {
        if text.trim().is_empty() {
            return Err(CoreError::Validation("word text cannot be empty".to_string()));
        }
        let mut note = self.get(user, id).await?;
        let word = Word::new(text.trim(), meaning.trim());
        note.words.push(word.clone());
        note.update_timestamp = now;
        self.notes.put(user, &note).await?;
        Ok(word)
    }

    /// Change a word's text and meaning, keeping its rating
    pub async fn edit_word(
        &self,
        user: &UserId,
        id: &NoteId,
        word_id: &WordId,
        text: &str,
        meaning: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut note = self.get(user, id).await?;
        let word = note
            .words
            .iter_mut()
            .find(|w| &w.id == word_id)
            .ok_or_else(|| CoreError::not_found("word", word_id))?;
        word.text = text.trim().to_string();
        word.meaning = meaning.trim().to_string();
        note.update_timestamp = now;
        self.notes.put(user, &note).await
    }

    pub async fn remove_word(
        &self,
        user: &UserId,
        id: &NoteId,
        word_id: &WordId,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut note = self.get(user, id).await?;
        let before = note.words.len();
        note.words.retain(|w| &w.id != word_id);
        if note.words.len() == before {
            return Err(CoreError::not_found("word", word_id));
        }
        note.update_timestamp = now;
        self.notes.put(user, &note).await
    }

    pub async fn delete(&self, user: &UserId, id: &NoteId) -> CoreResult<()> {
        self.notes.delete(user, id).await?;
        info!("Deleted note {} for {}", id, user);
        Ok(())
    }

    /// Open a study session on a stored note
    pub async fn study(&self, user: &UserId, id: &NoteId, schedule: StudySchedule) -> CoreResult<StudyExecutor> {
        let note = self.get(user, id).await?;
        Ok(StudyExecutor::start(self.notes.clone(), user.clone(), note, schedule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MasteryLevel;
    use crate::store::{InMemoryStore, MockNoteStore};
    use crate::study::Command;
    use chrono::Duration;

    fn library() -> NoteLibrary {
        NoteLibrary::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_and_add_words() {
        let lib = library();
        let user = UserId::from("u1");
        let note = lib.create(&user, "  Kanji  ", Category::Language, Utc::now()).await.unwrap();
        assert_eq!(note.title, "Kanji");

        lib.add_word(&user, &note.id, "山", "mountain", Utc::now()).await.unwrap();
        let word = lib.add_word(&user, &note.id, "川", "river", Utc::now()).await.unwrap();
        assert_eq!(word.mastery_level, MasteryLevel::Unrated);

        let stored = lib.get(&user, &note.id).await.unwrap();
        assert_eq!(stored.word_count(), 2);
        assert_eq!(stored.words[1].text, "川");

        // Another user's library is separate
        assert!(lib.list(&UserId::from("u2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation() {
        let lib = library();
        let user = UserId::from("u1");
        assert!(matches!(
            lib.create(&user, "   ", Category::Other, Utc::now()).await,
            Err(CoreError::Validation(_))
        ));
        let note = lib.create(&user, "Empty", Category::Other, Utc::now()).await.unwrap();
        assert!(matches!(
            lib.add_word(&user, &note.id, "", "x", Utc::now()).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            lib.get(&user, &NoteId::from("nope")).await,
            Err(CoreError::NotFound { entity: "note", .. })
        ));
    }

    #[tokio::test]
    async fn test_edit_and_remove_word() {
        let lib = library();
        let user = UserId::from("u1");
        let note = lib.create(&user, "Verbs", Category::Language, Utc::now()).await.unwrap();
        let word = lib.add_word(&user, &note.id, "corer", "to run", Utc::now()).await.unwrap();

        lib.edit_word(&user, &note.id, &word.id, "correr", "to run", Utc::now()).await.unwrap();
        assert_eq!(lib.get(&user, &note.id).await.unwrap().words[0].text, "correr");

        lib.remove_word(&user, &note.id, &word.id, Utc::now()).await.unwrap();
        assert!(lib.get(&user, &note.id).await.unwrap().words.is_empty());
        assert!(matches!(
            lib.remove_word(&user, &note.id, &word.id, Utc::now()).await,
            Err(CoreError::NotFound { entity: "word", .. })
        ));
    }

    #[tokio::test]
    async fn test_due_notes() {
        let lib = library();
        let user = UserId::from("u1");
        let now = Utc::now();
        let note = lib.create(&user, "Due", Category::Exam, now).await.unwrap();
        lib.add_word(&user, &note.id, "a", "b", now).await.unwrap();

        let mut exec = lib.study(&user, &note.id, StudySchedule::new(vec![1])).await.unwrap();
        exec.dispatch(Command::Rate(MasteryLevel::Normal), now);
        exec.dispatch(Command::Exit(crate::study::ExitAction::Finish), now);
        exec.flush().await.unwrap();

        assert!(lib.due(&user, now).await.unwrap().is_empty());
        assert_eq!(lib.due(&user, now + Duration::days(2)).await.unwrap().len(), 1);
    }

    #[test]
    fn test_delete_propagates_store_failure() {
        let mut notes = MockNoteStore::new();
        notes
            .expect_delete()
            .returning(|_, _| Err(CoreError::persistence("disk full")));
        let lib = NoteLibrary::new(Arc::new(notes));

        let result = tokio_test::block_on(lib.delete(&UserId::from("u1"), &NoteId::from("n1")));
        assert!(matches!(result, Err(CoreError::PersistenceFailure(_))));
    }
}
