//! Integration tests for studying notes end to end:
//! - scored first session, unscored repetitions, mastery sessions
//! - persistence through the note store and the JSON snapshot

use chrono::{Duration, Utc};
use memonote::study::{Command, Direction, ExitAction, Phase, SessionKind};
use memonote::{Category, InMemoryStore, MasteryLevel, NoteLibrary, NoteStore, StudySchedule, UserId};
use std::sync::Arc;

async fn library_with_note(words: &[(&str, &str)]) -> anyhow::Result<(InMemoryStore, NoteLibrary, UserId, memonote::NoteId)> {
    let store = InMemoryStore::new();
    let library = NoteLibrary::new(Arc::new(store.clone()));
    let user = UserId::from("student");
    let note = library.create(&user, "Capitals", Category::Hobby, Utc::now()).await?;
    for (text, meaning) in words {
        library.add_word(&user, &note.id, text, meaning, Utc::now()).await?;
    }
    Ok((store, library, user, note.id))
}

// =====================================================================
// REPETITION CYCLE
// =====================================================================

#[tokio::test]
async fn test_full_repetition_cycle() -> anyhow::Result<()> {
    let (_store, library, user, note_id) =
        library_with_note(&[("France", "Paris"), ("Japan", "Tokyo")]).await?;
    let schedule = StudySchedule::default();

    // Session 1: scored, two easy words
    let mut session = library.study(&user, &note_id, schedule.clone()).await?;
    assert_eq!(session.session().kind(), SessionKind::Boundary);
    session.dispatch(Command::Rate(MasteryLevel::Easy), Utc::now());
    session.dispatch(Command::Rate(MasteryLevel::Easy), Utc::now());
    assert!(session.dispatch(Command::Exit(ExitAction::Finish), Utc::now()));
    session.flush().await?;

    let note = library.get(&user, &note_id).await?;
    assert_eq!(note.first_test_result, 1.0);
    assert_eq!(note.repeat_count, 1);

    // Sessions 2 and 3: unscored paging
    for expected in [2, 3] {
        let mut session = library.study(&user, &note_id, schedule.clone()).await?;
        assert_eq!(session.session().kind(), SessionKind::Interior);
        assert!(!session.dispatch(Command::Rate(MasteryLevel::Hard), Utc::now()));
        session.dispatch(Command::Advance(Direction::Next), Utc::now());
        session.dispatch(Command::Advance(Direction::Next), Utc::now());
        assert_eq!(session.session().phase(), Phase::Complete);
        assert!(!session.dispatch(Command::Exit(ExitAction::Finish), Utc::now()));
        assert!(session.dispatch(Command::Exit(ExitAction::End), Utc::now()));
        session.flush().await?;
        assert_eq!(library.get(&user, &note_id).await?.repeat_count, expected);
    }

    // Session 4: mastery, one hard and one normal
    let mut session = library.study(&user, &note_id, schedule.clone()).await?;
    assert_eq!(session.session().kind(), SessionKind::Boundary);
    session.dispatch(Command::Rate(MasteryLevel::Hard), Utc::now());
    session.dispatch(Command::Rate(MasteryLevel::Normal), Utc::now());
    session.dispatch(Command::Exit(ExitAction::Finish), Utc::now());
    session.flush().await?;

    let note = library.get(&user, &note_id).await?;
    assert_eq!(note.repeat_count, 4);
    assert_eq!(note.first_test_result, 1.0);
    assert_eq!(note.last_test_result, 0.25);
    let summary = note.mastery_summary();
    assert_eq!((summary.hard, summary.normal), (1, 1));
    Ok(())
}

#[tokio::test]
async fn test_reset_from_any_session() -> anyhow::Result<()> {
    let (_store, library, user, note_id) = library_with_note(&[("one", "1")]).await?;

    let mut session = library.study(&user, &note_id, StudySchedule::default()).await?;
    session.dispatch(Command::Rate(MasteryLevel::Normal), Utc::now());
    session.dispatch(Command::Exit(ExitAction::Finish), Utc::now());
    session.flush().await?;

    let mut session = library.study(&user, &note_id, StudySchedule::default()).await?;
    assert!(session.dispatch(Command::Exit(ExitAction::Reset), Utc::now()));
    assert!(!session.dispatch(Command::ToggleReveal, Utc::now()));
    session.flush().await?;

    let note = library.get(&user, &note_id).await?;
    assert_eq!(note.repeat_count, 0);
    assert_eq!(note.first_test_result, 0.0);
    assert_eq!(note.last_test_result, 0.0);
    assert!(note.is_due(Utc::now()));
    Ok(())
}

#[tokio::test]
async fn test_schedule_spacing() -> anyhow::Result<()> {
    let (_store, library, user, note_id) = library_with_note(&[("a", "b")]).await?;
    let schedule = StudySchedule::new(vec![3]);
    let start = Utc::now();

    let mut session = library.study(&user, &note_id, schedule).await?;
    session.dispatch(Command::Rate(MasteryLevel::Easy), start);
    session.dispatch(Command::Exit(ExitAction::Finish), start);
    session.flush().await?;

    assert!(library.due(&user, start + Duration::days(2)).await?.is_empty());
    assert_eq!(library.due(&user, start + Duration::days(3)).await?.len(), 1);
    Ok(())
}

// =====================================================================
// SNAPSHOT PERSISTENCE
// =====================================================================

#[tokio::test]
async fn test_study_progress_survives_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("library.json");
    let (store, library, user, note_id) = library_with_note(&[("hola", "hello"), ("adiós", "bye")]).await?;

    let mut session = library.study(&user, &note_id, StudySchedule::default()).await?;
    session.dispatch(Command::ToggleReversed, Utc::now());
    session.dispatch(Command::Rate(MasteryLevel::Normal), Utc::now());
    session.dispatch(Command::Rate(MasteryLevel::Easy), Utc::now());
    session.dispatch(Command::Exit(ExitAction::Finish), Utc::now());
    session.flush().await?;
    store.save(&path).await?;

    let reloaded = InMemoryStore::load(&path).await?;
    let notes = NoteStore::get(&reloaded, &user).await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].first_test_result, 0.75);
    assert_eq!(notes[0].words[1].text, "adiós");
    assert_eq!(notes[0].words[1].mastery_level, MasteryLevel::Easy);
    assert!(notes[0].next_study_timestamp.is_some());
    Ok(())
}
