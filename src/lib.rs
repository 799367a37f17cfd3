//! Memonote - flashcard study and word-list marketplace
//!
//! A library for:
//! - Studying notes (word lists) as flashcards, with scored first and
//!   mastery sessions and unscored review sessions in between
//! - Spacing repetitions on a configurable schedule
//! - Publishing notes to a marketplace, buying them with a virtual currency
//!   and reviewing them
//!
//! Engines take explicit user ids and talk to storage only through the
//! async traits in [`store`].
//!
//! # Example
//!
//! ```ignore
//! use memonote::study::{Command, ExitAction};
//! use memonote::{InMemoryStore, NoteLibrary, StudySchedule, UserId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let library = NoteLibrary::new(Arc::new(InMemoryStore::new()));
//!     let user = UserId::from("alice");
//!     let note = library.create(&user, "Spanish", Default::default(), chrono::Utc::now()).await?;
//!     let mut session = library.study(&user, &note.id, StudySchedule::default()).await?;
//!     session.dispatch(Command::Exit(ExitAction::Finish), chrono::Utc::now());
//!     session.flush().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod model;
pub mod store;
pub mod study;
pub mod market;
pub mod library;

// Application layer
pub mod config;
pub mod cli;

// Re-export commonly used types for convenience
pub use error::{CoreError, CoreResult};

pub use types::{ListingId, NoteId, ReviewId, UserId, WordId};

pub use model::{Category, MarketListing, MasteryLevel, Note, Review, UserAccount, Word};

pub use store::{
    InMemoryStore,
    Snapshot,
    Stores,
    NoteStore,
    MarketStore,
    BalanceStore,
    ReviewStore,
    AccountStore,
    TransferLog,
};

pub use study::{StudyExecutor, StudySchedule, StudySessionState};

pub use market::{CatalogQuery, MarketSettings, Marketplace, PurchaseReceipt, SortKey};

pub use library::NoteLibrary;

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
