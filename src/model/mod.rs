//! Data model for notes, words and the marketplace
//!
//! Everything here is plain data. Behavior that changes these records lives
//! in the `study` and `market` engines.

pub mod account;
pub mod category;
pub mod listing;
pub mod note;
pub mod review;
pub mod word;

pub use account::UserAccount;
pub use category::Category;
pub use listing::MarketListing;
pub use note::{MasterySummary, Note};
pub use review::Review;
pub use word::{MasteryLevel, Word};
