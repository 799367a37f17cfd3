//! Shared types used across modules
//!
//! Identifier newtypes live here so the model, engines and stores can share
//! them without depending on each other.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Account identifier
    UserId
);
string_id!(
    /// Note (word list) identifier
    NoteId
);
string_id!(
    /// Word identifier, unique within its note
    WordId
);
string_id!(
    /// Marketplace listing identifier
    ListingId
);
string_id!(
    /// Review identifier
    ReviewId
);

/// Resolve the acting user for an operation.
///
/// Engines never look up a "current user" on their own; callers resolve it
/// once and pass the id explicitly.
pub fn require_user(user: Option<&UserId>) -> CoreResult<&UserId> {
    user.ok_or(CoreError::NoCurrentUser)
}
