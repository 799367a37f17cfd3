//! Error kinds surfaced by the study and marketplace engines

/// Errors returned by store calls and the engines that drive them.
///
/// Pure state transitions never produce these; only store interactions and
/// input validation do.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No user is signed in")]
    NoCurrentUser,

    #[error("Insufficient balance: have {balance}, need {price}")]
    InsufficientBalance { balance: i64, price: i64 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A store call failed. Any in-memory mutation made before the call is
    /// kept as-is.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound { entity, id: id.to_string() }
    }

    pub fn persistence(context: impl std::fmt::Display) -> Self {
        CoreError::PersistenceFailure(context.to_string())
    }

    /// Whether the user can fix this and retry without operator help
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::InsufficientBalance { .. } | CoreError::Validation(_))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
