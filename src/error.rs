use crate::domain::order::OrderError;

// ============================================================================
// Error Taxonomy
// ============================================================================
//
// ValidationError  bad input, shown to the user, nothing changed
// OrderError       order business rule, shown to the user, nothing changed
// BackendError     remote call failed, logged, caller keeps last-known state
// StorageError     local device storage failed
//
// None of these is fatal to the process.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a table before adding items")]
    NoTableSelected,

    #[error("No order is selected")]
    NoOrderSelected,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidNumber {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Unknown menu item {0}")]
    UnknownMenuItem(i64),

    #[error("Unknown order {0}")]
    UnknownOrder(String),

    #[error("Unknown kitchen order {0}")]
    UnknownKitchenOrder(i64),

    #[error("Table {table} is outside 1..={max}")]
    TableOutOfRange { table: u32, max: u32 },

    #[error("No switch is waiting for confirmation")]
    NoPendingSwitch,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("An account with this email or username already exists")]
    AccountExists,
}

/// Failure of the thin REST helper. Only the status is kept on non-2xx.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Rest(#[from] RestError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] sqlx::Error),

    #[error("Unexpected {table} row: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("{table} row not found")]
    NotFound { table: &'static str },

    #[error("Backend unavailable")]
    Unavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PosError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PosError {
    /// Validation and business-rule failures get shown as-is; the rest get a
    /// generic notification and a log line.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Order(_))
    }
}

pub type PosResult<T> = Result<T, PosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_split() {
        assert!(PosError::from(ValidationError::NoTableSelected).is_user_facing());
        assert!(PosError::from(OrderError::EmptyOrder).is_user_facing());
        assert!(!PosError::from(BackendError::Unavailable).is_user_facing());
    }

    #[test]
    fn test_status_error_message() {
        let err = BackendError::from(RestError::Status(404));
        assert_eq!(err.to_string(), "HTTP error! status: 404");
    }
}
