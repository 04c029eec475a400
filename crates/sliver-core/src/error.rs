use std::fmt;

/// Failure reported by a [`HabitRepository`](crate::HabitRepository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError(pub String);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence failure: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitError {
    /// Input rejected before any mutation took place.
    InvalidInput(String),
    /// The in-memory state changed but could not be written.
    Persistence(PersistenceError),
}

impl fmt::Display for HabitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabitError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            HabitError::Persistence(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HabitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HabitError::Persistence(e) => Some(e),
            HabitError::InvalidInput(_) => None,
        }
    }
}

impl From<PersistenceError> for HabitError {
    fn from(e: PersistenceError) -> Self {
        HabitError::Persistence(e)
    }
}

pub type Result<T> = std::result::Result<T, HabitError>;
