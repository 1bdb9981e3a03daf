//! Errors for reads against host-owned state.
//!
//! Host reads fail constantly while the game UI is transitioning, so the
//! read error distinguishes "not there right now" from "the host handed us
//! something inconsistent". Neither is fatal to a frame.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Handle is stale, component missing or element not loaded yet
    #[error("{0} is unavailable")]
    Unavailable(&'static str),

    /// Host returned data that contradicts itself
    #[error("inconsistent host state: {0}")]
    Logic(String),
}

pub type ReadResult<T> = Result<T, ReadError>;

pub trait ReadResultExt<T> {
    /// Collapse a read into `Option`, treating every failure as absence.
    ///
    /// Unavailability is silent; logic errors get a warning with `what` as
    /// context so they show up in the log without interrupting the frame.
    fn absent_on_error(self, what: &str) -> Option<T>;
}

impl<T> ReadResultExt<T> for ReadResult<T> {
    fn absent_on_error(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(ReadError::Unavailable(_)) => None,
            Err(ReadError::Logic(message)) => {
                tracing::warn!(read = what, %message, "Host read returned inconsistent data");
                None
            }
        }
    }
}

/// Failure reported by the host input primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input injection failed: {0}")]
pub struct InputError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_on_error() {
        assert_eq!(Ok::<_, ReadError>(3).absent_on_error("x"), Some(3));
        assert_eq!(
            Err::<u8, _>(ReadError::Unavailable("inventory")).absent_on_error("x"),
            None
        );
        assert_eq!(
            Err::<u8, _>(ReadError::Logic("bad".into())).absent_on_error("x"),
            None
        );
    }
}
