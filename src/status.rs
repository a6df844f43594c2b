//! Status codes and the `Result` alias used at every API boundary (spec §4.M, §7).
//!
//! Unlike the teacher crate, which lets SQL errors unwind through
//! `std::panic::catch_unwind` (see the historical `go`/`run` pattern), every
//! operation here returns a `KdbResult<T>` — no panics cross a public
//! boundary.

use std::fmt;

/// Coarse error taxonomy shared by every engine, the parser, and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    FailedPrecondition,
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// A `{code, message}` pair. Implements [`std::error::Error`] via `thiserror`
/// so it composes with `?` the way the rest of the crate expects.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

/// Result alias used throughout the crate in place of a thrown exception.
pub type KdbResult<T> = Result<T, Status>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_taxonomy_name() {
        assert_eq!(StatusCode::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(StatusCode::FailedPrecondition.to_string(), "FAILED_PRECONDITION");
    }

    #[test]
    fn status_carries_message() {
        let s = Status::invalid_argument("bad column");
        assert_eq!(s.code, StatusCode::InvalidArgument);
        assert_eq!(s.message, "bad column");
        assert_eq!(s.to_string(), "INVALID_ARGUMENT: bad column");
    }
}
