//! # Error Module
//!
//! A single error type for every core operation. Each variant carries a
//! human-readable reason; [`RgmsError::kind`] gives the machine-readable kind
//! that outer layers map onto exit codes or HTTP statuses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, RgmsError>;

/// Errors raised by core operations.
///
/// Every operation checks all of its preconditions before mutating state,
/// so an `Err` always means nothing was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RgmsError {
    /// The department budget cannot cover the requested amount.
    #[error("insufficient department funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: crate::Amount,
        available: crate::Amount,
    },

    /// Grant start date is not strictly before its end date.
    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Semantically invalid input (negative amount, empty title, bad score).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Expenditure would push total spend past the allocation.
    #[error("budget exceeded: spending {requested} leaves only {remaining} of {allocated}")]
    BudgetExceeded {
        requested: crate::Amount,
        remaining: crate::Amount,
        allocated: crate::Amount,
    },

    /// Referenced proposal, grant, budget or actor does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested status change is not in the transition table.
    #[error("illegal state transition: {0}")]
    IllegalStateTransition(String),

    /// The reviewer already evaluated this proposal.
    #[error("{reviewer} already evaluated {proposal}")]
    DuplicateEvaluation {
        reviewer: crate::ActorId,
        proposal: crate::ProposalId,
    },

    /// The actor lacks the role or ownership the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A concurrent writer changed the state first.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Snapshot encoding or storage backend failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientFunds,
    InvalidDateRange,
    InvalidInput,
    BudgetExceeded,
    NotFound,
    IllegalStateTransition,
    DuplicateEvaluation,
    Unauthorized,
    Conflict,
    Persistence,
}

impl RgmsError {
    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidDateRange { .. } => ErrorKind::InvalidDateRange,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IllegalStateTransition(_) => ErrorKind::IllegalStateTransition,
            Self::DuplicateEvaluation { .. } => ErrorKind::DuplicateEvaluation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub(crate) fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<postcard::Error> for RgmsError {
    fn from(err: postcard::Error) -> Self {
        Self::Persistence(format!("postcard: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Amount, ProposalId};

    #[test]
    fn display_carries_reason() {
        let err = RgmsError::InsufficientFunds {
            requested: Amount::from_units(60_000),
            available: Amount::from_units(50_000),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(
            err.to_string(),
            "insufficient department funds: requested 60000.00, available 50000.00"
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = RgmsError::not_found(ProposalId(7));
        assert_eq!(err.to_string(), "proposal#7 not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
