//! # Actors and Capabilities
//!
//! Researchers submit, reviewers evaluate, HODs approve. Instead of comparing
//! role strings at runtime, each operation takes a capability trait that only
//! the matching handle implements. A handle can only be obtained from an
//! [`Actor`] whose role matches, so the role check happens once, at dispatch.

use crate::error::{Result, RgmsError};
use crate::ActorId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a registered actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Researcher,
    Reviewer,
    Hod,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Researcher => "researcher",
            Self::Reviewer => "reviewer",
            Self::Hod => "hod",
        })
    }
}

impl FromStr for Role {
    type Err = RgmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "researcher" => Ok(Self::Researcher),
            "reviewer" => Ok(Self::Reviewer),
            "hod" => Ok(Self::Hod),
            other => Err(RgmsError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// A registered user of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
    pub department: String,
}

impl Actor {
    /// Capability handle for proposal submission.
    pub fn as_researcher(&self) -> Result<ResearcherHandle> {
        self.require(Role::Researcher).map(|id| ResearcherHandle { id })
    }

    /// Capability handle for evaluation.
    pub fn as_reviewer(&self) -> Result<ReviewerHandle> {
        self.require(Role::Reviewer).map(|id| ReviewerHandle { id })
    }

    /// Capability handle for approval, rejection, top-ups and interventions.
    pub fn as_hod(&self) -> Result<HodHandle> {
        self.require(Role::Hod).map(|id| HodHandle { id })
    }

    fn require(&self, role: Role) -> Result<ActorId> {
        if self.role == role {
            Ok(self.id)
        } else {
            Err(RgmsError::Unauthorized(format!(
                "{} is a {}, operation requires a {}",
                self.id, self.role, role
            )))
        }
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// May create, resubmit and report on proposals. Required role: Researcher.
pub trait Submitter {
    fn submitter_id(&self) -> ActorId;
}

/// May evaluate proposals. Required role: Reviewer.
pub trait Evaluator {
    fn evaluator_id(&self) -> ActorId;
}

/// May approve, reject, top up and intervene. Required role: HOD.
pub trait Approver {
    fn approver_id(&self) -> ActorId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearcherHandle {
    id: ActorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewerHandle {
    id: ActorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HodHandle {
    id: ActorId,
}

impl Submitter for ResearcherHandle {
    fn submitter_id(&self) -> ActorId {
        self.id
    }
}

impl Evaluator for ReviewerHandle {
    fn evaluator_id(&self) -> ActorId {
        self.id
    }
}

impl Approver for HodHandle {
    fn approver_id(&self) -> ActorId {
        self.id
    }
}
