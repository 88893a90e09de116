//! # Form Validation
//!
//! Untyped request input (CLI arguments, JSON bodies) arrives as strings.
//! A [`FormValidator`] coerces it into the typed values the core expects,
//! rejecting malformed input with `InvalidInput` before any core call.
//! Semantic checks (negative amounts, score range, date order) stay in the
//! core.

use crate::dispatch::Command;
use chrono::NaiveDate;
use rgms_core::{
    Amount, GrantId, GrantTerms, ProjectHealth, ProposalId, ReportDraft, Result, RgmsError, Role,
};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// RAW INPUT
// =============================================================================

/// A raw form value. JSON clients may send it as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Field(pub String);

impl Field {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// A workflow request before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CommandForm {
    Submit {
        title: String,
        requested: Field,
        #[serde(default)]
        date: Option<Field>,
    },
    Draft {
        title: String,
        requested: Field,
        #[serde(default)]
        date: Option<Field>,
    },
    SendDraft {
        proposal: u64,
    },
    Resubmit {
        proposal: u64,
        #[serde(default)]
        requested: Option<Field>,
        #[serde(default)]
        date: Option<Field>,
    },
    Evaluate {
        proposal: u64,
        score: Field,
        #[serde(default)]
        comments: String,
    },
    Approve {
        proposal: u64,
        allocated: Field,
        start: Field,
        end: Field,
    },
    Reject {
        proposal: u64,
        #[serde(default)]
        reason: String,
    },
    TopUp {
        grant: u64,
        amount: Field,
    },
    Report {
        proposal: u64,
        content: String,
        #[serde(default)]
        milestones: String,
        #[serde(default)]
        expenditure: Option<Field>,
        #[serde(default)]
        date: Option<Field>,
    },
    Intervene {
        proposal: u64,
        feedback: String,
        health: Field,
        #[serde(default)]
        date: Option<Field>,
    },
    MarkRead,
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Coerces raw form values into typed core inputs.
pub trait FormValidator {
    fn amount(&self, field: &str, raw: &Field) -> Result<Amount>;

    /// A calendar date; `None` means "today" for the validator.
    fn date(&self, field: &str, raw: Option<&Field>) -> Result<NaiveDate>;

    fn score(&self, raw: &Field) -> Result<u8>;

    fn health(&self, raw: &Field) -> Result<ProjectHealth>;

    fn role(&self, raw: &str) -> Result<Role>;

    /// Validate a whole command form.
    fn command(&self, form: CommandForm) -> Result<Command> {
        Ok(match form {
            CommandForm::Submit { title, requested, date } => Command::SubmitProposal {
                title,
                requested: self.amount("requested", &requested)?,
                date: self.date("date", date.as_ref())?,
            },
            CommandForm::Draft { title, requested, date } => Command::SaveDraft {
                title,
                requested: self.amount("requested", &requested)?,
                date: self.date("date", date.as_ref())?,
            },
            CommandForm::SendDraft { proposal } => Command::SubmitDraft {
                proposal: ProposalId(proposal),
            },
            CommandForm::Resubmit { proposal, requested, date } => Command::Resubmit {
                proposal: ProposalId(proposal),
                requested: requested
                    .map(|r| self.amount("requested", &r))
                    .transpose()?,
                date: self.date("date", date.as_ref())?,
            },
            CommandForm::Evaluate { proposal, score, comments } => Command::Evaluate {
                proposal: ProposalId(proposal),
                score: self.score(&score)?,
                comments,
            },
            CommandForm::Approve { proposal, allocated, start, end } => Command::Approve {
                proposal: ProposalId(proposal),
                terms: GrantTerms {
                    allocated: self.amount("allocated", &allocated)?,
                    start: self.date("start", Some(&start))?,
                    end: self.date("end", Some(&end))?,
                },
            },
            CommandForm::Reject { proposal, reason } => Command::Reject {
                proposal: ProposalId(proposal),
                reason,
            },
            CommandForm::TopUp { grant, amount } => Command::TopUp {
                grant: GrantId(grant),
                amount: self.amount("amount", &amount)?,
            },
            CommandForm::Report {
                proposal,
                content,
                milestones,
                expenditure,
                date,
            } => {
                let expenditure = match expenditure {
                    Some(raw) => self.amount("expenditure", &raw)?,
                    None => Amount::ZERO,
                };
                Command::SubmitReport {
                    proposal: ProposalId(proposal),
                    draft: ReportDraft::new(content, milestones, expenditure),
                    date: self.date("date", date.as_ref())?,
                }
            }
            CommandForm::Intervene { proposal, feedback, health, date } => Command::Intervene {
                proposal: ProposalId(proposal),
                feedback,
                health: self.health(&health)?,
                date: self.date("date", date.as_ref())?,
            },
            CommandForm::MarkRead => Command::MarkNotificationsRead,
        })
    }
}

/// Validator with strict formats: decimal amounts with at most two places,
/// ISO `YYYY-MM-DD` dates, integer scores.
#[derive(Debug, Clone, Copy)]
pub struct StrictForms {
    today: NaiveDate,
}

impl StrictForms {
    /// Validator whose missing dates default to `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Validator using the local calendar date.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

fn invalid(field: &str, raw: &str, expected: &str) -> RgmsError {
    RgmsError::InvalidInput(format!("{field}: '{raw}' is not {expected}"))
}

impl FormValidator for StrictForms {
    fn amount(&self, field: &str, raw: &Field) -> Result<Amount> {
        raw.as_str()
            .trim()
            .parse()
            .map_err(|_| invalid(field, raw.as_str(), "an amount like 1500.00"))
    }

    fn date(&self, field: &str, raw: Option<&Field>) -> Result<NaiveDate> {
        match raw.map(|f| f.as_str().trim()) {
            None | Some("") => Ok(self.today),
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| invalid(field, s, "a date like 2025-01-31")),
        }
    }

    fn score(&self, raw: &Field) -> Result<u8> {
        raw.as_str()
            .trim()
            .parse()
            .map_err(|_| invalid("score", raw.as_str(), "a whole number"))
    }

    fn health(&self, raw: &Field) -> Result<ProjectHealth> {
        let key: String = raw
            .as_str()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "ontrack" => Ok(ProjectHealth::OnTrack),
            "needsintervention" => Ok(ProjectHealth::NeedsIntervention),
            _ => Err(invalid(
                "health",
                raw.as_str(),
                "'on-track' or 'needs-intervention'",
            )),
        }
    }

    fn role(&self, raw: &str) -> Result<Role> {
        raw.parse()
    }
}
