//! # Department Budget
//!
//! The funds an HOD may still allocate. Grant creation and top-ups draw from
//! it; nothing in scope replenishes it.
//!
//! Every debit is a compare-and-swap on `revision`: the caller states the
//! revision it read, and a stale revision fails with `Conflict` instead of
//! silently overwriting a concurrent debit.

use crate::error::{Result, RgmsError};
use crate::{ActorId, Amount};
use serde::{Deserialize, Serialize};

/// Allocatable funds held by one HOD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentBudget {
    pub hod: ActorId,
    available: Amount,
    revision: u64,
}

impl DepartmentBudget {
    #[must_use]
    pub fn new(hod: ActorId, available: Amount) -> Self {
        Self {
            hod,
            available,
            revision: 0,
        }
    }

    #[must_use]
    pub fn available(&self) -> Amount {
        self.available
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Fail with `InsufficientFunds` unless `amount` is covered.
    pub fn ensure_covers(&self, amount: Amount) -> Result<()> {
        if amount > self.available {
            return Err(RgmsError::InsufficientFunds {
                requested: amount,
                available: self.available,
            });
        }
        Ok(())
    }

    /// Withdraw `amount` if the counter is still at `expected_revision`.
    ///
    /// Returns the new revision. On any error the counter is unchanged.
    pub fn debit(&mut self, amount: Amount, expected_revision: u64) -> Result<u64> {
        if expected_revision != self.revision {
            return Err(RgmsError::Conflict(format!(
                "department budget of {} moved from revision {} to {}",
                self.hod, expected_revision, self.revision
            )));
        }
        if amount.is_negative() {
            return Err(RgmsError::InvalidInput(format!(
                "debit cannot be negative, got {amount}"
            )));
        }
        self.ensure_covers(amount)?;
        self.available = self.available.checked_sub(amount)?;
        self.revision = self.revision.saturating_add(1);
        Ok(self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_decrements_and_bumps_revision() {
        let mut dept = DepartmentBudget::new(ActorId(1), Amount::from_units(50_000));
        assert_eq!(dept.debit(Amount::from_units(8000), 0).ok(), Some(1));
        assert_eq!(dept.available(), Amount::from_units(42_000));
    }

    #[test]
    fn insufficient_funds_leaves_counter_untouched() {
        let mut dept = DepartmentBudget::new(ActorId(1), Amount::from_units(50_000));
        let err = dept.debit(Amount::from_units(60_000), 0);
        assert!(matches!(err, Err(RgmsError::InsufficientFunds { .. })));
        assert_eq!(dept.available(), Amount::from_units(50_000));
        assert_eq!(dept.revision(), 0);
    }

    #[test]
    fn stale_revision_is_a_conflict() {
        let mut dept = DepartmentBudget::new(ActorId(1), Amount::from_units(100));
        let seen = dept.revision();
        assert!(dept.debit(Amount::from_units(10), seen).is_ok());
        let err = dept.debit(Amount::from_units(10), seen);
        assert!(matches!(err, Err(RgmsError::Conflict(_))));
        assert_eq!(dept.available(), Amount::from_units(90));
    }

    #[test]
    fn exact_balance_can_be_spent() {
        let mut dept = DepartmentBudget::new(ActorId(1), Amount::from_units(100));
        assert!(dept.debit(Amount::from_units(100), 0).is_ok());
        assert_eq!(dept.available(), Amount::ZERO);
    }
}
