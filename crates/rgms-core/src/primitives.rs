//! # Primitives
//!
//! Identifiers, fixed-point money, proposal versions and usage percentages.
//!
//! No binary floating point anywhere: money is an exact two-place
//! [`Decimal`], versions are counted in tenths and usage in tenths of a
//! percent, so repeated resubmissions and expenditure reports never drift.

use crate::error::{Result, RgmsError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Opening funds of a newly registered HOD's department (500000.00).
pub const DEFAULT_DEPARTMENT_BUDGET: Amount = Amount::from_units(500_000);

/// Usage above this level raises an alert (tenths of a percent, 90.0%).
pub const USAGE_ALERT_THRESHOLD: UsagePercent = UsagePercent(900);

/// Lowest score a reviewer may give.
pub const MIN_SCORE: u8 = 1;

/// Highest score a reviewer may give.
pub const MAX_SCORE: u8 = 10;

/// Maximum proposal title length in bytes.
pub const MAX_TITLE_LEN: usize = 255;

/// Number of notifications shown on a dashboard.
pub const DASHBOARD_NOTIFICATION_LIMIT: usize = 5;

/// Decimal places carried by every [`Amount`].
const AMOUNT_SCALE: u32 = 2;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a registered researcher, reviewer or HOD.
    ActorId,
    "actor"
);
id_type!(
    /// Identity of a single proposal version.
    ProposalId,
    "proposal"
);
id_type!(
    /// Identity of a funded grant.
    GrantId,
    "grant"
);
id_type!(ReportId, "report");
id_type!(EvaluationId, "evaluation");
id_type!(NotificationId, "notification");

// =============================================================================
// AMOUNT
// =============================================================================

/// Money with two decimal places, backed by an exact [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

/// Const-compatible equivalent of `Decimal::new`, which is not a const fn.
const fn const_decimal(num: i64, scale: u32) -> Decimal {
    let abs = num.unsigned_abs();
    Decimal::from_parts(abs as u32, (abs >> 32) as u32, 0, num < 0, scale)
}

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from minor units (cents).
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(const_decimal(cents, AMOUNT_SCALE))
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(const_decimal(units.saturating_mul(100), AMOUNT_SCALE))
    }

    /// Accept a decimal with at most two fractional digits.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.scale() > AMOUNT_SCALE {
            return Err(RgmsError::InvalidInput(format!(
                "amount '{value}' has more than {AMOUNT_SCALE} decimal places"
            )));
        }
        let mut value = value;
        value.rescale(AMOUNT_SCALE);
        Ok(Self(value))
    }

    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Checked addition; overflow is reported as invalid input.
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| RgmsError::InvalidInput(format!("amount overflow: {self} + {other}")))
    }

    /// Checked subtraction; overflow is reported as invalid input.
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or_else(|| RgmsError::InvalidInput(format!("amount overflow: {self} - {other}")))
    }

    /// Subtraction that may go negative, saturating at the decimal bounds.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = RgmsError;

    /// Parse `"8000"`, `"8000.5"` or `"8000.50"`. At most two fractional digits.
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let invalid = || RgmsError::InvalidInput(format!("malformed amount '{s}'"));
        let body = raw.strip_prefix('-').unwrap_or(raw);
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(invalid());
        }
        let value = Decimal::from_str(raw).map_err(|_| invalid())?;
        Self::from_decimal(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut value = self.0;
        value.rescale(AMOUNT_SCALE);
        rust_decimal::serde::str::serialize(&value, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = rust_decimal::serde::str::deserialize(deserializer)?;
        Self::from_decimal(value).map_err(de::Error::custom)
    }
}

// =============================================================================
// VERSION
// =============================================================================

/// Proposal version, counted in tenths: `1.0` is `Version(10)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    /// The version of the first proposal in a chain.
    pub const INITIAL: Self = Self(10);

    #[must_use]
    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    #[must_use]
    pub const fn tenths(self) -> u32 {
        self.0
    }

    /// The next version in the chain (one tenth higher).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl FromStr for Version {
    type Err = RgmsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RgmsError::InvalidInput(format!("malformed version '{s}'"));
        let (whole, frac) = s.trim().split_once('.').unwrap_or((s.trim(), "0"));
        if frac.len() != 1 {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let frac: u32 = frac.parse().map_err(|_| invalid())?;
        whole
            .checked_mul(10)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(de::Error::custom)
        } else {
            u32::deserialize(deserializer).map(Version)
        }
    }
}

// =============================================================================
// USAGE PERCENT
// =============================================================================

/// Budget usage in tenths of a percent, capped at 100.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UsagePercent(u16);

impl UsagePercent {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(1000);

    /// `min(100, round(spent / allocated * 100, 1))`, or zero when nothing is allocated.
    ///
    /// Rounds half away from zero at the first decimal place.
    #[must_use]
    pub fn of(spent: Amount, allocated: Amount) -> Self {
        if !allocated.is_positive() || !spent.is_positive() {
            return Self::ZERO;
        }
        spent
            .as_decimal()
            .checked_mul(Decimal::ONE_THOUSAND)
            .and_then(|scaled| scaled.checked_div(allocated.as_decimal()))
            .map(|per_mille| per_mille.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|per_mille| per_mille.min(Decimal::ONE_THOUSAND).to_u16())
            .map_or(Self::FULL, Self)
    }

    #[must_use]
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(if tenths > 1000 { 1000 } else { tenths })
    }

    #[must_use]
    pub const fn tenths(self) -> u16 {
        self.0
    }

    /// Whether usage is above [`USAGE_ALERT_THRESHOLD`].
    #[must_use]
    pub fn is_alert(self) -> bool {
        self > USAGE_ALERT_THRESHOLD
    }
}

impl fmt::Display for UsagePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for UsagePercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u16(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for UsagePercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            let tenths = raw
                .parse::<Version>()
                .map_err(de::Error::custom)?
                .tenths();
            u16::try_from(tenths)
                .map(Self::from_tenths)
                .map_err(de::Error::custom)
        } else {
            u16::deserialize(deserializer).map(Self::from_tenths)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
