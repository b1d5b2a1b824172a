//! Plan tiers and the plan → credits catalog.
//!
//! Subscription grant sizes are configuration data, not code: each paid tier
//! carries a coefficient applied to a base amount, and yearly plans multiply
//! the result by an annual multiplier. Individual plan keys can be pinned to
//! an exact amount with an override.
//!
//! With the default catalog:
//!
//! | plan key       | credits |
//! |----------------|---------|
//! | basic-monthly  | 1 500   |
//! | plus-monthly   | 6 000   |
//! | pro-monthly    | 24 000  |
//! | pro-yearly     | 288 000 |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default base credits per month for a coefficient-1 tier.
pub const DEFAULT_BASE_CREDITS: i64 = 1500;

/// Default multiplier applied to yearly plans.
pub const DEFAULT_ANNUAL_MULTIPLIER: i64 = 12;

/// The user's plan tier, as reported by the auth/session service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free tier. Receives the daily free grant and nothing else.
    Free,
    /// Basic paid tier.
    Basic,
    /// Plus paid tier.
    Plus,
    /// Pro paid tier.
    Pro,
}

impl PlanTier {
    /// Check if this is the free tier.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Wire name of the tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Plus => "plus",
            Self::Pro => "pro",
        }
    }
}

impl FromStr for PlanTier {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "plus" => Ok(Self::Plus),
            "pro" => Ok(Self::Pro),
            other => Err(PlanError::UnknownTier(other.to_string())),
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing cycle of a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    /// Billed every month.
    Monthly,
    /// Billed once a year.
    Yearly,
}

impl BillingCycle {
    /// Wire name of the cycle.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// A purchasable plan, written `<tier>-<cycle>` (e.g. `pro-yearly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanKey {
    /// The tier.
    pub tier: PlanTier,
    /// The billing cycle.
    pub cycle: BillingCycle,
}

impl PlanKey {
    /// Create a plan key.
    #[must_use]
    pub const fn new(tier: PlanTier, cycle: BillingCycle) -> Self {
        Self { tier, cycle }
    }
}

impl FromStr for PlanKey {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tier, cycle) = s
            .split_once('-')
            .ok_or_else(|| PlanError::InvalidPlanKey(s.to_string()))?;
        let tier = tier
            .parse::<PlanTier>()
            .map_err(|_| PlanError::InvalidPlanKey(s.to_string()))?;
        let cycle = match cycle {
            "monthly" => BillingCycle::Monthly,
            "yearly" => BillingCycle::Yearly,
            _ => return Err(PlanError::InvalidPlanKey(s.to_string())),
        };
        Ok(Self { tier, cycle })
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tier, self.cycle.as_str())
    }
}

impl TryFrom<String> for PlanKey {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlanKey> for String {
    fn from(key: PlanKey) -> Self {
        key.to_string()
    }
}

/// Plan → credits table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCatalog {
    /// Credits per month for a tier with coefficient 1.
    pub base_credits: i64,

    /// Multiplier applied to yearly plans.
    pub annual_multiplier: i64,

    /// Per-tier coefficient. Tiers missing here cannot be purchased.
    pub tier_coefficients: BTreeMap<PlanTier, i64>,

    /// Exact amounts for individual plan keys, taking precedence over the
    /// formula.
    #[serde(default)]
    pub overrides: BTreeMap<String, i64>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let mut tier_coefficients = BTreeMap::new();
        tier_coefficients.insert(PlanTier::Basic, 1);
        tier_coefficients.insert(PlanTier::Plus, 4);
        tier_coefficients.insert(PlanTier::Pro, 16);

        Self {
            base_credits: DEFAULT_BASE_CREDITS,
            annual_multiplier: DEFAULT_ANNUAL_MULTIPLIER,
            tier_coefficients,
            overrides: BTreeMap::new(),
        }
    }
}

impl PlanCatalog {
    /// Parse a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the catalog is invalid.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let catalog: Self =
            serde_json::from_str(json).map_err(|e| PlanError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PlanError::Io(e.to_string()))?;
        Self::from_json(&contents)
    }

    /// Reject negative amounts anywhere in the table.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Invalid` naming the offending entry.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.base_credits < 0 {
            return Err(PlanError::Invalid("base_credits is negative".into()));
        }
        if self.annual_multiplier < 1 {
            return Err(PlanError::Invalid("annual_multiplier must be >= 1".into()));
        }
        if let Some((tier, _)) = self.tier_coefficients.iter().find(|(_, c)| **c < 0) {
            return Err(PlanError::Invalid(format!("coefficient for {tier} is negative")));
        }
        if let Some((key, _)) = self.overrides.iter().find(|(_, c)| **c < 0) {
            return Err(PlanError::Invalid(format!("override for {key} is negative")));
        }
        Ok(())
    }

    /// Credits granted per paid period of `plan`.
    ///
    /// # Errors
    ///
    /// - `PlanError::UnknownPlan` if the tier has no coefficient (including
    ///   the free tier) and no override exists.
    /// - `PlanError::Overflow` if the formula overflows.
    pub fn credits_for(&self, plan: PlanKey) -> Result<i64, PlanError> {
        if let Some(amount) = self.overrides.get(&plan.to_string()) {
            return Ok(*amount);
        }

        let coefficient = self
            .tier_coefficients
            .get(&plan.tier)
            .ok_or_else(|| PlanError::UnknownPlan(plan.to_string()))?;

        let monthly = self
            .base_credits
            .checked_mul(*coefficient)
            .ok_or_else(|| PlanError::Overflow(plan.to_string()))?;

        match plan.cycle {
            BillingCycle::Monthly => Ok(monthly),
            BillingCycle::Yearly => monthly
                .checked_mul(self.annual_multiplier)
                .ok_or_else(|| PlanError::Overflow(plan.to_string())),
        }
    }
}

/// Errors raised by plan parsing and catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Unrecognized tier name.
    #[error("unknown plan tier: {0}")]
    UnknownTier(String),

    /// Plan key not of the form `<tier>-<cycle>`.
    #[error("invalid plan key: {0}")]
    InvalidPlanKey(String),

    /// The catalog has no amount for this plan.
    #[error("no credit amount configured for plan {0}")]
    UnknownPlan(String),

    /// The configured formula overflows.
    #[error("credit amount for plan {0} overflows")]
    Overflow(String),

    /// The catalog contents are invalid.
    #[error("invalid plan catalog: {0}")]
    Invalid(String),

    /// The catalog file could not be read.
    #[error("failed to read plan catalog: {0}")]
    Io(String),

    /// The catalog file could not be parsed.
    #[error("failed to parse plan catalog: {0}")]
    Parse(String),
}
