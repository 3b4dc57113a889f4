//! Checkout step machine.

use serde::{Deserialize, Serialize};

/// The step a checkout is at.
///
/// State transitions:
/// ```text
/// Shipping ──► Payment ──► Confirmation
///     ◄──────────  ◄───────────
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    /// Collecting the shipping address and contact details.
    #[default]
    Shipping,

    /// Collecting card details.
    Payment,

    /// Reviewing the order before it is placed.
    Confirmation,
}

impl CheckoutStep {
    /// The step after this one, if any.
    pub fn next(&self) -> Option<CheckoutStep> {
        match self {
            CheckoutStep::Shipping => Some(CheckoutStep::Payment),
            CheckoutStep::Payment => Some(CheckoutStep::Confirmation),
            CheckoutStep::Confirmation => None,
        }
    }

    /// The step before this one. Shipping stays where it is.
    pub fn back(&self) -> CheckoutStep {
        match self {
            CheckoutStep::Shipping | CheckoutStep::Payment => CheckoutStep::Shipping,
            CheckoutStep::Confirmation => CheckoutStep::Payment,
        }
    }

    /// Returns true if the order can be placed from this step.
    pub fn can_confirm(&self) -> bool {
        matches!(self, CheckoutStep::Confirmation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::Shipping => "shipping",
            CheckoutStep::Payment => "payment",
            CheckoutStep::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
