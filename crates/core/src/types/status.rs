//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Order financial status (from Shopify).
///
/// Shopify REST payloads use lowercase snake_case values. Unknown values are
/// mapped to [`FinancialStatus::Pending`] at the normalization layer rather
/// than failing the whole order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "financial_status", rename_all = "snake_case")
)]
pub enum FinancialStatus {
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
}

impl FinancialStatus {
    /// Parse a Shopify financial status string, defaulting to `Pending`
    /// for values this service does not know about.
    #[must_use]
    pub fn from_shopify(s: &str) -> Self {
        match s {
            "authorized" => Self::Authorized,
            "partially_paid" => Self::PartiallyPaid,
            "paid" => Self::Paid,
            "partially_refunded" => Self::PartiallyRefunded,
            "refunded" => Self::Refunded,
            "voided" => Self::Voided,
            _ => Self::Pending,
        }
    }
}

/// How a dashboard user signed up.
///
/// Drives the GDPR shop-redact rule: users created through the Shopify app
/// install flow are deleted outright when their last brand is redacted;
/// users who registered by email keep their account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "signup_method", rename_all = "snake_case")
)]
pub enum SignupMethod {
    Shopify,
    Email,
}
