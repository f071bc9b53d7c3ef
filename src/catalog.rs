//! Server-side plan catalog and checkout validation.
//!
//! Client-submitted checkout parameters are never trusted as commercial
//! truth. Every field of a checkout request is checked against this catalog,
//! and the catalog's values are what get frozen onto the order.

use std::path::Path;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};
use crate::models::BillingInterval;

/// Sentinel expiry for lifetime plans: 2100-01-01T00:00:00Z.
/// Entitlement clocks start at purchase intent, so even this is anchored at
/// creation rather than recomputed later.
pub const LIFETIME_EXPIRY: i64 = 4102444800;

const SECONDS_PER_DAY: i64 = 86400;

/// A currency-specific price variant for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPrice {
    pub currency: String,
    /// Minor units (cents)
    pub amount: i64,
}

/// Authoritative definition of one purchasable plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub plan_id: String,
    pub name: String,
    pub interval: BillingInterval,
    /// Months of entitlement granted per purchase (recurring plans)
    pub entitlement_months: i32,
    pub credits: i64,
    /// Fixed-duration pass length in days (e.g. a 14-day pass).
    /// Takes precedence over month arithmetic when set.
    #[serde(default)]
    pub duration_days: Option<i64>,
    /// Lifetime plans get the far-future sentinel expiry
    #[serde(default)]
    pub lifetime: bool,
    pub prices: Vec<PlanPrice>,
}

impl PlanDefinition {
    /// Price for a currency variant, if the plan is sold in that currency.
    pub fn price_for(&self, currency: &str) -> Option<i64> {
        self.prices
            .iter()
            .find(|p| p.currency.eq_ignore_ascii_case(currency))
            .map(|p| p.amount)
    }

    /// Entitlement window end for an order created at `created_at`.
    ///
    /// Three explicit policies, selected by plan shape:
    /// - lifetime -> far-future sentinel
    /// - fixed-duration pass -> created_at + N days
    /// - recurring -> created_at + entitlement_months, calendar arithmetic
    pub fn expires_at(&self, created_at: i64) -> i64 {
        if self.lifetime {
            return LIFETIME_EXPIRY;
        }
        if let Some(days) = self.duration_days {
            return created_at + days * SECONDS_PER_DAY;
        }
        DateTime::<Utc>::from_timestamp(created_at, 0)
            .and_then(|dt| dt.checked_add_months(Months::new(self.entitlement_months as u32)))
            .map(|dt| dt.timestamp())
            // Unrepresentable dates only occur near the chrono range limits;
            // fall back to 31-day months rather than losing the entitlement.
            .unwrap_or(created_at + self.entitlement_months as i64 * 31 * SECONDS_PER_DAY)
    }
}

/// The checkout tuple as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSelection {
    pub plan_id: String,
    pub currency: String,
    pub amount: i64,
    /// Zero is accepted when the plan implies a non-zero grant; the
    /// catalog's authoritative value is substituted.
    pub credits: i64,
    pub interval: BillingInterval,
    pub entitlement_months: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCatalog {
    plans: Vec<PlanDefinition>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<PlanDefinition>) -> Self {
        Self { plans }
    }

    /// Load a catalog from a JSON file (the `--catalog` flag).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AppError::Internal(format!("Failed to read catalog file: {}", e)))?;
        let plans: Vec<PlanDefinition> = serde_json::from_str(&data)?;
        Ok(Self::new(plans))
    }

    pub fn get_plan(&self, plan_id: &str) -> Option<&PlanDefinition> {
        self.plans.iter().find(|p| p.plan_id == plan_id)
    }

    /// Validate a client-submitted checkout tuple against the catalog.
    ///
    /// Every field must match the authoritative definition exactly,
    /// including the currency-specific price variant. The only leniency:
    /// a zero `credits` is accepted and the catalog value substituted.
    /// Mismatches are logged with expected vs received values for forensics.
    pub fn validate_checkout(&self, sel: &CheckoutSelection) -> Result<&PlanDefinition> {
        let plan = self
            .get_plan(&sel.plan_id)
            .ok_or_else(|| AppError::BadRequest(msg::PLAN_NOT_FOUND.to_string()))?;

        let Some(expected_amount) = plan.price_for(&sel.currency) else {
            tracing::warn!(
                "Checkout validation failed: plan {} has no {} price variant",
                sel.plan_id,
                sel.currency
            );
            return Err(AppError::BadRequest(msg::INVALID_CHECKOUT_PARAMS.into()));
        };

        if sel.amount != expected_amount {
            tracing::warn!(
                "Checkout validation failed: plan {} amount mismatch (expected {}, received {})",
                sel.plan_id,
                expected_amount,
                sel.amount
            );
            return Err(AppError::BadRequest(msg::INVALID_CHECKOUT_PARAMS.into()));
        }

        if sel.credits != 0 && sel.credits != plan.credits {
            tracing::warn!(
                "Checkout validation failed: plan {} credits mismatch (expected {}, received {})",
                sel.plan_id,
                plan.credits,
                sel.credits
            );
            return Err(AppError::BadRequest(msg::INVALID_CHECKOUT_PARAMS.into()));
        }

        if sel.interval != plan.interval {
            tracing::warn!(
                "Checkout validation failed: plan {} interval mismatch (expected {}, received {})",
                sel.plan_id,
                plan.interval.as_str(),
                sel.interval.as_str()
            );
            return Err(AppError::BadRequest(msg::INVALID_CHECKOUT_PARAMS.into()));
        }

        if sel.entitlement_months != plan.entitlement_months {
            tracing::warn!(
                "Checkout validation failed: plan {} entitlement mismatch (expected {}, received {})",
                sel.plan_id,
                plan.entitlement_months,
                sel.entitlement_months
            );
            return Err(AppError::BadRequest(msg::INVALID_CHECKOUT_PARAMS.into()));
        }

        Ok(plan)
    }
}

impl Default for PlanCatalog {
    /// Built-in price/credit table. Overridable with `--catalog <file>`.
    fn default() -> Self {
        Self::new(vec![
            PlanDefinition {
                plan_id: "premium-monthly".into(),
                name: "Premium Monthly".into(),
                interval: BillingInterval::Month,
                entitlement_months: 1,
                credits: 500,
                duration_days: None,
                lifetime: false,
                prices: vec![
                    PlanPrice { currency: "usd".into(), amount: 2999 },
                    PlanPrice { currency: "eur".into(), amount: 2790 },
                ],
            },
            PlanDefinition {
                plan_id: "premium-annual".into(),
                name: "Premium Annual".into(),
                interval: BillingInterval::Year,
                entitlement_months: 12,
                credits: 6000,
                duration_days: None,
                lifetime: false,
                prices: vec![
                    PlanPrice { currency: "usd".into(), amount: 28800 },
                    PlanPrice { currency: "eur".into(), amount: 26900 },
                ],
            },
            PlanDefinition {
                plan_id: "two-week-pass".into(),
                name: "Two Week Pass".into(),
                interval: BillingInterval::OneTime,
                entitlement_months: 0,
                credits: 150,
                duration_days: Some(14),
                lifetime: false,
                prices: vec![PlanPrice { currency: "usd".into(), amount: 999 }],
            },
            PlanDefinition {
                plan_id: "lifetime".into(),
                name: "Lifetime".into(),
                interval: BillingInterval::OneTime,
                entitlement_months: 0,
                credits: 12000,
                duration_days: None,
                lifetime: true,
                prices: vec![PlanPrice { currency: "usd".into(), amount: 49900 }],
            },
        ])
    }
}
