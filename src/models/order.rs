use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle states. Status only moves forward: `Created -> Paid`
/// is accepted at most once; re-applying it is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Paid,
    Failed,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingInterval {
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "year")]
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for BillingInterval {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-time" => Ok(Self::OneTime),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(()),
        }
    }
}

/// Which checkout path produced the payable handle.
/// `Link` is the degraded path with weaker correlation guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Api,
    Link,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Link => "link",
        }
    }
}

impl FromStr for CheckoutMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "link" => Ok(Self::Link),
            _ => Err(()),
        }
    }
}

/// Durable record of one purchase attempt and its settlement state.
///
/// Commercial fields (`amount`, `credits`, `entitlement_months`, `expires_at`)
/// are frozen at creation time from the plan catalog. Webhooks are a trigger,
/// never a source of commercial truth. Orders are never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Opaque correlation token handed to the payment provider.
    /// Assigned once, never reused, never mutated.
    pub order_no: String,
    pub user_id: String,
    pub user_email: String,
    pub plan_id: String,
    pub plan_name: String,
    /// Integer minor-currency units (cents)
    pub amount: i64,
    pub currency: String,
    pub credits: i64,
    pub billing_interval: BillingInterval,
    pub entitlement_months: i32,
    /// Affiliate attribution captured at checkout time
    pub referrer_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    /// Email the provider reported at payment time (may differ from user_email)
    pub paid_email: Option<String>,
    /// Entitlement window end, derived at creation from the plan shape
    pub expires_at: i64,
    /// Checkout handle: the provider session id on the API path, the direct
    /// payment link on the degraded path
    pub provider_session_ref: Option<String>,
    pub checkout_mode: CheckoutMode,
    /// Opaque audit blob of whatever triggered settlement
    #[serde(skip_serializing)]
    pub raw_payload: Option<String>,
}

/// Input for persisting a new order in `Created` state.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: String,
    pub user_email: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
    pub credits: i64,
    pub billing_interval: BillingInterval,
    pub entitlement_months: i32,
    pub referrer_id: Option<String>,
    pub expires_at: i64,
}

/// One credit-ledger entry, written exactly once per settled order.
#[derive(Debug, Clone, Serialize)]
pub struct CreditGrant {
    pub id: String,
    pub order_no: String,
    pub user_id: String,
    pub credits: i64,
    pub reason: String,
    pub created_at: i64,
}

/// One affiliate-commission entry, written exactly once per settled order.
#[derive(Debug, Clone, Serialize)]
pub struct Commission {
    pub id: String,
    pub order_no: String,
    pub referrer_id: String,
    /// Commission amount in minor units of the order currency
    pub amount: i64,
    pub created_at: i64,
}
