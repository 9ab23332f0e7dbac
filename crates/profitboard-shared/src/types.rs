use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Approval status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(DomainError::InvalidStatus(format!(
                "'{other}' (expected pending, approved or rejected)"
            ))),
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Application-level user record, one per identity-provider account.
/// `id` is the identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub discord: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Descriptive product fields. Defaults are filled in during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: Option<String>,
    pub product_category: Option<String>,
    pub product_brand: Option<String>,
    pub product_sku: Option<String>,
    pub marketplace: String,
    pub reporting_period: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub revenue: f64,
    pub cost: f64,
    /// `max(0, revenue - cost)`, fixed at creation.
    pub profit: f64,
    /// `profit / revenue * 100`; `None` when revenue is zero.
    pub profit_margin: Option<f64>,
    pub cogs: Option<f64>,
    pub amazon_fees: Option<f64>,
    pub units_sold: Option<i64>,
    pub average_selling_price: Option<f64>,
    pub inventory_value: Option<f64>,
}

/// Advertising (PPC) metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AdMetrics {
    pub ppc_spend: Option<f64>,
    pub ppc_sales: Option<f64>,
    pub total_clicks: Option<i64>,
    pub total_impressions: Option<i64>,
    /// `ppc_spend / ppc_sales * 100`
    pub acos: Option<f64>,
    /// `ppc_spend / revenue * 100`
    pub tacos: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceMetrics {
    pub conversion_rate: Option<f64>,
    pub sessions: Option<i64>,
    pub page_views: Option<i64>,
    /// Best-seller rank.
    pub bsr: Option<i64>,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
    pub return_rate: Option<f64>,
}

/// Everything a submitter provides (after validation and defaulting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetails {
    #[serde(flatten)]
    pub product: ProductInfo,
    #[serde(flatten)]
    pub financials: Financials,
    #[serde(flatten)]
    pub ads: AdMetrics,
    #[serde(flatten)]
    pub performance: PerformanceMetrics,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
    pub proof_url: Option<String>,
}

/// A validated submission that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub details: SubmissionDetails,
    pub created_at: DateTime<Utc>,
}

impl NewSubmission {
    /// New submissions always start out `pending`.
    pub fn new(user_id: Uuid, details: SubmissionDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            details,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubmissionStatus,
    #[serde(flatten)]
    pub details: SubmissionDetails,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Timestamp used for period filtering and "last activity":
    /// `approved_at`, falling back to the reported `date`.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.approved_at.unwrap_or(self.details.date)
    }
}

/// Owner display fields joined onto a submission for admin review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub name: String,
    pub discord: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionWithOwner {
    #[serde(flatten)]
    pub submission: Submission,
    pub profiles: OwnerSummary,
}
