//! Submission input schema, validation and the approval state machine.
//!
//! Incoming payloads are deserialized into [`SubmissionInput`], whose fields
//! are all optional and loosely typed, then checked in a single pass by
//! [`SubmissionInput::validate`]. The pass either yields fully typed
//! [`SubmissionDetails`] (defaults applied, derived metrics computed) or the
//! complete list of field errors.
//!
//! Lifecycle:
//!
//! ```text
//!   create  ->  pending
//!   approve:    pending | rejected | approved  ->  approved   (stamps approved_at)
//!   reject:     pending | approved | rejected  ->  rejected   (clears approved_at)
//! ```
//!
//! `delete` removes a record from any state.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::constants::{
    DEFAULT_CURRENCY, DEFAULT_MARKETPLACE, DEFAULT_REPORTING_PERIOD, MAX_AVERAGE_RATING,
    MAX_COUNT,
};
use crate::error::{DomainError, FieldError};
use crate::types::{
    AdMetrics, Financials, PerformanceMetrics, ProductInfo, SubmissionDetails, SubmissionStatus,
};

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Profit is never negative: loss-making periods report zero.
pub fn compute_profit(revenue: f64, cost: f64) -> f64 {
    (revenue - cost).max(0.0)
}

/// Advertising cost of sales, in percent.
pub fn compute_acos(ppc_spend: Option<f64>, ppc_sales: Option<f64>) -> Option<f64> {
    match (ppc_spend, ppc_sales) {
        (Some(spend), Some(sales)) if sales > 0.0 => Some(spend * 100.0 / sales),
        _ => None,
    }
}

/// Total advertising cost of sales, in percent of revenue.
pub fn compute_tacos(ppc_spend: Option<f64>, revenue: f64) -> Option<f64> {
    match ppc_spend {
        Some(spend) if revenue > 0.0 => Some(spend * 100.0 / revenue),
        _ => None,
    }
}

pub fn compute_profit_margin(profit: f64, revenue: f64) -> Option<f64> {
    (revenue > 0.0).then(|| profit * 100.0 / revenue)
}

// ---------------------------------------------------------------------------
// Input schema
// ---------------------------------------------------------------------------

/// Submission payload as sent by clients.
///
/// Numeric fields accept JSON numbers or numeric strings; an empty string
/// counts as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    pub product_name: Option<String>,
    pub product_category: Option<String>,
    pub product_brand: Option<String>,
    pub product_sku: Option<String>,
    pub marketplace: Option<String>,
    pub reporting_period: Option<String>,
    pub currency: Option<String>,

    pub revenue: Option<Value>,
    pub cost: Option<Value>,
    pub cogs: Option<Value>,
    pub amazon_fees: Option<Value>,
    pub units_sold: Option<Value>,
    pub average_selling_price: Option<Value>,
    pub inventory_value: Option<Value>,

    pub ppc_spend: Option<Value>,
    pub ppc_sales: Option<Value>,
    pub total_clicks: Option<Value>,
    pub total_impressions: Option<Value>,

    pub conversion_rate: Option<Value>,
    pub sessions: Option<Value>,
    pub page_views: Option<Value>,
    pub bsr: Option<Value>,
    pub reviews_count: Option<Value>,
    pub average_rating: Option<Value>,
    pub return_rate: Option<Value>,

    pub date: Option<String>,
    pub note: Option<String>,
    pub proof_url: Option<String>,
}

impl SubmissionInput {
    /// Validate every field in one pass.
    ///
    /// `now` is used as the default `date`.
    pub fn validate(self, now: DateTime<Utc>) -> Result<SubmissionDetails, Vec<FieldError>> {
        let mut check = Checker::default();

        let revenue = check.required_amount("revenue", self.revenue);
        let cost = check.required_amount("cost", self.cost);

        let cogs = check.amount("cogs", self.cogs);
        let amazon_fees = check.amount("amazonFees", self.amazon_fees);
        let units_sold = check.count("unitsSold", self.units_sold);
        let average_selling_price = check.amount("averageSellingPrice", self.average_selling_price);
        let inventory_value = check.amount("inventoryValue", self.inventory_value);

        let ppc_spend = check.amount("ppcSpend", self.ppc_spend);
        let ppc_sales = check.amount("ppcSales", self.ppc_sales);
        let total_clicks = check.count("totalClicks", self.total_clicks);
        let total_impressions = check.count("totalImpressions", self.total_impressions);

        let conversion_rate = check.amount("conversionRate", self.conversion_rate);
        let sessions = check.count("sessions", self.sessions);
        let page_views = check.count("pageViews", self.page_views);
        let bsr = check.count("bsr", self.bsr);
        let reviews_count = check.count("reviewsCount", self.reviews_count);
        let average_rating = check.amount("averageRating", self.average_rating);
        if average_rating.is_some_and(|r| r > MAX_AVERAGE_RATING) {
            check.fail(
                "averageRating",
                format!("must be at most {MAX_AVERAGE_RATING}"),
            );
        }
        let return_rate = check.amount("returnRate", self.return_rate);

        let date = match non_blank(self.date) {
            Some(raw) => check.date("date", &raw),
            None => Some(now),
        };

        if !check.errors.is_empty() {
            return Err(check.errors);
        }

        // All required values are present once the error list is empty.
        let (Some(revenue), Some(cost), Some(date)) = (revenue, cost, date) else {
            return Err(vec![FieldError::new("revenue", "is required")]);
        };

        let profit = compute_profit(revenue, cost);

        Ok(SubmissionDetails {
            product: ProductInfo {
                product_name: non_blank(self.product_name),
                product_category: non_blank(self.product_category),
                product_brand: non_blank(self.product_brand),
                product_sku: non_blank(self.product_sku),
                marketplace: non_blank(self.marketplace)
                    .unwrap_or_else(|| DEFAULT_MARKETPLACE.to_string()),
                reporting_period: non_blank(self.reporting_period)
                    .unwrap_or_else(|| DEFAULT_REPORTING_PERIOD.to_string()),
                currency: non_blank(self.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            },
            financials: Financials {
                revenue,
                cost,
                profit,
                profit_margin: compute_profit_margin(profit, revenue),
                cogs,
                amazon_fees,
                units_sold,
                average_selling_price,
                inventory_value,
            },
            ads: AdMetrics {
                ppc_spend,
                ppc_sales,
                total_clicks,
                total_impressions,
                acos: compute_acos(ppc_spend, ppc_sales),
                tacos: compute_tacos(ppc_spend, revenue),
            },
            performance: PerformanceMetrics {
                conversion_rate,
                sessions,
                page_views,
                bsr,
                reviews_count: reviews_count.unwrap_or(0),
                average_rating,
                return_rate,
            },
            date,
            note: non_blank(self.note),
            proof_url: non_blank(self.proof_url),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects field errors while converting loosely typed input.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn number(&mut self, field: &str, raw: Option<Value>) -> Option<f64> {
        let parsed = match raw? {
            Value::Null => return None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Some(v),
            _ => {
                self.fail(field, "must be a number");
                None
            }
        }
    }

    fn amount(&mut self, field: &str, raw: Option<Value>) -> Option<f64> {
        let value = self.number(field, raw)?;
        if value < 0.0 {
            self.fail(field, "must be greater than or equal to 0");
            return None;
        }
        Some(value)
    }

    fn required_amount(&mut self, field: &str, raw: Option<Value>) -> Option<f64> {
        let missing = match &raw {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => false,
        };
        if missing {
            self.fail(field, "is required");
            return None;
        }
        self.amount(field, raw)
    }

    fn count(&mut self, field: &str, raw: Option<Value>) -> Option<i64> {
        let value = self.amount(field, raw)?;
        if value.fract() != 0.0 {
            self.fail(field, "must be a whole number");
            return None;
        }
        if value > MAX_COUNT as f64 {
            self.fail(field, format!("must be at most {MAX_COUNT}"));
            return None;
        }
        Some(value as i64)
    }

    fn date(&mut self, field: &str, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Some(dt.and_utc());
        }
        self.fail(field, "must be an RFC 3339 timestamp or a YYYY-MM-DD date");
        None
    }
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// An admin-initiated status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// pending | rejected | approved -> approved, stamping `approved_at`.
    Approve,
    /// pending | approved | rejected -> rejected, clearing `approved_at`.
    Reject,
}

impl StatusChange {
    pub fn target(&self) -> SubmissionStatus {
        match self {
            StatusChange::Approve => SubmissionStatus::Approved,
            StatusChange::Reject => SubmissionStatus::Rejected,
        }
    }

    /// The `(status, approved_at)` pair to write in one atomic update.
    pub fn apply(&self, now: DateTime<Utc>) -> (SubmissionStatus, Option<DateTime<Utc>>) {
        match self {
            StatusChange::Approve => (SubmissionStatus::Approved, Some(now)),
            StatusChange::Reject => (SubmissionStatus::Rejected, None),
        }
    }
}

impl FromStr for StatusChange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<SubmissionStatus>()? {
            SubmissionStatus::Approved => Ok(StatusChange::Approve),
            SubmissionStatus::Rejected => Ok(StatusChange::Reject),
            SubmissionStatus::Pending => Err(DomainError::InvalidStatus(
                "a reviewed submission cannot return to pending".to_string(),
            )),
        }
    }
}
