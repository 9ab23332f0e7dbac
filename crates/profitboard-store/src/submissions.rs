use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use profitboard_shared::submission::StatusChange;
use profitboard_shared::{
    AdMetrics, Financials, NewSubmission, OwnerSummary, PerformanceMetrics, ProductInfo,
    Submission, SubmissionDetails, SubmissionStatus, SubmissionWithOwner,
};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};

const SUBMISSION_COLUMNS: &str = "id, user_id, status, \
    product_name, product_category, product_brand, product_sku, \
    marketplace, reporting_period, currency, \
    revenue, cost, profit, profit_margin, cogs, amazon_fees, units_sold, \
    average_selling_price, inventory_value, \
    ppc_spend, ppc_sales, total_clicks, total_impressions, acos, tacos, \
    conversion_rate, sessions, page_views, bsr, reviews_count, average_rating, return_rate, \
    date, note, proof_url, approved_at, created_at";

impl Database {
    /// Persist a validated submission in state `pending`.
    pub fn insert_submission(&self, new: &NewSubmission) -> Result<Submission> {
        let d = &new.details;
        let submission = self.conn().query_row(
            &format!(
                "INSERT INTO submissions ({SUBMISSION_COLUMNS})
                 VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                         ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                         ?19, ?20, ?21, ?22, ?23, ?24,
                         ?25, ?26, ?27, ?28, ?29, ?30, ?31,
                         ?32, ?33, ?34, NULL, ?35)
                 RETURNING {SUBMISSION_COLUMNS}"
            ),
            params![
                new.id.to_string(),
                new.user_id.to_string(),
                d.product.product_name,
                d.product.product_category,
                d.product.product_brand,
                d.product.product_sku,
                d.product.marketplace,
                d.product.reporting_period,
                d.product.currency,
                d.financials.revenue,
                d.financials.cost,
                d.financials.profit,
                d.financials.profit_margin,
                d.financials.cogs,
                d.financials.amazon_fees,
                d.financials.units_sold,
                d.financials.average_selling_price,
                d.financials.inventory_value,
                d.ads.ppc_spend,
                d.ads.ppc_sales,
                d.ads.total_clicks,
                d.ads.total_impressions,
                d.ads.acos,
                d.ads.tacos,
                d.performance.conversion_rate,
                d.performance.sessions,
                d.performance.page_views,
                d.performance.bsr,
                d.performance.reviews_count,
                d.performance.average_rating,
                d.performance.return_rate,
                columns::fmt_ts(&d.date),
                d.note,
                d.proof_url,
                columns::fmt_ts(&new.created_at),
            ],
            row_to_submission,
        )?;
        tracing::info!(id = %submission.id, user = %submission.user_id, "submission created");
        Ok(submission)
    }

    pub fn get_submission(&self, id: Uuid) -> Result<Submission> {
        self.conn()
            .query_row(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1"),
                params![id.to_string()],
                row_to_submission,
            )
            .map_err(StoreError::from_query)
    }

    /// All submissions in `status`, newest first.
    pub fn list_submissions_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions
             WHERE status = ?1
             ORDER BY created_at DESC, id ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], row_to_submission)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Review queue: submissions in `status` joined with the owner's name and
    /// handle, newest first.
    pub fn list_submissions_with_owner(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<SubmissionWithOwner>> {
        let columns = SUBMISSION_COLUMNS
            .split(',')
            .map(|c| format!("s.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {columns}, p.name AS owner_name, p.discord AS owner_discord
             FROM submissions s
             JOIN profiles p ON p.id = s.user_id
             WHERE s.status = ?1
             ORDER BY s.created_at DESC, s.id ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], |row| {
            Ok(SubmissionWithOwner {
                submission: row_to_submission(row)?,
                profiles: OwnerSummary {
                    name: row.get("owner_name")?,
                    discord: row.get("owner_discord")?,
                },
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Approve or reject in a single atomic `UPDATE`.
    pub fn apply_status_change(
        &self,
        id: Uuid,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        let (status, approved_at) = change.apply(now);
        let submission = self
            .conn()
            .query_row(
                &format!(
                    "UPDATE submissions SET status = ?2, approved_at = ?3
                     WHERE id = ?1
                     RETURNING {SUBMISSION_COLUMNS}"
                ),
                params![
                    id.to_string(),
                    status.as_str(),
                    approved_at.as_ref().map(columns::fmt_ts),
                ],
                row_to_submission,
            )
            .map_err(StoreError::from_query)?;
        tracing::info!(id = %id, status = %status, "submission status changed");
        Ok(submission)
    }

    /// Permanently remove a submission. Returns `false` if it did not exist.
    pub fn delete_submission(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM submissions WHERE id = ?1", params![id.to_string()])?;
        if affected > 0 {
            tracing::info!(id = %id, "submission deleted");
        }
        Ok(affected > 0)
    }
}

fn row_to_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: columns::uuid(row, "id")?,
        user_id: columns::uuid(row, "user_id")?,
        status: columns::parsed(row, "status")?,
        details: SubmissionDetails {
            product: ProductInfo {
                product_name: row.get("product_name")?,
                product_category: row.get("product_category")?,
                product_brand: row.get("product_brand")?,
                product_sku: row.get("product_sku")?,
                marketplace: row.get("marketplace")?,
                reporting_period: row.get("reporting_period")?,
                currency: row.get("currency")?,
            },
            financials: Financials {
                revenue: row.get("revenue")?,
                cost: row.get("cost")?,
                profit: row.get("profit")?,
                profit_margin: row.get("profit_margin")?,
                cogs: row.get("cogs")?,
                amazon_fees: row.get("amazon_fees")?,
                units_sold: row.get("units_sold")?,
                average_selling_price: row.get("average_selling_price")?,
                inventory_value: row.get("inventory_value")?,
            },
            ads: AdMetrics {
                ppc_spend: row.get("ppc_spend")?,
                ppc_sales: row.get("ppc_sales")?,
                total_clicks: row.get("total_clicks")?,
                total_impressions: row.get("total_impressions")?,
                acos: row.get("acos")?,
                tacos: row.get("tacos")?,
            },
            performance: PerformanceMetrics {
                conversion_rate: row.get("conversion_rate")?,
                sessions: row.get("sessions")?,
                page_views: row.get("page_views")?,
                bsr: row.get("bsr")?,
                reviews_count: row.get("reviews_count")?,
                average_rating: row.get("average_rating")?,
                return_rate: row.get("return_rate")?,
            },
            date: columns::ts(row, "date")?,
            note: row.get("note")?,
            proof_url: row.get("proof_url")?,
        },
        approved_at: columns::opt_ts(row, "approved_at")?,
        created_at: columns::ts(row, "created_at")?,
    })
}
