//! In-process leaderboard aggregation.
//!
//! The store hands over raw approved rows and profiles; grouping, averaging
//! and ranking all happen here so the same code runs against SQLite in
//! production and plain vectors in tests.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::types::{Profile, Submission, SubmissionStatus};

/// Ranking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Month,
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Month => "month",
            Period::All => "all",
        }
    }

    /// First instant of the window, or `None` for an unbounded window.
    ///
    /// For `Month` this is midnight on the 1st of `now`'s calendar month,
    /// evaluated in `now`'s own time zone and converted to UTC.
    pub fn window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        match self {
            Period::All => None,
            Period::Month => {
                let tz = now.timezone();
                let first = now.date_naive().with_day(1)?.and_hms_opt(0, 0, 0)?;
                // A DST jump exactly at midnight makes the local time
                // ambiguous or missing; take the earliest valid reading.
                tz.from_local_datetime(&first)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

impl FromStr for Period {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(Period::Month),
            "all" => Ok(Period::All),
            other => Err(DomainError::InvalidPeriod(other.to_string())),
        }
    }
}

/// One participant's aggregated standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    /// 1-based position after sorting.
    pub rank: usize,
    pub user_id: Uuid,
    pub name: String,
    pub discord: String,
    pub avatar_url: Option<String>,
    pub total_profit: f64,
    pub total_revenue: f64,
    pub total_ppc_spend: f64,
    pub total_units_sold: i64,
    pub submission_count: usize,
    pub categories: Vec<String>,
    pub marketplaces: Vec<String>,
    pub last_submission_at: DateTime<Utc>,
    pub avg_acos: Option<f64>,
    pub avg_tacos: Option<f64>,
    pub avg_profit_margin: Option<f64>,
}

/// Running mean that distinguishes "no samples" from zero.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug)]
struct Group {
    total_profit: f64,
    total_revenue: f64,
    total_ppc_spend: f64,
    total_units_sold: i64,
    submission_count: usize,
    categories: BTreeSet<String>,
    marketplaces: BTreeSet<String>,
    last_submission_at: DateTime<Utc>,
    acos: Mean,
    tacos: Mean,
    profit_margin: Mean,
}

impl Group {
    fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            total_profit: 0.0,
            total_revenue: 0.0,
            total_ppc_spend: 0.0,
            total_units_sold: 0,
            submission_count: 0,
            categories: BTreeSet::new(),
            marketplaces: BTreeSet::new(),
            last_submission_at: first_seen,
            acos: Mean::default(),
            tacos: Mean::default(),
            profit_margin: Mean::default(),
        }
    }

    fn add(&mut self, s: &Submission) {
        let d = &s.details;
        self.total_profit += d.financials.profit;
        self.total_revenue += d.financials.revenue;
        self.total_ppc_spend += d.ads.ppc_spend.unwrap_or(0.0);
        self.total_units_sold = self
            .total_units_sold
            .saturating_add(d.financials.units_sold.unwrap_or(0));
        self.submission_count += 1;

        if let Some(category) = &d.product.product_category {
            self.categories.insert(category.clone());
        }
        if !d.product.marketplace.is_empty() {
            self.marketplaces.insert(d.product.marketplace.clone());
        }

        let effective = s.effective_date();
        if effective > self.last_submission_at {
            self.last_submission_at = effective;
        }

        self.acos.push(d.ads.acos);
        self.tacos.push(d.ads.tacos);
        self.profit_margin.push(d.financials.profit_margin);
    }
}

/// Rank approved submissions inside the window.
///
/// Non-approved rows are skipped even if the caller passes them in. Users
/// without a profile have nothing to display and are left out. Ordering is
/// `total_profit` descending, then `user_id` ascending.
pub fn compute_rankings(
    submissions: &[Submission],
    profiles: &[Profile],
    window_start: Option<DateTime<Utc>>,
) -> Vec<RankingRow> {
    let mut groups: HashMap<Uuid, Group> = HashMap::new();

    for s in submissions {
        if s.status != SubmissionStatus::Approved {
            continue;
        }
        let effective = s.effective_date();
        if window_start.is_some_and(|start| effective < start) {
            continue;
        }
        groups
            .entry(s.user_id)
            .or_insert_with(|| Group::new(effective))
            .add(s);
    }

    let profiles: HashMap<Uuid, &Profile> = profiles.iter().map(|p| (p.id, p)).collect();

    let mut rows: Vec<RankingRow> = groups
        .into_iter()
        .filter_map(|(user_id, g)| {
            let profile = profiles.get(&user_id)?;
            Some(RankingRow {
                rank: 0,
                user_id,
                name: profile.name.clone(),
                discord: profile.discord.clone(),
                avatar_url: profile.avatar_url.clone(),
                total_profit: g.total_profit,
                total_revenue: g.total_revenue,
                total_ppc_spend: g.total_ppc_spend,
                total_units_sold: g.total_units_sold,
                submission_count: g.submission_count,
                categories: g.categories.into_iter().collect(),
                marketplaces: g.marketplaces.into_iter().collect(),
                last_submission_at: g.last_submission_at,
                avg_acos: g.acos.value(),
                avg_tacos: g.tacos.value(),
                avg_profit_margin: g.profit_margin.value(),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_profit
            .total_cmp(&a.total_profit)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AdMetrics, Financials, PerformanceMetrics, ProductInfo, Role, SubmissionDetails,
    };
    use chrono::{FixedOffset, TimeZone};

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn profile(id: Uuid, name: &str) -> Profile {
        Profile {
            id,
            name: name.to_string(),
            discord: format!("{name}#0001"),
            avatar_url: None,
            role: Role::User,
            created_at: ts(2024, 1, 1),
        }
    }

    fn submission(
        user_id: Uuid,
        status: SubmissionStatus,
        revenue: f64,
        cost: f64,
        approved_at: Option<DateTime<Utc>>,
        date: DateTime<Utc>,
    ) -> Submission {
        let profit = crate::submission::compute_profit(revenue, cost);
        Submission {
            id: Uuid::new_v4(),
            user_id,
            status,
            details: SubmissionDetails {
                product: ProductInfo {
                    product_name: None,
                    product_category: None,
                    product_brand: None,
                    product_sku: None,
                    marketplace: "amazon_us".to_string(),
                    reporting_period: "monthly".to_string(),
                    currency: "USD".to_string(),
                },
                financials: Financials {
                    revenue,
                    cost,
                    profit,
                    profit_margin: crate::submission::compute_profit_margin(profit, revenue),
                    cogs: None,
                    amazon_fees: None,
                    units_sold: None,
                    average_selling_price: None,
                    inventory_value: None,
                },
                ads: AdMetrics::default(),
                performance: PerformanceMetrics::default(),
                date,
                note: None,
                proof_url: None,
            },
            approved_at,
            created_at: date,
        }
    }

    fn approved(user_id: Uuid, revenue: f64, cost: f64, at: DateTime<Utc>) -> Submission {
        submission(user_id, SubmissionStatus::Approved, revenue, cost, Some(at), at)
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert!("week".parse::<Period>().is_err());
        assert_eq!(Period::default(), Period::Month);
    }

    #[test]
    fn test_window_start_is_first_of_month() {
        let now = ts(2024, 3, 17);
        assert_eq!(
            Period::Month.window_start(&now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(Period::All.window_start(&now), None);
    }

    #[test]
    fn test_window_start_uses_callers_zone() {
        // 2024-03-01 02:00 at UTC+5 is still February in UTC.
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(
            Period::Month.window_start(&now),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 19, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_single_approved_submission() {
        let a = Uuid::new_v4();
        let rows = compute_rankings(
            &[approved(a, 5000.0, 2000.0, ts(2024, 3, 10))],
            &[profile(a, "alice")],
            Period::Month.window_start(&ts(2024, 3, 17)),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].total_profit, 3000.0);
        assert_eq!(rows[0].total_revenue, 5000.0);
        assert_eq!(rows[0].submission_count, 1);
        assert_eq!(rows[0].name, "alice");
        assert_eq!(rows[0].marketplaces, vec!["amazon_us".to_string()]);
    }

    #[test]
    fn test_month_excludes_older_approvals() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let subs = vec![
            approved(a, 1000.0, 0.0, ts(2024, 3, 2)),
            approved(b, 1000.0, 0.0, ts(2024, 2, 27)),
        ];
        let profiles = vec![profile(a, "a"), profile(b, "b")];

        let window = Period::Month.window_start(&ts(2024, 3, 17));
        let month = compute_rankings(&subs, &profiles, window);
        assert_eq!(month.len(), 1);
        assert_eq!(month[0].user_id, a);

        let all = compute_rankings(&subs, &profiles, None);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_month_window_includes_its_first_instant() {
        let a = Uuid::new_v4();
        let start = Period::Month.window_start(&ts(2024, 3, 17)).unwrap();
        let on_boundary = approved(a, 10.0, 0.0, start);
        let just_before = approved(a, 99.0, 0.0, start - chrono::Duration::microseconds(1));

        let rows = compute_rankings(&[on_boundary, just_before], &[profile(a, "a")], Some(start));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].submission_count, 1);
        assert_eq!(rows[0].total_profit, 10.0);
    }

    #[test]
    fn test_huge_unit_counts_saturate() {
        let a = Uuid::new_v4();
        let mut s1 = approved(a, 10.0, 1.0, ts(2024, 3, 5));
        s1.details.financials.units_sold = Some(9_000_000_000_000_000_000);
        let mut s2 = approved(a, 10.0, 1.0, ts(2024, 3, 6));
        s2.details.financials.units_sold = Some(9_000_000_000_000_000_000);

        let rows = compute_rankings(&[s1, s2], &[profile(a, "a")], None);
        assert_eq!(rows[0].total_units_sold, i64::MAX);
        assert_eq!(rows[0].submission_count, 2);
    }

    #[test]
    fn test_window_uses_approved_at_before_date() {
        let a = Uuid::new_v4();
        // Reported for last month, approved this month: counts.
        let late_approval = submission(
            a,
            SubmissionStatus::Approved,
            100.0,
            0.0,
            Some(ts(2024, 3, 5)),
            ts(2024, 2, 10),
        );
        // No approval stamp: falls back to date.
        let undated = submission(a, SubmissionStatus::Approved, 50.0, 0.0, None, ts(2024, 2, 10));

        let rows = compute_rankings(
            &[late_approval, undated],
            &[profile(a, "a")],
            Period::Month.window_start(&ts(2024, 3, 17)),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].submission_count, 1);
        assert_eq!(rows[0].total_profit, 100.0);
    }

    #[test]
    fn test_rejected_and_pending_never_rank() {
        let a = Uuid::new_v4();
        let subs = vec![
            submission(a, SubmissionStatus::Rejected, 1000.0, 0.0, None, ts(2024, 3, 5)),
            submission(a, SubmissionStatus::Pending, 1000.0, 0.0, None, ts(2024, 3, 5)),
        ];
        assert!(compute_rankings(&subs, &[profile(a, "a")], None).is_empty());
    }

    #[test]
    fn test_profiles_without_submissions_are_not_listed() {
        let a = Uuid::new_v4();
        let idle = Uuid::new_v4();
        let rows = compute_rankings(
            &[approved(a, 10.0, 0.0, ts(2024, 3, 5))],
            &[profile(a, "a"), profile(idle, "idle")],
            None,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, a);
    }

    #[test]
    fn test_averages_skip_missing_values() {
        let a = Uuid::new_v4();
        let mut with_ads = approved(a, 1000.0, 500.0, ts(2024, 3, 5));
        with_ads.details.ads.acos = Some(20.0);
        with_ads.details.ads.tacos = Some(0.0);
        with_ads.details.ads.ppc_spend = Some(50.0);
        let mut without_ads = approved(a, 1000.0, 900.0, ts(2024, 3, 6));
        without_ads.details.financials.units_sold = Some(7);

        let rows = compute_rankings(&[with_ads, without_ads], &[profile(a, "a")], None);
        let row = &rows[0];
        assert_eq!(row.avg_acos, Some(20.0));
        // Zero is a real sample, distinct from no data.
        assert_eq!(row.avg_tacos, Some(0.0));
        assert_eq!(row.avg_profit_margin, Some(30.0));
        assert_eq!(row.total_ppc_spend, 50.0);
        assert_eq!(row.total_units_sold, 7);
        assert_eq!(row.last_submission_at, ts(2024, 3, 6));
    }

    #[test]
    fn test_averages_are_none_without_samples() {
        let a = Uuid::new_v4();
        let rows = compute_rankings(
            &[approved(a, 0.0, 0.0, ts(2024, 3, 5))],
            &[profile(a, "a")],
            None,
        );
        assert_eq!(rows[0].avg_acos, None);
        assert_eq!(rows[0].avg_tacos, None);
        assert_eq!(rows[0].avg_profit_margin, None);
    }

    #[test]
    fn test_categories_are_distinct_and_sorted() {
        let a = Uuid::new_v4();
        let mut s1 = approved(a, 10.0, 0.0, ts(2024, 3, 5));
        s1.details.product.product_category = Some("Toys".to_string());
        let mut s2 = approved(a, 10.0, 0.0, ts(2024, 3, 6));
        s2.details.product.product_category = Some("Kitchen".to_string());
        s2.details.product.marketplace = "amazon_uk".to_string();
        let mut s3 = approved(a, 10.0, 0.0, ts(2024, 3, 7));
        s3.details.product.product_category = Some("Toys".to_string());

        let rows = compute_rankings(&[s1, s2, s3], &[profile(a, "a")], None);
        assert_eq!(rows[0].categories, vec!["Kitchen", "Toys"]);
        assert_eq!(rows[0].marketplaces, vec!["amazon_uk", "amazon_us"]);
    }

    #[test]
    fn test_sorted_by_profit_with_stable_ties() {
        let low = Uuid::new_v4();
        let tie_a = Uuid::new_v4();
        let tie_b = Uuid::new_v4();
        let subs = vec![
            approved(low, 100.0, 0.0, ts(2024, 3, 5)),
            approved(tie_a, 500.0, 0.0, ts(2024, 3, 5)),
            approved(tie_b, 500.0, 0.0, ts(2024, 3, 5)),
        ];
        let profiles = vec![profile(low, "low"), profile(tie_a, "a"), profile(tie_b, "b")];

        let first = compute_rankings(&subs, &profiles, None);
        let mut reversed_subs = subs.clone();
        reversed_subs.reverse();
        let second = compute_rankings(&reversed_subs, &profiles, None);

        let order: Vec<Uuid> = first.iter().map(|r| r.user_id).collect();
        assert_eq!(order, second.iter().map(|r| r.user_id).collect::<Vec<_>>());
        assert_eq!(order[2], low);
        assert!(order[0] < order[1]);
        assert_eq!(first.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
