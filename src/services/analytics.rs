//! Pure history filtering and aggregation over in-memory scan collections.
//!
//! Everything here is deterministic and infallible: bad dates or missing
//! brands are normalized to safe defaults instead of surfacing errors, so
//! dashboard rendering can never be taken down by one malformed record.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::scan::{ScanHistoryItem, ScanStatus};

/// Assumed average retail value of one intercepted counterfeit, in USD.
const INTERCEPT_UNIT_VALUE_USD: u64 = 85;

/// Maximum rows surfaced by the brand risk ranking.
const BRAND_RISK_LIMIT: usize = 5;

/// Status filter for history views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(ScanStatus),
}

impl StatusFilter {
    /// Parse a UI/query value; "ALL" (any case) or empty means no filtering.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(ScanStatus::coerce(trimmed))
        }
    }
}

/// One Sun..Sat bucket of scan activity.
///
/// Anything not AUTHENTIC counts as `fake` here, including SUSPICIOUS and
/// UNKNOWN. That lumping matches the shipped dashboard and is kept for
/// compatibility; see DESIGN.md before changing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub day: &'static str,
    pub authentic: u32,
    pub fake: u32,
}

/// One row of the brand risk ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRisk {
    pub brand: String,
    pub risk_percent: u32,
}

/// Top-line dashboard numbers derived from the full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_scans: usize,
    pub intercepted_fakes: usize,
    /// Estimated savings, thousands-grouped (e.g. "1,275").
    pub value_saved: String,
}

/// Parse a scan timestamp as a human would read it: the wall-clock value in
/// the timestamp's own offset, not normalized to UTC.
///
/// Accepts RFC 3339 first, then a few naive fallbacks client-generated ids
/// have been seen to carry. Returns `None` for garbage.
pub fn parse_scan_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    None
}

/// Filter a history view by status and an inclusive calendar-day date range.
///
/// `start` covers from 00:00:00.000 of its day, `end` through 23:59:59.999 of
/// its day; either bound may be supplied alone. Items whose date cannot be
/// parsed are dropped only when a date bound is active. Relative order of
/// survivors is preserved.
pub fn filter_history<'a>(
    history: &'a [ScanHistoryItem],
    status: StatusFilter,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<&'a ScanHistoryItem> {
    let start_bound = start.map(|d| d.and_time(NaiveTime::MIN));
    let end_bound = end.and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999));

    history
        .iter()
        .filter(|item| {
            if let StatusFilter::Only(wanted) = status {
                if item.result.status != wanted {
                    return false;
                }
            }
            if start_bound.is_some() || end_bound.is_some() {
                let Some(ts) = parse_scan_date(&item.date) else {
                    return false;
                };
                if let Some(lo) = start_bound {
                    if ts < lo {
                        return false;
                    }
                }
                if let Some(hi) = end_bound {
                    if ts > hi {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Bucket scans into seven day-of-week counters, Sun..Sat.
///
/// Items with unparseable dates are skipped entirely, so bucket totals sum to
/// the count of items with readable dates.
pub fn weekly_activity(history: &[ScanHistoryItem]) -> [DayActivity; 7] {
    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    let mut buckets = DAYS.map(|day| DayActivity {
        day,
        authentic: 0,
        fake: 0,
    });

    for item in history {
        let Some(ts) = parse_scan_date(&item.date) else {
            continue;
        };
        let bucket = &mut buckets[ts.weekday().num_days_from_sunday() as usize];
        if item.result.status == ScanStatus::Authentic {
            bucket.authentic += 1;
        } else {
            bucket.fake += 1;
        }
    }

    buckets
}

/// Rank brands by share of FAKE/SUSPICIOUS scans.
///
/// Brands are grouped in first-seen order (missing brand -> "Unknown"); a
/// brand is surfaced when it has any risk at all or enough volume (> 2 scans)
/// to be meaningful at 0%. Descending by risk, stable on ties, top 5. Callers
/// can rely on at least one row: an empty ranking yields a placeholder.
pub fn brand_risk(history: &[ScanHistoryItem]) -> Vec<BrandRisk> {
    struct Tally {
        total: u32,
        risky: u32,
    }

    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, Tally> = HashMap::new();

    for item in history {
        let brand = match item.result.brand.trim() {
            "" => "Unknown".to_string(),
            b => b.to_string(),
        };
        let tally = tallies.entry(brand.clone()).or_insert_with(|| {
            order.push(brand);
            Tally { total: 0, risky: 0 }
        });
        tally.total += 1;
        if item.result.status.is_risky() {
            tally.risky += 1;
        }
    }

    let mut ranked: Vec<BrandRisk> = order
        .into_iter()
        .filter_map(|brand| {
            let tally = &tallies[&brand];
            let risk_percent =
                ((f64::from(tally.risky) / f64::from(tally.total)) * 100.0).round() as u32;
            (risk_percent > 0 || tally.total > 2).then_some(BrandRisk {
                brand,
                risk_percent,
            })
        })
        .collect();

    // Vec::sort_by is stable, so ties keep first-seen order.
    ranked.sort_by(|a, b| b.risk_percent.cmp(&a.risk_percent));
    ranked.truncate(BRAND_RISK_LIMIT);

    if ranked.is_empty() {
        ranked.push(BrandRisk {
            brand: "No High Risks".to_string(),
            risk_percent: 0,
        });
    }
    ranked
}

/// Derive the dashboard's headline numbers.
pub fn dashboard_metrics(history: &[ScanHistoryItem]) -> DashboardMetrics {
    let intercepted_fakes = history
        .iter()
        .filter(|item| item.result.status.is_risky())
        .count();

    DashboardMetrics {
        total_scans: history.len(),
        intercepted_fakes,
        value_saved: group_thousands(intercepted_fakes as u64 * INTERCEPT_UNIT_VALUE_USD),
    }
}

/// Format an integer with comma grouping: 1275 -> "1,275".
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scan::ScanResult;

    fn item(id: &str, date: &str, brand: &str, status: ScanStatus) -> ScanHistoryItem {
        ScanHistoryItem {
            id: id.to_string(),
            date: date.to_string(),
            thumbnail: "data:image/png;base64,AAAA".to_string(),
            result: ScanResult {
                product_name: "Velvet Matte Lipstick".to_string(),
                brand: brand.to_string(),
                status,
                confidence_score: 80.0,
                reasoning: vec![],
                manufacturing_date: None,
                batch_code: None,
                official_website: None,
                reporting_url: None,
                extracted_text: vec![],
            },
        }
    }

    fn sample_history() -> Vec<ScanHistoryItem> {
        vec![
            item("1", "2025-03-05T10:00:00Z", "Acme", ScanStatus::Authentic),
            item("2", "2025-03-04T09:30:00Z", "Acme", ScanStatus::Fake),
            item("3", "2025-03-03T08:00:00Z", "Zeta", ScanStatus::Suspicious),
            item("4", "2025-03-02T12:00:00Z", "Zeta", ScanStatus::Authentic),
            item("5", "2025-03-01T15:45:00Z", "", ScanStatus::Unknown),
        ]
    }

    #[test]
    fn filter_all_is_identity() {
        let history = sample_history();
        let out = filter_history(&history, StatusFilter::All, None, None);
        assert_eq!(out.len(), history.len());
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn filter_by_status_partitions_history() {
        let history = sample_history();
        let statuses = [
            ScanStatus::Authentic,
            ScanStatus::Suspicious,
            ScanStatus::Fake,
            ScanStatus::Unknown,
        ];
        let mut total = 0;
        for status in statuses {
            let out = filter_history(&history, StatusFilter::Only(status), None, None);
            assert!(out.iter().all(|i| i.result.status == status));
            total += out.len();
        }
        assert_eq!(total, history.len());
    }

    #[test]
    fn date_bounds_are_inclusive_to_the_millisecond() {
        let history = vec![
            item("start-exact", "2025-03-02T00:00:00.000Z", "A", ScanStatus::Authentic),
            item("before-start", "2025-03-01T23:59:59.999Z", "A", ScanStatus::Authentic),
            item("end-exact", "2025-03-04T23:59:59.999Z", "A", ScanStatus::Authentic),
            item("after-end", "2025-03-05T00:00:00.000Z", "A", ScanStatus::Authentic),
        ];
        let start = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();

        let out = filter_history(&history, StatusFilter::All, Some(start), Some(end));
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["start-exact", "end-exact"]);
    }

    #[test]
    fn either_date_bound_works_alone() {
        let history = sample_history();
        let cutoff = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let from = filter_history(&history, StatusFilter::All, Some(cutoff), None);
        assert_eq!(from.len(), 3); // Mar 3, 4, 5

        let until = filter_history(&history, StatusFilter::All, None, Some(cutoff));
        assert_eq!(until.len(), 3); // Mar 1, 2, 3
    }

    #[test]
    fn unparseable_date_excluded_only_under_date_bounds() {
        let mut history = sample_history();
        history.push(item("bad", "not-a-date", "Acme", ScanStatus::Fake));

        let unbounded = filter_history(&history, StatusFilter::All, None, None);
        assert_eq!(unbounded.len(), 6);

        let bounded = filter_history(
            &history,
            StatusFilter::All,
            Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            None,
        );
        assert!(bounded.iter().all(|i| i.id != "bad"));
    }

    #[test]
    fn status_filter_parse_handles_all_and_garbage() {
        assert_eq!(StatusFilter::parse("ALL"), StatusFilter::All);
        assert_eq!(StatusFilter::parse(""), StatusFilter::All);
        assert_eq!(
            StatusFilter::parse("fake"),
            StatusFilter::Only(ScanStatus::Fake)
        );
        assert_eq!(
            StatusFilter::parse("bogus"),
            StatusFilter::Only(ScanStatus::Unknown)
        );
    }

    #[test]
    fn weekly_buckets_sum_to_parseable_items() {
        let mut history = sample_history();
        history.push(item("bad", "garbage", "Acme", ScanStatus::Fake));

        let buckets = weekly_activity(&history);
        let total: u32 = buckets.iter().map(|b| b.authentic + b.fake).sum();
        assert_eq!(total as usize, history.len() - 1);
    }

    #[test]
    fn weekly_lumps_non_authentic_as_fake() {
        // 2025-03-03 is a Monday.
        let history = vec![
            item("a", "2025-03-03T10:00:00Z", "A", ScanStatus::Suspicious),
            item("b", "2025-03-03T11:00:00Z", "A", ScanStatus::Unknown),
            item("c", "2025-03-03T12:00:00Z", "A", ScanStatus::Fake),
            item("d", "2025-03-03T13:00:00Z", "A", ScanStatus::Authentic),
        ];
        let buckets = weekly_activity(&history);
        assert_eq!(buckets[1].day, "Mon");
        assert_eq!(buckets[1].fake, 3);
        assert_eq!(buckets[1].authentic, 1);
    }

    #[test]
    fn weekday_read_in_local_offset_not_utc() {
        // 23:30 -07:00 on Saturday is already Sunday in UTC; the human
        // reading is Saturday and that is what we bucket.
        let history = vec![item(
            "a",
            "2025-03-01T23:30:00-07:00",
            "A",
            ScanStatus::Authentic,
        )];
        let buckets = weekly_activity(&history);
        assert_eq!(buckets[6].day, "Sat");
        assert_eq!(buckets[6].authentic, 1);
    }

    #[test]
    fn brand_risk_ranks_descending_and_caps_at_five() {
        let mut history = Vec::new();
        for (i, brand) in ["B1", "B2", "B3", "B4", "B5", "B6"].iter().enumerate() {
            // Brand Bk gets k fakes out of 10 scans -> 10%..60% risk.
            for j in 0..10 {
                let status = if j <= i {
                    ScanStatus::Fake
                } else {
                    ScanStatus::Authentic
                };
                history.push(item(
                    &format!("{brand}-{j}"),
                    "2025-03-03T10:00:00Z",
                    brand,
                    status,
                ));
            }
        }
        let ranked = brand_risk(&history);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.windows(2).all(|w| w[0].risk_percent >= w[1].risk_percent));
        assert_eq!(ranked[0].brand, "B6");
        assert_eq!(ranked[0].risk_percent, 60);
        // B1 at 10% is the one squeezed out.
        assert!(ranked.iter().all(|r| r.brand != "B1"));
    }

    #[test]
    fn brand_risk_empty_history_yields_placeholder() {
        let ranked = brand_risk(&[]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].brand, "No High Risks");
        assert_eq!(ranked[0].risk_percent, 0);
    }

    #[test]
    fn zero_risk_brand_needs_volume_to_surface() {
        // Two clean scans: filtered out. Three clean scans: kept at 0%.
        let two = vec![
            item("1", "2025-03-03T10:00:00Z", "CleanCo", ScanStatus::Authentic),
            item("2", "2025-03-03T11:00:00Z", "CleanCo", ScanStatus::Authentic),
        ];
        assert_eq!(brand_risk(&two)[0].brand, "No High Risks");

        let mut three = two.clone();
        three.push(item("3", "2025-03-03T12:00:00Z", "CleanCo", ScanStatus::Authentic));
        let ranked = brand_risk(&three);
        assert_eq!(ranked[0].brand, "CleanCo");
        assert_eq!(ranked[0].risk_percent, 0);
    }

    #[test]
    fn missing_brand_groups_under_unknown() {
        let history = vec![
            item("1", "2025-03-03T10:00:00Z", "", ScanStatus::Fake),
            item("2", "2025-03-03T11:00:00Z", "  ", ScanStatus::Fake),
        ];
        let ranked = brand_risk(&history);
        assert_eq!(ranked[0].brand, "Unknown");
        assert_eq!(ranked[0].risk_percent, 100);
    }

    #[test]
    fn dashboard_metrics_counts_and_formats() {
        let history = sample_history();
        let metrics = dashboard_metrics(&history);
        assert_eq!(metrics.total_scans, 5);
        assert_eq!(metrics.intercepted_fakes, 2); // one FAKE + one SUSPICIOUS
        assert_eq!(metrics.value_saved, "170");
    }

    #[test]
    fn value_saved_groups_thousands() {
        // 15 intercepts * $85 = $1,275.
        let history: Vec<ScanHistoryItem> = (0..15)
            .map(|i| item(&i.to_string(), "2025-03-03T10:00:00Z", "A", ScanStatus::Fake))
            .collect();
        assert_eq!(dashboard_metrics(&history).value_saved, "1,275");
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(1_000_000), "1,000,000");
    }

    #[test]
    fn end_to_end_week_scenario() {
        // Mon/Tue/Wed of 2025-03: 3rd, 4th, 5th.
        let history = vec![
            item("mon", "2025-03-03T09:00:00Z", "Acme", ScanStatus::Authentic),
            item("tue", "2025-03-04T09:00:00Z", "Acme", ScanStatus::Fake),
            item("wed", "2025-03-05T09:00:00Z", "Zeta", ScanStatus::Authentic),
        ];

        let buckets = weekly_activity(&history);
        assert_eq!((buckets[1].day, buckets[1].authentic), ("Mon", 1));
        assert_eq!((buckets[2].day, buckets[2].fake), ("Tue", 1));
        assert_eq!((buckets[3].day, buckets[3].authentic), ("Wed", 1));

        // Acme: 1/2 risky = 50%. Zeta: 0% on a single scan, filtered out.
        let ranked = brand_risk(&history);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].brand, "Acme");
        assert_eq!(ranked[0].risk_percent, 50);
    }
}
