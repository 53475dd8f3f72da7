// Record-level views: validity gate, per-city recency, growth, and the
// dashboard's city/year/quarter filter.
//
// All functions borrow the input slice and return freshly built values.
use crate::types::{GrowthSummary, Metric, Record};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Whether an exact `0.0` counts as a valid value for a required field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroPolicy {
    #[default]
    Keep,
    Exclude,
}

impl ZeroPolicy {
    fn accepts(self, v: f64) -> bool {
        v.is_finite() && !(self == ZeroPolicy::Exclude && v == 0.0)
    }
}

/// Records with a valid date and finite values for every `required` field,
/// sorted by date (stable on ties). Zeros are kept.
pub fn filter_valid(records: &[Record], required: &[Metric]) -> Vec<Record> {
    filter_valid_with(records, required, ZeroPolicy::Keep)
}

pub fn filter_valid_with(
    records: &[Record],
    required: &[Metric],
    zeros: ZeroPolicy,
) -> Vec<Record> {
    let mut out: Vec<Record> = records
        .iter()
        .filter(|r| r.date.is_some() && required.iter().all(|m| zeros.accepts(r.metric(*m))))
        .cloned()
        .collect();
    out.sort_by_key(|r| r.date);
    debug!(kept = out.len(), of = records.len(), "validity filter");
    out
}

/// Latest record per city. On an exact tie the first one seen stays.
pub fn most_recent_by_city(records: &[Record]) -> BTreeMap<String, Record> {
    let mut latest: BTreeMap<String, &Record> = BTreeMap::new();
    for r in records {
        match latest.get(&r.city) {
            Some(existing) if r.cmp_chronological(existing) != Ordering::Greater => {}
            _ => {
                latest.insert(r.city.clone(), r);
            }
        }
    }
    latest
        .into_iter()
        .map(|(city, r)| (city, r.clone()))
        .collect()
}

/// Percent change from `first` to `last`.
///
/// A zero baseline gives 0 rather than infinity, and so does a missing value
/// at either end.
pub fn percent_change(first: f64, last: f64) -> f64 {
    if !first.is_finite() || !last.is_finite() || first == 0.0 {
        return 0.0;
    }
    ((last - first) / first) * 100.0
}

/// First and last record per city with the percent change of each `metrics`
/// entry between them.
pub fn growth_by_city(records: &[Record], metrics: &[Metric]) -> BTreeMap<String, GrowthSummary> {
    let mut extremes: BTreeMap<&str, (&Record, &Record)> = BTreeMap::new();
    for r in records {
        let entry = extremes.entry(r.city.as_str()).or_insert((r, r));
        if r.cmp_chronological(entry.0) == Ordering::Less {
            entry.0 = r;
        }
        if r.cmp_chronological(entry.1) == Ordering::Greater {
            entry.1 = r;
        }
    }

    extremes
        .into_iter()
        .map(|(city, (first, last))| {
            let growth = metrics
                .iter()
                .map(|m| (*m, percent_change(first.metric(*m), last.metric(*m))))
                .collect();
            let summary = GrowthSummary {
                city: city.to_string(),
                period_start: first.period_label(),
                period_end: last.period_label(),
                first: first.clone(),
                last: last.clone(),
                growth,
            };
            (city.to_string(), summary)
        })
        .collect()
}

/// City/year/quarter selection; `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub city: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<u8>,
}

impl DashboardFilter {
    pub fn matches(&self, r: &Record) -> bool {
        self.city.as_deref().map_or(true, |c| r.city == c)
            && self.year.map_or(true, |y| r.year == Some(y))
            && self.quarter.map_or(true, |q| r.quarter == Some(q))
    }

    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    pub fn is_all(&self) -> bool {
        self.city.is_none() && self.year.is_none() && self.quarter.is_none()
    }
}

/// Distinct cities in first-seen order.
pub fn available_cities(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.city.as_str()))
        .map(|r| r.city.clone())
        .collect()
}

/// Distinct known years, ascending.
pub fn available_years(records: &[Record]) -> Vec<i32> {
    records
        .iter()
        .filter_map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
