use crate::csv_text::{self, ParseReport};
use crate::error::{InsightsError, Result};
use crate::types::{normalize_header, Metric, RawRow, Record};
use crate::util::{parse_date_safe, parse_f64_or_nan, parse_i32_safe, parse_quarter_safe};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Normalized header names that map onto typed `Record` fields. Anything else
/// goes to `Record::extra`.
static KNOWN_COLUMNS: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut set: HashSet<String> = ["city", "date", "year", "quarter"]
        .into_iter()
        .map(String::from)
        .collect();
    for m in Metric::ALL {
        for name in m.column_names() {
            set.insert(normalize_header(name));
        }
    }
    set
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub data_lines: usize,
    pub dropped_lines: usize,
    pub records: usize,
    pub invalid_dates: usize,
    pub recomputed_ratios: usize,
    pub cities: usize,
}

/// Look a value up by its preferred spellings, then by a case/spacing
/// insensitive match. Blank values count as missing so a later spelling
/// can still supply the value.
fn lookup<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a str> {
    for name in names {
        if let Some(v) = row.get(*name) {
            if !v.trim().is_empty() {
                return Some(v.as_str());
            }
        }
    }
    let wanted = normalize_header(names.first()?);
    row.iter()
        .find(|(k, v)| !v.trim().is_empty() && normalize_header(k) == wanted)
        .map(|(_, v)| v.as_str())
}

/// Turn one tokenized row into a typed record. Never fails.
pub fn normalize_row(row: &RawRow) -> Record {
    let city = lookup(row, &["city"])
        .map(|c| c.trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut record = Record::empty(city);
    record.date = parse_date_safe(lookup(row, &["date"]));
    record.year = parse_i32_safe(lookup(row, &["year"]));
    record.quarter = parse_quarter_safe(lookup(row, &["quarter"]));

    for m in Metric::ALL {
        *record.metric_mut(m) = parse_f64_or_nan(lookup(row, m.column_names()));
    }

    // Runs last: it depends on this row's own coerced activity and units.
    if needs_ratio(record.airbnb_ratio) {
        if let Some(ratio) = derive_ratio(record.airbnb_activity, record.total_units) {
            record.airbnb_ratio = ratio;
        }
    }

    record.extra = row
        .iter()
        .filter(|(k, _)| !KNOWN_COLUMNS.contains(&normalize_header(k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    record
}

fn needs_ratio(ratio: f64) -> bool {
    ratio.is_nan() || ratio == 0.0
}

fn derive_ratio(activity: f64, total_units: f64) -> Option<f64> {
    if activity.is_finite() && total_units.is_finite() && total_units > 0.0 {
        Some(activity / total_units)
    } else {
        None
    }
}

pub fn normalize(rows: &[RawRow]) -> Vec<Record> {
    rows.iter().map(normalize_row).collect()
}

/// Tokenize and normalize CSV text in one go.
pub fn load_from_str(text: &str) -> (Vec<Record>, LoadReport) {
    let (rows, parse_report) = csv_text::parse_with_report(text);
    let records = normalize(&rows);
    let report = build_report(&rows, &records, parse_report);
    info!(
        records = report.records,
        dropped = report.dropped_lines,
        cities = report.cities,
        "loaded housing records"
    );
    (records, report)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<(Vec<Record>, LoadReport)> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| InsightsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "read csv file");
    Ok(load_from_str(&text))
}

fn build_report(rows: &[RawRow], records: &[Record], parsed: ParseReport) -> LoadReport {
    let invalid_dates = records.iter().filter(|r| r.date.is_none()).count();
    let recomputed_ratios = rows
        .iter()
        .zip(records)
        .filter(|(row, rec)| {
            needs_ratio(parse_f64_or_nan(lookup(row, Metric::AirbnbRatio.column_names())))
                && !needs_ratio(rec.airbnb_ratio)
        })
        .count();
    let cities: HashSet<&str> = records.iter().map(|r| r.city.as_str()).collect();
    LoadReport {
        data_lines: parsed.data_lines,
        dropped_lines: parsed.dropped_lines,
        records: records.len(),
        invalid_dates,
        recomputed_ratios,
        cities: cities.len(),
    }
}
