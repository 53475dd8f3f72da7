use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

use crate::error::InsightsError;

/// One CSV data line keyed by (trimmed) header name. Values are untouched strings.
pub type RawRow = HashMap<String, String>;

/// The numeric columns of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Population,
    MedianIncome,
    TotalUnits,
    OccupiedUnits,
    OwnedUnits,
    RentalUnits,
    OwnershipRate,
    RentalRate,
    MedianRent,
    Unemployment,
    AirbnbActivity,
    AirbnbRatio,
    Hpi,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Population,
        Metric::MedianIncome,
        Metric::TotalUnits,
        Metric::OccupiedUnits,
        Metric::OwnedUnits,
        Metric::RentalUnits,
        Metric::OwnershipRate,
        Metric::RentalRate,
        Metric::MedianRent,
        Metric::Unemployment,
        Metric::AirbnbActivity,
        Metric::AirbnbRatio,
        Metric::Hpi,
    ];

    /// Metrics shown in the correlation heatmap.
    pub const CORRELATION_DEFAULT: [Metric; 7] = [
        Metric::Hpi,
        Metric::MedianRent,
        Metric::RentalRate,
        Metric::AirbnbActivity,
        Metric::AirbnbRatio,
        Metric::MedianIncome,
        Metric::Unemployment,
    ];

    /// Metrics compared in the per-city growth table.
    pub const GROWTH_DEFAULT: [Metric; 3] =
        [Metric::AirbnbActivity, Metric::Hpi, Metric::MedianRent];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Population => "population",
            Metric::MedianIncome => "median_income",
            Metric::TotalUnits => "total_units",
            Metric::OccupiedUnits => "occupied_units",
            Metric::OwnedUnits => "owned_units",
            Metric::RentalUnits => "rental_units",
            Metric::OwnershipRate => "ownership_rate",
            Metric::RentalRate => "rental_rate",
            Metric::MedianRent => "median_rent",
            Metric::Unemployment => "unemployment",
            Metric::AirbnbActivity => "airbnb_activity",
            Metric::AirbnbRatio => "airbnb_ratio",
            Metric::Hpi => "hpi",
        }
    }

    /// Header spellings accepted for this column, in order of preference.
    pub fn column_names(self) -> &'static [&'static str] {
        match self {
            Metric::TotalUnits => &["total_units", "total units"],
            Metric::OccupiedUnits => &["occupied_units", "occupied units"],
            Metric::OwnedUnits => &["owned_units", "owned units"],
            Metric::RentalUnits => &["rental_units", "rental units"],
            Metric::Population => &["population"],
            Metric::MedianIncome => &["median_income"],
            Metric::OwnershipRate => &["ownership_rate"],
            Metric::RentalRate => &["rental_rate"],
            Metric::MedianRent => &["median_rent"],
            Metric::Unemployment => &["unemployment"],
            Metric::AirbnbActivity => &["airbnb_activity"],
            Metric::AirbnbRatio => &["airbnb_ratio"],
            Metric::Hpi => &["hpi"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Population => "Population",
            Metric::MedianIncome => "Median Income",
            Metric::TotalUnits => "Total Units",
            Metric::OccupiedUnits => "Occupied Units",
            Metric::OwnedUnits => "Owned Units",
            Metric::RentalUnits => "Rental Units",
            Metric::OwnershipRate => "Ownership Rate",
            Metric::RentalRate => "Rental Rate",
            Metric::MedianRent => "Median Rent",
            Metric::Unemployment => "Unemployment",
            Metric::AirbnbActivity => "Airbnb Activity",
            Metric::AirbnbRatio => "Airbnb Ratio",
            Metric::Hpi => "Housing Price Index",
        }
    }

    /// Parse a comma-separated list such as `"hpi, median_rent"`.
    pub fn parse_list(s: &str) -> Result<Vec<Metric>, InsightsError> {
        let fields = s
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(Metric::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(InsightsError::EmptyFieldList);
        }
        Ok(fields)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_header(s);
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == key)
            .ok_or_else(|| InsightsError::UnknownMetric(s.trim().to_string()))
    }
}

/// Lowercase, trim, and fold runs of spaces/underscores into a single `_`.
pub fn normalize_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for c in s.trim().chars() {
        if c == ' ' || c == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// One normalized city/period observation.
///
/// Metrics hold `f64::NAN` when the source value was missing or unparsable.
/// `year`, `quarter` and `date` are `None` in the same situation.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub city: String,
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub quarter: Option<u8>,
    pub population: f64,
    pub median_income: f64,
    pub total_units: f64,
    pub occupied_units: f64,
    pub owned_units: f64,
    pub rental_units: f64,
    pub ownership_rate: f64,
    pub rental_rate: f64,
    pub median_rent: f64,
    pub unemployment: f64,
    pub airbnb_activity: f64,
    pub airbnb_ratio: f64,
    pub hpi: f64,
    /// Source columns outside the known schema, passed through verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Record {
    /// A record for `city` with every optional field absent.
    pub fn empty(city: impl Into<String>) -> Self {
        Record {
            city: city.into(),
            date: None,
            year: None,
            quarter: None,
            population: f64::NAN,
            median_income: f64::NAN,
            total_units: f64::NAN,
            occupied_units: f64::NAN,
            owned_units: f64::NAN,
            rental_units: f64::NAN,
            ownership_rate: f64::NAN,
            rental_rate: f64::NAN,
            median_rent: f64::NAN,
            unemployment: f64::NAN,
            airbnb_activity: f64::NAN,
            airbnb_ratio: f64::NAN,
            hpi: f64::NAN,
            extra: BTreeMap::new(),
        }
    }

    pub fn metric(&self, m: Metric) -> f64 {
        match m {
            Metric::Population => self.population,
            Metric::MedianIncome => self.median_income,
            Metric::TotalUnits => self.total_units,
            Metric::OccupiedUnits => self.occupied_units,
            Metric::OwnedUnits => self.owned_units,
            Metric::RentalUnits => self.rental_units,
            Metric::OwnershipRate => self.ownership_rate,
            Metric::RentalRate => self.rental_rate,
            Metric::MedianRent => self.median_rent,
            Metric::Unemployment => self.unemployment,
            Metric::AirbnbActivity => self.airbnb_activity,
            Metric::AirbnbRatio => self.airbnb_ratio,
            Metric::Hpi => self.hpi,
        }
    }

    pub fn metric_mut(&mut self, m: Metric) -> &mut f64 {
        match m {
            Metric::Population => &mut self.population,
            Metric::MedianIncome => &mut self.median_income,
            Metric::TotalUnits => &mut self.total_units,
            Metric::OccupiedUnits => &mut self.occupied_units,
            Metric::OwnedUnits => &mut self.owned_units,
            Metric::RentalUnits => &mut self.rental_units,
            Metric::OwnershipRate => &mut self.ownership_rate,
            Metric::RentalRate => &mut self.rental_rate,
            Metric::MedianRent => &mut self.median_rent,
            Metric::Unemployment => &mut self.unemployment,
            Metric::AirbnbActivity => &mut self.airbnb_activity,
            Metric::AirbnbRatio => &mut self.airbnb_ratio,
            Metric::Hpi => &mut self.hpi,
        }
    }

    /// Builder-style setter, mostly handy for fixtures.
    pub fn with_metric(mut self, m: Metric, value: f64) -> Self {
        *self.metric_mut(m) = value;
        self
    }

    pub fn with_period(mut self, year: i32, quarter: u8) -> Self {
        self.year = Some(year);
        self.quarter = Some(quarter);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// `2021-Q3` when year and quarter are known, otherwise the ISO date,
    /// otherwise `unknown`.
    pub fn period_label(&self) -> String {
        match (self.year, self.quarter, self.date) {
            (Some(y), Some(q), _) => format!("{}-Q{}", y, q),
            (_, _, Some(d)) => d.format("%Y-%m-%d").to_string(),
            (Some(y), None, None) => y.to_string(),
            _ => "unknown".to_string(),
        }
    }

    /// Order two records in time.
    ///
    /// Each record is placed by its date, or by the last day of its
    /// `(year, quarter)` when it has no date; `(year, quarter)` then breaks
    /// ties. Records with neither sort first.
    pub fn cmp_chronological(&self, other: &Record) -> Ordering {
        self.chrono_key().cmp(&other.chrono_key())
    }

    fn chrono_key(&self) -> (Option<NaiveDate>, Option<i32>, Option<u8>) {
        let placed = self.date.or_else(|| quarter_end(self.year?, self.quarter?));
        (placed, self.year, self.quarter)
    }
}

fn quarter_end(year: i32, quarter: u8) -> Option<NaiveDate> {
    let (month, day) = match quarter {
        1 => (3, 31),
        2 => (6, 30),
        3 => (9, 30),
        4 => (12, 31),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn same_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

// NaN is the missing-value sentinel, so two missing values count as equal.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.city == other.city
            && self.date == other.date
            && self.year == other.year
            && self.quarter == other.quarter
            && self.extra == other.extra
            && Metric::ALL
                .iter()
                .all(|m| same_f64(self.metric(*m), other.metric(*m)))
    }
}

/// First and last observation of a city with the percent change between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthSummary {
    pub city: String,
    pub first: Record,
    pub last: Record,
    pub growth: BTreeMap<Metric, f64>,
    pub period_start: String,
    pub period_end: String,
}

impl GrowthSummary {
    /// Percent change for `m`, or 0 when the metric was not requested.
    pub fn growth(&self, m: Metric) -> f64 {
        self.growth.get(&m).copied().unwrap_or(0.0)
    }
}

/// Square matrix of Pearson coefficients over `fields`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<Metric>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Metric, b: Metric) -> Option<f64> {
        let i = self.fields.iter().position(|f| *f == a)?;
        let j = self.fields.iter().position(|f| *f == b)?;
        Some(self.values[i][j])
    }

    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.fields
            .iter()
            .zip(&self.values)
            .map(|(a, row)| {
                let inner = self
                    .fields
                    .iter()
                    .zip(row)
                    .map(|(b, v)| (b.name().to_string(), *v))
                    .collect();
                (a.name().to_string(), inner)
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CitySnapshotRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "AirbnbActivity")]
    #[tabled(rename = "AirbnbActivity")]
    pub airbnb_activity: String,
    #[serde(rename = "AirbnbRatio")]
    #[tabled(rename = "AirbnbRatio")]
    pub airbnb_ratio: String,
    #[serde(rename = "HPI")]
    #[tabled(rename = "HPI")]
    pub hpi: String,
    #[serde(rename = "MedianRent")]
    #[tabled(rename = "MedianRent")]
    pub median_rent: String,
    #[serde(rename = "OwnershipRate")]
    #[tabled(rename = "OwnershipRate")]
    pub ownership_rate: String,
    #[serde(rename = "RentalRate")]
    #[tabled(rename = "RentalRate")]
    pub rental_rate: String,
    #[serde(rename = "Unemployment")]
    #[tabled(rename = "Unemployment")]
    pub unemployment: String,
    #[serde(rename = "MedianIncome")]
    #[tabled(rename = "MedianIncome")]
    pub median_income: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GrowthRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "PeriodStart")]
    #[tabled(rename = "PeriodStart")]
    pub period_start: String,
    #[serde(rename = "PeriodEnd")]
    #[tabled(rename = "PeriodEnd")]
    pub period_end: String,
    #[serde(rename = "AirbnbGrowth")]
    #[tabled(rename = "AirbnbGrowth")]
    pub airbnb_growth: String,
    #[serde(rename = "HpiGrowth")]
    #[tabled(rename = "HpiGrowth")]
    pub hpi_growth: String,
    #[serde(rename = "RentGrowth")]
    #[tabled(rename = "RentGrowth")]
    pub rent_growth: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct UnitsRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "OwnedUnits")]
    #[tabled(rename = "OwnedUnits")]
    pub owned_units: String,
    #[serde(rename = "RentalUnits")]
    #[tabled(rename = "RentalUnits")]
    pub rental_units: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub dropped_lines: usize,
    pub total_cities: usize,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub correlations: BTreeMap<String, BTreeMap<String, f64>>,
}
