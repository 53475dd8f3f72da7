// Group-by helpers that turn records into chart-ready period series.
//
// Grouping goes through a hash index, so every public helper re-sorts its
// output by period before returning it.
use crate::types::{Metric, Record};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// A `(year, quarter)` bucket. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PeriodKey {
    pub year: i32,
    pub quarter: u8,
}

impl PeriodKey {
    pub fn of(r: &Record) -> Option<PeriodKey> {
        Some(PeriodKey {
            year: r.year?,
            quarter: r.quarter?,
        })
    }

    pub fn label(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }
}

/// Group records by `key_fn` (records mapping to `None` are skipped) and reduce
/// each group with `reduce_fn`. Groups come out in first-seen key order and
/// members keep input order.
pub fn group_by<'a, K, T, KF, RF>(records: &'a [Record], key_fn: KF, mut reduce_fn: RF) -> Vec<T>
where
    K: Eq + Hash + Clone,
    KF: Fn(&Record) -> Option<K>,
    RF: FnMut(&K, &[&'a Record]) -> T,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a Record>)> = Vec::new();
    for r in records {
        let Some(key) = key_fn(r) else { continue };
        match index.get(&key) {
            Some(&i) => groups[i].1.push(r),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![r]));
            }
        }
    }
    groups
        .iter()
        .map(|(k, members)| reduce_fn(k, members.as_slice()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityScope {
    All,
    City(String),
}

impl CityScope {
    fn includes(&self, r: &Record) -> bool {
        match self {
            CityScope::All => true,
            CityScope::City(c) => &r.city == c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    /// Sum divided by the number of distinct in-scope cities of the
    /// unfiltered input, not of the period being reduced.
    AverageOverCities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAggregate {
    pub period: PeriodKey,
    pub time: String,
    pub values: BTreeMap<Metric, f64>,
}

impl PeriodAggregate {
    pub fn get(&self, m: Metric) -> f64 {
        self.values.get(&m).copied().unwrap_or(0.0)
    }
}

/// Per-period sums (or cross-city averages) of `metrics` over the records in
/// `scope`. Missing metric values contribute 0.
pub fn aggregate_by_period(
    all: &[Record],
    metrics: &[Metric],
    scope: &CityScope,
    reduction: Reduction,
) -> Vec<PeriodAggregate> {
    let divisor = match reduction {
        Reduction::Sum => 1.0,
        Reduction::AverageOverCities => {
            let cities: HashSet<&str> = all
                .iter()
                .filter(|r| scope.includes(r))
                .map(|r| r.city.as_str())
                .collect();
            cities.len().max(1) as f64
        }
    };

    let mut out = group_by(
        all,
        |r| PeriodKey::of(r).filter(|_| scope.includes(r)),
        |key, members| {
            let values = metrics
                .iter()
                .map(|m| {
                    let sum: f64 = members
                        .iter()
                        .map(|r| r.metric(*m))
                        .filter(|v| v.is_finite())
                        .sum();
                    (*m, sum / divisor)
                })
                .collect();
            PeriodAggregate {
                period: *key,
                time: key.label(),
                values,
            }
        },
    );
    out.sort_by_key(|a| a.period);
    out
}

/// Owned vs rental units per period; averaged across cities for `All`.
pub fn units_by_period(all: &[Record], scope: &CityScope) -> Vec<PeriodAggregate> {
    aggregate_by_period(
        all,
        &[Metric::OwnedUnits, Metric::RentalUnits],
        scope,
        Reduction::AverageOverCities,
    )
}

/// One period with a value per city, for multi-line charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: PeriodKey,
    pub time: String,
    pub values: BTreeMap<String, f64>,
}

/// `metric` per city per period. When a city has several records in one
/// period the last one wins; missing values leave a gap.
pub fn series_by_period(records: &[Record], metric: Metric) -> Vec<SeriesPoint> {
    let mut out = group_by(records, PeriodKey::of, |key, members| {
        let mut values = BTreeMap::new();
        for r in members {
            let v = r.metric(metric);
            if v.is_finite() {
                values.insert(r.city.clone(), v);
            }
        }
        SeriesPoint {
            period: *key,
            time: key.label(),
            values,
        }
    });
    out.sort_by_key(|p| p.period);
    out
}

/// The highest-quarter record for each `(city, year)`, standing in for the
/// year-end value. Ties keep the first record seen.
pub fn year_end_snapshots(records: &[Record]) -> Vec<Record> {
    let mut out = group_by(
        records,
        |r| r.year.map(|y| (r.city.clone(), y)),
        |_, members| {
            let mut best = members[0];
            for r in &members[1..] {
                if r.quarter > best.quarter {
                    best = *r;
                }
            }
            best.clone()
        },
    );
    out.sort_by_key(|r| (r.year, r.quarter));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(city: &str, y: i32, q: u8) -> Record {
        Record::empty(city).with_period(y, q)
    }

    #[test]
    fn group_by_keeps_first_seen_order() {
        let records = vec![obs("B", 2021, 1), obs("A", 2021, 1), obs("B", 2020, 1)];
        let groups = group_by(&records, |r| Some(r.city.clone()), |k, m| (k.clone(), m.len()));
        assert_eq!(groups, vec![("B".to_string(), 2), ("A".to_string(), 1)]);
    }

    #[test]
    fn all_cities_average_divides_by_full_city_count() {
        let records = vec![
            obs("Austin", 2021, 1)
                .with_metric(Metric::OwnedUnits, 100.0)
                .with_metric(Metric::RentalUnits, 50.0),
            obs("SF", 2021, 1)
                .with_metric(Metric::OwnedUnits, 300.0)
                .with_metric(Metric::RentalUnits, f64::NAN),
            // Only SF reports Q2; the divisor is still 2.
            obs("SF", 2021, 2).with_metric(Metric::OwnedUnits, 400.0),
        ];
        let units = units_by_period(&records, &CityScope::All);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].time, "2021-Q1");
        assert_eq!(units[0].get(Metric::OwnedUnits), 200.0);
        assert_eq!(units[0].get(Metric::RentalUnits), 25.0);
        assert_eq!(units[1].get(Metric::OwnedUnits), 200.0);

        let sf = units_by_period(&records, &CityScope::City("SF".into()));
        assert_eq!(sf[1].get(Metric::OwnedUnits), 400.0);
    }

    #[test]
    fn sum_reduction_and_chronological_output() {
        let records = vec![
            obs("A", 2022, 1).with_metric(Metric::Hpi, 1.0),
            obs("A", 2021, 3).with_metric(Metric::Hpi, 2.0),
            obs("B", 2021, 3).with_metric(Metric::Hpi, 3.0),
            Record::empty("C").with_metric(Metric::Hpi, 99.0),
        ];
        let agg = aggregate_by_period(&records, &[Metric::Hpi], &CityScope::All, Reduction::Sum);
        let labels: Vec<&str> = agg.iter().map(|a| a.time.as_str()).collect();
        assert_eq!(labels, vec!["2021-Q3", "2022-Q1"]);
        assert_eq!(agg[0].get(Metric::Hpi), 5.0);
    }

    #[test]
    fn series_has_value_per_city() {
        let records = vec![
            obs("SF", 2021, 2).with_metric(Metric::Hpi, 300.0),
            obs("Austin", 2021, 1).with_metric(Metric::Hpi, 200.0),
            obs("SF", 2021, 1).with_metric(Metric::Hpi, 290.0),
            obs("Austin", 2021, 2),
        ];
        let series = series_by_period(&records, Metric::Hpi);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].values["Austin"], 200.0);
        assert_eq!(series[0].values["SF"], 290.0);
        assert!(!series[1].values.contains_key("Austin"));
    }

    #[test]
    fn year_end_keeps_highest_quarter() {
        let records = vec![
            obs("SF", 2021, 2).with_metric(Metric::MedianRent, 1.0),
            obs("SF", 2021, 4).with_metric(Metric::MedianRent, 2.0),
            obs("SF", 2020, 3).with_metric(Metric::MedianRent, 3.0),
            obs("Austin", 2021, 4).with_metric(Metric::MedianRent, 4.0),
            obs("SF", 2021, 4).with_metric(Metric::MedianRent, 5.0),
        ];
        let snaps = year_end_snapshots(&records);
        let got: Vec<(String, f64)> = snaps
            .iter()
            .map(|r| (r.city.clone(), r.median_rent))
            .collect();
        assert_eq!(
            got,
            vec![
                ("SF".to_string(), 3.0),
                ("SF".to_string(), 2.0),
                ("Austin".to_string(), 4.0),
            ]
        );
    }
}
