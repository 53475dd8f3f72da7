use crate::grouping::{units_by_period, CityScope};
use crate::loader::LoadReport;
use crate::process::{filter_valid_with, growth_by_city, most_recent_by_city, ZeroPolicy};
use crate::stats::correlate;
use crate::types::{
    CitySnapshotRow, CorrelationMatrix, GrowthRow, Metric, Record, SummaryStats, UnitsRow,
};
use crate::util::{format_number, format_percent_change, format_share};

/// Latest observation per city, formatted for display.
pub fn city_snapshot_rows(records: &[Record]) -> Vec<CitySnapshotRow> {
    most_recent_by_city(records)
        .into_values()
        .map(|r| CitySnapshotRow {
            period: r.period_label(),
            airbnb_activity: format_number(r.airbnb_activity, 0),
            airbnb_ratio: format_share(r.airbnb_ratio),
            hpi: format_number(r.hpi, 2),
            median_rent: format_number(r.median_rent, 2),
            ownership_rate: format_number(r.ownership_rate, 2),
            rental_rate: format_number(r.rental_rate, 2),
            unemployment: format_number(r.unemployment, 2),
            median_income: format_number(r.median_income, 0),
            city: r.city,
        })
        .collect()
}

pub fn growth_rows(records: &[Record]) -> Vec<GrowthRow> {
    growth_by_city(records, &Metric::GROWTH_DEFAULT)
        .into_values()
        .map(|g| GrowthRow {
            airbnb_growth: format_percent_change(g.growth(Metric::AirbnbActivity)),
            hpi_growth: format_percent_change(g.growth(Metric::Hpi)),
            rent_growth: format_percent_change(g.growth(Metric::MedianRent)),
            city: g.city,
            period_start: g.period_start,
            period_end: g.period_end,
        })
        .collect()
}

/// Heatmap input: gate the records on every field, then correlate.
pub fn correlation_view(
    records: &[Record],
    fields: &[Metric],
    zeros: ZeroPolicy,
) -> CorrelationMatrix {
    let valid = filter_valid_with(records, fields, zeros);
    correlate(&valid, fields)
}

/// Housing-unit composition per period. `all` must not be narrowed by city:
/// the all-cities average divides by every city it contains.
pub fn units_rows(all: &[Record], scope: &CityScope) -> Vec<UnitsRow> {
    units_by_period(all, scope)
        .into_iter()
        .map(|p| UnitsRow {
            owned_units: format_number(p.get(Metric::OwnedUnits), 0),
            rental_units: format_number(p.get(Metric::RentalUnits), 0),
            period: p.time,
        })
        .collect()
}

pub fn generate_summary(
    records: &[Record],
    load: &LoadReport,
    correlations: &CorrelationMatrix,
) -> SummaryStats {
    let first = records.iter().min_by(|a, b| a.cmp_chronological(b));
    let last = records.iter().max_by(|a, b| a.cmp_chronological(b));
    SummaryStats {
        total_records: records.len(),
        dropped_lines: load.dropped_lines,
        total_cities: most_recent_by_city(records).len(),
        first_period: first.map(Record::period_label),
        last_period: last.map(Record::period_label),
        correlations: correlations.to_nested_map(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(city: &str, y: i32, q: u8) -> Record {
        Record::empty(city).with_period(y, q)
    }

    #[test]
    fn snapshot_rows_format_latest_values() {
        let records = vec![
            obs("SF", 2020, 1).with_metric(Metric::Hpi, 100.0),
            obs("SF", 2021, 2)
                .with_metric(Metric::Hpi, 1234.5)
                .with_metric(Metric::AirbnbRatio, 0.0537),
        ];
        let rows = city_snapshot_rows(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "2021-Q2");
        assert_eq!(rows[0].hpi, "1,234.50");
        assert_eq!(rows[0].airbnb_ratio, "5.4%");
        assert_eq!(rows[0].median_rent, "n/a");
    }

    #[test]
    fn growth_rows_use_default_metrics() {
        let records = vec![
            obs("Austin", 2020, 1)
                .with_metric(Metric::Hpi, 200.0)
                .with_metric(Metric::MedianRent, 1000.0),
            obs("Austin", 2022, 4)
                .with_metric(Metric::Hpi, 300.0)
                .with_metric(Metric::MedianRent, 900.0),
        ];
        let rows = growth_rows(&records);
        assert_eq!(rows[0].hpi_growth, "50.0%");
        assert_eq!(rows[0].rent_growth, "-10.0%");
        assert_eq!(rows[0].airbnb_growth, "0.0%");
        assert_eq!(rows[0].period_end, "2022-Q4");
    }

    #[test]
    fn summary_spans_all_periods() {
        let records = vec![obs("SF", 2021, 3), obs("Austin", 2019, 2), obs("SF", 2020, 1)];
        let m = correlate(&records, &[Metric::Hpi]);
        let load = LoadReport {
            dropped_lines: 2,
            ..LoadReport::default()
        };
        let s = generate_summary(&records, &load, &m);
        assert_eq!(s.total_records, 3);
        assert_eq!(s.total_cities, 2);
        assert_eq!(s.dropped_lines, 2);
        assert_eq!(s.first_period.as_deref(), Some("2019-Q2"));
        assert_eq!(s.last_period.as_deref(), Some("2021-Q3"));
        assert_eq!(s.correlations["hpi"]["hpi"], 1.0);
    }
}
