use crate::error::Result;
use crate::types::{CorrelationMatrix, Metric};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

fn matrix_records(m: &CorrelationMatrix, title: fn(Metric) -> &'static str) -> Vec<Vec<String>> {
    let mut records = Vec::with_capacity(m.fields.len() + 1);
    let mut header = vec!["field".to_string()];
    header.extend(m.fields.iter().map(|f| title(*f).to_string()));
    records.push(header);
    for (field, row) in m.fields.iter().zip(&m.values) {
        let mut record = vec![title(*field).to_string()];
        record.extend(row.iter().map(|v| format!("{:.2}", v)));
        records.push(record);
    }
    records
}

/// Correlation matrix as CSV: a `field` column followed by one column per field.
pub fn write_matrix_csv(path: impl AsRef<Path>, m: &CorrelationMatrix) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in matrix_records(m, Metric::name) {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no data available)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Markdown preview of the matrix, headed by display labels.
pub fn render_matrix(m: &CorrelationMatrix) -> String {
    let mut builder = Builder::default();
    for record in matrix_records(m, Metric::label) {
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_matrix(m: &CorrelationMatrix) {
    if m.fields.is_empty() {
        println!("(no data available)\n");
        return;
    }
    println!("{}\n", render_matrix(m));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CorrelationMatrix {
        CorrelationMatrix {
            fields: vec![Metric::Hpi, Metric::MedianRent],
            values: vec![vec![1.0, -0.5], vec![-0.5, 1.0]],
        }
    }

    #[test]
    fn matrix_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.csv");
        write_matrix_csv(&path, &matrix()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "field,hpi,median_rent");
        assert_eq!(lines[1], "hpi,1.00,-0.50");
        assert_eq!(lines[2], "median_rent,-0.50,1.00");
    }

    #[test]
    fn rendered_matrix_is_markdown() {
        let s = render_matrix(&matrix());
        assert!(s.contains("| field"));
        assert!(s.contains("| Housing Price Index"));
        assert!(s.contains("Median Rent"));
        assert!(!s.contains("median_rent"));
        assert!(s.contains("-0.50"));
    }

    #[test]
    fn json_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        write_json(&path, &matrix().to_nested_map()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["hpi"]["median_rent"], -0.5);
    }
}
