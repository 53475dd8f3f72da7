//! Correlation engine and scatter-series extraction.

use crate::process::filter_valid;
use crate::types::{CorrelationMatrix, Metric, Record};
use crate::util::round2;
use serde::Serialize;

/// Pearson coefficient over paired samples, from running sums.
///
/// Returns 0 for an empty sample or when either side has no variance.
pub fn pearson(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (mut n, mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0usize, 0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in pairs {
        n += 1;
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let num = sxy - (sx * sy / n);
    let den = ((sxx - sx * sx / n) * (syy - sy * sy / n)).sqrt();
    // A tiny negative variance from cancellation gives NaN here.
    if den == 0.0 || !den.is_finite() {
        return 0.0;
    }
    num / den
}

/// Correlation between two fields over the records where both are finite,
/// rounded to two decimals and clamped to `[-1, 1]`.
pub fn correlate_pair(records: &[Record], a: Metric, b: Metric) -> f64 {
    if a == b {
        return 1.0;
    }
    let pairs = records
        .iter()
        .map(|r| (r.metric(a), r.metric(b)))
        .filter(|(x, y)| x.is_finite() && y.is_finite());
    round2(pearson(pairs)).clamp(-1.0, 1.0)
}

/// Full matrix over `fields`. Every off-diagonal cell is computed on its own.
pub fn correlate(records: &[Record], fields: &[Metric]) -> CorrelationMatrix {
    let values = fields
        .iter()
        .map(|a| fields.iter().map(|b| correlate_pair(records, *a, *b)).collect())
        .collect();
    CorrelationMatrix {
        fields: fields.to_vec(),
        values,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub city: String,
    pub time: String,
    pub x: f64,
    pub y: f64,
}

/// Points for an `x` vs `y` scatter, limited to valid records in date order.
pub fn scatter_points(records: &[Record], x: Metric, y: Metric) -> Vec<ScatterPoint> {
    filter_valid(records, &[x, y])
        .into_iter()
        .map(|r| ScatterPoint {
            time: r.period_label(),
            x: r.metric(x),
            y: r.metric(y),
            city: r.city,
        })
        .collect()
}
