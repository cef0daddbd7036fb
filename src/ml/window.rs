//! Lookback windows over monthly feature rows.
//!
//! Row layout is always `[month_num, year, domain counts...]`. A training
//! example is `lookback` consecutive rows flattened oldest-first; its target
//! is the value of the month right after the window.

use chrono::{Datelike, NaiveDate};

use crate::scenario::month_start;

/// Flatten sliding windows into training examples.
///
/// Yields `rows.len() - lookback` examples (none if there are not enough rows).
pub fn prepare_time_series_data(
    rows: &[Vec<f64>],
    targets: &[f64],
    lookback: usize,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let examples = rows.len().min(targets.len()).saturating_sub(lookback);

    let mut x = Vec::with_capacity(examples);
    let mut y = Vec::with_capacity(examples);
    for i in 0..examples {
        x.push(rows[i..i + lookback].concat());
        y.push(targets[i + lookback]);
    }
    (x, y)
}

/// Column names for a flattened window: `new_members_lag1` is the most recent month.
pub fn windowed_feature_names(columns: &[&str], lookback: usize) -> Vec<String> {
    (0..lookback)
        .flat_map(|j| {
            let lag = lookback - j;
            columns.iter().map(move |c| format!("{}_lag{}", c, lag))
        })
        .collect()
}

/// Last day of each of the `months` months following the month of `last`
pub fn future_month_ends(last: NaiveDate, months: usize) -> Vec<NaiveDate> {
    (1..=months as u32)
        .map(|k| {
            let next = month_start(last, k + 1);
            next.pred_opt().unwrap_or(next)
        })
        .collect()
}

/// Build one flattened feature window per future date.
///
/// Starting from the most recent training window, each step drops the oldest
/// row and appends `[month, year, counts of the newest row]`. Only the date
/// columns advance: the domain counts are carried over, never replaced by
/// the model's own predictions.
pub fn roll_forward(last_window: &[f64], n_features: usize, dates: &[NaiveDate]) -> Vec<Vec<f64>> {
    if n_features < 2 || last_window.len() < n_features {
        return Vec::new();
    }

    let mut window: Vec<Vec<f64>> = last_window
        .chunks(n_features)
        .map(|chunk| chunk.to_vec())
        .collect();

    dates
        .iter()
        .map(|date| {
            let newest = &window[window.len() - 1];
            let mut row = vec![date.month() as f64, date.year() as f64];
            row.extend_from_slice(&newest[2..]);

            window.remove(0);
            window.push(row);
            window.concat()
        })
        .collect()
}
