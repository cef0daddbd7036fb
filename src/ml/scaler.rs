use crate::error::{ClubError, Result};

/// Zero-mean, unit-variance scaling fitted per column.
///
/// Uses the population standard deviation; a constant column is only
/// centred (its scale is taken as 1).
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        let Some(first) = rows.first() else {
            return Err(ClubError::Model("cannot fit scaler on no rows".to_string()));
        };
        let width = first.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(ClubError::Model("ragged rows passed to scaler".to_string()));
        }

        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        let scales = (0..width)
            .map(|c| {
                let var = rows.iter().map(|r| (r[c] - means[c]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        self.means = means;
        self.scales = scales;
        Ok(())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.means.is_empty() {
            return Err(ClubError::Model("scaler has not been fitted".to_string()));
        }
        rows.iter()
            .map(|row| {
                if row.len() != self.means.len() {
                    return Err(ClubError::Model(format!(
                        "expected {} columns, got {}",
                        self.means.len(),
                        row.len()
                    )));
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (mean, scale))| (v - mean) / scale)
                    .collect())
            })
            .collect()
    }

    pub fn fit_transform(&mut self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit(rows)?;
        self.transform(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&rows).unwrap();

        assert_eq!(scaled[0], vec![-1.0, 0.0]);
        assert_eq!(scaled[1], vec![1.0, 0.0]);
    }

    #[test]
    fn test_unfitted_and_mismatched() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform(&[vec![1.0]]).is_err());

        let mut scaler = StandardScaler::new();
        assert!(scaler.fit(&[]).is_err());
        scaler.fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&[vec![1.0]]).is_err());
    }
}
