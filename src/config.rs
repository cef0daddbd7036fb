// ⚙️ Configuration - fees, growth targets, starting member counts
//
// Immutable once built. Components receive a `Config` (or an `Arc<Config>`)
// at construction instead of looking settings up on demand.

use crate::entities::PerCountry;
use crate::error::{ClubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// FALLBACK TREND
// ============================================================================

/// Monthly compounding factor used when there is too little history to train on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthTrend {
    Low,
    Neutral,
    High,
}

impl GrowthTrend {
    pub fn multiplier(&self) -> f64 {
        match self {
            GrowthTrend::Low => 1.02,
            GrowthTrend::Neutral => 1.05,
            GrowthTrend::High => 1.08,
        }
    }
}

// ============================================================================
// ML SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    /// Months of features concatenated into one training example
    pub lookback: usize,

    /// Forecast horizon in months
    pub forecast_months: usize,

    /// Minimum history rows for the growth and revenue series
    pub min_series_rows: usize,

    /// Minimum member rows for churn training
    pub min_churn_rows: usize,

    pub n_estimators: usize,
    pub seed: u64,
    pub fallback_trend: GrowthTrend,
}

impl Default for MlConfig {
    fn default() -> Self {
        MlConfig {
            lookback: 3,
            forecast_months: 12,
            min_series_rows: 6,
            min_churn_rows: 10,
            n_estimators: 100,
            seed: 42,
            fallback_trend: GrowthTrend::Neutral,
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub annual_fee: f64,
    pub event_fee: f64,
    pub num_events: u32,
    pub marketing_percentage: f64,

    /// Baseline monthly expenses used for the dashboard's cash position
    pub monthly_expenses: f64,

    /// Per member per year
    pub country_manager_fee: f64,

    pub base_salary: f64,
    pub num_employees: u32,

    /// Flat yearly operations budget
    pub operations_cost: f64,

    pub starting_members: PerCountry<f64>,

    /// Netherlands/Belgium: percent per month. Germany: new members per month.
    pub growth_targets: PerCountry<f64>,

    pub ml: MlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            annual_fee: 795.0,
            event_fee: 50.0,
            num_events: 4,
            marketing_percentage: 15.0,
            monthly_expenses: 15000.0,
            country_manager_fee: 100.0,
            base_salary: 5000.0,
            num_employees: 1,
            operations_cost: 180000.0,
            starting_members: PerCountry::new(135.0, 26.0, 0.0),
            growth_targets: PerCountry::new(10.0, 15.0, 63.0),
            ml: MlConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing keys take their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let money = [
            ("annual_fee", self.annual_fee),
            ("event_fee", self.event_fee),
            ("marketing_percentage", self.marketing_percentage),
            ("monthly_expenses", self.monthly_expenses),
            ("country_manager_fee", self.country_manager_fee),
            ("base_salary", self.base_salary),
            ("operations_cost", self.operations_cost),
        ];
        for (field, value) in money {
            check_non_negative(field, value)?;
        }

        for (country, value) in self.starting_members.iter() {
            check_non_negative(&format!("starting_members.{}", country), *value)?;
        }
        for (country, value) in self.growth_targets.iter() {
            if !value.is_finite() {
                return Err(ClubError::invalid(
                    &format!("growth_targets.{}", country),
                    "must be a finite number",
                ));
            }
        }

        if self.ml.lookback == 0 {
            return Err(ClubError::invalid("ml.lookback", "must be at least 1"));
        }
        if self.ml.forecast_months == 0 {
            return Err(ClubError::invalid("ml.forecast_months", "must be at least 1"));
        }
        if self.ml.n_estimators == 0 {
            return Err(ClubError::invalid("ml.n_estimators", "must be at least 1"));
        }

        Ok(())
    }

    /// Copy with adjusted growth targets (scenario planning overrides)
    pub fn with_growth_targets(&self, growth_targets: PerCountry<f64>) -> Self {
        Config {
            growth_targets,
            ..self.clone()
        }
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ClubError::invalid(field, "must be a non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Country;

    #[test]
    fn test_defaults_match_club_settings() {
        let config = Config::default();
        assert_eq!(config.annual_fee, 795.0);
        assert_eq!(config.num_events, 4);
        assert_eq!(*config.starting_members.get(Country::Belgium), 26.0);
        assert_eq!(*config.growth_targets.get(Country::Germany), 63.0);
        assert_eq!(config.ml.lookback, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json_str(r#"{"annual_fee": 900, "ml": {"fallback_trend": "high"}}"#)
            .unwrap();
        assert_eq!(config.annual_fee, 900.0);
        assert_eq!(config.event_fee, 50.0);
        assert_eq!(config.ml.fallback_trend, GrowthTrend::High);
        assert_eq!(config.ml.min_churn_rows, 10);
    }

    #[test]
    fn test_rejects_negative_fee() {
        let err = Config::from_json_str(r#"{"event_fee": -5}"#).unwrap_err();
        assert!(err.to_string().contains("event_fee"));
    }

    #[test]
    fn test_with_growth_targets_leaves_original() {
        let config = Config::default();
        let adjusted = config.with_growth_targets(PerCountry::new(5.0, 5.0, 10.0));
        assert_eq!(*adjusted.growth_targets.get(Country::Germany), 10.0);
        assert_eq!(*config.growth_targets.get(Country::Germany), 63.0);
    }

    #[test]
    fn test_trend_multipliers() {
        assert_eq!(GrowthTrend::Low.multiplier(), 1.02);
        assert_eq!(GrowthTrend::Neutral.multiplier(), 1.05);
        assert_eq!(GrowthTrend::High.multiplier(), 1.08);
    }
}
