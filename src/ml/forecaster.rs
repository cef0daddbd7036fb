// 🤖 ML Forecaster - member growth, churn and revenue predictions
//
// Training data comes from `ClubData`. Whenever the history is too short or
// training fails, growth and revenue degrade to a closed-form compounding
// projection seeded from the configured starting members; churn has no
// substitute and is reported as unavailable.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::forest::RandomForestRegressor;
use super::scaler::StandardScaler;
use super::window::{future_month_ends, prepare_time_series_data, roll_forward, windowed_feature_names};
use super::Regressor;
use crate::config::{Config, GrowthTrend};
use crate::db::{ClubData, MemberActivity, MonthlyCountryStats, MonthlyRevenueStats};
use crate::entities::{Country, PerCountry};
use crate::error::{ClubError, Result};
use crate::outcome::{FallbackReason, Outcome};

const GROWTH_COLUMNS: [&str; 3] = ["month_num", "year", "new_members"];
const CHURN_COLUMNS: [&str; 3] = ["membership_duration", "transaction_count", "avg_transaction"];
const REVENUE_COLUMNS: [&str; 4] = ["month_num", "year", "active_members", "transaction_count"];

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

fn label_importances(names: Vec<String>, values: Vec<f64>) -> Vec<FeatureImportance> {
    names
        .into_iter()
        .zip(values)
        .map(|(name, importance)| FeatureImportance { name, importance })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthForecast {
    /// Month-ends after the most recent month of any country
    pub dates: Vec<NaiveDate>,
    /// Month-ends each country's series is labelled with: after that
    /// country's own last month, or after `as_of` for fallback series
    pub country_dates: BTreeMap<Country, Vec<NaiveDate>>,
    /// Predicted active members per country, one value per country date
    pub predictions: BTreeMap<Country, Vec<f64>>,
    /// Countries whose series came from the compounding projection
    pub fallback_countries: Vec<Country>,
    pub feature_importances: BTreeMap<Country, Vec<FeatureImportance>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnScore {
    pub member_id: i64,
    /// `1 - predicted activity score`; not calibrated and not clamped
    pub churn_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnReport {
    pub scores: Vec<ChurnScore>,
    pub feature_importances: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePrediction {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub feature_importances: Vec<FeatureImportance>,
}

// ============================================================================
// CLOSED-FORM FALLBACK
// ============================================================================

/// `starting * trend^k` for k = 1..=months, per country
pub fn fallback_growth(
    starting: &PerCountry<f64>,
    trend: GrowthTrend,
    months: usize,
) -> PerCountry<Vec<f64>> {
    starting.map(|_, count| compounding(*count, trend, months))
}

fn compounding(start: f64, trend: GrowthTrend, months: usize) -> Vec<f64> {
    let factor = trend.multiplier();
    (1..=months).map(|k| start * factor.powi(k as i32)).collect()
}

/// Monthly revenue implied by the compounding member projection
pub fn fallback_revenue(config: &Config, months: usize) -> Vec<f64> {
    let yearly_per_member = config.annual_fee + config.event_fee * config.num_events as f64;
    let growth = fallback_growth(&config.starting_members, config.ml.fallback_trend, months);

    (0..months)
        .map(|i| {
            let members: f64 = growth.iter().map(|(_, series)| series[i]).sum();
            members * yearly_per_member / 12.0
        })
        .collect()
}

// ============================================================================
// FORECASTER
// ============================================================================

/// Fitted model plus the forecast it produced
struct Trained {
    predictions: Vec<f64>,
    importances: Vec<f64>,
}

pub struct MlForecaster<'a, D: ClubData + ?Sized, R = RandomForestRegressor> {
    data: &'a D,
    config: &'a Config,
    as_of: NaiveDate,
    horizon: usize,
    regressor: R,
}

impl<'a, D: ClubData + ?Sized> MlForecaster<'a, D, RandomForestRegressor> {
    pub fn new(data: &'a D, config: &'a Config, as_of: NaiveDate) -> Self {
        MlForecaster {
            data,
            config,
            as_of,
            horizon: config.ml.forecast_months,
            regressor: RandomForestRegressor::from(&config.ml),
        }
    }
}

impl<'a, D: ClubData + ?Sized, R: Regressor + Clone> MlForecaster<'a, D, R> {
    /// Swap in another regressor; each training run starts from a clone of it
    pub fn with_regressor<R2: Regressor + Clone>(self, regressor: R2) -> MlForecaster<'a, D, R2> {
        MlForecaster {
            data: self.data,
            config: self.config,
            as_of: self.as_of,
            horizon: self.horizon,
            regressor,
        }
    }

    pub fn horizon(mut self, months: usize) -> Self {
        self.horizon = months;
        self
    }

    fn lookback(&self) -> usize {
        self.config.ml.lookback.max(1)
    }

    fn fallback_dates(&self) -> Vec<NaiveDate> {
        future_month_ends(self.as_of, self.horizon)
    }

    /// Fit a fresh regressor on windowed rows, then roll the newest window forward
    fn train_series(&self, rows: &[Vec<f64>], targets: &[f64], dates: &[NaiveDate]) -> Result<Trained> {
        let lookback = self.lookback();
        let (x, y) = prepare_time_series_data(rows, targets, lookback);
        if x.is_empty() {
            return Err(ClubError::InsufficientData {
                required: lookback + 1,
                available: rows.len(),
            });
        }

        let mut model = self.regressor.clone();
        model.fit(&x, &y)?;

        let n_features = rows[0].len();
        let last_window = rows[rows.len() - lookback..].concat();
        let future = roll_forward(&last_window, n_features, dates);
        let predictions = model.predict(&future)?;

        Ok(Trained {
            predictions,
            importances: model.feature_importances(),
        })
    }

    // ------------------------------------------------------------------------
    // Member growth
    // ------------------------------------------------------------------------

    pub fn predict_member_growth(&self) -> Outcome<GrowthForecast> {
        match self.data.monthly_country_stats() {
            Ok(history) => self.predict_member_growth_from(&history),
            Err(e) => {
                warn!(error = %e, "member history unavailable, using fallback growth");
                Outcome::fallback(self.fallback_growth_forecast(), FallbackReason::store(e))
            }
        }
    }

    fn fallback_growth_forecast(&self) -> GrowthForecast {
        let series = fallback_growth(
            &self.config.starting_members,
            self.config.ml.fallback_trend,
            self.horizon,
        );
        let dates = self.fallback_dates();
        GrowthForecast {
            country_dates: Country::ALL.into_iter().map(|c| (c, dates.clone())).collect(),
            dates,
            predictions: series.iter().map(|(c, s)| (c, s.clone())).collect(),
            fallback_countries: Country::ALL.to_vec(),
            feature_importances: BTreeMap::new(),
        }
    }

    pub fn predict_member_growth_from(&self, history: &[MonthlyCountryStats]) -> Outcome<GrowthForecast> {
        let required = self.config.ml.min_series_rows;
        if history.len() < required {
            warn!(required, available = history.len(), "not enough member history, using fallback growth");
            return Outcome::fallback(
                self.fallback_growth_forecast(),
                FallbackReason::InsufficientData {
                    required,
                    available: history.len(),
                },
            );
        }

        let last_month = history.iter().map(|s| s.month).max().unwrap_or(self.as_of);
        let dates = future_month_ends(last_month, self.horizon);
        let names = windowed_feature_names(&GROWTH_COLUMNS, self.lookback());

        let mut forecast = GrowthForecast {
            dates,
            country_dates: BTreeMap::new(),
            predictions: BTreeMap::new(),
            fallback_countries: Vec::new(),
            feature_importances: BTreeMap::new(),
        };
        let mut first_reason = None;

        for country in Country::ALL {
            let mut series: Vec<&MonthlyCountryStats> =
                history.iter().filter(|s| s.country == country).collect();
            series.sort_by_key(|s| s.month);

            let rows: Vec<Vec<f64>> = series
                .iter()
                .map(|s| vec![s.month.month() as f64, s.month.year() as f64, s.new_members as f64])
                .collect();
            let targets: Vec<f64> = series.iter().map(|s| s.active_members as f64).collect();
            let country_last = series.last().map_or(last_month, |s| s.month);
            let dates = future_month_ends(country_last, self.horizon);

            match self.train_series(&rows, &targets, &dates) {
                Ok(trained) => {
                    debug!(country = %country, rows = rows.len(), "trained growth model");
                    forecast.country_dates.insert(country, dates);
                    forecast.predictions.insert(country, trained.predictions);
                    forecast
                        .feature_importances
                        .insert(country, label_importances(names.clone(), trained.importances));
                }
                Err(e) => {
                    warn!(country = %country, error = %e, "growth model unavailable, using fallback");
                    let start = *self.config.starting_members.get(country);
                    forecast.country_dates.insert(country, self.fallback_dates());
                    forecast.predictions.insert(
                        country,
                        compounding(start, self.config.ml.fallback_trend, self.horizon),
                    );
                    forecast.fallback_countries.push(country);
                    first_reason.get_or_insert(match e {
                        ClubError::InsufficientData { required, available } => {
                            FallbackReason::InsufficientData { required, available }
                        }
                        other => FallbackReason::model(other),
                    });
                }
            }
        }

        match first_reason {
            Some(reason) if forecast.fallback_countries.len() == Country::ALL.len() => {
                Outcome::fallback(forecast, reason)
            }
            _ => Outcome::observed(forecast),
        }
    }

    // ------------------------------------------------------------------------
    // Churn
    // ------------------------------------------------------------------------

    pub fn predict_churn(&self) -> Outcome<ChurnReport> {
        match self.data.member_activity() {
            Ok(activity) => self.predict_churn_from(&activity),
            Err(e) => {
                warn!(error = %e, "member activity unavailable, no churn prediction");
                Outcome::unavailable(FallbackReason::store(e))
            }
        }
    }

    pub fn predict_churn_from(&self, activity: &[MemberActivity]) -> Outcome<ChurnReport> {
        let required = self.config.ml.min_churn_rows;
        if activity.len() < required {
            warn!(required, available = activity.len(), "not enough members for churn prediction");
            return Outcome::unavailable(FallbackReason::InsufficientData {
                required,
                available: activity.len(),
            });
        }

        match self.train_churn(activity) {
            Ok(report) => {
                info!(members = report.scores.len(), "scored churn");
                Outcome::observed(report)
            }
            Err(e) => {
                warn!(error = %e, "churn model failed");
                Outcome::unavailable(FallbackReason::model(e))
            }
        }
    }

    fn train_churn(&self, activity: &[MemberActivity]) -> Result<ChurnReport> {
        let features: Vec<Vec<f64>> = activity
            .iter()
            .map(|a| {
                vec![
                    (self.as_of - a.join_date).num_days() as f64,
                    a.transaction_count as f64,
                    a.avg_transaction.unwrap_or(0.0),
                ]
            })
            .collect();
        let target: Vec<f64> = activity.iter().map(|a| if a.active { 1.0 } else { 0.0 }).collect();

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&features)?;

        let mut model = self.regressor.clone();
        model.fit(&scaled, &target)?;
        let active_scores = model.predict(&scaled)?;

        let scores = activity
            .iter()
            .zip(active_scores)
            .map(|(a, score)| ChurnScore {
                member_id: a.member_id,
                churn_probability: 1.0 - score,
            })
            .collect();

        Ok(ChurnReport {
            scores,
            feature_importances: label_importances(
                CHURN_COLUMNS.iter().map(|c| c.to_string()).collect(),
                model.feature_importances(),
            ),
        })
    }

    // ------------------------------------------------------------------------
    // Revenue
    // ------------------------------------------------------------------------

    pub fn predict_revenue(&self) -> Outcome<RevenuePrediction> {
        match self.data.monthly_revenue_stats() {
            Ok(history) => self.predict_revenue_from(&history),
            Err(e) => {
                warn!(error = %e, "revenue history unavailable, using fallback revenue");
                Outcome::fallback(self.fallback_revenue_prediction(), FallbackReason::store(e))
            }
        }
    }

    fn fallback_revenue_prediction(&self) -> RevenuePrediction {
        RevenuePrediction {
            dates: self.fallback_dates(),
            values: fallback_revenue(self.config, self.horizon),
            feature_importances: Vec::new(),
        }
    }

    pub fn predict_revenue_from(&self, history: &[MonthlyRevenueStats]) -> Outcome<RevenuePrediction> {
        let required = self.config.ml.min_series_rows.max(self.lookback() + 1);
        if history.len() < required {
            warn!(required, available = history.len(), "not enough revenue history, using fallback revenue");
            return Outcome::fallback(
                self.fallback_revenue_prediction(),
                FallbackReason::InsufficientData {
                    required,
                    available: history.len(),
                },
            );
        }

        let mut history = history.to_vec();
        history.sort_by_key(|s| s.month);

        let rows: Vec<Vec<f64>> = history
            .iter()
            .map(|s| {
                vec![
                    s.month.month() as f64,
                    s.month.year() as f64,
                    s.active_members as f64,
                    s.transaction_count as f64,
                ]
            })
            .collect();
        let targets: Vec<f64> = history.iter().map(|s| s.revenue).collect();
        let last_month = history[history.len() - 1].month;
        let dates = future_month_ends(last_month, self.horizon);

        match self.train_series(&rows, &targets, &dates) {
            Ok(trained) => Outcome::observed(RevenuePrediction {
                dates,
                values: trained.predictions,
                feature_importances: label_importances(
                    windowed_feature_names(&REVENUE_COLUMNS, self.lookback()),
                    trained.importances,
                ),
            }),
            Err(e) => {
                warn!(error = %e, "revenue model failed, using fallback revenue");
                Outcome::fallback(self.fallback_revenue_prediction(), FallbackReason::model(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{date, StaticData, Unreachable};

    /// Predicts the training mean; importances split evenly
    #[derive(Clone, Default)]
    struct MeanRegressor {
        mean: f64,
        width: usize,
    }

    impl Regressor for MeanRegressor {
        fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
            self.mean = target.iter().sum::<f64>() / target.len() as f64;
            self.width = features[0].len();
            Ok(())
        }

        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(vec![self.mean; features.len()])
        }

        fn feature_importances(&self) -> Vec<f64> {
            vec![1.0 / self.width as f64; self.width]
        }
    }

    /// Predicts the month column of the newest row in each window
    #[derive(Clone, Default)]
    struct NewestMonthRegressor {
        width: usize,
    }

    impl Regressor for NewestMonthRegressor {
        fn fit(&mut self, features: &[Vec<f64>], _: &[f64]) -> Result<()> {
            self.width = features[0].len();
            Ok(())
        }

        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(features.iter().map(|row| row[row.len() - GROWTH_COLUMNS.len()]).collect())
        }

        fn feature_importances(&self) -> Vec<f64> {
            vec![0.0; self.width]
        }
    }

    /// Always fails to train
    #[derive(Clone)]
    struct BrokenRegressor;

    impl Regressor for BrokenRegressor {
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<()> {
            Err(ClubError::Model("singular matrix".to_string()))
        }
        fn predict(&self, _: &[Vec<f64>]) -> Result<Vec<f64>> {
            Err(ClubError::Model("not fitted".to_string()))
        }
        fn feature_importances(&self) -> Vec<f64> {
            Vec::new()
        }
    }

    fn country_history(months: u32) -> Vec<MonthlyCountryStats> {
        (1..=months)
            .flat_map(|m| {
                Country::ALL.into_iter().map(move |country| MonthlyCountryStats {
                    month: date(2024, m, 1),
                    country,
                    new_members: 5 + m as i64,
                    active_members: 4 + m as i64,
                })
            })
            .collect()
    }

    fn revenue_history(months: u32) -> Vec<MonthlyRevenueStats> {
        (1..=months)
            .map(|m| MonthlyRevenueStats {
                month: date(2024, m, 1),
                revenue: 1000.0 * m as f64,
                active_members: 10 + m as i64,
                transaction_count: 12 + m as i64,
            })
            .collect()
    }

    fn activity(n: i64) -> Vec<MemberActivity> {
        (0..n)
            .map(|i| MemberActivity {
                member_id: i + 1,
                join_date: date(2023, 1 + (i % 12) as u32, 1),
                transaction_count: i % 4,
                avg_transaction: if i % 4 == 0 { None } else { Some(795.0) },
                active: i % 3 != 0,
            })
            .collect()
    }

    #[test]
    fn test_fallback_growth_is_compounding() {
        let series = fallback_growth(&PerCountry::new(100.0, 10.0, 0.0), GrowthTrend::Neutral, 2);
        assert!((series.netherlands[0] - 105.0).abs() < 1e-9);
        assert!((series.netherlands[1] - 110.25).abs() < 1e-9);
        assert_eq!(series.germany, vec![0.0, 0.0]);
    }

    #[test]
    fn test_short_history_falls_back_deterministically() {
        let data = StaticData {
            country_stats: country_history(1),
            revenue_stats: revenue_history(5),
            ..Default::default()
        };
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 6, 15));

        let growth = forecaster.predict_member_growth();
        assert!(growth.is_fallback());
        assert!(matches!(
            growth.reason(),
            Some(FallbackReason::InsufficientData { required: 6, available: 3 })
        ));
        let forecast = growth.value().unwrap();
        assert_eq!(forecast.dates.len(), 12);
        assert_eq!(forecast.dates[0], date(2024, 7, 31));
        assert_eq!(
            forecast.predictions[&Country::Netherlands],
            compounding(135.0, GrowthTrend::Neutral, 12)
        );
        assert_eq!(forecast.fallback_countries, Country::ALL.to_vec());

        let revenue = forecaster.predict_revenue();
        assert!(revenue.is_fallback());
        let prediction = revenue.value().unwrap();
        assert_eq!(prediction.values, fallback_revenue(&config, 12));
        // 161 members * 1.05 * (795 + 200) / 12
        assert!((prediction.values[0] - 161.0 * 1.05 * 995.0 / 12.0).abs() < 1e-6);

        // Same inputs, same trajectory
        assert_eq!(forecaster.predict_revenue(), revenue);
        assert_eq!(forecaster.predict_member_growth(), growth);
    }

    #[test]
    fn test_trend_changes_fallback() {
        let mut config = Config::default();
        config.ml.fallback_trend = GrowthTrend::High;
        let high = fallback_revenue(&config, 3);
        config.ml.fallback_trend = GrowthTrend::Low;
        let low = fallback_revenue(&config, 3);
        assert!(high[2] > low[2]);
    }

    #[test]
    fn test_growth_trains_per_country() {
        let data = StaticData::default();
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .with_regressor(MeanRegressor::default())
            .horizon(4);

        let mut history = country_history(8);
        // Germany only has two months of history
        history.retain(|s| s.country != Country::Germany || s.month.month() <= 2);

        let outcome = forecaster.predict_member_growth_from(&history);
        assert!(outcome.is_observed());
        let forecast = outcome.value().unwrap();

        assert_eq!(forecast.dates, future_month_ends(date(2024, 8, 1), 4));
        assert_eq!(forecast.fallback_countries, vec![Country::Germany]);
        // Targets after the first window: months 4..=8 -> active 8..=12
        assert_eq!(forecast.predictions[&Country::Netherlands], vec![10.0; 4]);
        assert_eq!(
            forecast.predictions[&Country::Germany],
            compounding(0.0, GrowthTrend::Neutral, 4)
        );
        assert_eq!(forecast.feature_importances[&Country::Belgium].len(), 9);
        assert_eq!(forecast.feature_importances[&Country::Belgium][8].name, "new_members_lag1");
        assert_eq!(
            forecast.country_dates[&Country::Germany],
            future_month_ends(date(2024, 12, 1), 4)
        );
    }

    #[test]
    fn test_growth_rolls_each_country_from_its_own_last_month() {
        let data = StaticData::default();
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .with_regressor(NewestMonthRegressor::default())
            .horizon(4);

        let mut history = country_history(8);
        // Belgium stops reporting after May
        history.retain(|s| s.country != Country::Belgium || s.month.month() <= 5);

        let outcome = forecaster.predict_member_growth_from(&history);
        assert!(outcome.is_observed());
        let forecast = outcome.value().unwrap();
        assert!(forecast.fallback_countries.is_empty());

        assert_eq!(forecast.dates, future_month_ends(date(2024, 8, 1), 4));
        assert_eq!(forecast.country_dates[&Country::Netherlands], forecast.dates);
        assert_eq!(forecast.predictions[&Country::Netherlands], vec![9.0, 10.0, 11.0, 12.0]);

        // June to September, not September onwards
        assert_eq!(
            forecast.country_dates[&Country::Belgium],
            vec![date(2024, 6, 30), date(2024, 7, 31), date(2024, 8, 31), date(2024, 9, 30)]
        );
        assert_eq!(forecast.predictions[&Country::Belgium], vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_forest_growth_forecast() {
        let data = StaticData {
            country_stats: country_history(10),
            ..Default::default()
        };
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1));

        let outcome = forecaster.predict_member_growth();
        assert!(outcome.is_observed());
        let forecast = outcome.value().unwrap();
        assert!(forecast.fallback_countries.is_empty());
        for country in Country::ALL {
            let series = &forecast.predictions[&country];
            assert_eq!(series.len(), 12);
            assert!(series.iter().all(|v| (8.0..=14.0).contains(v)));
        }
    }

    #[test]
    fn test_revenue_model_failure_falls_back() {
        let data = StaticData::default();
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .with_regressor(BrokenRegressor);

        let outcome = forecaster.predict_revenue_from(&revenue_history(8));
        assert!(outcome.is_fallback());
        assert!(matches!(outcome.reason(), Some(FallbackReason::ModelFailure { .. })));
        assert_eq!(outcome.value().unwrap().values, fallback_revenue(&config, 12));
    }

    #[test]
    fn test_revenue_prediction_trained() {
        let data = StaticData::default();
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .with_regressor(MeanRegressor::default());

        let outcome = forecaster.predict_revenue_from(&revenue_history(8));
        assert!(outcome.is_observed());
        let prediction = outcome.value().unwrap();
        // Targets are months 4..=8 revenue
        assert_eq!(prediction.values, vec![6000.0; 12]);
        assert_eq!(prediction.dates[0], date(2024, 9, 30));
        assert_eq!(prediction.feature_importances.len(), 12);
    }

    #[test]
    fn test_churn_scores() {
        let data = StaticData {
            activity: activity(12),
            ..Default::default()
        };
        let config = Config::default();
        let forecaster = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .with_regressor(MeanRegressor::default());

        let outcome = forecaster.predict_churn();
        assert!(outcome.is_observed());
        let report = outcome.value().unwrap();
        assert_eq!(report.scores.len(), 12);
        // 8 of 12 active -> mean 2/3
        assert!((report.scores[0].churn_probability - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.feature_importances[0].name, "membership_duration");
    }

    #[test]
    fn test_churn_with_forest_stays_in_range() {
        let data = StaticData {
            activity: activity(20),
            ..Default::default()
        };
        let config = Config::default();
        let report = MlForecaster::new(&data, &config, date(2024, 12, 1))
            .predict_churn()
            .into_value()
            .unwrap();
        assert!(report
            .scores
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.churn_probability)));
    }

    #[test]
    fn test_churn_unavailable() {
        let config = Config::default();
        let few = StaticData {
            activity: activity(9),
            ..Default::default()
        };
        let outcome = MlForecaster::new(&few, &config, date(2024, 12, 1)).predict_churn();
        assert!(outcome.is_unavailable());

        let outcome = MlForecaster::new(&Unreachable, &config, date(2024, 12, 1)).predict_churn();
        assert!(matches!(outcome.reason(), Some(FallbackReason::StoreUnavailable { .. })));
    }

    #[test]
    fn test_unreachable_store_uses_fallbacks() {
        let config = Config::default();
        let forecaster = MlForecaster::new(&Unreachable, &config, date(2024, 12, 1));

        assert!(forecaster.predict_member_growth().is_fallback());
        assert!(forecaster.predict_revenue().is_fallback());
    }
}
