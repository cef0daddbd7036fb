// 📈 Scenario Forecaster - 12-month revenue / expense / cash-flow projection
//
// Three named multiplier profiles, one set of formulas:
//   growth multipliers:  pessimistic 0.5, realistic 1.0, optimistic 1.5
//   expense multipliers: pessimistic 1.2, realistic 1.0, optimistic 0.9
// A bad scenario is an expense *increase*, hence the inverted ordering.

use crate::config::Config;
use crate::db::ClubData;
use crate::entities::{Country, GrowthMode, PerCountry};
use crate::error::{ClubError, Result};
use crate::outcome::{FallbackReason, Outcome};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const FORECAST_MONTHS: u32 = 12;

// ============================================================================
// SCENARIO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Pessimistic,
    Realistic,
    Optimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Pessimistic, Scenario::Realistic, Scenario::Optimistic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Pessimistic => "pessimistic",
            Scenario::Realistic => "realistic",
            Scenario::Optimistic => "optimistic",
        }
    }

    /// Scales the growth term only, never the current balance
    pub fn growth_multiplier(&self) -> f64 {
        match self {
            Scenario::Pessimistic => 0.5,
            Scenario::Realistic => 1.0,
            Scenario::Optimistic => 1.5,
        }
    }

    pub fn expense_multiplier(&self) -> f64 {
        match self {
            Scenario::Pessimistic => 1.2,
            Scenario::Realistic => 1.0,
            Scenario::Optimistic => 0.9,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pessimistic" => Ok(Scenario::Pessimistic),
            "realistic" => Ok(Scenario::Realistic),
            "optimistic" => Ok(Scenario::Optimistic),
            _ => Err(ClubError::InvalidScenario(s.to_string())),
        }
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueParams {
    pub annual_fee: f64,
    pub event_fee: f64,
    pub num_events: u32,
}

impl RevenueParams {
    pub fn validate(&self) -> Result<()> {
        check_amount("annual_fee", self.annual_fee)?;
        check_amount("event_fee", self.event_fee)
    }
}

impl From<&Config> for RevenueParams {
    fn from(config: &Config) -> Self {
        RevenueParams {
            annual_fee: config.annual_fee,
            event_fee: config.event_fee,
            num_events: config.num_events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseParams {
    pub marketing_percentage: f64,
    pub base_salary: f64,
    pub num_employees: u32,
    pub num_events: u32,
    pub event_fee: f64,
}

impl ExpenseParams {
    pub fn validate(&self) -> Result<()> {
        check_amount("marketing_percentage", self.marketing_percentage)?;
        if self.marketing_percentage > 100.0 {
            return Err(ClubError::invalid("marketing_percentage", "must be at most 100"));
        }
        check_amount("base_salary", self.base_salary)?;
        check_amount("event_fee", self.event_fee)
    }
}

impl From<&Config> for ExpenseParams {
    fn from(config: &Config) -> Self {
        ExpenseParams {
            marketing_percentage: config.marketing_percentage,
            base_salary: config.base_salary,
            num_employees: config.num_employees,
            num_events: config.num_events,
            event_fee: config.event_fee,
        }
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ClubError::invalid(field, "must be a non-negative number"));
    }
    Ok(())
}

// ============================================================================
// RESULT ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    /// 1-based month index
    pub month: u32,
    /// First day of the projected month
    pub period: NaiveDate,
    pub members: PerCountry<f64>,
    pub total_members: f64,
    pub membership_revenue: f64,
    pub event_revenue: f64,
    pub total_revenue: f64,
}

/// Annual expense buckets
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ExpenseForecast {
    pub marketing: f64,
    pub salaries: f64,
    pub events: f64,
    pub operations: f64,
}

impl ExpenseForecast {
    pub fn total(&self) -> f64 {
        self.marketing + self.salaries + self.events + self.operations
    }

    /// Spread evenly over the forecast months
    pub fn monthly(&self) -> f64 {
        self.total() / FORECAST_MONTHS as f64
    }

    pub fn buckets(&self) -> [(&'static str, f64); 4] {
        [
            ("Marketing", self.marketing),
            ("Salaries", self.salaries),
            ("Events", self.events),
            ("Operations", self.operations),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowRow {
    pub month: u32,
    pub period: NaiveDate,
    pub total_revenue: f64,
    pub expenses: f64,
    pub net_cashflow: f64,
    pub cumulative_cashflow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinancialAlert {
    /// Cumulative cash goes below zero (first month it happens)
    NegativeCashflow { month: u32, cumulative: f64 },

    /// Monthly expenses above the best projected monthly revenue
    ExpensesExceedRevenue { monthly_expenses: f64, peak_revenue: f64 },
}

impl fmt::Display for FinancialAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinancialAlert::NegativeCashflow { month, cumulative } => {
                write!(f, "cumulative cash flow turns negative in month {} ({:.2})", month, cumulative)
            }
            FinancialAlert::ExpensesExceedRevenue {
                monthly_expenses,
                peak_revenue,
            } => write!(
                f,
                "monthly expenses {:.2} exceed peak monthly revenue {:.2}",
                monthly_expenses, peak_revenue
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioProjection {
    pub scenario: Scenario,
    pub revenue: Vec<ForecastRow>,
    pub expenses: ExpenseForecast,
    pub cashflow: Vec<CashflowRow>,
}

impl ScenarioProjection {
    pub fn alerts(&self) -> Vec<FinancialAlert> {
        let mut alerts = Vec::new();

        if let Some(row) = self.cashflow.iter().find(|r| r.cumulative_cashflow < 0.0) {
            alerts.push(FinancialAlert::NegativeCashflow {
                month: row.month,
                cumulative: row.cumulative_cashflow,
            });
        }

        let peak_revenue = self
            .revenue
            .iter()
            .map(|r| r.total_revenue)
            .fold(0.0_f64, f64::max);
        let monthly_expenses = self.expenses.monthly();
        if monthly_expenses > peak_revenue {
            alerts.push(FinancialAlert::ExpensesExceedRevenue {
                monthly_expenses,
                peak_revenue,
            });
        }

        alerts
    }
}

// ============================================================================
// PURE PROJECTIONS
// ============================================================================

/// First day of the month `offset` months after the month containing `date`
pub(crate) fn month_start(date: NaiveDate, offset: u32) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first.checked_add_months(Months::new(offset)).unwrap_or(first)
}

/// One month of growth for a single country
fn grow(count: f64, country: Country, target: f64, scenario: Scenario) -> f64 {
    let multiplier = scenario.growth_multiplier();
    match country.growth_mode() {
        GrowthMode::Absolute => count + target * multiplier,
        GrowthMode::Percentage => count + count * target / 100.0 * multiplier,
    }
}

/// Member counts after each of the next `months` months
pub fn project_members(
    baseline: &PerCountry<f64>,
    growth_targets: &PerCountry<f64>,
    scenario: Scenario,
    months: u32,
) -> Vec<PerCountry<f64>> {
    let mut counts = *baseline;
    (0..months)
        .map(|_| {
            counts = counts.map(|country, count| {
                grow(*count, country, *growth_targets.get(country), scenario)
            });
            counts
        })
        .collect()
}

pub fn calculate_revenue_forecast(
    baseline: &PerCountry<f64>,
    growth_targets: &PerCountry<f64>,
    params: &RevenueParams,
    scenario: Scenario,
    as_of: NaiveDate,
) -> Vec<ForecastRow> {
    project_members(baseline, growth_targets, scenario, FORECAST_MONTHS)
        .into_iter()
        .enumerate()
        .map(|(i, members)| {
            let month = i as u32 + 1;
            let total_members = members.total();
            let membership_revenue = total_members * params.annual_fee / 12.0;
            let event_revenue = total_members * params.event_fee * params.num_events as f64 / 12.0;

            ForecastRow {
                month,
                period: month_start(as_of, month),
                members,
                total_members,
                membership_revenue,
                event_revenue,
                total_revenue: membership_revenue + event_revenue,
            }
        })
        .collect()
}

pub fn calculate_expenses_forecast(
    trailing_revenue: f64,
    total_members: f64,
    params: &ExpenseParams,
    operations_cost: f64,
    scenario: Scenario,
) -> ExpenseForecast {
    let scale = scenario.expense_multiplier();

    ExpenseForecast {
        marketing: trailing_revenue * params.marketing_percentage / 100.0 * scale,
        salaries: params.base_salary * params.num_employees as f64 * 12.0 * scale,
        events: total_members * params.event_fee * params.num_events as f64 * scale,
        operations: operations_cost * scale,
    }
}

pub fn calculate_cashflow(revenue: &[ForecastRow], expenses: &ExpenseForecast) -> Vec<CashflowRow> {
    let monthly_expenses = expenses.monthly();
    let mut cumulative = 0.0;

    revenue
        .iter()
        .map(|row| {
            let net_cashflow = row.total_revenue - monthly_expenses;
            cumulative += net_cashflow;
            CashflowRow {
                month: row.month,
                period: row.period,
                total_revenue: row.total_revenue,
                expenses: monthly_expenses,
                net_cashflow,
                cumulative_cashflow: cumulative,
            }
        })
        .collect()
}

// ============================================================================
// FORECASTER
// ============================================================================

/// Scenario forecaster bound to a data source and a configuration
pub struct ScenarioForecaster<'a, D: ClubData + ?Sized> {
    data: &'a D,
    config: &'a Config,
    as_of: NaiveDate,
}

impl<'a, D: ClubData + ?Sized> ScenarioForecaster<'a, D> {
    /// Months are projected from the month after `as_of`
    pub fn new(data: &'a D, config: &'a Config, as_of: NaiveDate) -> Self {
        ScenarioForecaster { data, config, as_of }
    }

    /// Current active members per country, or the configured starting counts
    pub fn baseline(&self) -> Outcome<PerCountry<f64>> {
        match self.data.active_members_by_country() {
            Ok(counts) => Outcome::observed(counts),
            Err(e) => {
                warn!(error = %e, "member counts unavailable, using starting members");
                Outcome::fallback(self.config.starting_members, FallbackReason::store(e))
            }
        }
    }

    pub fn revenue_forecast(
        &self,
        params: &RevenueParams,
        scenario: Scenario,
    ) -> Result<Outcome<Vec<ForecastRow>>> {
        params.validate()?;

        Ok(self.baseline().map(|baseline| {
            calculate_revenue_forecast(
                &baseline,
                &self.config.growth_targets,
                params,
                scenario,
                self.as_of,
            )
        }))
    }

    pub fn expense_forecast(
        &self,
        params: &ExpenseParams,
        scenario: Scenario,
    ) -> Result<Outcome<ExpenseForecast>> {
        params.validate()?;

        let since = self
            .as_of
            .checked_sub_months(Months::new(12))
            .unwrap_or(self.as_of);
        let mut reason = None;

        let trailing_revenue = match self.data.sum_revenue(since) {
            Ok(revenue) => revenue,
            Err(e) => {
                warn!(error = %e, "trailing revenue unavailable, marketing budget set to zero");
                reason.get_or_insert(FallbackReason::store(e));
                0.0
            }
        };

        let total_members = match self.data.count_active_members() {
            Ok(count) => count as f64,
            Err(e) => {
                warn!(error = %e, "active member count unavailable, using starting members");
                reason.get_or_insert(FallbackReason::store(e));
                self.config.starting_members.total()
            }
        };

        let expenses = calculate_expenses_forecast(
            trailing_revenue,
            total_members,
            params,
            self.config.operations_cost,
            scenario,
        );

        Ok(match reason {
            None => Outcome::observed(expenses),
            Some(reason) => Outcome::fallback(expenses, reason),
        })
    }

    /// Revenue, expenses and cash flow for one scenario
    pub fn project(
        &self,
        revenue_params: &RevenueParams,
        expense_params: &ExpenseParams,
        scenario: Scenario,
    ) -> Result<Outcome<ScenarioProjection>> {
        let revenue = self.revenue_forecast(revenue_params, scenario)?;
        let expenses = self.expense_forecast(expense_params, scenario)?;

        let reason = revenue.reason().or(expenses.reason()).cloned();
        let (Some(revenue), Some(expenses)) = (revenue.into_value(), expenses.into_value()) else {
            return Ok(Outcome::unavailable(
                reason.unwrap_or_else(|| FallbackReason::model("projection inputs missing")),
            ));
        };

        let projection = ScenarioProjection {
            scenario,
            cashflow: calculate_cashflow(&revenue, &expenses),
            revenue,
            expenses,
        };

        Ok(match reason {
            None => Outcome::observed(projection),
            Some(reason) => Outcome::fallback(projection, reason),
        })
    }

    /// All three scenarios side by side
    pub fn plan(
        &self,
        revenue_params: &RevenueParams,
        expense_params: &ExpenseParams,
    ) -> Result<Vec<Outcome<ScenarioProjection>>> {
        Scenario::ALL
            .iter()
            .map(|scenario| self.project(revenue_params, expense_params, *scenario))
            .collect()
    }
}
