// 📊 KPI Aggregator - derived metrics over store aggregations
//
// growth rate      = (last - first) / first * 100, first == 0 -> 100
// retention rate   = active / total * 100, total == 0 -> 0
// operating margin = (revenue - expenses) / revenue * 100, revenue == 0 -> 0

use crate::config::Config;
use crate::db::{EventFilter, MonthlyCashflow, MonthlyCount, MonthlyTypeTotal, Store};
use crate::entities::{ClubEvent, PerCountry, TransactionType};
use crate::error::{ClubError, Result};
use crate::scenario::month_start;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PURE METRICS
// ============================================================================

/// Percent change from the first to the last point of a series
pub fn growth_rate(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let first = series[0];
    let last = series[series.len() - 1];
    if first == 0.0 {
        return 100.0;
    }
    (last - first) / first * 100.0
}

/// Growth over the last two points minus growth over the two before them
pub fn growth_rate_change(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 3 {
        return 0.0;
    }
    growth_rate(&series[n - 2..]) - growth_rate(&series[n - 3..n - 1])
}

pub fn retention_rate(active: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    active as f64 / total as f64 * 100.0
}

/// `expenses` is a positive magnitude
pub fn operating_margin(revenue: f64, expenses: f64) -> f64 {
    if revenue == 0.0 {
        return 0.0;
    }
    (revenue - expenses) / revenue * 100.0
}

// ============================================================================
// REPORT PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    LastMonth,
    LastQuarter,
    LastYear,
    AllTime,
}

impl ReportPeriod {
    pub const ALL: [ReportPeriod; 4] = [
        ReportPeriod::LastMonth,
        ReportPeriod::LastQuarter,
        ReportPeriod::LastYear,
        ReportPeriod::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::LastMonth => "last_month",
            ReportPeriod::LastQuarter => "last_quarter",
            ReportPeriod::LastYear => "last_year",
            ReportPeriod::AllTime => "all_time",
        }
    }

    /// First day included in the period, `None` for all time
    pub fn start(&self, as_of: NaiveDate) -> Option<NaiveDate> {
        let months = match self {
            ReportPeriod::LastMonth => 1,
            ReportPeriod::LastQuarter => 3,
            ReportPeriod::LastYear => 12,
            ReportPeriod::AllTime => return None,
        };
        Some(as_of.checked_sub_months(Months::new(months)).unwrap_or(as_of))
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportPeriod {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "month" | "last_month" => Ok(ReportPeriod::LastMonth),
            "quarter" | "last_quarter" => Ok(ReportPeriod::LastQuarter),
            "year" | "last_year" => Ok(ReportPeriod::LastYear),
            "all" | "all_time" => Ok(ReportPeriod::AllTime),
            _ => Err(ClubError::invalid("period", format!("unknown report period '{}'", s))),
        }
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberKpis {
    pub period: ReportPeriod,
    pub total_members: i64,
    pub active_members: i64,
    pub retention_rate: f64,
    pub new_members: i64,
    pub growth_rate: f64,
    pub growth_rate_change: f64,
    pub monthly_joins: Vec<MonthlyCount>,
    pub distribution: PerCountry<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialKpis {
    pub period: ReportPeriod,
    pub revenue: f64,
    pub expenses: f64,
    pub operating_margin: f64,
    pub revenue_per_member: Option<f64>,
    pub summary: Vec<MonthlyTypeTotal>,
    pub cashflow: Vec<MonthlyCashflow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMetric {
    pub event: ClubEvent,
    /// revenue / event fee
    pub estimated_attendance: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMetrics {
    pub period: ReportPeriod,
    pub events: Vec<EventMetric>,
    pub total_revenue: f64,
    pub total_costs: f64,
    pub total_profit: f64,
    pub average_attendance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueShare {
    pub transaction_type: TransactionType,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub as_of: NaiveDate,
    pub active_members: i64,
    pub month_revenue: f64,
    /// Current month revenue minus the configured monthly expenses
    pub cash_position: f64,
    pub revenue_distribution: Vec<RevenueShare>,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct KpiAggregator<'a> {
    store: &'a Store,
    config: &'a Config,
    as_of: NaiveDate,
}

impl<'a> KpiAggregator<'a> {
    pub fn new(store: &'a Store, config: &'a Config, as_of: NaiveDate) -> Self {
        KpiAggregator { store, config, as_of }
    }

    pub fn member_kpis(&self, period: ReportPeriod) -> Result<MemberKpis> {
        let (active_members, total_members) = self.store.member_counts()?;
        let monthly_joins = self.store.monthly_new_members(period.start(self.as_of))?;
        let series: Vec<f64> = monthly_joins.iter().map(|m| m.count as f64).collect();

        Ok(MemberKpis {
            period,
            total_members,
            active_members,
            retention_rate: retention_rate(active_members, total_members),
            new_members: monthly_joins.iter().map(|m| m.count).sum(),
            growth_rate: growth_rate(&series),
            growth_rate_change: growth_rate_change(&series),
            monthly_joins,
            distribution: self.store.active_members_by_country()?,
        })
    }

    pub fn financial_kpis(&self, period: ReportPeriod) -> Result<FinancialKpis> {
        let since = period.start(self.as_of);
        let totals = self.store.signed_totals(since)?;
        let summary_start = since.unwrap_or(NaiveDate::MIN);

        Ok(FinancialKpis {
            period,
            revenue: totals.revenue,
            expenses: totals.expenses,
            operating_margin: operating_margin(totals.revenue, totals.expenses),
            revenue_per_member: self.store.revenue_per_member(since)?,
            summary: self.store.financial_summary(summary_start, self.as_of)?,
            cashflow: self.store.monthly_cashflow(since)?,
        })
    }

    pub fn event_metrics(&self, period: ReportPeriod) -> Result<EventMetrics> {
        let events = self.store.query_events(&EventFilter {
            from: period.start(self.as_of),
            until: Some(self.as_of),
            ..Default::default()
        })?;

        let fee = self.config.event_fee;
        let events: Vec<EventMetric> = events
            .into_iter()
            .map(|event| EventMetric {
                estimated_attendance: if fee > 0.0 { event.revenue / fee } else { 0.0 },
                profit: event.profit(),
                event,
            })
            .collect();

        let total_revenue = events.iter().map(|e| e.event.revenue).sum();
        let total_costs = events.iter().map(|e| e.event.costs).sum();
        let average_attendance = if events.is_empty() {
            0.0
        } else {
            events.iter().map(|e| e.estimated_attendance).sum::<f64>() / events.len() as f64
        };

        Ok(EventMetrics {
            period,
            total_profit: events.iter().map(|e| e.profit).sum(),
            events,
            total_revenue,
            total_costs,
            average_attendance,
        })
    }

    /// Dashboard landing numbers for the month containing `as_of`
    pub fn overview(&self) -> Result<Overview> {
        let month = month_start(self.as_of, 0);
        let summary = self.store.financial_summary(month, self.as_of)?;

        let mut revenue_distribution: Vec<RevenueShare> = Vec::new();
        for row in summary {
            match revenue_distribution
                .iter_mut()
                .find(|s| s.transaction_type == row.transaction_type)
            {
                Some(share) => share.amount += row.total_amount,
                None => revenue_distribution.push(RevenueShare {
                    transaction_type: row.transaction_type,
                    amount: row.total_amount,
                }),
            }
        }
        let month_revenue = revenue_distribution.iter().map(|s| s.amount).sum();

        Ok(Overview {
            as_of: self.as_of,
            active_members: self.store.count_active_members()?,
            month_revenue,
            cash_position: month_revenue - self.config.monthly_expenses,
            revenue_distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{member, temp_store};
    use crate::testutil::date;
    use crate::entities::{Country, NewEvent, NewTransaction};

    #[test]
    fn test_growth_rate() {
        assert_eq!(growth_rate(&[0.0, 5.0]), 100.0);
        assert_eq!(growth_rate(&[10.0, 15.0]), 50.0);
        assert_eq!(growth_rate(&[4.0]), 0.0);
        assert_eq!(growth_rate(&[]), 0.0);
        assert_eq!(growth_rate(&[20.0, 5.0, 10.0]), -50.0);
    }

    #[test]
    fn test_growth_rate_change() {
        // 10 -> 20 is +100%, 20 -> 30 is +50%
        assert_eq!(growth_rate_change(&[10.0, 20.0, 30.0]), -50.0);
        assert_eq!(growth_rate_change(&[10.0, 20.0]), 0.0);
    }

    #[test]
    fn test_retention_and_margin() {
        assert_eq!(retention_rate(3, 4), 75.0);
        assert_eq!(retention_rate(0, 0), 0.0);
        assert_eq!(operating_margin(1000.0, 250.0), 75.0);
        assert_eq!(operating_margin(0.0, 250.0), 0.0);
    }

    #[test]
    fn test_report_period() {
        assert_eq!("quarter".parse::<ReportPeriod>().unwrap(), ReportPeriod::LastQuarter);
        assert_eq!("All Time".parse::<ReportPeriod>().unwrap(), ReportPeriod::AllTime);
        assert!("decade".parse::<ReportPeriod>().is_err());
        assert_eq!(
            ReportPeriod::LastQuarter.start(date(2024, 5, 31)),
            Some(date(2024, 2, 29))
        );
        assert_eq!(ReportPeriod::AllTime.start(date(2024, 5, 31)), None);
    }

    #[test]
    fn test_member_and_financial_kpis() {
        let (_dir, store) = temp_store();
        let config = Config::default();

        store.enroll_member(&member("Anna", Country::Netherlands, date(2024, 1, 10))).unwrap();
        store.enroll_member(&member("Bram", Country::Belgium, date(2024, 2, 10))).unwrap();
        store.enroll_member(&member("Carl", Country::Belgium, date(2024, 2, 20))).unwrap();
        let gone = store
            .enroll_member(&member("Dirk", Country::Germany, date(2024, 3, 5)))
            .unwrap();
        store.update_member_status(gone, false).unwrap();

        store
            .record_transaction(&NewTransaction {
                member_id: None,
                amount: -795.0,
                transaction_type: TransactionType::EventFee,
                transaction_date: date(2024, 3, 15),
            })
            .unwrap();

        let kpis = KpiAggregator::new(&store, &config, date(2024, 3, 31));

        let members = kpis.member_kpis(ReportPeriod::AllTime).unwrap();
        assert_eq!(members.total_members, 4);
        assert_eq!(members.active_members, 3);
        assert_eq!(members.retention_rate, 75.0);
        assert_eq!(members.new_members, 4);
        // Joins per month: 1, 2, 1
        assert_eq!(members.growth_rate, 0.0);
        assert_eq!(members.growth_rate_change, -150.0);
        assert_eq!(members.distribution.belgium, 2.0);
        assert_eq!(members.distribution.germany, 0.0);

        let finance = kpis.financial_kpis(ReportPeriod::AllTime).unwrap();
        assert_eq!(finance.revenue, 4.0 * 795.0);
        assert_eq!(finance.expenses, 795.0);
        assert_eq!(finance.operating_margin, 75.0);
        assert_eq!(finance.cashflow.len(), 3);
        assert_eq!(finance.cashflow[2].cumulative, 3.0 * 795.0);
    }

    #[test]
    fn test_event_metrics_and_overview() {
        let (_dir, store) = temp_store();
        let config = Config::default();

        store.enroll_member(&member("Eva", Country::Netherlands, date(2024, 6, 3))).unwrap();
        store
            .record_event(&NewEvent {
                name: "Summer Drinks".to_string(),
                date: date(2024, 6, 20),
                country: Country::Netherlands,
                revenue: 1500.0,
                costs: 900.0,
            })
            .unwrap();
        store
            .record_event(&NewEvent {
                name: "Old Gala".to_string(),
                date: date(2023, 1, 20),
                country: Country::Belgium,
                revenue: 500.0,
                costs: 100.0,
            })
            .unwrap();

        let kpis = KpiAggregator::new(&store, &config, date(2024, 6, 30));

        let metrics = kpis.event_metrics(ReportPeriod::LastQuarter).unwrap();
        assert_eq!(metrics.events.len(), 1);
        assert_eq!(metrics.events[0].estimated_attendance, 30.0);
        assert_eq!(metrics.total_profit, 600.0);
        assert_eq!(metrics.average_attendance, 30.0);

        let all = kpis.event_metrics(ReportPeriod::AllTime).unwrap();
        assert_eq!(all.events.len(), 2);
        assert_eq!(all.total_revenue, 2000.0);

        let overview = kpis.overview().unwrap();
        assert_eq!(overview.active_members, 1);
        assert_eq!(overview.month_revenue, 795.0);
        assert_eq!(overview.cash_position, 795.0 - 15000.0);
        assert_eq!(overview.revenue_distribution.len(), 1);
        assert_eq!(
            overview.revenue_distribution[0].transaction_type,
            TransactionType::MembershipFee
        );
    }
}
