// Test doubles for the `ClubData` seam, plus shared test helpers

use crate::db::{ClubData, MemberActivity, MonthlyCountryStats, MonthlyRevenueStats};
use crate::entities::PerCountry;
use crate::error::{ClubError, Result};
use chrono::NaiveDate;

/// Every query fails, as if the database were down
pub struct Unreachable;

fn down<T>() -> Result<T> {
    Err(ClubError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "database offline",
    )))
}

impl ClubData for Unreachable {
    fn active_members_by_country(&self) -> Result<PerCountry<f64>> {
        down()
    }
    fn count_active_members(&self) -> Result<i64> {
        down()
    }
    fn sum_revenue(&self, _since: NaiveDate) -> Result<f64> {
        down()
    }
    fn monthly_country_stats(&self) -> Result<Vec<MonthlyCountryStats>> {
        down()
    }
    fn member_activity(&self) -> Result<Vec<MemberActivity>> {
        down()
    }
    fn monthly_revenue_stats(&self) -> Result<Vec<MonthlyRevenueStats>> {
        down()
    }
}

/// Canned answers
#[derive(Default)]
pub struct StaticData {
    pub members: PerCountry<f64>,
    pub trailing_revenue: f64,
    pub country_stats: Vec<MonthlyCountryStats>,
    pub activity: Vec<MemberActivity>,
    pub revenue_stats: Vec<MonthlyRevenueStats>,
}

impl ClubData for StaticData {
    fn active_members_by_country(&self) -> Result<PerCountry<f64>> {
        Ok(self.members)
    }
    fn count_active_members(&self) -> Result<i64> {
        Ok(self.members.total() as i64)
    }
    fn sum_revenue(&self, _since: NaiveDate) -> Result<f64> {
        Ok(self.trailing_revenue)
    }
    fn monthly_country_stats(&self) -> Result<Vec<MonthlyCountryStats>> {
        Ok(self.country_stats.clone())
    }
    fn member_activity(&self) -> Result<Vec<MemberActivity>> {
        Ok(self.activity.clone())
    }
    fn monthly_revenue_stats(&self) -> Result<Vec<MonthlyRevenueStats>> {
        Ok(self.revenue_stats.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
