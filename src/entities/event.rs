// 🎟️ Club Event Entity - immutable once recorded

use crate::entities::Country;
use crate::error::{ClubError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubEvent {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub country: Country,
    pub revenue: f64,
    pub costs: f64,
}

impl ClubEvent {
    pub fn profit(&self) -> f64 {
        self.revenue - self.costs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub date: NaiveDate,
    pub country: Country,
    pub revenue: f64,
    pub costs: f64,
}

impl NewEvent {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClubError::invalid("name", "must not be empty"));
        }
        for (field, value) in [("revenue", self.revenue), ("costs", self.costs)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClubError::invalid(field, "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_validation_and_profit() {
        let event = NewEvent {
            name: "Spring Gala".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 4, 12).unwrap(),
            country: Country::Belgium,
            revenue: 2500.0,
            costs: 1800.0,
        };
        assert!(event.validate().is_ok());

        let negative = NewEvent { costs: -1.0, ..event.clone() };
        assert!(negative.validate().is_err());

        let stored = ClubEvent {
            id: 1,
            name: event.name,
            date: event.date,
            country: event.country,
            revenue: event.revenue,
            costs: event.costs,
        };
        assert_eq!(stored.profit(), 700.0);
    }
}
