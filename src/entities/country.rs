// 🌍 Country - the three markets the club operates in
//
// Netherlands and Belgium grow by percentage, Germany by an absolute
// number of new members per month.

use crate::error::{ClubError, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COUNTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    Netherlands,
    Belgium,
    Germany,
}

/// How a country's monthly growth target is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthMode {
    /// Target is a percentage of the current count
    Percentage,

    /// Target is a number of new members per month
    Absolute,
}

impl Country {
    pub const ALL: [Country; 3] = [Country::Netherlands, Country::Belgium, Country::Germany];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Netherlands => "Netherlands",
            Country::Belgium => "Belgium",
            Country::Germany => "Germany",
        }
    }

    /// ISO 3166-1 alpha-2
    pub fn code(&self) -> &'static str {
        match self {
            Country::Netherlands => "NL",
            Country::Belgium => "BE",
            Country::Germany => "DE",
        }
    }

    pub fn growth_mode(&self) -> GrowthMode {
        match self {
            Country::Germany => GrowthMode::Absolute,
            Country::Netherlands | Country::Belgium => GrowthMode::Percentage,
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Country {
    type Err = ClubError;

    /// Accepts full names and country codes, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "netherlands" | "nl" => Ok(Country::Netherlands),
            "belgium" | "be" => Ok(Country::Belgium),
            "germany" | "de" => Ok(Country::Germany),
            other => Err(ClubError::invalid(
                "country",
                format!("'{}' is not one of Netherlands, Belgium, Germany", other),
            )),
        }
    }
}

impl ToSql for Country {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Country {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// PER-COUNTRY MAP
// ============================================================================

/// One value per country, serialized as `{"Netherlands": .., "Belgium": .., "Germany": ..}`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerCountry<T> {
    #[serde(rename = "Netherlands")]
    pub netherlands: T,

    #[serde(rename = "Belgium")]
    pub belgium: T,

    #[serde(rename = "Germany")]
    pub germany: T,
}

impl<T> PerCountry<T> {
    pub fn new(netherlands: T, belgium: T, germany: T) -> Self {
        PerCountry {
            netherlands,
            belgium,
            germany,
        }
    }

    pub fn get(&self, country: Country) -> &T {
        match country {
            Country::Netherlands => &self.netherlands,
            Country::Belgium => &self.belgium,
            Country::Germany => &self.germany,
        }
    }

    pub fn get_mut(&mut self, country: Country) -> &mut T {
        match country {
            Country::Netherlands => &mut self.netherlands,
            Country::Belgium => &mut self.belgium,
            Country::Germany => &mut self.germany,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Country, &T)> {
        Country::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn map<U, F: FnMut(Country, &T) -> U>(&self, mut f: F) -> PerCountry<U> {
        PerCountry {
            netherlands: f(Country::Netherlands, &self.netherlands),
            belgium: f(Country::Belgium, &self.belgium),
            germany: f(Country::Germany, &self.germany),
        }
    }
}

impl PerCountry<f64> {
    pub fn total(&self) -> f64 {
        self.netherlands + self.belgium + self.germany
    }
}
