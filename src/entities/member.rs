// 👤 Member Entity
//
// Identity: integer id assigned by the store (never reused).
// The only mutable value is the `active` flag.

use crate::entities::Country;
use crate::error::{ClubError, Result};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// MEMBERSHIP TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipType {
    Standard,
    Premium,
}

impl MembershipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::Standard => "Standard",
            MembershipType::Premium => "Premium",
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipType {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(MembershipType::Standard),
            "premium" => Ok(MembershipType::Premium),
            other => Err(ClubError::invalid(
                "membership_type",
                format!("'{}' is not Standard or Premium", other),
            )),
        }
    }
}

impl ToSql for MembershipType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MembershipType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// MEMBER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    /// Unique across all members
    pub email: String,
    pub country: Country,
    pub join_date: NaiveDate,
    pub membership_type: MembershipType,
    pub active: bool,
}

/// Enrollment request - becomes a `Member` once the store assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub country: Country,
    pub join_date: NaiveDate,
    pub membership_type: MembershipType,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewMember {
    pub fn new(
        name: &str,
        email: &str,
        country: Country,
        join_date: NaiveDate,
        membership_type: MembershipType,
    ) -> Self {
        NewMember {
            name: name.to_string(),
            email: email.to_string(),
            country,
            join_date,
            membership_type,
            active: true,
        }
    }

    /// Reject blank names and malformed emails before touching the store
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClubError::invalid("name", "must not be empty"));
        }
        validate_email(&self.email)
    }
}

/// Minimal shape check: one '@', non-empty local part, dotted domain
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    let well_formed = !local.is_empty()
        && parts.next().is_none()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace);

    if well_formed {
        Ok(())
    } else {
        Err(ClubError::invalid("email", format!("'{}' is not a valid address", email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewMember {
        NewMember::new(
            "Anna de Vries",
            "anna@example.nl",
            Country::Netherlands,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            MembershipType::Standard,
        )
    }

    #[test]
    fn test_new_member_defaults_active() {
        assert!(sample().active);
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut m = sample();
        m.name = "  ".to_string();
        assert!(m.validate().is_err());

        for bad in ["anna", "anna@", "@example.nl", "anna@example", "a@b@c.nl", "an na@x.nl"] {
            assert!(validate_email(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_membership_type_parse() {
        assert_eq!("premium".parse::<MembershipType>().unwrap(), MembershipType::Premium);
        assert!("Gold".parse::<MembershipType>().is_err());
    }
}
