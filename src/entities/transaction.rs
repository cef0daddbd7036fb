// 💶 Transaction Entity
//
// Signed amount: positive = revenue, negative = expense.
// `member_id` is optional because bulk imports may reference unknown members.

use crate::error::{ClubError, Result};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    MembershipFee,
    EventFee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::MembershipFee => "membership_fee",
            TransactionType::EventFee => "event_fee",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "membership_fee" => Ok(TransactionType::MembershipFee),
            "event_fee" => Ok(TransactionType::EventFee),
            other => Err(ClubError::invalid(
                "transaction_type",
                format!("'{}' is not membership_fee or event_fee", other),
            )),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub member_id: Option<i64>,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
}

impl Transaction {
    pub fn is_revenue(&self) -> bool {
        self.amount > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub member_id: Option<i64>,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() {
            return Err(ClubError::invalid("amount", "must be a finite number"));
        }
        Ok(())
    }
}
