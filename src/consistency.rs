// 🔍 Consistency Scan - post-hoc checks over stored records
//
// Nothing here is enforced at write time. The scan reports:
//   - dates after the reference date (members, transactions, events)
//   - transactions pointing at members that do not exist
//   - membership fees that differ from the configured annual fee
//   - events with negative revenue or costs

use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const FEE_TOLERANCE: f64 = 0.005;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Record contradicts the data model
    Warning,  // Record is suspicious but usable
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FutureDate,
    OrphanReference,
    FeeMismatch,
    NegativeEventFigure,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::OrphanReference | IssueKind::NegativeEventFigure => Severity::Critical,
            IssueKind::FutureDate | IssueKind::FeeMismatch => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub entity_type: String,
    pub entity_id: i64,
    pub message: String,
}

impl ConsistencyIssue {
    fn new(kind: IssueKind, entity_type: &str, entity_id: i64, message: String) -> Self {
        ConsistencyIssue {
            kind,
            severity: kind.severity(),
            entity_type: entity_type.to_string(),
            entity_id,
            message,
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub as_of: NaiveDate,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Issues: {} ({} critical) as of {}",
            self.issues.len(),
            self.issues
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .count(),
            self.as_of
        )
    }
}

// ============================================================================
// CHECKS
// ============================================================================

fn future_dates(conn: &Connection, as_of: NaiveDate) -> Result<Vec<ConsistencyIssue>> {
    let sources = [
        ("member", "SELECT id, join_date FROM members WHERE join_date > ?1"),
        ("transaction", "SELECT id, transaction_date FROM transactions WHERE transaction_date > ?1"),
        ("event", "SELECT id, date FROM events WHERE date > ?1"),
    ];

    let mut issues = Vec::new();
    for (entity, sql) in sources {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([as_of], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, NaiveDate>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        issues.extend(rows.into_iter().map(|(id, date)| {
            ConsistencyIssue::new(
                IssueKind::FutureDate,
                entity,
                id,
                format!("{} {} is dated {}, after {}", entity, id, date, as_of),
            )
        }));
    }
    Ok(issues)
}

fn orphan_references(conn: &Connection) -> Result<Vec<ConsistencyIssue>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.member_id
         FROM transactions t
         LEFT JOIN members m ON t.member_id = m.id
         WHERE t.member_id IS NOT NULL AND m.id IS NULL
         ORDER BY t.id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, member_id)| {
            ConsistencyIssue::new(
                IssueKind::OrphanReference,
                "transaction",
                id,
                format!("transaction {} references missing member {}", id, member_id),
            )
        })
        .collect())
}

fn fee_mismatches(conn: &Connection, annual_fee: f64) -> Result<Vec<ConsistencyIssue>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount FROM transactions
         WHERE transaction_type = 'membership_fee' AND ABS(amount - ?1) > ?2
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![annual_fee, FEE_TOLERANCE], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, amount)| {
            ConsistencyIssue::new(
                IssueKind::FeeMismatch,
                "transaction",
                id,
                format!("membership fee {:.2} differs from configured {:.2}", amount, annual_fee),
            )
        })
        .collect())
}

fn negative_event_figures(conn: &Connection) -> Result<Vec<ConsistencyIssue>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, revenue, costs FROM events
         WHERE revenue < 0 OR costs < 0
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, name, revenue, costs)| {
            ConsistencyIssue::new(
                IssueKind::NegativeEventFigure,
                "event",
                id,
                format!("event '{}' has revenue {:.2} and costs {:.2}", name, revenue, costs),
            )
        })
        .collect())
}

/// Scan the whole store; records dated after `as_of` count as future-dated
pub fn verify_data_consistency(store: &Store, config: &Config, as_of: NaiveDate) -> Result<ConsistencyReport> {
    let issues = store.with_connection(|conn| {
        let mut issues = future_dates(conn, as_of)?;
        issues.extend(orphan_references(conn)?);
        issues.extend(fee_mismatches(conn, config.annual_fee)?);
        issues.extend(negative_event_figures(conn)?);
        Ok(issues)
    })?;

    let report = ConsistencyReport { as_of, issues };
    if report.is_consistent() {
        info!(as_of = %as_of, "consistency scan clean");
    } else {
        warn!(issues = report.issues.len(), critical = report.has_critical_issues(), "consistency issues found");
    }
    Ok(report)
}
