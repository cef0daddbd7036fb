// 🗄️ Persistence accessor - members, transactions, events (SQLite)
//
// Every call opens its own connection and drops it before returning:
// no pool, no connection shared between requests.

use crate::config::Config;
use crate::entities::{
    ClubEvent, Country, Member, MembershipType, NewEvent, NewMember, NewTransaction,
    PerCountry, Transaction, TransactionType,
};
use crate::error::{ClubError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// AGGREGATE ROWS
// ============================================================================

/// Members who joined in `month` for one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCountryStats {
    pub month: NaiveDate,
    pub country: Country,
    pub new_members: i64,
    /// How many of those are still active
    pub active_members: i64,
}

/// Per-member transaction activity, the input of churn scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberActivity {
    pub member_id: i64,
    pub join_date: NaiveDate,
    pub transaction_count: i64,
    /// None when the member has no transactions
    pub avg_transaction: Option<f64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenueStats {
    pub month: NaiveDate,
    pub revenue: f64,
    /// Distinct members with a transaction that month
    pub active_members: i64,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTypeTotal {
    pub month: NaiveDate,
    pub transaction_type: TransactionType,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCount {
    pub month: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCashflow {
    pub month: NaiveDate,
    pub net: f64,
    pub cumulative: f64,
}

/// Sums of positive and (absolute) negative transaction amounts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SignedTotals {
    pub revenue: f64,
    pub expenses: f64,
}

// ============================================================================
// AUDIT LOG
// ============================================================================

/// Audit trail entry: every enrollment, status change and import leaves one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: &str, entity_type: &str, entity_id: &str, data: serde_json::Value) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
        }
    }
}

pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<()> {
    let data_json = serde_json::to_string(&entry.data)?;

    conn.execute(
        "INSERT INTO audit_log (entry_id, timestamp, action, entity_type, entity_id, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.entry_id,
            entry.timestamp.to_rfc3339(),
            entry.action,
            entry.entity_type,
            entry.entity_id,
            data_json,
        ],
    )?;

    Ok(())
}

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub country: Option<Country>,
    pub active: Option<bool>,
    pub membership_type: Option<MembershipType>,
    pub joined_from: Option<NaiveDate>,
    pub joined_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub member_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub country: Option<Country>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

/// Accumulates `WHERE` clauses with positional parameters
#[derive(Default)]
struct WhereClause {
    clauses: Vec<&'static str>,
    values: Vec<Value>,
}

impl WhereClause {
    fn push(&mut self, clause: &'static str, value: Value) {
        self.clauses.push(clause);
        self.values.push(value);
    }

    fn push_date(&mut self, clause: &'static str, date: Option<NaiveDate>) {
        if let Some(date) = date {
            self.push(clause, Value::Text(date.format("%Y-%m-%d").to_string()));
        }
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            country TEXT NOT NULL,
            join_date TEXT NOT NULL,
            membership_type TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // import_hash is only set for bulk-imported rows (NULLs never collide)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER REFERENCES members(id),
            amount REAL NOT NULL,
            transaction_type TEXT NOT NULL,
            transaction_date TEXT NOT NULL,
            import_hash TEXT UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            country TEXT NOT NULL,
            revenue REAL NOT NULL,
            costs REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_country ON members(country, active)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(transaction_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_member ON transactions(member_id)",
        [],
    )?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_events_date ON events(date)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPERS
// ============================================================================

const MEMBER_COLUMNS: &str = "id, name, email, country, join_date, membership_type, active";

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        country: row.get(3)?,
        join_date: row.get(4)?,
        membership_type: row.get(5)?,
        active: row.get(6)?,
    })
}

const TRANSACTION_COLUMNS: &str = "id, member_id, amount, transaction_type, transaction_date";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        member_id: row.get(1)?,
        amount: row.get(2)?,
        transaction_type: row.get(3)?,
        transaction_date: row.get(4)?,
    })
}

const EVENT_COLUMNS: &str = "id, name, date, country, revenue, costs";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ClubEvent> {
    Ok(ClubEvent {
        id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        country: row.get(3)?,
        revenue: row.get(4)?,
        costs: row.get(5)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// STORE
// ============================================================================

/// Handle on the club database. Holds a path, never a live connection.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    membership_fee: f64,
}

impl Store {
    /// `config.annual_fee` is the amount charged on enrollment
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Self {
        Store {
            path: path.as_ref().to_path_buf(),
            membership_fee: config.annual_fee,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the database file (if needed) and the schema
    pub fn init(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        setup_database(&conn)?;
        info!(path = %self.path.display(), "database initialized");
        Ok(())
    }

    /// Fresh connection to an existing database; a missing file is an error
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `f` on a scoped connection
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    /// Run `f` inside one SQLite transaction; commits only if `f` succeeds
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ========================================================================
    // MEMBERS
    // ========================================================================

    /// Insert a member plus the membership-fee transaction for its join date
    pub fn enroll_member(&self, member: &NewMember) -> Result<i64> {
        member.validate()?;
        let fee = self.membership_fee;

        let member_id = self.with_transaction(|tx| {
            let inserted = tx.execute(
                "INSERT INTO members (name, email, country, join_date, membership_type, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    member.name.trim(),
                    member.email.trim(),
                    member.country,
                    member.join_date,
                    member.membership_type,
                    member.active,
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(ClubError::invalid(
                        "email",
                        format!("'{}' is already registered", member.email.trim()),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            let member_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO transactions (member_id, amount, transaction_type, transaction_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![member_id, fee, TransactionType::MembershipFee, member.join_date],
            )?;

            insert_audit_entry(
                tx,
                &AuditEntry::new(
                    "member_enrolled",
                    "member",
                    &member_id.to_string(),
                    serde_json::json!({
                        "country": member.country,
                        "membership_type": member.membership_type,
                        "fee": fee,
                    }),
                ),
            )?;

            Ok(member_id)
        })?;

        info!(member_id, country = %member.country, "member enrolled");
        Ok(member_id)
    }

    pub fn update_member_status(&self, member_id: i64, active: bool) -> Result<()> {
        self.with_transaction(|tx| {
            let updated = tx.execute(
                "UPDATE members SET active = ?1 WHERE id = ?2",
                params![active, member_id],
            )?;
            if updated == 0 {
                return Err(ClubError::MemberNotFound(member_id));
            }

            insert_audit_entry(
                tx,
                &AuditEntry::new(
                    "member_status_changed",
                    "member",
                    &member_id.to_string(),
                    serde_json::json!({ "active": active }),
                ),
            )
        })?;

        info!(member_id, active, "member status updated");
        Ok(())
    }

    pub fn get_member(&self, member_id: i64) -> Result<Option<Member>> {
        self.with_connection(|conn| {
            let member = conn
                .query_row(
                    &format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS),
                    [member_id],
                    member_from_row,
                )
                .optional()?;
            Ok(member)
        })
    }

    /// Active members of one country, newest first
    pub fn members_by_country(&self, country: Country) -> Result<Vec<Member>> {
        self.query_members(&MemberFilter {
            country: Some(country),
            active: Some(true),
            ..Default::default()
        })
    }

    pub fn query_members(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        let mut clause = WhereClause::default();
        if let Some(country) = filter.country {
            clause.push("country = ?", Value::Text(country.as_str().to_string()));
        }
        if let Some(active) = filter.active {
            clause.push("active = ?", Value::Integer(active as i64));
        }
        if let Some(kind) = filter.membership_type {
            clause.push("membership_type = ?", Value::Text(kind.as_str().to_string()));
        }
        clause.push_date("join_date >= ?", filter.joined_from);
        clause.push_date("join_date <= ?", filter.joined_until);

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM members {} ORDER BY join_date DESC, id DESC",
                MEMBER_COLUMNS,
                clause.sql()
            ))?;
            let members = stmt
                .query_map(params_from_iter(clause.values.iter()), member_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }

    pub fn count_active_members(&self) -> Result<i64> {
        self.with_connection(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM members WHERE active = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// (active, total) member counts
    pub fn member_counts(&self) -> Result<(i64, i64)> {
        self.with_connection(|conn| {
            let counts = conn.query_row(
                "SELECT COALESCE(SUM(CASE WHEN active = 1 THEN 1 ELSE 0 END), 0), COUNT(*)
                 FROM members",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(counts)
        })
    }

    pub fn active_members_by_country(&self) -> Result<PerCountry<f64>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT country, COUNT(*) FROM members WHERE active = 1 GROUP BY country",
            )?;
            let mut counts = PerCountry::<f64>::default();
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, Country>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (country, count) = row?;
                *counts.get_mut(country) = count as f64;
            }
            Ok(counts)
        })
    }

    /// New members per month (by join date), oldest month first
    pub fn monthly_new_members(&self, since: Option<NaiveDate>) -> Result<Vec<MonthlyCount>> {
        let mut clause = WhereClause::default();
        clause.push_date("join_date >= ?", since);

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT strftime('%Y-%m-01', join_date) AS month, COUNT(*)
                 FROM members {}
                 GROUP BY month
                 ORDER BY month",
                clause.sql()
            ))?;
            let rows = stmt
                .query_map(params_from_iter(clause.values.iter()), |row| {
                    Ok(MonthlyCount {
                        month: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn monthly_country_stats(&self) -> Result<Vec<MonthlyCountryStats>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT strftime('%Y-%m-01', join_date) AS month,
                        country,
                        COUNT(*),
                        COALESCE(SUM(CASE WHEN active = 1 THEN 1 ELSE 0 END), 0)
                 FROM members
                 GROUP BY month, country
                 ORDER BY month, country",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MonthlyCountryStats {
                        month: row.get(0)?,
                        country: row.get(1)?,
                        new_members: row.get(2)?,
                        active_members: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            debug!(rows = rows.len(), "loaded monthly country stats");
            Ok(rows)
        })
    }

    pub fn member_activity(&self) -> Result<Vec<MemberActivity>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.join_date, COUNT(t.id), AVG(t.amount), m.active
                 FROM members m
                 LEFT JOIN transactions t ON m.id = t.member_id
                 GROUP BY m.id
                 ORDER BY m.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MemberActivity {
                        member_id: row.get(0)?,
                        join_date: row.get(1)?,
                        transaction_count: row.get(2)?,
                        avg_transaction: row.get(3)?,
                        active: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    pub fn record_transaction(&self, transaction: &NewTransaction) -> Result<i64> {
        transaction.validate()?;

        self.with_transaction(|tx| {
            if let Some(member_id) = transaction.member_id {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM members WHERE id = ?1)",
                    [member_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(ClubError::MemberNotFound(member_id));
                }
            }

            tx.execute(
                "INSERT INTO transactions (member_id, amount, transaction_type, transaction_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    transaction.member_id,
                    transaction.amount,
                    transaction.transaction_type,
                    transaction.transaction_date,
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut clause = WhereClause::default();
        if let Some(member_id) = filter.member_id {
            clause.push("member_id = ?", Value::Integer(member_id));
        }
        if let Some(kind) = filter.transaction_type {
            clause.push("transaction_type = ?", Value::Text(kind.as_str().to_string()));
        }
        clause.push_date("transaction_date >= ?", filter.from);
        clause.push_date("transaction_date <= ?", filter.until);

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions {} ORDER BY transaction_date DESC, id DESC",
                TRANSACTION_COLUMNS,
                clause.sql()
            ))?;
            let transactions = stmt
                .query_map(params_from_iter(clause.values.iter()), transaction_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(transactions)
        })
    }

    /// Net of all transaction amounts dated on or after `since`
    pub fn sum_revenue(&self, since: NaiveDate) -> Result<f64> {
        self.with_connection(|conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE transaction_date >= ?1",
                [since],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    pub fn signed_totals(&self, since: Option<NaiveDate>) -> Result<SignedTotals> {
        let mut clause = WhereClause::default();
        clause.push_date("transaction_date >= ?", since);

        self.with_connection(|conn| {
            let totals = conn.query_row(
                &format!(
                    "SELECT COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
                            COALESCE(SUM(CASE WHEN amount < 0 THEN amount ELSE 0 END), 0)
                     FROM transactions {}",
                    clause.sql()
                ),
                params_from_iter(clause.values.iter()),
                |row| {
                    Ok(SignedTotals {
                        revenue: row.get(0)?,
                        expenses: row.get::<_, f64>(1)?.abs(),
                    })
                },
            )?;
            Ok(totals)
        })
    }

    /// Mean over members of their summed transaction amounts.
    /// Members without transactions in range are left out; None if nobody has any.
    pub fn revenue_per_member(&self, since: Option<NaiveDate>) -> Result<Option<f64>> {
        let since_text = since.map(|d| d.format("%Y-%m-%d").to_string());

        self.with_connection(|conn| {
            let mean = conn.query_row(
                "SELECT AVG(revenue) FROM (
                     SELECT SUM(t.amount) AS revenue
                     FROM members m
                     LEFT JOIN transactions t
                        ON m.id = t.member_id
                       AND (?1 IS NULL OR t.transaction_date >= ?1)
                     GROUP BY m.id
                 )",
                [since_text],
                |row| row.get(0),
            )?;
            Ok(mean)
        })
    }

    pub fn monthly_revenue_stats(&self) -> Result<Vec<MonthlyRevenueStats>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT strftime('%Y-%m-01', transaction_date) AS month,
                        SUM(amount),
                        COUNT(DISTINCT member_id),
                        COUNT(*)
                 FROM transactions
                 GROUP BY month
                 ORDER BY month",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MonthlyRevenueStats {
                        month: row.get(0)?,
                        revenue: row.get(1)?,
                        active_members: row.get(2)?,
                        transaction_count: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Monthly totals per transaction type between two dates (inclusive)
    pub fn financial_summary(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MonthlyTypeTotal>> {
        if start > end {
            return Err(ClubError::invalid("date range", "start is after end"));
        }

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT strftime('%Y-%m-01', transaction_date) AS month,
                        transaction_type,
                        SUM(amount)
                 FROM transactions
                 WHERE transaction_date BETWEEN ?1 AND ?2
                 GROUP BY month, transaction_type
                 ORDER BY month, transaction_type",
            )?;
            let rows = stmt
                .query_map(params![start, end], |row| {
                    Ok(MonthlyTypeTotal {
                        month: row.get(0)?,
                        transaction_type: row.get(1)?,
                        total_amount: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Net amount per month with a running total
    pub fn monthly_cashflow(&self, since: Option<NaiveDate>) -> Result<Vec<MonthlyCashflow>> {
        let mut clause = WhereClause::default();
        clause.push_date("transaction_date >= ?", since);

        let nets: Vec<(NaiveDate, f64)> = self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT strftime('%Y-%m-01', transaction_date) AS month, SUM(amount)
                 FROM transactions {}
                 GROUP BY month
                 ORDER BY month",
                clause.sql()
            ))?;
            let rows = stmt
                .query_map(params_from_iter(clause.values.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut cumulative = 0.0;
        Ok(nets
            .into_iter()
            .map(|(month, net)| {
                cumulative += net;
                MonthlyCashflow { month, net, cumulative }
            })
            .collect())
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn record_event(&self, event: &NewEvent) -> Result<i64> {
        event.validate()?;

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO events (name, date, country, revenue, costs)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![event.name.trim(), event.date, event.country, event.revenue, event.costs],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Events in date order
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<ClubEvent>> {
        let mut clause = WhereClause::default();
        if let Some(country) = filter.country {
            clause.push("country = ?", Value::Text(country.as_str().to_string()));
        }
        clause.push_date("date >= ?", filter.from);
        clause.push_date("date <= ?", filter.until);

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM events {} ORDER BY date, id",
                EVENT_COLUMNS,
                clause.sql()
            ))?;
            let events = stmt
                .query_map(params_from_iter(clause.values.iter()), event_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    pub fn audit_entries_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entry_id, timestamp, action, entity_type, entity_id, data
                 FROM audit_log
                 WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY id",
            )?;

            let rows = stmt
                .query_map(params![entity_type, entity_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(entry_id, timestamp, action, entity_type, entity_id, data)| {
                    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| ClubError::invalid("audit timestamp", e.to_string()))?
                        .with_timezone(&Utc);
                    Ok(AuditEntry {
                        entry_id,
                        timestamp,
                        action,
                        entity_type,
                        entity_id,
                        data: serde_json::from_str(&data)?,
                    })
                })
                .collect()
        })
    }
}

// ============================================================================
// DATA ACCESS SEAM
// ============================================================================

/// The slice of the store the forecasters consume.
///
/// `Store` is the production implementation; anything that can answer these
/// queries (or fail to) can stand in for it.
pub trait ClubData {
    fn active_members_by_country(&self) -> Result<PerCountry<f64>>;
    fn count_active_members(&self) -> Result<i64>;
    fn sum_revenue(&self, since: NaiveDate) -> Result<f64>;
    fn monthly_country_stats(&self) -> Result<Vec<MonthlyCountryStats>>;
    fn member_activity(&self) -> Result<Vec<MemberActivity>>;
    fn monthly_revenue_stats(&self) -> Result<Vec<MonthlyRevenueStats>>;
}

impl ClubData for Store {
    fn active_members_by_country(&self) -> Result<PerCountry<f64>> {
        Store::active_members_by_country(self)
    }

    fn count_active_members(&self) -> Result<i64> {
        Store::count_active_members(self)
    }

    fn sum_revenue(&self, since: NaiveDate) -> Result<f64> {
        Store::sum_revenue(self, since)
    }

    fn monthly_country_stats(&self) -> Result<Vec<MonthlyCountryStats>> {
        Store::monthly_country_stats(self)
    }

    fn member_activity(&self) -> Result<Vec<MemberActivity>> {
        Store::member_activity(self)
    }

    fn monthly_revenue_stats(&self) -> Result<Vec<MonthlyRevenueStats>> {
        Store::monthly_revenue_stats(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testutil::date;
    use tempfile::TempDir;

    /// Initialized store in a temp directory (keep the TempDir alive)
    pub(crate) fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("club.db"), &Config::default());
        store.init().unwrap();
        (dir, store)
    }

    pub(crate) fn member(name: &str, country: Country, joined: NaiveDate) -> NewMember {
        NewMember::new(
            name,
            &format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            country,
            joined,
            MembershipType::Standard,
        )
    }

    #[test]
    fn test_enrollment_records_fee() {
        let (_dir, store) = temp_store();

        let id = store
            .enroll_member(&member("Anna", Country::Netherlands, date(2024, 1, 15)))
            .unwrap();

        let txs = store
            .query_transactions(&TransactionFilter {
                member_id: Some(id),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 795.0);
        assert_eq!(txs[0].transaction_type, TransactionType::MembershipFee);
        assert_eq!(txs[0].transaction_date, date(2024, 1, 15));

        let audit = store.audit_entries_for("member", &id.to_string()).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "member_enrolled");
    }

    #[test]
    fn test_duplicate_email_rejected_without_side_effects() {
        let (_dir, store) = temp_store();
        let anna = member("Anna", Country::Netherlands, date(2024, 1, 15));

        store.enroll_member(&anna).unwrap();
        let err = store.enroll_member(&anna).unwrap_err();
        assert!(matches!(err, ClubError::InvalidInput { .. }));

        // Rolled back: still one member, one fee
        assert_eq!(store.member_counts().unwrap(), (1, 1));
        assert_eq!(
            store.query_transactions(&TransactionFilter::default()).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_status_change_and_country_listing() {
        let (_dir, store) = temp_store();
        let a = store
            .enroll_member(&member("Anna", Country::Netherlands, date(2024, 1, 15)))
            .unwrap();
        store
            .enroll_member(&member("Bram", Country::Netherlands, date(2024, 3, 2)))
            .unwrap();
        store
            .enroll_member(&member("Chloe", Country::Belgium, date(2024, 2, 9)))
            .unwrap();

        store.update_member_status(a, false).unwrap();

        let nl = store.members_by_country(Country::Netherlands).unwrap();
        assert_eq!(nl.len(), 1);
        assert_eq!(nl[0].name, "Bram");

        assert_eq!(store.count_active_members().unwrap(), 2);
        assert_eq!(store.member_counts().unwrap(), (2, 3));

        let by_country = store.active_members_by_country().unwrap();
        assert_eq!(by_country, PerCountry::new(1.0, 1.0, 0.0));

        assert!(matches!(
            store.update_member_status(999, true),
            Err(ClubError::MemberNotFound(999))
        ));
        assert!(!store.get_member(a).unwrap().unwrap().active);
    }

    #[test]
    fn test_transaction_requires_existing_member() {
        let (_dir, store) = temp_store();

        let err = store
            .record_transaction(&NewTransaction {
                member_id: Some(42),
                amount: 50.0,
                transaction_type: TransactionType::EventFee,
                transaction_date: date(2024, 4, 1),
            })
            .unwrap_err();
        assert!(matches!(err, ClubError::MemberNotFound(42)));

        // Unowned transactions are allowed
        let id = store
            .record_transaction(&NewTransaction {
                member_id: None,
                amount: -120.0,
                transaction_type: TransactionType::EventFee,
                transaction_date: date(2024, 4, 1),
            })
            .unwrap();
        assert!(id > 0);
    }

    #[test]
    fn test_revenue_aggregations() {
        let (_dir, store) = temp_store();
        let a = store
            .enroll_member(&member("Anna", Country::Netherlands, date(2024, 1, 15)))
            .unwrap();
        store
            .enroll_member(&member("Bram", Country::Germany, date(2024, 2, 3)))
            .unwrap();
        store
            .record_transaction(&NewTransaction {
                member_id: Some(a),
                amount: 50.0,
                transaction_type: TransactionType::EventFee,
                transaction_date: date(2024, 2, 20),
            })
            .unwrap();
        store
            .record_transaction(&NewTransaction {
                member_id: None,
                amount: -300.0,
                transaction_type: TransactionType::EventFee,
                transaction_date: date(2024, 2, 21),
            })
            .unwrap();

        assert_eq!(store.sum_revenue(date(2024, 2, 1)).unwrap(), 795.0 + 50.0 - 300.0);

        let totals = store.signed_totals(None).unwrap();
        assert_eq!(totals.revenue, 795.0 * 2.0 + 50.0);
        assert_eq!(totals.expenses, 300.0);

        let monthly = store.monthly_revenue_stats().unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[1].month, date(2024, 2, 1));
        assert_eq!(monthly[1].transaction_count, 3);
        assert_eq!(monthly[1].active_members, 2);

        // Anna 845, Bram 795
        assert_eq!(store.revenue_per_member(None).unwrap(), Some(820.0));

        let cashflow = store.monthly_cashflow(None).unwrap();
        assert_eq!(cashflow[0].net, 795.0);
        assert_eq!(cashflow[1].cumulative, 795.0 + 795.0 + 50.0 - 300.0);

        let summary = store.financial_summary(date(2024, 2, 1), date(2024, 2, 29)).unwrap();
        assert_eq!(summary.len(), 2);
        assert!(store.financial_summary(date(2024, 3, 1), date(2024, 2, 1)).is_err());
    }

    #[test]
    fn test_member_and_event_filters() {
        let (_dir, store) = temp_store();
        store
            .enroll_member(&member("Anna", Country::Netherlands, date(2023, 11, 5)))
            .unwrap();
        let mut premium = member("Dirk", Country::Germany, date(2024, 5, 1));
        premium.membership_type = MembershipType::Premium;
        store.enroll_member(&premium).unwrap();

        let recent = store
            .query_members(&MemberFilter {
                joined_from: Some(date(2024, 1, 1)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].membership_type, MembershipType::Premium);

        store
            .record_event(&NewEvent {
                name: "Berlin Meetup".to_string(),
                date: date(2024, 6, 1),
                country: Country::Germany,
                revenue: 1000.0,
                costs: 400.0,
            })
            .unwrap();
        let german = store
            .query_events(&EventFilter {
                country: Some(Country::Germany),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(german.len(), 1);
        assert_eq!(german[0].profit(), 600.0);
        assert!(store
            .query_events(&EventFilter {
                country: Some(Country::Belgium),
                ..Default::default()
            })
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_monthly_country_stats() {
        let (_dir, store) = temp_store();
        let a = store
            .enroll_member(&member("Anna", Country::Netherlands, date(2024, 1, 15)))
            .unwrap();
        store
            .enroll_member(&member("Bram", Country::Netherlands, date(2024, 1, 20)))
            .unwrap();
        store
            .enroll_member(&member("Chloe", Country::Belgium, date(2024, 2, 9)))
            .unwrap();
        store.update_member_status(a, false).unwrap();

        let stats = store.monthly_country_stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].month, date(2024, 1, 1));
        assert_eq!(stats[0].country, Country::Netherlands);
        assert_eq!(stats[0].new_members, 2);
        assert_eq!(stats[0].active_members, 1);

        let activity = store.member_activity().unwrap();
        assert_eq!(activity.len(), 3);
        assert_eq!(activity[0].transaction_count, 1);
        assert_eq!(activity[0].avg_transaction, Some(795.0));
        assert!(!activity[0].active);
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("absent.db"), &Config::default());

        assert!(store.count_active_members().is_err());
        assert!(!dir.path().join("absent.db").exists());
    }
}
