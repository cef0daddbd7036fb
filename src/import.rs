// 📥 Data Management - CSV templates, validation and bulk import
//
// validate_import() turns a CSV into typed rows or fails with the first
// offending line; bulk_import() writes a validated batch in one SQLite
// transaction so a failing row leaves the store untouched.

use crate::db::{insert_audit_entry, AuditEntry, Store};
use crate::entities::{validate_email, Country, MembershipType, NewEvent, NewMember, TransactionType};
use crate::error::{ClubError, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Writer};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

// ============================================================================
// IMPORT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Members,
    Transactions,
    Events,
}

impl ImportKind {
    pub const ALL: [ImportKind; 3] = [ImportKind::Members, ImportKind::Transactions, ImportKind::Events];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Members => "members",
            ImportKind::Transactions => "transactions",
            ImportKind::Events => "events",
        }
    }

    /// Columns every file of this kind must carry
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ImportKind::Members => &["name", "email", "country", "join_date", "membership_type"],
            ImportKind::Transactions => &["member_email", "amount", "transaction_type", "transaction_date"],
            ImportKind::Events => &["name", "date", "country", "revenue", "costs"],
        }
    }

    /// Columns read when present; absent ones take their default
    pub fn optional_columns(&self) -> &'static [&'static str] {
        match self {
            ImportKind::Members => &["active"],
            ImportKind::Transactions | ImportKind::Events => &[],
        }
    }

    /// Required columns followed by optional ones, in template order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = self.required_columns().to_vec();
        columns.extend_from_slice(self.optional_columns());
        columns
    }

    fn example_row(&self) -> &'static [&'static str] {
        match self {
            ImportKind::Members => &["Jan Jansen", "jan@example.com", "Netherlands", "2024-01-15", "Standard", "true"],
            ImportKind::Transactions => &["jan@example.com", "795.00", "membership_fee", "2024-01-15"],
            ImportKind::Events => &["Spring Networking", "2024-03-20", "Belgium", "2500.00", "1200.00"],
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "members" | "member" => Ok(ImportKind::Members),
            "transactions" | "transaction" => Ok(ImportKind::Transactions),
            "events" | "event" => Ok(ImportKind::Events),
            other => Err(ClubError::invalid(
                "kind",
                format!("'{}' is not members, transactions or events", other),
            )),
        }
    }
}

/// Header plus one example row
pub fn template(kind: ImportKind) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(kind.columns())?;
    writer.write_record(kind.example_row())?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ClubError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ClubError::invalid("template", e.to_string()))
}

// ============================================================================
// TYPED ROWS
// ============================================================================

/// Transaction row as imported: the member is named by email, not id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRow {
    pub member_email: Option<String>,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
}

impl TransactionRow {
    /// Identity for duplicate detection across repeated imports
    pub fn import_hash(&self) -> String {
        self.occurrence_hash(0)
    }

    /// Hash of the `occurrence`-th identical row within one file, so
    /// repeated rows stay distinct while re-importing the file is a no-op
    pub fn occurrence_hash(&self, occurrence: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.member_email.as_deref().unwrap_or(""),
            self.amount,
            self.transaction_type,
            self.transaction_date
        ));
        if occurrence > 0 {
            hasher.update(format!("#{}", occurrence));
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportRows {
    Members(Vec<NewMember>),
    Transactions(Vec<TransactionRow>),
    Events(Vec<NewEvent>),
}

impl ImportRows {
    pub fn kind(&self) -> ImportKind {
        match self {
            ImportRows::Members(_) => ImportKind::Members,
            ImportRows::Transactions(_) => ImportKind::Transactions,
            ImportRows::Events(_) => ImportKind::Events,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImportRows::Members(rows) => rows.len(),
            ImportRows::Transactions(rows) => rows.len(),
            ImportRows::Events(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Field access by header name with line-numbered errors
struct Line<'r> {
    record: &'r StringRecord,
    columns: &'r [Option<usize>],
    names: &'r [&'static str],
    number: usize,
}

impl<'r> Line<'r> {
    fn raw(&self, column: &str) -> &'r str {
        self.names
            .iter()
            .position(|n| *n == column)
            .and_then(|i| self.columns[i])
            .and_then(|c| self.record.get(c))
            .unwrap_or("")
            .trim()
    }

    /// Blank or missing cells take `default`
    fn flag(&self, column: &str, default: bool) -> Result<bool> {
        let raw = self.raw(column);
        match raw.to_lowercase().as_str() {
            "" => Ok(default),
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(self.fail(column, format!("'{}' is not true/false/1/0", raw))),
        }
    }

    fn fail(&self, column: &str, message: impl fmt::Display) -> ClubError {
        ClubError::invalid(column, format!("line {}: {}", self.number, message))
    }

    fn parse<T: FromStr>(&self, column: &str) -> Result<T>
    where
        T::Err: fmt::Display,
    {
        let raw = self.raw(column);
        raw.parse::<T>()
            .map_err(|e| self.fail(column, format!("'{}': {}", raw, e)))
    }

    fn date(&self, column: &str) -> Result<NaiveDate> {
        let raw = self.raw(column);
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| self.fail(column, format!("'{}' is not a YYYY-MM-DD date", raw)))
    }

    fn amount(&self, column: &str) -> Result<f64> {
        let value: f64 = self.parse(column)?;
        if !value.is_finite() {
            return Err(self.fail(column, "amount must be a finite number"));
        }
        Ok(value)
    }

    fn text(&self, column: &str) -> Result<String> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Err(self.fail(column, "must not be empty"));
        }
        Ok(raw.to_string())
    }
}

fn member_row(line: &Line) -> Result<NewMember> {
    let email = line.text("email")?;
    validate_email(&email).map_err(|e| line.fail("email", e))?;

    let mut member = NewMember::new(
        &line.text("name")?,
        &email,
        line.parse::<Country>("country")?,
        line.date("join_date")?,
        line.parse::<MembershipType>("membership_type")?,
    );
    member.active = line.flag("active", true)?;
    Ok(member)
}

fn transaction_row(line: &Line) -> Result<TransactionRow> {
    let email = line.raw("member_email");
    let member_email = if email.is_empty() {
        None
    } else {
        validate_email(email).map_err(|e| line.fail("member_email", e))?;
        Some(email.to_string())
    };

    Ok(TransactionRow {
        member_email,
        amount: line.amount("amount")?,
        transaction_type: line.parse::<TransactionType>("transaction_type")?,
        transaction_date: line.date("transaction_date")?,
    })
}

fn event_row(line: &Line) -> Result<NewEvent> {
    let event = NewEvent {
        name: line.text("name")?,
        date: line.date("date")?,
        country: line.parse::<Country>("country")?,
        revenue: line.amount("revenue")?,
        costs: line.amount("costs")?,
    };
    event.validate().map_err(|e| line.fail("event", e))?;
    Ok(event)
}

/// Parse and validate a whole CSV; nothing is written to the store
pub fn validate_import<R: Read>(kind: ImportKind, input: R) -> Result<ImportRows> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let names = kind.columns();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let mut columns = Vec::with_capacity(names.len());
    for &name in kind.required_columns() {
        match position(name) {
            Some(i) => columns.push(Some(i)),
            None => return Err(ClubError::invalid(name, "missing required column")),
        }
    }
    columns.extend(kind.optional_columns().iter().map(|&name| position(name)));

    let mut members = Vec::new();
    let mut transactions = Vec::new();
    let mut events = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = Line {
            record: &record,
            columns: &columns,
            names: &names,
            number: i + 2,
        };
        match kind {
            ImportKind::Members => members.push(member_row(&line)?),
            ImportKind::Transactions => transactions.push(transaction_row(&line)?),
            ImportKind::Events => events.push(event_row(&line)?),
        }
    }

    Ok(match kind {
        ImportKind::Members => ImportRows::Members(members),
        ImportKind::Transactions => ImportRows::Transactions(transactions),
        ImportKind::Events => ImportRows::Events(events),
    })
}

pub fn read_import_file<P: AsRef<Path>>(kind: ImportKind, path: P) -> Result<ImportRows> {
    let file = std::fs::File::open(path.as_ref())?;
    validate_import(kind, file)
}

// ============================================================================
// BULK IMPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub inserted: usize,
    /// Members whose email already exists, or transactions already
    /// imported (identical rows within one file count as separate
    /// transactions)
    pub skipped: usize,
}

pub fn bulk_import(store: &Store, rows: &ImportRows) -> Result<ImportSummary> {
    let kind = rows.kind();

    let summary = store.with_transaction(|tx| {
        let mut inserted = 0;
        let mut skipped = 0;

        match rows {
            ImportRows::Members(members) => {
                for member in members {
                    let exists: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM members WHERE email = ?1)",
                        [member.email.trim()],
                        |row| row.get(0),
                    )?;
                    if exists {
                        skipped += 1;
                        continue;
                    }
                    tx.execute(
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
                    )?;
                    inserted += 1;
                }
            }
            ImportRows::Transactions(transactions) => {
                let mut occurrences: HashMap<String, usize> = HashMap::new();
                for row in transactions {
                    let seen = occurrences.entry(row.import_hash()).or_insert(0);
                    let hash = row.occurrence_hash(*seen);
                    *seen += 1;

                    let member_id: Option<i64> = match &row.member_email {
                        Some(email) => tx
                            .query_row("SELECT id FROM members WHERE email = ?1", [email], |r| r.get(0))
                            .optional()?,
                        None => None,
                    };
                    let changed = tx.execute(
                        "INSERT OR IGNORE INTO transactions
                            (member_id, amount, transaction_type, transaction_date, import_hash)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            member_id,
                            row.amount,
                            row.transaction_type,
                            row.transaction_date,
                            hash,
                        ],
                    )?;
                    if changed == 0 {
                        skipped += 1;
                    } else {
                        inserted += 1;
                    }
                }
            }
            ImportRows::Events(events) => {
                for event in events {
                    tx.execute(
                        "INSERT INTO events (name, date, country, revenue, costs)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![event.name, event.date, event.country, event.revenue, event.costs],
                    )?;
                    inserted += 1;
                }
            }
        }

        insert_audit_entry(
            tx,
            &AuditEntry::new(
                "bulk_import",
                kind.as_str(),
                "batch",
                serde_json::json!({ "inserted": inserted, "skipped": skipped }),
            ),
        )?;

        Ok(ImportSummary {
            kind,
            inserted,
            skipped,
        })
    })?;

    info!(
        kind = %kind,
        inserted = summary.inserted,
        skipped = summary.skipped,
        "bulk import complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::temp_store;
    use crate::db::{MemberFilter, TransactionFilter};
    use crate::testutil::date;

    const MEMBERS_CSV: &str = "\
name,email,country,join_date,membership_type
Anna de Vries,anna@example.com,Netherlands,2024-01-10,Standard
Ben Peeters,ben@example.com,BE,2024-02-01,premium
";

    #[test]
    fn test_templates_validate() {
        for kind in ImportKind::ALL {
            let csv = template(kind).unwrap();
            assert!(csv.starts_with(kind.required_columns()[0]));
            let rows = validate_import(kind, csv.as_bytes()).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows.kind(), kind);
        }
    }

    #[test]
    fn test_validate_members() {
        let rows = validate_import(ImportKind::Members, MEMBERS_CSV.as_bytes()).unwrap();
        let ImportRows::Members(members) = rows else {
            panic!("expected members");
        };
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].country, Country::Belgium);
        assert_eq!(members[1].membership_type, MembershipType::Premium);
    }

    #[test]
    fn test_validation_errors() {
        let missing = "name,email,country,join_date\nA,a@example.com,Netherlands,2024-01-01\n";
        let err = validate_import(ImportKind::Members, missing.as_bytes()).unwrap_err();
        assert!(matches!(err, ClubError::InvalidInput { ref field, .. } if field == "membership_type"));

        let bad_date = "name,email,country,join_date,membership_type\nA,a@example.com,Netherlands,01/02/2024,Standard\n";
        let err = validate_import(ImportKind::Members, bad_date.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let bad_email = "name,email,country,join_date,membership_type\nA,not-an-email,Netherlands,2024-01-01,Standard\n";
        assert!(validate_import(ImportKind::Members, bad_email.as_bytes()).is_err());

        let bad_amount = "member_email,amount,transaction_type,transaction_date\n,abc,event_fee,2024-01-01\n";
        assert!(validate_import(ImportKind::Transactions, bad_amount.as_bytes()).is_err());

        let negative = "name,date,country,revenue,costs\nGala,2024-01-01,Germany,-5,10\n";
        assert!(validate_import(ImportKind::Events, negative.as_bytes()).is_err());
    }

    #[test]
    fn test_bulk_import_members_skips_duplicates() {
        let (_dir, store) = temp_store();
        let rows = validate_import(ImportKind::Members, MEMBERS_CSV.as_bytes()).unwrap();

        let first = bulk_import(&store, &rows).unwrap();
        assert_eq!((first.inserted, first.skipped), (2, 0));

        let second = bulk_import(&store, &rows).unwrap();
        assert_eq!((second.inserted, second.skipped), (0, 2));

        let members = store.query_members(&MemberFilter::default()).unwrap();
        assert_eq!(members.len(), 2);

        // No fee transactions are created by a members import
        let txs = store.query_transactions(&TransactionFilter::default()).unwrap();
        assert!(txs.is_empty());

        let audit = store.audit_entries_for("members", "batch").unwrap();
        assert_eq!(audit.len(), 2);
    }

    #[test]
    fn test_bulk_import_transactions_is_idempotent() {
        let (_dir, store) = temp_store();
        let members = validate_import(ImportKind::Members, MEMBERS_CSV.as_bytes()).unwrap();
        bulk_import(&store, &members).unwrap();

        let csv = "\
member_email,amount,transaction_type,transaction_date
anna@example.com,795,membership_fee,2024-01-10
ghost@example.com,50,event_fee,2024-02-03
,-120.5,event_fee,2024-02-04
";
        let rows = validate_import(ImportKind::Transactions, csv.as_bytes()).unwrap();

        let summary = bulk_import(&store, &rows).unwrap();
        assert_eq!(summary.inserted, 3);

        let again = bulk_import(&store, &rows).unwrap();
        assert_eq!((again.inserted, again.skipped), (0, 3));

        let txs = store.query_transactions(&TransactionFilter::default()).unwrap();
        assert_eq!(txs.len(), 3);
        let anna = txs.iter().find(|t| t.amount == 795.0).unwrap();
        assert!(anna.member_id.is_some());
        let ghost = txs.iter().find(|t| t.amount == 50.0).unwrap();
        assert_eq!(ghost.member_id, None);
        assert_eq!(ghost.transaction_date, date(2024, 2, 3));
    }

    #[test]
    fn test_bulk_import_events() {
        let (_dir, store) = temp_store();
        let rows = validate_import(ImportKind::Events, template(ImportKind::Events).unwrap().as_bytes()).unwrap();
        let summary = bulk_import(&store, &rows).unwrap();
        assert_eq!(summary.inserted, 1);
    }

    #[test]
    fn test_member_import_keeps_active_flag() {
        let (_dir, store) = temp_store();
        let csv = "\
name,email,country,join_date,membership_type,active
Old Member,old@example.com,Netherlands,2023-01-10,Standard,false
Current Member,current@example.com,Germany,2024-01-10,Premium,1
No Flag,noflag@example.com,Belgium,2024-02-10,Standard,
";
        let rows = validate_import(ImportKind::Members, csv.as_bytes()).unwrap();
        bulk_import(&store, &rows).unwrap();

        let members = store.query_members(&MemberFilter::default()).unwrap();
        let active = |email: &str| members.iter().find(|m| m.email == email).unwrap().active;
        assert!(!active("old@example.com"));
        assert!(active("current@example.com"));
        assert!(active("noflag@example.com"));
        assert_eq!(store.count_active_members().unwrap(), 2);

        // Files without the column import everyone as active
        let rows = validate_import(ImportKind::Members, MEMBERS_CSV.as_bytes()).unwrap();
        let ImportRows::Members(members) = rows else {
            panic!("expected members");
        };
        assert!(members.iter().all(|m| m.active));

        let bad = "name,email,country,join_date,membership_type,active\nA,a@example.com,Netherlands,2024-01-01,Standard,maybe\n";
        let err = validate_import(ImportKind::Members, bad.as_bytes()).unwrap_err();
        assert!(matches!(err, ClubError::InvalidInput { ref field, .. } if field == "active"));
    }

    #[test]
    fn test_identical_rows_in_one_file_are_separate_transactions() {
        let (_dir, store) = temp_store();
        let csv = "\
member_email,amount,transaction_type,transaction_date
,45,event_fee,2024-03-20
,45,event_fee,2024-03-20
";
        let rows = validate_import(ImportKind::Transactions, csv.as_bytes()).unwrap();

        let first = bulk_import(&store, &rows).unwrap();
        assert_eq!((first.inserted, first.skipped), (2, 0));

        let again = bulk_import(&store, &rows).unwrap();
        assert_eq!((again.inserted, again.skipped), (0, 2));

        let txs = store.query_transactions(&TransactionFilter::default()).unwrap();
        assert_eq!(txs.len(), 2);
    }
}
