// Club Dashboard - Core Library
// Exposes all modules for use in the CLI, the TUI, the API server, and tests

pub mod config;
pub mod consistency;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod kpi;
pub mod ml;
pub mod outcome;
pub mod scenario;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use config::{Config, GrowthTrend, MlConfig};
pub use consistency::{verify_data_consistency, ConsistencyIssue, ConsistencyReport, IssueKind, Severity};
pub use db::{
    setup_database, AuditEntry, ClubData, EventFilter, MemberFilter, Store, TransactionFilter,
};
pub use entities::{
    ClubEvent, Country, Member, MembershipType, NewEvent, NewMember, NewTransaction, PerCountry,
    Transaction, TransactionType,
};
pub use error::{ClubError, Result};
pub use import::{bulk_import, read_import_file, template, validate_import, ImportKind, ImportRows, ImportSummary};
pub use kpi::{
    growth_rate, growth_rate_change, operating_margin, retention_rate, KpiAggregator, ReportPeriod,
};
pub use ml::{MlForecaster, RandomForestRegressor, Regressor};
pub use outcome::{FallbackReason, Outcome};
pub use scenario::{
    calculate_cashflow, calculate_expenses_forecast, calculate_revenue_forecast, ExpenseParams,
    RevenueParams, Scenario, ScenarioForecaster, ScenarioProjection,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database path from `CLUB_DB_PATH`, defaulting to `club.db`
pub fn db_path_from_env() -> std::path::PathBuf {
    std::env::var("CLUB_DB_PATH")
        .unwrap_or_else(|_| "club.db".to_string())
        .into()
}

/// Configuration from the JSON file named by `CLUB_CONFIG`, or the defaults
pub fn config_from_env() -> Result<Config> {
    match std::env::var("CLUB_CONFIG") {
        Ok(path) => Config::from_file(path),
        Err(_) => Ok(Config::default()),
    }
}
