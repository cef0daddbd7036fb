// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::env;
use tracing_subscriber::EnvFilter;

use club_dashboard::ml::MlForecaster;
use club_dashboard::{
    bulk_import, config_from_env, db_path_from_env, read_import_file, template,
    verify_data_consistency, Config, ImportKind, KpiAggregator, ReportPeriod, Scenario,
    ScenarioForecaster, Store,
};

fn main() -> Result<()> {
    // Logs go to stderr so they never mix with command output or the TUI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = config_from_env().context("Failed to load configuration")?;
    let store = Store::open(db_path_from_env(), &config);
    let today = Local::now().date_naive();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&store),
        Some("import") => run_import(&store, &args[2..]),
        Some("template") => run_template(&args[2..]),
        Some("forecast") => run_forecast(&store, &config, today, args.get(2)),
        Some("kpi") => run_kpi(&store, &config, today, args.get(2)),
        Some("check") => run_check(&store, &config, today),
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command '{}'", other)
        }
        // UI mode (default)
        None => run_ui_mode(&store, &config, today),
    }
}

fn print_usage() {
    println!("Usage: club-dashboard [command]");
    println!();
    println!("  init                         create the database schema");
    println!("  import <kind> <file.csv>     bulk import members | transactions | events");
    println!("  template <kind>              print a CSV template");
    println!("  forecast [scenario]          12-month projection (default: all scenarios)");
    println!("  kpi [period]                 month | quarter | year | all (default: all)");
    println!("  check                        data consistency scan");
    println!("  (no command)                 terminal dashboard");
    println!();
    println!("Environment: CLUB_DB_PATH (default club.db), CLUB_CONFIG (JSON file), RUST_LOG");
}

fn run_init(store: &Store) -> Result<()> {
    println!("🗄️  Initializing database at {}", store.path().display());
    store.init().context("Failed to initialize database")?;
    println!("✓ Schema ready (WAL mode)");
    Ok(())
}

fn run_import(store: &Store, args: &[String]) -> Result<()> {
    let (Some(kind), Some(file)) = (args.first(), args.get(1)) else {
        bail!("usage: club-dashboard import <members|transactions|events> <file.csv>");
    };
    let kind: ImportKind = kind.parse()?;

    println!("📂 Validating {} from {}...", kind, file);
    let rows = read_import_file(kind, file).with_context(|| format!("Failed to read {}", file))?;
    println!("✓ {} valid rows", rows.len());

    println!("💾 Importing...");
    let summary = bulk_import(store, &rows).context("Import failed, no rows were written")?;
    println!("✓ Inserted: {}", summary.inserted);
    println!("✓ Skipped (duplicates): {}", summary.skipped);
    Ok(())
}

fn run_template(args: &[String]) -> Result<()> {
    let Some(kind) = args.first() else {
        bail!("usage: club-dashboard template <members|transactions|events>");
    };
    print!("{}", template(kind.parse()?)?);
    Ok(())
}

fn run_forecast(store: &Store, config: &Config, today: NaiveDate, scenario: Option<&String>) -> Result<()> {
    let scenarios = match scenario {
        Some(name) => vec![name.parse::<Scenario>()?],
        None => Scenario::ALL.to_vec(),
    };
    let forecaster = ScenarioForecaster::new(store, config, today);

    for scenario in scenarios {
        let outcome = forecaster.project(&config.into(), &config.into(), scenario)?;
        println!("\n📈 {} [{}]", scenario.as_str().to_uppercase(), outcome.label());
        if let Some(reason) = outcome.reason() {
            println!("   ⚠ {}", reason);
        }
        let Some(projection) = outcome.value() else {
            continue;
        };

        println!(
            "   {:<8} {:>8} {:>8} {:>8} {:>10} {:>12} {:>12} {:>14}",
            "Month", "NL", "BE", "DE", "Members", "Revenue", "Net", "Cumulative"
        );
        for (rev, cash) in projection.revenue.iter().zip(&projection.cashflow) {
            println!(
                "   {:<8} {:>8.1} {:>8.1} {:>8.1} {:>10.1} {:>12.2} {:>12.2} {:>14.2}",
                rev.period.format("%Y-%m"),
                rev.members.netherlands,
                rev.members.belgium,
                rev.members.germany,
                rev.total_members,
                rev.total_revenue,
                cash.net_cashflow,
                cash.cumulative_cashflow
            );
        }
        println!("   Annual expenses: {:.2}", projection.expenses.total());
        for alert in projection.alerts() {
            println!("   ⚠ {}", alert);
        }
    }

    let ml = MlForecaster::new(store, config, today);
    let revenue = ml.predict_revenue();
    println!("\n🤖 ML revenue outlook [{}]", revenue.label());
    if let Some(prediction) = revenue.value() {
        for (date, value) in prediction.dates.iter().zip(&prediction.values) {
            println!("   {}  {:>12.2}", date, value);
        }
    }

    Ok(())
}

fn run_kpi(store: &Store, config: &Config, today: NaiveDate, period: Option<&String>) -> Result<()> {
    let period = match period {
        Some(p) => p.parse::<ReportPeriod>()?,
        None => ReportPeriod::AllTime,
    };
    let kpis = KpiAggregator::new(store, config, today);

    let members = kpis.member_kpis(period)?;
    println!("📊 KPIs ({})", period);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Members:        {} active / {} total", members.active_members, members.total_members);
    println!("Retention:      {:.1}%", members.retention_rate);
    println!("New members:    {}", members.new_members);
    println!("Growth:         {:.1}% ({:+.1}% change)", members.growth_rate, members.growth_rate_change);

    let finance = kpis.financial_kpis(period)?;
    println!("Revenue:        {:.2}", finance.revenue);
    println!("Expenses:       {:.2}", finance.expenses);
    println!("Op. margin:     {:.1}%", finance.operating_margin);
    if let Some(per_member) = finance.revenue_per_member {
        println!("Rev/member:     {:.2}", per_member);
    }

    let events = kpis.event_metrics(period)?;
    println!("Events:         {} (profit {:.2}, avg attendance {:.1})",
        events.events.len(), events.total_profit, events.average_attendance);
    Ok(())
}

fn run_check(store: &Store, config: &Config, today: NaiveDate) -> Result<()> {
    println!("🔍 Checking data consistency...");
    let report = verify_data_consistency(store, config, today)?;
    for issue in &report.issues {
        println!("  [{:?}] {} #{}: {}", issue.severity, issue.entity_type, issue.entity_id, issue.message);
    }
    println!("{}", report.summary());
    if report.is_consistent() {
        println!("✅ No issues found");
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &Store, config: &Config, today: NaiveDate) -> Result<()> {
    if !store.path().exists() {
        eprintln!("❌ Database not found at {}", store.path().display());
        eprintln!("   Run: club-dashboard init");
        std::process::exit(1);
    }

    println!("📊 Loading dashboard...");
    let snapshot = ui::Snapshot::load(store, config, today);
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(snapshot);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &Store, _config: &Config, _today: NaiveDate) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin club-server --features server");
    std::process::exit(1);
}
