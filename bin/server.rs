// Club Dashboard - API Server
// JSON endpoints over the same store, forecasters and KPIs as the CLI

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Local, NaiveDate};
use club_dashboard::kpi::{EventMetrics, FinancialKpis, MemberKpis};
use club_dashboard::ml::MlForecaster;
use club_dashboard::{
    config_from_env, db_path_from_env, verify_data_consistency, ClubError, Config, Country,
    KpiAggregator, MemberFilter, ReportPeriod, Scenario, ScenarioForecaster, Store,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Store>,
    config: Arc<Config>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(context: &str, err: ClubError) -> Response {
    let status = match err {
        ClubError::InvalidScenario(_) | ClubError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        ClubError::MemberNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "{} failed", context);
    }
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

fn respond<T: Serialize>(context: &str, result: club_dashboard::Result<T>) -> Response {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => error_response(context, e),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Deserialize)]
struct KpiQuery {
    period: Option<String>,
}

#[derive(Serialize)]
struct KpiResponse {
    members: MemberKpis,
    finance: FinancialKpis,
    events: EventMetrics,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// Run store queries and model training on the blocking pool
async fn blocking<F>(context: &'static str, work: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "{} task failed", context);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()> {
                    success: false,
                    data: None,
                    error: Some(format!("{} failed", context)),
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/overview - Landing page numbers
async fn get_overview(State(state): State<AppState>) -> Response {
    blocking("overview", move || {
        let kpis = KpiAggregator::new(&state.store, &state.config, today());
        respond("overview", kpis.overview())
    })
    .await
}

/// GET /api/members - Members matching the query filter
async fn get_members(State(state): State<AppState>, Query(filter): Query<MemberFilter>) -> Response {
    blocking("members", move || respond("members", state.store.query_members(&filter))).await
}

/// GET /api/members/country/:country - Active members of one country
async fn get_members_by_country(State(state): State<AppState>, Path(country): Path<String>) -> Response {
    // Decode URL-encoded country name
    let decoded = urlencoding::decode(&country)
        .unwrap_or_else(|_| country.clone().into())
        .into_owned();

    blocking("members by country", move || {
        let result = decoded
            .parse::<Country>()
            .and_then(|country| state.store.members_by_country(country));
        respond("members by country", result)
    })
    .await
}

/// GET /api/kpis?period=quarter - Member, financial and event KPIs
async fn get_kpis(State(state): State<AppState>, Query(query): Query<KpiQuery>) -> Response {
    blocking("kpis", move || {
        let result = (|| -> club_dashboard::Result<KpiResponse> {
            let period = match query.period.as_deref() {
                Some(p) => p.parse::<ReportPeriod>()?,
                None => ReportPeriod::AllTime,
            };
            let kpis = KpiAggregator::new(&state.store, &state.config, today());
            Ok(KpiResponse {
                members: kpis.member_kpis(period)?,
                finance: kpis.financial_kpis(period)?,
                events: kpis.event_metrics(period)?,
            })
        })();
        respond("kpis", result)
    })
    .await
}

/// GET /api/forecast/:scenario - 12-month projection with provenance
async fn get_forecast(State(state): State<AppState>, Path(scenario): Path<String>) -> Response {
    blocking("forecast", move || {
        let result = scenario.parse::<Scenario>().and_then(|scenario| {
            let config = state.config.as_ref();
            ScenarioForecaster::new(state.store.as_ref(), config, today()).project(
                &config.into(),
                &config.into(),
                scenario,
            )
        });
        respond("forecast", result)
    })
    .await
}

/// GET /api/ml/growth - Per-country member predictions
async fn get_ml_growth(State(state): State<AppState>) -> Response {
    blocking("ml growth", move || {
        let ml = MlForecaster::new(state.store.as_ref(), &state.config, today());
        ApiResponse::ok(ml.predict_member_growth())
    })
    .await
}

/// GET /api/ml/revenue - Monthly revenue predictions
async fn get_ml_revenue(State(state): State<AppState>) -> Response {
    blocking("ml revenue", move || {
        let ml = MlForecaster::new(state.store.as_ref(), &state.config, today());
        ApiResponse::ok(ml.predict_revenue())
    })
    .await
}

/// GET /api/ml/churn - Churn score per member
async fn get_ml_churn(State(state): State<AppState>) -> Response {
    blocking("ml churn", move || {
        let ml = MlForecaster::new(state.store.as_ref(), &state.config, today());
        ApiResponse::ok(ml.predict_churn())
    })
    .await
}

/// GET /api/consistency - Post-hoc data consistency scan
async fn get_consistency(State(state): State<AppState>) -> Response {
    blocking("consistency", move || {
        respond(
            "consistency",
            verify_data_consistency(&state.store, &state.config, today()),
        )
    })
    .await
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Club Dashboard - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = config_from_env().context("Failed to load configuration")?;
    let db_path = db_path_from_env();

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: club-dashboard init");
        std::process::exit(1);
    }

    let store = Store::open(&db_path, &config);
    info!(path = %db_path.display(), "database configured");

    // Create shared state
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/overview", get(get_overview))
        .route("/members", get(get_members))
        .route("/members/country/:country", get(get_members_by_country))
        .route("/kpis", get(get_kpis))
        .route("/forecast/:scenario", get(get_forecast))
        .route("/ml/growth", get(get_ml_growth))
        .route("/ml/revenue", get(get_ml_revenue))
        .route("/ml/churn", get(get_ml_churn))
        .route("/consistency", get(get_consistency))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = std::env::var("CLUB_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/overview", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocking_returns_handler_response() {
        let response = blocking("health", || ApiResponse::ok("OK")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blocking_maps_panicked_work_to_server_error() {
        let response = blocking("broken", || -> Response { panic!("worker died") }).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_scenario_is_bad_request() {
        let response = blocking("forecast", || {
            respond("forecast", "sideways".parse::<Scenario>())
        })
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
