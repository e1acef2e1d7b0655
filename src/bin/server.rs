use axum::{
    Json, Router,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tube_cut::orchestrator::{PlanReport, RunOutcome, SolveConfig, plan_cuts};
use tube_cut::search::BranchAndBound;
use tube_cut::{DemandRecord, Error, table};

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    records: Vec<DemandRecord>,
    #[serde(flatten)]
    config: SolveConfig,
}

type ApiError = (StatusCode, String);

/// Longest search a client may ask for, per material group.
const MAX_TIME_LIMIT: Duration = Duration::from_secs(30);

const OUTCOME_HEADER: &str = "x-tube-cut-outcome";
const WARNINGS_HEADER: &str = "x-tube-cut-warnings";

/// CSV carries no room for skipped groups, so they travel in headers.
fn report_headers(report: &PlanReport) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    let outcome = match report.outcome() {
        RunOutcome::Complete => "complete",
        RunOutcome::Partial => "partial",
        RunOutcome::Empty => "empty",
    };
    headers.insert(OUTCOME_HEADER, HeaderValue::from_static(outcome));

    let warnings: Vec<String> = report.warnings().iter().map(|w| w.to_string()).collect();
    if !warnings.is_empty() {
        let value = HeaderValue::from_str(&warnings.join("; "))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        headers.insert(WARNINGS_HEADER, value);
    }
    Ok(headers)
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::Parse { .. } => StatusCode::BAD_REQUEST,
        Error::EmptyResult { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: Error) -> ApiError {
    (status_for(&err), err.to_string())
}

/// Runs the solver off the async runtime; a group may search for the whole
/// time limit.
async fn solve(records: Vec<DemandRecord>, config: SolveConfig) -> Result<PlanReport, ApiError> {
    let report = tokio::task::spawn_blocking(move || {
        plan_cuts(&records, &BranchAndBound::default(), &config)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(api_error)?;

    for warning in report.warnings() {
        tracing::warn!("{warning}");
    }
    report.ensure_nonempty().map_err(api_error)
}

async fn optimize(Json(req): Json<OptimizeRequest>) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    let report = solve(req.records, req.config.capped(MAX_TIME_LIMIT)).await?;
    let body = serde_json::to_value(report.view())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(body))
}

async fn optimize_csv(body: String) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(bytes = body.len(), "POST /optimize/csv");

    let records = table::read_demand(body.as_bytes()).map_err(api_error)?;
    let report = solve(records, SolveConfig::default()).await?;

    let headers = report_headers(&report)?;
    let mut out = Vec::new();
    table::write_plan(&mut out, report.lines())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((headers, out))
}

#[tokio::main]
async fn main() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .route("/optimize/csv", post(optimize_csv))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tube_cut::orchestrator::{GroupFailure, GroupPlan};
    use tube_cut::search::SearchStatus;
    use tube_cut::types::{CuttingPlanLine, MaterialKey, Measure, PatternEntry};
    use tube_cut::FailureReason;

    fn key(thickness: f64) -> MaterialKey {
        MaterialKey::new(Measure::new(thickness).unwrap(), Measure::new(40.0).unwrap())
    }

    fn planned(thickness: f64) -> GroupPlan {
        GroupPlan {
            key: key(thickness),
            status: SearchStatus::Optimal,
            stock_length: 6000,
            lines: vec![CuttingPlanLine {
                key: key(thickness),
                stock_length: 6000,
                pattern: vec![PatternEntry {
                    count: 3,
                    length: 2000,
                }],
                scrap: 0,
            }],
        }
    }

    #[test]
    fn test_complete_report_has_no_warning_header() {
        let report = PlanReport {
            groups: vec![planned(2.0)],
            failures: vec![],
        };
        let headers = report_headers(&report).unwrap();
        assert_eq!(headers[OUTCOME_HEADER], "complete");
        assert!(headers.get(WARNINGS_HEADER).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    }

    #[test]
    fn test_partial_report_names_skipped_groups() {
        let report = PlanReport {
            groups: vec![planned(2.0)],
            failures: vec![
                GroupFailure {
                    key: key(3.0),
                    status: SearchStatus::NoResult,
                    reason: FailureReason::Timeout,
                },
                GroupFailure {
                    key: key(4.0),
                    status: SearchStatus::Infeasible,
                    reason: FailureReason::Infeasible,
                },
            ],
        };
        let headers = report_headers(&report).unwrap();
        assert_eq!(headers[OUTCOME_HEADER], "partial");
        let warnings = headers[WARNINGS_HEADER].to_str().unwrap();
        assert!(warnings.contains("thickness 3 mm, diameter 40 mm"));
        assert!(warnings.contains("thickness 4 mm, diameter 40 mm"));
    }

    #[test]
    fn test_client_time_limit_is_capped() {
        let req: OptimizeRequest =
            serde_json::from_str(r#"{"records": [], "time_limit_secs": null}"#).unwrap();
        assert_eq!(
            req.config.capped(MAX_TIME_LIMIT).time_limit(),
            Some(MAX_TIME_LIMIT)
        );
    }
}
