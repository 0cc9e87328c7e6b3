//! Axum-based read-only dashboard for the wager agent.
//!
//! Provides:
//!   GET /                 → HTML job list (auto-refresh 10s)
//!   GET /status           → JSON liveness + job count
//!   GET /jobs             → JSON list of job details with live prices
//!   GET /jobs/:token_id   → JSON detail of the job a token participates in

use crate::registry::{DetailError, JobDetail, JobRegistry};
use crate::scheduler::SettlementScheduler;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the dashboard routes.
#[derive(Clone)]
pub struct DashboardState {
    pub registry: JobRegistry,
    pub scheduler: SettlementScheduler,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    jobs: usize,
    pending_timers: usize,
}

#[derive(Debug, Serialize)]
struct JobsBody {
    jobs: Vec<JobDetail>,
}

/// Build the Axum router. Every route is read-only, so any origin may call it.
pub fn build_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(dashboard_html))
        .route("/status", get(api_status))
        .route("/jobs", get(api_jobs))
        .route("/jobs/:token_id", get(api_job))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the dashboard server.
pub async fn serve(state: DashboardState, bind_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// --- API Handlers ---

async fn api_status(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(StatusBody {
        status: "ok",
        jobs: state.registry.len(),
        pending_timers: state.scheduler.pending(),
    })
}

async fn api_jobs(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(JobsBody {
        jobs: state.registry.list().await,
    })
}

async fn api_job(
    State(state): State<DashboardState>,
    Path(token_id): Path<u64>,
) -> impl IntoResponse {
    match state.registry.detail(token_id).await {
        Ok(Some(detail)) => Json(detail).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("no job for token {token_id}")})),
        )
            .into_response(),
        Err(e @ DetailError::Price(_)) => {
            warn!(token_id, error = %e, "job detail unavailable");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

// --- HTML Dashboard ---

async fn dashboard_html(State(state): State<DashboardState>) -> Html<String> {
    let jobs = state.registry.list().await;

    let job_rows: String = if jobs.is_empty() {
        "<tr><td colspan=\"6\" style=\"text-align:center;color:#666\">No open wagers</td></tr>"
            .to_string()
    } else {
        jobs.iter()
            .map(|j| {
                let leader = j
                    .current_winner
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let token_id = j.wagers[0].token.token_id;
                format!(
                    "<tr><td><a href=\"/jobs/{}\">{} vs {}</a></td><td>{}</td><td>{} → {} ({:+.2}%)</td><td>{} → {} ({:+.2}%)</td><td class=\"leader\">{}</td><td>{}</td></tr>",
                    token_id,
                    j.wagers[0].token,
                    j.wagers[1].token,
                    j.amount,
                    j.prev_prices[0].price,
                    j.current_prices[0].price,
                    j.change[0].change * rust_decimal::Decimal::ONE_HUNDRED,
                    j.prev_prices[1].price,
                    j.current_prices[1].price,
                    j.change[1].change * rust_decimal::Decimal::ONE_HUNDRED,
                    leader,
                    j.expires_at.format("%Y-%m-%d %H:%M:%S"),
                )
            })
            .collect()
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="10">
<title>Wager Agent</title>
<style>
body {{ font-family: monospace; background: #0d1117; color: #c9d1d9; margin: 2em; }}
h1 {{ color: #58a6ff; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border-bottom: 1px solid #30363d; padding: 6px 10px; text-align: left; }}
th {{ color: #8b949e; }}
a {{ color: #58a6ff; }}
.leader {{ color: #3fb950; }}
.auto {{ color: #666; margin-top: 1em; }}
</style>
</head>
<body>
<h1>Wager Agent</h1>
<p>{job_count} open wagers | {pending} pending settlements</p>
<table>
<tr><th>Duel</th><th>Wager</th><th>Leg A</th><th>Leg B</th><th>Leading</th><th>Expires (UTC)</th></tr>
{job_rows}
</table>
<div class="auto">Auto-refresh 10s | API: /status, /jobs, /jobs/:token_id</div>
</body>
</html>"#,
        job_count = jobs.len(),
        pending = state.scheduler.pending(),
        job_rows = job_rows,
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{job, FakePrices, RecordingSettler};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(prices: Arc<FakePrices>) -> (Router, JobRegistry) {
        let registry = JobRegistry::new(prices);
        let scheduler = SettlementScheduler::new(RecordingSettler::new(), Duration::from_secs(12));
        let router = build_router(DashboardState {
            registry: registry.clone(),
            scheduler,
        });
        (router, registry)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_reports_job_count() {
        let (router, registry) = app(FakePrices::new(&[]));
        registry.insert(job(5, 9, dec!(10), dec!(20)));

        let (status, body) = get_json(router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["jobs"], 1);
    }

    #[tokio::test]
    async fn test_job_detail() {
        let (router, registry) = app(FakePrices::new(&[("ATOM", dec!(11)), ("OSMO", dec!(19))]));
        registry.insert(job(5, 9, dec!(10), dec!(20)));

        let (status, body) = get_json(router, "/jobs/9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_winner"]["token_id"], 5);
        assert_eq!(body["prev_prices"][0]["denom"], "ATOM");
        assert_eq!(body["wagers"][1]["currency"], "osmo");
    }

    #[tokio::test]
    async fn test_cross_origin_requests_are_allowed() {
        let (router, _registry) = app(FakePrices::new(&[]));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .header("origin", "https://duel.example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_unknown_token_is_404() {
        let (router, _registry) = app(FakePrices::new(&[]));
        let (status, _) = get_json(router, "/jobs/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_price_failure_is_502() {
        let (router, registry) = app(FakePrices::new(&[("ATOM", dec!(11))]));
        registry.insert(job(5, 9, dec!(10), dec!(20)));

        let (status, body) = get_json(router, "/jobs/5").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("OSMO"));
    }

    #[tokio::test]
    async fn test_jobs_list_and_index() {
        let (router, registry) = app(FakePrices::new(&[("ATOM", dec!(10)), ("OSMO", dec!(20))]));
        registry.insert(job(5, 9, dec!(10), dec!(20)));

        let (status, body) = get_json(router.clone(), "/jobs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

        let resp = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("#5 vs #9"));
    }
}
