use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::report::{ReportFamily, ReportRecord, ReportStatus};
use crate::reports::dispatcher::Accepted;
use crate::reports::store::DeletedReport;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub report_id: Uuid,
    pub interview_id: Uuid,
    pub family: ReportFamily,
    pub status: ReportStatus,
}

impl From<Accepted> for SubmitResponse {
    fn from(accepted: Accepted) -> Self {
        let Accepted {
            report_id,
            interview_id,
            family,
            status,
            job,
        } = accepted;
        // Detached: the job keeps running and reports through the store
        drop(job);
        Self {
            report_id,
            interview_id,
            family,
            status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub report_id: Uuid,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Report routes for one family. Mounted under `/api/v1` and `/api/v1/guest`.
pub fn family_routes(family: ReportFamily) -> Router<AppState> {
    Router::new()
        .route(
            "/interviews/:id/report",
            post(handle_submit_report).get(handle_get_report),
        )
        .route("/interviews/:id/report/retry", post(handle_retry_report))
        .route("/reports/:id/status", get(handle_report_status))
        .route("/reports/:id", delete(handle_delete_report))
        .layer(Extension(family))
}

/// POST /api/v1/interviews/:id/report
pub async fn handle_submit_report(
    State(state): State<AppState>,
    Extension(family): Extension<ReportFamily>,
    Path(interview_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let accepted = state.dispatcher.submit(family, interview_id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.into())))
}

/// POST /api/v1/interviews/:id/report/retry
pub async fn handle_retry_report(
    State(state): State<AppState>,
    Extension(family): Extension<ReportFamily>,
    Path(interview_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let accepted = state.dispatcher.resubmit(family, interview_id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.into())))
}

/// GET /api/v1/interviews/:id/report
/// Only a complete report is returned; anything else is a 409 carrying the status.
pub async fn handle_get_report(
    State(state): State<AppState>,
    Extension(family): Extension<ReportFamily>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<ReportRecord>, AppError> {
    let store = state.dispatcher.stores().get(family);
    store
        .load_interview(interview_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {interview_id} not found")))?;

    let report = store
        .load_report_for_interview(interview_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No report found for interview {interview_id}"))
        })?;

    if report.status != ReportStatus::Complete {
        return Err(AppError::Conflict(format!(
            "Report {} is {}",
            report.id, report.status
        )));
    }
    Ok(Json(report))
}

/// GET /api/v1/reports/:id/status
pub async fn handle_report_status(
    State(state): State<AppState>,
    Extension(family): Extension<ReportFamily>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    let report = state
        .dispatcher
        .stores()
        .get(family)
        .load_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))?;

    let error_message = match report.status {
        ReportStatus::Failed | ReportStatus::Waiting => report.error_message,
        _ => None,
    };
    Ok(Json(StatusResponse {
        report_id,
        status: report.status,
        error_message,
    }))
}

/// DELETE /api/v1/reports/:id
pub async fn handle_delete_report(
    State(state): State<AppState>,
    Extension(family): Extension<ReportFamily>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<DeletedReport>, AppError> {
    let deleted = state
        .dispatcher
        .stores()
        .get(family)
        .delete_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))?;

    Ok(Json(deleted))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::reports::analyzer::ReportAnalyzer;
    use crate::reports::dispatcher::ReportDispatcher;
    use crate::reports::memory_store::MemoryReportStore;
    use crate::reports::store::ReportStores;
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::test_support::{MockServer, StubModel};
    use crate::transcript::ElevenLabsClient;

    use super::*;

    const REPLY: &str = r#"{"score": 64, "summary": "Reasonable.", "feedback": "Some gaps.",
        "strengths": ["Clarity"], "weaknesses": ["Testing"], "recommendation": "consider"}"#;

    struct App {
        router: Router,
        regular: Arc<MemoryReportStore>,
        guest: Arc<MemoryReportStore>,
        _provider: MockServer,
    }

    async fn app() -> App {
        let conversation = json!({
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "Walk me through your last project."},
                {"role": "user", "message": "A billing service rewrite."},
                {"role": "agent", "message": "What would you change?"},
                {"role": "user", "message": "Earlier load testing."}
            ]
        });
        let provider = MockServer::builder()
            .with_json("/v1/convai/conversations/conv_done", StatusCode::OK, conversation)
            .with_json(
                "/v1/convai/conversations/conv_busy",
                StatusCode::OK,
                json!({"status": "processing"}),
            )
            .start()
            .await;

        let regular = Arc::new(MemoryReportStore::new());
        let guest = Arc::new(MemoryReportStore::new());
        let source =
            ElevenLabsClient::new(provider.url(), "xi-test", Duration::from_secs(5)).unwrap();
        let dispatcher = ReportDispatcher::new(
            ReportStores::new(regular.clone(), guest.clone()),
            Arc::new(source),
            ReportAnalyzer::new(Arc::new(StubModel::replying(REPLY))),
            Duration::from_secs(900),
        );

        App {
            router: build_router(AppState { dispatcher }),
            regular,
            guest,
            _provider: provider,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Polls the status endpoint until the report leaves `processing`.
    async fn settle(router: &Router, prefix: &str, report_id: &str) -> Value {
        for _ in 0..200 {
            let (_, body) = send(
                router,
                Method::GET,
                &format!("{prefix}/reports/{report_id}/status"),
            )
            .await;
            if body["status"] != "processing" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("report {report_id} never left processing");
    }

    #[tokio::test]
    async fn test_submit_poll_fetch_delete() {
        let app = app().await;
        let interview_id = app.regular.add_interview(Some("done"), Some("Data Engineer"));

        let (status, body) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["family"], "regular");
        let report_id = body["report_id"].as_str().unwrap().to_string();

        let settled = settle(&app.router, "/api/v1", &report_id).await;
        assert_eq!(settled["status"], "complete");
        assert!(settled.get("error_message").is_none());

        let (status, report) = send(
            &app.router,
            Method::GET,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["score"], 64);
        assert_eq!(report["transcript"].as_array().unwrap().len(), 4);
        assert!(report.get("job_id").is_none());

        let (status, deleted) = send(
            &app.router,
            Method::DELETE,
            &format!("/api/v1/reports/{report_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["interview_id"], interview_id.to_string());
        assert_eq!(app.regular.interview(interview_id).unwrap().status, "passed");

        let (status, _) = send(
            &app.router,
            Method::GET,
            &format!("/api/v1/reports/{report_id}/status"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_waiting_report_exposes_reason_and_blocks_fetch() {
        let app = app().await;
        let interview_id = app.regular.add_interview(Some("busy"), None);

        let (_, body) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        let report_id = body["report_id"].as_str().unwrap().to_string();

        let settled = settle(&app.router, "/api/v1", &report_id).await;
        assert_eq!(settled["status"], "waiting");
        assert_eq!(
            settled["error_message"],
            "Conversation is still processing with status: processing"
        );

        let (status, body) = send(
            &app.router,
            Method::GET,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, retried) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{interview_id}/report/retry"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(retried["report_id"], report_id);
    }

    #[tokio::test]
    async fn test_submit_rejections() {
        let app = app().await;
        let no_call = app.regular.add_interview(None, None);

        let (status, body) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{no_call}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{}/report", Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app.router,
            Method::GET,
            &format!("/api/v1/interviews/{no_call}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_guest_routes_use_guest_tables() {
        let app = app().await;
        let interview_id = app.guest.add_interview(Some("done"), None);

        let (status, _) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app.router,
            Method::POST,
            &format!("/api/v1/guest/interviews/{interview_id}/report"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["family"], "guest");
        let report_id = body["report_id"].as_str().unwrap().to_string();

        let settled = settle(&app.router, "/api/v1/guest", &report_id).await;
        assert_eq!(settled["status"], "complete");
        assert_eq!(app.regular.report_count(), 0);
    }
}
