use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use vidqueue_core::core::events::{JobEvent, JobPhase};
use vidqueue_core::models::job::render_job_listing;

use crate::core::url_parser;
use crate::AppState;

const MISSING_REFERENCE_BODY: &str = "Hello world!\n";

#[derive(Debug, Default, Deserialize)]
pub struct EnqueueParams {
    pub v: Option<String>,
    pub q: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(enqueue_download))
        .with_state(state)
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn enqueue_download(
    State(state): State<AppState>,
    Query(params): Query<EnqueueParams>,
) -> Response {
    let reference = match params.v.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return plain_text(StatusCode::BAD_REQUEST, MISSING_REFERENCE_BODY.to_string()),
    };

    let id = match url_parser::extract_video_id(reference) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("rejected reference {:?}: {}", reference, e);
            return plain_text(StatusCode::BAD_REQUEST, format!("{}\n", e));
        }
    };

    let quality = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => state.default_quality.clone(),
    };

    let listing = state.queue.enqueue(id.clone(), quality.clone()).await;
    state.events.emit_job_event(&JobEvent {
        id,
        quality,
        phase: JobPhase::Queued,
    });

    plain_text(StatusCode::OK, render_job_listing(&listing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::core::events::LogEmitter;
    use crate::core::queue::JobQueue;

    fn state() -> AppState {
        AppState {
            queue: Arc::new(JobQueue::new()),
            events: Arc::new(LogEmitter),
            default_quality: "hd720".into(),
        }
    }

    async fn get_text(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_reference_is_rejected() {
        let (status, body) = get_text(state(), "/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Hello world!\n");

        let (status, _) = get_text(state(), "/?v=&q=1080").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_submission_lists_queue() {
        let state = state();
        let (status, body) = get_text(state.clone(), "/?v=dQw4w9WgXcQ&q=1080").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "Download videos list: \nvideo id: dQw4w9WgXcQ, video quality: 1080\n"
        );
        assert_eq!(state.queue.len().await, 1);
    }

    #[tokio::test]
    async fn empty_quality_uses_default() {
        let (_, body) = get_text(state(), "/?v=dQw4w9WgXcQ").await;
        assert!(body.contains("video quality: hd720"));
    }

    #[tokio::test]
    async fn url_and_bare_id_share_one_entry() {
        let state = state();
        get_text(
            state.clone(),
            "/?v=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ&q=hd720",
        )
        .await;
        let (_, body) = get_text(state.clone(), "/?v=https://youtu.be/dQw4w9WgXcQ&q=1080").await;
        assert_eq!(
            body,
            "Download videos list: \nvideo id: dQw4w9WgXcQ, video quality: 1080\n"
        );
        assert_eq!(state.queue.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_reference_enqueues_nothing() {
        let state = state();
        let (status, body) = get_text(state.clone(), "/?v=vimeo.com%2F12345").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.is_empty());
        assert!(state.queue.is_empty().await);
    }
}
