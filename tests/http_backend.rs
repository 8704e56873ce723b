use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use url::Url;

use wisentia_tracker::api::{ApiError, Backend, HttpBackend, TrackRequest, TRACKING_ID_HEADER};
use wisentia_tracker::auth::TokenGuard;
use wisentia_tracker::clock::SystemClock;
use wisentia_tracker::model::{Timestamp, VideoId};
use wisentia_tracker::reporter::{ProgressUpdate, ReportOutcome, Reporter};
use wisentia_tracker::storage::{MemoryStorage, Storage, ACCESS_TOKEN, REFRESH_TOKEN};

#[derive(Debug, Clone)]
struct Captured {
    video_id: String,
    authorization: Option<String>,
    cache_control: Option<String>,
    pragma: Option<String>,
    expires: Option<String>,
    tracking_header: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Server {
    tracked: Arc<Mutex<Vec<Captured>>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn track(
    State(server): State<Server>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = header(&headers, "authorization");
    server.tracked.lock().unwrap().push(Captured {
        video_id: video_id.clone(),
        authorization: authorization.clone(),
        cache_control: header(&headers, "cache-control"),
        pragma: header(&headers, "pragma"),
        expires: header(&headers, "expires"),
        tracking_header: header(&headers, TRACKING_ID_HEADER),
        body,
    });

    match video_id.as_str() {
        "busy" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "crash" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "broken" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "forbidden" => StatusCode::FORBIDDEN.into_response(),
        _ if authorization.as_deref() != Some("Bearer fresh-token")
            && authorization.as_deref() != Some("Bearer refreshed") =>
        {
            StatusCode::UNAUTHORIZED.into_response()
        }
        _ => Json(json!({ "courseCompletionPercentage": 40.0, "courseCompleted": false }))
            .into_response(),
    }
}

async fn views(Path(video_id): Path<String>) -> Response {
    match video_id.as_str() {
        "seen" => Json(json!({
            "videoView": {
                "WatchedPercentage": 35,
                "IsCompleted": 0,
                "lastPosition": 105.5,
                "ViewDate": "2024-03-01T10:15:00"
            }
        }))
        .into_response(),
        "unseen" => Json(json!({ "videoView": null })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn refresh(Json(body): Json<Value>) -> Response {
    match body["refresh_token"].as_str() {
        Some("valid-refresh") => {
            Json(json!({ "access": "refreshed", "refresh": "rotated-refresh" })).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn serve() -> (HttpBackend, Server) {
    let server = Server::default();
    let app = Router::new()
        .route("/api/courses/videos/:id/track", post(track))
        .route("/api/courses/videos/:id/views", get(views))
        .route("/api/auth/refresh-token", post(refresh))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    let backend = HttpBackend::new(base, Duration::from_secs(5)).unwrap();
    (backend, server)
}

fn request(percentage: u8) -> TrackRequest {
    TrackRequest {
        watched_percentage: percentage,
        is_completed: false,
        last_position: 30.0,
        view_duration: 1000,
        timestamp: Timestamp::from_unix_seconds(1_700_000_000).unwrap(),
        tracking_id: "8f14e45f-ceea-467f-a0e6-1f2f7a3c9d10".to_string(),
    }
}

fn video(id: &str) -> VideoId {
    id.parse().unwrap()
}

/// A token that stays valid long enough that the guard never refreshes it.
fn long_lived_jwt(subject: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let claims = URL_SAFE_NO_PAD.encode(json!({ "sub": subject, "exp": exp }).to_string());
    format!("eyJhbGciOiJIUzI1NiJ9.{claims}.c2ln")
}

#[tokio::test]
async fn track_sends_bearer_and_no_cache_headers() {
    let (backend, server) = serve().await;

    let response = backend
        .track(&video("12"), "fresh-token", &request(42))
        .await
        .unwrap();
    assert_eq!(response.course_completion_percentage, Some(40.0));
    assert_eq!(response.course_completed, Some(false));

    let tracked = server.tracked.lock().unwrap().clone();
    assert_eq!(tracked.len(), 1);
    let call = &tracked[0];
    assert_eq!(call.video_id, "12");
    assert_eq!(call.authorization.as_deref(), Some("Bearer fresh-token"));
    assert_eq!(
        call.cache_control.as_deref(),
        Some("no-cache, no-store, must-revalidate")
    );
    assert_eq!(call.pragma.as_deref(), Some("no-cache"));
    assert_eq!(call.expires.as_deref(), Some("0"));
    assert_eq!(
        call.tracking_header.as_deref(),
        Some("8f14e45f-ceea-467f-a0e6-1f2f7a3c9d10")
    );
    assert_eq!(call.body["watchedPercentage"], 42);
    assert_eq!(call.body["trackingId"], "8f14e45f-ceea-467f-a0e6-1f2f7a3c9d10");
}

#[tokio::test]
async fn track_maps_error_statuses() {
    let (backend, _server) = serve().await;

    let error = backend
        .track(&video("12"), "stale-token", &request(1))
        .await
        .unwrap_err();
    assert!(matches!(error, ApiError::Unauthorized { .. }));

    let error = backend
        .track(&video("busy"), "fresh-token", &request(1))
        .await
        .unwrap_err();
    assert!(error.is_rate_limited());

    let error = backend
        .track(&video("crash"), "fresh-token", &request(1))
        .await
        .unwrap_err();
    assert!(matches!(error, ApiError::Status { status: 500, .. }));
    assert!(error.is_transient());

    let error = backend
        .track(&video("forbidden"), "fresh-token", &request(1))
        .await
        .unwrap_err();
    assert!(matches!(error, ApiError::Status { status: 403, .. }));
    assert!(!error.is_transient());
}

#[tokio::test]
async fn track_reports_unparsable_body() {
    let (backend, _server) = serve().await;

    let error = backend
        .track(&video("broken"), "fresh-token", &request(1))
        .await
        .unwrap_err();
    let ApiError::Parse { body, .. } = error else {
        panic!("expected a parse error, got {error:?}");
    };
    assert_eq!(body, "<html>not json</html>");
}

#[tokio::test]
async fn views_treat_missing_and_null_as_absent() {
    let (backend, _server) = serve().await;

    let view = backend
        .views(&video("seen"), "fresh-token")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.watched_percentage, Some(35.0));
    assert_eq!(view.last_position, Some(105.5));

    assert!(backend
        .views(&video("unseen"), "fresh-token")
        .await
        .unwrap()
        .is_none());
    assert!(backend
        .views(&video("missing"), "fresh-token")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn refresh_returns_rotated_credentials() {
    let (backend, _server) = serve().await;

    let response = backend.refresh("valid-refresh").await.unwrap();
    assert_eq!(response.access, "refreshed");
    assert_eq!(response.refresh.as_deref(), Some("rotated-refresh"));

    let error = backend.refresh("revoked").await.unwrap_err();
    assert!(error.is_unauthorized());
}

#[tokio::test]
async fn reporter_recovers_from_rejected_token() {
    let (backend, server) = serve().await;
    let backend: Arc<dyn Backend> = Arc::new(backend);

    let storage = Arc::new(MemoryStorage::default());
    storage
        .set(ACCESS_TOKEN, long_lived_jwt("revoked-session"))
        .unwrap();
    storage
        .set(REFRESH_TOKEN, "valid-refresh".to_string())
        .unwrap();

    let clock = Arc::new(SystemClock);
    let guard = TokenGuard::new(storage.clone(), backend.clone(), clock.clone());
    let reporter = Reporter::new(backend, guard, clock);

    let update = ProgressUpdate {
        watched_percentage: 20,
        is_completed: false,
        last_position: 60.0,
        view_duration: 60_000,
    };
    let outcome = reporter.report(&video("12"), update).await;
    assert!(matches!(outcome, ReportOutcome::Success(_)), "{outcome}");

    let tracked = server.tracked.lock().unwrap().clone();
    assert_eq!(tracked.len(), 2);
    assert_eq!(tracked[1].authorization.as_deref(), Some("Bearer refreshed"));
    assert_ne!(tracked[0].body["trackingId"], Value::Null);

    assert_eq!(storage.get(ACCESS_TOKEN).as_deref(), Some("refreshed"));
    assert_eq!(storage.get(REFRESH_TOKEN).as_deref(), Some("rotated-refresh"));
}
