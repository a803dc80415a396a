//! Remote-control REST API.
//!
//! Handlers never touch playback themselves: each command travels to the
//! coordinator with a oneshot reply channel, and the handler answers with
//! whatever the coordinator decided.  Read-only routes go straight to the
//! state store.
use std::any::Any;
use std::sync::Arc;

use alarm_proto::config::ApiConfig;
use alarm_proto::protocol::{ErrorMessage, PlaylistId, VolumeStatus, WebradioId};
use alarm_proto::state::{Alarm, StateStore};
use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::event::{ApiCommand, ApiRequest};
use crate::task::TaskHandle;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct HttpState {
    api_key: Arc<str>,
    state: Arc<StateStore>,
    api_tx: mpsc::Sender<ApiRequest>,
}

impl HttpState {
    pub fn new(api_key: &str, state: Arc<StateStore>, api_tx: mpsc::Sender<ApiRequest>) -> Self {
        Self {
            api_key: Arc::from(api_key),
            state,
            api_tx,
        }
    }
}

/// Every answer, error or not, is an `ErrorMessage` body.
struct ApiReply {
    status: StatusCode,
    message: String,
}

impl ApiReply {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn status(status: StatusCode) -> Self {
        Self::new(status, "")
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        let body = ErrorMessage::new(self.status.as_u16(), self.message);
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: HttpState) -> Router {
    let api = Router::new()
        .route("/is_alive", get(is_alive).fallback(method_not_allowed))
        .route(
            "/webradio/play/:group_id/:index_id",
            post(play_webradio).fallback(method_not_allowed),
        )
        .route(
            "/playlist/play/:playlist_id",
            post(play_playlist).fallback(method_not_allowed),
        )
        .route(
            "/audio/volume/:volume",
            post(set_volume).fallback(method_not_allowed),
        )
        .route("/audio/volume", get(get_volume).fallback(method_not_allowed))
        .route("/alarm", get(get_alarm).fallback(method_not_allowed))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .with_state(state)
}

/// Panic recovery and CORS around the router.
pub fn with_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
}

/// Binds the listener, then serves until the task is stopped.
pub async fn spawn(
    config: &ApiConfig,
    state: Arc<StateStore>,
    api_tx: mpsc::Sender<ApiRequest>,
) -> anyhow::Result<TaskHandle> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("unable to bind HTTP API to {}: {}", addr, e))?;
    info!("HTTP API listening on http://{}", addr);

    let app = with_layers(router(HttpState::new(&config.api_key, state, api_tx)));
    Ok(TaskHandle::spawn("http api", move |token| async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = served {
            error!("HTTP server error: {}", e);
        }
    }))
}

async fn require_api_key(State(state): State<HttpState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(&*state.api_key) {
        warn!("Rejected {} {}: bad api key", request.method(), request.uri());
        return ApiReply::status(StatusCode::FORBIDDEN).into_response();
    }
    next.run(request).await
}

async fn is_alive() -> ApiReply {
    ApiReply::status(StatusCode::OK)
}

async fn play_webradio(
    State(state): State<HttpState>,
    path: Result<Path<(u32, u32)>, PathRejection>,
) -> ApiReply {
    match path {
        Ok(Path((group_id, index_id))) => {
            let id = WebradioId::new(group_id, index_id);
            info!("HTTP API: play webradio {}", id);
            send_command(&state, ApiCommand::PlayWebradio(id)).await
        }
        Err(rejection) => ApiReply::new(StatusCode::BAD_REQUEST, rejection.body_text()),
    }
}

async fn play_playlist(
    State(state): State<HttpState>,
    path: Result<Path<u32>, PathRejection>,
) -> ApiReply {
    match path {
        Ok(Path(playlist_id)) => {
            info!("HTTP API: play playlist {}", playlist_id);
            send_command(&state, ApiCommand::PlayPlaylist(PlaylistId(playlist_id))).await
        }
        Err(rejection) => ApiReply::new(StatusCode::BAD_REQUEST, rejection.body_text()),
    }
}

async fn set_volume(
    State(state): State<HttpState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiReply {
    match path {
        Ok(Path(volume)) => {
            info!("HTTP API: set volume {}", volume);
            send_command(&state, ApiCommand::SetVolume(volume)).await
        }
        Err(rejection) => ApiReply::new(StatusCode::BAD_REQUEST, rejection.body_text()),
    }
}

async fn get_volume(State(state): State<HttpState>) -> Json<VolumeStatus> {
    Json(VolumeStatus {
        volume: state.state.volume().await,
    })
}

async fn get_alarm(State(state): State<HttpState>) -> Json<Alarm> {
    Json(state.state.alarm().await)
}

async fn not_found() -> ApiReply {
    ApiReply::status(StatusCode::NOT_FOUND)
}

async fn method_not_allowed() -> ApiReply {
    ApiReply::status(StatusCode::METHOD_NOT_ALLOWED)
}

async fn send_command(state: &HttpState, command: ApiCommand) -> ApiReply {
    let (reply, rx) = oneshot::channel();
    if state.api_tx.send(ApiRequest { command, reply }).await.is_err() {
        return ApiReply::status(StatusCode::SERVICE_UNAVAILABLE);
    }
    match rx.await {
        Ok(Ok(())) => ApiReply::status(StatusCode::OK),
        Ok(Err(e)) => ApiReply::new(StatusCode::FORBIDDEN, e.to_string()),
        Err(_) => ApiReply::status(StatusCode::SERVICE_UNAVAILABLE),
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };
    error!("HTTP handler panicked: {}", message);
    ApiReply::new(StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlaybackError;
    use axum::body::Body;
    use axum::http::{Method, Request as HttpRequest};
    use tower::ServiceExt;

    const KEY: &str = "secret";

    /// Stands in for the coordinator: group 1 exists, everything else fails.
    fn fake_coordinator(mut rx: mpsc::Receiver<ApiRequest>) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let result = match request.command {
                    ApiCommand::PlayWebradio(id) if id.group_id == 1 => Ok(()),
                    ApiCommand::PlayWebradio(id) => Err(PlaybackError::UnknownGroup(id.group_id)),
                    ApiCommand::PlayPlaylist(id) => Err(PlaybackError::EmptyPlaylist(id)),
                    ApiCommand::SetVolume(_) => Ok(()),
                };
                let _ = request.reply.send(result);
            }
        });
    }

    fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = StateStore::new(dir.path().join("state.json")).unwrap();
        let (tx, rx) = mpsc::channel(4);
        fake_coordinator(rx);
        (with_layers(router(HttpState::new(KEY, state, tx))), dir)
    }

    fn request(method: Method, uri: &str, key: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn call(app: Router, req: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_is_alive() {
        let (app, _dir) = app();
        let (status, body) = call(app, request(Method::GET, "/api/is_alive", Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["message"], "Ok");
    }

    #[tokio::test]
    async fn test_missing_or_wrong_key_is_forbidden() {
        let (app, _dir) = app();
        let (status, _) = call(app.clone(), request(Method::GET, "/api/is_alive", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) =
            call(app, request(Method::POST, "/api/webradio/play/1/1", Some("nope"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden");
    }

    #[tokio::test]
    async fn test_play_webradio() {
        let (app, _dir) = app();
        let (status, _) =
            call(app.clone(), request(Method::POST, "/api/webradio/play/1/2", Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(app, request(Method::POST, "/api/webradio/play/7/1", Some(KEY))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "unknown webradio group 7");
    }

    #[tokio::test]
    async fn test_malformed_params_are_bad_requests() {
        let (app, _dir) = app();
        for uri in ["/api/webradio/play/one/2", "/api/playlist/play/-1", "/api/audio/volume/loud"] {
            let (status, body) = call(app.clone(), request(Method::POST, uri, Some(KEY))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["status_code"], 400);
        }
    }

    #[tokio::test]
    async fn test_playlist_failure_carries_message() {
        let (app, _dir) = app();
        let (status, body) =
            call(app, request(Method::POST, "/api/playlist/play/3", Some(KEY))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "playlist 3 has no tracks");
    }

    #[tokio::test]
    async fn test_volume_and_alarm_reads() {
        let (app, _dir) = app();
        let (status, _) =
            call(app.clone(), request(Method::POST, "/api/audio/volume/-20", Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app.clone(), request(Method::GET, "/api/audio/volume", Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["volume"], 40);

        let (_, body) = call(app, request(Method::GET, "/api/alarm", Some(KEY))).await;
        assert_eq!(body["hour"], 8);
        assert_eq!(body["enabled"], false);
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let (app, _dir) = app();
        let (status, body) = call(app.clone(), request(Method::GET, "/nowhere", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Page not found");

        let (status, body) =
            call(app, request(Method::GET, "/api/webradio/play/1/1", Some(KEY))).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["status_code"], 405);
    }

    #[tokio::test]
    async fn test_coordinator_gone_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateStore::new(dir.path().join("state.json")).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let app = router(HttpState::new(KEY, state, tx));
        let (status, body) =
            call(app, request(Method::POST, "/api/audio/volume/10", Some(KEY))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Service unavailable");
    }

    async fn boom() -> StatusCode {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let app = with_layers(
            Router::new().route("/boom", get(boom)),
        );
        let (status, body) = call(app, request(Method::GET, "/boom", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "handler exploded");
    }
}
