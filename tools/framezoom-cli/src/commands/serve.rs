//! HTTP edit endpoint.
//!
//! `POST /edit_video` takes a multipart body with a `video` file and an
//! optional `zoomPoints` JSON keyframe list, and answers with the edited
//! video as an attachment. Failure details go to the log; callers only ever
//! see a fixed message. Browser callers on other origins are admitted per
//! `server.allowed_origins`. A client that disconnects cancels its edit.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use framezoom_common::config::AppConfig;
use framezoom_common::error::FramezoomError;
use framezoom_render_engine::{CancellationFlag, ZoomJob};

const MISSING_VIDEO_MESSAGE: &str = "No video file found";

/// Shared, read-only server state.
#[derive(Debug)]
pub struct ServerState {
    config: AppConfig,
}

/// Why an edit request did not produce a video.
#[derive(Debug)]
pub enum EditError {
    /// The request carried no `video` part.
    MissingVideo,
    /// The multipart body could not be read.
    BadRequest(String),
    /// The edit itself failed.
    Failed(FramezoomError),
}

impl IntoResponse for EditError {
    fn into_response(self) -> Response {
        match self {
            EditError::MissingVideo => {
                (StatusCode::BAD_REQUEST, MISSING_VIDEO_MESSAGE).into_response()
            }
            EditError::BadRequest(detail) => {
                tracing::warn!(detail = %detail, "Rejected malformed upload");
                (StatusCode::BAD_REQUEST, MISSING_VIDEO_MESSAGE).into_response()
            }
            EditError::Failed(err) => {
                tracing::error!(
                    category = err.category(),
                    error = %err,
                    "Error while editing the video"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, err.public_message()).into_response()
            }
        }
    }
}

/// Fields pulled out of the multipart body.
#[derive(Debug, Default)]
pub struct EditRequest {
    pub video: Option<Bytes>,
    pub zoom_points: Option<String>,
}

/// Cancels an in-flight edit if dropped before [`CancelOnDrop::disarm`].
///
/// axum drops the handler future when the client goes away, which is the
/// only signal the blocking job gets.
struct CancelOnDrop {
    cancel: CancellationFlag,
    armed: bool,
}

impl CancelOnDrop {
    fn new(cancel: CancellationFlag) -> Self {
        Self { cancel, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Client disconnected; cancelling edit");
            self.cancel.cancel();
        }
    }
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| anyhow::anyhow!("Invalid allowed origin {o:?}: {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

/// Build the application router.
pub fn router(config: AppConfig) -> anyhow::Result<Router> {
    let limit = config.server.max_upload_bytes;
    let cors = cors_layer(&config.server.allowed_origins)?;
    let state = Arc::new(ServerState { config });
    Ok(Router::new()
        .route("/edit_video", post(edit_video))
        .layer(DefaultBodyLimit::max(limit))
        .layer(cors)
        .with_state(state))
}

pub async fn run(mut config: AppConfig, bind: Option<String>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    config.validate()?;

    let bind = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {bind}: {e}"))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        addr = %addr,
        strategy = config.transform.strategy.as_str(),
        max_upload_bytes = config.server.max_upload_bytes,
        allowed_origins = ?config.server.allowed_origins,
        "Edit server listening"
    );
    println!("Serving POST /edit_video on http://{addr}");

    axum::serve(listener, router(config)?)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down edit server");
        })
        .await?;

    Ok(())
}

async fn edit_video(
    State(state): State<Arc<ServerState>>,
    multipart: Multipart,
) -> Result<Response, EditError> {
    let request = read_request(multipart).await?;
    let container = state.config.encoder.container.clone();
    let config = state.config.clone();

    let cancel = CancellationFlag::new();
    let guard = CancelOnDrop::new(cancel.clone());
    let outcome = tokio::task::spawn_blocking(move || edit(config, request, cancel)).await;
    guard.disarm();

    let edited = outcome.map_err(|e| {
        EditError::Failed(FramezoomError::Other(anyhow::anyhow!("edit task failed: {e}")))
    })??;

    tracing::info!(bytes = edited.len(), "Edited video ready");
    Ok(video_response(&container, edited))
}

async fn read_request(mut multipart: Multipart) -> Result<EditRequest, EditError> {
    let mut request = EditRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| EditError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("video") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| EditError::BadRequest(e.to_string()))?;
                request.video = Some(bytes);
            }
            Some("zoomPoints") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| EditError::BadRequest(e.to_string()))?;
                request.zoom_points = Some(text);
            }
            _ => {}
        }
    }
    Ok(request)
}

/// Run one edit to completion. Blocking; stops early once `cancel` is raised.
pub fn edit(
    config: AppConfig,
    request: EditRequest,
    cancel: CancellationFlag,
) -> Result<Vec<u8>, EditError> {
    let video = request.video.ok_or(EditError::MissingVideo)?;
    let zoom_points = request.zoom_points.as_deref().unwrap_or("[]");

    let job = ZoomJob::from_json(zoom_points, config)
        .map_err(EditError::Failed)?
        .with_cancellation(cancel);
    tracing::info!(
        bytes = video.len(),
        keyframes = job.keyframes().len(),
        "Editing uploaded video"
    );
    job.process_upload(&video).map_err(EditError::Failed)
}

fn video_response(container: &str, body: Vec<u8>) -> Response {
    let mime = match container {
        "webm" => "video/webm",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    };
    let disposition = format!("attachment; filename=\"edited_video.{container}\"");
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
