//! HTTP surface: a single `POST /upload` endpoint.
//!
//! The handler only turns the multipart body into an
//! [`UploadForm`](crate::pipeline::input::UploadForm) and the outcome into
//! JSON; everything else happens in [`PageCountService`]. Every failure is
//! answered with one of the fixed `{"error": …}` shapes of
//! [`UploadError`], including bodies that are not multipart at all.
//!
//! Cross-origin requests are allowed from any origin; there is no
//! authentication.

use crate::config::ServiceConfig;
use crate::convert::PageCountService;
use crate::error::{ServiceError, UploadError};
use crate::output::UploadResult;
use crate::pipeline::input::{self, FilePart, UploadForm};
use crate::pipeline::office;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Build the application router.
///
/// Useful for both the real server and in-process tests.
pub fn router(service: Arc<PageCountService>, config: &ServiceConfig) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Open the working directory, probe the converter and serve until Ctrl-C.
pub async fn serve(config: ServiceConfig, addr: SocketAddr) -> Result<(), ServiceError> {
    let service = Arc::new(PageCountService::new(&config)?);
    info!("Working directory: {}", service.workspace().root().display());

    let program = service.converter().office().program();
    match office::probe(program).await {
        Some(version) if !version.is_empty() => info!("Office converter: {}", version),
        Some(_) => info!("Office converter: {}", program),
        None => warn!(
            "Office converter '{}' unavailable; .doc/.docx uploads will fail",
            program
        ),
    }

    let app = router(service, &config);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceError::Bind { addr, source })?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServiceError::Server)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// `POST /upload`: multipart fields `file` and `printer`.
async fn upload(
    State(service): State<Arc<PageCountService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResult>, UploadError> {
    let multipart = multipart.map_err(|e| {
        debug!("Rejected upload body: {}", e);
        UploadError::MissingField
    })?;

    let form = read_form(multipart).await?;
    let request = input::validate(form).inspect_err(|e| debug!("Invalid upload: {}", e))?;
    let result = service.count_upload(request).await?;
    Ok(Json(result))
}

/// Collect the fields we care about; unknown fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                // A part without a filename is a plain form value, not a file.
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(field_error)?;
                if let Some(file_name) = file_name {
                    form.file = Some(FilePart { file_name, bytes });
                }
            }
            "printer" => {
                form.printer = Some(field.text().await.map_err(field_error)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

fn field_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        debug!("Malformed multipart body: {}", e);
        UploadError::MissingField
    }
}
