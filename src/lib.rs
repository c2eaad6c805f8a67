pub mod config;
pub mod conversion;
pub mod fit;
pub mod gpx;
pub mod output;
pub mod templates;

use axum::{
    Router,
    extract::{Multipart, Path, State, multipart::Field},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use config::{ConversionOptions, Sport, SubSport};
use conversion::{ConvertError, convert_gpx_bytes};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use templates::{render_converted_activity, render_landing_page};
use uuid::Uuid;

/// Converted FIT files waiting to be downloaded, keyed by upload id.
///
/// Download links are one-shot: fetching a file removes it from the map.
#[derive(Clone, Default)]
pub struct AppState {
    downloads: Arc<Mutex<HashMap<Uuid, Vec<u8>>>>,
}

impl AppState {
    fn store(&self, bytes: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, bytes);
        id
    }

    fn take(&self, id: &Uuid) -> Option<Vec<u8>> {
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
    }
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("{0}")]
    BadRequest(String),
    #[error("No converted activity with id {0}")]
    NotFound(Uuid),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Convert(ConvertError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Convert(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        tracing::warn!(%status, error = %self, "request rejected");
        (status, self.to_string()).into_response()
    }
}

pub fn build_app() -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/upload", post(handle_upload))
        .route("/download/:id", get(handle_download))
        .with_state(AppState::default())
}

async fn landing_page() -> Html<String> {
    Html(render_landing_page())
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let mut uploaded: Option<Vec<u8>> = None;
    let mut options = ConversionOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Invalid multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::BadRequest(format!("Failed to read uploaded file: {err}"))
                })?;
                uploaded = Some(bytes.to_vec());
            }
            Some("sport") => {
                options.sport = field_text(field)
                    .await?
                    .parse::<Sport>()
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
            }
            Some("sub_sport") => {
                options.sub_sport = field_text(field)
                    .await?
                    .parse::<SubSport>()
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
            }
            _ => {}
        }
    }

    let file_bytes =
        uploaded.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let converted = convert_gpx_bytes(&file_bytes, &options)?;
    let id = state.store(converted.fit_bytes.clone());

    Ok(Html(render_converted_activity(
        &converted,
        &format!("/download/{id}"),
    )))
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|err| AppError::BadRequest(format!("Failed to read field '{name}': {err}")))
}

async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest(format!("'{id}' is not a valid download id")))?;
    let bytes = state.take(&id).ok_or(AppError::NotFound(id))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/vnd.ant.fit"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"activity.fit\"",
            ),
        ],
        bytes,
    ))
}
