//! Retained split parts, served by work area id and file name.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
};
use folio_workarea::WorkAreaError;
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::http::response::file_response;
use crate::state::ApiState;

pub(crate) async fn download_temp_file(
    State(state): State<Arc<ApiState>>,
    Path((area_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let path = match state.runner.allocator().locate(&area_id, &filename) {
        Ok(path) => path,
        Err(WorkAreaError::InvalidName { field, reason, .. }) => {
            warn!(area_id = %area_id, field, reason, "download rejected");
            return Err(ApiError::forbidden(
                "Forbidden: Attempted directory traversal.",
            ));
        }
        Err(WorkAreaError::Escape { path }) => {
            warn!(area_id = %area_id, path = %path.display(), "download escaped the temp root");
            return Err(ApiError::forbidden(
                "Forbidden: Attempted directory traversal.",
            ));
        }
        Err(WorkAreaError::Storage { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found."));
        }
        Err(err) => {
            error!(area_id = %area_id, error = ?err, "download lookup failed");
            return Err(ApiError::internal("The file could not be read."));
        }
    };
    let media_type = mime_guess::from_path(&path).first_or_octet_stream();
    file_response(&path, &filename, media_type.essence_str(), None).await
}
