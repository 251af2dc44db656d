//! Streaming file responses.
//!
//! The body reads the file in fixed-size chunks. When a [`CleanupGuard`] is
//! attached it lives inside the body stream, so the work area is torn down only
//! once the transport has finished with the body or dropped it.

use std::io;
use std::path::Path;

use async_stream::try_stream;
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use folio_jobs::{CleanupGuard, JobOutcome};
use futures_util::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::error;

use crate::http::constants::{HEADER_SKIPPED_ITEMS, STREAM_CHUNK_BYTES};
use crate::http::errors::ApiError;
use crate::models::encode_segment;

/// Stream a job's result and hand its cleanup guard to the body.
pub(crate) async fn outcome_response(outcome: JobOutcome) -> Result<Response, ApiError> {
    let path = outcome.path().to_path_buf();
    let download_name = outcome.download_name().to_string();
    let media_type = outcome.media_type().to_string();
    let skipped = outcome.skipped();
    let guard = outcome.into_guard();
    let mut response = file_response(&path, &download_name, &media_type, Some(guard)).await?;
    if skipped > 0 {
        response
            .headers_mut()
            .insert(HEADER_SKIPPED_ITEMS, HeaderValue::from(skipped));
    }
    Ok(response)
}

/// Stream `path` as an attachment named `download_name`.
pub(crate) async fn file_response(
    path: &Path,
    download_name: &str,
    media_type: &str,
    guard: Option<CleanupGuard>,
) -> Result<Response, ApiError> {
    let file = File::open(path).await.map_err(|err| {
        error!(file = download_name, error = %err, "result file unreadable");
        ApiError::internal("The result file could not be read.")
    })?;
    let length = file
        .metadata()
        .await
        .map_err(|err| {
            error!(file = download_name, error = %err, "result file metadata unreadable");
            ApiError::internal("The result file could not be read.")
        })?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, content_disposition(download_name))
        .body(Body::from_stream(chunks(file, guard)))
        .map_err(|err| {
            error!(error = %err, "failed to build file response");
            ApiError::internal("failed to build file response")
        })
}

fn chunks(mut file: File, guard: Option<CleanupGuard>) -> impl Stream<Item = io::Result<Bytes>> {
    try_stream! {
        let _guard = guard;
        let mut buffer = vec![0_u8; STREAM_CHUNK_BYTES];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buffer[..read]);
        }
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name for anything else.
pub(crate) fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|ch| {
            if ch == ' ' || (ch.is_ascii_graphic() && ch != '"' && ch != '\\') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if fallback == name {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            encode_segment(name)
        )
    }
}
