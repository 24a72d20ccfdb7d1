//! Streaming response for resolved artifacts.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::services::resolution_service::ResolvedArtifact;

/// Response header naming the repository that served the file, e.g.
/// `storage0:releases` for a file found through a group.
pub const X_SERVED_BY: HeaderName = HeaderName::from_static("x-served-by");

pub struct DownloadResponse {
    file: fs::File,
    size: u64,
    content_type: &'static str,
    served_by: String,
}

impl DownloadResponse {
    pub async fn open(artifact: &ResolvedArtifact) -> Result<Self> {
        let file = fs::File::open(&artifact.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // Trashed or purged between resolution and open
                AppError::NotFound(format!("{} is no longer available", artifact.path.display()))
            } else {
                AppError::Io(e)
            }
        })?;
        let size = file.metadata().await?.len();
        let name = artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        Ok(Self {
            file,
            size,
            content_type: content_type_for(name),
            served_by: artifact.repository.to_string(),
        })
    }
}

impl IntoResponse for DownloadResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (CONTENT_TYPE, self.content_type.to_string()),
                (CONTENT_LENGTH, self.size.to_string()),
                (X_SERVED_BY, self.served_by),
            ],
            Body::from_stream(ReaderStream::new(self.file)),
        )
            .into_response()
    }
}

/// Content type by file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension {
        "jar" | "war" | "ear" => "application/java-archive",
        "pom" | "xml" => "application/xml",
        "json" => "application/json",
        "tgz" | "gz" => "application/gzip",
        "zip" | "whl" | "nupkg" => "application/zip",
        "rpm" => "application/x-rpm",
        "html" => "text/html; charset=utf-8",
        "md5" | "sha1" | "sha256" | "sha512" | "asc" | "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
