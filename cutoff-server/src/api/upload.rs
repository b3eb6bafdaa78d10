//! PDF upload endpoint
//!
//! Stores the file under `<uploads>/<fileId>-<name>`, registers the job and
//! hands it to the ingest pipeline. The response is sent as soon as the file
//! is on disk; extraction progress is only observable through the progress
//! stream.

use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use cutoff_common::events::WAITING_STATUS;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field carrying the PDF
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_name: String,
    pub file_id: Uuid,
    pub file_path: String,
    pub message: String,
}

/// True for names ending in `.pdf`, any case
pub fn is_pdf(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Base name of a client-supplied file name, reduced to a safe character set
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

async fn save_field(field: &mut Field<'_>, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// POST /api/admin/upload
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
        if !is_pdf(&original) {
            return Err(ApiError::BadRequest("Only PDF files are allowed".to_string()));
        }

        let file_id = Uuid::new_v4();
        let file_name = format!("{}-{}", file_id, sanitize_file_name(&original));
        let upload_dir = state.config.upload_dir();
        tokio::fs::create_dir_all(&upload_dir).await?;
        let file_path: PathBuf = upload_dir.join(&file_name);

        let size = match save_field(&mut field, &file_path).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
                    warn!("Failed to remove partial upload {}: {}", file_path.display(), remove_err);
                }
                return Err(e);
            }
        };

        info!(job_id = %file_id, file = %file_name, bytes = size, "File uploaded");

        state
            .progress
            .open_job(file_id, Some(file_path.clone()), WAITING_STATUS);
        state.pipeline.spawn(file_id, file_path.clone());

        return Ok(Json(UploadResponse {
            success: true,
            file_name,
            file_id,
            file_path: file_path.display().to_string(),
            message: "File uploaded successfully".to_string(),
        }));
    }

    Err(ApiError::BadRequest("No file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("cutoffs.pdf"));
        assert!(is_pdf("CAP Round 1.PDF"));
        assert!(!is_pdf("cutoffs.pdf.exe"));
        assert!(!is_pdf("notes.txt"));
        assert!(!is_pdf("pdf"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("CAP Round 1.pdf"), "CAP_Round_1.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\list.pdf"), "list.pdf");
        assert_eq!(sanitize_file_name("..."), "upload.pdf");
    }
}
