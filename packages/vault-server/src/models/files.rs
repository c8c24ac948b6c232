use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vault::OwnedFile;
use crate::vault::lifecycle::{DownloadLink, Visibility};
use crate::vault::share_path;
use crate::vault::upload::{
    BatchAuthorization, BatchCompletion, BatchItemOutcome, CompletionRequest, UploadAuthorization,
    UploadRequest,
};

use super::shared::Pagination;

/// Request body for authorizing a single upload.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadUrlRequest {
    /// Name shown to the owner. A single path segment.
    #[schema(example = "report.pdf")]
    pub filename: String,
    /// Declared size in bytes.
    #[schema(example = 48213)]
    pub size: i64,
    /// SHA-256 of the file bytes, hex-encoded.
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub content_hash: String,
    /// Declared media type. Guessed from the filename when absent.
    #[schema(example = "application/pdf")]
    pub media_type: Option<String>,
}

impl From<UploadUrlRequest> for UploadRequest {
    fn from(r: UploadUrlRequest) -> Self {
        Self {
            filename: r.filename,
            size: r.size,
            content_hash: r.content_hash,
            media_type: r.media_type,
        }
    }
}

/// A file as its owner sees it.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    #[schema(example = "report.pdf")]
    pub filename: String,
    #[schema(example = 48213)]
    pub size: i64,
    #[schema(example = "application/pdf")]
    pub media_type: String,
    pub content_hash: String,
    #[schema(example = false)]
    pub is_public: bool,
    #[schema(example = 0)]
    pub download_count: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<OwnedFile> for FileResponse {
    fn from((ownership, content): OwnedFile) -> Self {
        Self {
            id: ownership.id,
            filename: ownership.filename,
            size: content.size,
            media_type: content.media_type,
            content_hash: content.content_hash,
            is_public: ownership.is_public,
            download_count: ownership.download_count,
            uploaded_at: ownership.uploaded_at,
        }
    }
}

/// Result of an upload authorization.
///
/// Duplicates carry `file`; new content carries `upload_url`, `blob_key` and
/// `expires_at`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadUrlResponse {
    pub is_duplicate: bool,
    pub upload_url: Option<String>,
    #[schema(example = "blobs/9f/86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub blob_key: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file: Option<FileResponse>,
}

impl From<UploadAuthorization> for UploadUrlResponse {
    fn from(auth: UploadAuthorization) -> Self {
        match auth {
            UploadAuthorization::Duplicate(file) => Self {
                is_duplicate: true,
                upload_url: None,
                blob_key: None,
                expires_at: None,
                file: Some(file.into()),
            },
            UploadAuthorization::UploadRequired {
                upload_url,
                blob_key,
                expires_at,
            } => Self {
                is_duplicate: false,
                upload_url: Some(upload_url),
                blob_key: Some(blob_key),
                expires_at: Some(expires_at),
                file: None,
            },
        }
    }
}

/// Request body for finalizing an upload.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CompleteUploadRequest {
    #[schema(example = "report.pdf")]
    pub filename: String,
    /// Key returned by the authorization.
    pub blob_key: String,
    pub content_hash: String,
    pub media_type: Option<String>,
    /// Size declared at authorization time. Checked against the stored object.
    pub size: Option<i64>,
}

impl From<CompleteUploadRequest> for CompletionRequest {
    fn from(r: CompleteUploadRequest) -> Self {
        Self {
            filename: r.filename,
            blob_key: r.blob_key,
            content_hash: r.content_hash,
            media_type: r.media_type,
            expected_size: r.size,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchPrepareRequest {
    pub files: Vec<UploadUrlRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Duplicate,
    UploadRequired,
    QuotaExceeded,
    Error,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchItemResponse {
    pub content_hash: String,
    pub filename: String,
    pub status: BatchItemStatus,
    pub upload_url: Option<String>,
    pub blob_key: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file: Option<FileResponse>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuotaCheckResponse {
    /// Declared bytes of every item whose content is not stored yet.
    pub total_size_required: i64,
    pub quota_available: bool,
    /// Bytes by which the batch would overflow the quota. Zero when it fits.
    pub quota_exceeded_by: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchPrepareResponse {
    pub batch_id: Uuid,
    pub items: Vec<BatchItemResponse>,
    pub quota_check: QuotaCheckResponse,
}

impl From<BatchAuthorization> for BatchPrepareResponse {
    fn from(batch: BatchAuthorization) -> Self {
        let items = batch
            .items
            .into_iter()
            .map(|item| {
                let mut response = BatchItemResponse {
                    content_hash: item.content_hash,
                    filename: item.filename,
                    status: BatchItemStatus::Error,
                    upload_url: None,
                    blob_key: None,
                    expires_at: None,
                    file: None,
                    error: None,
                };
                match item.outcome {
                    BatchItemOutcome::Duplicate(file) => {
                        response.status = BatchItemStatus::Duplicate;
                        response.file = Some(file.into());
                    }
                    BatchItemOutcome::UploadRequired {
                        upload_url,
                        blob_key,
                        expires_at,
                    } => {
                        response.status = BatchItemStatus::UploadRequired;
                        response.upload_url = Some(upload_url);
                        response.blob_key = Some(blob_key);
                        response.expires_at = Some(expires_at);
                    }
                    BatchItemOutcome::QuotaExceeded => {
                        response.status = BatchItemStatus::QuotaExceeded;
                        response.error = Some("Storage quota exceeded".into());
                    }
                    BatchItemOutcome::Error(reason) => response.error = Some(reason),
                }
                response
            })
            .collect();

        Self {
            batch_id: batch.batch_id,
            items,
            quota_check: QuotaCheckResponse {
                total_size_required: batch.total_new_bytes,
                quota_available: batch.quota_available,
                quota_exceeded_by: batch.quota_overflow,
            },
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchCompleteRequest {
    /// Id returned by batch prepare.
    pub batch_id: Uuid,
    pub files: Vec<CompleteUploadRequest>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchCompleteItemResponse {
    pub content_hash: String,
    pub filename: String,
    pub success: bool,
    pub file: Option<FileResponse>,
    /// Machine-readable error code for a failed item.
    pub error_code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchCompleteResponse {
    pub batch_id: Uuid,
    pub items: Vec<BatchCompleteItemResponse>,
    pub succeeded: usize,
    pub failed: usize,
}

impl From<BatchCompletion> for BatchCompleteResponse {
    fn from(batch: BatchCompletion) -> Self {
        let items: Vec<BatchCompleteItemResponse> = batch
            .items
            .into_iter()
            .map(|item| match item.result {
                Ok(file) => BatchCompleteItemResponse {
                    content_hash: item.content_hash,
                    filename: item.filename,
                    success: true,
                    file: Some(file.into()),
                    error_code: None,
                    error: None,
                },
                Err(e) => BatchCompleteItemResponse {
                    content_hash: item.content_hash,
                    filename: item.filename,
                    success: false,
                    file: None,
                    error_code: Some(e.code().to_string()),
                    error: Some(e.public_message()),
                },
            })
            .collect();
        let succeeded = items.iter().filter(|i| i.success).count();

        Self {
            batch_id: batch.batch_id,
            failed: items.len() - succeeded,
            succeeded,
            items,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub data: Vec<FileResponse>,
    pub pagination: Pagination,
    pub has_more: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DownloadUrlResponse {
    pub url: String,
    pub filename: String,
    pub is_public: bool,
    /// Seconds until `url` expires. Absent for public files.
    #[schema(example = 60)]
    pub expires_in: Option<u64>,
}

impl From<DownloadLink> for DownloadUrlResponse {
    fn from(link: DownloadLink) -> Self {
        Self {
            url: link.url,
            filename: link.filename,
            is_public: link.is_public,
            expires_in: link.expires_in,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ShareLinkResponse {
    #[schema(example = "aZ3kP9qx")]
    pub short_id: String,
    /// Path under which the link resolves.
    #[schema(example = "/share/aZ3kP9qx")]
    pub share_link: String,
    /// `share_link` prefixed with the configured public base URL.
    pub share_url: String,
}

impl ShareLinkResponse {
    pub fn new(short_id: String, public_base_url: &str) -> Self {
        let share_link = share_path(&short_id);
        Self {
            share_url: format!("{}{}", public_base_url.trim_end_matches('/'), share_link),
            short_id,
            share_link,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VisibilityResponse {
    pub is_public: bool,
    /// Present while the file is public.
    pub share: Option<ShareLinkResponse>,
}

impl VisibilityResponse {
    pub fn new(visibility: Visibility, public_base_url: &str) -> Self {
        Self {
            is_public: visibility.is_public,
            share: visibility
                .share_link
                .map(|link| ShareLinkResponse::new(link.id, public_base_url)),
        }
    }
}

/// What anonymous callers may see of a public file.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PublicFileResponse {
    pub id: Uuid,
    pub filename: String,
    pub size: i64,
    pub media_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<OwnedFile> for PublicFileResponse {
    fn from((ownership, content): OwnedFile) -> Self {
        Self {
            id: ownership.id,
            filename: ownership.filename,
            size: content.size,
            media_type: content.media_type,
            uploaded_at: ownership.uploaded_at,
        }
    }
}
