use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::storage::{ContentHash, ContentStore, StorageError};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::content_ledger::ContentLedger;
use super::ownership_ledger::{OwnedFile, OwnershipLedger};
use super::refresh_usage;
use super::usage::QuotaGate;
use super::users::UserDirectory;
use crate::config::StorageConfig;
use crate::error::AppError;
use crate::utils::filename::{resolve_media_type, validate_flat_filename};

/// A request to store one file, identified by the hash of its bytes.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    /// Size the client claims the content has.
    pub size: i64,
    pub content_hash: String,
    pub media_type: Option<String>,
}

/// What the client has to do next for one file.
#[derive(Debug)]
pub enum UploadAuthorization {
    /// The content was already stored. An ownership row now exists and no
    /// bytes need to move.
    Duplicate(OwnedFile),
    /// New content. PUT the bytes to `upload_url`, then complete.
    UploadRequired {
        upload_url: String,
        blob_key: String,
        expires_at: DateTime<Utc>,
    },
}

/// Finalization of a direct-to-store upload.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub filename: String,
    pub blob_key: String,
    pub content_hash: String,
    pub media_type: Option<String>,
    /// Size declared at authorization time, checked against the stored object.
    pub expected_size: Option<i64>,
}

/// Per-item result of a batch authorization.
#[derive(Debug)]
pub enum BatchItemOutcome {
    Duplicate(OwnedFile),
    UploadRequired {
        upload_url: String,
        blob_key: String,
        expires_at: DateTime<Utc>,
    },
    QuotaExceeded,
    Error(String),
}

#[derive(Debug)]
pub struct BatchItem {
    pub content_hash: String,
    pub filename: String,
    pub outcome: BatchItemOutcome,
}

#[derive(Debug)]
pub struct BatchAuthorization {
    pub batch_id: Uuid,
    pub items: Vec<BatchItem>,
    /// Declared bytes of every item whose content is not stored yet.
    pub total_new_bytes: i64,
    pub quota_available: bool,
    /// Bytes by which the batch would overflow the quota.
    pub quota_overflow: i64,
}

#[derive(Debug)]
pub struct BatchCompletionItem {
    pub content_hash: String,
    pub filename: String,
    pub result: Result<OwnedFile, AppError>,
}

#[derive(Debug)]
pub struct BatchCompletion {
    pub batch_id: Uuid,
    pub items: Vec<BatchCompletionItem>,
}

/// Decides between linking existing content and issuing an upload URL, and
/// finalizes uploads into the ledgers.
pub struct UploadOrchestrator<'a> {
    db: &'a DatabaseConnection,
    store: &'a Arc<dyn ContentStore>,
    storage: &'a StorageConfig,
}

struct ValidatedItem {
    hash: ContentHash,
    filename: String,
    size: i64,
}

impl<'a> UploadOrchestrator<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        store: &'a Arc<dyn ContentStore>,
        storage: &'a StorageConfig,
    ) -> Self {
        Self { db, store, storage }
    }

    /// Check-first authorization of a single upload.
    ///
    /// Known content is linked immediately (one transaction: new ownership
    /// row plus reference increment). Unknown content must pass the quota gate
    /// before a presigned PUT for its hash-derived key is issued; no ledger
    /// row is written on that path.
    pub async fn authorize(
        &self,
        user_id: &str,
        request: UploadRequest,
    ) -> Result<UploadAuthorization, AppError> {
        let item = validate_item(&request)?;
        UserDirectory::new(self.db, self.storage)
            .get_or_create(user_id)
            .await?;

        if let Some(file) = self.link_duplicate(user_id, &item).await? {
            refresh_usage(self.db, self.storage, user_id).await;
            return Ok(UploadAuthorization::Duplicate(file));
        }

        QuotaGate::new(self.db, self.storage)
            .check(user_id, item.size)
            .await?;

        let (upload_url, blob_key, expires_at) = self.issue_upload_url(&item.hash).await?;
        info!(
            user_id,
            content_hash = %item.hash,
            size = item.size,
            "Issued upload URL for new content"
        );
        Ok(UploadAuthorization::UploadRequired {
            upload_url,
            blob_key,
            expires_at,
        })
    }

    /// Finalize an upload once the client has written the bytes.
    ///
    /// The stored object's size is authoritative. A completion that finds the
    /// hash already recorded (a concurrent upload of the same bytes finished
    /// first) is folded into the duplicate path.
    ///
    /// `blob_key` must be the hash-derived key, so concurrent completions all
    /// land on one object and nothing is left over. The just-uploaded object
    /// is only redundant, and deleted off the request path, when the existing
    /// row records a different key, which only rows written under an older
    /// key layout do.
    pub async fn complete(
        &self,
        user_id: &str,
        request: CompletionRequest,
    ) -> Result<OwnedFile, AppError> {
        let filename = validate_flat_filename(&request.filename)
            .map_err(|e| AppError::Validation(e.message().into()))?
            .to_string();
        let hash = ContentHash::from_hex(request.content_hash.trim())?;
        let hash_hex = hash.to_hex();

        if request.blob_key != hash.blob_key() {
            return Err(AppError::Validation(
                "Blob key does not match content hash".into(),
            ));
        }

        let stored = self.store.stat(&request.blob_key).await.map_err(|e| match e {
            StorageError::NotFound(_) => {
                AppError::NotFound("Uploaded content not found in storage".into())
            }
            other => AppError::from(other),
        })?;
        let size = i64::try_from(stored)
            .map_err(|_| AppError::Validation("Stored object is too large".into()))?;

        if let Some(expected) = request.expected_size
            && expected != size
        {
            return Err(AppError::Validation(format!(
                "Size mismatch: declared {expected} bytes, stored {size} bytes"
            )));
        }

        let media_type = resolve_media_type(request.media_type.as_deref(), &filename);

        UserDirectory::new(self.db, self.storage)
            .get_or_create(user_id)
            .await?;

        let txn = self.db.begin().await?;
        let ledger = ContentLedger::new(&txn);

        let mut redundant_key = None;
        let content = if ledger
            .insert_if_absent(&hash_hex, size, &media_type, &request.blob_key)
            .await?
        {
            ledger
                .find(&hash_hex)
                .await?
                .ok_or_else(|| AppError::Internal("content_record missing after insert".into()))?
        } else {
            let mut existing = ledger.find_for_update(&hash_hex).await?.ok_or_else(|| {
                AppError::Conflict("Content was removed concurrently, retry the upload".into())
            })?;
            if !ledger.increment_reference(&hash_hex).await? {
                return Err(AppError::Conflict(
                    "Content was removed concurrently, retry the upload".into(),
                ));
            }
            existing.reference_count += 1;

            // Only a row from an older key layout differs here.
            if existing.blob_key != request.blob_key {
                redundant_key = Some(request.blob_key.clone());
            } else {
                debug!(content_hash = %hash_hex, "Concurrent upload landed on the stored key");
            }
            existing
        };

        let ownership = OwnershipLedger::new(&txn)
            .create(user_id, &hash_hex, &filename)
            .await?;
        txn.commit().await?;

        if let Some(key) = redundant_key {
            self.schedule_blob_delete(key);
        }
        refresh_usage(self.db, self.storage, user_id).await;

        info!(
            user_id,
            ownership_id = %ownership.id,
            content_hash = %hash_hex,
            size,
            reference_count = content.reference_count,
            "Upload completed"
        );
        Ok((ownership, content))
    }

    /// Authorize up to `batch_max_items` uploads with one quota decision.
    pub async fn batch_authorize(
        &self,
        user_id: &str,
        requests: Vec<UploadRequest>,
    ) -> Result<BatchAuthorization, AppError> {
        self.check_batch_size(requests.len())?;
        UserDirectory::new(self.db, self.storage)
            .get_or_create(user_id)
            .await?;

        let validated: Vec<Result<ValidatedItem, String>> = requests
            .iter()
            .map(|r| validate_item(r).map_err(|e| e.public_message()))
            .collect();

        let hashes: Vec<String> = validated
            .iter()
            .filter_map(|v| v.as_ref().ok().map(|i| i.hash.to_hex()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let existing = ContentLedger::new(self.db).find_many(&hashes).await?;

        let total_new_bytes = validated
            .iter()
            .filter_map(|v| v.as_ref().ok())
            .filter(|i| !existing.contains_key(&i.hash.to_hex()))
            .fold(0i64, |acc, i| acc.saturating_add(i.size));

        let (quota_available, quota_overflow) = if total_new_bytes > 0 {
            match QuotaGate::new(self.db, self.storage)
                .check(user_id, total_new_bytes)
                .await
            {
                Ok(()) => (true, 0),
                Err(AppError::QuotaExceeded {
                    used,
                    requested,
                    quota,
                }) => (false, used.saturating_add(requested).saturating_sub(quota)),
                Err(e) => return Err(e),
            }
        } else {
            (true, 0)
        };

        let mut items = Vec::with_capacity(requests.len());
        for (request, validated) in requests.iter().zip(validated) {
            let outcome = match validated {
                Err(reason) => BatchItemOutcome::Error(reason),
                Ok(item) if existing.contains_key(&item.hash.to_hex()) => {
                    match self.link_duplicate(user_id, &item).await {
                        Ok(Some(file)) => BatchItemOutcome::Duplicate(file),
                        Ok(None) => BatchItemOutcome::Error(
                            "Content was removed concurrently, retry this file".into(),
                        ),
                        Err(e) => {
                            warn!(user_id, content_hash = %item.hash, error = ?e, "Failed to link duplicate in batch");
                            BatchItemOutcome::Error(e.public_message())
                        }
                    }
                }
                Ok(_) if !quota_available => BatchItemOutcome::QuotaExceeded,
                Ok(item) => match self.issue_upload_url(&item.hash).await {
                    Ok((upload_url, blob_key, expires_at)) => BatchItemOutcome::UploadRequired {
                        upload_url,
                        blob_key,
                        expires_at,
                    },
                    Err(e) => {
                        warn!(user_id, content_hash = %item.hash, error = ?e, "Failed to issue upload URL in batch");
                        BatchItemOutcome::Error(e.public_message())
                    }
                },
            };

            items.push(BatchItem {
                content_hash: request.content_hash.trim().to_lowercase(),
                filename: request.filename.trim().to_string(),
                outcome,
            });
        }

        refresh_usage(self.db, self.storage, user_id).await;

        let batch_id = Uuid::now_v7();
        info!(
            user_id,
            %batch_id,
            items = items.len(),
            total_new_bytes,
            quota_available,
            "Batch upload prepared"
        );

        Ok(BatchAuthorization {
            batch_id,
            items,
            total_new_bytes,
            quota_available,
            quota_overflow,
        })
    }

    /// Complete each item independently. A failed item never undoes a
    /// sibling that succeeded.
    pub async fn batch_complete(
        &self,
        user_id: &str,
        batch_id: Uuid,
        completions: Vec<CompletionRequest>,
    ) -> Result<BatchCompletion, AppError> {
        self.check_batch_size(completions.len())?;

        let mut items = Vec::with_capacity(completions.len());
        for completion in completions {
            let content_hash = completion.content_hash.trim().to_lowercase();
            let filename = completion.filename.trim().to_string();
            let result = self.complete(user_id, completion).await;
            if let Err(e) = &result {
                warn!(user_id, %batch_id, content_hash, error = ?e, "Batch item failed to complete");
            }
            items.push(BatchCompletionItem {
                content_hash,
                filename,
                result,
            });
        }

        Ok(BatchCompletion { batch_id, items })
    }

    fn check_batch_size(&self, len: usize) -> Result<(), AppError> {
        if len == 0 {
            return Err(AppError::Validation(
                "Batch must contain at least one file".into(),
            ));
        }
        if len > self.storage.batch_max_items {
            return Err(AppError::Validation(format!(
                "Batch exceeds maximum of {} files",
                self.storage.batch_max_items
            )));
        }
        Ok(())
    }

    /// Link `item` to existing content, or return `None` if the hash is not
    /// stored. The lookup, increment and insert share one transaction, and the
    /// row lock keeps a concurrent last-reference delete out until commit.
    async fn link_duplicate(
        &self,
        user_id: &str,
        item: &ValidatedItem,
    ) -> Result<Option<OwnedFile>, AppError> {
        let hash_hex = item.hash.to_hex();
        let txn = self.db.begin().await?;
        let ledger = ContentLedger::new(&txn);

        let Some(mut content) = ledger.find_for_update(&hash_hex).await? else {
            return Ok(None);
        };
        if !ledger.increment_reference(&hash_hex).await? {
            return Ok(None);
        }
        content.reference_count += 1;

        let ownership = OwnershipLedger::new(&txn)
            .create(user_id, &hash_hex, &item.filename)
            .await?;
        txn.commit().await?;

        info!(
            user_id,
            ownership_id = %ownership.id,
            content_hash = %hash_hex,
            reference_count = content.reference_count,
            "Linked upload to existing content"
        );
        Ok(Some((ownership, content)))
    }

    async fn issue_upload_url(
        &self,
        hash: &ContentHash,
    ) -> Result<(String, String, DateTime<Utc>), AppError> {
        let blob_key = hash.blob_key();
        let ttl = self.storage.upload_url_ttl();
        let url = self.store.presigned_put(&blob_key, ttl).await?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| AppError::Internal(format!("invalid upload ttl: {e}")))?;
        Ok((url, blob_key, expires_at))
    }

    /// Best-effort removal of an upload that turned out to be redundant.
    fn schedule_blob_delete(&self, blob_key: String) {
        let store = Arc::clone(self.store);
        tokio::spawn(async move {
            match store.delete(&blob_key).await {
                Ok(()) => debug!(blob_key, "Deleted redundant upload"),
                Err(e) => warn!(blob_key, error = %e, "Failed to delete redundant upload"),
            }
        });
    }
}

fn validate_item(request: &UploadRequest) -> Result<ValidatedItem, AppError> {
    let filename = validate_flat_filename(&request.filename)
        .map_err(|e| AppError::Validation(e.message().into()))?
        .to_string();
    let hash = ContentHash::from_hex(request.content_hash.trim())?;
    if request.size < 0 {
        return Err(AppError::Validation("Size must be >= 0".into()));
    }
    Ok(ValidatedItem {
        hash,
        filename,
        size: request.size,
    })
}
