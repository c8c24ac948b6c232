use std::sync::Arc;

use common::storage::{ContentStore, StorageError, public_tags};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::content_ledger::{ContentLedger, RecountReport, Unreference};
use super::ownership_ledger::{OwnedFile, OwnershipLedger};
use super::share_registry::ShareRegistry;
use super::refresh_usage;
use super::users::UserDirectory;
use crate::config::StorageConfig;
use crate::entity::share_link;
use crate::error::AppError;

fn file_not_found() -> AppError {
    AppError::NotFound("File not found or access denied".into())
}

/// What a delete did to the shared content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub content_hash: String,
    /// Ownership rows still pointing at the content.
    pub remaining_references: i64,
    /// The content row went away with this delete.
    pub content_released: bool,
}

#[derive(Debug, Clone)]
pub struct Visibility {
    pub is_public: bool,
    pub share_link: Option<share_link::Model>,
}

#[derive(Debug, Clone)]
pub struct DownloadLink {
    pub url: String,
    pub filename: String,
    pub is_public: bool,
    /// Seconds until `url` stops working. `None` for public URLs.
    pub expires_in: Option<u64>,
}

#[derive(Debug)]
pub struct ResolvedShare {
    pub url: String,
    pub file: OwnedFile,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub files_deleted: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagReconciliation {
    pub tagged_public: u64,
    pub cleared: u64,
    pub failures: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReferenceReconciliation {
    pub corrected: u64,
    pub released: u64,
    pub blob_delete_failures: u64,
    /// Content rows whose blob the store no longer has.
    pub missing_blobs: u64,
}

/// Everything that happens to a file after it has been stored: visibility,
/// sharing, download links and deletion.
pub struct FileLifecycle<'a> {
    db: &'a DatabaseConnection,
    store: &'a Arc<dyn ContentStore>,
    storage: &'a StorageConfig,
}

impl<'a> FileLifecycle<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        store: &'a Arc<dyn ContentStore>,
        storage: &'a StorageConfig,
    ) -> Self {
        Self { db, store, storage }
    }

    /// Delete one of the caller's files.
    ///
    /// The content row stays locked from lookup to commit. When this removes
    /// the last reference the blob is deleted before commit, so no concurrent
    /// upload can link to a row whose bytes are about to vanish. A failed blob
    /// delete is logged and leaves an orphan for reconciliation.
    pub async fn delete_owned_file(&self, user_id: &str, id: Uuid) -> Result<Deletion, AppError> {
        let txn = self.db.begin().await?;
        let ownerships = OwnershipLedger::new(&txn);

        let owned = ownerships
            .find_owned(user_id, id)
            .await?
            .ok_or_else(file_not_found)?;
        let hash = owned.content_hash.clone();

        let ledger = ContentLedger::new(&txn);
        let locked = ledger.find_for_update(&hash).await?;
        if locked.is_none() {
            warn!(ownership_id = %id, content_hash = %hash, "Ownership row points at missing content");
        }

        ShareRegistry::new(&txn, self.storage.share_id_length)
            .delete_for_ownership(id)
            .await?;
        if !ownerships.delete(id).await? {
            return Err(file_not_found());
        }

        let outcome = ledger.delete_if_unreferenced(&hash).await?;
        if let Unreference::Removed { blob_key } = &outcome
            && let Err(e) = self.store.delete(blob_key).await
        {
            error!(
                content_hash = %hash,
                blob_key,
                error = %e,
                "Failed to delete blob of released content, left for reconciliation"
            );
        }

        // The blob is already gone if this fails. The rolled-back content row
        // then points at nothing until reconciliation reports it.
        if let Err(e) = txn.commit().await {
            if let Unreference::Removed { blob_key } = &outcome {
                error!(
                    content_hash = %hash,
                    blob_key,
                    error = %e,
                    "Commit failed after blob delete, content row left without its blob"
                );
            }
            return Err(e.into());
        }

        let deletion = match outcome {
            Unreference::StillReferenced(remaining) => {
                if owned.is_public
                    && let Some(record) = &locked
                {
                    self.sync_tags(&hash, &record.blob_key).await;
                }
                Deletion {
                    content_hash: hash,
                    remaining_references: remaining,
                    content_released: false,
                }
            }
            Unreference::Removed { .. } | Unreference::Missing => Deletion {
                content_hash: hash,
                remaining_references: 0,
                content_released: matches!(outcome, Unreference::Removed { .. }),
            },
        };

        refresh_usage(self.db, self.storage, user_id).await;
        info!(
            user_id,
            ownership_id = %id,
            content_hash = %deletion.content_hash,
            remaining = deletion.remaining_references,
            released = deletion.content_released,
            "File deleted"
        );
        Ok(deletion)
    }

    /// Flip a file between private and public.
    ///
    /// The flag and the share link change in one transaction. Blob tags are
    /// updated after commit; a tag failure is logged and the toggle still
    /// succeeds.
    pub async fn toggle_visibility(&self, user_id: &str, id: Uuid) -> Result<Visibility, AppError> {
        let txn = self.db.begin().await?;
        let ownerships = OwnershipLedger::new(&txn);

        let owned = ownerships
            .find_owned_for_update(user_id, id)
            .await?
            .ok_or_else(file_not_found)?;
        let content = ContentLedger::new(&txn)
            .find(&owned.content_hash)
            .await?
            .ok_or_else(file_not_found)?;

        let is_public = !owned.is_public;
        if !ownerships.set_public(user_id, id, is_public).await? {
            return Err(file_not_found());
        }

        let shares = ShareRegistry::new(&txn, self.storage.share_id_length);
        let share_link = if is_public {
            Some(shares.get_or_create(id).await?)
        } else {
            shares.delete_for_ownership(id).await?;
            None
        };

        txn.commit().await?;

        self.sync_tags(&content.content_hash, &content.blob_key).await;

        info!(user_id, ownership_id = %id, is_public, "Visibility changed");
        Ok(Visibility {
            is_public,
            share_link,
        })
    }

    /// Share link for a public file, created on first request.
    pub async fn share_link(&self, user_id: &str, id: Uuid) -> Result<share_link::Model, AppError> {
        let owned = OwnershipLedger::new(self.db)
            .find_owned(user_id, id)
            .await?
            .ok_or_else(file_not_found)?;
        if !owned.is_public {
            return Err(AppError::Validation(
                "File must be public to create a share link".into(),
            ));
        }
        Ok(ShareRegistry::new(self.db, self.storage.share_id_length)
            .get_or_create(id)
            .await?)
    }

    /// A URL the viewer can fetch the bytes from.
    ///
    /// Owners get links to any of their files, everyone else only to public
    /// ones. Private files get a short-lived presigned URL.
    pub async fn download_url(
        &self,
        viewer: Option<&str>,
        id: Uuid,
    ) -> Result<DownloadLink, AppError> {
        let (owned, content) = OwnershipLedger::new(self.db)
            .find_visible(viewer, id)
            .await?
            .ok_or_else(file_not_found)?;

        let (url, expires_in) = if owned.is_public {
            (self.store.public_url(&content.blob_key), None)
        } else {
            let ttl = self.storage.download_url_ttl();
            (
                self.store.presigned_get(&content.blob_key, ttl).await?,
                Some(ttl.as_secs()),
            )
        };

        self.record_download(owned.id);
        Ok(DownloadLink {
            url,
            filename: owned.filename,
            is_public: owned.is_public,
            expires_in,
        })
    }

    /// Metadata of a public file, for anonymous callers.
    pub async fn public_info(&self, id: Uuid) -> Result<OwnedFile, AppError> {
        OwnershipLedger::new(self.db)
            .find_visible(None, id)
            .await?
            .ok_or_else(file_not_found)
    }

    /// Map a short id to the public URL of its file.
    pub async fn resolve_share(&self, short_id: &str) -> Result<ResolvedShare, AppError> {
        let not_found = || AppError::NotFound("Share link not found".into());

        let link = ShareRegistry::new(self.db, self.storage.share_id_length)
            .find(short_id)
            .await?
            .ok_or_else(not_found)?;
        let file = OwnershipLedger::new(self.db)
            .find_visible(None, link.ownership_id)
            .await?
            .ok_or_else(not_found)?;

        self.record_download(file.0.id);
        Ok(ResolvedShare {
            url: self.store.public_url(&file.1.blob_key),
            file,
        })
    }

    /// Delete every file a user holds, then the user row itself.
    pub async fn purge_user(&self, user_id: &str) -> Result<PurgeReport, AppError> {
        let ids = OwnershipLedger::new(self.db).ids_for_user(user_id).await?;
        let mut report = PurgeReport::default();

        for id in ids {
            match self.delete_owned_file(user_id, id).await {
                Ok(_) => report.files_deleted += 1,
                // Removed concurrently.
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let removed = UserDirectory::new(self.db, self.storage)
            .delete(user_id)
            .await?;
        if !removed && report.files_deleted == 0 {
            return Err(AppError::NotFound(format!("User '{user_id}' not found")));
        }

        info!(user_id, files_deleted = report.files_deleted, "User purged");
        Ok(report)
    }

    /// Re-derive every blob's tags from the ownership ledger.
    pub async fn reconcile_tags(&self) -> Result<TagReconciliation, AppError> {
        let public = OwnershipLedger::new(self.db).public_hashes().await?;
        let records = ContentLedger::new(self.db).all().await?;

        let mut report = TagReconciliation::default();
        for record in records {
            let want_public = public.contains(&record.content_hash);
            match self.tag_blob(&record.blob_key, want_public).await {
                Ok(()) if want_public => report.tagged_public += 1,
                Ok(()) => report.cleared += 1,
                Err(e) => {
                    warn!(content_hash = %record.content_hash, error = %e, "Tag reconciliation failed");
                    report.failures += 1;
                }
            }
        }

        info!(
            tagged_public = report.tagged_public,
            cleared = report.cleared,
            failures = report.failures,
            "Tag reconciliation finished"
        );
        Ok(report)
    }

    /// Rewrite reference counts from the ownership ledger and reclaim blobs
    /// of content nothing points at any more.
    pub async fn reconcile_references(&self) -> Result<ReferenceReconciliation, AppError> {
        let txn = self.db.begin().await?;
        let RecountReport {
            corrected,
            orphaned_blob_keys,
        } = ContentLedger::new(&txn).recount_all().await?;

        let mut report = ReferenceReconciliation {
            corrected,
            released: orphaned_blob_keys.len() as u64,
            ..Default::default()
        };
        for blob_key in &orphaned_blob_keys {
            if let Err(e) = self.store.delete(blob_key).await {
                error!(blob_key, error = %e, "Failed to delete orphaned blob");
                report.blob_delete_failures += 1;
            }
        }
        txn.commit().await?;

        report.missing_blobs = self.count_missing_blobs().await?;

        info!(
            corrected = report.corrected,
            released = report.released,
            blob_delete_failures = report.blob_delete_failures,
            missing_blobs = report.missing_blobs,
            "Reference reconciliation finished"
        );
        Ok(report)
    }

    /// Stat every recorded blob. Rows whose blob is gone cannot be repaired
    /// here, so they are logged for an operator.
    async fn count_missing_blobs(&self) -> Result<u64, AppError> {
        let mut missing = 0;
        for record in ContentLedger::new(self.db).all().await? {
            match self.store.stat(&record.blob_key).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    error!(
                        content_hash = %record.content_hash,
                        blob_key = %record.blob_key,
                        references = record.reference_count,
                        "Recorded content has no blob"
                    );
                    missing += 1;
                }
                Err(e) => {
                    warn!(blob_key = %record.blob_key, error = %e, "Could not stat blob during reconciliation");
                }
            }
        }
        Ok(missing)
    }

    /// Public tags on the blob iff some ownership row for it is public.
    async fn sync_tags(&self, hash: &str, blob_key: &str) {
        let want_public = match OwnershipLedger::new(self.db).any_public(hash).await {
            Ok(p) => p,
            Err(e) => {
                warn!(content_hash = %hash, error = %e, "Could not read visibility for tag update");
                return;
            }
        };

        if let Err(e) = self.tag_blob(blob_key, want_public).await {
            warn!(content_hash = %hash, blob_key, want_public, error = %e, "Failed to update blob tags");
        }
    }

    async fn tag_blob(&self, blob_key: &str, public: bool) -> Result<(), StorageError> {
        if public {
            self.store.set_tags(blob_key, &public_tags()).await
        } else {
            self.store.clear_tags(blob_key).await
        }
    }

    /// Bump the download counter off the request path.
    fn record_download(&self, id: Uuid) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = OwnershipLedger::new(&db).increment_download_count(id).await {
                warn!(ownership_id = %id, error = %e, "Failed to record download");
            }
        });
    }
}

/// Files listed for a user, newest first.
pub async fn list_files(
    db: &DatabaseConnection,
    user_id: &str,
    page: u64,
    per_page: u64,
) -> Result<(Vec<OwnedFile>, u64), AppError> {
    Ok(OwnershipLedger::new(db)
        .list_for_user(user_id, page, per_page)
        .await?)
}

/// Metadata of one of the caller's files.
pub async fn file_info(
    db: &DatabaseConnection,
    user_id: &str,
    id: Uuid,
) -> Result<OwnedFile, AppError> {
    OwnershipLedger::new(db)
        .find_owned_with_content(user_id, id)
        .await?
        .ok_or_else(file_not_found)
}
