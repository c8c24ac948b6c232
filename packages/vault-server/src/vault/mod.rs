//! Ledgers and the orchestrators that keep them consistent with the content
//! store.

pub mod content_ledger;
pub mod lifecycle;
pub mod ownership_ledger;
pub mod share_registry;
pub mod upload;
pub mod usage;
pub mod users;

use sea_orm::ConnectionTrait;

pub use content_ledger::{ContentLedger, RecountReport, Unreference};
pub use lifecycle::FileLifecycle;
pub use ownership_ledger::{OwnedFile, OwnershipLedger};
pub use share_registry::{ShareRegistry, share_path};
pub use upload::UploadOrchestrator;
pub use usage::{QuotaGate, UsageSummary, compute_usage};
pub use users::{SystemStats, UserDirectory};

use crate::config::StorageConfig;

/// Keep the stored usage counter close to computed usage. Failures are
/// logged; the counter is informational only.
pub(crate) async fn refresh_usage<C: ConnectionTrait>(
    conn: &C,
    storage: &StorageConfig,
    user_id: &str,
) {
    if let Err(e) = UserDirectory::new(conn, storage)
        .refresh_storage_used(user_id)
        .await
    {
        tracing::warn!(user_id, error = ?e, "Failed to refresh storage usage counter");
    }
}
