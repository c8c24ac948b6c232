use vault_server::config::StorageConfig;
use vault_server::error::AppError;
use vault_server::vault::content_ledger::ContentLedger;
use vault_server::vault::ownership_ledger::OwnershipLedger;
use vault_server::vault::upload::UploadAuthorization;
use vault_server::vault::compute_usage;

use crate::common::*;

const REPORT: &[u8] = b"quarterly report, final version, do not edit";

mod authorize {
    use super::*;

    #[tokio::test]
    async fn first_upload_creates_one_record_with_one_reference() {
        let vault = Vault::new().await;

        let (ownership, content) = vault.upload("u1", "a.txt", REPORT).await;

        assert_eq!(ownership.user_id, "u1");
        assert_eq!(ownership.filename, "a.txt");
        assert!(!ownership.is_public);
        assert_eq!(content.content_hash, hash_of(REPORT));
        assert_eq!(content.size, REPORT.len() as i64);
        assert_eq!(content.reference_count, 1);
        assert_eq!(content.blob_key, blob_key_of(REPORT));

        assert_eq!(vault.content_count().await, 1);
        assert_eq!(vault.ownership_count(&content.content_hash).await, 1);
        assert!(vault.store.contains(&blob_key_of(REPORT)));

        let usage = compute_usage(&vault.db, "u1").await.unwrap();
        assert_eq!(usage.deduplicated_bytes, REPORT.len() as i64);
        assert_eq!(usage.original_bytes, REPORT.len() as i64);
        assert_eq!(usage.savings_bytes, 0);
    }

    #[tokio::test]
    async fn new_content_gets_presigned_put_and_no_ledger_rows() {
        let vault = Vault::new().await;

        let auth = vault
            .uploads()
            .authorize("u1", request("a.txt", REPORT))
            .await
            .unwrap();

        let UploadAuthorization::UploadRequired {
            upload_url,
            blob_key,
            expires_at,
        } = auth
        else {
            panic!("expected an upload URL, got {auth:?}");
        };
        assert_eq!(blob_key, blob_key_of(REPORT));
        assert!(upload_url.contains(&blob_key));
        assert!(upload_url.contains("X-Method=PUT"));
        assert!(expires_at > chrono::Utc::now());

        assert_eq!(vault.content_count().await, 0);
        assert_eq!(vault.ownership_count(&hash_of(REPORT)).await, 0);
        assert!(!vault.store.contains(&blob_key));
        // Authorizing provisions the caller.
        assert!(vault.user("u1").await.is_some());
    }

    #[tokio::test]
    async fn known_content_is_linked_without_transfer() {
        let vault = Vault::new().await;
        vault.upload("u1", "a.txt", REPORT).await;

        let auth = vault
            .uploads()
            .authorize("u1", request("b.txt", REPORT))
            .await
            .unwrap();

        let UploadAuthorization::Duplicate((ownership, content)) = auth else {
            panic!("expected a duplicate, got {auth:?}");
        };
        assert_eq!(ownership.filename, "b.txt");
        assert_eq!(content.reference_count, 2);

        let stored = vault.content(&hash_of(REPORT)).await.unwrap();
        assert_eq!(stored.reference_count, 2);
        assert_eq!(vault.content_count().await, 1);
        assert_eq!(vault.store.object_count(), 1);

        let usage = compute_usage(&vault.db, "u1").await.unwrap();
        assert_eq!(usage.deduplicated_bytes, REPORT.len() as i64);
        assert_eq!(usage.original_bytes, 2 * REPORT.len() as i64);
        assert_eq!(usage.savings_bytes, REPORT.len() as i64);
        assert_eq!(usage.savings_percent, 50.0);
        vault.assert_counts_consistent().await;
    }

    #[tokio::test]
    async fn content_is_shared_across_users() {
        let vault = Vault::new().await;
        vault.upload("u1", "mine.txt", REPORT).await;
        vault.upload("u2", "theirs.txt", REPORT).await;

        let stored = vault.content(&hash_of(REPORT)).await.unwrap();
        assert_eq!(stored.reference_count, 2);
        assert_eq!(vault.content_count().await, 1);

        for user in ["u1", "u2"] {
            let usage = compute_usage(&vault.db, user).await.unwrap();
            assert_eq!(usage.deduplicated_bytes, REPORT.len() as i64);
            assert_eq!(usage.file_count, 1);
        }
    }

    #[tokio::test]
    async fn rejects_malformed_requests() {
        let vault = Vault::new().await;

        let mut bad_hash = request("a.txt", REPORT);
        bad_hash.content_hash = "not-a-hash".into();
        let bad_name = request("dir/a.txt", REPORT);
        let mut negative = request("a.txt", REPORT);
        negative.size = -1;

        for req in [bad_hash, bad_name, negative, request("   ", REPORT)] {
            let err = vault.uploads().authorize("u1", req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        }
        assert_eq!(vault.content_count().await, 0);
    }

    #[tokio::test]
    async fn hash_is_accepted_in_upper_case() {
        let vault = Vault::new().await;
        vault.upload("u1", "a.txt", REPORT).await;

        let mut req = request("b.txt", REPORT);
        req.content_hash = req.content_hash.to_uppercase();
        let auth = vault.uploads().authorize("u1", req).await.unwrap();

        assert!(matches!(auth, UploadAuthorization::Duplicate(_)));
    }
}

mod quota {
    use super::*;

    fn one_megabyte() -> StorageConfig {
        StorageConfig {
            default_quota_mb: 1,
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn new_content_over_quota_is_rejected() {
        let vault = Vault::with_storage(one_megabyte()).await;
        let first = vec![7u8; 600_000];
        let second = vec![8u8; 600_000];
        vault.upload("u1", "first.bin", &first).await;

        let err = vault
            .uploads()
            .authorize("u1", request("second.bin", &second))
            .await
            .unwrap_err();

        match err {
            AppError::QuotaExceeded {
                used,
                requested,
                quota,
            } => {
                assert_eq!(used, 600_000);
                assert_eq!(requested, 600_000);
                assert_eq!(quota, 1024 * 1024);
            }
            other => panic!("expected quota error, got {other:?}"),
        }
        assert_eq!(vault.content_count().await, 1);
    }

    #[tokio::test]
    async fn duplicates_bypass_the_quota_gate() {
        let vault = Vault::with_storage(one_megabyte()).await;
        let big = vec![9u8; 900_000];
        vault.upload("u1", "big.bin", &big).await;

        // Usage is already near the limit, but known bytes add nothing.
        let auth = vault
            .uploads()
            .authorize("u1", request("big-copy.bin", &big))
            .await
            .unwrap();
        assert!(matches!(auth, UploadAuthorization::Duplicate(_)));
    }

    #[tokio::test]
    async fn exactly_filling_the_quota_is_allowed() {
        let vault = Vault::with_storage(one_megabyte()).await;
        let exact = vec![3u8; 1024 * 1024];

        let auth = vault
            .uploads()
            .authorize("u1", request("exact.bin", &exact))
            .await
            .unwrap();

        assert!(matches!(auth, UploadAuthorization::UploadRequired { .. }));
    }
}

mod complete {
    use super::*;

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let vault = Vault::new().await;
        vault
            .uploads()
            .authorize("u1", request("a.txt", REPORT))
            .await
            .unwrap();

        let err = vault
            .uploads()
            .complete("u1", completion("a.txt", REPORT))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
        assert_eq!(vault.content_count().await, 0);
    }

    #[tokio::test]
    async fn blob_key_must_match_hash() {
        let vault = Vault::new().await;
        vault.store.simulate_client_put("uploads/elsewhere", REPORT);

        let mut req = completion("a.txt", REPORT);
        req.blob_key = "uploads/elsewhere".into();
        let err = vault.uploads().complete("u1", req).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        assert_eq!(vault.content_count().await, 0);
    }

    #[tokio::test]
    async fn size_mismatch_is_rejected() {
        let vault = Vault::new().await;
        vault.store.simulate_client_put(&blob_key_of(REPORT), REPORT);

        let mut req = completion("a.txt", REPORT);
        req.expected_size = Some(REPORT.len() as i64 + 1);
        let err = vault.uploads().complete("u1", req).await.unwrap_err();

        let AppError::Validation(msg) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(msg.contains("Size mismatch"));
        assert_eq!(vault.content_count().await, 0);
    }

    #[tokio::test]
    async fn stored_size_is_authoritative() {
        let vault = Vault::new().await;
        vault.store.simulate_client_put(&blob_key_of(REPORT), REPORT);

        let mut req = completion("a.txt", REPORT);
        req.expected_size = None;
        let (_, content) = vault.uploads().complete("u1", req).await.unwrap();

        assert_eq!(content.size, REPORT.len() as i64);
    }

    #[tokio::test]
    async fn media_type_is_declared_or_guessed() {
        let vault = Vault::new().await;

        let png = b"\x89PNG not really";
        let (_, guessed) = vault.upload("u1", "photo.png", png).await;
        assert_eq!(guessed.media_type, "image/png");

        let unknown = b"no extension";
        let (_, fallback) = vault.upload("u1", "README", unknown).await;
        assert_eq!(fallback.media_type, "application/octet-stream");

        let declared = b"declared type";
        vault.store.simulate_client_put(&blob_key_of(declared), declared);
        let mut req = completion("notes.png", declared);
        req.media_type = Some("text/plain".into());
        let (_, explicit) = vault.uploads().complete("u1", req).await.unwrap();
        assert_eq!(explicit.media_type, "text/plain");
    }

    #[tokio::test]
    async fn upload_to_another_key_is_reclaimed_when_content_exists() {
        let vault = Vault::new().await;
        let hash = hash_of(REPORT);

        // Content recorded under a key from an older layout.
        vault.store.simulate_client_put("legacy/report", REPORT);
        ContentLedger::new(&vault.db)
            .insert_if_absent(&hash, REPORT.len() as i64, "text/plain", "legacy/report")
            .await
            .unwrap();
        OwnershipLedger::new(&vault.db)
            .create("u1", &hash, "old.txt")
            .await
            .unwrap();

        vault.store.simulate_client_put(&blob_key_of(REPORT), REPORT);
        let (_, content) = vault
            .uploads()
            .complete("u2", completion("new.txt", REPORT))
            .await
            .unwrap();

        assert_eq!(content.blob_key, "legacy/report");
        assert_eq!(content.reference_count, 2);

        let canonical = blob_key_of(REPORT);
        let (store, canonical) = (&vault.store, canonical.as_str());
        assert!(
            eventually(|| async move { !store.contains(canonical) }).await,
            "redundant upload was not deleted"
        );
        assert!(vault.store.contains("legacy/report"));
    }

    #[tokio::test]
    async fn failed_redundant_delete_still_completes() {
        let vault = Vault::new().await;
        let hash = hash_of(REPORT);
        vault.store.simulate_client_put("legacy/report", REPORT);
        ContentLedger::new(&vault.db)
            .insert_if_absent(&hash, REPORT.len() as i64, "text/plain", "legacy/report")
            .await
            .unwrap();
        OwnershipLedger::new(&vault.db)
            .create("u1", &hash, "old.txt")
            .await
            .unwrap();

        vault.store.fail_delete_calls(true);
        vault.store.simulate_client_put(&blob_key_of(REPORT), REPORT);
        let result = vault
            .uploads()
            .complete("u2", completion("new.txt", REPORT))
            .await;

        assert!(result.is_ok());
        assert_eq!(vault.ownership_count(&hash).await, 2);
    }
}
