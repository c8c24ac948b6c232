//! Overlapping transactions on PostgreSQL, where `FOR UPDATE` and
//! `ON CONFLICT DO NOTHING` block on each other for real.

use vault_server::vault::UserDirectory;
use vault_server::vault::upload::UploadAuthorization;

use crate::common::*;

const SHARED: &[u8] = b"bytes several users race on";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_of_same_bytes_share_one_record() {
    let vault = Vault::on_postgres().await;

    // Every caller sees the hash as new and is told to upload.
    for user in ["u1", "u2", "u3"] {
        let auth = vault
            .uploads()
            .authorize(user, request("same.txt", SHARED))
            .await
            .unwrap();
        assert!(matches!(auth, UploadAuthorization::UploadRequired { .. }));
    }
    vault.store.simulate_client_put(&blob_key_of(SHARED), SHARED);

    let (u1, u2, u3) = (vault.uploads(), vault.uploads(), vault.uploads());
    let (a, b, c) = tokio::join!(
        u1.complete("u1", completion("same.txt", SHARED)),
        u2.complete("u2", completion("same.txt", SHARED)),
        u3.complete("u3", completion("same.txt", SHARED)),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let stored = vault.content(&hash_of(SHARED)).await.unwrap();
    assert_eq!(stored.reference_count, 3);
    assert_eq!(vault.content_count().await, 1);
    vault.assert_counts_consistent().await;

    // All three wrote the same hash-derived key, so nothing is redundant.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(vault.store.deletions().is_empty());
    assert!(vault.store.contains(&stored.blob_key));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deletes_of_last_two_references_release_once() {
    let vault = Vault::on_postgres().await;
    let (a, _) = vault.upload("u1", "a.txt", SHARED).await;
    let (b, _) = vault.upload("u2", "b.txt", SHARED).await;

    let (fa, fb) = (vault.files(), vault.files());
    let (ra, rb) = tokio::join!(
        fa.delete_owned_file("u1", a.id),
        fb.delete_owned_file("u2", b.id),
    );
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(
        u8::from(ra.content_released) + u8::from(rb.content_released),
        1,
        "exactly one delete releases the content"
    );
    assert!(vault.content(&hash_of(SHARED)).await.is_none());
    assert_eq!(vault.store.deletions(), vec![blob_key_of(SHARED)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_reference_delete_racing_a_duplicate_link_stays_consistent() {
    let vault = Vault::on_postgres().await;
    UserDirectory::new(&vault.db, &vault.storage)
        .get_or_create("u2")
        .await
        .unwrap();

    // Several rounds so both interleavings get a chance to occur.
    for round in 0..8 {
        let bytes = format!("round {round} content");
        let bytes = bytes.as_bytes();
        let (file, _) = vault.upload("u1", "first.txt", bytes).await;

        let (files, uploads) = (vault.files(), vault.uploads());
        let (deleted, linked) = tokio::join!(
            files.delete_owned_file("u1", file.id),
            uploads.authorize("u2", request("second.txt", bytes)),
        );
        let deleted = deleted.unwrap();
        let content = vault.content(&hash_of(bytes)).await;

        match linked.unwrap() {
            // The link committed first: the delete saw u2's row and kept the
            // content.
            UploadAuthorization::Duplicate((ownership, _)) => {
                assert!(!deleted.content_released, "round {round}");
                assert_eq!(ownership.user_id, "u2");
                let content = content.expect("linked content must survive");
                assert_eq!(content.reference_count, 1);
                assert!(vault.store.contains(&content.blob_key), "round {round}");
            }
            // The delete committed first: the link found nothing and the
            // caller is sent to upload again.
            UploadAuthorization::UploadRequired { blob_key, .. } => {
                assert!(deleted.content_released, "round {round}");
                assert!(content.is_none(), "round {round}");
                assert!(!vault.store.contains(&blob_key));

                vault.store.simulate_client_put(&blob_key, bytes);
                let (_, restored) = vault
                    .uploads()
                    .complete("u2", completion("second.txt", bytes))
                    .await
                    .unwrap();
                assert_eq!(restored.reference_count, 1);
            }
        }

        vault.assert_counts_consistent().await;
        vault.assert_blobs_present().await;
    }
}
