use common::storage::public_tags;
use vault_server::error::AppError;
use vault_server::vault::content_ledger::ContentLedger;
use vault_server::vault::compute_usage;

use crate::common::*;

const PHOTO: &[u8] = b"holiday photo bytes, pretend this is a jpeg";

#[tokio::test]
async fn deleting_one_of_two_references_keeps_content() {
    let vault = Vault::new().await;
    let (a, _) = vault.upload("u1", "a.txt", PHOTO).await;
    vault.upload("u1", "b.txt", PHOTO).await;

    let deletion = vault.files().delete_owned_file("u1", a.id).await.unwrap();

    assert_eq!(deletion.remaining_references, 1);
    assert!(!deletion.content_released);
    let stored = vault.content(&hash_of(PHOTO)).await.unwrap();
    assert_eq!(stored.reference_count, 1);
    assert!(vault.store.contains(&blob_key_of(PHOTO)));
    assert!(vault.store.deletions().is_empty());
    assert!(vault.ownership(a.id).await.is_none());
}

#[tokio::test]
async fn deleting_last_reference_releases_content_and_blob() {
    let vault = Vault::new().await;
    let (a, _) = vault.upload("u1", "a.txt", PHOTO).await;
    let (b, _) = vault.upload("u1", "b.txt", PHOTO).await;

    vault.files().delete_owned_file("u1", a.id).await.unwrap();
    let deletion = vault.files().delete_owned_file("u1", b.id).await.unwrap();

    assert_eq!(deletion.remaining_references, 0);
    assert!(deletion.content_released);
    assert!(vault.content(&hash_of(PHOTO)).await.is_none());
    assert!(!vault.store.contains(&blob_key_of(PHOTO)));
    assert_eq!(vault.store.deletions(), vec![blob_key_of(PHOTO)]);

    let usage = compute_usage(&vault.db, "u1").await.unwrap();
    assert_eq!(usage.deduplicated_bytes, 0);
    assert_eq!(usage.original_bytes, 0);
}

#[tokio::test]
async fn other_users_cannot_delete() {
    let vault = Vault::new().await;
    let (file, _) = vault.upload("u1", "a.txt", PHOTO).await;

    let err = vault
        .files()
        .delete_owned_file("intruder", file.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
    assert!(vault.ownership(file.id).await.is_some());
    assert_eq!(vault.content(&hash_of(PHOTO)).await.unwrap().reference_count, 1);
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let vault = Vault::new().await;
    let (file, _) = vault.upload("u1", "a.txt", PHOTO).await;

    vault.files().delete_owned_file("u1", file.id).await.unwrap();
    let err = vault
        .files()
        .delete_owned_file("u1", file.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn failed_blob_delete_still_commits() {
    let vault = Vault::new().await;
    let (file, _) = vault.upload("u1", "a.txt", PHOTO).await;
    vault.store.fail_delete_calls(true);

    let deletion = vault.files().delete_owned_file("u1", file.id).await.unwrap();

    assert!(deletion.content_released);
    assert!(vault.content(&hash_of(PHOTO)).await.is_none());
    assert!(vault.ownership(file.id).await.is_none());
    // Orphaned until reconciliation.
    assert!(vault.store.contains(&blob_key_of(PHOTO)));
}

#[tokio::test]
async fn stored_count_drift_is_corrected_on_delete() {
    let vault = Vault::new().await;
    let (a, _) = vault.upload("u1", "a.txt", PHOTO).await;
    vault.upload("u1", "b.txt", PHOTO).await;
    vault.upload("u2", "c.txt", PHOTO).await;
    ContentLedger::new(&vault.db)
        .set_reference_count(&hash_of(PHOTO), 7)
        .await
        .unwrap();

    let deletion = vault.files().delete_owned_file("u1", a.id).await.unwrap();

    assert_eq!(deletion.remaining_references, 2);
    assert_eq!(vault.content(&hash_of(PHOTO)).await.unwrap().reference_count, 2);
    vault.assert_counts_consistent().await;
}

#[tokio::test]
async fn deleting_public_file_removes_its_share_link() {
    let vault = Vault::new().await;
    let (file, _) = vault.upload("u1", "a.txt", PHOTO).await;
    vault.files().toggle_visibility("u1", file.id).await.unwrap();
    assert!(vault.share_link_for(file.id).await.is_some());

    vault.files().delete_owned_file("u1", file.id).await.unwrap();

    assert!(vault.share_link_for(file.id).await.is_none());
}

#[tokio::test]
async fn deleting_only_public_copy_clears_tags_of_shared_blob() {
    let vault = Vault::new().await;
    let (public, _) = vault.upload("u1", "shared.jpg", PHOTO).await;
    vault.upload("u2", "private.jpg", PHOTO).await;
    vault.files().toggle_visibility("u1", public.id).await.unwrap();
    assert_eq!(vault.store.tags_of(&blob_key_of(PHOTO)), Some(public_tags()));

    vault.files().delete_owned_file("u1", public.id).await.unwrap();

    let tags = vault.store.tags_of(&blob_key_of(PHOTO)).unwrap();
    assert!(tags.is_empty(), "tags left behind: {tags:?}");
}

#[tokio::test]
async fn blob_stays_public_while_another_public_copy_exists() {
    let vault = Vault::new().await;
    let (first, _) = vault.upload("u1", "one.jpg", PHOTO).await;
    let (second, _) = vault.upload("u2", "two.jpg", PHOTO).await;
    vault.files().toggle_visibility("u1", first.id).await.unwrap();
    vault.files().toggle_visibility("u2", second.id).await.unwrap();

    vault.files().delete_owned_file("u1", first.id).await.unwrap();

    assert_eq!(vault.store.tags_of(&blob_key_of(PHOTO)), Some(public_tags()));
}
