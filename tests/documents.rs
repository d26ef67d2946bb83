mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{harness, serve_empty_collections};
use fieldnote::entities::mutation::MutationType;
use fieldnote::entities::{document, SyncStatus};
use fieldnote::remote::Method;

#[tokio::test]
async fn trash_then_purge() {
    let h = harness().await;
    let doc = h.service.create_document("Old idea", "meh", None).await.unwrap();
    h.service.push().await.completed().unwrap();

    // Purging needs the trash first.
    assert!(h.service.purge_document(&doc.id).await.is_err());

    let trashed = h.service.trash_document(&doc.id).await.unwrap();
    assert!(trashed.is_trashed);
    assert_eq!(trashed.sync_status, SyncStatus::Updated);
    assert!(h.service.documents().await.unwrap().is_empty());
    assert_eq!(h.service.trashed_documents().await.unwrap().len(), 1);

    h.service.push().await.completed().unwrap();
    let trash_call = h.remote.writes().pop().unwrap();
    assert_eq!(trash_call.method, Method::Post);
    assert_eq!(trash_call.path, format!("/documents/{}/trash", doc.id));
    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);

    assert!(h.service.purge_document(&doc.id).await.unwrap());
    let queued = h.service.queue().all().await.unwrap();
    assert_eq!(queued[0].op, MutationType::PurgeTrashed);
    assert!(h.service.replica().get::<document::Model>(&doc.id).await.unwrap().is_none());

    // A pull racing the purge must not bring it back.
    serve_empty_collections(&h.remote);
    h.remote.respond("/documents", json!([{ "id": doc.id, "title": "Old idea", "isTrashed": true }]));
    h.service.pull().await.completed().unwrap();
    assert!(h.service.replica().get::<document::Model>(&doc.id).await.unwrap().is_none());

    h.service.push().await.completed().unwrap();
    let purge_call = h.remote.writes().pop().unwrap();
    assert_eq!(purge_call.method, Method::Delete);
    assert_eq!(purge_call.path, format!("/documents/{}/purge", doc.id));
    assert!(h.service.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn documents_list_pins_first() {
    let h = harness().await;
    let plain = h.service.create_document("Plain", "", None).await.unwrap();
    let pinned = h.service.create_document("Pinned", "", None).await.unwrap();
    h.service
        .update::<document::Model>(&pinned.id, json!({ "isPinned": true }))
        .await
        .unwrap();

    let titles: Vec<String> = h.service.documents().await.unwrap().into_iter().map(|d| d.title).collect();
    assert_eq!(titles, vec!["Pinned".to_string(), "Plain".to_string()]);
    assert_ne!(plain.id, pinned.id);
}

#[tokio::test]
async fn patch_cannot_rewrite_identity_or_status() {
    let h = harness().await;
    let doc = h.service.create_document("Mine", "", None).await.unwrap();
    let updated = h
        .service
        .update::<document::Model>(
            &doc.id,
            json!({ "id": "hijack", "userId": "someone", "syncStatus": "synced", "ownership": "shared", "title": "Still mine" }),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, doc.id);
    assert_eq!(updated.user_id, doc.user_id);
    assert_eq!(updated.sync_status, SyncStatus::Created);
    assert_eq!(updated.title, "Still mine");
}

#[tokio::test]
async fn refresh_document_loads_full_content_for_clean_records() {
    let h = harness().await;
    serve_empty_collections(&h.remote);
    h.remote.respond("/documents", json!([{ "id": "doc-1", "title": "Remote" }]));
    h.service.pull().await.completed().unwrap();

    h.remote.respond(
        "/documents/doc-1",
        json!({ "id": "doc-1", "title": "Remote", "content": "the full body" }),
    );
    assert!(h.service.refresh_document("doc-1").await.unwrap());
    let stored = h.service.replica().get::<document::Model>("doc-1").await.unwrap().unwrap();
    assert_eq!(stored.content, "the full body");

    h.service.update_document_content("doc-1", "local edit").await.unwrap();
    assert!(!h.service.refresh_document("doc-1").await.unwrap());
    let stored = h.service.replica().get::<document::Model>("doc-1").await.unwrap().unwrap();
    assert_eq!(stored.content, "local edit");
}
