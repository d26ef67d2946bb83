mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{harness, FakeRemote, USER};
use fieldnote::entities::mutation::MutationType;
use fieldnote::entities::{document, label, Ownership, SyncStatus};
use fieldnote::remote::Method;
use fieldnote::repositories::NewMutation;
use fieldnote::session::Session;
use fieldnote::storage::LocalStorage;
use fieldnote::sync::{PushReport, SyncOutcome, SyncService};
use fieldnote::EntityKind;

fn new_label(id: &str, name: &str) -> label::Model {
    label::Model {
        id: id.to_string(),
        user_id: String::new(),
        name: name.to_string(),
        color: "blue".to_string(),
        created_at: 0,
        updated_at: 0,
        sync_status: SyncStatus::Created,
    }
}

#[tokio::test]
async fn create_is_pushed_with_client_id_and_converges() {
    let h = harness().await;
    let created = h.service.create(new_label("label-1", "urgent")).await.unwrap();
    assert_eq!(created.sync_status, SyncStatus::Created);
    assert_eq!(created.user_id, USER);
    assert_eq!(h.service.queue().pending(), 1);

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.converged, 1);

    let writes = h.remote.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Post);
    assert_eq!(writes[0].path, "/labels");
    let body = writes[0].body.clone().unwrap();
    assert_eq!(body["id"], json!("label-1"));
    assert_eq!(body["name"], json!("urgent"));
    assert!(body.get("syncStatus").is_none());

    let stored = h.service.replica().get::<label::Model>("label-1").await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert!(h.service.queue().is_empty().await.unwrap());
    assert_eq!(h.service.queue().pending(), 0);
}

#[tokio::test]
async fn duplicate_delivery_of_a_create_changes_nothing() {
    let h = harness().await;
    h.service.create(new_label("label-1", "urgent")).await.unwrap();
    h.service.push().await.completed().unwrap();

    // The same CREATE shows up again, as if the first removal was lost.
    let snapshot = serde_json::to_value(
        h.service.replica().get::<label::Model>("label-1").await.unwrap().unwrap(),
    )
    .unwrap();
    h.service
        .queue()
        .enqueue(NewMutation {
            op: MutationType::Create,
            kind: EntityKind::Label,
            entity_id: "label-1".to_string(),
            user_id: USER.to_string(),
            data: Some(snapshot),
        })
        .await
        .unwrap();

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.retained, 0);

    assert_eq!(h.remote.created_ids().len(), 1);
    let labels = h.service.replica().all::<label::Model>().await.unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].sync_status, SyncStatus::Synced);
    assert!(h.service.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn edit_after_queued_snapshot_keeps_record_dirty() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    h.service.push().await.completed().unwrap();

    let updated = h.service.update_document_content(&doc.id, "v2").await.unwrap();
    let queued_at = h.service.queue().all().await.unwrap()[0].created_at;
    assert_eq!(updated.updated_at, queued_at);

    // The user keeps typing; this write bypasses the queue on purpose.
    let mut newer = updated.clone();
    newer.content = "v3".to_string();
    newer.updated_at = queued_at + 1_000;
    h.service.replica().put(newer).await.unwrap();

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.converged, 0);

    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Updated);
    assert_eq!(stored.content, "v3");
}

#[tokio::test]
async fn kinds_without_timestamp_converge_once_queue_drains() {
    let h = harness().await;
    let board = h.service.create_board("Sprint", None).await.unwrap();
    let column = h.service.add_column(&board.id, "Todo").await.unwrap();

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 2);

    let writes = h.remote.writes();
    assert_eq!(writes[1].path, format!("/boards/{}/columns", board.id));

    let header = h
        .service
        .replica()
        .header(EntityKind::BoardColumn, &column.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(header.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn queued_mutation_for_shared_record_is_dropped_without_network() {
    let h = harness().await;
    let shared = document::Model {
        id: "doc-shared".to_string(),
        user_id: "someone-else".to_string(),
        container_id: None,
        title: "Their notes".to_string(),
        content: "hello".to_string(),
        is_pinned: false,
        is_trashed: false,
        created_at: 1,
        updated_at: 1,
        sync_status: SyncStatus::Synced,
        ownership: Ownership::Shared,
    };
    h.service.replica().put(shared).await.unwrap();
    h.service
        .queue()
        .enqueue(NewMutation {
            op: MutationType::Update,
            kind: EntityKind::Document,
            entity_id: "doc-shared".to_string(),
            user_id: USER.to_string(),
            data: Some(json!({ "title": "Mine now" })),
        })
        .await
        .unwrap();

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.dropped, 1);
    assert!(h.remote.requests().is_empty());
    assert!(h.service.queue().is_empty().await.unwrap());

    let err = h
        .service
        .update_document_content("doc-shared", "edit")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("shared"));
}

#[tokio::test]
async fn gone_resource_drops_item_and_settles_record() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    h.service.push().await.completed().unwrap();
    h.service.update_document_content(&doc.id, "v2").await.unwrap();

    h.remote.fail(Method::Patch, &format!("/documents/{}", doc.id), 410);
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.dropped, 1);
    assert!(h.service.queue().is_empty().await.unwrap());

    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn transient_failure_leaves_item_for_next_run() {
    let h = harness().await;
    h.service.create(new_label("label-1", "urgent")).await.unwrap();
    h.service.create(new_label("label-2", "later")).await.unwrap();

    h.remote.fail(Method::Post, "/labels", 503);
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.retained, 2);
    assert_eq!(h.service.queue().len().await.unwrap(), 2);
    let stored = h.service.replica().get::<label::Model>("label-1").await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Created);

    h.remote.heal();
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 2);
    assert!(h.service.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn retained_edit_holds_back_later_edits_of_the_same_record() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    h.service.push().await.completed().unwrap();
    h.service.update_document_content(&doc.id, "v2").await.unwrap();
    h.service.update_document_content(&doc.id, "v3").await.unwrap();
    h.service.create(new_label("label-1", "urgent")).await.unwrap();
    h.remote.clear_requests();

    h.remote.fail(Method::Patch, &format!("/documents/{}", doc.id), 503);
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.retained, 2);

    // Only the first edit was attempted; the unrelated label still went out.
    let writes = h.remote.writes();
    assert_eq!(writes.iter().filter(|r| r.method == Method::Patch).count(), 1);
    assert!(writes.iter().any(|r| r.method == Method::Post && r.path == "/labels"));
    assert_eq!(h.service.queue().len().await.unwrap(), 2);

    h.remote.heal();
    h.remote.clear_requests();
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.retained, 0);

    let contents: Vec<serde_json::Value> = h
        .remote
        .writes()
        .into_iter()
        .map(|r| r.body.unwrap()["content"].clone())
        .collect();
    assert_eq!(contents, vec![json!("v2"), json!("v3")]);

    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "v3");
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert!(h.service.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn gone_update_is_not_sent_while_its_create_is_retained() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    h.service.update_document_content(&doc.id, "v2").await.unwrap();

    h.remote.fail(Method::Post, "/documents", 503);
    h.remote.fail(Method::Patch, &format!("/documents/{}", doc.id), 404);
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.retained, 2);
    assert_eq!(report.dropped, 0);

    let methods: Vec<Method> = h.remote.writes().iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![Method::Post]);
    assert_eq!(h.service.queue().len().await.unwrap(), 2);

    h.remote.heal();
    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report.applied, 2);

    let last = h.remote.writes().pop().unwrap();
    assert_eq!(last.method, Method::Patch);
    assert_eq!(last.body.unwrap()["content"], json!("v2"));
    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn edits_replay_in_the_order_they_were_made() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    h.service.update_document_content(&doc.id, "v2").await.unwrap();
    h.service.rename_document(&doc.id, "Final plan").await.unwrap();

    h.service.push().await.completed().unwrap();

    let writes = h.remote.writes();
    let methods: Vec<Method> = writes.iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![Method::Post, Method::Patch, Method::Patch]);
    assert_eq!(writes[1].body.as_ref().unwrap()["content"], json!("v2"));
    assert_eq!(writes[2].body.as_ref().unwrap()["title"], json!("Final plan"));

    let stored = h.service.replica().get::<document::Model>(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn update_of_unpushed_record_stays_created() {
    let h = harness().await;
    let doc = h.service.create_document("Plan", "v1", None).await.unwrap();
    let updated = h.service.update_document_content(&doc.id, "v2").await.unwrap();
    assert_eq!(updated.sync_status, SyncStatus::Created);
    assert_eq!(h.service.queue().len().await.unwrap(), 2);
}

#[tokio::test]
async fn push_without_session_touches_nothing() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let remote = FakeRemote::new();
    let session = Session::signed_in(USER, "token");
    let service = SyncService::new(&storage, remote.clone(), session.clone()).await.unwrap();
    service.create(new_label("label-1", "urgent")).await.unwrap();

    session.logout();
    assert_eq!(service.push().await, SyncOutcome::NoSession);
    assert!(remote.requests().is_empty());
    assert_eq!(service.queue().len().await.unwrap(), 1);
}

#[tokio::test]
async fn items_of_other_users_are_never_replayed() {
    let h = harness().await;
    h.service
        .queue()
        .enqueue(NewMutation {
            op: MutationType::Delete,
            kind: EntityKind::Label,
            entity_id: "label-9".to_string(),
            user_id: "previous-user".to_string(),
            data: None,
        })
        .await
        .unwrap();

    let report = h.service.push().await.completed().unwrap();
    assert_eq!(report, PushReport::default());
    assert!(h.remote.requests().is_empty());
    assert_eq!(h.service.queue().len().await.unwrap(), 1);
}

#[tokio::test]
async fn logout_can_discard_pending_writes() {
    let h = harness().await;
    h.service.create(new_label("label-1", "urgent")).await.unwrap();

    h.service.logout(true).await.unwrap();
    assert!(h.service.queue().is_empty().await.unwrap());
    assert_eq!(h.service.queue().pending(), 0);

    h.service.login("user-2", "token-2");
    let label = h.service.replica().get::<label::Model>("label-1").await.unwrap();
    assert!(label.is_some());
}

#[tokio::test]
async fn concurrent_push_is_dropped_not_queued() {
    let h = harness().await;
    let other = h.service.clone();
    h.service.create(new_label("label-1", "urgent")).await.unwrap();

    let (first, second) = tokio::join!(other.push(), h.service.push());
    let outcomes = [first, second];
    assert!(outcomes.iter().any(|o| matches!(o, SyncOutcome::Completed(_))));
    assert_eq!(h.remote.created_ids().len(), 1);
    assert!(!h.service.is_pushing());
}
