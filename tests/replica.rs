use pretty_assertions::assert_eq;

use fieldnote::entities::{label, Ownership, SyncStatus};
use fieldnote::replica::{LocalReplica, ReplicaChange};
use fieldnote::storage::LocalStorage;
use fieldnote::{board, EntityKind};

fn label(id: &str, name: &str) -> label::Model {
    label::Model {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        name: name.to_string(),
        color: "red".to_string(),
        created_at: 1,
        updated_at: 1,
        sync_status: SyncStatus::Synced,
    }
}

async fn replica() -> LocalReplica {
    let storage = LocalStorage::in_memory().await.unwrap();
    LocalReplica::new(storage.conn)
}

#[tokio::test]
async fn put_get_and_overwrite() {
    let replica = replica().await;
    assert!(replica.get::<label::Model>("l1").await.unwrap().is_none());

    replica.put(label("l1", "urgent")).await.unwrap();
    let stored = replica.get::<label::Model>("l1").await.unwrap().unwrap();
    assert_eq!(stored, label("l1", "urgent"));

    replica.put(label("l1", "later")).await.unwrap();
    let all = replica.all::<label::Model>().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "later");
}

#[tokio::test]
async fn query_filters_in_memory() {
    let replica = replica().await;
    replica
        .bulk_put(vec![label("a", "alpha"), label("b", "beta"), label("c", "alpine")])
        .await
        .unwrap();

    let mut names: Vec<String> = replica
        .query::<label::Model, _>(|l| l.name.starts_with("al"))
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["alpha".to_string(), "alpine".to_string()]);
}

#[tokio::test]
async fn writes_publish_changes() {
    let replica = replica().await;
    let mut changes = replica.subscribe();

    replica.bulk_put(vec![label("a", "alpha"), label("b", "beta")]).await.unwrap();
    assert_eq!(
        changes.recv().await.unwrap(),
        ReplicaChange {
            kind: EntityKind::Label,
            ids: vec!["a".to_string(), "b".to_string()],
        }
    );

    assert!(replica.delete::<label::Model>("a").await.unwrap());
    assert_eq!(changes.recv().await.unwrap().ids, vec!["a".to_string()]);

    // Nothing removed, nothing announced
    assert!(!replica.delete::<label::Model>("a").await.unwrap());
    assert_eq!(replica.bulk_delete::<label::Model>(&["missing".to_string()]).await.unwrap(), 0);
    assert!(changes.try_recv().is_err());

    assert_eq!(replica.bulk_delete::<label::Model>(&["b".to_string()]).await.unwrap(), 1);
    assert_eq!(changes.recv().await.unwrap().kind, EntityKind::Label);
}

#[tokio::test]
async fn header_reads_any_kind() {
    let replica = replica().await;
    replica
        .put(board::Model {
            id: "board-1".to_string(),
            user_id: "owner".to_string(),
            title: "Shared board".to_string(),
            description: None,
            created_at: 1,
            updated_at: 42,
            sync_status: SyncStatus::Synced,
            ownership: Ownership::Shared,
        })
        .await
        .unwrap();

    let header = replica.header(EntityKind::Board, "board-1").await.unwrap().unwrap();
    assert_eq!(header.user_id, "owner");
    assert_eq!(header.ownership, Ownership::Shared);
    assert_eq!(header.updated_at, Some(42));
    assert_eq!(header.parent_id, None);

    assert!(replica.header(EntityKind::Label, "board-1").await.unwrap().is_none());
}
