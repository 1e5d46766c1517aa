use chrono::Utc;

use mealgraph::channels::Channel;
use mealgraph::runtimes::{Checkpoint, Checkpointer, InMemoryCheckpointer};
use mealgraph::types::NodeKind;

mod common;
use common::*;

fn checkpoint(thread: &str, id: &str, parent: Option<&str>, seq: u64) -> Checkpoint {
    Checkpoint {
        thread_id: thread.to_string(),
        checkpoint_id: id.to_string(),
        parent_id: parent.map(str::to_string),
        seq,
        state: state_with_user("hi"),
        next_nodes: vec![NodeKind::Custom("router".into())],
        ran_node: (seq > 1).then(|| NodeKind::Custom("preferences".into())),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let store = InMemoryCheckpointer::new();
    store.put(checkpoint("t1", "c1", None, 1)).await.unwrap();
    store
        .put(checkpoint("t1", "c2", Some("c1"), 2))
        .await
        .unwrap();

    let latest = store.latest("t1").await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, "c2");
    assert_eq!(latest.parent_id.as_deref(), Some("c1"));
    assert_eq!(latest.state.messages.snapshot().len(), 1);

    let by_id = store.get("t1", "c1").await.unwrap().unwrap();
    assert_eq!(by_id.seq, 1);
    assert!(by_id.parent_id.is_none());
}

#[tokio::test]
async fn put_is_idempotent_per_checkpoint_id() {
    let store = InMemoryCheckpointer::new();
    let cp = checkpoint("t1", "c1", None, 1);
    store.put(cp.clone()).await.unwrap();
    store.put(cp).await.unwrap();

    let history = store.history("t1", 10, None).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn history_pages_with_cursor() {
    let store = InMemoryCheckpointer::new();
    let mut parent: Option<String> = None;
    for i in 1..=7u64 {
        let id = format!("c{i}");
        store
            .put(checkpoint("t1", &id, parent.as_deref(), i))
            .await
            .unwrap();
        parent = Some(id);
    }

    let first_page = store.history("t1", 3, None).await.unwrap();
    assert_eq!(
        first_page.iter().map(|c| c.seq).collect::<Vec<_>>(),
        vec![7, 6, 5]
    );

    let cursor = first_page.last().unwrap().seq;
    let second_page = store.history("t1", 3, Some(cursor)).await.unwrap();
    assert_eq!(
        second_page.iter().map(|c| c.seq).collect::<Vec<_>>(),
        vec![4, 3, 2]
    );
}

#[tokio::test]
async fn accepts_checkpoint_whose_parent_is_not_the_tip() {
    let store = InMemoryCheckpointer::new();
    store.put(checkpoint("t1", "c1", None, 1)).await.unwrap();
    store
        .put(checkpoint("t1", "c2", Some("c1"), 2))
        .await
        .unwrap();
    // A resume writes a child of c1 even though c2 is the tip.
    store
        .put(checkpoint("t1", "c3", Some("c1"), 3))
        .await
        .unwrap();

    let latest = store.latest("t1").await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, "c3");
    assert_eq!(latest.parent_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn delete_thread_clears_the_chain() {
    let store = InMemoryCheckpointer::new();
    store.put(checkpoint("t1", "c1", None, 1)).await.unwrap();
    store.put(checkpoint("t2", "c1", None, 1)).await.unwrap();

    store.delete_thread("t1").await.unwrap();
    assert!(store.latest("t1").await.unwrap().is_none());
    assert!(store.latest("t2").await.unwrap().is_some());

    let mut threads = store.list_threads().await.unwrap();
    threads.sort();
    assert_eq!(threads, vec!["t2"]);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use mealgraph::runtimes::SqliteCheckpointer;

    async fn temp_store() -> (tempfile::TempDir, SqliteCheckpointer) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoints.db");
        std::fs::File::create(&path).expect("create db file");
        let url = format!("sqlite://{}", path.display());
        let store = SqliteCheckpointer::connect(&url).await.expect("connect");
        (dir, store)
    }

    #[tokio::test]
    async fn sqlite_round_trip_and_history() {
        let (_dir, store) = temp_store().await;

        store.put(checkpoint("t1", "c1", None, 1)).await.unwrap();
        store
            .put(checkpoint("t1", "c2", Some("c1"), 2))
            .await
            .unwrap();

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, "c2");
        assert_eq!(latest.ran_node, Some(NodeKind::Custom("preferences".into())));

        let history = store.history("t1", 10, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].seq, 2);
        assert_eq!(history[1].seq, 1);
    }

    #[tokio::test]
    async fn sqlite_put_is_idempotent() {
        let (_dir, store) = temp_store().await;
        let cp = checkpoint("t1", "c1", None, 1);
        store.put(cp.clone()).await.unwrap();
        store.put(cp).await.unwrap();
        assert_eq!(store.history("t1", 10, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sqlite_delete_thread() {
        let (_dir, store) = temp_store().await;
        store.put(checkpoint("t1", "c1", None, 1)).await.unwrap();
        store.delete_thread("t1").await.unwrap();
        assert!(store.latest("t1").await.unwrap().is_none());
        assert!(store.list_threads().await.unwrap().is_empty());
    }
}
