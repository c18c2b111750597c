//! Tests for `index` module

use std::sync::mpsc;

use super::index::*;

#[test]
fn test_memory_indexer_records_tasks() {
    let indexer = MemoryIndexer::new();

    indexer.populate(&[IndexKind::Users, IndexKind::Orgs]);
    indexer.reindex(IndexKind::Concepts, vec![1, 2]);
    indexer.reindex(IndexKind::Concepts, vec![5]);

    assert_eq!(indexer.tasks().len(), 3);
    assert_eq!(indexer.reindexed(IndexKind::Concepts), vec![1, 2, 5]);
    assert!(indexer.reindexed(IndexKind::Mappings).is_empty());
}

#[test]
fn test_empty_requests_are_skipped() {
    let indexer = MemoryIndexer::new();

    indexer.populate(&[]);
    indexer.reindex(IndexKind::Mappings, Vec::new());

    assert!(indexer.tasks().is_empty());
}

#[test]
fn test_background_indexer_runs_handler_off_thread() {
    // Arrange
    let (tx, rx) = mpsc::channel();
    let indexer = BackgroundIndexer::with_handler(
        8,
        Box::new(move |task| {
            let _ = tx.send((std::thread::current().name().map(str::to_string), task));
        }),
    )
    .unwrap();

    // Act
    indexer.reindex(IndexKind::Sources, vec![7]);
    let handled = indexer.shutdown();

    // Assert
    assert_eq!(handled, 1);
    let (thread_name, task) = rx.recv().unwrap();
    assert_eq!(thread_name.as_deref(), Some("termbase-indexer"));
    assert_eq!(
        task,
        IndexTask::Reindex {
            kind: IndexKind::Sources,
            ids: vec![7]
        }
    );
}

#[test]
fn test_full_queue_drops_tasks() {
    // Arrange
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let indexer = BackgroundIndexer::with_handler(
        1,
        Box::new(move |_| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }),
    )
    .unwrap();

    // Act
    indexer.reindex(IndexKind::Concepts, vec![1]);
    started_rx.recv().unwrap();
    indexer.reindex(IndexKind::Concepts, vec![2]);
    indexer.reindex(IndexKind::Concepts, vec![3]);
    let dropped = indexer.dropped();
    drop(release_tx);
    let handled = indexer.shutdown();

    // Assert
    assert_eq!(dropped, 1);
    assert_eq!(handled, 2);
}

#[test]
fn test_background_indexer_default_handler() {
    let indexer = BackgroundIndexer::spawn().unwrap();

    indexer.populate(&[IndexKind::Collections]);

    assert_eq!(indexer.shutdown(), 1);
}

#[test]
fn test_index_kind_serializes_snake_case() {
    let json = serde_json::to_string(&IndexKind::Orgs).unwrap();

    assert_eq!(json, "\"orgs\"");
}
