mod helpers;

use std::fs;

use helpers::hashing_service;
use recall::memory::index::SqliteIndex;
use recall::memory::records::JsonRecordStore;
use recall::Backend;
use tempfile::TempDir;

#[test]
fn locked_index_fails_the_write_and_keeps_history() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(Backend::Sqlite, tmp.path());
    for i in 0..5 {
        service
            .add_memory("u1", &format!("T{i}"), "funny cat video", "http://x")
            .unwrap();
    }

    let index_path = SqliteIndex::new(tmp.path()).path_for("u1");
    let holder = rusqlite::Connection::open(index_path).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

    assert!(service.add_memory("u1", "T5", "cat nap", "http://x/5").is_err());
    assert_eq!(service.memory_count("u1"), 5);
    assert_eq!(service.fingerprint_count("u1"), 5);
    assert_eq!(service.search_memory("u1", "cat", 10).len(), 5);

    holder.execute_batch("COMMIT").unwrap();
    drop(holder);

    assert_eq!(service.add_memory("u1", "T5", "cat nap", "http://x/5").unwrap(), 5);
    let titles: Vec<String> = service
        .list_memories("u1")
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["T0", "T1", "T2", "T3", "T4", "T5"]);
}

#[test]
fn corrupt_sidecar_yields_empty_search_then_repairs() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(Backend::Sqlite, tmp.path());
    service.add_memory("u1", "T1", "funny cat video", "http://x/1").unwrap();
    service.add_memory("u1", "T2", "cat compilation", "http://x/2").unwrap();

    fs::write(JsonRecordStore::new(tmp.path()).path_for("u1"), "[{\"title\": ").unwrap();

    assert!(service.search_memory("u1", "cat", 5).is_empty());
    assert!(service.list_memories("u1").is_empty());

    // Next write truncates the index to the surviving prefix.
    assert_eq!(service.add_memory("u1", "T3", "cat nap", "http://x/3").unwrap(), 0);
    assert_eq!(service.fingerprint_count("u1"), 1);
    let results = service.search_memory("u1", "cat", 5);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "T3");
}

#[test]
fn corrupt_index_yields_empty_search_then_repairs() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(Backend::Sqlite, tmp.path());
    service.add_memory("u1", "T1", "funny cat video", "http://x/1").unwrap();

    fs::write(
        SqliteIndex::new(tmp.path()).path_for("u1"),
        b"this is not an sqlite database at all, only garbage bytes",
    )
    .unwrap();

    assert!(service.search_memory("u1", "cat", 5).is_empty());
    assert_eq!(service.fingerprint_count("u1"), 0);

    assert_eq!(service.add_memory("u1", "T2", "cat nap", "http://x/2").unwrap(), 0);
    assert_eq!(service.memory_count("u1"), 1);
    let results = service.search_memory("u1", "cat", 5);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "T2");
}

#[test]
fn missing_sidecar_with_existing_index_is_reconciled() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(Backend::Sqlite, tmp.path());
    service.add_memory("u1", "T1", "funny cat video", "http://x/1").unwrap();
    service.add_memory("u1", "T2", "serious news report", "http://x/2").unwrap();

    fs::remove_file(JsonRecordStore::new(tmp.path()).path_for("u1")).unwrap();
    assert_eq!(service.fingerprint_count("u1"), 2);
    assert!(service.search_memory("u1", "news", 5).is_empty());

    service.add_memory("u1", "T3", "weather news", "http://x/3").unwrap();
    assert_eq!(service.memory_count("u1"), 1);
    assert_eq!(service.fingerprint_count("u1"), 1);
}

#[test]
fn records_beyond_the_index_are_dropped_on_next_write() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(Backend::Sqlite, tmp.path());
    service.add_memory("u1", "T1", "funny cat video", "http://x/1").unwrap();

    // Simulate a crash between the record append and the index insert.
    let sidecar = JsonRecordStore::new(tmp.path()).path_for("u1");
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&sidecar).unwrap()).unwrap();
    json.as_array_mut().unwrap().push(serde_json::json!({
        "title": "orphan",
        "summary": "never indexed",
        "url": "http://x/orphan",
    }));
    fs::write(&sidecar, serde_json::to_string(&json).unwrap()).unwrap();
    assert_eq!(service.memory_count("u1"), 2);

    assert_eq!(service.add_memory("u1", "T2", "cat nap", "http://x/2").unwrap(), 1);
    let titles: Vec<String> = service
        .list_memories("u1")
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["T1", "T2"]);
}
