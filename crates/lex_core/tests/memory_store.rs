use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use lex_core::config::MemoryConfig;
use lex_core::memory::MemoryStore;

fn ts(i: usize) -> String {
    format!("2026-02-10T00:{:02}:{:02}Z", i / 60, i % 60)
}

#[test]
fn twenty_one_appends_keep_the_twenty_most_recent() {
    let store = MemoryStore::open_in_memory(MemoryConfig::default()).expect("open");
    for i in 1..=21 {
        store
            .append("user-1", &format!("q{i}"), &format!("r{i}"), &ts(i))
            .expect("append");
    }

    let mem = store.read("user-1").expect("read").expect("present");
    assert_eq!(mem.records.len(), 20);
    assert_eq!(mem.records.front().unwrap().query, "q2");
    assert_eq!(mem.records.back().unwrap().query, "q21");
    // First contact is preserved across evictions.
    assert_eq!(mem.first_interaction, ts(1));
}

#[test]
fn responses_are_truncated_to_configured_length() {
    let store = MemoryStore::open_in_memory(MemoryConfig::default()).expect("open");
    let long = "ж".repeat(1200);
    store.append("u", "q", &long, &ts(0)).expect("append");
    let mem = store.read("u").unwrap().unwrap();
    assert_eq!(mem.records[0].truncated_response.chars().count(), 500);
}

#[test]
fn unknown_user_reads_as_empty() {
    let store = MemoryStore::open_in_memory(MemoryConfig::default()).expect("open");
    assert!(store.read("nobody").expect("read").is_none());
    assert!(!store.clear("nobody").expect("clear"));
}

#[test]
fn history_survives_reopen() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nested").join("memory.sqlite");
    {
        let store = MemoryStore::open(&path, MemoryConfig::default()).expect("open");
        store.append("u", "first", "answer", &ts(1)).expect("append");
    }
    let store = MemoryStore::open(&path, MemoryConfig::default()).expect("reopen");
    store.append("u", "second", "answer", &ts(2)).expect("append");
    let mem = store.read("u").unwrap().unwrap();
    let queries: Vec<_> = mem.records.iter().map(|r| r.query.clone()).collect();
    assert_eq!(queries, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(store.user_count().unwrap(), 1);
}

#[test]
fn users_are_isolated_and_clear_removes_history() {
    let store = MemoryStore::open_in_memory(MemoryConfig {
        capacity: 3,
        response_chars: 10,
    })
    .expect("open");
    store.append("a", "qa", "ra", &ts(1)).unwrap();
    store.append("b", "qb", "rb", &ts(2)).unwrap();
    assert!(store.clear("a").unwrap());
    assert!(store.read("a").unwrap().is_none());
    assert_eq!(store.read("b").unwrap().unwrap().records.len(), 1);
}

#[test]
fn concurrent_appends_from_many_users_lose_nothing() {
    let store = Arc::new(MemoryStore::open_in_memory(MemoryConfig::default()).expect("open"));
    let handles: Vec<_> = (0..8)
        .map(|u| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .append(&format!("user-{u}"), &format!("q{i}"), "r", &ts(i))
                        .expect("append");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    for u in 0..8 {
        let mem = store.read(&format!("user-{u}")).unwrap().unwrap();
        assert_eq!(mem.records.len(), 10);
        assert_eq!(mem.records.back().unwrap().query, "q9");
    }
}
