mod common;

use std::fs;

use common::*;
use lex_ai::index::IndexStore;
use lex_core::config::AppConfig;
use lex_core::error::codes;
use pretty_assertions::assert_eq;

const BUILT_AT: &str = "2026-02-10T00:00:00Z";

fn saved_store() -> (tempfile::TempDir, IndexStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().join("index"));
    store
        .save(&knowledge_base(), "hash-embedder", AppConfig::default().chunking, BUILT_AT)
        .expect("save");
    (dir, store)
}

#[test]
fn empty_directory_reports_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path().to_path_buf());
    assert!(!store.status().unwrap().ready);
    assert_eq!(store.load().unwrap_err().code, codes::INDEX_UNAVAILABLE);
}

#[test]
fn save_then_load_preserves_lockstep() {
    let (_dir, store) = saved_store();
    let original = knowledge_base();

    let status = store.status().unwrap();
    assert!(status.ready);
    assert_eq!(status.model.as_deref(), Some("hash-embedder"));
    assert_eq!(status.chunk_count as usize, original.chunks().len());
    assert_eq!(status.article_count, 4);
    assert_eq!(status.updated_at.as_deref(), Some(BUILT_AT));

    let (loaded, _) = store.load().expect("load");
    assert_eq!(loaded.chunks(), original.chunks());
    assert_eq!(loaded.index(), original.index());
    assert_eq!(loaded.corpus().text(), sample_corpus());
    assert!(!store.root().join("chunks.tmp").exists());
}

#[test]
fn tampered_chunk_text_is_unavailable() {
    let (_dir, store) = saved_store();
    let path = store.root().join("chunks.json");
    let raw = fs::read_to_string(&path).unwrap();
    fs::write(&path, raw.replacen("потребителя", "покупателя", 1)).unwrap();

    assert_eq!(store.load().unwrap_err().code, codes::INDEX_UNAVAILABLE);
}

#[test]
fn vectors_out_of_lockstep_are_unavailable() {
    let (_dir, store) = saved_store();
    let path = store.root().join("vectors.json");
    let mut vectors: Vec<Vec<f32>> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    vectors.pop();
    fs::write(&path, serde_json::to_string(&vectors).unwrap()).unwrap();

    assert_eq!(store.load().unwrap_err().code, codes::INDEX_UNAVAILABLE);
}

#[test]
fn missing_or_garbled_files_are_unavailable() {
    let (_dir, store) = saved_store();
    fs::write(store.root().join("vectors.json"), b"{not json").unwrap();
    assert_eq!(store.load().unwrap_err().code, codes::INDEX_UNAVAILABLE);

    fs::remove_file(store.root().join("corpus.txt")).unwrap();
    assert_eq!(store.load().unwrap_err().code, codes::INDEX_UNAVAILABLE);
}
