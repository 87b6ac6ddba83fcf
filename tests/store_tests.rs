//! External tests for the share-thread store — id shape, persistence
//! semantics, and the JSON body shape used by the store routes.

use pokemood::store::*;

#[test]
fn test_roundtrip_preserves_pair() {
    let store = new_thread_store();
    let id = store_thread(
        &store,
        "grumpy but hopeful".to_string(),
        "Here's a team for that.".to_string(),
    );
    let thread = load_thread(&store, &id).expect("thread");
    assert_eq!(thread.question, "grumpy but hopeful");
    assert_eq!(thread.answer, "Here's a team for that.");
}

#[test]
fn test_ids_are_opaque_and_url_safe() {
    let store = new_thread_store();
    let mut ids = std::collections::HashSet::new();
    for i in 0..100 {
        let id = store_thread(&store, format!("q{}", i), format!("a{}", i));
        assert!(is_valid_id(&id));
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        ids.insert(id);
    }
    assert_eq!(ids.len(), 100, "ids must not collide in practice");
}

#[test]
fn test_stored_thread_is_read_only_snapshot() {
    let store = new_thread_store();
    let id = store_thread(&store, "q".to_string(), "a".to_string());

    let mut first = load_thread(&store, &id).expect("thread");
    first.answer.push_str(" mutated");

    // mutating the returned copy never touches the stored record
    let second = load_thread(&store, &id).expect("thread");
    assert_eq!(second.answer, "a");
}

#[test]
fn test_request_body_shape_matches_page_script() {
    // the page posts {"question": ..., "answer": ...}
    let body = r##"{"question":"my mood","answer":"# Team"}"##;
    let thread: StoredThread = serde_json::from_str(body).expect("deserialize");
    assert_eq!(thread.question, "my mood");
    assert_eq!(thread.answer, "# Team");
}

#[test]
fn test_unknown_and_malformed_ids_miss() {
    let store = new_thread_store();
    store_thread(&store, "q".to_string(), "a".to_string());
    assert!(load_thread(&store, "AAAAAAAAAAAA").is_none());
    assert!(!is_valid_id("not/valid"));
    assert!(!is_valid_id(""));
}
