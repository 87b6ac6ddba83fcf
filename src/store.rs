//! Share-thread store: a {question, answer} pair keyed by an opaque id.
//!
//! The store is in-memory only (no persistence by design). Ids are random,
//! URL-safe, and validated before lookup so that a thread id can travel as a
//! bare query-parameter name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Shared thread store: thread id → stored thread.
pub type ThreadStore = Arc<Mutex<HashMap<String, StoredThread>>>;

/// Number of random bytes behind a thread id (12 base64 chars).
const ID_BYTES: usize = 9;

/// A shared conversation turn. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredThread {
    pub question: String,
    pub answer: String,
}

/// Create a new empty ThreadStore.
pub fn new_thread_store() -> ThreadStore {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Generate a random URL-safe thread id.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `id` is shaped like a thread id (URL-safe base64 alphabet).
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Persist a question/answer pair, returning its new id.
pub fn store_thread(store: &ThreadStore, question: String, answer: String) -> String {
    let id = generate_id();
    let thread = StoredThread { question, answer };
    if let Ok(mut guard) = store.lock() {
        guard.insert(id.clone(), thread);
    }
    id
}

/// Look up a stored thread by id.
pub fn load_thread(store: &ThreadStore, id: &str) -> Option<StoredThread> {
    store.lock().ok()?.get(id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load_roundtrip() {
        let store = new_thread_store();
        let id = store_thread(
            &store,
            "feeling adventurous".to_string(),
            "Here's your team!".to_string(),
        );
        let thread = load_thread(&store, &id).expect("thread present");
        assert_eq!(thread.question, "feeling adventurous");
        assert_eq!(thread.answer, "Here's your team!");
    }

    #[test]
    fn test_load_unknown_id_is_none() {
        let store = new_thread_store();
        assert!(load_thread(&store, "nope").is_none());
    }

    #[test]
    fn test_generated_ids_are_url_safe() {
        for _ in 0..50 {
            let id = generate_id();
            assert!(is_valid_id(&id), "invalid id generated: {}", id);
            assert_eq!(id.len(), 12);
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_valid_id_rejects_unsafe_chars() {
        assert!(is_valid_id("abcDEF123_-"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id("slash/attack"));
        assert!(!is_valid_id("q=1"));
        assert!(!is_valid_id("../../etc"));
    }

    #[test]
    fn test_stored_thread_serializes_like_store_api() {
        let thread = StoredThread {
            question: "q".to_string(),
            answer: "a".to_string(),
        };
        let json = serde_json::to_string(&thread).expect("serialize");
        assert!(json.contains("\"question\":\"q\""));
        assert!(json.contains("\"answer\":\"a\""));
        let back: StoredThread = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, thread);
    }

    #[test]
    fn test_threads_are_independent() {
        let store = new_thread_store();
        let id1 = store_thread(&store, "q1".to_string(), "a1".to_string());
        let id2 = store_thread(&store, "q2".to_string(), "a2".to_string());
        assert_ne!(id1, id2);
        assert_eq!(load_thread(&store, &id1).expect("t1").answer, "a1");
        assert_eq!(load_thread(&store, &id2).expect("t2").answer, "a2");
    }
}
