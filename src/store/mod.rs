//! Keyed document store the session resolver reads from and merges into.
//!
//! Documents are JSON objects addressed by slash paths (`sessions/123456`,
//! `users/u1/games/g1`). Merge patches use dotted field paths, so
//! `{"participants.u2": true}` sets one nested flag without touching siblings.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store failure: {0}")]
    Backend(String),

    #[error("document at {path} is not a JSON object")]
    NotAnObject { path: String },

    #[error("patch field '{field}' collides with a non-object value at {path}")]
    PatchConflict { path: String, field: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("document encoding: {e}"))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// Creates the document if missing, then applies each dotted-path field.
    async fn merge(&self, path: &str, patch: &Document) -> Result<(), StoreError>;

    /// Replaces the whole document.
    async fn put(&self, path: &str, document: Document) -> Result<(), StoreError>;
}

/// Applies a dotted-path patch in place. Intermediate objects are created as needed.
pub fn apply_merge(path: &str, target: &mut Document, patch: &Document) -> Result<(), StoreError> {
    for (field, value) in patch {
        let mut segments = field.split('.').peekable();
        let mut node = &mut *target;

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.insert(segment.to_string(), value.clone());
                break;
            }
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match child {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::PatchConflict {
                        path: path.to_string(),
                        field: field.clone(),
                    })
                }
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn dotted_field_sets_nested_flag() {
        let mut target = doc(json!({ "name": "vs Tigers", "participants": { "u1": true } }));
        apply_merge("g", &mut target, &doc(json!({ "participants.u2": true }))).unwrap();
        assert_eq!(
            Value::Object(target),
            json!({ "name": "vs Tigers", "participants": { "u1": true, "u2": true } })
        );
    }

    #[test]
    fn merge_creates_missing_parents() {
        let mut target = Document::new();
        apply_merge("g", &mut target, &doc(json!({ "a.b.c": 1 }))).unwrap();
        assert_eq!(Value::Object(target), json!({ "a": { "b": { "c": 1 } } }));
    }

    #[test]
    fn merge_is_idempotent() {
        let patch = doc(json!({ "participants.u2": true }));
        let mut once = Document::new();
        apply_merge("g", &mut once, &patch).unwrap();
        let mut twice = once.clone();
        apply_merge("g", &mut twice, &patch).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn scalar_in_the_way_is_a_conflict() {
        let mut target = doc(json!({ "participants": "nobody" }));
        let err = apply_merge("g", &mut target, &doc(json!({ "participants.u2": true }))).unwrap_err();
        assert!(matches!(err, StoreError::PatchConflict { .. }));
    }
}
