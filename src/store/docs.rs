//! Per-user document CRUD. `who` is a uid, `where` a collection name and
//! `which` a document id; each document is one file.

use serde_json::{Map, Value};
use tracing::debug;

use super::Store;
use crate::error::{AppError, AppResult};
use crate::io::{self, Sidecar};
use crate::paths;

impl Store {
    fn doc_path(&self, who: &str, collection: &str, which: &str) -> AppResult<std::path::PathBuf> {
        paths::validate_component("document id", which)?;
        Ok(self.user_folder(who, Some(collection))?.join(which))
    }

    /// Names of a user's collections (sub-folders plus `meta.json`).
    pub async fn user_collections(&self, who: &str) -> AppResult<Option<Vec<String>>> {
        io::folder_get(&self.user_folder(who, None)?).await
    }

    pub async fn user_list_docs(&self, who: &str, collection: &str) -> AppResult<Option<Vec<String>>> {
        io::folder_get(&self.user_folder(who, Some(collection))?).await
    }

    pub async fn user_doc_get(&self, who: &str, collection: &str, which: &str) -> AppResult<Option<Value>> {
        paths::validate_component("document id", which)?;
        io::json_get(&self.user_folder(who, Some(collection))?, which).await
    }

    /// Writes the document; an existing id is overwritten.
    pub async fn user_doc_create(&self, who: &str, collection: &str, which: &str, payload: &Value) -> AppResult<Option<Sidecar>> {
        let path = self.doc_path(who, collection, which)?;
        debug!(target: "sossbox::store", "user_doc_create: {}/{}/{}", who, collection, which);
        io::file_put(&path, &serde_json::to_vec(payload)?).await
    }

    pub async fn user_doc_replace(&self, who: &str, collection: &str, which: &str, payload: &Value) -> AppResult<Option<Sidecar>> {
        let path = self.doc_path(who, collection, which)?;
        debug!(target: "sossbox::store", "user_doc_replace: {}/{}/{}", who, collection, which);
        io::file_put(&path, &serde_json::to_vec(payload)?).await
    }

    /// Shallow merge: top-level keys of `updates` replace those stored, nested
    /// objects included. Returns the merged document.
    pub async fn user_doc_update(&self, who: &str, collection: &str, which: &str, updates: &Map<String, Value>) -> AppResult<Value> {
        let path = self.doc_path(who, collection, which)?;
        let folder = self.user_folder(who, Some(collection))?;
        let current = io::json_get(&folder, which)
            .await?
            .ok_or_else(|| AppError::not_found("doc_not_found", format!("document '{}/{}/{}' does not exist", who, collection, which)))?;
        let Value::Object(mut merged) = current else {
            return Err(AppError::invalid("not_an_object", format!("document '{}/{}/{}' is not a JSON object", who, collection, which)));
        };
        for (k, v) in updates {
            merged.insert(k.clone(), v.clone());
        }
        let merged = Value::Object(merged);
        io::file_put(&path, &serde_json::to_vec(&merged)?).await?;
        Ok(merged)
    }

    /// Removes the document and, for non-JSON ids, its sidecar.
    pub async fn user_doc_delete(&self, who: &str, collection: &str, which: &str) -> AppResult<bool> {
        let path = self.doc_path(who, collection, which)?;
        let removed = io::file_delete(&path).await?;
        if let Some(side) = io::sidecar_path(&path) {
            io::file_delete(&side).await?;
        }
        Ok(removed)
    }
}
