//! Uploaded binaries under a user's `assets` collection. The payload is stored
//! as `<id>.<ext>` and described by an `AssetMeta` document at `<id>.json`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Store;
use crate::error::{AppError, AppResult};
use crate::io::{self, Encoding};
use crate::paths;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetMeta {
    pub id: String,
    /// Extension of the stored file, without the dot.
    #[serde(rename = "type")]
    pub kind: String,
    /// Stored filename inside the assets collection.
    pub name: String,
    /// Filename as uploaded.
    pub original: String,
    pub size: u64,
    pub mime: String,
    pub uploaded: DateTime<Utc>,
}

fn upload_extension(original: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

impl Store {
    pub async fn user_asset_put(&self, who: &str, original: &str, mime: &str, bytes: &[u8]) -> AppResult<AssetMeta> {
        let folder = self.user_folder(who, Some(paths::ASSETS_COLLECTION))?;
        if !io::folder_exists(&folder).await? {
            return Err(AppError::not_found("user_not_found", format!("user '{}' has no assets collection", who)));
        }
        let id = super::new_uid();
        let kind = upload_extension(original);
        // `<id>.json` is reserved for the metadata document.
        let name = match kind.as_str() {
            "" => id.clone(),
            "json" => format!("{}-upload.json", id),
            ext => format!("{}.{}", id, ext),
        };
        io::file_put(&folder.join(&name), bytes).await?;
        let meta = AssetMeta {
            id: id.clone(),
            kind,
            name,
            original: original.to_string(),
            size: bytes.len() as u64,
            mime: mime.to_string(),
            uploaded: Utc::now(),
        };
        io::json_put(&folder.join(format!("{}.json", id)), &serde_json::to_value(&meta)?).await?;
        info!(target: "sossbox::store", "user_asset_put: '{}' stored as {}/{} ({} bytes)", original, who, meta.name, meta.size);
        Ok(meta)
    }

    pub async fn user_asset_meta(&self, who: &str, id: &str) -> AppResult<Option<AssetMeta>> {
        paths::validate_component("asset id", id)?;
        let folder = self.user_folder(who, Some(paths::ASSETS_COLLECTION))?;
        match io::json_get(&folder, &format!("{}.json", id)).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Metadata and content of an asset.
    pub async fn user_asset_get(&self, who: &str, id: &str) -> AppResult<Option<(AssetMeta, Vec<u8>)>> {
        let Some(meta) = self.user_asset_meta(who, id).await? else { return Ok(None) };
        paths::validate_component("asset name", &meta.name)?;
        let folder = self.user_folder(who, Some(paths::ASSETS_COLLECTION))?;
        match io::file_get(&folder.join(&meta.name), Encoding::Binary).await? {
            Some(content) => Ok(Some((meta, content.into_bytes()))),
            None => Ok(None),
        }
    }

    pub async fn user_asset_delete(&self, who: &str, id: &str) -> AppResult<bool> {
        let Some(meta) = self.user_asset_meta(who, id).await? else { return Ok(false) };
        paths::validate_component("asset name", &meta.name)?;
        let folder = self.user_folder(who, Some(paths::ASSETS_COLLECTION))?;
        let payload = io::file_delete(&folder.join(&meta.name)).await?;
        let described = io::file_delete(&folder.join(format!("{}.json", id))).await?;
        Ok(payload && described)
    }
}
