//!
//! sossbox tenant store
//! --------------------
//! One `Store` per tenant. It owns the tenant's resolved data root and exposes
//! the user identity API (`identity`), per-user document CRUD (`docs`) and
//! binary assets (`assets`). Everything is persisted directly on disk:
//!
//! ```text
//! <data>/users/<uid>/meta.json            {credentials:{hash}, user:{uid,login,...}}
//! <data>/users/<uid>/<collection>/<doc>   JSON document (+ <doc>.json sidecar)
//! <data>/logins/<login>                   symlink -> <data>/users/<uid>
//! ```
//!
//! There is no cache: every call is a round trip to the filesystem. Mutations
//! of the login index are serialized per tenant through `identity_lock`.

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{self, EnvLookup, TenantConfig};
use crate::error::{AppError, AppResult};
use crate::io::{self, Encoding, FileContent};
use crate::paths;

pub mod assets;
pub mod docs;
pub mod identity;

pub use assets::AssetMeta;
pub use identity::{Credentials, UserProfile, UserRecord};

pub const MOTD_FILE: &str = "motd.md";

/// Storage engine for a single tenant.
#[derive(Debug)]
pub struct Store {
    config: TenantConfig,
    /// Absolute tenant base folder (where `sossbox.cfg` lives).
    base: PathBuf,
    /// `None` when the tenant runs storage-disabled.
    data_root: Option<PathBuf>,
    public_root: Option<PathBuf>,
    identity_lock: Mutex<()>,
}

/// Summary served by the external `/status` route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantStatus {
    pub version: String,
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub motd: String,
}

/// Fresh opaque user id.
pub fn new_uid() -> String { uuid::Uuid::new_v4().to_string() }

fn absolute_base(base: &Path) -> PathBuf {
    match base.absolutize() {
        Ok(p) => p.to_path_buf(),
        Err(_) => base.to_path_buf(),
    }
}

impl Store {
    /// Load the tenant's layered configuration from `base` and initialize it.
    pub async fn open(base: &Path, defaults: TenantConfig, env: &EnvLookup, is_main: bool) -> AppResult<Self> {
        let cfg = config::load(base, defaults, env, is_main).await?;
        Ok(Self::init(base, cfg).await)
    }

    /// Resolve the data and public folders and make sure the on-disk layout
    /// exists. Failure to establish the data root leaves the tenant running
    /// storage-disabled instead of failing.
    pub async fn init(base: &Path, config: TenantConfig) -> Self {
        let base = absolute_base(base);

        let public = paths::resolve_against(&base, &config.public);
        let public_root = match io::folder_exists(&public).await {
            Ok(true) => Some(public),
            _ => None,
        };

        let data_root = if config.storage {
            let data = paths::resolve_against(&base, &config.data);
            match Self::ensure_layout(&data).await {
                Ok(()) => {
                    info!(target: "sossbox::store", "Storage ready for '{}' ('{}'): {}", config.name, config.id, data.display());
                    Some(data)
                }
                Err(e) => {
                    warn!(target: "sossbox::store", "tenant '{}': storage disabled, cannot establish '{}': {}", config.id, data.display(), e);
                    None
                }
            }
        } else {
            debug!(target: "sossbox::store", "tenant '{}': storage turned off by config", config.id);
            None
        };

        Self { config, base, data_root, public_root, identity_lock: Mutex::new(()) }
    }

    async fn ensure_layout(data: &Path) -> AppResult<()> {
        if io::folder_create(data).await? {
            info!(target: "sossbox::store", "created storage folder {}", data.display());
        }
        io::folder_create(&paths::users_dir(data)).await?;
        io::folder_create(&paths::logins_dir(data)).await?;
        io::folder_create(&paths::staging_dir(data)).await?;
        if !io::folder_exists(data).await? {
            return Err(AppError::io("storage_unavailable", format!("'{}' is not a folder", data.display())));
        }
        Ok(())
    }

    pub fn id(&self) -> &str { &self.config.id }
    pub fn name(&self) -> &str { &self.config.name }
    pub fn config(&self) -> &TenantConfig { &self.config }
    pub fn base_path(&self) -> &Path { &self.base }
    pub fn data_root(&self) -> Option<&Path> { self.data_root.as_deref() }
    pub fn public_root(&self) -> Option<&Path> { self.public_root.as_deref() }
    pub fn storage_enabled(&self) -> bool { self.data_root.is_some() }

    /// Data root or `Unavailable` for a storage-disabled tenant.
    pub(crate) fn data(&self) -> AppResult<&Path> {
        self.data_root
            .as_deref()
            .ok_or_else(|| AppError::unavailable("storage_disabled", format!("tenant '{}' has no data storage", self.config.id)))
    }

    /// `<data>/users/<uid>[/<collection>]`, validated and contained.
    pub(crate) fn user_folder(&self, uid: &str, collection: Option<&str>) -> AppResult<PathBuf> {
        let data = self.data()?;
        let uid = paths::normalized_component("uid", uid)?;
        let mut rel = PathBuf::from(paths::USERS_DIR).join(uid);
        if let Some(c) = collection {
            paths::validate_component("collection", c)?;
            rel.push(c);
        }
        paths::contained_join(data, &rel)
    }

    fn root_folder(&self, folder: &str) -> AppResult<PathBuf> {
        let data = self.data()?;
        paths::validate_relative(folder)?;
        paths::contained_join(data, Path::new(folder))
    }

    /// Entries of a folder under the data root (`""` is the root itself).
    pub async fn folder_get(&self, folder: &str) -> AppResult<Option<Vec<String>>> {
        io::folder_get(&self.root_folder(folder)?).await
    }

    pub async fn file_get(&self, folder: &str, name: &str, encoding: Encoding) -> AppResult<Option<FileContent>> {
        paths::validate_component("file name", name)?;
        io::file_get(&self.root_folder(folder)?.join(name), encoding).await
    }

    pub async fn doc_get(&self, folder: &str, name: &str) -> AppResult<Option<Value>> {
        paths::validate_component("document id", name)?;
        io::json_get(&self.root_folder(folder)?, name).await
    }

    pub fn is_admin(&self, login: &str) -> bool { !login.is_empty() && paths::normalize_nfc(login) == paths::normalize_nfc(&self.config.admin) }

    /// Tenant summary with the data-root `motd.md` (empty when absent or when
    /// storage is disabled).
    pub async fn status(&self, version: &str) -> AppResult<TenantStatus> {
        let motd = if self.storage_enabled() {
            match self.file_get("", MOTD_FILE, Encoding::Utf8).await? {
                Some(FileContent::Text(t)) => t,
                _ => String::new(),
            }
        } else {
            String::new()
        };
        Ok(TenantStatus {
            version: version.to_string(),
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            domain: self.config.domain.clone(),
            motd,
        })
    }
}
