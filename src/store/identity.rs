//! User identity: metadata records keyed by uid plus the symlink login index.
//!
//! `users/<uid>/meta.json` is the only copy of a user record. `logins/<login>`
//! is a directory symlink into `users/<uid>`, so lookup by login and lookup by
//! uid read the same file. Every index mutation runs under the tenant's
//! identity lock, and symlink creation itself fails if the entry already
//! exists.

use std::path::{Path, PathBuf};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::Store;
use crate::error::{AppError, AppResult};
use crate::io;
use crate::paths;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    pub fn from_hash(hash: impl Into<String>) -> Self { Self { hash: hash.into(), extra: Map::new() } }

    /// Argon2 PHC hash of `password` with a random salt.
    pub fn from_password(password: &str) -> AppResult<Self> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("salt", e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("salt", e.to_string()))?;
        let phc = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal("hash", e.to_string()))?
            .to_string();
        Ok(Self::from_hash(phc))
    }

    /// PHC hashes are verified with Argon2; anything else is a caller-supplied
    /// digest and must match verbatim.
    pub fn verify(&self, secret: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok(),
            Err(_) => !self.hash.is_empty() && self.hash == secret,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub uid: String,
    pub login: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>, login: impl Into<String>) -> Self {
        Self { uid: uid.into(), login: login.into(), fields: Map::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub credentials: Credentials,
    pub user: UserProfile,
}

impl Store {
    /// True if `logins/<name>` exists (even as a dangling link).
    pub async fn login_exists(&self, name: &str) -> AppResult<bool> {
        let data = self.data()?;
        let login = paths::normalized_component("login", name)?;
        io::link_exists(&paths::login_entry(data, &login)).await
    }

    /// Create a user and its login index entry. Returns `Ok(None)` without
    /// touching anything when the login is already taken.
    ///
    /// The tree is assembled in a hidden staging folder, the login link is
    /// secured next, and only then is the staging folder renamed into place.
    /// Any failure unwinds the earlier steps.
    pub async fn user_create(&self, credentials: Credentials, user: UserProfile) -> AppResult<Option<UserRecord>> {
        let data = self.data()?.to_path_buf();
        let uid = paths::normalized_component("uid", &user.uid)?;
        let login = paths::normalized_component("login", &user.login)?;
        let record = UserRecord { credentials, user: UserProfile { uid: uid.clone(), login: login.clone(), fields: user.fields } };

        let _guard = self.identity_lock.lock().await;
        let link = paths::login_entry(&data, &login);
        if io::link_exists(&link).await? {
            debug!(target: "sossbox::store", "user_create: login '{}' already exists in '{}'", login, self.id());
            return Ok(None);
        }
        let home = paths::user_dir(&data, &uid);
        if io::link_exists(&home).await? {
            return Err(AppError::conflict("uid_taken", format!("user '{}' already exists", uid)));
        }

        let staging = paths::user_staging_dir(&data, &uid);
        io::folder_delete(&staging).await?;
        if let Err(e) = Self::build_user_tree(&staging, &record).await {
            Self::discard(&staging, None).await;
            return Err(e);
        }
        match io::sym_link(&home, &link).await {
            Ok(()) => {}
            Err(AppError::Conflict { .. }) => {
                Self::discard(&staging, None).await;
                return Ok(None);
            }
            Err(e) => {
                Self::discard(&staging, None).await;
                return Err(e);
            }
        }
        if let Err(e) = tokio::fs::rename(&staging, &home).await {
            error!(target: "sossbox::store", "user_create: commit of '{}' failed: {}", home.display(), e);
            Self::discard(&staging, Some(&link)).await;
            return Err(e.into());
        }
        info!(target: "sossbox::store", "user_create: '{}' ({}) in tenant '{}'", login, uid, self.id());
        Ok(Some(record))
    }

    async fn build_user_tree(root: &Path, record: &UserRecord) -> AppResult<()> {
        io::folder_create(root).await?;
        for c in paths::USER_COLLECTIONS {
            io::folder_create(&root.join(c)).await?;
        }
        io::json_put(&root.join(paths::USER_META), &serde_json::to_value(record)?).await
    }

    async fn discard(staging: &Path, link: Option<&Path>) {
        if let Some(link) = link {
            Self::discard_link(link).await;
        }
        if let Err(e) = io::folder_delete(staging).await {
            warn!(target: "sossbox::store", "rollback: cannot remove '{}': {}", staging.display(), e);
        }
    }

    async fn read_record(folder: &Path) -> AppResult<Option<UserRecord>> {
        match io::json_get(folder, paths::USER_META).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub async fn user_by_uid(&self, uid: &str) -> AppResult<Option<UserRecord>> {
        Self::read_record(&self.user_folder(uid, None)?).await
    }

    /// Follows `logins/<name>` into the user's folder.
    pub async fn user_by_login(&self, name: &str) -> AppResult<Option<UserRecord>> {
        let data = self.data()?;
        let login = paths::normalized_component("login", name)?;
        Self::read_record(&paths::login_entry(data, &login)).await
    }

    /// Look up `login` and check `secret` against the stored credentials.
    pub async fn user_authenticate(&self, login: &str, secret: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.user_by_login(login).await?.filter(|r| r.credentials.verify(secret)))
    }

    async fn link_points_to(link: &Path, home: &Path) -> AppResult<bool> {
        let Some(target) = io::read_link(link).await? else { return Ok(false) };
        let target = if target.is_absolute() {
            target
        } else {
            link.parent().map(|p| p.join(&target)).unwrap_or(target)
        };
        let resolved: PathBuf = match target.absolutize() {
            Ok(p) => p.to_path_buf(),
            Err(_) => target.clone(),
        };
        Ok(resolved == home)
    }

    /// Remove the login entry, the fixed sub-collections and the user's
    /// folder. `false` if the user does not exist or any step removed nothing.
    pub async fn user_delete(&self, uid: &str) -> AppResult<bool> {
        let home = self.user_folder(uid, None)?;
        let data = self.data()?;
        let _guard = self.identity_lock.lock().await;
        let Some(record) = Self::read_record(&home).await? else { return Ok(false) };

        let link = paths::login_entry(data, &record.user.login);
        let unlinked = if Self::link_points_to(&link, &home).await? {
            io::sym_unlink(&link).await?
        } else {
            warn!(target: "sossbox::store", "user_delete: login '{}' does not point at '{}'", record.user.login, home.display());
            false
        };
        let mut collections = true;
        for c in paths::USER_COLLECTIONS {
            collections &= io::folder_delete(&home.join(c)).await?;
        }
        let top = io::folder_delete(&home).await?;
        info!(target: "sossbox::store", "user_delete: '{}' ({}) from tenant '{}'", record.user.login, record.user.uid, self.id());
        Ok(unlinked && collections && top)
    }

    /// Shallow-merge `fields` into the stored profile. `uid` is immutable; a
    /// new `login` moves the index entry. `Ok(None)` if the user is unknown.
    pub async fn user_update(&self, uid: &str, fields: Map<String, Value>) -> AppResult<Option<UserRecord>> {
        let home = self.user_folder(uid, None)?;
        let data = self.data()?;
        let _guard = self.identity_lock.lock().await;
        let Some(mut record) = Self::read_record(&home).await? else { return Ok(None) };

        if let Some(v) = fields.get("uid") {
            if v.as_str() != Some(record.user.uid.as_str()) {
                return Err(AppError::invalid("uid_immutable", format!("uid of '{}' cannot be changed", record.user.uid)));
            }
        }
        let new_login = match fields.get("login") {
            None => None,
            Some(Value::String(s)) => Some(paths::normalized_component("login", s)?),
            Some(other) => return Err(AppError::invalid("invalid_login", format!("login must be a string, got {}", other))),
        };
        let old_login = record.user.login.clone();
        let moved = new_login.filter(|l| *l != old_login);

        for (k, v) in fields {
            if k != "uid" && k != "login" {
                record.user.fields.insert(k, v);
            }
        }
        if let Some(l) = &moved {
            match io::sym_link(&home, &paths::login_entry(data, l)).await {
                Ok(()) => {}
                Err(AppError::Conflict { .. }) => {
                    return Err(AppError::conflict("login_taken", format!("login '{}' already exists", l)));
                }
                Err(e) => return Err(e),
            }
            record.user.login = l.clone();
        }
        if let Err(e) = io::json_put(&home.join(paths::USER_META), &serde_json::to_value(&record)?).await {
            if let Some(l) = &moved {
                Self::discard_link(&paths::login_entry(data, l)).await;
            }
            return Err(e);
        }
        if moved.is_some() {
            let old = paths::login_entry(data, &old_login);
            if Self::link_points_to(&old, &home).await? {
                io::sym_unlink(&old).await?;
            }
            info!(target: "sossbox::store", "user_update: login '{}' -> '{}' ({})", old_login, record.user.login, record.user.uid);
        }
        Ok(Some(record))
    }

    async fn discard_link(link: &Path) {
        if let Err(e) = io::sym_unlink(link).await {
            warn!(target: "sossbox::store", "rollback: cannot remove '{}': {}", link.display(), e);
        }
    }
}
