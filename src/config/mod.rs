//!
//! sossbox tenant configuration
//! ----------------------------
//! A tenant's effective configuration is built from three layers: built-in
//! defaults, the tolerant-JSON `sossbox.cfg` in the tenant's base folder, and
//! environment overrides (see `env`). Later layers win field by field.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::io;
use crate::paths;

pub mod env;

pub use env::EnvLookup;

pub const CONFIG_FILE: &str = "sossbox.cfg";
/// Older per-site file name, read for sub-tenants without a `sossbox.cfg`.
pub const SITE_CONFIG_FILE: &str = "site.cfg";
pub const MAIN_TENANT_ID: &str = "sossbox";
pub const DEFAULT_SECRET: &str = "secret";
pub const DEFAULT_SITES_DIR: &str = "sites";

/// Fully resolved tenant configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantConfig {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub host: String,
    pub port: u16,
    /// Token-signing key; consumed by the external auth layer.
    pub secret: String,
    pub registration: bool,
    /// URL mount prefix.
    pub api: String,
    pub public: String,
    pub data: String,
    /// When false the tenant runs without a data root.
    pub storage: bool,
    /// Login of the tenant administrator.
    pub admin: String,
    pub loglevel: String,
    pub logfile: Option<String>,
    /// Sub-tenants folder, relative to this tenant's base folder.
    pub sites: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            id: MAIN_TENANT_ID.to_string(),
            name: "SOSSBox".to_string(),
            domain: None,
            host: "0.0.0.0".to_string(),
            port: 0,
            secret: DEFAULT_SECRET.to_string(),
            registration: true,
            api: "/".to_string(),
            public: "public".to_string(),
            data: "data".to_string(),
            storage: true,
            admin: "admin".to_string(),
            loglevel: "warn".to_string(),
            logfile: Some("sossbox.log".to_string()),
            sites: None,
            extra: Map::new(),
        }
    }
}

/// One override layer. `None` inherits from the layer below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secret: Option<String>,
    pub registration: Option<bool>,
    pub api: Option<String>,
    pub public: Option<String>,
    pub data: Option<String>,
    pub storage: Option<bool>,
    pub admin: Option<String>,
    pub loglevel: Option<String>,
    pub logfile: Option<String>,
    pub sites: Option<String>,
    pub extra: Map<String, Value>,
}

fn invalid_value(source: &str, key: &str, expected: &str, v: &Value) -> AppError {
    AppError::invalid("invalid_config", format!("{}: '{}' expects {}, got {}", source, key, expected, v))
}

fn as_text(source: &str, key: &str, v: &Value) -> AppResult<Option<String>> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(invalid_value(source, key, "a string", v)),
    }
}

fn as_flag(source: &str, key: &str, v: &Value) -> AppResult<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(invalid_value(source, key, "a boolean", v)),
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(invalid_value(source, key, "a boolean", v)),
        },
        _ => Err(invalid_value(source, key, "a boolean", v)),
    }
}

fn as_port(source: &str, key: &str, v: &Value) -> AppResult<Option<u16>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .map(Some)
            .ok_or_else(|| invalid_value(source, key, "a port number", v)),
        Value::String(s) => s.trim().parse::<u16>().map(Some).map_err(|_| invalid_value(source, key, "a port number", v)),
        _ => Err(invalid_value(source, key, "a port number", v)),
    }
}

impl ConfigLayer {
    /// Build a layer from a JSON object. Keys are matched case-insensitively;
    /// `register` and `prefix` are accepted as aliases of `registration` and
    /// `api`. Unknown keys are kept in `extra`.
    pub fn from_map(source: &str, map: &Map<String, Value>) -> AppResult<Self> {
        let mut layer = ConfigLayer::default();
        let mut register_alias: Option<bool> = None;
        let mut prefix_alias: Option<String> = None;
        for (raw_key, v) in map {
            let key = raw_key.to_ascii_lowercase();
            match key.as_str() {
                "id" => layer.id = as_text(source, &key, v)?,
                "name" => layer.name = as_text(source, &key, v)?,
                "domain" => layer.domain = as_text(source, &key, v)?,
                "host" => layer.host = as_text(source, &key, v)?,
                "port" => layer.port = as_port(source, &key, v)?,
                "secret" => layer.secret = as_text(source, &key, v)?,
                "registration" => layer.registration = as_flag(source, &key, v)?,
                "register" => register_alias = as_flag(source, &key, v)?,
                "api" => layer.api = as_text(source, &key, v)?,
                "prefix" => prefix_alias = as_text(source, &key, v)?,
                "public" => layer.public = as_text(source, &key, v)?,
                "data" => layer.data = as_text(source, &key, v)?,
                "storage" => layer.storage = as_flag(source, &key, v)?,
                "admin" => layer.admin = as_text(source, &key, v)?,
                "loglevel" => layer.loglevel = as_text(source, &key, v)?,
                "logfile" => layer.logfile = as_text(source, &key, v)?,
                "sites" => layer.sites = as_text(source, &key, v)?,
                _ => {
                    layer.extra.insert(key.clone(), v.clone());
                }
            }
        }
        if layer.registration.is_none() { layer.registration = register_alias; }
        if layer.api.is_none() { layer.api = prefix_alias; }
        Ok(layer)
    }
}

impl TenantConfig {
    /// Defaults for a sub-tenant discovered in `folder`.
    pub fn tenant_defaults(folder: &str) -> Self { Self { id: folder.to_string(), ..Self::default() } }

    /// Overlay `file` then `env` on top of `defaults`.
    pub fn from_layers(defaults: &TenantConfig, file: &ConfigLayer, env: &ConfigLayer) -> Self {
        fn pick<T: Clone>(env: &Option<T>, file: &Option<T>, base: &T) -> T {
            env.clone().or_else(|| file.clone()).unwrap_or_else(|| base.clone())
        }
        let domain = env.domain.clone().or_else(|| file.domain.clone()).or_else(|| defaults.domain.clone());
        let sites = env.sites.clone().or_else(|| file.sites.clone()).or_else(|| defaults.sites.clone());
        // An explicit empty/"false" logfile disables the file sink.
        let logfile = env
            .logfile
            .clone()
            .or_else(|| file.logfile.clone())
            .or_else(|| defaults.logfile.clone())
            .filter(|s| !s.is_empty() && s != "false");
        let mut extra = defaults.extra.clone();
        for (k, v) in file.extra.iter().chain(env.extra.iter()) {
            extra.insert(k.clone(), v.clone());
        }
        Self {
            id: pick(&env.id, &file.id, &defaults.id),
            name: pick(&env.name, &file.name, &defaults.name),
            domain,
            host: pick(&env.host, &file.host, &defaults.host),
            port: pick(&env.port, &file.port, &defaults.port),
            secret: pick(&env.secret, &file.secret, &defaults.secret),
            registration: pick(&env.registration, &file.registration, &defaults.registration),
            api: pick(&env.api, &file.api, &defaults.api),
            public: pick(&env.public, &file.public, &defaults.public),
            data: pick(&env.data, &file.data, &defaults.data),
            storage: pick(&env.storage, &file.storage, &defaults.storage),
            admin: pick(&env.admin, &file.admin, &defaults.admin),
            loglevel: pick(&env.loglevel, &file.loglevel, &defaults.loglevel),
            logfile,
            sites,
            extra,
        }
    }

    pub fn secret_is_placeholder(&self) -> bool { self.secret == DEFAULT_SECRET || self.secret.is_empty() }
}

async fn read_layer(base: &Path, name: &str) -> AppResult<Option<ConfigLayer>> {
    match io::json_get(base, name).await? {
        None => Ok(None),
        Some(Value::Object(map)) => ConfigLayer::from_map(name, &map).map(Some),
        Some(other) => Err(AppError::parse(
            "invalid_config",
            format!("'{}' must contain a JSON object, found {}", base.join(name).display(), other),
        )),
    }
}

/// Read `sossbox.cfg` from `base` as an override layer. Sub-tenants fall back
/// to `site.cfg`. A missing file is an empty layer.
pub async fn load_file_layer(base: &Path, is_main: bool) -> AppResult<ConfigLayer> {
    if let Some(layer) = read_layer(base, CONFIG_FILE).await? {
        return Ok(layer);
    }
    if !is_main {
        if let Some(layer) = read_layer(base, SITE_CONFIG_FILE).await? {
            debug!(target: "sossbox::config", "config: using '{}' in '{}'", SITE_CONFIG_FILE, base.display());
            return Ok(layer);
        }
    }
    Ok(ConfigLayer::default())
}

/// Resolve a tenant's effective configuration. `main_env` is the main
/// tenant's environment scope; sub-tenants derive their own scope from the id
/// chosen by the file layer (or the folder name).
pub async fn load(base: &Path, defaults: TenantConfig, main_env: &EnvLookup, is_main: bool) -> AppResult<TenantConfig> {
    let file = load_file_layer(base, is_main).await?;
    let id_for_env = file.id.clone().unwrap_or_else(|| defaults.id.clone());
    let env = if is_main { main_env.clone() } else { main_env.for_tenant(&id_for_env) };
    let env_layer = env.layer()?;
    let cfg = TenantConfig::from_layers(&defaults, &file, &env_layer);
    paths::validate_component("tenant id", &cfg.id)?;
    debug!(target: "sossbox::config", "config: tenant '{}' resolved from '{}' (env prefix '{}')", cfg.id, base.display(), env.prefix());
    if cfg.secret_is_placeholder() {
        warn!(target: "sossbox::config", "config: tenant '{}' is using the placeholder secret; set 'secret' in {}", cfg.id, CONFIG_FILE);
    }
    Ok(cfg)
}
