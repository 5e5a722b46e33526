//! Environment overrides for tenant configuration.
//!
//! The main tenant reads `<PREFIX><FIELD>` and falls back to the bare
//! `<FIELD>` so hosting conventions like a plain `PORT` keep working.
//! Sub-tenants read `<PREFIX><TENANTID>_<FIELD>` only. Only the numeric and
//! boolean fields are coerced; textual fields keep the raw value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::ConfigLayer;
use crate::error::AppResult;

pub const DEFAULT_PREFIX: &str = "SOSSBOX_";

/// Field names consulted in the environment, in the order they are applied.
pub const ENV_FIELDS: [&str; 15] = [
    "id", "name", "domain", "host", "port", "secret", "registration", "api", "public", "data", "storage", "admin",
    "loglevel", "logfile", "sites",
];

/// Fields whose raw values go through `coerce`.
pub const TYPED_FIELDS: [&str; 3] = ["port", "registration", "storage"];

/// Smart typing for environment strings: booleans and whole integers are
/// converted, anything else stays a string.
pub fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    Value::String(raw.to_string())
}

/// Upper-case a tenant id and replace anything outside `[A-Z0-9]` with `_`.
pub fn tenant_token(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Where variables are read from. `Fixed` snapshots keep tenant resolution
/// independent of the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Process,
    Fixed(Arc<BTreeMap<String, String>>),
}

impl EnvSource {
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(vars) => vars.get(key).cloned(),
        }
    }
}

/// Resolves environment keys for one tenant scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLookup {
    prefix: String,
    bare_fallback: bool,
    source: EnvSource,
}

impl EnvLookup {
    /// Main-tenant scope; the prefix may itself be chosen through
    /// `SOSSBOX_PREFIX` or `PREFIX`.
    pub fn from_process() -> Self { Self::resolve(EnvSource::Process) }

    /// Main-tenant scope over a fixed set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: BTreeMap<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::resolve(EnvSource::Fixed(Arc::new(map)))
    }

    fn resolve(source: EnvSource) -> Self {
        let prefix = non_empty(source.get("SOSSBOX_PREFIX"))
            .or_else(|| non_empty(source.get("PREFIX")))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        Self { prefix, bare_fallback: true, source }
    }

    /// Scope for a sub-tenant: `<PREFIX><TENANTID>_`, no bare fallback.
    pub fn for_tenant(&self, id: &str) -> Self {
        Self { prefix: format!("{}{}_", self.prefix, tenant_token(id)), bare_fallback: false, source: self.source.clone() }
    }

    pub fn prefix(&self) -> &str { &self.prefix }

    pub fn has_bare_fallback(&self) -> bool { self.bare_fallback }

    pub fn key_for(&self, field: &str) -> String { format!("{}{}", self.prefix, field.to_ascii_uppercase()) }

    /// Collect the coerced overrides visible in this scope.
    pub fn values(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for field in ENV_FIELDS {
            let mut raw = non_empty(self.source.get(&self.key_for(field)));
            if raw.is_none() && self.bare_fallback {
                raw = non_empty(self.source.get(&field.to_ascii_uppercase()));
            }
            if let Some(raw) = raw {
                let value = if TYPED_FIELDS.contains(&field) { coerce(&raw) } else { Value::String(raw) };
                out.insert(field.to_string(), value);
            }
        }
        out
    }

    pub fn layer(&self) -> AppResult<ConfigLayer> { ConfigLayer::from_map("environment", &self.values()) }
}

fn non_empty(v: Option<String>) -> Option<String> { v.filter(|s| !s.is_empty()) }
