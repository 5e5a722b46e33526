//!
//! sossbox tenant registry
//! -----------------------
//! Built once at startup: the main tenant lives in the working folder, and
//! each immediate sub-folder of the sub-tenants directory becomes its own
//! tenant. A sub-tenant that fails to load is logged and skipped. The
//! registry is read-only afterwards and is handed by reference to whatever
//! mounts listeners and routes.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tracing::{debug, info, warn};

use crate::config::{EnvLookup, TenantConfig, DEFAULT_SITES_DIR};
use crate::error::AppResult;
use crate::io;
use crate::paths;
use crate::store::Store;

/// Insertion-ordered id -> tenant map. The main tenant is always first.
#[derive(Debug)]
pub struct Registry {
    tenants: Vec<Arc<Store>>,
    index: HashMap<String, usize>,
    sites_dir: Option<PathBuf>,
}

impl Registry {
    /// Discover tenants under `root` using the process environment.
    pub async fn init(root: &Path) -> AppResult<Self> { Self::init_with(root, &EnvLookup::from_process()).await }

    pub async fn init_with(root: &Path, env: &EnvLookup) -> AppResult<Self> {
        let main = Store::open(root, TenantConfig::default(), env, true).await?;
        let sites_dir = Self::resolve_sites_dir(&main).await;
        let mut reg = Self { tenants: Vec::new(), index: HashMap::new(), sites_dir: sites_dir.clone() };
        reg.insert(main);

        if let Some(dir) = sites_dir {
            reg.load_sites(&dir, env).await;
        }
        info!(target: "sossbox::registry", "registry ready: {} tenant(s) [{}]", reg.len(), reg.ids().collect::<Vec<_>>().join(", "));
        Ok(reg)
    }

    /// Configured `sites` folder, else a conventional `sites` folder when one
    /// exists next to the main config.
    async fn resolve_sites_dir(main: &Store) -> Option<PathBuf> {
        if let Some(sites) = &main.config().sites {
            return Some(paths::resolve_against(main.base_path(), sites));
        }
        let conventional = main.base_path().join(DEFAULT_SITES_DIR);
        match io::folder_exists(&conventional).await {
            Ok(true) => Some(conventional),
            _ => None,
        }
    }

    async fn load_sites(&mut self, dir: &Path, env: &EnvLookup) {
        let names = match io::folder_get(dir).await {
            Ok(Some(names)) => names,
            Ok(None) => {
                warn!(target: "sossbox::registry", "sub-tenants folder '{}' does not exist", dir.display());
                return;
            }
            Err(e) => {
                warn!(target: "sossbox::registry", "cannot list sub-tenants folder '{}': {}", dir.display(), e);
                return;
            }
        };
        for name in names {
            if name.starts_with('.') {
                continue;
            }
            let base = dir.join(&name);
            if !matches!(io::folder_exists(&base).await, Ok(true)) {
                debug!(target: "sossbox::registry", "skipping non-folder '{}'", base.display());
                continue;
            }
            match Store::open(&base, TenantConfig::tenant_defaults(&name), env, false).await {
                Ok(store) => {
                    if self.index.contains_key(store.id()) {
                        warn!(target: "sossbox::registry", "tenant id '{}' from '{}' is already registered; skipped", store.id(), base.display());
                        continue;
                    }
                    self.insert(store);
                }
                Err(e) => {
                    warn!(target: "sossbox::registry", "tenant in '{}' failed to initialize and was skipped: {}", base.display(), e);
                }
            }
        }
    }

    fn insert(&mut self, store: Store) {
        self.index.insert(store.id().to_string(), self.tenants.len());
        self.tenants.push(Arc::new(store));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Store>> { self.index.get(id).map(|&i| self.tenants[i].clone()) }

    /// The tenant rooted at the working folder.
    pub fn main(&self) -> &Arc<Store> { &self.tenants[0] }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ { self.tenants.iter().map(|t| t.id()) }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Store>> + '_ { self.tenants.iter() }

    pub fn for_each<F: FnMut(&Arc<Store>)>(&self, f: F) { self.tenants.iter().for_each(f) }

    /// Await `f` for each tenant in order, one at a time.
    pub async fn for_each_async<F, Fut>(&self, mut f: F)
    where
        F: FnMut(Arc<Store>) -> Fut,
        Fut: Future<Output = ()>,
    {
        for t in &self.tenants {
            f(t.clone()).await;
        }
    }

    pub fn stream(&self) -> impl Stream<Item = Arc<Store>> + '_ { stream::iter(self.tenants.iter().cloned()) }

    pub fn len(&self) -> usize { self.tenants.len() }

    pub fn is_empty(&self) -> bool { self.tenants.is_empty() }

    pub fn sites_dir(&self) -> Option<&Path> { self.sites_dir.as_deref() }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
