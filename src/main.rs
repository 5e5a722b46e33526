//!
//! sossbox binary
//! --------------
//! Resolves the main tenant in the working folder (or `--root <dir>`), installs
//! logging from its config, discovers sub-tenants and reports what would be
//! mounted. Serving HTTP is left to the embedding application.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use sossbox::config::{self, EnvLookup, TenantConfig};
use sossbox::paths;
use sossbox::Registry;

fn parse_root_arg(args: &[String]) -> Option<PathBuf> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--root" && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        if let Some(v) = args[i].strip_prefix("--root=") {
            return Some(PathBuf::from(v));
        }
        i += 1;
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let root = match parse_root_arg(&args) {
        Some(r) => r,
        None => env::current_dir().context("cannot determine working folder")?,
    };
    let env = EnvLookup::from_process();

    let main_cfg = config::load(&root, TenantConfig::default(), &env, true)
        .await
        .with_context(|| format!("loading {} in '{}'", config::CONFIG_FILE, root.display()))?;
    let logfile = main_cfg.logfile.as_deref().map(|f| paths::resolve_against(&root, f));
    sossbox::logging::init(&main_cfg.loglevel, logfile.as_deref())?;
    info!(target: "sossbox", "sossbox {} starting in '{}'", env!("CARGO_PKG_VERSION"), root.display());

    let registry = Registry::init_with(&root, &env).await.context("tenant discovery failed")?;
    registry.for_each(|t| {
        let cfg = t.config();
        let data = t.data_root().map(|p| p.display().to_string()).unwrap_or_else(|| "storage disabled".to_string());
        let public = t.public_root().map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string());
        info!(
            target: "sossbox",
            "tenant '{}' ({}): {}:{} api='{}' data={} public={}",
            cfg.id, cfg.name, cfg.host, cfg.port, cfg.api, data, public
        );
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_flag_forms() {
        let a: Vec<String> = ["sossbox", "--root", "/srv/site"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_root_arg(&a), Some(PathBuf::from("/srv/site")));
        let b: Vec<String> = ["sossbox", "--root=/srv/x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_root_arg(&b), Some(PathBuf::from("/srv/x")));
        let c: Vec<String> = ["sossbox"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_root_arg(&c), None);
    }
}
