//! Process-wide tracing setup. `RUST_LOG` wins when set; otherwise the main
//! tenant's `loglevel` picks the filter. An optional logfile receives the same
//! events through a non-blocking writer.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Map a configured level word onto an `EnvFilter` directive.
pub fn level_directive(loglevel: &str) -> &'static str {
    match loglevel.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" | "force" => "info",
        "warn" | "warning" => "warn",
        "error" | "fatal" | "true" => "error",
        "false" | "0" | "off" | "none" => "off",
        _ => "warn",
    }
}

pub fn init(loglevel: &str, logfile: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(loglevel)))
        .context("invalid log filter")?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let file_layer = match logfile {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().with_context(|| format!("logfile '{}' has no file name", path.display()))?;
            std::fs::create_dir_all(dir).with_context(|| format!("cannot create log folder '{}'", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("tracing subscriber already installed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_words() {
        assert_eq!(level_directive("debug"), "debug");
        assert_eq!(level_directive("FATAL"), "error");
        assert_eq!(level_directive("force"), "info");
        assert_eq!(level_directive("true"), "error");
        assert_eq!(level_directive("false"), "off");
        assert_eq!(level_directive("0"), "off");
        assert_eq!(level_directive("loud"), "warn");
    }
}
