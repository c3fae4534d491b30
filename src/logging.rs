//! File-backed tracing setup.
//!
//! The terminal belongs to the gallery while it runs, so log output only
//! ever goes to a file. Directives come from `APOD_TUI_LOG` first, then the
//! configured `log.filter`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub const LOG_ENV: &str = "APOD_TUI_LOG";
const FALLBACK_FILTER: &str = "info";

/// Installs the global subscriber. Returns the log file path when logging
/// is active; a missing path or an unwritable file leaves logging off.
pub fn init(cfg: &LogConfig) -> Option<PathBuf> {
    let path = cfg.file.clone()?;
    let file = match open_log_file(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            return None;
        }
    };

    let env_directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_directives.as_deref(), &cfg.filter);
    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    match tracing_subscriber::registry().with(filter).with(layer).try_init() {
        Ok(()) => Some(path),
        Err(_) => None,
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Env directives win over the configured ones; anything unparsable falls
/// through to the next source.
fn build_filter(env_directives: Option<&str>, configured: &str) -> EnvFilter {
    if let Some(filter) = env_directives.and_then(|d| EnvFilter::try_new(d).ok()) {
        return filter;
    }
    EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}
