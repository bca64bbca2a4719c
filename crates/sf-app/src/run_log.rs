//! Per-run log file.
//!
//! A run gets its own `tracing` dispatcher writing to `xp_files/run.log`,
//! optionally mirrored to stderr. The dispatcher is the thread default only
//! while the guard returned by [`RunLog::enter`] is alive.

use crate::error::AppResult;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

pub struct RunLog {
    path: PathBuf,
    dispatch: Dispatch,
}

impl RunLog {
    /// Open (append) the log at `path`. `console` mirrors events at that
    /// level to stderr.
    pub fn open(path: &Path, console: Option<LevelFilter>) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::DEBUG);
        let console_layer = console.map(|level| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(level)
        });

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer);

        Ok(Self {
            path: path.to_path_buf(),
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make this log the current thread's default until the guard drops.
    pub fn enter(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }
}
