// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Logging bootstrap
//!
//! Env-filtered `tracing` output to stderr, optionally teed to a rolling
//! file when `LOG_FILE` is set. The returned guard must be held for the
//! process lifetime or buffered file lines are lost.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the global subscriber. Returns the file writer guard when a
/// log file is configured.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let filter: EnvFilter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_file {
        Some(path) => {
            let directory: &Path = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name: &str = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("troczen-daemon.log");

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Some(guard)
        }
        None if config.production => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .compact()
                .init();
            None
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
