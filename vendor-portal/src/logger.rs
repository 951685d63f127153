//! Logging setup
//!
//! Console output by default; with a log directory, a daily rolling file
//! instead.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// `level` accepts a plain level (`debug`) or a full filter directive
/// (`vendor_portal=debug,portal_client=info`). An unusable `log_dir` falls
/// back to the console.
pub fn init_logger(level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        if std::fs::create_dir_all(dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(dir, "vendor-portal");
            subscriber.with_ansi(false).with_writer(file_appender).init();
            return;
        }
        eprintln!("Log directory {} is not writable, logging to console", dir.display());
    }

    subscriber.init();
}
