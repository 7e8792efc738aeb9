use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Logger};

/// Builds the root logger: JSON lines on stderr, written from a
/// background thread.
pub fn initialize_logger() -> Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("name" => info::NAME, "version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// Routes `RUST_LOG`-filtered output through `slog-scope` instead of the
/// JSON drain. The returned guard must be kept alive.
#[cfg(feature = "env_logging")]
pub fn initialize_env_logger() -> slog_scope::GlobalLoggerGuard {
    slog_envlogger::init().expect("initialize slog-envlogger")
}

/// A logger that drops every record.
pub fn null_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}
