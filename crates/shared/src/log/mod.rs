// Logging module
// Console logging through the tracing ecosystem, with an optional rolling
// file log next to the generated data. The integer level flag of the C++
// tools maps onto tracing filter directives via `map_log_level`.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_appender::rolling;

/// Translate the numeric console log level of the command line tools into
/// a tracing filter string (0=Minimum, 1=Basic, 2=Detail, 3=Debug, 4=Trace).
pub fn map_log_level(level: i32) -> &'static str {
    match level {
        i32::MIN..=0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Initialize the logging system once, from the binary entry point.
/// `RUST_LOG` overrides the console level when set.
pub fn initialize_logging(log_dir: Option<&str>, console_level: &str, file_name: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level));

    if let Some(dir) = log_dir {
        let path = Path::new(dir);
        if !path.exists() {
            let _ = std::fs::create_dir_all(path);
        }

        let file_appender = rolling::daily(dir, file_name.unwrap_or("assembler.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keep the writer guard alive for the program duration
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .init();
    }
}
