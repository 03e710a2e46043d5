//! Logging utilities
//!
//! Helpers for structured logging with `tracing`. The crate never installs a
//! subscriber; binaries do.

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// RAII guard logging scope entry and exit with elapsed time
///
/// # Example
///
/// ```rust
/// use singlerun_core::logging::LogGuard;
///
/// fn build_everything() {
///     let _guard = LogGuard::new("build_everything");
///     // exit is logged when the guard drops
/// }
/// ```
pub struct LogGuard {
    name: String,
    start: Instant,
    verbose: bool,
}

impl LogGuard {
    /// Guard logging at debug level
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!("Entering: {}", name);
        Self {
            name,
            start: Instant::now(),
            verbose: false,
        }
    }

    /// Guard logging at info level
    pub fn info(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("Starting: {}", name);
        Self {
            name,
            start: Instant::now(),
            verbose: true,
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.start.elapsed());
        if self.verbose {
            info!("Finished: {} in {}", self.name, elapsed);
        } else {
            debug!("Exiting: {} (elapsed: {})", self.name, elapsed);
        }
    }
}

/// Format duration in human-readable form
///
/// ```rust
/// use singlerun_core::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
/// assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
/// assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}
