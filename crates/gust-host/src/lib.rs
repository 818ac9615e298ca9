//! Host-side glue around `gust-core`.
//!
//! Everything here is the thin part of the system: log file bootstrap, the
//! persisted debug preference, and the periodic background check the host's
//! scheduler drives. The update logic itself lives entirely in `gust-core`.

pub mod logging;
pub mod paths;
pub mod prefs;
pub mod schedule;

pub use logging::{init_logging, set_logging_enabled};
pub use paths::AppPaths;
pub use prefs::{Prefs, PrefsError};
pub use schedule::{RECOMMENDED_MIN_INTERVAL, log_rate_limit, run_periodic_checks};
