pub mod logging;

pub use logging::{init_stderr_logger, level_from_env, StderrLogger, LOG_ENV};

// Re-export log crate so downstream crates can use spell_base::log::*
pub use log;
