use log::{LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable that overrides the default log level.
pub const LOG_ENV: &str = "SPELLGEN_LOG";

/// A logger that writes one line per record to stderr.
///
/// Stdout stays reserved for generated spells so the interactive front end
/// can be piped without log noise.
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        StderrLogger { level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", line).ok();
    }

    fn flush(&self) {
        std::io::stderr().flush().ok();
    }
}

/// Render a record as `timestamp [LEVEL] [thread:..] target file:line - message`.
pub fn format_record(record: &Record) -> String {
    let timestamp = format_timestamp();
    let thread_id = std::thread::current().id();
    let file = record.file().unwrap_or("unknown");
    let line = record.line().unwrap_or(0);
    format!(
        "{} [{}] [thread:{:?}] {} {}:{} - {}",
        timestamp,
        record.level(),
        thread_id,
        record.target(),
        file,
        line,
        record.args()
    )
}

/// Format current time as YYYY-MM-DDTHH:MM:SS (UTC)
pub fn format_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (year, month, day) = civil_from_days((secs / 86400) as i64);
    let time_of_day = secs % 86400;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Days since the Unix epoch to (year, month, day).
/// Howard Hinnant's civil_from_days.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe as i64 + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

/// Resolve the max level from `SPELLGEN_LOG`.
///
/// Accepts the `log` crate level names (`off`, `error`, `warn`, `info`,
/// `debug`, `trace`, case-insensitive). Unset or unparsable values fall back
/// to Debug in debug builds and Info in release builds.
pub fn level_from_env(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}

/// Install a [`StderrLogger`] as the global logger.
///
/// Only the first call per process takes effect; later calls are ignored.
pub fn init_stderr_logger() {
    let level = level_from_env(std::env::var(LOG_ENV).ok().as_deref());
    let logger: &'static StderrLogger = Box::leak(Box::new(StderrLogger::new(level)));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}
