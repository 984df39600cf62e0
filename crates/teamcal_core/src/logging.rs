//! Rolling file logs for the planner core.
//!
//! Events are single `key=value` lines (`event=... module=... status=...`)
//! carrying ids and counts. Usernames, team names and absence dates are
//! never logged.
//!
//! The logger is process-global. The first successful [`init_logging`] call
//! fixes level and directory; repeating it with the same pair is a no-op and
//! any other pair is refused.

use crate::db::migrations::latest_version;
use flexi_logger::{Age, Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "teamcal";
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
/// Files rotate daily, or earlier once they pass this size.
const ROTATE_AT_BYTES: u64 = 5 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 7;
const PANIC_EXCERPT_CHARS: usize = 120;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Validated `init_logging` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogTarget {
    level: &'static str,
    dir: PathBuf,
}

impl LogTarget {
    fn parse(level: &str, dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: parse_level(level)?,
            dir: parse_dir(dir)?,
        })
    }

    /// Reason `requested` cannot replace `self`, if any.
    fn conflict_with(&self, requested: &LogTarget) -> Option<String> {
        if self.dir != requested.dir {
            return Some(format!(
                "planner logs already go to `{}`; refusing to switch to `{}`",
                self.dir.display(),
                requested.dir.display()
            ));
        }
        if self.level != requested.level {
            return Some(format!(
                "planner logs already run at `{}`; refusing to switch to `{}`",
                self.level, requested.level
            ));
        }
        None
    }
}

struct ActiveLogger {
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Starts the planner's rolling file logger.
///
/// `level` is one of `trace|debug|info|warn|error` (any case, `warning` is
/// accepted); `log_dir` must be absolute and is created when missing.
///
/// # Errors
/// Returns a readable message for a bad level or directory, a backend start
/// failure, or an attempt to change level or directory after the first
/// successful call.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let requested = LogTarget::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start_logger(&requested))?;
    // Also catches a concurrent first call that won with other settings.
    match active.target.conflict_with(&requested) {
        Some(reason) => Err(reason),
        None => Ok(()),
    }
}

/// `(level, log_dir)` of the running logger, `None` before init.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.target.level, active.target.dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(target: &LogTarget) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&target.dir).map_err(|err| {
        format!(
            "cannot create log directory `{}`: {err}",
            target.dir.display()
        )
    })?;

    let handle = Logger::try_with_str(target.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", target.level))?
        .log_to_file(
            FileSpec::default()
                .directory(target.dir.clone())
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::AgeOrSize(Age::Day, ROTATE_AT_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start planner logger: {err}"))?;

    PANIC_HOOK.get_or_init(install_panic_hook);

    info!(
        "event=planner_start module=core status=ok version={} schema_version={} build={} os={}",
        env!("CARGO_PKG_VERSION"),
        latest_version(),
        build_profile(),
        std::env::consts::OS
    );
    info!(
        "event=logging_ready module=core status=ok level={} rotate=daily keep_files={}",
        target.level, KEEP_ROTATED_FILES
    );

    Ok(ActiveLogger {
        target: target.clone(),
        _handle: handle,
    })
}

fn parse_level(raw: &str) -> Result<&'static str, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let wanted = if lowered == "warning" { "warn" } else { lowered.as_str() };
    LEVELS
        .iter()
        .copied()
        .find(|level| *level == wanted)
        .ok_or_else(|| {
            format!(
                "unsupported log level `{wanted}`; expected {}",
                LEVELS.join("|")
            )
        })
}

fn parse_dir(raw: &str) -> Result<PathBuf, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("log directory cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!(
            "log directory must be an absolute path, got `{trimmed}`"
        ));
    }
    Ok(path.to_path_buf())
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(
            "event=panic module=core status=error location={} payload={}",
            panic_location(info),
            panic_excerpt(info)
        );
        previous(info);
    }));
}

fn panic_location(info: &PanicHookInfo<'_>) -> String {
    info.location().map_or_else(
        || "unknown".to_string(),
        |location| format!("{}:{}", location.file(), location.line()),
    )
}

/// Panic messages can quote user input: one line, capped length.
fn panic_excerpt(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    single_line(message, PANIC_EXCERPT_CHARS)
}

fn single_line(value: &str, max_chars: usize) -> String {
    let mut chars = value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r') { ' ' } else { ch });
    let mut line: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        line.push_str("...");
    }
    line
}
