use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "chainfold.log";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Keeps the non-blocking writer alive for the life of the process. Dropping
/// it flushes buffered events.
pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Installs the global subscriber: a JSON file layer under `logging.dir` and
/// an optional WARN mirror on stderr. Returns the guard owning the writer
/// thread together with the run id stamped on this process.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<LoggingGuard> {
    if cfg.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter must not be empty"));
    }
    if cfg.dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir must not be empty"));
    }

    let dir = log_dir_path(&cfg.dir)?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let stale_warnings =
        sweep_expired_logs(&dir, LOG_FILE_PREFIX, cfg.retention_days, SystemTime::now());

    let (writer, guard) =
        tracing_appender::non_blocking(file_appender(&dir, cfg.rotation.clone()));
    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(parse_filter(&cfg.filter)?);
    let stderr_layer = cfg.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("another tracing subscriber is already installed")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %dir.display(),
        filter = %cfg.filter,
        rotation = ?cfg.rotation,
        retention_days = cfg.retention_days,
        "tracing_ready"
    );
    for warning in stale_warnings {
        tracing::warn!(target: "logging", %warning, "log_retention_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: guard,
        run_id,
    })
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter).with_context(|| format!("bad logging.filter '{}'", filter))
}

fn file_appender(dir: &Path, rotation: LoggingRotation) -> RollingFileAppender {
    match rotation {
        LoggingRotation::Daily => rolling::daily(dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(dir, LOG_FILE_PREFIX),
    }
}

fn log_dir_path(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        let cwd = std::env::current_dir()
            .context("cannot resolve logging.dir against the working directory")?;
        Ok(cwd.join(dir))
    }
}

/// Removes rotated files older than the retention window. Failures become
/// warnings so a cluttered log directory never blocks startup.
fn sweep_expired_logs(
    dir: &Path,
    prefix: &str,
    retention_days: usize,
    now: SystemTime,
) -> Vec<String> {
    let window = Duration::from_secs((retention_days as u64).saturating_mul(SECONDS_PER_DAY));
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            return vec![format!(
                "cannot scan log directory {}: {}",
                dir.display(),
                err
            )];
        }
    };

    let mut warnings = Vec::new();
    for entry in entries {
        let swept = entry
            .map_err(|err| format!("cannot walk log directory {}: {}", dir.display(), err))
            .and_then(|entry| remove_if_expired(&entry, prefix, cutoff));
        if let Err(warning) = swept {
            warnings.push(warning);
        }
    }
    warnings
}

fn remove_if_expired(entry: &fs::DirEntry, prefix: &str, cutoff: SystemTime) -> Result<(), String> {
    if !entry.file_name().to_string_lossy().starts_with(prefix) {
        return Ok(());
    }
    let path = entry.path();
    let metadata = entry
        .metadata()
        .map_err(|err| format!("cannot stat {}: {}", path.display(), err))?;
    if !metadata.is_file() {
        return Ok(());
    }
    let modified = metadata
        .modified()
        .map_err(|err| format!("cannot read mtime of {}: {}", path.display(), err))?;
    if modified <= cutoff {
        fs::remove_file(&path)
            .map_err(|err| format!("cannot remove expired log {}: {}", path.display(), err))?;
    }
    Ok(())
}
