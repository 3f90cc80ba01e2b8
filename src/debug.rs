//! Logging infrastructure for worktab
//!
//! Installs a `log::Log` implementation so every `log::info!()` etc. in the
//! workspace ends up in one file:
//!
//! - `/tmp/worktab_debug.log` on Unix/macOS
//! - `%TEMP%\worktab_debug.log` on Windows
//!
//! Keeping log output out of stdout leaves the interactive shell readable.
//! When `RUST_LOG` is set, records are mirrored to stderr as well.
//!
//! Level precedence: `--log-level` flag, then `RUST_LOG`, then the config
//! file's `log_level` (applied after the config is loaded).

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use worktab_config::LogLevel;

struct LogBridge {
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
    /// Set when the level came from the CLI or RUST_LOG
    level_pinned: AtomicBool,
}

impl LogBridge {
    fn new(mirror_stderr: bool) -> Self {
        let file = match OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            Ok(mut f) => {
                let _ = writeln!(
                    f,
                    "{}\nworktab session started at {}\n{}",
                    "=".repeat(80),
                    timestamp(),
                    "=".repeat(80)
                );
                Some(f)
            }
            // Logging must never take the app down
            Err(_) => None,
        };

        Self {
            file: Mutex::new(file),
            mirror_stderr,
            level_pinned: AtomicBool::new(false),
        }
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(line.as_bytes());
        }
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Path of the log file
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    let path = PathBuf::from("/tmp/worktab_debug.log");
    #[cfg(not(unix))]
    let path = std::env::temp_dir().join("worktab_debug.log");
    path
}

fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

fn env_level() -> Option<LogLevel> {
    let value = std::env::var("RUST_LOG").ok()?;
    // Accept both "debug" and "worktab=debug"
    let level = value.rsplit('=').next().unwrap_or(&value);
    LogLevel::parse(level.trim())
}

/// Install the file logger. Safe to call more than once.
pub fn init_log_bridge(cli_level: Option<LogLevel>) {
    let mirror_stderr = std::env::var_os("RUST_LOG").is_some();
    let bridge = BRIDGE.get_or_init(|| LogBridge::new(mirror_stderr));
    if log::set_logger(bridge).is_err() {
        return;
    }

    let pinned = cli_level.or_else(env_level);
    bridge.level_pinned.store(pinned.is_some(), Ordering::Relaxed);
    log::set_max_level(pinned.unwrap_or_default().to_level_filter());
}

/// Apply the config file's level unless the CLI or RUST_LOG already chose one.
pub fn apply_config_level(level: LogLevel) {
    let pinned = BRIDGE
        .get()
        .is_some_and(|b| b.level_pinned.load(Ordering::Relaxed));
    if !pinned {
        log::set_max_level(level.to_level_filter());
    }
}
