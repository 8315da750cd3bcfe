use crate::{
    config::LogSettings,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

// -----------------------------------------------------------------------------
// COMPILE-TIME CONFIGURATION
// -----------------------------------------------------------------------------

/// Flush to disk every 100 lines if debugging/tracing (to see crashes near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines in production/default (to save I/O & CPU).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

// -----------------------------------------------------------------------------

/// Bounded, non-blocking logger that writes to a per-process log file.
///
/// # Architecture
///
/// 1. **Producers**: the server loop and transport threads call `try_log`
///    through cloned [`LoggerHandle`]s.
/// 2. **Queue**: a bounded `mpsc::sync_channel` buffers messages; when it is
///    full the line is dropped rather than stalling a room broadcast.
/// 3. **Consumer**: a dedicated thread appends to the file and flushes in
///    batches.
/// 4. **Echo**: warn/error lines are optionally mirrored to stderr so an
///    operator running the relay in a terminal sees failures immediately.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the relay server logger from resolved settings.
    #[must_use]
    pub fn start_server(cap: usize, settings: &LogSettings) -> Self {
        let app_name = Some(settings.file_prefix.as_str());
        match &settings.dir {
            Some(dir) => Self::start_in_dir(expand_path(dir), app_name, cap, settings.echo_stderr),
            None => Self::start_default(app_name, cap, settings.echo_stderr),
        }
    }

    /// Creates a `logs/` directory next to the executable and starts the logger there.
    ///
    /// # Example Filename
    /// `target/debug/logs/relay_server-20251102_023045-pid1234.log`
    #[must_use]
    pub fn start_default(app_name: Option<&str>, cap: usize, echo_stderr: bool) -> Self {
        let base = exe_dir_fallback_cwd().join("logs");
        Self::start_in_dir(base, app_name, cap, echo_stderr)
    }

    /// Starts the logger in a specific directory.
    ///
    /// Creates `dir` if missing, names the file after the start time and PID,
    /// then spawns the writer thread. If the file cannot be opened the worker
    /// falls back to a temp file, then to `io::sink()`; it never panics.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        echo_stderr: bool,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = timestamp_for_filename();
        let pid = std::process::id();

        let fname = if let Some(name) = app_name {
            format!("{}-{}-pid{}.log", name, ts, pid)
        } else {
            format!("{}-pid{}.log", ts, pid)
        };

        let file_path = dir.join(&fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let handle = LoggerHandle { tx };

        let file_path_clone = file_path.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                let writer: Box<dyn Write + Send> = if let Ok(f) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&file_path_clone)
                {
                    Box::new(f)
                } else {
                    let fallback = std::env::temp_dir().join("roomrelay-fallback.log");
                    match OpenOptions::new().create(true).append(true).open(&fallback) {
                        Ok(f) => Box::new(f),
                        Err(_) => Box::new(io::sink()),
                    }
                };

                let mut out: BufWriter<Box<dyn Write + Send>> = BufWriter::new(writer);
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let line = m.to_line();
                    let _ = writeln!(&mut out, "{line}");
                    lines_written = lines_written.wrapping_add(1);

                    if lines_written % FLUSH_BATCH_SIZE == 0 {
                        let _ = out.flush();
                    }

                    if echo_stderr && m.level >= LogLevel::Warn {
                        eprintln!("{line}");
                        // Keep the file in step with what the operator just saw.
                        let _ = out.flush();
                    }
                }

                let _ = out.flush();
            })
            .ok();

        Self {
            handle,
            _thread,
            file_path,
        }
    }

    /// Enqueues a line without blocking; see [`LoggerHandle::try_log`].
    ///
    /// # Errors
    /// Returns the rejected [`LogMsg`] when the queue is full or the worker is gone.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Directory of the running executable, or the current directory on error.
fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Output Format: `YYYYMMDD_HHMMSS` (e.g., `20251102_023045`)
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}"),
        |tm| {
            format!(
                "{:04}{:02}{:02}_{:02}{:02}{:02}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec
            )
        },
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SimpleUtc {
    year: i32,
    mon: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
}

#[derive(Debug)]
enum UtcConvError {
    Year,
    Month,
    Day,
}

/// UNIX seconds to a Gregorian UTC date (days-from-civil, inverted).
///
/// # Errors
/// A component that does not fit its integer type.
#[allow(clippy::many_single_char_names)]
fn unix_to_utc(mut s: u64) -> Result<SimpleUtc, UtcConvError> {
    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    let z: i128 = i128::from(s) + 719_468;

    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]

    let year_i = y + i128::from(m <= 2);

    let year = i32::try_from(year_i).map_err(|_| UtcConvError::Year)?;
    let mon = u32::try_from(m).map_err(|_| UtcConvError::Month)?;
    let day = u32::try_from(d).map_err(|_| UtcConvError::Day)?;

    Ok(SimpleUtc {
        year,
        mon,
        day,
        hour,
        min,
        sec,
    })
}

/// Expands a leading `~` to the user's home directory.
pub(crate) fn expand_path(path_str: &str) -> PathBuf {
    if path_str.starts_with('~') {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);

        if let Some(mut home_path) = home {
            if path_str == "~" {
                return home_path;
            }
            if path_str.starts_with("~/") || path_str.starts_with("~\\") {
                home_path.push(&path_str[2..]);
                return home_path;
            }
        }
    }
    PathBuf::from(path_str)
}
