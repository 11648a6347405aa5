use crate::core::item::ItemId;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use time::macros::format_description;

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();
static SESSION_START: OnceLock<Instant> = OnceLock::new();

fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc())
}

fn timestamp() -> String {
    now()
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .unwrap_or_default()
}

/// Start a debug session log inside `log_dir`.
///
/// Nothing is logged until this has been called; every `log_*` function is a
/// no-op otherwise.
pub fn init_debug_log(log_dir: &Path) -> std::io::Result<PathBuf> {
    if let Err(e) = create_dir_all(log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_dir, e
        );
        return Err(e);
    }

    let stamp = now()
        .format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "session".to_string());
    let pid = std::process::id();
    let path = log_dir.join(format!("clipdeck-debug-{}-pid{}.log", stamp, pid));

    // Clear the log on start
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;

    SESSION_START.set(Instant::now()).ok();

    writeln!(file, "=== CLIPDECK DEBUG SESSION STARTED ===")?;
    writeln!(file, "Timestamp: {}", timestamp())?;
    writeln!(file, "PID: {}", pid)?;
    writeln!(file, "Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "Log file: {:?}", path)?;
    writeln!(file)?;

    LOG_FILE.set(path.clone()).ok();
    Ok(path)
}

fn write_line(line: std::fmt::Arguments<'_>) {
    if let Some(path) = LOG_FILE.get() {
        if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
            let elapsed = SESSION_START
                .get()
                .map(|start| start.elapsed().as_millis())
                .unwrap_or(0);
            let _ = writeln!(file, "[{:>6}ms] {}", elapsed, line);
        }
    }
}

pub fn log_event(event: &str) {
    write_line(format_args!("EVENT: {}", event));
}

pub fn log_fetch(generation: u64, search: Option<&str>, group: Option<&str>) {
    write_line(format_args!(
        "FETCH #{} search={:?} group={:?}",
        generation, search, group
    ));
}

pub fn log_applied(generation: u64, count: usize, pinned: usize) {
    write_line(format_args!(
        "APPLY #{}: {} items ({} pinned)",
        generation, count, pinned
    ));
}

/// A fetch finished after a newer one was issued
pub fn log_stale(generation: u64, current: u64) {
    write_line(format_args!(
        "STALE #{} discarded (current #{})",
        generation, current
    ));
}

pub fn log_error(context: &str, error: &dyn std::fmt::Display) {
    write_line(format_args!("ERROR {}: {}", context, error));
}

pub fn log_drag(phase: &str, active: Option<ItemId>, detail: &str) {
    match active {
        Some(id) => write_line(format_args!("DRAG {} item={} {}", phase, id, detail)),
        None => write_line(format_args!("DRAG {} {}", phase, detail)),
    }
}

pub fn log_session_end() {
    if let Some(path) = LOG_FILE.get() {
        if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
            let elapsed = SESSION_START
                .get()
                .map(|start| start.elapsed())
                .unwrap_or(std::time::Duration::ZERO);
            let _ = writeln!(file);
            let _ = writeln!(file, "=== CLIPDECK DEBUG SESSION ENDED ===");
            let _ = writeln!(file, "Duration: {:.3}s", elapsed.as_secs_f64());
            let _ = writeln!(file, "Timestamp: {}", timestamp());
            let _ = writeln!(file);
        }
    }
}
