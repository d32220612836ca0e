//! Structured logging for the Nova portal
//!
//! Events go through `tracing` to stdout and to a daily file
//! `<LOG_DIR>/nova-YYYY-MM-DD.log`, tagged with a category:
//! - ASSESSMENT: Nova conversation and analysis
//! - GAMIFICATION: XP awards, level ups, achievements
//! - CONTENT: LLM generation and fallbacks
//! - REQUEST: HTTP lifecycle
//! - ERROR: Errors and crashes

use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Days of log files kept by `cleanup_old_logs`
pub const KEEP_DAYS: i64 = 7;

const FILE_PREFIX: &str = "nova-";
const FILE_SUFFIX: &str = ".log";

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Assessment,   // Nova phases, trait nudges, analysis
    Gamification, // XP, levels, achievements
    Content,      // LLM calls and fallbacks
    Request,      // HTTP lifecycle
    Error,        // Errors and crashes
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Assessment => "ASSESSMENT",
            LogCategory::Gamification => "GAMIFICATION",
            LogCategory::Content => "CONTENT",
            LogCategory::Request => "REQUEST",
            LogCategory::Error => "ERROR",
        }
    }
}

pub fn log_file_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("{}{}{}", FILE_PREFIX, day.format("%Y-%m-%d"), FILE_SUFFIX))
}

/// Appends each event to today's file; the date is resolved per event so
/// the file rolls over at midnight without a restart.
#[derive(Debug, Clone)]
struct DailyFile {
    dir: PathBuf,
}

impl<'a> MakeWriter<'a> for DailyFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let path = log_file_path(&self.dir, Local::now().date_naive());
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// Install the global subscriber. Filter comes from `RUST_LOG` (default `info`).
pub fn init_logging(log_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(DailyFile { dir: log_dir.to_path_buf() });

    // A subscriber may already be installed (tests, embedding)
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        log_request(None, &format!("Logging initialized in {}", log_dir.display()));
    }
    Ok(())
}

/// First 8 chars of a session / user id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let session = session_id.map(short_id).unwrap_or("-");
    let name = category.as_str();
    match category {
        LogCategory::Error => tracing::error!(category = name, session, "{}", message),
        _ => tracing::info!(category = name, session, "{}", message),
    }
}

/// Nova conversation events (phase changes, trait nudges, analysis)
pub fn log_assessment(session_id: Option<&str>, message: &str) {
    log(LogCategory::Assessment, session_id, message);
}

/// XP awards, level ups and unlocked achievements
pub fn log_gamification(user_id: Option<&str>, message: &str) {
    log(LogCategory::Gamification, user_id, message);
}

pub fn log_content(user_id: Option<&str>, message: &str) {
    log(LogCategory::Content, user_id, message);
}

pub fn log_request(user_id: Option<&str>, message: &str) {
    log(LogCategory::Request, user_id, message);
}

pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Delete `nova-YYYY-MM-DD.log` files older than `KEEP_DAYS` before `today`.
/// Other files in the directory are left alone.
pub fn cleanup_old_logs(log_dir: &Path, today: NaiveDate) -> io::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = today - chrono::Duration::days(KEEP_DAYS);
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let day = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(FILE_PREFIX))
            .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        if let Some(day) = day {
            if day < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("ééééééééé"), "éééééééé");
    }

    #[test]
    fn test_log_file_name() {
        let path = log_file_path(Path::new("logs"), day("2026-03-09"));
        assert_eq!(path, PathBuf::from("logs/nova-2026-03-09.log"));
    }

    #[test]
    fn test_cleanup_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let today = day("2026-03-20");
        let names =
            ["nova-2026-03-01.log", "nova-2026-03-14.log", "nova-2026-03-19.log", "notes.txt"];
        for name in names {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), today).unwrap();
        assert_eq!(deleted, 1);
        assert!(!dir.path().join("nova-2026-03-01.log").exists());
        assert!(dir.path().join("nova-2026-03-14.log").exists());
        assert!(dir.path().join("nova-2026-03-19.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, day("2026-01-01")).unwrap(), 0);
    }
}
