//! Utility functions for the CLI.

use dxarc_archive::FileTimes;
use filetime::FileTime;
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Create a progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("█▓▒░ "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Check if a file path matches the filter patterns.
/// - If include patterns are specified, the path must match at least one
/// - If exclude patterns are specified, the path must not match any
///
/// Invalid patterns never match.
pub fn matches_filters(name: &str, include: &[String], exclude: &[String]) -> bool {
    let matches = |pattern: &String| Pattern::new(pattern).is_ok_and(|p| p.matches(name));

    if exclude.iter().any(matches) {
        return false;
    }
    include.is_empty() || include.iter().any(matches)
}

/// Whether `name` is `requested` or lies beneath it, ignoring ASCII case.
pub fn is_selected(name: &str, requested: &str) -> bool {
    let requested = requested.trim_end_matches('/');
    let (name, req) = (name.as_bytes(), requested.as_bytes());
    if name.len() < req.len() || !name[..req.len()].eq_ignore_ascii_case(req) {
        return false;
    }
    name.len() == req.len() || name[req.len()] == b'/'
}

/// Set the modification time of an extracted file from its archive entry.
pub fn restore_mtime(path: &Path, times: &FileTimes) {
    let Some(modified) = times.modified() else {
        return;
    };
    if let Err(e) = filetime::set_file_mtime(path, FileTime::from_system_time(modified)) {
        warn!("Could not set modification time of {}: {}", path.display(), e);
    }
}

/// Space saved by compression, as a percentage.
pub fn savings(size: u64, stored: u64) -> f64 {
    if size == 0 {
        0.0
    } else {
        (1.0 - stored as f64 / size as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn strings(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_filters() {
        let include = strings(&["BasicData/*"]);
        let exclude = strings(&["*.bak"]);
        assert!(matches_filters("BasicData/Game.dat", &include, &exclude));
        assert!(!matches_filters("BasicData/Game.bak", &include, &exclude));
        assert!(!matches_filters("MapData/Map001.mps", &include, &exclude));
        assert!(matches_filters("anything", &[], &[]));
        assert!(!matches_filters("anything", &strings(&["[bad"]), &[]));
    }

    #[test]
    fn test_is_selected() {
        assert!(is_selected("MapData/Map001.mps", "mapdata"));
        assert!(is_selected("MapData/Map001.mps", "MapData/"));
        assert!(is_selected("MapData/Map001.mps", "MAPDATA/MAP001.MPS"));
        assert!(!is_selected("MapDataExtra/x", "MapData"));
        assert!(!is_selected("Map", "MapData"));
    }

    #[test]
    fn test_savings() {
        assert_eq!(savings(0, 0), 0.0);
        assert_eq!(savings(200, 50), 75.0);
    }

    #[test]
    fn test_restore_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();

        let time = UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        restore_mtime(&path, &FileTimes::uniform(time));
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(modified, time);
    }
}
