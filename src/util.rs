// Small helpers for prompt input, paths and duration formatting.

use std::path::PathBuf;
use std::time::Duration;

pub fn trim_line_ending(s: &str) -> &str {
    s.trim_end_matches(['\n', '\r'])
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
