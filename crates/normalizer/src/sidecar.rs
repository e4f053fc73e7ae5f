use std::path::{Path, PathBuf};

/// Get the path of the ffmpeg report written next to a transcode destination
pub fn report_log_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".log");
    destination.with_file_name(name)
}

/// Value for the `FFREPORT` environment variable of one encoder child
pub fn ffreport_value(destination: &Path, level: u8) -> String {
    format!("file={}:level={}", escape_report_path(&report_log_path(destination)), level)
}

/// Escape a path for ffmpeg's `key=value:key=value` option syntax
fn escape_report_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | ':' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
