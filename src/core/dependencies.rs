use std::path::{Path, PathBuf};
use std::process::Stdio;

use vidqueue_core::error::DownloadError;

pub fn bin_name(tool: &str) -> String {
    if cfg!(target_os = "windows") && !tool.ends_with(".exe") {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

fn version_flag_for(tool: &Path) -> &'static str {
    let stem = tool
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    }
}

async fn responds_to_version(program: &Path) -> bool {
    crate::core::process::command(program)
        .arg(version_flag_for(program))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Locates a tool by path or `PATH` lookup; spawned commands already have
/// the working directory on `PATH`.
pub async fn find_tool(tool: &str) -> Option<PathBuf> {
    let started = std::time::Instant::now();
    let name = PathBuf::from(bin_name(tool));
    let found = responds_to_version(&name).await;
    tracing::debug!("[perf] find_tool({}) took {:?}", tool, started.elapsed());
    found.then_some(name)
}

pub async fn require_tool(tool: &str) -> Result<PathBuf, DownloadError> {
    find_tool(tool)
        .await
        .ok_or_else(|| DownloadError::MissingDependency {
            tool: tool.to_string(),
        })
}

pub async fn check_version(program: &Path) -> Option<String> {
    let output = crate::core::process::command(program)
        .arg(version_flag_for(program))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("").trim();
    if version_flag_for(program) == "-version" {
        first_line.split_whitespace().nth(2).map(|s| s.to_string())
    } else if first_line.is_empty() {
        None
    } else {
        Some(first_line.to_string())
    }
}
