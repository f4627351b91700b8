use std::path::Path;

use vidqueue_core::fs_paths::{AppPaths, WorkingDirPaths};

fn enhanced_path(bin_dir: &Path) -> String {
    let sep = if cfg!(windows) { ";" } else { ":" };
    let current = std::env::var("PATH").unwrap_or_default();
    format!("{}{}{}", bin_dir.display(), sep, current)
}

/// Spawnable command with the working directory ahead of `PATH`, so tools
/// installed next to the service are found before system ones.
pub fn command<S: AsRef<std::ffi::OsStr>>(program: S) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(target_os = "windows")]
    cmd.creation_flags(0x08000000);
    if let Ok(paths) = WorkingDirPaths::from_current_dir("") {
        cmd.env("PATH", enhanced_path(&paths.bin_dir()));
    }
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.env("PYTHONUTF8", "1");
    cmd.kill_on_drop(true);
    cmd
}
