use std::path::Path;
use std::process::Stdio;

use vidqueue_core::error::DownloadError;

pub async fn mux_video_audio(
    ffmpeg: &Path,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), DownloadError> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let result = crate::core::process::command(ffmpeg)
        .args(mux_args(video, audio, output))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DownloadError::ToolFailed {
            tool: "ffmpeg".into(),
            message: e.to_string(),
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let last = stderr.lines().last().unwrap_or("").trim().to_string();
        return Err(DownloadError::ToolFailed {
            tool: "ffmpeg".into(),
            message: format!("exited with {}: {}", result.status, last),
        });
    }

    Ok(())
}

fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().to_string(),
        "-i".into(),
        audio.to_string_lossy().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mux_copies_streams_into_output() {
        let args = mux_args(Path::new("a.m4v"), Path::new("a.m4a"), Path::new("a.mp4"));
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some("a.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-i a.m4v -i a.m4a"));
        assert!(joined.contains("-c copy"));
    }
}
