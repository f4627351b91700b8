use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use vidqueue_core::error::DownloadError;
use vidqueue_core::models::media::{Format, VideoInfo};

use crate::core::extension::media_type_for;
use crate::downloaders::traits::VideoSource;

const FRAGMENT_EXTS: &[&str] = &["m4a", "m4v"];

pub fn default_download_url() -> &'static str {
    if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    }
}

/// Makes sure the `ytdl` executable exists at `target`, fetching it on first
/// run when it is missing.
pub async fn ensure_ytdl(target: &Path, download_url: Option<&str>) -> anyhow::Result<PathBuf> {
    if target.exists() {
        return Ok(target.to_path_buf());
    }

    let url = download_url.unwrap_or_else(|| default_download_url());
    tracing::info!("Downloading ytdl from {} to {}", url, target.display());

    let client = crate::core::direct_downloader::build_client()?;
    crate::core::direct_downloader::download_to_file(&client, url, target).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(target, perms).await?;
    }

    tracing::info!("ytdl installed to {}", target.display());
    Ok(target.to_path_buf())
}

pub async fn get_video_info(ytdl: &Path, id: &str) -> anyhow::Result<serde_json::Value> {
    let output = crate::core::process::command(ytdl)
        .args(["--dump-json", "--no-warnings", "--no-playlist", "--", id])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("failed to run ytdl: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ytdl failed: {}", stderr.trim()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("ytdl returned invalid JSON: {}", e))?;

    Ok(json)
}

pub fn parse_video_info(json: &serde_json::Value) -> anyhow::Result<VideoInfo> {
    let id = json
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("metadata has no video id"))?
        .to_string();

    let title = json
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or(id.as_str())
        .to_string();

    let author = json
        .get("uploader")
        .or_else(|| json.get("channel"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let duration = json.get("duration").and_then(|v| v.as_f64());

    if json.get("is_live").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Err(anyhow!("livestreams are not supported"));
    }

    let formats = json
        .get("formats")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(parse_format).collect())
        .unwrap_or_default();

    Ok(VideoInfo {
        id,
        title,
        author,
        duration_seconds: duration,
        formats,
    })
}

fn parse_format(f: &serde_json::Value) -> Option<Format> {
    let format_id = f.get("format_id").and_then(|v| v.as_str())?.to_string();
    let url = f.get("url").and_then(|v| v.as_str())?.to_string();

    // Manifest-only entries cannot be fetched with a single GET.
    let protocol = f.get("protocol").and_then(|v| v.as_str()).unwrap_or("https");
    if !protocol.starts_with("http") || protocol.contains("m3u8") || protocol.contains("dash") {
        return None;
    }

    let ext = f.get("ext").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let vcodec = f.get("vcodec").and_then(|v| v.as_str()).unwrap_or("none");
    let acodec = f.get("acodec").and_then(|v| v.as_str()).unwrap_or("none");
    let has_video = vcodec != "none";
    let has_audio = acodec != "none";
    if !has_video && !has_audio {
        return None;
    }

    Some(Format {
        mime_type: media_type_for(&ext, has_video),
        format_id,
        url,
        ext,
        width: f.get("width").and_then(|v| v.as_u64()).map(|v| v as u32),
        height: f.get("height").and_then(|v| v.as_u64()).map(|v| v as u32),
        has_video,
        has_audio,
        bitrate_kbps: f.get("tbr").and_then(|v| v.as_f64()),
    })
}

/// `215.0` becomes `3:35`; unknown or live durations read `?`.
pub fn describe_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => {
            let total = s.round() as u64;
            let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
            if h > 0 {
                format!("{}:{:02}:{:02}", h, m, s)
            } else {
                format!("{}:{:02}", m, s)
            }
        }
        _ => "?".to_string(),
    }
}

/// `ytdl` treats `%` in output templates as a field reference.
pub fn escape_template(stem: &str) -> String {
    stem.replace('%', "%%")
}

pub fn build_download_args(selector: &str, output_template: &str, id: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        selector.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "-o".to_string(),
        output_template.to_string(),
        "--".to_string(),
        id.to_string(),
    ]
}

pub async fn download_video(
    ytdl: &Path,
    id: &str,
    output_template: &str,
    selector: &str,
) -> Result<(), DownloadError> {
    let mut child = crate::core::process::command(ytdl)
        .args(build_download_args(selector, output_template, id))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DownloadError::ToolFailed {
            tool: "ytdl".into(),
            message: format!("failed to start: {}", e),
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("ytdl stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("ytdl stderr not captured"))?;

    let log_id = id.to_string();
    let stdout_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!("[ytdl {}] {}", log_id, line);
        }
    });
    let stderr_reader = tokio::spawn(async move {
        let mut last = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                last = line;
            }
        }
        last
    });

    let status = child.wait().await?;
    let _ = stdout_reader.await;
    let last_err = stderr_reader.await.unwrap_or_default();

    if !status.success() {
        return Err(DownloadError::ToolFailed {
            tool: "ytdl".into(),
            message: format!("exited with {}: {}", status, last_err.trim()),
        });
    }

    Ok(())
}

fn is_leftover(name: &str) -> bool {
    name.ends_with(".part") || name.ends_with(".ytdl") || name.starts_with('.')
}

fn belongs_to(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .map(|rest| rest.starts_with('.'))
        .unwrap_or(false)
}

fn is_fragment(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAGMENT_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Newest finished file in `dir` whose name starts with `stem`.
pub async fn find_downloaded_file(dir: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let meta = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if is_leftover(name) || is_fragment(&path) || !belongs_to(name, stem) {
            continue;
        }

        let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        match &best {
            Some((_, best_time)) if modified <= *best_time => {}
            _ => best = Some((path, modified)),
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| anyhow!("downloaded file not found in {:?}", dir))
}

/// Removes `.m4a`/`.m4v` pieces of a composite download left next to the
/// merged file. Returns how many were deleted.
pub async fn cleanup_fragments(dir: &Path, stem: &str) -> anyhow::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if belongs_to(name, stem) && is_fragment(&path) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("could not remove fragment {}: {}", path.display(), e),
            }
        }
    }
    Ok(removed)
}

pub struct YtdlSource {
    ytdl: PathBuf,
}

impl YtdlSource {
    pub fn new(ytdl: impl Into<PathBuf>) -> Self {
        Self { ytdl: ytdl.into() }
    }
}

#[async_trait]
impl VideoSource for YtdlSource {
    async fn get_video(&self, id: &str) -> anyhow::Result<VideoInfo> {
        let json = get_video_info(&self.ytdl, id).await?;
        parse_video_info(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "id": "sxnjarLK5l4",
            "title": "Live: \"Tour\" 2024",
            "uploader": "Band",
            "duration": 215.0,
            "formats": [
                { "format_id": "sb0", "url": "https://i.ytimg.com/sb", "ext": "mhtml",
                  "protocol": "mhtml", "vcodec": "none", "acodec": "none" },
                { "format_id": "140", "url": "https://cdn/140", "ext": "m4a",
                  "protocol": "https", "vcodec": "none", "acodec": "mp4a.40.2", "tbr": 129.5 },
                { "format_id": "137", "url": "https://cdn/137", "ext": "mp4",
                  "protocol": "https", "vcodec": "avc1.640028", "acodec": "none",
                  "width": 1920, "height": 1080, "tbr": 4400.0 },
                { "format_id": "96", "url": "https://manifest/96", "ext": "mp4",
                  "protocol": "m3u8_native", "vcodec": "avc1", "acodec": "mp4a", "height": 1080 },
                { "format_id": "18", "url": "https://cdn/18", "ext": "mp4",
                  "protocol": "https", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
                  "width": 640, "height": 360 }
            ]
        })
    }

    #[test]
    fn parses_metadata_and_keeps_fetchable_formats() {
        let info = parse_video_info(&sample()).unwrap();
        assert_eq!(info.id, "sxnjarLK5l4");
        assert_eq!(info.title, "Live: \"Tour\" 2024");
        assert_eq!(info.author, "Band");
        let ids: Vec<&str> = info.formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "137", "18"]);

        let audio = &info.formats[0];
        assert!(audio.is_audio_only());
        assert_eq!(audio.mime_type, "audio/mp4");
        let video = &info.formats[1];
        assert!(video.is_video_only());
        assert_eq!(video.height, Some(1080));
        assert_eq!(video.mime_type, "video/mp4");
        assert!(info.formats[2].is_progressive());
    }

    #[test]
    fn live_streams_are_rejected() {
        let json = json!({ "id": "abcdefghijk", "is_live": true });
        assert!(parse_video_info(&json).is_err());
    }

    #[test]
    fn missing_id_is_an_error() {
        assert!(parse_video_info(&json!({ "title": "x" })).is_err());
    }

    #[test]
    fn durations_are_human_readable() {
        let info = parse_video_info(&sample()).unwrap();
        assert_eq!(describe_duration(info.duration_seconds), "3:35");
        assert_eq!(describe_duration(Some(3725.4)), "1:02:05");
        assert_eq!(describe_duration(None), "?");
    }

    #[test]
    fn template_escapes_percent() {
        assert_eq!(escape_template("100% Rock"), "100%% Rock");
    }

    #[test]
    fn download_args_end_with_the_id() {
        let args = build_download_args("best", "/dl/x.%(ext)s", "-abcdefghij");
        assert_eq!(&args[..2], &["-f".to_string(), "best".to_string()]);
        assert!(args.contains(&"--merge-output-format".to_string()));
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "-abcdefghij");
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/dl/x.%(ext)s");
    }

    #[tokio::test]
    async fn finds_merged_file_and_ignores_fragments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.f137.m4v"), b"v").unwrap();
        std::fs::write(dir.path().join("Song.f140.m4a"), b"a").unwrap();
        std::fs::write(dir.path().join("Song.mp4.part"), b"p").unwrap();
        std::fs::write(dir.path().join("Other.mp4"), b"o").unwrap();
        std::fs::write(dir.path().join("Songbook.mp4"), b"o").unwrap();
        std::fs::write(dir.path().join("Song.mp4"), b"merged").unwrap();

        let found = find_downloaded_file(dir.path(), "Song").await.unwrap();
        assert_eq!(found, dir.path().join("Song.mp4"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_downloaded_file(dir.path(), "Nothing").await.is_err());
    }

    #[tokio::test]
    async fn cleanup_removes_only_matching_fragments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.f137.m4v"), b"v").unwrap();
        std::fs::write(dir.path().join("Song.f140.m4a"), b"a").unwrap();
        std::fs::write(dir.path().join("Song.mp4"), b"merged").unwrap();
        std::fs::write(dir.path().join("Other.m4a"), b"keep").unwrap();

        let removed = cleanup_fragments(dir.path(), "Song").await.unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("Song.mp4").exists());
        assert!(dir.path().join("Other.m4a").exists());
        assert!(!dir.path().join("Song.f140.m4a").exists());
    }
}
