use regex::Regex;
use std::sync::LazyLock;

use vidqueue_core::error::DownloadError;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

// Tried in order on references that are not proper URLs (missing scheme,
// pasted fragments); each narrows the previous match.
static FALLBACK_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?:v|embed|shorts|live|watch\?v)(?:=|/)([^"&?/=%]{11})"#).unwrap(),
        Regex::new(r#"(?:=|/)([^"&?/=%]{11})"#).unwrap(),
        Regex::new(r#"([^"&?/=%]{11})"#).unwrap(),
    ]
});

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];

/// Reduces a watch URL, short link or bare id to the canonical 11-character
/// video id.
pub fn extract_video_id(reference: &str) -> Result<String, DownloadError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(DownloadError::InvalidReference("empty reference".into()));
    }

    if ID_RE.is_match(reference) {
        return Ok(reference.to_string());
    }

    let candidate = match url::Url::parse(reference) {
        Ok(parsed) if parsed.host_str().is_some() => id_from_url(&parsed),
        _ => id_from_fragment(reference),
    };

    match candidate {
        Some(id) if ID_RE.is_match(&id) => Ok(id),
        _ => Err(DownloadError::InvalidReference(reference.to_string())),
    }
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_lowercase();
    YOUTUBE_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

fn id_from_url(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    if host.to_lowercase().ends_with("youtu.be") {
        return segments.first().map(|s| s.to_string());
    }

    if let Some(v) = parsed.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.to_string()) {
        return Some(v);
    }

    match segments.first() {
        Some(&"embed") | Some(&"shorts") | Some(&"live") | Some(&"v") | Some(&"e") => {
            segments.get(1).map(|s| s.to_string())
        }
        _ => None,
    }
}

fn id_from_fragment(reference: &str) -> Option<String> {
    if !reference.contains("youtu") && !reference.contains(['"', '?', '&', '/', '<', '%', '=']) {
        return None;
    }

    let mut current = reference.to_string();
    for re in FALLBACK_RES.iter() {
        if let Some(m) = re.captures(&current).and_then(|c| c.get(1)) {
            current = m.as_str().to_string();
        }
    }
    Some(current)
}
