use mime_guess::mime::Mime;

pub const DEFAULT_EXTENSION: &str = ".mov";

// The registry below is not exhaustive for video containers and often suggests
// rarely-used aliases first, so common types are pinned here.
const CANONICAL_EXTENSIONS: &[(&str, &str)] = &[
    ("video/quicktime", ".mov"),
    ("video/x-msvideo", ".avi"),
    ("video/x-matroska", ".mkv"),
    ("video/mpeg", ".mpeg"),
    ("video/webm", ".webm"),
    ("video/3gpp2", ".3g2"),
    ("video/x-flv", ".flv"),
    ("video/3gpp", ".3gp"),
    ("video/mp4", ".mp4"),
    ("video/ogg", ".ogv"),
    ("video/mp2t", ".ts"),
];

/// Picks a file extension (with leading dot) for a declared media type such
/// as `video/mp4; codecs="avc1.64001F, mp4a.40.2"`.
pub fn pick_extension(media_type: &str) -> String {
    let mime: Mime = match media_type.trim().parse() {
        Ok(m) => m,
        Err(_) => return DEFAULT_EXTENSION.to_string(),
    };
    let essence = mime.essence_str().to_ascii_lowercase();

    if let Some((_, ext)) = CANONICAL_EXTENSIONS.iter().find(|(t, _)| *t == essence) {
        return ext.to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Media type to assume for a format when the server does not declare one.
pub fn media_type_for(ext: &str, has_video: bool) -> String {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    match (ext.as_str(), has_video) {
        ("m4a", _) => "audio/mp4".into(),
        ("mp4", true) | ("m4v", true) => "video/mp4".into(),
        ("mp4", false) => "audio/mp4".into(),
        ("webm", true) => "video/webm".into(),
        ("webm", false) => "audio/webm".into(),
        ("3gp", _) => "video/3gpp".into(),
        ("flv", _) => "video/x-flv".into(),
        ("mkv", _) => "video/x-matroska".into(),
        ("mp3", _) => "audio/mpeg".into(),
        ("opus", _) | ("ogg", _) => "audio/ogg".into(),
        _ => mime_guess::from_ext(&ext)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".into()),
    }
}
