use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// Characters rejected by at least one of Windows, macOS or Linux, each mapped
// to a lookalike that every filesystem accepts.
const FORBIDDEN: &[(char, &str)] = &[
    ('<', "("),
    ('>', ")"),
    ('\\', "-"),
    ('/', "-"),
    (':', "："),
    ('*', "x"),
    ('"', "“"),
    ('|', "｜"),
    ('?', "？"),
];

pub fn sanitize(title: &str) -> String {
    let name: String = title.nfc().filter(|c| !c.is_control() || c.is_whitespace()).collect();
    let name = WS_RE.replace_all(name.trim(), " ");

    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        match FORBIDDEN.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => result.push_str(to),
            None => result.push(c),
        }
    }

    result.trim_end_matches([' ', '.']).trim().to_string()
}

// NAME_MAX is 255 bytes; the rest is left for suffixes like `.f137.m4v.part`.
const MAX_STEM_BYTES: usize = 200;

fn truncate_bytes(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Sanitized title cut to a filesystem-safe length, falling back to the video
/// id when nothing usable is left.
pub fn output_stem(title: &str, id: &str) -> String {
    let sanitized = sanitize(title);
    let stem = truncate_bytes(&sanitized, MAX_STEM_BYTES)
        .trim_end_matches([' ', '.'])
        .trim();
    if stem.is_empty() {
        id.to_string()
    } else {
        stem.to_string()
    }
}
