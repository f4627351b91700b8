use vidqueue_core::models::media::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Hd720,
    Hd1080,
}

impl QualityTier {
    /// Only "1080" is distinguished; every other hint gets the 720p default.
    pub fn from_hint(hint: &str) -> Self {
        if hint.contains("1080") {
            QualityTier::Hd1080
        } else {
            QualityTier::Hd720
        }
    }

    pub fn max_height(self) -> u32 {
        match self {
            QualityTier::Hd720 => 720,
            QualityTier::Hd1080 => 1080,
        }
    }

    /// Format selector handed to `ytdl -f`.
    pub fn format_selector(self) -> String {
        let h = self.max_height();
        format!(
            "bestvideo[height<=?{h}][ext=mp4]+bestaudio[ext=m4a]/best[height<=?{h}]/best"
        )
    }
}

const HD_MIN_HEIGHT: u32 = 720;

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPlan {
    Single(Format),
    Composite { video: Format, audio: Format },
}

impl FormatPlan {
    pub fn needs_muxing(&self) -> bool {
        matches!(self, FormatPlan::Composite { .. })
    }
}

fn is_mp4_family(f: &Format) -> bool {
    let ext = f.ext.to_ascii_lowercase();
    ext == "mp4" || ext == "m4a" || ext == "m4v" || f.mime_type.contains("mp4")
}

fn bitrate(f: &Format) -> f64 {
    f.bitrate_kbps.unwrap_or(0.0)
}

// Taller wins, then mp4 over other containers, then bitrate.
fn better_video<'a>(a: &'a Format, b: &'a Format) -> &'a Format {
    let key = |f: &Format| (f.height_or_zero(), is_mp4_family(f));
    match key(a).cmp(&key(b)) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal => {
            if bitrate(b) > bitrate(a) {
                b
            } else {
                a
            }
        }
    }
}

fn best_video<'a>(candidates: impl Iterator<Item = &'a Format>) -> Option<&'a Format> {
    candidates.reduce(better_video)
}

fn best_audio<'a>(formats: &'a [Format]) -> Option<&'a Format> {
    formats
        .iter()
        .filter(|f| f.is_audio_only())
        .reduce(|a, b| {
            let key = |f: &Format| (is_mp4_family(f), bitrate(f));
            if key(b).partial_cmp(&key(a)) == Some(std::cmp::Ordering::Greater) {
                b
            } else {
                a
            }
        })
}

/// Chooses what to fetch for a tier: a progressive stream, or a video-only
/// stream plus an audio stream when that buys an HD picture the progressive
/// streams cannot offer.
pub fn plan_formats(formats: &[Format], tier: QualityTier) -> Option<FormatPlan> {
    let max = tier.max_height();
    let fits = |f: &&Format| f.height.map(|h| h <= max).unwrap_or(true);

    let progressive = best_video(formats.iter().filter(|f| f.is_progressive()).filter(fits));
    let video_only = best_video(formats.iter().filter(|f| f.is_video_only()).filter(fits));
    let audio = best_audio(formats);

    if let (Some(video), Some(audio)) = (video_only, audio) {
        let progressive_height = progressive.map(|p| p.height_or_zero()).unwrap_or(0);
        if video.height_or_zero() >= HD_MIN_HEIGHT && video.height_or_zero() > progressive_height {
            return Some(FormatPlan::Composite {
                video: video.clone(),
                audio: audio.clone(),
            });
        }
    }

    if let Some(p) = progressive {
        return Some(FormatPlan::Single(p.clone()));
    }

    best_video(formats.iter().filter(|f| f.has_video))
        .or_else(|| formats.first())
        .map(|f| FormatPlan::Single(f.clone()))
}
