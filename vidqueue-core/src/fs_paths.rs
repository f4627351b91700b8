use std::path::PathBuf;

pub trait AppPaths: Send + Sync {
    fn downloads_dir(&self) -> PathBuf;
    fn bin_dir(&self) -> PathBuf;
}

/// Paths anchored at the process working directory, the way the service is
/// expected to be deployed: `ytdl` next to the binary, videos in `Downloads/`.
pub struct WorkingDirPaths {
    root: PathBuf,
    output_dir: PathBuf,
}

impl WorkingDirPaths {
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_current_dir(output_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?, output_dir))
    }
}

impl AppPaths for WorkingDirPaths {
    fn downloads_dir(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.clone()
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("VIDQUEUE_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir().map(|d| d.join("vidqueue"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloads_dir_is_relative_to_root() {
        let paths = WorkingDirPaths::new("/srv/vidqueue", "Downloads");
        assert_eq!(paths.downloads_dir(), PathBuf::from("/srv/vidqueue/Downloads"));
        assert_eq!(paths.bin_dir(), PathBuf::from("/srv/vidqueue"));
    }

    #[test]
    fn absolute_output_dir_wins() {
        let paths = WorkingDirPaths::new("/srv/vidqueue", "/data/videos");
        assert_eq!(paths.downloads_dir(), PathBuf::from("/data/videos"));
    }
}
