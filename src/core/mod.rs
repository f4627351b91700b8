pub mod dependencies;
pub mod direct_downloader;
pub mod events;
pub mod extension;
pub mod ffmpeg;
pub mod filename;
pub mod process;
pub mod quality;
pub mod queue;
pub mod url_parser;
pub mod ytdlp;
