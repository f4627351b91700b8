use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug)]
pub struct StreamOutcome {
    pub bytes_written: u64,
    /// Media type declared by the server, when it named a concrete one.
    pub content_type: Option<String>,
}

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

pub fn part_path_for(output: &Path) -> PathBuf {
    let mut part = output.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

fn declared_media_type(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .trim()
        .to_string();
    let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() || essence == "application/octet-stream" || essence == "binary/octet-stream" {
        None
    } else {
        Some(value)
    }
}

/// Streams `url` into `output`, going through a `.part` file so a failed
/// transfer never leaves a truncated file under the final name.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
) -> anyhow::Result<StreamOutcome> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("HTTP {} fetching {}", status.as_u16(), url));
    }

    let content_type = declared_media_type(response.headers());
    if content_type
        .as_deref()
        .map(|t| t.starts_with("text/html"))
        .unwrap_or(false)
    {
        return Err(anyhow!("server returned HTML instead of media for {}", url));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path_for(output);
    let written = match write_stream(response, &part).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&part, output).await?;
    tracing::debug!("[direct] wrote {} bytes to {}", written, output.display());

    Ok(StreamOutcome {
        bytes_written: written,
        content_type,
    })
}

async fn write_stream(response: reqwest::Response, part: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    loop {
        let next = tokio::time::timeout(CHUNK_TIMEOUT, stream.next())
            .await
            .map_err(|_| anyhow!("no data received for {:?}", CHUNK_TIMEOUT))?;
        match next {
            Some(chunk) => {
                let chunk = chunk.map_err(|e| anyhow!("stream error: {}", e))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            None => break,
        }
    }

    file.flush().await?;
    Ok(written)
}
