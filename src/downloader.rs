use crate::error::Error;
use log::info;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Returns the last segment of the URL path, percent-decoded. The query string is ignored.
pub fn filename_from_url(url: &str) -> Result<String, Error> {
    let parsed = Url::parse(url)?;
    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let name = urlencoding::decode(last)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| last.to_string());

    if name.is_empty() {
        return Err(Error::NoData {
            message: format!("cannot infer a file name from {}", url),
        });
    }

    Ok(name)
}

/// Streams the body of `url` into `dest_dir`, naming the file after the URL path.
///
/// # Returns
/// The path of the written file.
pub async fn download_file(client: &Client, url: &str, dest_dir: &Path) -> Result<PathBuf, Error> {
    let filename = filename_from_url(url)?;
    let local_path = dest_dir.join(&filename);

    let mut resp = client.get(url).send().await?.error_for_status()?;

    tokio::fs::create_dir_all(dest_dir).await?;
    let mut file = File::create(&local_path).await?;
    let mut written = 0usize;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    info!("downloaded {} bytes to {}", written, local_path.display());
    Ok(local_path)
}
