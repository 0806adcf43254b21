//! Save a remote asset locally, or fall back to handing the URL to an
//! external viewer. Failures never leave a partial file behind and are
//! not retried.

use std::path::{Path, PathBuf};

use crate::{ApiClient, ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: u64 },
    OpenExternally(String),
}

/// File name for `url` inside a destination directory.
fn file_name_from_url(url: &str) -> String {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme.split_once('/').map_or("", |(_, rest)| rest);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "download".to_string())
}

fn resolve_destination(url: &str, dest: &Path) -> PathBuf {
    if dest.is_dir() {
        dest.join(file_name_from_url(url))
    } else {
        dest.to_path_buf()
    }
}

async fn fetch_to(client: &ApiClient, url: &str, target: &Path) -> ClientResult<u64> {
    let response = client.client().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Http { status, body });
    }
    let bytes = response.bytes().await?;

    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    Ok(bytes.len() as u64)
}

/// Download `url` to `dest` (a file path or an existing directory). Any
/// failure turns into [`DownloadOutcome::OpenExternally`].
pub async fn download_or_open(client: &ApiClient, url: &str, dest: &Path) -> DownloadOutcome {
    let target = resolve_destination(url, dest);

    match fetch_to(client, url, &target).await {
        Ok(bytes) => {
            tracing::info!(url = %url, path = %target.display(), bytes, "Download saved");
            DownloadOutcome::Saved {
                path: target,
                bytes,
            }
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Download failed, open the URL externally");
            DownloadOutcome::OpenExternally(url.to_string())
        }
    }
}
