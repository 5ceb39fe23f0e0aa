//! IP payload placement
//!
//! Downloading, unpacking and removing IP files is delegated to a
//! [`PayloadInstaller`]. The planner only commits registry changes after the
//! installer reports success.

use async_trait::async_trait;
use std::path::Path;

use crate::error::IpmResult;

/// Places and removes IP files on disk
#[async_trait]
pub trait PayloadInstaller: Send + Sync {
    /// Download the archive at `url` and unpack it as `dest`
    ///
    /// Any previous contents of `dest` are replaced, never merged. On
    /// failure the previous contents must be left as they were.
    async fn download_and_extract(&self, url: &str, dest: &Path) -> IpmResult<()>;

    /// Remove an installed IP directory
    async fn remove_directory(&self, path: &Path) -> IpmResult<()>;
}

/// Release archive URL for an IP version
///
/// `repo` may be given with or without a scheme
/// (`github.com/org/IP` or `https://github.com/org/IP.git`).
pub fn download_url(repo: &str, version: &str) -> String {
    let repo = repo.trim().trim_end_matches('/');
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    let base = if repo.contains("://") {
        repo.to_string()
    } else {
        format!("https://{repo}")
    };
    format!("{base}/releases/download/{version}/{version}.tar.gz")
}

#[cfg(feature = "catalog")]
pub use tarball::TarballInstaller;

#[cfg(feature = "catalog")]
mod tarball {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    use crate::error::IpmError;

    /// Installs `.tar.gz` release archives over HTTP
    pub struct TarballInstaller {
        client: reqwest::Client,
    }

    impl TarballInstaller {
        pub fn new() -> IpmResult<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("ipm/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| IpmError::DownloadFailed {
                    url: String::new(),
                    reason: format!("failed to create HTTP client: {e}"),
                })?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }

        async fn download(&self, url: &str) -> IpmResult<Vec<u8>> {
            let failed = |reason: String| IpmError::DownloadFailed {
                url: url.to_string(),
                reason,
            };

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| failed(e.to_string()))?;

            if !response.status().is_success() {
                return Err(failed(format!("HTTP {}", response.status())));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| failed(format!("failed to read download response: {e}")))?;
            Ok(bytes.to_vec())
        }
    }

    #[async_trait]
    impl PayloadInstaller for TarballInstaller {
        async fn download_and_extract(&self, url: &str, dest: &Path) -> IpmResult<()> {
            tracing::info!("Downloading {}", url);
            let bytes = self.download(url).await?;

            let dest_owned = dest.to_path_buf();
            tokio::task::spawn_blocking(move || unpack_replacing(&bytes, &dest_owned))
                .await
                .map_err(|e| IpmError::ExtractionFailed {
                    path: dest.to_path_buf(),
                    reason: e.to_string(),
                })??;

            tracing::info!("Extracted {} into {}", url, dest.display());
            Ok(())
        }

        async fn remove_directory(&self, path: &Path) -> IpmResult<()> {
            remove_dir_if_present(path).await
        }
    }

    /// Unpack a gzipped tarball into a staging directory, then swap it in
    /// for `dest`
    pub(crate) fn unpack_replacing(bytes: &[u8], dest: &Path) -> IpmResult<()> {
        let parent = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| IpmError::filesystem(&parent, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".ipm-staging-")
            .tempdir_in(&parent)
            .map_err(|e| IpmError::filesystem(&parent, e))?;

        let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
        tar::Archive::new(decoder)
            .unpack(staging.path())
            .map_err(|e| IpmError::ExtractionFailed {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            })?;

        if dest.exists() {
            std::fs::remove_dir_all(dest).map_err(|e| IpmError::filesystem(dest, e))?;
        }
        std::fs::rename(staging.path(), dest).map_err(|e| IpmError::filesystem(dest, e))?;

        Ok(())
    }

    pub(crate) async fn remove_dir_if_present(path: &Path) -> IpmResult<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} already absent", path.display());
                Ok(())
            }
            Err(e) => Err(IpmError::filesystem(path, e)),
        }
    }

}
