use super::{GitHubClient, GitHubError, ReleaseAsset};
use crate::utils::{CancelSignal, cancelled};
use futures_util::TryStreamExt;
use std::path::Path;
use tokio::{fs, io::AsyncWriteExt, select};

impl GitHubClient {
    /// Streams `asset` into `dest`, reporting the completed fraction.
    ///
    /// `on_progress` is only called when the server announces a length, and
    /// with `1.0` once the body is complete. Cancellation is checked between
    /// chunks; a partially written `dest` is left for the caller to remove.
    #[instrument(skip_all, fields(asset = %asset.name))]
    pub async fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        cancel: &CancelSignal,
        mut on_progress: impl FnMut(f64),
    ) -> Result<u64, GitHubError> {
        let mut cancel = cancel.clone();
        info!("Downloading '{}' from '{}'", asset.name, asset.browser_download_url);

        let res = select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(GitHubError::Cancelled),
            res = self.download.get(asset.browser_download_url.clone()).send() => res,
        };
        let res = res
            .and_then(|res| res.error_for_status())
            .inspect_err(|e| error!("error downloading file: {e}"))?;

        let total = res.content_length().filter(|len| *len > 0);
        let mut stream = res.bytes_stream();
        let mut file = fs::File::create(dest).await?;
        let mut written = 0u64;

        loop {
            let chunk = select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(GitHubError::Cancelled),
                chunk = stream.try_next() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(total) = total {
                on_progress((written as f64 / total as f64).min(1.0));
            }
        }
        file.flush().await?;
        on_progress(1.0);

        debug!("downloaded {written} bytes into {}", dest.display());
        Ok(written)
    }
}
