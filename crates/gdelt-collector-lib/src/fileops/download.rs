use crate::config::HttpConfig;
use crate::error::CollectorError;
use futures::StreamExt;
use opendal::Operator;
use opendal::layers::{RetryLayer, TimeoutLayer};
use opendal::services::Http;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// HTTP archive downloader. Stateless apart from the transport knobs; safe to
/// clone into concurrent pipelines.
#[derive(Clone, Debug)]
pub struct Downloader {
    http: HttpConfig,
}

impl Downloader {
    pub fn new(http: HttpConfig) -> Self {
        Self { http }
    }

    fn build_operator(&self, base_url: &str) -> Result<Operator, CollectorError> {
        let builder = Http::default().endpoint(base_url);

        let op = Operator::new(builder)
            .map_err(|e| CollectorError::Transport {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?
            .layer(
                TimeoutLayer::new()
                    .with_timeout(self.http.read_timeout())
                    .with_io_timeout(self.http.read_timeout()),
            )
            .layer(
                RetryLayer::new()
                    .with_max_times(self.http.retry_max_attempts)
                    .with_min_delay(Duration::from_millis(self.http.retry_period_ms))
                    .with_max_delay(Duration::from_millis(self.http.retry_max_period_ms)),
            )
            .finish();
        Ok(op)
    }

    /// Streams `url` to `target_path`, truncating any existing file. The
    /// parent directory is created if missing.
    pub async fn download(&self, url: &str, target_path: &Path) -> Result<PathBuf, CollectorError> {
        let transport_err = |reason: String| CollectorError::Transport {
            url: url.to_string(),
            reason,
        };

        let parsed = Url::parse(url).map_err(|e| transport_err(e.to_string()))?;
        let mut base = parsed.clone();
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);
        let base_url = base.as_str().trim_end_matches('/').to_string();
        let rel_path = parsed.path().to_string();

        if let Some(parent) = target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let op = self.build_operator(&base_url)?;
        let mut reader = op
            .reader(&rel_path)
            .await
            .map_err(|e| transport_err(e.to_string()))?
            .into_stream(..)
            .await
            .map_err(|e| transport_err(e.to_string()))?;

        let file = tokio::fs::File::create(target_path).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        while let Some(chunk) = reader.next().await {
            let buffer = chunk.map_err(|e| transport_err(e.to_string()))?.to_bytes();
            tokio::io::AsyncWriteExt::write_all(&mut writer, &buffer).await?;
        }
        tokio::io::AsyncWriteExt::flush(&mut writer).await?;

        info!(url, target = %target_path.display(), "Downloaded");
        Ok(target_path.to_path_buf())
    }
}
