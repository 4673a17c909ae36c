//! The network seam of the downloader and its reqwest implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::dns::Resolve;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::resolver::PublicDnsResolver;

/// User agent sent with every artifact request.
pub const USER_AGENT: &str = "configflow-agent/1.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Fetches one remote artifact into a local file.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` into `destination`, returning the number of bytes written.
    ///
    /// The destination's parent directory already exists.
    async fn fetch(&self, url: &str, destination: &Path) -> FetchResult<u64>;
}

/// HTTP fetcher resolving hosts through public DNS.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher using [`PublicDnsResolver::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> FetchResult<Self> {
        Self::with_resolver(PublicDnsResolver::default())
    }

    /// Fetcher using a caller-supplied resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_resolver<R>(resolver: R) -> FetchResult<Self>
    where
        R: Resolve + 'static,
    {
        let client = Client::builder()
            .dns_resolver(Arc::new(resolver))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .no_proxy()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> FetchResult<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::http("send", url, source))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(destination)
            .await
            .map_err(|source| FetchError::io("create_artifact", destination, source))?;
        let mut written = 0_u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| FetchError::http("read_body", url, source))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|source| FetchError::io("write_artifact", destination, source))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|source| FetchError::io("flush_artifact", destination, source))?;
        debug!(url, path = %destination.display(), bytes = written, "artifact downloaded");
        Ok(written)
    }
}
