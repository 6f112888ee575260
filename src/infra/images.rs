//! HTTP poster fetcher.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};
use tracing::debug;

use super::error::InfraError;
use crate::application::ports::{FetchedImage, ImageFetchError, ImageFetcher};

const SOURCE: &str = "infra::images";

#[derive(Clone, Debug)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("guesssenpai/", env!("CARGO_PKG_VERSION"))
    }
}

/// Only absolute http(s) URLs are fetched.
pub(crate) fn parse_image_url(raw: &str) -> Result<Url, ImageFetchError> {
    let invalid = || ImageFetchError::InvalidUrl {
        url: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageFetchError> {
        let url = parse_image_url(url)?;
        let started_at = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ImageFetchError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ImageFetchError::Request(err.to_string()))?;

        debug!(
            target = SOURCE,
            op = "fetch",
            url = %url,
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64
        );
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
