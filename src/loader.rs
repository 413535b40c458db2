use crate::{
    config::CoverConfig,
    foundation::error::{CoverError, CoverResult},
    service::build_http_client,
    source,
};

/// Fetches the raw bytes of one resolved image location.
#[allow(async_fn_in_trait)]
pub trait ImageLoader {
    async fn fetch(&self, location: &str) -> CoverResult<Vec<u8>>;
}

/// Loads `data:` URLs inline and everything else over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpImageLoader {
    http: reqwest::Client,
}

impl HttpImageLoader {
    pub fn new(config: &CoverConfig) -> CoverResult<Self> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl ImageLoader for HttpImageLoader {
    async fn fetch(&self, location: &str) -> CoverResult<Vec<u8>> {
        if source::is_data_url(location) {
            let (_, bytes) = source::decode(location)?;
            return Ok(bytes);
        }

        let url = url::Url::parse(location)
            .map_err(|e| CoverError::transport(format!("invalid image location '{location}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoverError::transport(format!(
                "unsupported image location scheme '{}'",
                url.scheme()
            )));
        }

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoverError::transport(format!(
                "image fetch failed with HTTP {} for '{location}'",
                status.as_u16()
            )));
        }
        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), location, "fetched image");
        Ok(bytes.to_vec())
    }
}
