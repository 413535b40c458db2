//! Client for the external image resolution service.
//!
//! Share links are not directly drawable; the service turns them (or a single playlist link)
//! into raster image locations.

use std::time::Duration;

use crate::{
    config::CoverConfig,
    foundation::core::{ContentType, GridSize},
    foundation::error::{CoverError, CoverResult},
    wizard::{CellGrid, SourceKind},
};

/// Request body: `{ "type": "track", "size": 3, "urls": [...] }`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ResolveRequest {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub size: GridSize,
    pub urls: Vec<String>,
}

impl ResolveRequest {
    /// URL cells in row-major order. Uploaded files are drawn as-is and never sent.
    pub fn for_track(grid: GridSize, cells: &CellGrid) -> Self {
        let urls = cells
            .iter()
            .filter(|c| c.kind == SourceKind::Url && !c.is_empty())
            .map(|c| c.value.clone())
            .collect();
        Self {
            content_type: ContentType::Track,
            size: grid,
            urls,
        }
    }

    pub fn for_playlist(grid: GridSize, playlist_url: &str) -> Self {
        Self {
            content_type: ContentType::Playlist,
            size: grid,
            urls: vec![playlist_url.to_string()],
        }
    }

    /// Number of locations the service must return.
    pub fn expected_len(&self) -> usize {
        match self.content_type {
            ContentType::Track => self.urls.len(),
            ContentType::Playlist => self.size.cell_count(),
        }
    }
}

/// The two response shapes seen in the wild.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum ResolveResponse {
    Envelope {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        urls: Option<Vec<String>>,
    },
    Bare(Vec<String>),
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Parse a successful response body into resolved locations.
pub fn parse_response(body: &[u8], expected_len: usize) -> CoverResult<Vec<String>> {
    let parsed: ResolveResponse = serde_json::from_slice(body)
        .map_err(|e| CoverError::transport(format!("malformed service response: {e}")))?;
    let urls = match parsed {
        ResolveResponse::Bare(urls) => urls,
        ResolveResponse::Envelope {
            urls: Some(urls), ..
        } => urls,
        ResolveResponse::Envelope {
            urls: None,
            message,
            ..
        } => {
            return Err(CoverError::transport(format!(
                "service response has no urls{}",
                message.map(|m| format!(": {m}")).unwrap_or_default()
            )));
        }
    };
    if urls.len() != expected_len {
        return Err(CoverError::transport(format!(
            "service returned {} image(s), expected {expected_len}",
            urls.len()
        )));
    }
    Ok(urls)
}

/// Map a non-success status and its body to a service error.
pub fn error_from_status(status: u16, body: &[u8]) -> CoverError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message);
    CoverError::service(status, message)
}

/// Resolves source links into drawable image locations, same length and order.
#[allow(async_fn_in_trait)]
pub trait CoverService {
    async fn resolve(&self, request: &ResolveRequest) -> CoverResult<Vec<String>>;
}

/// [`CoverService`] over HTTP JSON POST.
#[derive(Clone, Debug)]
pub struct HttpCoverService {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCoverService {
    pub fn new(config: &CoverConfig) -> CoverResult<Self> {
        let http = build_http_client(config)?;
        Ok(Self::with_client(http, config.service_url.clone()))
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

impl CoverService for HttpCoverService {
    #[tracing::instrument(skip(self, request), fields(kind = %request.content_type, size = %request.size, n = request.urls.len()))]
    async fn resolve(&self, request: &ResolveRequest) -> CoverResult<Vec<String>> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "image service rejected request");
            return Err(error_from_status(status.as_u16(), &body));
        }

        let urls = parse_response(&body, request.expected_len())?;
        tracing::debug!(resolved = urls.len(), "image service resolved sources");
        Ok(urls)
    }
}

/// Shared HTTP client settings for the service and image loader.
pub fn build_http_client(config: &CoverConfig) -> CoverResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| CoverError::transport(format!("failed to build HTTP client: {e}")))
}

/// Rebuild the full row-major list of drawable locations for a track grid.
///
/// URL cells take resolved entries in order; uploaded files keep their inline data.
pub fn merge_locations(cells: &CellGrid, resolved: &[String]) -> CoverResult<Vec<String>> {
    let mut resolved = resolved.iter();
    let merged = cells
        .iter()
        .map(|cell| match cell.kind {
            SourceKind::File => Ok(cell.value.clone()),
            SourceKind::Url if cell.is_empty() => {
                Err(CoverError::validation("cannot render an empty cell"))
            }
            SourceKind::Url => resolved
                .next()
                .cloned()
                .ok_or_else(|| CoverError::transport("service returned too few images")),
        })
        .collect::<CoverResult<Vec<_>>>()?;
    if resolved.next().is_some() {
        return Err(CoverError::transport("service returned too many images"));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::ImageSource;

    fn g(n: u8) -> GridSize {
        GridSize::new(n).unwrap()
    }

    fn upload(tag: &str) -> ImageSource {
        ImageSource {
            kind: SourceKind::File,
            value: format!("data:image/png;base64,{tag}"),
            file_name: None,
        }
    }

    fn mixed_grid() -> CellGrid {
        CellGrid::from_sources(
            g(2),
            vec![
                upload("AAAA"),
                ImageSource::url("https://s.example/a"),
                upload("BBBB"),
                ImageSource::url("https://s.example/b"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn track_request_sends_only_url_cells() {
        let req = ResolveRequest::for_track(g(2), &mixed_grid());
        assert_eq!(req.urls, vec!["https://s.example/a", "https://s.example/b"]);
        assert_eq!(req.expected_len(), 2);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "track",
                "size": 2,
                "urls": ["https://s.example/a", "https://s.example/b"],
            })
        );
    }

    #[test]
    fn playlist_request_expects_a_full_grid() {
        let req = ResolveRequest::for_playlist(g(3), "https://open.example/playlist/1");
        assert_eq!(req.urls.len(), 1);
        assert_eq!(req.expected_len(), 9);
    }

    #[test]
    fn merge_keeps_uploads_in_place() {
        let merged = merge_locations(
            &mixed_grid(),
            &["https://img.example/a.jpg".to_string(), "https://img.example/b.jpg".to_string()],
        )
        .unwrap();
        assert_eq!(
            merged,
            vec![
                "data:image/png;base64,AAAA",
                "https://img.example/a.jpg",
                "data:image/png;base64,BBBB",
                "https://img.example/b.jpg",
            ]
        );
    }

    #[test]
    fn merge_rejects_count_mismatch() {
        assert!(merge_locations(&mixed_grid(), &["x".to_string()]).is_err());
        let three = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        assert!(merge_locations(&mixed_grid(), &three).is_err());
    }

    #[test]
    fn parse_accepts_envelope_and_bare_shapes() {
        let env = br#"{"status":200,"message":"ok","urls":["a","b"]}"#;
        assert_eq!(parse_response(env, 2).unwrap(), vec!["a", "b"]);

        let bare = br#"["a","b","c","d"]"#;
        assert_eq!(parse_response(bare, 4).unwrap().len(), 4);
    }

    #[test]
    fn parse_rejects_missing_urls_and_wrong_counts() {
        let no_urls = br#"{"status":200,"message":"nothing found"}"#;
        let err = parse_response(no_urls, 1).unwrap_err();
        assert!(err.to_string().contains("nothing found"));

        assert!(parse_response(br#"["a"]"#, 4).is_err());
        assert!(parse_response(b"<html>", 1).is_err());
    }

    #[test]
    fn error_status_surfaces_body_message() {
        let err = error_from_status(400, br#"{"status":400,"message":"invalid link"}"#);
        assert_eq!(err.user_description().as_deref(), Some("invalid link"));

        let plain = error_from_status(502, b"Bad Gateway");
        assert!(matches!(
            plain,
            CoverError::Service {
                status: 502,
                message: None
            }
        ));
    }
}
