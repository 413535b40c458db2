pub type CoverResult<T> = Result<T, CoverError>;

#[derive(thiserror::Error, Debug)]
pub enum CoverError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-success response from the image resolution service.
    #[error("service error: HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Service { status: u16, message: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoverError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn service(status: u16, message: Option<String>) -> Self {
        Self::Service { status, message }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Text shown as the description of a user-facing notice.
    ///
    /// Service failures surface the server's own `message`; everything else falls back to the
    /// error display.
    pub fn user_description(&self) -> Option<String> {
        match self {
            Self::Service { message, .. } => message.clone().filter(|m| !m.trim().is_empty()),
            other => Some(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CoverError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<image::ImageError> for CoverError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CoverError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            CoverError::transport("x")
                .to_string()
                .contains("transport error:")
        );
        assert!(CoverError::decode("x").to_string().contains("decode error:"));
        assert!(CoverError::export("x").to_string().contains("export error:"));
    }

    #[test]
    fn service_display_includes_message_when_present() {
        let with = CoverError::service(400, Some("bad playlist".to_string()));
        assert_eq!(with.to_string(), "service error: HTTP 400: bad playlist");

        let without = CoverError::service(502, None);
        assert_eq!(without.to_string(), "service error: HTTP 502");
    }

    #[test]
    fn user_description_prefers_service_message() {
        let err = CoverError::service(400, Some("playlist is private".to_string()));
        assert_eq!(err.user_description().as_deref(), Some("playlist is private"));

        let blank = CoverError::service(500, Some("  ".to_string()));
        assert_eq!(blank.user_description(), None);

        let other = CoverError::decode("truncated png");
        assert_eq!(
            other.user_description().as_deref(),
            Some("decode error: truncated png")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CoverError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
