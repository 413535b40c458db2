use crate::foundation::error::CoverError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One user-visible notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description,
        }
        .logged()
    }

    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description,
        }
        .logged()
    }

    pub fn render_failed(err: &CoverError) -> Self {
        Self::error("Failed to generate the image", err.user_description())
    }

    pub fn copied() -> Self {
        Self::success("Copied the image to the clipboard", None)
    }

    pub fn copy_failed(err: &CoverError) -> Self {
        Self::error("Failed to copy to the clipboard", err.user_description())
    }

    pub fn download_failed(err: &CoverError) -> Self {
        Self::error("Failed to download the image", err.user_description())
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    fn logged(self) -> Self {
        let description = self.description.as_deref().unwrap_or("");
        match self.level {
            NoticeLevel::Success => tracing::info!(title = %self.title, description, "notice"),
            NoticeLevel::Error => tracing::warn!(title = %self.title, description, "notice"),
        }
        self
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{}: {d}", self.title),
            None => f.write_str(&self.title),
        }
    }
}
