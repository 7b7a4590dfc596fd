use reqwest::Url;
use std::path::PathBuf;

/// Launch URL query parameter naming the model to load.
pub const MODEL_PARAM: &str = "model";

/// Base used to resolve bare query strings such as `?model=foo.glb`.
const LAUNCH_BASE: &str = "modelview://launch/";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SourceError {
    #[error("invalid launch URL {url:?}: {reason}")]
    InvalidLaunchUrl { url: String, reason: String },
    #[error("file URL {0} has no local path")]
    NotALocalPath(String),
}

/// Identifier of the model asset to load: a URL or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSource(String);

/// Where a [`ModelSource`] is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(Url),
    File(PathBuf),
}

impl ModelSource {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    /// Use the `model` parameter value, falling back to `default` when it is
    /// absent or empty.
    pub fn resolve(param: Option<&str>, default: &str) -> Self {
        match param {
            Some(id) if !id.is_empty() => Self::new(id),
            _ => Self::new(default),
        }
    }

    /// Read the `model` query parameter from a launch URL.
    ///
    /// Accepts absolute URLs, relative references, and bare query strings.
    pub fn from_launch_url(launch: &str, default: &str) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::InvalidLaunchUrl {
            url: launch.to_string(),
            reason,
        };
        let base = Url::parse(LAUNCH_BASE).map_err(|e| invalid(e.to_string()))?;
        let url = Url::options()
            .base_url(Some(&base))
            .parse(launch)
            .map_err(|e| invalid(e.to_string()))?;
        let param = url
            .query_pairs()
            .find(|(key, _)| key == MODEL_PARAM)
            .map(|(_, value)| value.into_owned());
        Ok(Self::resolve(param.as_deref(), default))
    }

    pub fn identifier(&self) -> &str {
        &self.0
    }

    /// Classify the identifier: `http(s)` URLs are remote, `file` URLs and
    /// everything else are local paths.
    pub fn location(&self) -> Result<SourceLocation, SourceError> {
        match Url::parse(&self.0) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(SourceLocation::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(SourceLocation::File)
                .map_err(|()| SourceError::NotALocalPath(self.0.clone())),
            _ => Ok(SourceLocation::File(PathBuf::from(&self.0))),
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
