use std::path::PathBuf;

/// Errors that can occur across orgpulse.
///
/// Only the boundary (reading logs, opening repositories, loading
/// configuration) produces these. Classification, clustering and aggregation
/// are total over noisy input and never fail. The binary crate converts to
/// `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use orgpulse_core::OrgpulseError;
///
/// let err = OrgpulseError::Config("missing [classify] org_domains".into());
/// assert!(err.to_string().contains("org_domains"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum OrgpulseError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// Malformed input that cannot be coerced.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: OrgpulseError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = OrgpulseError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = OrgpulseError::FileNotFound(PathBuf::from("/tmp/commits.log"));
        assert!(err.to_string().contains("/tmp/commits.log"));
    }

    #[test]
    fn toml_error_converts() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: OrgpulseError = toml_err.into();
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
