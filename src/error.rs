use thiserror::Error;

/// Unified error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Git library error: {0}")]
    Git2(#[from] git2::Error),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Version range violation: {0}")]
    VersionRange(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State error: {0}")]
    State(String),
}

/// Convenience type alias for Results in git-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Configuration(msg.into())
    }

    /// Create a git error with context
    pub fn git(msg: impl Into<String>) -> Self {
        ReleaseError::Git(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a version range error with context
    pub fn version_range(msg: impl Into<String>) -> Self {
        ReleaseError::VersionRange(msg.into())
    }

    /// Create a template error with context
    pub fn template(msg: impl Into<String>) -> Self {
        ReleaseError::Template(msg.into())
    }

    /// Create a service error with context
    pub fn service(msg: impl Into<String>) -> Self {
        ReleaseError::Service(msg.into())
    }

    /// Create a security error with context
    pub fn security(msg: impl Into<String>) -> Self {
        ReleaseError::Security(msg.into())
    }

    /// Create a state error with context
    pub fn state(msg: impl Into<String>) -> Self {
        ReleaseError::State(msg.into())
    }

    /// Process exit code associated with this error kind
    ///
    /// 0 is success and never produced here; 1 is the generic failure code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseError::Configuration(_) => 2,
            ReleaseError::Git(_) | ReleaseError::Git2(_) => 3,
            ReleaseError::VersionRange(_) => 4,
            ReleaseError::Service(_) => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("missing release type");
        assert_eq!(err.to_string(), "Configuration error: missing release type");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(ReleaseError::version("test").to_string().contains("Version"));
        assert!(ReleaseError::git("test").to_string().contains("Git"));
        assert!(ReleaseError::template("test")
            .to_string()
            .contains("Template"));
        assert!(ReleaseError::service("test").to_string().contains("Service"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ReleaseError::config("x").exit_code(), 2);
        assert_eq!(ReleaseError::git("x").exit_code(), 3);
        assert_eq!(ReleaseError::version_range("x").exit_code(), 4);
        assert_eq!(ReleaseError::service("x").exit_code(), 5);
        assert_eq!(ReleaseError::template("x").exit_code(), 1);
        assert_eq!(ReleaseError::security("x").exit_code(), 1);
        assert_eq!(ReleaseError::state("x").exit_code(), 1);
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (ReleaseError::config("x"), "Configuration error"),
            (ReleaseError::version("x"), "Version parsing error"),
            (ReleaseError::version_range("x"), "Version range violation"),
            (ReleaseError::template("x"), "Template error"),
            (ReleaseError::service("x"), "Service error"),
            (ReleaseError::security("x"), "Security error"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<String> {
            Err(ReleaseError::version("test error"))
        }

        assert!(returns_error().is_err());
    }
}
