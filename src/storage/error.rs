use std::fmt;
use std::path::PathBuf;

use log::error;
use thiserror::Error;

/// A structured error returned by the object-store provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
    pub http_status: Option<u16>,
}

impl ProviderError {
    /// Actionable hint for the codes operators most often hit.
    pub fn guidance(&self) -> Option<&'static str> {
        match self.code.as_str() {
            "AccessDenied" => Some("Access denied: check your S3 credentials and bucket policy."),
            "InvalidArgument" => {
                Some("Invalid argument: possibly using console/UI port instead of API port.")
            }
            "InvalidAccessKeyId" => {
                Some("InvalidAccessKeyId: the S3 access key is incorrect or does not exist.")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S3 error {}: {} (request id: {}, HTTP status: {})",
            self.code,
            self.message,
            self.request_id.as_deref().unwrap_or("N/A"),
            self.http_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "N/A".to_string())
        )
    }
}

impl std::error::Error for ProviderError {}

/// Classified failure of a single object-store call.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("S3 credentials not found or invalid: {0}")]
    MissingCredentials(String),

    #[error("cannot reach the S3 endpoint: {0}")]
    EndpointUnreachable(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Other(String),
}

impl StorageFailure {
    /// Log the failure with everything needed to diagnose it without a rerun.
    pub fn log_diagnostics(&self, context: &str) {
        match self {
            StorageFailure::Provider(err) => {
                error!("[{}] S3 ClientError {}: {}", context, err.code, err.message);
                error!(
                    "[{}] Request ID: {} | HTTP Status Code: {}",
                    context,
                    err.request_id.as_deref().unwrap_or("N/A"),
                    err.http_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "N/A".to_string())
                );
                if let Some(hint) = err.guidance() {
                    error!("[{}] {}", context, hint);
                }
            }
            other => error!("[{}] {}", context, other),
        }
    }
}

/// Failure of the fail-fast connectivity check.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("S3 credentials not found or invalid: {0}")]
    MissingCredentials(String),

    #[error("failed to connect to the S3 endpoint {endpoint}, check DNS and port: {cause}")]
    EndpointUnreachable { endpoint: String, cause: String },

    #[error("S3 connection failed: {0}")]
    ClientError(ProviderError),

    #[error("unexpected error during S3 connection setup: {0}")]
    Other(String),
}

impl ConnectError {
    pub fn from_failure(failure: StorageFailure, endpoint: &str) -> Self {
        match failure {
            StorageFailure::MissingCredentials(msg) => ConnectError::MissingCredentials(msg),
            StorageFailure::EndpointUnreachable(cause) => ConnectError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                cause,
            },
            StorageFailure::Provider(err) => ConnectError::ClientError(err),
            StorageFailure::Other(msg) => ConnectError::Other(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("S3 client not initialized, connect() must succeed before upload")]
    NotConnected,

    #[error("failed to read {}: {source}", path.display())]
    ReadLocal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact has no file name: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("S3 upload of {key} failed: {source}")]
    Store {
        key: String,
        #[source]
        source: StorageFailure,
    },
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("S3 client not initialized, connect() must succeed before listing")]
    NotConnected,

    #[error("S3 listing of prefix {prefix:?} failed: {source}")]
    Store {
        prefix: String,
        #[source]
        source: StorageFailure,
    },
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("S3 client not initialized, connect() must succeed before delete")]
    NotConnected,

    #[error("S3 delete of {key} failed: {source}")]
    Store {
        key: String,
        #[source]
        source: StorageFailure,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(code: &str) -> ProviderError {
        ProviderError {
            code: code.to_string(),
            message: "message".to_string(),
            request_id: Some("17A2B3C4D5E6F708".to_string()),
            http_status: Some(403),
        }
    }

    #[test]
    fn test_guidance_for_known_codes() {
        assert!(provider("AccessDenied").guidance().unwrap().contains("bucket policy"));
        assert!(provider("InvalidArgument").guidance().unwrap().contains("API port"));
        assert!(provider("InvalidAccessKeyId").guidance().unwrap().contains("access key"));
        assert_eq!(provider("NoSuchBucket").guidance(), None);
    }

    #[test]
    fn test_provider_display_carries_diagnostics() {
        let rendered = provider("NoSuchBucket").to_string();
        assert!(rendered.contains("NoSuchBucket"));
        assert!(rendered.contains("17A2B3C4D5E6F708"));
        assert!(rendered.contains("403"));

        let bare = ProviderError {
            code: "Unknown".to_string(),
            message: "Unknown error".to_string(),
            request_id: None,
            http_status: None,
        };
        assert!(bare.to_string().contains("request id: N/A"));
    }

    #[test]
    fn test_connect_error_mapping() {
        let err = ConnectError::from_failure(
            StorageFailure::EndpointUnreachable("dns error".to_string()),
            "https://minio.local:9000",
        );
        match err {
            ConnectError::EndpointUnreachable { endpoint, cause } => {
                assert_eq!(endpoint, "https://minio.local:9000");
                assert_eq!(cause, "dns error");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = ConnectError::from_failure(
            StorageFailure::Provider(provider("AccessDenied")),
            "https://minio.local:9000",
        );
        assert!(matches!(err, ConnectError::ClientError(p) if p.code == "AccessDenied"));
    }
}
