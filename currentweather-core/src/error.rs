use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// How a non-success HTTP status is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 400: the server rejected the request as malformed.
    MalformedRequest,
    /// 404: nothing found for the request.
    NotFound,
    /// Any other non-success status.
    Generic,
}

impl FailureClass {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => FailureClass::MalformedRequest,
            404 => FailureClass::NotFound,
            _ => FailureClass::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::MalformedRequest => "malformed request",
            FailureClass::NotFound => "not found",
            FailureClass::Generic => "generic failure",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single weather fetch. Every variant is terminal for that attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Weather request failed with status {status} ({class}): {body}")]
    Status {
        class: FailureClass,
        status: StatusCode,
        body: String,
    },

    /// No response was received at all.
    #[error("Failed to reach the weather service")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to parse weather response")]
    Parse(#[source] serde_json::Error),
}

impl FetchError {
    pub fn status(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Status { class: FailureClass::from_status(status), status, body: body.into() }
    }

    /// Classification of an HTTP failure, `None` for transport and parse errors.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            FetchError::Status { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// Failure of the durable key-value store behind the cache.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed for {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage contents are not valid JSON")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage task did not complete")]
    Task(#[from] tokio::task::JoinError),
}

/// A location registration that cannot start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location services are turned off")]
    ServicesDisabled,

    #[error("Location permission has been denied")]
    PermissionDenied,

    #[error("Location request rejected: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(FailureClass::from_status(StatusCode::BAD_REQUEST), FailureClass::MalformedRequest);
        assert_eq!(FailureClass::from_status(StatusCode::NOT_FOUND), FailureClass::NotFound);
        assert_eq!(FailureClass::from_status(StatusCode::UNAUTHORIZED), FailureClass::Generic);
        assert_eq!(
            FailureClass::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            FailureClass::Generic
        );
    }

    #[test]
    fn status_error_carries_class() {
        let err = FetchError::status(StatusCode::NOT_FOUND, "city not found");
        assert_eq!(err.class(), Some(FailureClass::NotFound));

        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("not found"));
    }
}
