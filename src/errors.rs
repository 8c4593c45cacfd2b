use std::{error, fmt, io};

/// Parse/dispatch/IO error taxonomy, per §7 of the wire contract.
///
/// `LimitExceeded` maps to 413. Every other `ParseError` variant
/// (`MalformedRequest`, `Unsupported`, `InvalidMethodName`, `UriTooLong`,
/// `HeaderTooLong`) maps to 500 — preserved as-is rather than "corrected" to
/// 400/501, per the recorded decision in DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ErrorKind {
    MalformedRequest,
    Unsupported,
    InvalidMethodName,
    UriTooLong,
    HeaderTooLong,
    LimitExceeded,

    HandlerError,
    ServiceUnavailable,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        pub(crate) const fn as_http(&self, json: bool) -> &'static [u8] {
            match (json, self) { $(
                (true, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        MalformedRequest: "500 Internal Server Error", "58"
            => r#"{"error":"Malformed request","code":"MALFORMED_REQUEST"}"#;
        Unsupported: "500 Internal Server Error", "53"
            => r#"{"error":"Unsupported request","code":"UNSUPPORTED"}"#;
        InvalidMethodName: "500 Internal Server Error", "56"
            => r#"{"error":"Invalid method name","code":"INVALID_METHOD_NAME"}"#;
        UriTooLong: "500 Internal Server Error", "48"
            => r#"{"error":"URI too long","code":"URI_TOO_LONG"}"#;
        HeaderTooLong: "500 Internal Server Error", "51"
            => r#"{"error":"Header too long","code":"HEADER_TOO_LONG"}"#;
        LimitExceeded: "413 Payload Too Large", "53"
            => r#"{"error":"Limit exceeded","code":"LIMIT_EXCEEDED"}"#;

        HandlerError: "500 Internal Server Error", "49"
            => r#"{"error":"Handler failed","code":"HANDLER_ERROR"}"#;
        ServiceUnavailable: "503 Service Unavailable", "72"
            => r#"{"error":"Service temporarily unavailable","code":"SERVICE_UNAVAILABLE"}"#;
        Io: "503 Service Unavailable", "48"
            => r#"{"error":"I/O error occurred","code":"IO_ERROR"}"#;
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IoError(pub(crate) io::ErrorKind);

impl From<&io::Error> for IoError {
    fn from(err: &io::Error) -> Self {
        IoError(err.kind())
    }
}

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Fatal, process-exiting errors: configuration problems and route-table
/// construction failures. Both abort startup before the listening socket
/// is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config as TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unrecognized log level {0:?}; expected one of DEBUG, INFO, WARN, ERROR, FATAL")]
    UnrecognizedLogLevel(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteTableError {
    #[error("duplicate route URL {0:?}")]
    DuplicateUrl(String),
    #[error("TUNNEL agent {0:?} is not allowed in a DataApi lane")]
    TunnelInDataApi(String),
    #[error("non-GET agent {0:?} is not allowed in a WebPage lane")]
    NonGetInWebPage(String),
    #[error("non-TUNNEL agent {0:?} is not allowed in a WebSocket lane")]
    NonTunnelInWebSocket(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_exceeded_maps_to_413() {
        assert!(ErrorKind::LimitExceeded
            .as_http(false)
            .starts_with(b"HTTP/1.1 413"));
    }

    #[test]
    fn parse_errors_map_to_500() {
        for err in [
            ErrorKind::MalformedRequest,
            ErrorKind::Unsupported,
            ErrorKind::InvalidMethodName,
            ErrorKind::UriTooLong,
            ErrorKind::HeaderTooLong,
        ] {
            assert!(err.as_http(false).starts_with(b"HTTP/1.1 500"));
        }
    }

    #[test]
    fn io_errors_compare_by_kind() {
        let a = IoError(io::ErrorKind::TimedOut);
        let b = IoError(io::ErrorKind::TimedOut);
        let c = IoError(io::ErrorKind::BrokenPipe);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
