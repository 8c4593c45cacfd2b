//! Tunable limits for the server, a connection, a request, and a response.
//!
//! All limits ship with defaults that satisfy the wire-level invariants the
//! parser enforces (see [`ReqLimits`]); widening them is safe, narrowing them
//! below the parser's own boundary checks is not validated here.

use std::time::Duration;

/// Strategy used by idle workers waiting for the next connection to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Yield the task back to the runtime; busier but lower latency.
    Yield,
    /// Sleep for a fixed duration between polls; cheaper on an idle server.
    Sleep(Duration),
}

/// Limits that govern the worker pool and admission queue as a whole.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of preallocated connection workers (the in-flight slot count).
    pub max_connections: usize,
    /// Capacity of the admission queue; connections beyond this are routed
    /// to a 503 responder instead of a worker.
    pub max_pending_connections: usize,
    /// How an idle worker waits for the next connection.
    pub wait_strategy: WaitStrategy,
    /// Number of dedicated 503-responder tasks draining the overflow queue.
    /// `0` means overflow connections are dropped without a response.
    pub count_503_handlers: usize,
    /// Whether error responses are rendered as JSON bodies or as a bare
    /// status line. Defaults to `false`: parser/handler error dispatch
    /// writes only a status line, no body and no additional headers.
    pub json_errors: bool,
    _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 512,
            max_pending_connections: 1024,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            count_503_handlers: 1,
            json_errors: false,
            _priv: (),
        }
    }
}

/// Limits that govern the lifetime and pacing of a single connection.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Deadline for a single `read` to produce bytes before the connection
    /// is torn down.
    pub socket_read_timeout: Duration,
    /// Deadline for a `write_all` of a response to complete.
    pub socket_write_timeout: Duration,
    /// Requests served per connection before it is forced to close, even if
    /// still within its keep-alive window.
    pub max_requests_per_connection: usize,
    /// Idle timer: a connection with no request in flight for longer than
    /// this is expired and shut down. Derived from `server.http.keepalive`
    /// via [`crate::config::Config::connection_limits`]; defaults to 120s
    /// when constructed directly rather than from a `Config`.
    pub connection_lifetime: Duration,
    /// When `false` (the default, matching the spec's literal
    /// always-terminate-after-one-response behavior), every response closes
    /// the connection. When `true`, the connection loops back to Reading
    /// instead of terminating.
    pub keepalive_reuse: bool,
    _priv: (),
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            max_requests_per_connection: 100,
            connection_lifetime: Duration::from_secs(120),
            keepalive_reuse: false,
            _priv: (),
        }
    }
}

/// Limits enforced by the request parser.
///
/// Defaults mirror the exact boundary invariants the parser is tested
/// against: a 4000-byte request target, up to 8 query pairs, up to 24
/// headers, a 256-byte header name and a 4096-byte header value, all inside
/// a fixed 16 KiB buffer.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum length, in bytes, of the request target (path + query).
    pub url_size: usize,
    /// Maximum number of query name/value pairs.
    pub url_query_parts: usize,
    /// Maximum number of headers.
    pub header_count: usize,
    /// Maximum length, in bytes, of a header name.
    pub header_name_size: usize,
    /// Maximum length, in bytes, of a header value.
    pub header_value_size: usize,
    /// Size, in bytes, of the fixed read/response buffer shared by a
    /// connection.
    pub buffer_size: usize,
    pub(crate) precalc: ReqLimitsPrecalc,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReqLimitsPrecalc {
    pub(crate) first_line_max: usize,
    pub(crate) h_line_max: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            url_size: 4000,
            url_query_parts: 8,
            header_count: 24,
            header_name_size: 256,
            header_value_size: 4096,
            buffer_size: 16 * 1024,
            precalc: ReqLimitsPrecalc::default(),
        }
    }
}

impl ReqLimits {
    /// Precomputes derived bounds used by the parser's hot path.
    #[inline]
    pub(crate) fn precalculate(mut self) -> Self {
        // method ("POST", the longest) + SP + target + SP + "HTTP/1.1" + CRLF
        self.precalc.first_line_max = 4 + 1 + self.url_size + 1 + 8 + 2;
        self.precalc.h_line_max = self.header_name_size + 2 + self.header_value_size + 2;
        self
    }

    #[inline]
    pub(crate) fn buffer(&self) -> usize {
        self.buffer_size
    }
}

/// Limits on response buffer growth.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity reserved for a fresh response buffer.
    pub default_capacity: usize,
    /// If a reused buffer's capacity exceeds this, it is reallocated at
    /// `default_capacity` instead of kept, bounding per-connection memory.
    pub max_capacity: usize,
    _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 8192,
            _priv: (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_limits_precalculate() {
        let limits = ReqLimits::default().precalculate();
        assert_eq!(limits.precalc.first_line_max, 4 + 1 + 4000 + 1 + 8 + 2);
        assert_eq!(limits.precalc.h_line_max, 256 + 2 + 4096 + 2);
    }

    #[test]
    fn defaults_match_wire_invariants() {
        let limits = ReqLimits::default();
        assert_eq!(limits.url_size, 4000);
        assert_eq!(limits.header_count, 24);
        assert_eq!(limits.url_query_parts, 8);
        assert_eq!(limits.header_name_size, 256);
        assert_eq!(limits.header_value_size, 4096);
        assert_eq!(limits.buffer_size, 16 * 1024);
    }
}
