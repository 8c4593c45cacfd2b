//! The request parser and the [`Request`] it populates.
//!
//! The parser is a pure function over a byte buffer: it writes only into
//! the `Request` it is given and never allocates. All string fields of a
//! parsed `Request` are sub-slices of the connection's read buffer, whose
//! lifetime is extended to `'static` via [`Parser::extend_lifetime`] — sound
//! only because the owning connection state never reuses the buffer while
//! the `Request` it produced is still in scope (see the FSM in
//! `server::connection`, which drops both together on every reset).

use crate::{
    errors::ErrorKind,
    http::{
        query::{self, MAX_QUERY_PARTS},
        types::{Method, Version},
    },
    limits::ReqLimits,
};
use memchr::memchr;
use std::{
    io, mem,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{io::AsyncReadExt, net::TcpStream, time::sleep};

/// Fixed capacity of the header arrays in [`Request`].
pub(crate) const MAX_HEADERS: usize = 24;

const UNSPECIFIED_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

/// A parsed HTTP request.
///
/// Every byte slice exposed here borrows from the connection's read buffer;
/// it is only valid for the lifetime of the request that produced it.
#[repr(align(128))]
pub struct Request {
    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,

    method: Method,
    path: &'static [u8],

    q_name: [&'static [u8]; MAX_QUERY_PARTS],
    q_value: [&'static [u8]; MAX_QUERY_PARTS],
    q_offset: usize,

    h_name: [&'static [u8]; MAX_HEADERS],
    h_value: [&'static [u8]; MAX_HEADERS],
    h_offset: usize,

    content_length: Option<usize>,
    body: Option<&'static [u8]>,
}

impl Request {
    #[inline]
    pub(crate) fn new(_limits: &ReqLimits) -> Self {
        Self {
            client_addr: UNSPECIFIED_ADDR,
            server_addr: UNSPECIFIED_ADDR,

            method: Method::Get,
            path: b"",

            q_name: [b"".as_slice(); MAX_QUERY_PARTS],
            q_value: [b"".as_slice(); MAX_QUERY_PARTS],
            q_offset: 0,

            h_name: [b"".as_slice(); MAX_HEADERS],
            h_value: [b"".as_slice(); MAX_HEADERS],
            h_offset: 0,

            content_length: None,
            body: None,
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.method = Method::Get;
        self.path = b"";
        self.q_offset = 0;
        self.h_offset = 0;
        self.content_length = None;
        self.body = None;
    }

    /// The request method.
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request target's path component, with no query string.
    #[inline]
    pub fn path(&self) -> &[u8] {
        self.path
    }

    /// Number of query pairs present (`q_offset`, ≤ 8).
    #[inline]
    pub fn query_len(&self) -> usize {
        self.q_offset
    }

    /// Looks up the first query value for `name`, if any.
    #[inline]
    pub fn query(&self, name: &[u8]) -> Option<&[u8]> {
        self.query_pairs().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Iterates the query pairs in the order they appeared on the wire.
    #[inline]
    pub fn query_pairs(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.q_name[..self.q_offset]
            .iter()
            .zip(self.q_value[..self.q_offset].iter())
            .map(|(n, v)| (*n, *v))
    }

    /// Number of headers present (`h_offset`, ≤ 24).
    #[inline]
    pub fn header_len(&self) -> usize {
        self.h_offset
    }

    /// Looks up a header by case-insensitive name.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Iterates the headers in the order they appeared on the wire.
    #[inline]
    pub fn headers(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.h_name[..self.h_offset]
            .iter()
            .zip(self.h_value[..self.h_offset].iter())
            .map(|(n, v)| (*n, *v))
    }

    /// The parsed `Content-Length`, if the header was present and valid.
    #[inline]
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Whatever body bytes were available in the read buffer after the
    /// head. No streaming ingestion beyond the buffer is performed.
    #[inline]
    pub fn body(&self) -> Option<&[u8]> {
        self.body
    }

    /// The address of the connected peer.
    #[inline]
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// The local address the connection was accepted on.
    #[inline]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

/// Reads raw request bytes into a fixed buffer and parses them into a
/// [`Request`], enforcing RFC 9112 framing strictly: CRLF line endings only,
/// no bare-LF leniency, no header folding.
#[repr(align(64))]
pub(crate) struct Parser {
    position: usize,
    len: usize,
    buffer: Box<[u8]>,
}

impl Parser {
    #[inline]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            position: 0,
            len: 0,
            buffer: vec![0u8; limits.buffer()].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.position = 0;
        self.len = 0;
    }

    #[cfg(test)]
    pub(crate) fn from(limits: &ReqLimits, value: impl AsRef<[u8]>) -> Self {
        let value = value.as_ref();
        let mut buffer = vec![0u8; limits.buffer().max(value.len())].into_boxed_slice();
        buffer[..value.len()].copy_from_slice(value);

        Self {
            position: 0,
            len: value.len(),
            buffer,
        }
    }

    /// Reads from `stream` until the head terminator (`\r\n\r\n`) is found,
    /// the buffer is full, or the peer closes the connection. Returns the
    /// total number of bytes buffered, or `0` if the peer closed before
    /// sending anything.
    pub(crate) async fn fill_buffer(
        &mut self,
        stream: &mut TcpStream,
        timeout: Duration,
    ) -> Result<usize, ErrorKind> {
        loop {
            if self.len > 0 && self.find_head_terminator().is_some() {
                return Ok(self.len);
            }
            if self.len >= self.buffer.len() {
                return Ok(self.len);
            }

            let read = tokio::select! {
                biased;

                result = stream.read(&mut self.buffer[self.len..]) => result?,
                _ = sleep(timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout").into());
                },
            };

            if read == 0 {
                return Ok(self.len);
            }
            self.len += read;
        }
    }

    fn find_head_terminator(&self) -> Option<usize> {
        let buf = &self.buffer[..self.len];
        memchr::memchr_iter(b'\n', buf).find_map(|pos| {
            (pos >= 3 && buf[pos - 3] == b'\r' && buf[pos - 2] == b'\n' && buf[pos - 1] == b'\r')
                .then_some(pos + 1)
        })
    }

    /// Returns the bytes from the cursor up to (not including) the next
    /// occurrence of `needle`, advancing the cursor past it. `None` if
    /// `needle` does not occur in the remaining buffered bytes.
    #[inline]
    fn find_slice(&mut self, needle: u8) -> Option<&'static [u8]> {
        let remaining = &self.buffer[self.position..self.len];
        let idx = memchr(needle, remaining)?;
        let slice = &remaining[..idx];
        self.position += idx + 1;

        Some(unsafe { Self::extend_lifetime(slice) })
    }

    /// Returns the next `count` bytes without requiring a delimiter,
    /// advancing the cursor. `None` if fewer than `count` bytes remain.
    #[inline]
    fn get_slice(&mut self, count: usize) -> Option<&'static [u8]> {
        let end = self.position.checked_add(count)?;
        if end > self.len {
            return None;
        }
        let slice = &self.buffer[self.position..end];
        self.position = end;

        Some(unsafe { Self::extend_lifetime(slice) })
    }

    // SAFETY: the returned slice points into `self.buffer`, which the owning
    // connection state keeps alive for as long as any `Request` it produced
    // is alive. The buffer is only overwritten after `reset()`, which is
    // only called once the previous `Request` has gone out of scope (see
    // `HttpConnection::reset_request_response`). Do not call this on a
    // slice that might be read again after a subsequent `fill_buffer`.
    #[inline]
    unsafe fn extend_lifetime(slice: &[u8]) -> &'static [u8] {
        mem::transmute(slice)
    }
}

fn trim(mut bytes: &'static [u8]) -> &'static [u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

fn parse_content_length(bytes: &[u8]) -> Result<usize, ErrorKind> {
    if bytes.is_empty() {
        return Err(ErrorKind::MalformedRequest);
    }

    let mut value: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return Err(ErrorKind::MalformedRequest);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((byte - b'0') as usize))
            .ok_or(ErrorKind::MalformedRequest)?;
    }
    Ok(value)
}

impl Parser {
    /// Runs the full parsing pipeline: method, target (path + query),
    /// version, header block, then whatever body bytes are buffered.
    pub(crate) fn parse(&mut self, request: &mut Request, limits: &ReqLimits) -> Result<(), ErrorKind> {
        self.parse_method(request)?;
        self.parse_target(request, limits)?;
        self.parse_version()?;
        self.parse_headers(request, limits)?;
        self.check_body(request);
        Ok(())
    }

    fn parse_method(&mut self, request: &mut Request) -> Result<(), ErrorKind> {
        let remaining = &self.buffer[self.position..self.len];
        let (method, consumed) = Method::from_bytes(remaining)?;
        request.method = method;
        self.position += consumed + 1;
        Ok(())
    }

    fn parse_target(&mut self, request: &mut Request, limits: &ReqLimits) -> Result<(), ErrorKind> {
        let target = self.find_slice(b' ').ok_or(ErrorKind::MalformedRequest)?;
        if target.len() > limits.url_size {
            return Err(ErrorKind::UriTooLong);
        }

        let (path, query) = match memchr(b'?', target) {
            Some(pos) => (&target[..pos], &target[pos + 1..]),
            None => (target, &target[target.len()..]),
        };

        request.path = path;
        request.q_offset = query::parse_into(
            query,
            limits.url_query_parts,
            &mut request.q_name,
            &mut request.q_value,
        )?;
        Ok(())
    }

    fn parse_version(&mut self) -> Result<(), ErrorKind> {
        let line = self.find_slice(b'\n').ok_or(ErrorKind::MalformedRequest)?;
        let token = match line {
            [rest @ .., b'\r'] => rest,
            _ => return Err(ErrorKind::MalformedRequest),
        };

        Version::from_bytes(token).ok_or(ErrorKind::Unsupported)?;
        Ok(())
    }

    /// Returns `Some(line)` for a header line with the CRLF stripped, or
    /// `None` once the blank line terminating the header block is reached.
    fn next_header_line(&mut self) -> Result<Option<&'static [u8]>, ErrorKind> {
        let line = self.find_slice(b'\n').ok_or(ErrorKind::MalformedRequest)?;
        let line = match line {
            [rest @ .., b'\r'] => rest,
            _ => return Err(ErrorKind::MalformedRequest),
        };

        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }

    fn parse_headers(&mut self, request: &mut Request, limits: &ReqLimits) -> Result<(), ErrorKind> {
        let header_limit = limits.header_count.min(MAX_HEADERS);

        loop {
            let Some(line) = self.next_header_line()? else {
                return Ok(());
            };

            if request.h_offset >= header_limit {
                return Err(ErrorKind::LimitExceeded);
            }

            let colon = memchr(b':', line).ok_or(ErrorKind::MalformedRequest)?;
            let name = trim(&line[..colon]);
            let value = trim(&line[colon + 1..]);

            if name.len() > limits.header_name_size || value.len() > limits.header_value_size {
                return Err(ErrorKind::HeaderTooLong);
            }

            if name.eq_ignore_ascii_case(b"content-length") {
                request.content_length = Some(parse_content_length(value)?);
            }

            request.h_name[request.h_offset] = name;
            request.h_value[request.h_offset] = value;
            request.h_offset += 1;
        }
    }

    fn check_body(&mut self, request: &mut Request) {
        request.body = match request.content_length {
            None | Some(0) => None,
            Some(expected) => {
                let available = self.len - self.position;
                let take = expected.min(available);
                self.get_slice(take)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &'static str) -> Result<Request, ErrorKind> {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        parser.parse(&mut request, &limits)?;
        Ok(request)
    }

    #[test]
    fn simple_get() {
        let request = parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), b"/");
        assert_eq!(request.header(b"host"), Some(b"x".as_slice()));
    }

    #[test]
    fn post_with_content_length() {
        let request = parse("POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.content_length(), Some(5));
        assert_eq!(request.body(), Some(b"hello".as_slice()));
    }

    #[test]
    fn query_pairs_preserve_order() {
        let request = parse("GET /home?a=1&b=2 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.path(), b"/home");
        assert_eq!(request.query_len(), 2);
        assert_eq!(
            request.query_pairs().collect::<Vec<_>>(),
            vec![(b"a".as_slice(), b"1".as_slice()), (b"b".as_slice(), b"2".as_slice())]
        );
    }

    #[test]
    fn unsupported_method() {
        assert_eq!(parse("PUT / HTTP/1.1\r\n\r\n"), Err(ErrorKind::Unsupported));
    }

    #[test]
    fn invalid_method_name() {
        assert_eq!(parse("GARBAGE / HTTP/1.1\r\n\r\n"), Err(ErrorKind::InvalidMethodName));
    }

    #[test]
    fn unsupported_version() {
        assert_eq!(parse("GET / HTTP/1.0\r\n\r\n"), Err(ErrorKind::Unsupported));
    }

    #[test]
    fn bare_lf_is_malformed() {
        assert_eq!(parse("GET / HTTP/1.1\n\n"), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        assert_eq!(
            parse("GET / HTTP/1.1\r\nHost: x\r\n"),
            Err(ErrorKind::MalformedRequest)
        );
    }

    #[test]
    fn query_pair_without_equals_is_malformed() {
        assert_eq!(
            parse("GET /home?a=1&b HTTP/1.1\r\n\r\n"),
            Err(ErrorKind::MalformedRequest)
        );
    }

    #[test]
    fn uri_boundary() {
        let limits = ReqLimits::default().precalculate();

        let ok_target = format!("/{}", "a".repeat(3999));
        let input = format!("GET {ok_target} HTTP/1.1\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert!(parser.parse(&mut request, &limits).is_ok());

        let too_long = format!("/{}", "a".repeat(4000));
        let input = format!("GET {too_long} HTTP/1.1\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert_eq!(parser.parse(&mut request, &limits), Err(ErrorKind::UriTooLong));
    }

    #[test]
    fn header_name_boundary() {
        let limits = ReqLimits::default().precalculate();

        let name_256 = "a".repeat(256);
        let input = format!("GET / HTTP/1.1\r\n{name_256}: v\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert!(parser.parse(&mut request, &limits).is_ok());

        let name_257 = "a".repeat(257);
        let input = format!("GET / HTTP/1.1\r\n{name_257}: v\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert_eq!(
            parser.parse(&mut request, &limits),
            Err(ErrorKind::HeaderTooLong)
        );
    }

    #[test]
    fn header_count_boundary() {
        let limits = ReqLimits::default().precalculate();

        let headers_24: String = (0..24).map(|i| format!("h{i}: v\r\n")).collect();
        let input = format!("GET / HTTP/1.1\r\n{headers_24}\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert!(parser.parse(&mut request, &limits).is_ok());

        let headers_25: String = (0..25).map(|i| format!("h{i}: v\r\n")).collect();
        let input = format!("GET / HTTP/1.1\r\n{headers_25}\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert_eq!(
            parser.parse(&mut request, &limits),
            Err(ErrorKind::LimitExceeded)
        );
    }

    #[test]
    fn query_parts_boundary() {
        let limits = ReqLimits::default().precalculate();

        let query_8 = (0..8).map(|i| format!("k{i}={i}")).collect::<Vec<_>>().join("&");
        let input = format!("GET /?{query_8} HTTP/1.1\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert!(parser.parse(&mut request, &limits).is_ok());

        let query_9 = (0..9).map(|i| format!("k{i}={i}")).collect::<Vec<_>>().join("&");
        let input = format!("GET /?{query_9} HTTP/1.1\r\n\r\n");
        let mut parser = Parser::from(&limits, input);
        let mut request = Request::new(&limits);
        assert_eq!(
            parser.parse(&mut request, &limits),
            Err(ErrorKind::LimitExceeded)
        );
    }

    #[test]
    fn reset_clears_offsets() {
        let limits = ReqLimits::default().precalculate();
        let mut request = Request::new(&limits);
        let mut parser = Parser::from(&limits, "GET /home?a=1 HTTP/1.1\r\nHost: x\r\n\r\n");
        parser.parse(&mut request, &limits).unwrap();
        assert_eq!(request.query_len(), 1);
        assert_eq!(request.header_len(), 1);

        request.reset();
        assert_eq!(request.query_len(), 0);
        assert_eq!(request.header_len(), 0);
        assert_eq!(request.path(), b"");
    }
}
