//! Core HTTP protocol types: method, version, and status code.

use crate::errors::ErrorKind;

/// HTTP request method.
///
/// Only `GET` and `POST` are recognized as first-class methods. Any of
/// `HEAD|DELETE|CONNECT|OPTIONS|TRACE|PUT` parses to [`ErrorKind::Unsupported`];
/// anything else to [`ErrorKind::InvalidMethodName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Parses the method token at the start of `src`, returning the method
    /// and the number of bytes consumed (not including the trailing space).
    #[inline]
    pub(crate) fn from_bytes(src: &[u8]) -> Result<(Self, usize), ErrorKind> {
        match src {
            [b'G', b'E', b'T', b' ', ..] => Ok((Method::Get, 3)),
            [b'P', b'O', b'S', b'T', b' ', ..] => Ok((Method::Post, 4)),

            [b'H', b'E', b'A', b'D', b' ', ..]
            | [b'P', b'U', b'T', b' ', ..]
            | [b'D', b'E', b'L', b'E', b'T', b'E', b' ', ..]
            | [b'C', b'O', b'N', b'N', b'E', b'C', b'T', b' ', ..]
            | [b'O', b'P', b'T', b'I', b'O', b'N', b'S', b' ', ..]
            | [b'T', b'R', b'A', b'C', b'E', b' ', ..] => Err(ErrorKind::Unsupported),

            _ => Err(ErrorKind::InvalidMethodName),
        }
    }
}

/// HTTP version token. Only `HTTP/1.1` is accepted; any other token
/// (including `HTTP/1.0`) is reported to the caller as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http11,
}

impl Version {
    #[inline]
    pub(crate) fn from_bytes(src: &[u8]) -> Option<Self> {
        match src {
            b"HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    #[inline]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Version::Http11 => "HTTP/1.1",
        }
    }
}

macro_rules! set_status_codes {
    ($($name:ident = $code:literal, $reason:literal;)*) => {
        /// HTTP response status code.
        ///
        /// Only the codes the server actually emits are represented.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u16)]
        pub enum StatusCode {
            $($name = $code,)*
        }

        impl StatusCode {
            /// Renders the status line `HTTP/1.1 <code> <reason>\r\n`.
            #[inline]
            pub(crate) const fn to_first_line(self) -> &'static [u8] {
                match self {
                    $(StatusCode::$name => concat!(
                        "HTTP/1.1 ", $code, " ", $reason, "\r\n"
                    ).as_bytes(),)*
                }
            }

            /// The numeric code as ASCII bytes, with no trailing text.
            #[inline]
            pub(crate) const fn as_u16_bytes(self) -> &'static [u8] {
                match self {
                    $(StatusCode::$name => stringify!($code).as_bytes(),)*
                }
            }
        }
    };
}

set_status_codes! {
    Ok = 200, "OK";
    BadRequest = 400, "Bad Request";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    PayloadTooLarge = 413, "Payload Too Large";
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    ServiceUnavailable = 503, "Service Unavailable";
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn recognized() {
        assert_eq!(Method::from_bytes(b"GET /x"), Ok((Method::Get, 3)));
        assert_eq!(Method::from_bytes(b"POST /x"), Ok((Method::Post, 4)));
    }

    #[test]
    fn unsupported() {
        for token in [
            &b"HEAD "[..],
            b"PUT ",
            b"DELETE ",
            b"CONNECT ",
            b"OPTIONS ",
            b"TRACE ",
        ] {
            assert_eq!(Method::from_bytes(token), Err(ErrorKind::Unsupported));
        }
    }

    #[test]
    fn invalid_method_name() {
        assert_eq!(
            Method::from_bytes(b"GARBAGE /x"),
            Err(ErrorKind::InvalidMethodName)
        );
        assert_eq!(Method::from_bytes(b""), Err(ErrorKind::InvalidMethodName));
    }
}

#[cfg(test)]
mod version_tests {
    use super::*;

    #[test]
    fn http11_only() {
        assert_eq!(Version::from_bytes(b"HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::from_bytes(b"HTTP/1.0"), None);
        assert_eq!(Version::from_bytes(b"HTTP/2.0"), None);
        assert_eq!(Version::from_bytes(b"garbage!"), None);
    }
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[test]
    fn first_line() {
        assert_eq!(StatusCode::Ok.to_first_line(), b"HTTP/1.1 200 OK\r\n");
        assert_eq!(
            StatusCode::PayloadTooLarge.to_first_line(),
            b"HTTP/1.1 413 Payload Too Large\r\n"
        );
    }
}
