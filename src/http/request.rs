//! HTTP request head parsing.
//!
//! The connection loop reads the whole request head into one fixed
//! buffer, then [`Request::parse`] extracts the few fields this server
//! acts on. Request bodies are not read; no route here consumes one.

use crate::{
    errors::ErrorKind,
    http::types::{Method, Version},
    limits::ReqLimits,
};
use memchr::memchr;

/// A parsed request head.
///
/// Only the headers the routes consult are retained: `connection` for
/// keep-alive, `accept-encoding` for the pre-compressed asset path, and
/// `accept` for metrics dialect negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    version: Version,
    keep_alive: bool,
    accept_gzip: bool,
    accept_openmetrics: bool,
}

impl Request {
    /// Parses a complete request head (everything before the blank line).
    pub fn parse(head: &[u8], limits: &ReqLimits) -> Result<Self, ErrorKind> {
        let mut lines = Lines { rest: head };

        let first_line = lines.next().ok_or(ErrorKind::InvalidUrl)?;
        let (method, skip) = Method::from_bytes(first_line)?;
        let rest = &first_line[skip..];

        let space = memchr(b' ', rest).ok_or(ErrorKind::InvalidUrl)?;
        let url = &rest[..space];
        if url.first() != Some(&b'/') || url.len() > limits.url_size {
            return Err(ErrorKind::InvalidUrl);
        }

        // Routes never take query parameters; drop everything after '?'.
        let path_bytes = match memchr(b'?', url) {
            Some(query) => &url[..query],
            None => url,
        };
        let path = simdutf8::basic::from_utf8(path_bytes)
            .map_err(|_| ErrorKind::InvalidUrl)?
            .to_string();

        let version_bytes = &rest[space + 1..];
        let (version, mut keep_alive) = match Version::from_bytes(version_bytes) {
            Ok(parsed) => parsed,
            Err(_) if version_bytes.starts_with(b"HTTP/") => {
                return Err(ErrorKind::UnsupportedVersion)
            }
            Err(_) => return Err(ErrorKind::InvalidVersion),
        };

        let mut accept_gzip = false;
        let mut accept_openmetrics = false;

        let mut count = 0;
        for line in lines {
            count += 1;
            if count > limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }

            let colon = memchr(b':', line).ok_or(ErrorKind::InvalidHeader)?;
            let name = &line[..colon];
            let value = trim_ascii(&line[colon + 1..]);

            if name.eq_ignore_ascii_case(b"connection") {
                if value.eq_ignore_ascii_case(b"close") {
                    keep_alive = false;
                } else if contains_ignore_ascii_case(value, b"keep-alive") {
                    keep_alive = true;
                }
            } else if name.eq_ignore_ascii_case(b"accept-encoding") {
                accept_gzip |= contains_ignore_ascii_case(value, b"gzip");
            } else if name.eq_ignore_ascii_case(b"accept") {
                accept_openmetrics |=
                    contains_ignore_ascii_case(value, b"application/openmetrics-text");
            }
        }

        Ok(Self {
            method,
            path,
            version,
            keep_alive,
            accept_gzip,
            accept_openmetrics,
        })
    }

    #[inline(always)]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path without query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether the connection should stay open after this response.
    #[inline(always)]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Whether `accept-encoding` admits a gzip body.
    #[inline(always)]
    pub fn accepts_gzip(&self) -> bool {
        self.accept_gzip
    }

    /// Whether `accept` asks for the OpenMetrics exposition format.
    #[inline(always)]
    pub fn accepts_openmetrics(&self) -> bool {
        self.accept_openmetrics
    }
}

// Iterates over `\r\n`-terminated lines, stopping at the blank line.
struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let newline = memchr(b'\n', self.rest)?;
        let line = &self.rest[..newline];
        self.rest = &self.rest[newline + 1..];

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match line.is_empty() {
            true => None,
            false => Some(line),
        }
    }
}

#[inline]
fn trim_ascii(mut value: &[u8]) -> &[u8] {
    while let Some((b' ' | b'\t', rest)) = value.split_first() {
        value = rest;
    }
    while let Some((b' ' | b'\t', rest)) = value.split_last() {
        value = rest;
    }
    value
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Parses a literal request head, panicking on malformed input.
    pub(crate) fn request(head: &str) -> Request {
        Request::parse(head.as_bytes(), &ReqLimits::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::request, *};

    #[test]
    fn request_line() {
        let req = request("GET /data.json HTTP/1.1\r\n\r\n");
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/data.json");
        assert_eq!(req.version(), Version::Http11);
        assert!(req.keep_alive());
    }

    #[test]
    fn query_string_is_dropped() {
        assert_eq!(request("GET /metrics?debug=1 HTTP/1.1\r\n\r\n").path(), "/metrics");
    }

    #[test]
    fn keep_alive_rules() {
        // HTTP/1.0 closes by default, HTTP/1.1 keeps open.
        assert!(!request("GET / HTTP/1.0\r\n\r\n").keep_alive());
        assert!(request("GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").keep_alive());
        assert!(!request("GET / HTTP/1.1\r\nConnection: close\r\n\r\n").keep_alive());
    }

    #[test]
    fn content_negotiation_headers() {
        let req = request(
            "GET /main.css HTTP/1.1\r\nAccept-Encoding: br, GZIP, deflate\r\n\r\n",
        );
        assert!(req.accepts_gzip());
        assert!(!req.accepts_openmetrics());

        let req = request(
            "GET /metrics HTTP/1.1\r\n\
             Accept: application/openmetrics-text;version=1.0.0,text/plain;q=0.5\r\n\r\n",
        );
        assert!(req.accepts_openmetrics());
    }

    #[test]
    fn malformed_requests() {
        let limits = ReqLimits::default();
        let cases: [(&[u8], ErrorKind); 5] = [
            (b"BREW /pot HTTP/1.1\r\n\r\n", ErrorKind::InvalidMethod),
            (b"GET relative HTTP/1.1\r\n\r\n", ErrorKind::InvalidUrl),
            (b"GET / HTTP/2.0\r\n\r\n", ErrorKind::UnsupportedVersion),
            (b"GET / FTP/1.0\r\n\r\n", ErrorKind::InvalidVersion),
            (b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n", ErrorKind::InvalidHeader),
        ];

        for (head, error) in cases {
            assert_eq!(Request::parse(head, &limits).unwrap_err(), error);
        }
    }

    #[test]
    fn header_count_limit() {
        let mut head = String::from("GET / HTTP/1.1\r\n");
        for i in 0..40 {
            head.push_str(&format!("x-header-{}: v\r\n", i));
        }
        head.push_str("\r\n");

        assert_eq!(
            Request::parse(head.as_bytes(), &ReqLimits::default()).unwrap_err(),
            ErrorKind::TooManyHeaders
        );
    }
}
