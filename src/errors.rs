use crate::Version;
use std::{error, fmt, io};
use thiserror::Error;

/// Protocol-level parse and connection errors.
///
/// These never reach route handlers; the connection loop answers them
/// with a canned close response and drops the connection.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    InvalidMethod,

    InvalidUrl,

    InvalidVersion,
    UnsupportedVersion,

    InvalidHeader,
    TooManyHeaders,
    RequestTooLarge,

    ServiceUnavailable,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr; )*) => {
        pub(crate) const fn as_http(&self, version: Version) -> &'static [u8] {
            match (self, version) { $(
                (Self::$name { .. }, Version::Http11) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
                (Self::$name { .. }, Version::Http10) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        InvalidMethod: "400 Bad Request";

        InvalidUrl: "400 Bad Request";

        InvalidVersion: "400 Bad Request";
        UnsupportedVersion: "505 HTTP Version Not Supported";

        InvalidHeader: "400 Bad Request";
        TooManyHeaders: "431 Request Header Fields Too Large";
        RequestTooLarge: "431 Request Header Fields Too Large";

        ServiceUnavailable: "503 Service Unavailable";
        Io: "503 Service Unavailable";
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

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

// FILL ERRORS

/// Errors raised by a body filler while producing response bytes.
///
/// A fill error aborts the response mid-stream; the connection is closed
/// since the declared content length can no longer be honored.
#[derive(Debug, Error)]
pub enum FillError {
    /// The stored compressed data could not be decoded.
    #[error("corrupt compressed data: {0}")]
    Decode(#[from] io::Error),

    /// The filler produced a different number of bytes than it declared.
    #[error("body length mismatch: declared {declared}, produced {produced}")]
    LengthMismatch { declared: usize, produced: usize },
}

// PUSH ERRORS

/// Errors raised while pushing metrics to a remote Pushgateway.
#[derive(Debug, Error)]
pub enum PushError {
    /// Another push was still in flight when this one was due.
    #[error("previous metrics push still in progress")]
    InFlight,

    /// The gateway could not be reached or the socket failed mid-push.
    #[error("pushgateway connection failed: {0}")]
    Connect(#[from] io::Error),

    /// The gateway answered, but not with a success status.
    #[error("pushgateway rejected metrics: {0}")]
    Rejected(String),

    /// The gateway's status line was not parseable HTTP.
    #[error("pushgateway sent an invalid response")]
    InvalidResponse,
}
