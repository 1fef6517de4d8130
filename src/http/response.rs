//! Response description and head serialization.
//!
//! Handlers return a [`ResponseData`]: status, headers and a body source.
//! The connection writer serializes the head, then drives the body out of
//! the descriptor chunk by chunk. The head always carries an exact
//! `content-length`, which is why every body source must know its length
//! before the first byte is produced.

use crate::{
    fill::Filler,
    http::types::{StatusCode, Version},
};
use std::borrow::Cow;

/// Server identification sent on every response.
pub const SERVER_NAME: &str = concat!("thermoweb/", env!("CARGO_PKG_VERSION"));

/// Where response body bytes come from.
pub enum Body {
    /// A body materialized by the handler (JSON documents, metrics text).
    Full(Vec<u8>),

    /// A body produced chunk by chunk while writing.
    Stream(Box<dyn Filler>),

    /// No body bytes on the wire. The `content-length` header still
    /// reports the length the corresponding GET body would have, which
    /// is what HEAD requires.
    Empty,
}

/// A complete description of one HTTP response.
pub struct ResponseData {
    status: StatusCode,
    content_type: Option<Cow<'static, str>>,
    content_encoding: Option<&'static str>,
    headers: Vec<(&'static str, Cow<'static, str>)>,
    content_length: usize,
    body: Body,
}

impl ResponseData {
    /// A response with an in-memory body.
    pub fn full(
        status: StatusCode,
        content_type: impl Into<Cow<'static, str>>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let body = body.into();

        Self {
            status,
            content_type: Some(content_type.into()),
            content_encoding: None,
            headers: Vec::new(),
            content_length: body.len(),
            body: Body::Full(body),
        }
    }

    /// A response whose body is produced by `filler` while writing.
    pub fn stream(
        status: StatusCode,
        content_type: impl Into<Cow<'static, str>>,
        filler: impl Filler + 'static,
    ) -> Self {
        Self {
            status,
            content_type: Some(content_type.into()),
            content_encoding: None,
            headers: Vec::new(),
            content_length: filler.len(),
            body: Body::Stream(Box::new(filler)),
        }
    }

    /// A bodiless response.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            content_encoding: None,
            headers: Vec::new(),
            content_length: 0,
            body: Body::Empty,
        }
    }

    /// Adds an extra response header. Names must be lower-case.
    pub fn with_header(mut self, name: &'static str, value: impl Into<Cow<'static, str>>) -> Self {
        debug_assert!(!name.chars().any(|c| c.is_ascii_uppercase()));

        self.headers.push((name, value.into()));
        self
    }

    /// Marks the body as already gzip-compressed.
    pub fn with_gzip_encoding(mut self) -> Self {
        self.content_encoding = Some("gzip");
        self
    }

    /// Converts this response into its HEAD form: same status, headers
    /// and `content-length`, no body bytes.
    pub fn into_head_only(mut self) -> Self {
        self.body = Body::Empty;
        self
    }

    #[inline(always)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Takes the body out of the descriptor, leaving [`Body::Empty`].
    pub(crate) fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }

    /// Serializes the response head into `buf`.
    pub(crate) fn write_head(&self, buf: &mut Vec<u8>, version: Version, keep_alive: bool) {
        buf.extend_from_slice(self.status.to_first_line(version));

        buf.extend_from_slice(b"server: ");
        buf.extend_from_slice(SERVER_NAME.as_bytes());
        buf.extend_from_slice(b"\r\naccess-control-allow-origin: *\r\n");

        if let Some(content_type) = &self.content_type {
            buf.extend_from_slice(b"content-type: ");
            buf.extend_from_slice(content_type.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        if let Some(encoding) = self.content_encoding {
            buf.extend_from_slice(b"content-encoding: ");
            buf.extend_from_slice(encoding.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        for (name, value) in &self.headers {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(match keep_alive {
            true => b"connection: keep-alive\r\n".as_slice(),
            false => b"connection: close\r\n".as_slice(),
        });

        buf.extend_from_slice(b"content-length: ");
        buf.extend_from_slice(self.content_length.to_string().as_bytes());
        buf.extend_from_slice(b"\r\n\r\n");
    }
}

impl std::fmt::Debug for ResponseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseData")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
