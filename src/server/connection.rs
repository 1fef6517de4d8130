//! Per-connection request loop and response streaming.
//!
//! A worker owns one [`HttpConnection`] for the server's lifetime and
//! runs it against one accepted stream at a time. The connection reads
//! the request head into a fixed buffer, hands the parsed request to the
//! handler, writes the response head, then drives the body source:
//! in-memory bodies go out in one write, fillers are pumped chunk by
//! chunk with the chunk buffer doubling whenever a filler reports that
//! its next indivisible piece does not fit.

use crate::{
    errors::ErrorKind,
    fill::{FillStep, Filler},
    http::{request::Request, response::Body, types::Version},
    limits::{ConnLimits, ReqLimits, StreamLimits},
    server::server_impl::{AllLimits, Handler},
};
use memchr::memmem;
use std::{io, sync::Arc, time::Instant};
use tokio::{io::AsyncReadExt, net::TcpStream, time::timeout};
use tracing::{debug, error};

pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,

    connection: Connection,
    head_buf: Vec<u8>,
    buffered: usize,
    out_buf: Vec<u8>,
    chunk: Vec<u8>,

    version: Version,
    keep_alive: bool,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    stream_limits: StreamLimits,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, limits: AllLimits) -> Self {
        Self {
            handler,

            connection: Connection::new(),
            head_buf: vec![0; limits.2.head_size],
            buffered: 0,
            out_buf: Vec::with_capacity(1024),
            chunk: vec![0; limits.3.chunk_size],

            version: Version::Http11,
            keep_alive: true,

            conn_limits: limits.1,
            req_limits: limits.2,
            stream_limits: limits.3,
        }
    }

    #[inline]
    pub(crate) async fn run(&mut self, stream: &mut TcpStream) -> Result<(), io::Error> {
        match self.impl_run(stream).await {
            Ok(()) => Ok(()),
            Err(ErrorKind::Io(err)) => Err(err.0),
            Err(err) => {
                writer::send_error(stream, self.version, err, &self.conn_limits).await
            }
        }
    }

    async fn impl_run(&mut self, stream: &mut TcpStream) -> Result<(), ErrorKind> {
        self.connection.reset();
        self.buffered = 0;
        self.version = Version::Http11;
        self.keep_alive = true;

        while !self.is_expired() {
            let Some(head_end) = self.read_head(stream).await? else {
                break;
            };

            let request = Request::parse(&self.head_buf[..head_end], &self.req_limits)?;
            self.version = request.version();
            self.keep_alive = request.keep_alive();

            // Drop the consumed head; pipelined bytes stay buffered.
            self.head_buf.copy_within(head_end..self.buffered, 0);
            self.buffered -= head_end;

            let mut response = self.handler.handle(&request);

            // What the header promises must match what the loop does,
            // so the request budget folds into the flag here.
            self.keep_alive = self.keep_alive
                && self.connection.request_count + 1 < self.conn_limits.max_requests_per_connection;

            self.out_buf.clear();
            response.write_head(&mut self.out_buf, self.version, self.keep_alive);
            writer::write_bytes(stream, &self.out_buf, &self.conn_limits).await?;

            let declared = response.content_length();
            match response.take_body() {
                Body::Empty => {}
                Body::Full(bytes) => {
                    writer::write_bytes(stream, &bytes, &self.conn_limits).await?;
                }
                Body::Stream(filler) => {
                    self.stream_body(stream, filler, declared).await?;
                }
            }

            if !self.keep_alive {
                break;
            }

            self.connection.request_count += 1;
        }

        Ok(())
    }

    // Pumps a filler until it has produced its declared length. Any
    // violation of the filler contract poisons the wire (the head is
    // already out), so the connection is torn down.
    async fn stream_body(
        &mut self,
        stream: &mut TcpStream,
        mut filler: Box<dyn Filler>,
        declared: usize,
    ) -> Result<(), ErrorKind> {
        if self.chunk.len() != self.stream_limits.chunk_size {
            self.chunk.resize(self.stream_limits.chunk_size, 0);
        }

        let mut sent = 0;
        while sent < declared {
            match filler.fill(&mut self.chunk, sent) {
                Ok(FillStep::Data(0)) => {
                    error!(sent, declared, "body source ended before its declared length");
                    return Err(stream_abort());
                }
                Ok(FillStep::Data(n)) => {
                    debug_assert!(n <= self.chunk.len());

                    let n = n.min(declared - sent);
                    writer::write_bytes(stream, &self.chunk[..n], &self.conn_limits).await?;
                    sent += n;
                }
                Ok(FillStep::Retry) => {
                    if self.chunk.len() >= self.stream_limits.max_chunk_size {
                        error!(
                            chunk = self.chunk.len(),
                            "body source made no progress at the maximum chunk size"
                        );
                        return Err(stream_abort());
                    }

                    let grown = (self.chunk.len() * 2).min(self.stream_limits.max_chunk_size);
                    debug!(from = self.chunk.len(), to = grown, "growing body chunk buffer");
                    self.chunk.resize(grown, 0);
                }
                Err(err) => {
                    error!(%err, sent, declared, "body source failed mid-response");
                    return Err(stream_abort());
                }
            }
        }

        Ok(())
    }

    // Reads until the head terminator is buffered. `None` means the
    // client closed cleanly between requests.
    async fn read_head(&mut self, stream: &mut TcpStream) -> Result<Option<usize>, ErrorKind> {
        loop {
            if let Some(at) = memmem::find(&self.head_buf[..self.buffered], b"\r\n\r\n") {
                return Ok(Some(at + 4));
            }
            if self.buffered == self.head_buf.len() {
                return Err(ErrorKind::RequestTooLarge);
            }

            let read = timeout(
                self.conn_limits.socket_read_timeout,
                stream.read(&mut self.head_buf[self.buffered..]),
            )
            .await
            .map_err(io::Error::from)??;

            if read == 0 {
                return match self.buffered {
                    0 => Ok(None),
                    _ => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                };
            }
            self.buffered += read;
        }
    }

    #[inline(always)]
    fn is_expired(&self) -> bool {
        !self.keep_alive
            || self.connection.request_count >= self.conn_limits.max_requests_per_connection
            || self.connection.created.elapsed() > self.conn_limits.connection_lifetime
    }
}

// The response can no longer be completed correctly; only closing the
// connection keeps the client from misreading the stream.
fn stream_abort() -> ErrorKind {
    ErrorKind::from(io::Error::from(io::ErrorKind::ConnectionAborted))
}

pub(crate) mod writer {
    use crate::{errors::ErrorKind, http::types::Version, limits::ConnLimits};
    use std::io;
    use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

    #[inline(always)]
    pub(crate) async fn send_error(
        stream: &mut TcpStream,
        version: Version,
        error: ErrorKind,
        limits: &ConnLimits,
    ) -> Result<(), io::Error> {
        write_bytes(stream, error.as_http(version), limits).await
    }

    #[inline(always)]
    pub(crate) async fn write_bytes(
        stream: &mut TcpStream,
        bytes: &[u8],
        limits: &ConnLimits,
    ) -> Result<(), io::Error> {
        timeout(limits.socket_write_timeout, stream.write_all(bytes)).await?
    }
}

#[derive(Debug)]
pub(crate) struct Connection {
    created: Instant,
    request_count: usize,
}

impl Connection {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            created: Instant::now(),
            request_count: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.created = Instant::now();
        self.request_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fill::TemplateFiller,
        http::{response::ResponseData, types::StatusCode},
        limits::{ServerLimits, StreamLimits},
    };
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    struct EchoPath;

    impl Handler for EchoPath {
        fn handle(&self, request: &Request) -> ResponseData {
            match request.path() {
                "/template" => ResponseData::stream(
                    StatusCode::Ok,
                    "text/plain",
                    TemplateFiller::new(
                        b"value: %V%",
                        vec![("V", "x".repeat(4096))],
                    ),
                ),
                path => ResponseData::full(StatusCode::Ok, "text/plain", path.to_string()),
            }
        }
    }

    fn limits() -> AllLimits {
        (
            ServerLimits::default(),
            ConnLimits::default(),
            ReqLimits::default(),
            StreamLimits {
                chunk_size: 64,
                ..StreamLimits::default()
            },
        )
    }

    async fn roundtrip(requests: &[&str]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            HttpConnection::new(Arc::new(EchoPath), limits())
                .run(&mut stream)
                .await
                .unwrap();
        });

        let mut client = TcpStream::connect(address).await.unwrap();
        for request in requests {
            client.write_all(request.as_bytes()).await.unwrap();
        }
        client.shutdown().await.unwrap();

        // Tolerate a reset after the server answers and closes with
        // unread input still pending (the oversized-head case).
        let mut response = Vec::new();
        let mut chunk = [0; 1024];
        loop {
            match client.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => response.extend_from_slice(&chunk[..n]),
            }
        }
        server.await.unwrap();

        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn single_request() {
        let response = roundtrip(&["GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n"]).await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\n/hello"));
    }

    #[tokio::test]
    async fn keep_alive_pipeline() {
        let response = roundtrip(&[
            "GET /one HTTP/1.1\r\n\r\n",
            "GET /two HTTP/1.1\r\nConnection: close\r\n\r\n",
        ])
        .await;

        assert!(response.contains("/one"));
        assert!(response.contains("/two"));
        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[tokio::test]
    async fn streamed_body_grows_its_chunk() {
        // The 4 KB replacement cannot fit the initial 64 byte chunk; the
        // writer must grow it and still deliver the exact body.
        let response =
            roundtrip(&["GET /template HTTP/1.1\r\nConnection: close\r\n\r\n"]).await;

        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(body.len(), "value: ".len() + 4096);
        assert!(body.starts_with("value: xxxx"));
    }

    #[tokio::test]
    async fn oversized_head_is_rejected() {
        let huge = format!("GET /x HTTP/1.1\r\nx-pad: {}\r\n\r\n", "y".repeat(4096));
        let response = roundtrip(&[huge.as_str()]).await;

        assert!(response.starts_with("HTTP/1.1 431 "));
    }

    #[tokio::test]
    async fn malformed_request_gets_close_response() {
        let response = roundtrip(&["BREW /pot HTTP/1.1\r\n\r\n"]).await;

        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("connection: close\r\n"));
    }
}
