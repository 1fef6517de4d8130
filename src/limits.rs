//! Server configuration limits and timeouts
//!
//! Default limits are intentionally conservative: the server fronts a
//! sensor, not a CDN, and every connection buffer competes with the
//! measurement loop for memory.
//!
//! # Examples
//!
//! ```no_run
//! use thermoweb::{
//!     limits::{ConnLimits, ServerLimits},
//!     routes::SensorApp,
//!     Server,
//! };
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("0.0.0.0:8080").await.unwrap())
//!         .handler(SensorApp::default())
//!         .server_limits(ServerLimits {
//!             max_connections: 16,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency, queueing, and overload behavior.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue if full? | =====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [---------]   Yes   /--------------------------\   No   [------]
/// [ Handler ] <====== | Is there a free handler? | =====> [ Wait ]
/// [---------]         \--------------------------/        [------]
/// ```
///
/// The queue acts as a buffer between connection acceptance and processing.
/// Workers continuously poll the queue using the configured `wait_strategy`.
/// Each worker is a long-lived asynchronous task created once at startup,
/// so no per-connection task spawning occurs.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of concurrent active connections being processed (default: `8`).
    ///
    /// When the server starts, exactly `max_connections` workers are created
    /// and reused for the whole server lifetime.
    pub max_connections: usize,

    /// Maximum number of TCP connections waiting in the admission queue (default: `16`).
    ///
    /// All accepted connections first go into this queue. Workers pick
    /// connections from here. When the queue is full, new connections receive
    /// immediate HTTP `503` responses.
    pub max_pending_connections: usize,

    /// Strategy for worker task waiting behavior (default: `Sleep(250µs)`).
    ///
    /// Controls how workers wait when the admission queue is empty. Affects
    /// latency and CPU usage.
    pub wait_strategy: WaitStrategy,

    /// Dedicated handlers for queue overflow responses (default: `1`).
    ///
    /// When the admission queue is full, these handlers immediately answer
    /// with [503](crate::StatusCode::ServiceUnavailable). Set to 0 to
    /// silently close rejected connections.
    pub count_503_handlers: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 8,
            max_pending_connections: 16,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(250)),
            count_503_handlers: 1,

            _priv: (),
        }
    }
}

/// Strategy for worker task waiting when no connections are available.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`].
    ///
    /// Lowest latency, but keeps a CPU core busy. Not recommended on a
    /// host that also runs the measurement loop.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`] with the given interval.
    Sleep(Duration),
}

/// Connection-level limits and timeouts.
///
/// Default values balance responsiveness against holding sockets open on a
/// small device. Only change if you understand the consequences.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration to wait for reading data from the socket (default: `2 seconds`).
    ///
    /// If no data is received within this time, the connection is closed.
    /// This is the primary mechanism for cleaning up stalled connections.
    pub socket_read_timeout: Duration,

    /// Maximum duration to wait for writing data to the socket (default: `3 seconds`).
    ///
    /// Applies to individual write operations, including every streamed
    /// body chunk.
    pub socket_write_timeout: Duration,

    /// Maximum number of requests allowed per connection (default: `100`).
    ///
    /// The connection closes after processing this many requests, which
    /// keeps long-polling dashboards from pinning a worker forever.
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of a connection from establishment to closure
    /// (default: `2 minutes`).
    ///
    /// Final safety net; in practice connections are cleaned up by
    /// `socket_read_timeout` or `max_requests_per_connection` first.
    pub connection_lifetime: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            connection_lifetime: Duration::from_secs(120),
            max_requests_per_connection: 100,

            _priv: (),
        }
    }
}

/// HTTP request parsing limits.
///
/// Each connection pre-allocates one fixed-size buffer of `head_size`
/// bytes and parses the whole request head inside it. Requests whose head
/// does not fit are answered with `431` and the connection is closed.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum request head size in bytes, request line and all headers
    /// included (default: `2 KB`).
    ///
    /// Browsers talking to the sensor send 300-700 bytes; 2 KB leaves
    /// room for proxies that append forwarding headers.
    pub head_size: usize,

    /// Maximum URL length in bytes including the query string (default: `256 B`).
    ///
    /// The longest route served here is `/metrics`; 256 bytes is generous
    /// and keeps per-request path copies small.
    pub url_size: usize,

    /// Maximum number of headers per request (default: `32 headers`).
    pub header_count: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            head_size: 2 * 1024,
            url_size: 256,
            header_count: 32,

            _priv: (),
        }
    }
}

/// Response streaming limits.
///
/// Bodies are produced chunk by chunk through a
/// [`Filler`](crate::fill::Filler). The chunk buffer starts at
/// `chunk_size` and doubles, up to `max_chunk_size`, whenever a filler
/// reports that the next indivisible piece does not fit.
#[derive(Debug, Clone)]
pub struct StreamLimits {
    /// Initial chunk buffer capacity in bytes (default: `1436 B`).
    ///
    /// Matches a typical TCP segment payload so most chunks leave in a
    /// single packet.
    pub chunk_size: usize,

    /// Maximum chunk buffer capacity in bytes (default: `8 KB`).
    ///
    /// A filler that still cannot make progress at this capacity aborts
    /// the response; a template replacement longer than this would be a
    /// content bug, not a transport condition.
    pub max_chunk_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            chunk_size: 1436,
            max_chunk_size: 8 * 1024,

            _priv: (),
        }
    }
}
