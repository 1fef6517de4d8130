//! Server assembly: worker tasks, admission queue and accept loop.

use crate::{
    errors::ErrorKind,
    http::{request::Request, response::ResponseData, types::Version},
    limits::{ConnLimits, ReqLimits, ServerLimits, StreamLimits, WaitStrategy},
    server::connection::{writer, HttpConnection},
};
use crossbeam::queue::SegQueue;
use std::sync::Arc;
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// Turns parsed requests into response descriptions.
///
/// Handlers run on every worker concurrently, so they see `&self`;
/// shared state lives behind the handler's own synchronization. Route
/// dispatch is pure computation, which is why `handle` is not async:
/// the connection worker does all the socket waiting.
///
/// # Examples
///
/// ```
/// use thermoweb::{Handler, Request, ResponseData, StatusCode};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn handle(&self, _: &Request) -> ResponseData {
///         ResponseData::full(StatusCode::Ok, "text/plain", "Hello world!")
///     }
/// }
/// ```
pub trait Handler: Sync + Send + 'static {
    /// Produces the response description for one request.
    fn handle(&self, request: &Request) -> ResponseData;
}

impl<H: Handler> Handler for Arc<H> {
    #[inline(always)]
    fn handle(&self, request: &Request) -> ResponseData {
        (**self).handle(request)
    }
}

pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits, StreamLimits);

type TcpQueue = Arc<SegQueue<TcpStream>>;

/// The HTTP server: a fixed set of long-lived connection workers fed by
/// an admission queue.
///
/// Workers are spawned by [`ServerBuilder::build`], so `build` must run
/// inside a Tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use thermoweb::{routes::SensorApp, Server};
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(TcpListener::bind("0.0.0.0:8080").await.unwrap())
///         .handler(SensorApp::default())
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,

    stream_queue: TcpQueue,
    error_queue: TcpQueue,

    server_limits: ServerLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline(always)]
    pub fn builder<H: Handler>() -> ServerBuilder<H> {
        ServerBuilder {
            listener: None,
            handler: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
            stream_limits: None,
        }
    }

    /// Accepts incoming connections forever, feeding the worker queue.
    /// Connections arriving while the queue is full go to the 503 lane.
    #[inline]
    pub async fn launch(self) {
        loop {
            let Ok((stream, _)) = self.listener.accept().await else {
                continue;
            };

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push(stream),
                false => self.error_queue.push(stream),
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> TcpStream {
        loop {
            if let Some(stream) = queue.pop() {
                return stream;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }

    #[inline]
    fn spawn_worker<H: Handler>(queue: &TcpQueue, limits: &AllLimits, handler: &Arc<H>) {
        let queue = queue.clone();
        let wait = limits.0.wait_strategy.clone();
        let mut conn = HttpConnection::new(handler.clone(), limits.clone());

        tokio::spawn(async move {
            loop {
                let mut stream = Server::get_stream(&queue, &wait).await;
                let _ = conn.run(&mut stream).await;
            }
        });
    }

    #[inline]
    fn spawn_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, conn_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let mut stream = Server::get_stream(&queue, &server_limits.wait_strategy).await;

                let _ = writer::send_error(
                    &mut stream,
                    Version::Http11,
                    ErrorKind::ServiceUnavailable,
                    &conn_limits,
                )
                .await;
            }
        });
    }

    // With no 503 handlers configured, rejected connections are closed
    // without a response.
    #[inline]
    fn spawn_quiet_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let wait = limits.0.wait_strategy.clone();

        tokio::spawn(async move {
            loop {
                drop(Server::get_stream(&queue, &wait).await);
            }
        });
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder<H: Handler> {
    listener: Option<TcpListener>,
    handler: Option<H>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    stream_limits: Option<StreamLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    /// Sets the TCP listener the server accepts connections from.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the request handler that will process incoming requests.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Configures concurrency and admission-queue limits.
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures per-connection timeouts and lifetime limits.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures response body streaming limits.
    #[inline(always)]
    pub fn stream_limits(mut self, limits: StreamLimits) -> Self {
        self.stream_limits = Some(limits);
        self
    }

    /// Finalizes the builder, spawns the worker tasks and constructs a
    /// [`Server`] instance. Must be called inside a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when the `listener` or `handler` method was not called.
    #[inline(always)]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, handler, limits) = self.get_all_limits();
        let handler = Arc::new(handler);

        let stream_queue: TcpQueue = Arc::new(SegQueue::new());
        let error_queue: TcpQueue = Arc::new(SegQueue::new());

        for _ in 0..limits.0.max_connections {
            Server::spawn_worker(&stream_queue, &limits, &handler);
        }
        if limits.0.count_503_handlers != 0 {
            for _ in 0..limits.0.count_503_handlers {
                Server::spawn_alarmist(&error_queue, &limits);
            }
        } else {
            Server::spawn_quiet_alarmist(&error_queue, &limits);
        }

        Server {
            listener,
            stream_queue,
            error_queue,
            server_limits: limits.0,
        }
    }

    #[inline(always)]
    #[track_caller]
    fn get_all_limits(self) -> (TcpListener, H, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.handler
                .expect("The `handler` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.stream_limits.unwrap_or_default(),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Hello;

    impl Handler for Hello {
        fn handle(&self, _: &Request) -> ResponseData {
            ResponseData::full(StatusCode::Ok, "text/plain", "Hello world!")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_over_the_worker_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = Server::builder()
            .listener(listener)
            .handler(Hello)
            .server_limits(ServerLimits {
                max_connections: 2,
                ..ServerLimits::default()
            })
            .build();
        tokio::spawn(server.launch());

        for _ in 0..3 {
            let mut client = TcpStream::connect(address).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();

            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            let response = String::from_utf8(response).unwrap();

            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.ends_with("\r\n\r\nHello world!"));
        }
    }
}
