//! thermoweb - Streaming HTTP stack for a network-connected
//! environmental sensor
//!
//! Serves a small web UI, plain-text and JSON readings, and a
//! Prometheus exposition from fixed, pre-sized buffers. Response bodies
//! are not built in memory: every body is a [`Filler`](fill::Filler)
//! that produces its bytes chunk by chunk while the connection writes,
//! so a page larger than the chunk buffer never forces an allocation
//! proportional to its size.
//!
//! # What's inside
//!
//! - **Resumable body sources** - static ranges, gzip-decompressing
//!   assets and `%NAME%` template substitution, all declaring their
//!   exact output length up front
//! - **Route registry** - longest-prefix dispatch with per-method
//!   handlers, synthesized `HEAD`, `405` with an `Allow` list and
//!   per-`(path, method, status)` request counters
//! - **Metrics** - Prometheus text and OpenMetrics dialects with a
//!   bound-guarded writer, plus an optional Pushgateway loop
//! - **Worker-pool server** - a fixed number of pre-allocated
//!   connection workers fed by an admission queue, built on Tokio
//!
//! # Examples
//!
//! Quick start with the built-in sensor application:
//! ```no_run
//! use thermoweb::{routes::SensorApp, Server};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = SensorApp::default();
//!     app.readings().record(21.5, 40.0);
//!
//!     Server::builder()
//!         .listener(TcpListener::bind("0.0.0.0:8080").await.unwrap())
//!         .handler(app)
//!         .build()
//!         .launch()
//!         .await
//! }
//! ```
//! A custom handler:
//! ```no_run
//! use thermoweb::{Handler, Request, ResponseData, Server, StatusCode};
//! use tokio::net::TcpListener;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     fn handle(&self, request: &Request) -> ResponseData {
//!         match request.path() {
//!             "/" => ResponseData::full(StatusCode::Ok, "text/plain", "Hello world!"),
//!             path => ResponseData::full(StatusCode::NotFound, "text/plain", path.to_string()),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .handler(Hello)
//!         .build()
//!         .launch()
//!         .await
//! }
//! ```
//! Advanced configuration:
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
//!             max_connections: 4, // Constrained targets keep this small
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             max_requests_per_connection: 1_000,
//!             ..ConnLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub mod server {
    pub(crate) mod connection;
    pub mod counters;
    pub mod registry;
    pub(crate) mod server_impl;
}
pub mod fill {
    pub(crate) mod filler;
    mod gzip;
    mod static_range;
    mod template;

    pub use self::{
        filler::{FillStep, Filler},
        gzip::GzipFiller,
        static_range::StaticFiller,
        template::{substituted_len, TemplateFiller, MARKER},
    };
}
pub mod metrics {
    pub mod push;
    pub mod text;
}
pub(crate) mod assets;
pub(crate) mod errors;
pub mod limits;
pub mod readings;
pub mod routes;

pub use crate::{
    errors::{FillError, PushError},
    http::{
        request::Request,
        response::{Body, ResponseData, SERVER_NAME},
        types::{Method, MethodMask, StatusCode, Version},
    },
    server::server_impl::{Handler, Server, ServerBuilder},
};
