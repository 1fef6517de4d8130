//! Periodic metrics push to a Prometheus Pushgateway.
//!
//! The pusher POSTs the plain-dialect exposition to the gateway over a
//! raw TCP connection. Pushes are single-flight: if the previous push is
//! still in progress when the next one is due, the new one is skipped
//! and the data goes out with the following tick. Push failures are
//! never fatal; they are logged and retried on the next interval.

use crate::errors::PushError;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};
use tracing::{debug, warn};

/// Pushgateway connection configuration.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Gateway address as `host:port`.
    pub address: String,

    /// Value for the `host` request header; usually the host part of
    /// `address`.
    pub host: String,

    /// Job name in the push URL.
    pub job: String,

    /// Instance name in the push URL.
    pub instance: String,

    /// Namespace segment in the push URL.
    pub namespace: String,

    /// Time between pushes (default: `30 seconds`).
    pub interval: Duration,

    /// Timeout for the whole connect-send-confirm round trip
    /// (default: `10 seconds`).
    pub timeout: Duration,
}

impl PushConfig {
    pub fn new(
        address: impl Into<String>,
        host: impl Into<String>,
        job: impl Into<String>,
        instance: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            host: host.into(),
            job: job.into(),
            instance: instance.into(),
            namespace: namespace.into(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushState {
    Idle,
    InFlight,
}

/// Pushes metrics expositions to a gateway, one at a time.
pub struct MetricsPusher {
    config: PushConfig,
    url: String,
    state: Mutex<PushState>,
}

impl MetricsPusher {
    pub fn new(config: PushConfig) -> Self {
        let url = format!(
            "/metrics/job/{}/instance/{}/namespace/{}",
            config.job, config.instance, config.namespace,
        );

        Self {
            config,
            url,
            state: Mutex::new(PushState::Idle),
        }
    }

    /// The gateway path pushes go to.
    pub fn url_path(&self) -> &str {
        &self.url
    }

    /// Pushes one exposition to the gateway.
    ///
    /// Returns [`PushError::InFlight`] without touching the network if a
    /// previous push has not finished yet.
    pub async fn push(&self, body: &[u8]) -> Result<(), PushError> {
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *state == PushState::InFlight {
                return Err(PushError::InFlight);
            }
            *state = PushState::InFlight;
        }
        // Reset to Idle on every exit path, including cancellation.
        let _guard = FlightGuard(&self.state);

        time::timeout(self.config.timeout, self.send(body))
            .await
            .map_err(|_| {
                PushError::Connect(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "push timed out",
                ))
            })?
    }

    async fn send(&self, body: &[u8]) -> Result<(), PushError> {
        let mut stream = TcpStream::connect(&self.config.address).await?;

        let mut head = format!(
            "POST {} HTTP/1.1\r\nhost: {}\r\nconnection: close\r\n",
            self.url, self.config.host,
        );
        head.push_str("content-type: text/plain; version=0.0.4; charset=utf-8\r\n");
        head.push_str(&format!("content-length: {}\r\n\r\n", body.len()));

        stream.write_all(head.as_bytes()).await?;
        stream.write_all(body).await?;

        let mut response = Vec::with_capacity(256);
        let mut chunk = [0; 256];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&chunk[..n]);

            if response.windows(2).any(|w| w == b"\r\n") {
                break;
            }
        }

        match parse_status(&response)? {
            status if (200..300).contains(&status) => {
                debug!(status, "metrics push accepted");
                Ok(())
            }
            status => Err(PushError::Rejected(format!("status {}", status))),
        }
    }

    /// Runs the push loop forever: every interval, render a fresh
    /// exposition with `render` and push it.
    pub async fn run<F>(self: Arc<Self>, render: F)
    where
        F: Fn() -> Vec<u8> + Send + Sync + 'static,
    {
        let render = Arc::new(render);
        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let pusher = Arc::clone(&self);
            let render = Arc::clone(&render);
            tokio::spawn(async move {
                let body = render();
                match pusher.push(&body).await {
                    Ok(()) => {}
                    Err(PushError::InFlight) => {
                        debug!("skipping push, previous one still in flight");
                    }
                    Err(err) => warn!(%err, "metrics push failed"),
                }
            });
        }
    }
}

struct FlightGuard<'a>(&'a Mutex<PushState>);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = match self.0.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = PushState::Idle;
    }
}

// Extracts the status code from a response's first line.
fn parse_status(response: &[u8]) -> Result<u16, PushError> {
    let line = response
        .split(|&byte| byte == b'\r' || byte == b'\n')
        .next()
        .unwrap_or(b"");

    let text = std::str::from_utf8(line).map_err(|_| PushError::InvalidResponse)?;
    if !text.starts_with("HTTP/1.") {
        return Err(PushError::InvalidResponse);
    }

    text.split_ascii_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or(PushError::InvalidResponse)
}
