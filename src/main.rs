//! Demo binary: serves simulated sensor readings over HTTP.
//!
//! Listens on the address given as the first argument (default
//! `0.0.0.0:8080`) and records a slowly drifting temperature and
//! humidity every ten seconds. Set `THERMOWEB_PUSH_GATEWAY` to a
//! `host:port` to also push the exposition to a Prometheus Pushgateway.

use std::{env, error::Error, sync::Arc, time::Duration};
use thermoweb::{
    metrics::push::{MetricsPusher, PushConfig},
    routes::SensorApp,
    Server,
};
use tokio::{net::TcpListener, time};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let address = env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("0.0.0.0:8080"));
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "listening");

    let app = Arc::new(SensorApp::default());

    let readings = app.readings();
    tokio::spawn(async move {
        let mut ticker = time::interval(Duration::from_secs(10));
        let mut tick = 0u32;

        loop {
            ticker.tick().await;

            // A plausible daily drift stands in for real sensor input.
            let phase = tick as f32 / 360.0;
            readings.record(21.0 + 3.0 * phase.sin(), 45.0 + 10.0 * phase.cos());
            tick = tick.wrapping_add(1);
        }
    });

    if let Ok(gateway) = env::var("THERMOWEB_PUSH_GATEWAY") {
        let host = gateway
            .split(':')
            .next()
            .unwrap_or(gateway.as_str())
            .to_string();
        let pusher = Arc::new(MetricsPusher::new(PushConfig::new(
            gateway,
            host,
            "thermoweb",
            address.clone(),
            "thermo",
        )));

        let app = Arc::clone(&app);
        tokio::spawn(pusher.run(move || app.render_metrics(false)));
    }

    Server::builder()
        .listener(listener)
        .handler(app)
        .build()
        .launch()
        .await;

    Ok(())
}
