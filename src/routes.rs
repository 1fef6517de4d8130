//! The sensor's web application: route wiring and request accounting.

use crate::{
    assets,
    fill::{GzipFiller, StaticFiller, TemplateFiller},
    http::{
        request::Request,
        response::ResponseData,
        types::{Method, MethodMask, StatusCode},
    },
    metrics::{
        self,
        text::{MetricsConfig, OPENMETRICS_CONTENT_TYPE, PLAIN_CONTENT_TYPE},
    },
    readings::Readings,
    server::{
        counters::RequestCounters,
        registry::{allow_list, RouteTable},
        server_impl::Handler,
    },
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

/// The complete web application: routes, shared readings, counters and
/// metrics configuration.
///
/// Implements [`Handler`], so it plugs straight into
/// [`Server`](crate::Server).
pub struct SensorApp {
    inner: Arc<Inner>,
    table: RouteTable,
}

struct Inner {
    readings: Arc<Readings>,
    counters: Mutex<RequestCounters>,
    metrics: MetricsConfig,
}

impl Inner {
    fn counters(&self) -> MutexGuard<'_, RequestCounters> {
        match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SensorApp {
    fn default() -> Self {
        Self::new(Arc::new(Readings::new()), MetricsConfig::default())
    }
}

impl SensorApp {
    pub fn new(readings: Arc<Readings>, metrics: MetricsConfig) -> Self {
        let inner = Arc::new(Inner {
            readings,
            counters: Mutex::new(RequestCounters::new()),
            metrics,
        });

        Self {
            table: build_table(&inner),
            inner,
        }
    }

    /// The shared readings this application serves.
    pub fn readings(&self) -> Arc<Readings> {
        Arc::clone(&self.inner.readings)
    }

    /// Renders a complete metrics exposition in the requested dialect.
    ///
    /// This is also what the push loop sends, always in the plain
    /// dialect.
    pub fn render_metrics(&self, openmetrics: bool) -> Vec<u8> {
        render_metrics(&self.inner, openmetrics)
    }
}

impl Handler for SensorApp {
    fn handle(&self, request: &Request) -> ResponseData {
        let response = self.table.dispatch(request);

        // Exactly one count per dispatched request, after the handler
        // chose the status and before any body bytes move.
        self.inner
            .counters()
            .increment(request.path(), request.method(), response.status().as_u16());

        response
    }
}

fn render_metrics(inner: &Inner, openmetrics: bool) -> Vec<u8> {
    let measurement = inner.readings.snapshot();
    let memory = memory_stats::memory_stats().map(|stats| stats.physical_mem as u64);

    metrics::text::render(
        &inner.metrics,
        &measurement,
        memory,
        &inner.counters(),
        openmetrics,
    )
}

/// The `/data.json` document the UI polls.
#[derive(serde::Serialize)]
struct DataDocument {
    temperature: serde_json::Value,
    humidity: serde_json::Value,
    time: String,
}

fn build_table(inner: &Arc<Inner>) -> RouteTable {
    let mut table = RouteTable::new();
    let get = MethodMask::of(Method::Get);

    for path in ["/", "/index.html"] {
        let inner = Arc::clone(inner);
        table.register(path, get, move |_: &Request| {
            let measurement = inner.readings.snapshot();
            let page = TemplateFiller::new(
                assets::INDEX_HTML,
                vec![
                    ("TEMP", measurement.temperature_text()),
                    ("HUMID", measurement.humidity_text()),
                    ("TIME", measurement.age_text()),
                ],
            );

            ResponseData::stream(StatusCode::Ok, "text/html", page)
        });
    }

    table.register("/main.css", get, compressed(assets::MAIN_CSS_GZ, "text/css"));
    table.register(
        "/index.js",
        get,
        compressed(assets::INDEX_JS_GZ, "application/javascript"),
    );
    table.register(
        "/manifest.json",
        get,
        compressed(assets::MANIFEST_JSON_GZ, "application/manifest+json"),
    );
    table.register(
        "/favicon.ico",
        get,
        compressed(assets::FAVICON_ICO_GZ, "image/x-icon"),
    );
    table.register(
        "/favicon.png",
        get,
        compressed(assets::FAVICON_PNG_GZ, "image/png"),
    );
    table.register(
        "/favicon.svg",
        get,
        compressed(assets::FAVICON_SVG_GZ, "image/svg+xml"),
    );

    {
        let inner = Arc::clone(inner);
        table.register("/temperature", get, move |_: &Request| {
            ResponseData::full(
                StatusCode::Ok,
                "text/plain",
                inner.readings.snapshot().temperature_text(),
            )
        });
    }
    {
        let inner = Arc::clone(inner);
        table.register("/humidity", get, move |_: &Request| {
            ResponseData::full(
                StatusCode::Ok,
                "text/plain",
                inner.readings.snapshot().humidity_text(),
            )
        });
    }

    {
        let inner = Arc::clone(inner);
        table.register("/data.json", get, move |_: &Request| {
            let measurement = inner.readings.snapshot();
            let document = DataDocument {
                temperature: measurement.temperature_json(),
                humidity: measurement.humidity_json(),
                time: measurement.age_text(),
            };

            match serde_json::to_string(&document) {
                Ok(body) => ResponseData::full(StatusCode::Ok, "application/json", body)
                    .with_header("cache-control", "no-cache"),
                Err(err) => {
                    error!(%err, "serializing the data document failed");
                    ResponseData::empty(StatusCode::InternalServerError)
                }
            }
        });
    }

    {
        let inner = Arc::clone(inner);
        table.register("/metrics", get, move |request: &Request| {
            let openmetrics = request.accepts_openmetrics();
            debug!(openmetrics, "rendering metrics exposition");

            let content_type = match openmetrics {
                true => OPENMETRICS_CONTENT_TYPE,
                false => PLAIN_CONTENT_TYPE,
            };

            ResponseData::full(
                StatusCode::Ok,
                content_type,
                render_metrics(&inner, openmetrics),
            )
            .with_header("cache-control", "no-cache, no-store, max-age=0")
            .with_header("vary", "Accept")
        });
    }

    table.set_not_found(Box::new(|request: &Request| {
        debug!(path = request.path(), "request for a file that does not exist");

        error_page(
            StatusCode::NotFound,
            "Error 404 Not Found",
            String::from("The requested file can not be found on this server!"),
            format!("The page \"{}\" couldn't be found.", request.path()),
        )
    }));

    table.set_method_not_allowed(Box::new(|request: &Request, allowed| {
        let allow = allow_list(allowed);
        let response = error_page(
            StatusCode::MethodNotAllowed,
            "Error 405 Method Not Allowed",
            format!(
                "The page cannot handle {} requests!",
                request.method().as_str()
            ),
            format!(
                "The page \"{}\" can handle the request types {}.",
                request.path(),
                allow
            ),
        );

        response.with_header("allow", allow)
    }));

    table
}

// A handler for a gzip-stored asset: raw copy with
// `content-encoding: gzip` when the client accepts it, streamed
// decompression otherwise.
fn compressed(
    stored: &'static [u8],
    content_type: &'static str,
) -> impl Fn(&Request) -> ResponseData + Clone {
    move |request: &Request| {
        if request.accepts_gzip() {
            return ResponseData::stream(StatusCode::Ok, content_type, StaticFiller::new(stored))
                .with_gzip_encoding();
        }

        match GzipFiller::new(stored) {
            Ok(filler) => ResponseData::stream(StatusCode::Ok, content_type, filler),
            Err(err) => {
                error!(%err, content_type, "stored asset is not valid gzip");
                ResponseData::empty(StatusCode::InternalServerError)
            }
        }
    }
}

fn error_page(
    status: StatusCode,
    title: &'static str,
    message: String,
    details: String,
) -> ResponseData {
    let page = TemplateFiller::new(
        assets::ERROR_HTML,
        vec![
            ("TITLE", title.to_string()),
            ("ERROR", message),
            ("DETAILS", details),
        ],
    );

    ResponseData::stream(status, "text/html", page)
}
