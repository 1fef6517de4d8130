//! Prometheus / OpenMetrics text exposition.
//!
//! One complete buffer is produced per scrape or push: the sensor
//! gauges, an optional process-memory gauge, a `build_info` constant and
//! one `http_requests_total` sample per counter entry, with `# EOF` when
//! the OpenMetrics dialect was negotiated.
//!
//! An upper bound for the whole exposition is computed before anything
//! is written, from the namespace length, worst-case numeric widths and
//! the counter table's path lengths. The writer checks every line
//! against that bound; if a line would cross it, the remainder is
//! dropped with a loud diagnostic and the partial buffer is returned.

use crate::{readings::Measurement, server::counters::RequestCounters};
use std::fmt::Write as _;
use tracing::error;

/// Content type for the OpenMetrics exposition dialect.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Content type for the classic Prometheus text dialect.
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// Worst-case width of a formatted sample value: sign, twenty integer
// digits, dot and three fractional digits, with room to spare.
const VALUE_WIDTH: usize = 32;

/// Compile-time information exposed as `build_info` labels.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Source revision the binary was built from.
    pub commit: &'static str,
    /// Target architecture the binary runs on.
    pub mcu_type: &'static str,
    /// Compiler version used for the build.
    pub rustc_version: &'static str,
    /// Crate version.
    pub pkg_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            commit: match option_env!("THERMOWEB_COMMIT") {
                Some(commit) => commit,
                None => "unknown",
            },
            mcu_type: std::env::consts::ARCH,
            rustc_version: match option_env!("THERMOWEB_RUSTC_VERSION") {
                Some(version) => version,
                None => "unknown",
            },
            pkg_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Metrics naming and labeling configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix for all sensor metrics (default: `thermo`).
    pub namespace: String,

    /// Labels for the `build_info` metric.
    pub build: BuildInfo,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: String::from("thermo"),
            build: BuildInfo::default(),
        }
    }
}

/// Renders the complete exposition.
///
/// `process_memory` is the resident memory of the process, when the
/// platform reports one; its gauge is omitted otherwise. `openmetrics`
/// selects the exposition dialect.
pub fn render(
    config: &MetricsConfig,
    measurement: &Measurement,
    process_memory: Option<u64>,
    counters: &RequestCounters,
    openmetrics: bool,
) -> Vec<u8> {
    let ns = config.namespace.as_str();
    let temperature = format!("{}_temperature_celsius", ns);
    let humidity = format!("{}_humidity_percent", ns);
    let build_info = format!("{}_build_info", ns);
    let requests = format!("{}_http_requests_total", ns);

    let build_labels = format!(
        "{{commit=\"{}\",mcu_type=\"{}\",rustc_version=\"{}\",pkg_version=\"{}\"}} 1\n",
        config.build.commit,
        config.build.mcu_type,
        config.build.rustc_version,
        config.build.pkg_version,
    );

    let bound = gauge_bound(&temperature, TEMPERATURE_HELP, "celsius", openmetrics)
        + gauge_bound(&humidity, HUMIDITY_HELP, "percent", openmetrics)
        + match process_memory {
            Some(_) => gauge_bound("process_memory_bytes", MEMORY_HELP, "bytes", openmetrics),
            None => 0,
        }
        + metadata_bound(&build_info, BUILD_INFO_HELP)
        + metadata_bound(&build_info, "gauge")
        + build_info.len()
        + build_labels.len()
        + metadata_bound(&requests, REQUESTS_HELP)
        + metadata_bound(&requests, "counter")
        + (requests.len() + REQUEST_LABELS_WIDTH) * counters.entry_count()
        + counters.path_bytes()
        + EOF.len();

    let mut out = Writer::new(bound);

    gauge(
        &mut out,
        &temperature,
        "celsius",
        TEMPERATURE_HELP,
        measurement.temperature as f64,
        openmetrics,
    );
    gauge(
        &mut out,
        &humidity,
        "percent",
        HUMIDITY_HELP,
        measurement.humidity as f64,
        openmetrics,
    );
    if let Some(memory) = process_memory {
        gauge(
            &mut out,
            "process_memory_bytes",
            "bytes",
            MEMORY_HELP,
            memory as f64,
            openmetrics,
        );
    }

    metadata(&mut out, "HELP", &build_info, BUILD_INFO_HELP);
    metadata(
        &mut out,
        "TYPE",
        &build_info,
        match openmetrics {
            true => "info",
            false => "gauge",
        },
    );
    out.line(format_args!("{}{}", build_info, build_labels));

    metadata(&mut out, "HELP", &requests, REQUESTS_HELP);
    metadata(&mut out, "TYPE", &requests, "counter");
    for (path, method, status, count) in counters.iter() {
        out.line(format_args!(
            "{}{{method=\"{}\",code=\"{}\",path=\"{}\"}} {}\n",
            requests,
            method.as_label(),
            status,
            path,
            count,
        ));
    }

    if openmetrics {
        out.line(format_args!("{}", EOF));
    }

    out.into_bytes()
}

const TEMPERATURE_HELP: &str = "The current measured temperature in degrees celsius.";
const HUMIDITY_HELP: &str = "The current measured relative humidity in percent.";
const MEMORY_HELP: &str = "The resident memory used by this process in bytes.";
const BUILD_INFO_HELP: &str = "A constant 1 with compile time information as labels.";
const REQUESTS_HELP: &str = "The total number of HTTP requests handled by this server.";
const EOF: &str = "# EOF\n";

// `{method="options",code="65535",path=""} ` plus a 20-digit count and
// the newline.
const REQUEST_LABELS_WIDTH: usize = 40 + 21;

// `# HELP <name> <text>\n` and friends.
fn metadata_bound(name: &str, text: &str) -> usize {
    2 + 4 + 1 + name.len() + 1 + text.len() + 1
}

fn gauge_bound(name: &str, help: &str, unit: &str, openmetrics: bool) -> usize {
    metadata_bound(name, help)
        + metadata_bound(name, "gauge")
        + match openmetrics {
            true => metadata_bound(name, unit),
            false => 0,
        }
        + name.len()
        + VALUE_WIDTH
}

fn metadata(out: &mut Writer, field: &str, name: &str, value: &str) {
    out.line(format_args!("# {} {} {}\n", field, name, value));
}

// HELP, TYPE, optional UNIT, then the sample. NaN renders as the
// literal ` NAN` the way the scrapers of this sensor expect it.
fn gauge(out: &mut Writer, name: &str, unit: &str, help: &str, value: f64, openmetrics: bool) {
    metadata(out, "HELP", name, help);
    metadata(out, "TYPE", name, "gauge");
    if openmetrics {
        metadata(out, "UNIT", name, unit);
    }

    match value.is_nan() {
        true => out.line(format_args!("{} NAN\n", name)),
        false => out.line(format_args!("{} {:.3}\n", name, value)),
    }
}

// Collects lines while tracking the precomputed bound. Once a line
// would cross the bound, everything further is dropped.
struct Writer {
    buf: String,
    bound: usize,
    overflowed: bool,
}

impl Writer {
    fn new(bound: usize) -> Self {
        Self {
            buf: String::with_capacity(bound),
            bound,
            overflowed: false,
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if self.overflowed {
            return;
        }

        let start = self.buf.len();
        // Writing to a String cannot fail.
        let _ = self.buf.write_fmt(args);

        if self.buf.len() > self.bound {
            self.buf.truncate(start);
            self.overflowed = true;
            error!(
                bound = self.bound,
                "metrics exposition exceeded its size bound, output truncated"
            );
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Method;

    fn config() -> MetricsConfig {
        MetricsConfig {
            namespace: String::from("thermo"),
            build: BuildInfo {
                commit: "abc1234",
                mcu_type: "x86_64",
                rustc_version: "1.75.0",
                pkg_version: "0.1.0",
            },
        }
    }

    fn measurement(temperature: f32, humidity: f32) -> Measurement {
        Measurement {
            temperature,
            humidity,
            measured_at: None,
        }
    }

    fn render_str(
        measurement: &Measurement,
        memory: Option<u64>,
        counters: &RequestCounters,
        openmetrics: bool,
    ) -> String {
        let out = render(&config(), measurement, memory, counters, openmetrics);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn plain_dialect() {
        let mut counters = RequestCounters::new();
        counters.increment("/", Method::Get, 200);
        counters.increment("/", Method::Get, 200);
        counters.increment("/missing", Method::Post, 404);

        let text = render_str(&measurement(21.5, 40.25), Some(2048), &counters, false);

        assert_eq!(
            text,
            "# HELP thermo_temperature_celsius The current measured temperature in degrees celsius.\n\
             # TYPE thermo_temperature_celsius gauge\n\
             thermo_temperature_celsius 21.500\n\
             # HELP thermo_humidity_percent The current measured relative humidity in percent.\n\
             # TYPE thermo_humidity_percent gauge\n\
             thermo_humidity_percent 40.250\n\
             # HELP process_memory_bytes The resident memory used by this process in bytes.\n\
             # TYPE process_memory_bytes gauge\n\
             process_memory_bytes 2048.000\n\
             # HELP thermo_build_info A constant 1 with compile time information as labels.\n\
             # TYPE thermo_build_info gauge\n\
             thermo_build_info{commit=\"abc1234\",mcu_type=\"x86_64\",rustc_version=\"1.75.0\",pkg_version=\"0.1.0\"} 1\n\
             # HELP thermo_http_requests_total The total number of HTTP requests handled by this server.\n\
             # TYPE thermo_http_requests_total counter\n\
             thermo_http_requests_total{method=\"get\",code=\"200\",path=\"/\"} 2\n\
             thermo_http_requests_total{method=\"post\",code=\"404\",path=\"/missing\"} 1\n"
        );
    }

    #[test]
    fn openmetrics_dialect() {
        let counters = RequestCounters::new();
        let text = render_str(&measurement(21.5, 40.25), None, &counters, true);

        assert!(text.contains("# UNIT thermo_temperature_celsius celsius\n"));
        assert!(text.contains("# UNIT thermo_humidity_percent percent\n"));
        assert!(text.contains("# TYPE thermo_build_info info\n"));
        assert!(text.ends_with("# EOF\n"));
        // No memory reading, no memory gauge.
        assert!(!text.contains("process_memory_bytes"));
    }

    #[test]
    fn unknown_readings_render_as_nan() {
        let counters = RequestCounters::new();
        let text = render_str(&measurement(f32::NAN, f32::NAN), None, &counters, false);

        assert!(text.contains("thermo_temperature_celsius NAN\n"));
        assert!(text.contains("thermo_humidity_percent NAN\n"));
    }

    #[test]
    fn output_stays_within_bound() {
        let mut counters = RequestCounters::new();
        for i in 0..200 {
            let path = format!("/some/longer/path/number/{}", i);
            counters.increment(&path, Method::Get, 200);
            counters.increment(&path, Method::Head, 404);
        }

        // Rendering a big counter table must not trip the bound guard.
        let text = render_str(&measurement(21.5, 40.25), Some(1 << 30), &counters, true);
        assert!(text.ends_with("# EOF\n"));
        assert_eq!(text.matches("thermo_http_requests_total{").count(), 400);
    }

    #[test]
    fn writer_drops_lines_past_the_bound() {
        let mut writer = Writer::new(10);
        writer.line(format_args!("12345\n"));
        writer.line(format_args!("too long to fit\n"));
        writer.line(format_args!("x\n"));

        // Everything after the overflowing line is dropped too.
        assert_eq!(writer.into_bytes(), b"12345\n");
    }
}
