//! Web assets compiled into the binary.
//!
//! Pages that carry `%NAME%` placeholders are stored uncompressed so the
//! template filler can substitute into them. Everything else is stored
//! gzip-compressed and either sent verbatim (client accepts `gzip`) or
//! inflated on the fly.

/// Measurements page; carries `%TEMP%`, `%HUMID%` and `%TIME%`.
pub const INDEX_HTML: &[u8] = include_bytes!("../web/index.html");

/// Error page; carries `%TITLE%`, `%ERROR%` and `%DETAILS%`.
pub const ERROR_HTML: &[u8] = include_bytes!("../web/error.html");

pub const MAIN_CSS_GZ: &[u8] = include_bytes!("../web/gzip/main.css.gz");
pub const INDEX_JS_GZ: &[u8] = include_bytes!("../web/gzip/index.js.gz");
pub const MANIFEST_JSON_GZ: &[u8] = include_bytes!("../web/gzip/manifest.json.gz");
pub const FAVICON_ICO_GZ: &[u8] = include_bytes!("../web/gzip/favicon.ico.gz");
pub const FAVICON_PNG_GZ: &[u8] = include_bytes!("../web/gzip/favicon.png.gz");
pub const FAVICON_SVG_GZ: &[u8] = include_bytes!("../web/gzip/favicon.svg.gz");
