//! Route registration and request dispatch.
//!
//! Routes bind a path to up to one handler per method, stored in a
//! fixed-size table indexed by [`Method::index`]. Dispatch picks the
//! longest registered path that matches the request path exactly or as
//! a `/`-delimited prefix, then the handler in the method's slot.

use crate::http::{
    request::Request,
    response::ResponseData,
    types::{Method, MethodMask, StatusCode},
};
use tracing::{error, warn};

/// A route handler. Builds a complete response description for a
/// matched request.
pub type RouteHandler = Box<dyn Fn(&Request) -> ResponseData + Send + Sync>;

/// A handler for requests whose path matched but whose method did not.
/// Receives the set of methods the route does handle.
pub type RejectHandler = Box<dyn Fn(&Request, MethodMask) -> ResponseData + Send + Sync>;

struct Route {
    path: String,
    handlers: [Option<RouteHandler>; Method::COUNT],
}

impl Route {
    fn new(path: String) -> Self {
        const EMPTY: Option<RouteHandler> = None;

        Self {
            path,
            handlers: [EMPTY; Method::COUNT],
        }
    }

    // The methods this route answers, HEAD included when it can be
    // synthesized from GET.
    fn allowed(&self) -> MethodMask {
        let mut mask = MethodMask::NONE;
        for method in Method::ALL {
            if self.handlers[method.index()].is_some() {
                mask = mask.with(method);
            }
        }
        if mask.contains(Method::Get) {
            mask = mask.with(Method::Head);
        }

        mask
    }
}

/// The route table and dispatch logic.
///
/// A table starts with no error handlers; a request that would need one
/// then gets a logged bodiless 500, which marks a wiring defect without
/// crashing anything. [`SensorApp`](crate::routes::SensorApp) installs
/// templated 404/405 pages.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    not_found: Option<RouteHandler>,
    method_not_allowed: Option<RejectHandler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `path` for every method in `mask`.
    ///
    /// Registering a `(path, method)` pair twice replaces the earlier
    /// handler; shared handlers are cheap to clone into several
    /// registrations, so this only happens by mistake.
    pub fn register(
        &mut self,
        path: impl Into<String>,
        mask: MethodMask,
        handler: impl Fn(&Request) -> ResponseData + Send + Sync + Clone + 'static,
    ) {
        let path = path.into();
        debug_assert!(path.starts_with('/'));
        debug_assert!(!mask.is_empty());

        let index = match self.routes.iter().position(|route| route.path == path) {
            Some(index) => index,
            None => {
                self.routes.push(Route::new(path));
                self.routes.len() - 1
            }
        };
        let route = &mut self.routes[index];

        for method in mask.iter() {
            let slot = &mut route.handlers[method.index()];
            if slot.is_some() {
                warn!(path = %route.path, method = method.as_str(), "route handler replaced");
            }
            *slot = Some(Box::new(handler.clone()));
        }
    }

    /// Sets the handler for paths no route matches.
    pub fn set_not_found(&mut self, handler: RouteHandler) {
        self.not_found = Some(handler);
    }

    /// Sets the handler for matched paths with an unhandled method.
    /// Implementations should carry an `allow` header built from the
    /// given mask (see [`allow_list`]).
    pub fn set_method_not_allowed(&mut self, handler: RejectHandler) {
        self.method_not_allowed = Some(handler);
    }

    /// Routes a request to its handler and returns the response
    /// description. Never fails; unmatched requests get the error
    /// handlers' responses.
    pub fn dispatch(&self, request: &Request) -> ResponseData {
        let method = request.method();

        let response = match self.find(request.path()) {
            None => match &self.not_found {
                Some(handler) => handler(request),
                None => missing_handler(request),
            },
            Some(route) => match &route.handlers[method.index()] {
                Some(handler) => handler(request),
                None => match (method, &route.handlers[Method::Get.index()]) {
                    // HEAD is answered from GET when not registered itself.
                    (Method::Head, Some(get_handler)) => get_handler(request),
                    _ => match &self.method_not_allowed {
                        Some(handler) => handler(request, route.allowed()),
                        None => missing_handler(request),
                    },
                },
            },
        };

        // HEAD never carries body bytes, whatever handler produced the
        // response.
        match method {
            Method::Head => response.into_head_only(),
            _ => response,
        }
    }

    // Longest registered path matching exactly or as a path prefix.
    fn find(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| path_matches(&route.path, path))
            .max_by_key(|route| route.path.len())
    }
}

#[inline]
fn path_matches(route: &str, path: &str) -> bool {
    path == route
        || (path.len() > route.len()
            && path.starts_with(route)
            && path.as_bytes()[route.len()] == b'/')
}

// A request fell through to an error handler nobody configured.
fn missing_handler(request: &Request) -> ResponseData {
    error!(
        path = request.path(),
        method = request.method().as_str(),
        "no handler configured for request"
    );

    ResponseData::empty(StatusCode::InternalServerError)
}

/// Renders a mask as an `allow` header value, canonical method order.
pub fn allow_list(mask: MethodMask) -> String {
    let mut list = String::new();
    for method in mask.iter() {
        if !list.is_empty() {
            list.push_str(", ");
        }
        list.push_str(method.as_str());
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::test_support::request;

    fn text(body: &'static str) -> impl Fn(&Request) -> ResponseData + Clone {
        move |_: &Request| ResponseData::full(StatusCode::Ok, "text/plain", body)
    }

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table.set_not_found(Box::new(|_| ResponseData::empty(StatusCode::NotFound)));
        table.set_method_not_allowed(Box::new(|_, allowed| {
            ResponseData::empty(StatusCode::MethodNotAllowed)
                .with_header("allow", allow_list(allowed))
        }));
        table.register("/", MethodMask::of(Method::Get), text("home"));
        table.register("/api", MethodMask::of(Method::Get), text("api"));
        table.register(
            "/api/deep",
            MethodMask::of(Method::Get).with(Method::Post),
            text("deep"),
        );
        table.register("/submit", MethodMask::of(Method::Post), text("ok"));
        table
    }

    #[test]
    fn exact_and_prefix_matching() {
        let table = table();
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n", 200, 4),
            // "/" matches only itself, so this is a 404.
            ("GET /unknown HTTP/1.1\r\n\r\n", 404, 0),
            ("GET /api HTTP/1.1\r\n\r\n", 200, 3),
            ("GET /api/other HTTP/1.1\r\n\r\n", 200, 3),
            // Longest prefix wins.
            ("GET /api/deep/item HTTP/1.1\r\n\r\n", 200, 4),
            // Prefixes only count at segment boundaries.
            ("GET /apix HTTP/1.1\r\n\r\n", 404, 0),
        ];

        for (head, status, len) in cases {
            let response = table.dispatch(&request(head));
            assert_eq!(response.status().as_u16(), status, "for {:?}", head);
            assert_eq!(response.content_length(), len, "for {:?}", head);
        }
    }

    #[test]
    fn head_is_synthesized_from_get() {
        let table = table();
        let response = table.dispatch(&request("HEAD /api HTTP/1.1\r\n\r\n"));

        assert_eq!(response.status(), StatusCode::Ok);
        // Same length a GET would declare, no body on the wire.
        assert_eq!(response.content_length(), 3);
    }

    #[test]
    fn unhandled_method_is_405_with_allow() {
        let table = table();
        let mut response = table.dispatch(&request("DELETE /api/deep HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);

        let mut head = Vec::new();
        response.write_head(&mut head, crate::Version::Http11, false);
        let head = String::from_utf8(head).unwrap();
        assert!(head.contains("allow: GET, POST, HEAD\r\n"), "{head}");

        // POST-only routes do not admit HEAD.
        response = table.dispatch(&request("GET /submit HTTP/1.1\r\n\r\n"));
        let mut head = Vec::new();
        response.write_head(&mut head, crate::Version::Http11, false);
        assert!(String::from_utf8(head).unwrap().contains("allow: POST\r\n"));
    }

    #[test]
    fn head_on_post_only_route_is_405() {
        let table = table();
        let response = table.dispatch(&request("HEAD /submit HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(response.content_length(), 0);
    }

    #[test]
    fn unconfigured_error_handlers_degrade_to_500() {
        let mut table = RouteTable::new();
        table.register("/only", MethodMask::of(Method::Post), text("ok"));

        let response = table.dispatch(&request("GET /nowhere HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(response.content_length(), 0);

        let response = table.dispatch(&request("GET /only HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }

    #[test]
    fn allow_list_order_is_canonical() {
        let mask = MethodMask::of(Method::Options)
            .with(Method::Get)
            .with(Method::Delete);
        assert_eq!(allow_list(mask), "GET, DELETE, OPTIONS");
    }
}
