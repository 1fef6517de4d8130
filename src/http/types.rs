//! Core HTTP protocol types shared by the parser, the dispatch registry
//! and the response writer.

use crate::errors::ErrorKind;

// METHOD

/// HTTP request methods supported by the sensor's web interface.
///
/// The discriminant doubles as the method's bit position in a
/// [`MethodMask`] and as its slot in the per-route handler table,
/// so lookups are a single array index.
///
/// The declaration order is the canonical order used when listing
/// methods, e.g. in an `Allow` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    /// [[RFC7231, Section 4.3.1](https://tools.ietf.org/html/rfc7231#section-4.3.1)]
    Get,
    /// POST method - perform resource-specific processing on the request payload
    /// [[RFC7231, Section 4.3.3](https://tools.ietf.org/html/rfc7231#section-4.3.3)]
    Post,
    /// PUT method - replace all current representations of the target resource
    /// [[RFC7231, Section 4.3.4](https://tools.ietf.org/html/rfc7231#section-4.3.4)]
    Put,
    /// PATCH method - apply partial modifications to a resource
    /// [[RFC5789, Section 2](https://tools.ietf.org/html/rfc5789#section-2)]
    Patch,
    /// DELETE method - remove all current representations of the target resource
    /// [[RFC7231, Section 4.3.5](https://tools.ietf.org/html/rfc7231#section-4.3.5)]
    Delete,
    /// HEAD method - same as GET but without response body
    /// [[RFC7231, Section 4.3.2](https://tools.ietf.org/html/rfc7231#section-4.3.2)]
    Head,
    /// OPTIONS method - describe the communication options for the target resource
    /// [[RFC7231, Section 4.3.7](https://tools.ietf.org/html/rfc7231#section-4.3.7)]
    Options,
}

impl Method {
    /// Number of supported methods, and therefore the size of every
    /// per-route handler table.
    pub const COUNT: usize = 7;

    /// All methods in canonical order.
    pub const ALL: [Method; Method::COUNT] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    #[inline(always)]
    pub(crate) fn from_bytes(src: &[u8]) -> Result<(Self, usize), ErrorKind> {
        match src {
            [b'G', b'E', b'T', b' ', ..] => Ok((Method::Get, 4)),
            [b'P', b'U', b'T', b' ', ..] => Ok((Method::Put, 4)),
            [b'P', b'O', b'S', b'T', b' ', ..] => Ok((Method::Post, 5)),
            [b'H', b'E', b'A', b'D', b' ', ..] => Ok((Method::Head, 5)),
            [b'P', b'A', b'T', b'C', b'H', b' ', ..] => Ok((Method::Patch, 6)),
            [b'D', b'E', b'L', b'E', b'T', b'E', b' ', ..] => Ok((Method::Delete, 7)),
            [b'O', b'P', b'T', b'I', b'O', b'N', b'S', b' ', ..] => Ok((Method::Options, 8)),
            _ => Err(ErrorKind::InvalidMethod),
        }
    }

    /// Returns this method's slot in a handler table.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the canonical upper-case method name.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Returns the lower-case method name used as a metrics label value.
    #[inline]
    pub const fn as_label(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
            Method::Delete => "delete",
            Method::Head => "head",
            Method::Options => "options",
        }
    }
}

// METHOD MASK

/// A set of HTTP methods encoded as one bit per [`Method`].
///
/// # Examples
/// ```
/// use thermoweb::{Method, MethodMask};
///
/// let mask = MethodMask::of(Method::Get).with(Method::Head);
/// assert!(mask.contains(Method::Get));
/// assert!(!mask.contains(Method::Post));
/// assert_eq!(mask.iter().collect::<Vec<_>>(), [Method::Get, Method::Head]);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MethodMask(u8);

impl MethodMask {
    /// The empty method set.
    pub const NONE: MethodMask = MethodMask(0);

    /// The set of all supported methods.
    pub const ANY: MethodMask = MethodMask((1 << Method::COUNT) - 1);

    /// Creates a mask containing exactly one method.
    #[inline(always)]
    pub const fn of(method: Method) -> Self {
        MethodMask(1 << method.index())
    }

    /// Returns a copy of this mask with `method` added.
    #[inline(always)]
    pub const fn with(self, method: Method) -> Self {
        MethodMask(self.0 | 1 << method.index())
    }

    /// Checks whether `method` is part of this set.
    #[inline(always)]
    pub const fn contains(self, method: Method) -> bool {
        self.0 & 1 << method.index() != 0
    }

    /// Checks whether the set is empty.
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained methods in canonical order.
    #[inline]
    pub fn iter(self) -> impl Iterator<Item = Method> {
        Method::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl From<Method> for MethodMask {
    #[inline(always)]
    fn from(method: Method) -> Self {
        MethodMask::of(method)
    }
}

// VERSION

/// HTTP protocol version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,

    /// HTTP/1.1 [RFC 7230](https://tools.ietf.org/html/rfc7230) and related
    Http11,
}

impl Version {
    /// Parses the version token of a request line. The boolean is the
    /// version's default keep-alive behavior.
    #[inline(always)]
    pub(crate) const fn from_bytes(src: &[u8]) -> Result<(Self, bool), ErrorKind> {
        match src {
            b"HTTP/1.1" => Ok((Self::Http11, true)),
            b"HTTP/1.0" => Ok((Self::Http10, false)),
            _ => Err(ErrorKind::UnsupportedVersion),
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes used by the sensor's web interface.
        ///
        /// Only the codes this firmware actually produces are listed; see
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15)
        /// for the full registry.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            // Returns the HTTP first line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn to_first_line(self, version: Version) -> &'static [u8] {
                match (self, version) { $(
                    (StatusCode::$name, Version::Http11) => {
                        concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes()
                    },
                    (StatusCode::$name, Version::Http10) => {
                        concat!("HTTP/1.0 ", $num, " ", $str, "\r\n").as_bytes()
                    },
                )+ }
            }

            /// Returns the numeric code, e.g. `404`.
            #[inline(always)]
            pub const fn as_u16(self) -> u16 {
                self as u16
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC6585, Section 5](https://datatracker.ietf.org/doc/html/rfc6585#section-5)]
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");
    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)]
    ServiceUnavailable = (503, "Service Unavailable");
    /// [[RFC9110, Section 15.6.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.6)]
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn parse() {
        let cases = [
            (&b"GET / HTTP/1.1"[..], Method::Get, 4),
            (b"POST /data HTTP/1.1", Method::Post, 5),
            (b"OPTIONS * HTTP/1.1", Method::Options, 8),
        ];

        for (input, method, skip) in cases {
            assert_eq!(Method::from_bytes(input), Ok((method, skip)));
        }

        assert_eq!(
            Method::from_bytes(b"BREW /pot HTTP/1.1"),
            Err(ErrorKind::InvalidMethod)
        );
    }

    #[test]
    fn index_is_canonical_order() {
        for (i, method) in Method::ALL.into_iter().enumerate() {
            assert_eq!(method.index(), i);
        }
    }
}

#[cfg(test)]
mod mask_tests {
    use super::*;

    #[test]
    fn contains_and_iter() {
        let mask = MethodMask::of(Method::Get)
            .with(Method::Head)
            .with(Method::Delete);

        assert!(mask.contains(Method::Get));
        assert!(mask.contains(Method::Head));
        assert!(!mask.contains(Method::Post));
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            [Method::Get, Method::Delete, Method::Head]
        );
    }

    #[test]
    fn any_holds_everything() {
        for method in Method::ALL {
            assert!(MethodMask::ANY.contains(method));
            assert!(!MethodMask::NONE.contains(method));
        }
    }
}
