//! Fixture construction and rendering.
//!
//! A fixture owns an immutable [ResponseSpec](struct.ResponseSpec.html) and a
//! body source. Running a fixture checks every request assertion in
//! registration order, then renders the configured response. Fixtures are
//! logicless: the response content never depends on the request, only the
//! assertion outcomes do.

use std::convert::TryInto;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};

use crate::assertions::{Assert, Failure};
use crate::router::standardize_path;
use crate::{FullRequest, FullResponse};

/// Error constructing a fixture.
///
/// Construction failures abort test setup; a fixture that fails to load its
/// body never degrades into a per-request error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file backing a fixture body could not be read.
    #[error("error reading file {}: {source}", path.display())]
    ReadFile {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// The underlying io error.
        source: std::io::Error,
    },
    /// The reader backing a fixture body failed.
    #[error("error reading body source: {0}")]
    ReadBody(#[from] std::io::Error),
    /// The json body could not be encoded.
    #[error("error encoding json body: {0}")]
    EncodeJson(#[from] serde_json::Error),
}

/// The method a fixture matches on. The wildcard, written `"*"`, matches any
/// verb; an explicit method only matches itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSpec {
    /// Match any method.
    Any,
    /// Match exactly this method.
    Only(Method),
}

impl MethodSpec {
    pub(crate) fn matches(&self, method: &Method) -> bool {
        match self {
            MethodSpec::Any => true,
            MethodSpec::Only(m) => m == method,
        }
    }
}

impl From<Method> for MethodSpec {
    fn from(method: Method) -> Self {
        MethodSpec::Only(method)
    }
}

/// `"*"` converts to the wildcard. Methods are uppercased, so `"get"` and
/// `"GET"` both match GET requests. Panics on a string that is not a valid
/// HTTP method.
impl From<&str> for MethodSpec {
    fn from(s: &str) -> Self {
        if s == "*" {
            MethodSpec::Any
        } else {
            MethodSpec::Only(
                Method::from_bytes(s.to_ascii_uppercase().as_bytes())
                    .expect("invalid http method"),
            )
        }
    }
}

impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MethodSpec::Any => f.write_str("*"),
            MethodSpec::Only(m) => write!(f, "{}", m),
        }
    }
}

/// Immutable configuration a fixture renders responses from: standardized
/// route, method, status code, response headers and the ordered request
/// assertions.
pub struct ResponseSpec {
    route: String,
    method: MethodSpec,
    status: StatusCode,
    headers: HeaderMap,
    assertions: Vec<Box<dyn Assert>>,
}

impl ResponseSpec {
    fn new(route: &str, method: impl Into<MethodSpec>, status: u16) -> Self {
        ResponseSpec {
            route: standardize_path(route),
            method: method.into(),
            status: StatusCode::from_u16(status).expect("invalid status code"),
            headers: HeaderMap::new(),
            assertions: Vec::new(),
        }
    }

    /// Run every assertion in registration order against the request,
    /// collecting all failures. Never short-circuits.
    fn check_all(&self, req: &FullRequest) -> Vec<Failure> {
        self.assertions
            .iter()
            .filter_map(|a| a.check(req).err())
            .collect()
    }

    fn response(&self, body: Bytes) -> FullResponse {
        let mut resp = http::Response::new(body);
        *resp.status_mut() = self.status;
        *resp.headers_mut() = self.headers.clone();
        resp
    }
}

impl fmt::Debug for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResponseSpec")
            .field("route", &self.route)
            .field("method", &self.method)
            .field("status", &self.status)
            .finish()
    }
}

/// An HTTP fixture: a route, a method and a canned response.
///
/// Fixtures come in two shapes. A static fixture holds a fixed body and
/// returns byte-identical output on every invocation. A sequence fixture
/// (built with [seq](#method.seq)) wraps an ordered list of sub-fixtures and
/// hands out each one's output exactly once, in order, then repeats the last
/// one indefinitely.
pub struct Fixture {
    spec: ResponseSpec,
    kind: Kind,
}

enum Kind {
    Static(Bytes),
    Sequence {
        // guards read-select-advance as a unit; requests arrive concurrently.
        cursor: Mutex<usize>,
        fixtures: Vec<Fixture>,
    },
}

impl Fixture {
    /// Responds to any method at `route` with `body` and status 200.
    pub fn ok(route: &str, body: impl Into<Bytes>) -> Fixture {
        Fixture::bytes(route, MethodSpec::Any, 200, body)
    }

    /// Responds to GET requests at `route` with `body` and status 200.
    pub fn get_ok(route: &str, body: impl Into<Bytes>) -> Fixture {
        Fixture::bytes(route, Method::GET, 200, body)
    }

    /// Responds to matching requests with `body` and status 200.
    pub fn bytes_ok(route: &str, method: impl Into<MethodSpec>, body: impl Into<Bytes>) -> Fixture {
        Fixture::bytes(route, method, 200, body)
    }

    /// Responds to matching requests with `body` and `status`.
    pub fn bytes(
        route: &str,
        method: impl Into<MethodSpec>,
        status: u16,
        body: impl Into<Bytes>,
    ) -> Fixture {
        Fixture {
            spec: ResponseSpec::new(route, method, status),
            kind: Kind::Static(body.into()),
        }
    }

    /// Responds to matching requests with `status` and an empty body.
    pub fn status(route: &str, method: impl Into<MethodSpec>, status: u16) -> Fixture {
        Fixture::bytes(route, method, status, Bytes::new())
    }

    /// Responds to matching requests with 404 Not Found and an empty body.
    pub fn not_found(route: &str, method: impl Into<MethodSpec>) -> Fixture {
        Fixture::status(route, method, 404)
    }

    /// Responds to matching requests with the contents of the file at
    /// `path`, which is read into memory by this constructor.
    pub fn file(
        route: &str,
        method: impl Into<MethodSpec>,
        status: u16,
        path: impl AsRef<Path>,
    ) -> Result<Fixture, Error> {
        let path = path.as_ref();
        let body = std::fs::read(path).map_err(|source| Error::ReadFile {
            path: path.to_owned(),
            source,
        })?;
        Ok(Fixture::bytes(route, method, status, body))
    }

    /// Responds to GET requests at `route` with the contents of the file at
    /// `path` and status 200. The file is read into memory by this
    /// constructor.
    pub fn get_file_ok(route: &str, path: impl AsRef<Path>) -> Result<Fixture, Error> {
        Fixture::file(route, Method::GET, 200, path)
    }

    /// Responds to matching requests with the contents of `reader`, which is
    /// read into memory by this constructor.
    pub fn reader(
        route: &str,
        method: impl Into<MethodSpec>,
        status: u16,
        mut reader: impl Read,
    ) -> Result<Fixture, Error> {
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        Ok(Fixture::bytes(route, method, status, body))
    }

    /// Responds to matching requests with the json encoding of `data` and a
    /// `content-type: application/json` header.
    pub fn json<T>(
        route: &str,
        method: impl Into<MethodSpec>,
        status: u16,
        data: &T,
    ) -> Result<Fixture, Error>
    where
        T: serde::Serialize,
    {
        let body = serde_json::to_vec(data)?;
        Ok(Fixture::bytes(route, method, status, body)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json")))
    }

    /// Responds with the provided fixtures in order, each exactly once,
    /// except for the last one which repeats for every subsequent request.
    ///
    /// Assertions on sub-fixtures still run; their routes and methods are
    /// ignored when nested.
    ///
    /// Panics if `fixtures` is empty.
    pub fn seq(route: &str, method: impl Into<MethodSpec>, fixtures: Vec<Fixture>) -> Fixture {
        if fixtures.is_empty() {
            panic!("empty fixture list provided to seq");
        }
        Fixture {
            spec: ResponseSpec::new(route, method, 200),
            kind: Kind::Sequence {
                cursor: Mutex::new(0),
                fixtures,
            },
        }
    }

    /// Append a request assertion to this fixture.
    pub fn assert(mut self, assertion: impl Assert + 'static) -> Fixture {
        self.spec.assertions.push(Box::new(assertion));
        self
    }

    /// Append a response header to this fixture.
    pub fn header<K, V>(mut self, name: K, value: V) -> Fixture
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Debug,
    {
        let name: HeaderName = name.try_into().expect("invalid header name");
        let value: HeaderValue = value.try_into().expect("invalid header value");
        self.spec.headers.append(name, value);
        self
    }

    /// The standardized route this fixture is hosted at.
    pub fn route(&self) -> &str {
        &self.spec.route
    }

    /// The method this fixture matches on.
    pub fn method(&self) -> &MethodSpec {
        &self.spec.method
    }

    /// Exchange the provided request for a response.
    ///
    /// Every assertion runs regardless of earlier failures; the aggregate is
    /// returned alongside the response. Failures never change the rendered
    /// response.
    pub fn run(&self, req: &FullRequest) -> (FullResponse, Vec<Failure>) {
        let mut failures = self.spec.check_all(req);
        let resp = match &self.kind {
            Kind::Static(body) => self.spec.response(body.clone()),
            Kind::Sequence { cursor, fixtures } => {
                let idx = {
                    let mut next = cursor.lock().expect("poisoned cursor mutex");
                    let idx = *next;
                    if *next < fixtures.len() - 1 {
                        *next += 1;
                    }
                    idx
                };
                let (resp, sub_failures) = fixtures[idx].run(req);
                failures.extend(sub_failures);
                resp
            }
        };
        (resp, failures)
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            Kind::Static(body) => f
                .debug_struct("Fixture")
                .field("spec", &self.spec)
                .field("body_len", &body.len())
                .finish(),
            Kind::Sequence { fixtures, .. } => f
                .debug_struct("Fixture")
                .field("spec", &self.spec)
                .field("sequence_len", &fixtures.len())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::{body_contains, url_contains};

    fn request(uri: &str, body: &'static str) -> FullRequest {
        http::Request::get(uri)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn test_static_fixture_is_logicless() {
        let fixture = Fixture::bytes("/path", "GET", 201, "payload");
        // identical output on every invocation, regardless of request content.
        for body in &["", "anything", "something else"] {
            let (resp, failures) = fixture.run(&request("/path", body));
            assert_eq!(201, resp.status().as_u16());
            assert_eq!(&b"payload"[..], resp.body().as_ref());
            assert!(failures.is_empty());
        }
    }

    #[test]
    fn test_route_standardized() {
        assert_eq!("/path", Fixture::get_ok("path", "").route());
        assert_eq!("/path", Fixture::get_ok("/path", "").route());
        assert_eq!("/", Fixture::get_ok("", "").route());
    }

    #[test]
    fn test_status_fixture() {
        let fixture = Fixture::not_found("/missing", "*");
        let (resp, _) = fixture.run(&request("/missing", ""));
        assert_eq!(404, resp.status().as_u16());
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_response_headers() {
        let fixture = Fixture::get_ok("/path", "body").header("x-request-id", "abc123");
        let (resp, _) = fixture.run(&request("/path", ""));
        assert_eq!(
            Some(&b"abc123"[..]),
            resp.headers().get("x-request-id").map(|v| v.as_bytes())
        );
    }

    #[test]
    fn test_json_fixture() {
        let fixture = Fixture::json(
            "/json",
            "GET",
            200,
            &serde_json::json!({"response": "hello fixture"}),
        )
        .unwrap();
        let (resp, _) = fixture.run(&request("/json", ""));
        assert_eq!(
            Some(&b"application/json"[..]),
            resp.headers().get("content-type").map(|v| v.as_bytes())
        );
        let value: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(serde_json::json!({"response": "hello fixture"}), value);
    }

    #[test]
    fn test_reader_fixture() {
        let fixture = Fixture::reader("/path", "GET", 200, &b"from a reader"[..]).unwrap();
        let (resp, _) = fixture.run(&request("/path", ""));
        assert_eq!(&b"from a reader"[..], resp.body().as_ref());
    }

    #[test]
    fn test_file_fixture_missing_file() {
        let err = Fixture::file("/path", "GET", 200, "does/not/exist.json").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn test_sequence_fixture() {
        let fixture = Fixture::seq(
            "/path",
            "GET",
            vec![
                Fixture::get_ok("/path", "body1"),
                Fixture::get_ok("/path", "body2"),
                Fixture::get_ok("/path", "body3"),
                Fixture::get_ok("/path", "body4"),
            ],
        );
        for expected in &["body1", "body2", "body3", "body4"] {
            let (resp, _) = fixture.run(&request("/path", ""));
            assert_eq!(expected.as_bytes(), resp.body().as_ref());
        }
        // the last sub-fixture repeats indefinitely.
        for _ in 0..5 {
            let (resp, _) = fixture.run(&request("/path", ""));
            assert_eq!(&b"body4"[..], resp.body().as_ref());
        }
    }

    #[test]
    fn test_sequence_ignores_nested_routes() {
        // nested routes and methods have no effect; only the body, status
        // and assertions of a sub-fixture matter.
        let fixture = Fixture::seq(
            "/path",
            "GET",
            vec![
                Fixture::bytes("/elsewhere", "POST", 201, "first"),
                Fixture::bytes("/also/elsewhere", "DELETE", 202, "second"),
            ],
        );
        let (resp, _) = fixture.run(&request("/path", ""));
        assert_eq!(201, resp.status().as_u16());
        assert_eq!(&b"first"[..], resp.body().as_ref());

        let (resp, _) = fixture.run(&request("/path", ""));
        assert_eq!(202, resp.status().as_u16());
        assert_eq!(&b"second"[..], resp.body().as_ref());
    }

    #[test]
    fn test_sequence_runs_sub_fixture_assertions() {
        let fixture = Fixture::seq(
            "/path",
            "GET",
            vec![Fixture::get_ok("/ignored", "body")
                .assert(body_contains("quick brown fox"))],
        );
        let (resp, failures) = fixture.run(&request("/path", "something else even"));
        assert_eq!(&b"body"[..], resp.body().as_ref());
        assert_eq!(1, failures.len());
    }

    #[test]
    #[should_panic]
    fn test_empty_sequence_panics() {
        Fixture::seq("/path", "GET", vec![]);
    }

    #[test]
    fn test_sequence_cursor_under_concurrent_invocations() {
        use std::sync::Arc;

        let fixture = Arc::new(Fixture::seq(
            "/path",
            "GET",
            (1..=8)
                .map(|i| Fixture::get_ok("/path", format!("body{}", i)))
                .collect(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fixture = Arc::clone(&fixture);
                std::thread::spawn(move || {
                    let (resp, _) = fixture.run(&request("/path", ""));
                    String::from_utf8(resp.body().to_vec()).unwrap()
                })
            })
            .collect();
        let mut bodies: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // each slot is claimed exactly once; no two invocations race the
        // cursor onto the same sub-fixture.
        bodies.sort();
        let expected: Vec<String> = (1..=8).map(|i| format!("body{}", i)).collect();
        assert_eq!(expected, bodies);
    }

    #[test]
    fn test_all_assertions_run() {
        // no short-circuit: both failures are collected.
        let fixture = Fixture::get_ok("/path", "response body")
            .assert(body_contains("quick brown fox"))
            .assert(url_contains("/other"));
        let (resp, failures) = fixture.run(&request("/path", "something else even"));
        assert_eq!(200, resp.status().as_u16());
        assert_eq!(&b"response body"[..], resp.body().as_ref());
        assert_eq!(2, failures.len());
    }

    #[test]
    fn test_method_spec() {
        assert_eq!(MethodSpec::Any, MethodSpec::from("*"));
        assert_eq!(MethodSpec::Only(Method::GET), MethodSpec::from("GET"));
        // method strings are uppercased before matching.
        assert_eq!(MethodSpec::Only(Method::GET), MethodSpec::from("get"));
        assert!(MethodSpec::from("get").matches(&Method::GET));

        assert!(MethodSpec::Any.matches(&Method::GET));
        assert!(MethodSpec::Any.matches(&Method::POST));
        assert!(MethodSpec::Any.matches(&Method::DELETE));
        assert!(MethodSpec::Only(Method::GET).matches(&Method::GET));
        assert!(!MethodSpec::Only(Method::GET).matches(&Method::POST));
    }
}
