//! Request dispatch.
//!
//! The route table is built once at server construction and never mutated
//! afterwards, so concurrent in-flight requests read it without
//! synchronization. Matching is an ordered linear scan: the first registered
//! fixture whose route is a prefix of the incoming path and whose method
//! matches wins. The prefix rule is what lets a fixture at `/path` also serve
//! `/path/subpath`.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::fixture::Fixture;
use crate::report::Report;
use crate::{FullRequest, FullResponse};

/// Standardize a route: an empty path becomes `/`, any other path is
/// prefixed with `/` when missing. Idempotent.
pub fn standardize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_owned()
    } else if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{}", path)
    }
}

/// Selects a fixture for each incoming request and runs it, forwarding
/// assertion failures to the failure sink.
pub(crate) struct Router {
    routes: Vec<Fixture>,
    report: Arc<dyn Report>,
}

impl Router {
    pub(crate) fn new(routes: Vec<Fixture>, report: Arc<dyn Report>) -> Self {
        Router { routes, report }
    }

    /// First registered fixture with a matching route prefix and method.
    fn route(&self, method: &Method, path: &str) -> Option<&Fixture> {
        self.routes
            .iter()
            .find(|f| path.starts_with(f.route()) && f.method().matches(method))
    }

    /// Exchange a request for a response.
    ///
    /// A dispatch miss is a defined 404 with an empty body, not a failure.
    /// Assertion failures are forwarded to the sink and the response still
    /// completes.
    pub(crate) fn handle(&self, req: &FullRequest) -> FullResponse {
        let fixture = match self.route(req.method(), req.uri().path()) {
            Some(fixture) => fixture,
            None => {
                log::debug!("no fixture for {} {}", req.method(), req.uri().path());
                let mut resp = http::Response::new(Bytes::new());
                *resp.status_mut() = StatusCode::NOT_FOUND;
                return resp;
            }
        };
        log::debug!(
            "matched fixture {} {}",
            fixture.method(),
            fixture.route()
        );
        let (resp, failures) = fixture.run(req);
        for failure in failures {
            self.report.fail(failure.to_string());
        }
        resp
    }

    /// Record a transport-level failure against the sink.
    pub(crate) fn fail(&self, diagnostic: String) {
        self.report.fail(diagnostic);
    }
}
