//! Logicless HTTP fixtures for testing code that makes requests to HTTP
//! servers.
//!
//! A [Fixture](fixture/struct.Fixture.html) pairs a route and method with a
//! canned response. Responses are fixed at construction time and never depend
//! on the incoming request; the only per-request logic is matching the
//! request to a fixture and running the fixture's request assertions. The
//! [Server](server/struct.Server.html) hosts an ordered set of fixtures on a
//! real local port.
//!
//! ```no_run
//! use httpfixture::{assertions, Fixture, Server};
//!
//! let server = Server::run(vec![
//!     Fixture::get_ok("/api/example", r#"{"response":"hello fixture"}"#),
//!     Fixture::bytes("/upload", "POST", 201, "created")
//!         .assert(assertions::body_contains("quick brown fox")),
//! ]);
//!
//! // Point your http client at server.url("/api/example") and issue
//! // requests. A request to an unregistered route receives a 404.
//!
//! // On drop the server panics if any request failed an assertion.
//! ```

pub mod assertions;
pub mod fixture;
pub mod report;
pub mod router;
pub mod server;

/// type alias for a request that has read a complete body into memory.
pub type FullRequest = http::Request<bytes::Bytes>;
/// type alias for a response with a complete body held in memory.
pub type FullResponse = http::Response<bytes::Bytes>;

pub use assertions::{Assert, Failure};
pub use fixture::{Error, Fixture, MethodSpec};
pub use report::{FailureLog, Report};
pub use router::standardize_path;
pub use server::Server;
