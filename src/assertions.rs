//! Request assertion implementations.
//!
//! An assertion is a pure predicate over an incoming request. Assertions are
//! attached to fixtures with [Fixture::assert](../fixture/struct.Fixture.html#method.assert)
//! and run in registration order on every request the fixture receives. A
//! failed assertion produces a [Failure](struct.Failure.html) diagnostic that
//! the server forwards to its failure sink; it never changes the response the
//! fixture renders.
//!
//! Request bodies are fully buffered before any assertion runs, so an
//! assertion that inspects the body can never consume it out from under a
//! later assertion.

use std::fmt;

use bstr::ByteSlice;

use crate::FullRequest;

/// Diagnostic produced by a failed request assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure(String);

impl Failure {
    /// Create a failure with the provided diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Failure(message.into())
    }

    /// The human readable diagnostic message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A predicate over an incoming request.
///
/// Implementations must be idempotent: checking the same request twice
/// produces the same outcome with no observable side effect.
pub trait Assert: Send + Sync {
    /// Check the request, producing a diagnostic on failure.
    fn check(&self, req: &FullRequest) -> Result<(), Failure>;
}

/// Any `Fn(&FullRequest) -> Result<(), Failure>` is an assertion.
impl<F> Assert for F
where
    F: Fn(&FullRequest) -> Result<(), Failure> + Send + Sync,
{
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        self(req)
    }
}

/// true if the raw request body contains the provided byte sequence.
///
/// # Example
///
/// ```
/// use httpfixture::{assertions, Fixture};
///
/// Fixture::get_ok("/path", "").assert(assertions::body_contains("quick brown fox"));
/// ```
pub fn body_contains(needle: impl Into<Vec<u8>>) -> BodyContains {
    BodyContains(needle.into())
}

/// The `BodyContains` assertion returned by [body_contains()](fn.body_contains.html)
#[derive(Debug)]
pub struct BodyContains(Vec<u8>);

impl Assert for BodyContains {
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        if req.body().contains_str(&self.0) {
            Ok(())
        } else {
            Err(Failure::new(format!(
                "body did not contain expected bytes {:?}",
                self.0.as_bstr()
            )))
        }
    }
}

/// true if the raw request body matches the provided regex.
///
/// Panics if the pattern is not a valid regex.
pub fn body_matches(pattern: &str) -> BodyMatches {
    BodyMatches(regex::bytes::Regex::new(pattern).expect("failed to create regex"))
}

/// The `BodyMatches` assertion returned by [body_matches()](fn.body_matches.html)
#[derive(Debug)]
pub struct BodyMatches(regex::bytes::Regex);

impl Assert for BodyMatches {
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        if self.0.is_match(req.body()) {
            Ok(())
        } else {
            Err(Failure::new(format!(
                "body {:?} did not match {}",
                req.body().as_bstr(),
                self.0
            )))
        }
    }
}

/// true if any value of the named header equals `value`, compared
/// case-insensitively.
///
/// # Example
///
/// ```
/// use httpfixture::{assertions, Fixture};
///
/// Fixture::get_ok("/path", "")
///     .assert(assertions::header_matches("content-type", "application/json"));
/// ```
pub fn header_matches(name: &str, value: &str) -> HeaderMatches {
    HeaderMatches {
        name: name.to_owned(),
        value: value.to_owned(),
    }
}

/// The `HeaderMatches` assertion returned by [header_matches()](fn.header_matches.html)
#[derive(Debug)]
pub struct HeaderMatches {
    name: String,
    value: String,
}

impl Assert for HeaderMatches {
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        let found = req
            .headers()
            .get_all(self.name.as_str())
            .iter()
            .any(|v| v.as_bytes().eq_ignore_ascii_case(self.value.as_bytes()));
        if found {
            Ok(())
        } else {
            Err(Failure::new(format!(
                "could not find header matching {}: {}",
                self.name, self.value
            )))
        }
    }
}

/// true if the request url contains the provided substring.
pub fn url_contains(substr: impl Into<String>) -> UrlContains {
    UrlContains(substr.into())
}

/// The `UrlContains` assertion returned by [url_contains()](fn.url_contains.html)
#[derive(Debug)]
pub struct UrlContains(String);

impl Assert for UrlContains {
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        let url = req.uri().to_string();
        if url.contains(&self.0) {
            Ok(())
        } else {
            Err(Failure::new(format!(
                "url {} did not contain {}",
                url, self.0
            )))
        }
    }
}

/// true if the request url matches the provided regex.
///
/// Panics if the pattern is not a valid regex.
pub fn url_matches(pattern: &str) -> UrlMatches {
    UrlMatches(regex::bytes::Regex::new(pattern).expect("failed to create regex"))
}

/// The `UrlMatches` assertion returned by [url_matches()](fn.url_matches.html)
#[derive(Debug)]
pub struct UrlMatches(regex::bytes::Regex);

impl Assert for UrlMatches {
    fn check(&self, req: &FullRequest) -> Result<(), Failure> {
        let url = req.uri().to_string();
        if self.0.is_match(url.as_bytes()) {
            Ok(())
        } else {
            Err(Failure::new(format!(
                "url {} did not match {}",
                url, self.0
            )))
        }
    }
}
