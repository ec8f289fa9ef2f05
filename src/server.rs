//! The fixture server.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};

use crate::fixture::Fixture;
use crate::report::{FailureLog, Report};
use crate::router::Router;

/// A server hosting an ordered set of fixtures on a real local port.
///
/// The server runs in the background on a dedicated thread. When started
/// with [run](#method.run) it records assertion failures internally and, on
/// Drop, panics if any were recorded.
pub struct Server {
    trigger_shutdown: Option<futures::channel::oneshot::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
    addr: SocketAddr,
    failures: Option<FailureLog>,
}

impl Server {
    /// Start a server hosting `fixtures`.
    ///
    /// Assertion failures are recorded internally. On Drop the server will
    /// terminate and panic if any request failed an assertion; call
    /// [verify_and_clear](#method.verify_and_clear) to check earlier.
    pub fn run(fixtures: impl IntoIterator<Item = Fixture>) -> Self {
        let log = FailureLog::new();
        let mut server = Server::run_with_report(fixtures, log.clone());
        server.failures = Some(log);
        server
    }

    /// Start a server hosting `fixtures`, reporting assertion failures to
    /// `report` instead of the internal record. Nothing is verified on Drop.
    pub fn run_with_report(
        fixtures: impl IntoIterator<Item = Fixture>,
        report: impl Report + 'static,
    ) -> Self {
        let router = Arc::new(Router::new(
            fixtures.into_iter().collect(),
            Arc::new(report),
        ));
        let (addr_tx, addr_rx) = crossbeam_channel::bounded(1);
        let (trigger_shutdown, mut shutdown_received) = futures::channel::oneshot::channel::<()>();
        let join_handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build tokio runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
                    .await
                    .expect("failed to bind server listener");
                let addr = listener
                    .local_addr()
                    .expect("failed to read listener address");
                addr_tx.send(addr).expect("addr receiver dropped");
                loop {
                    tokio::select! {
                        accepted = listener.accept() => {
                            let (stream, _) = match accepted {
                                Ok(accepted) => accepted,
                                Err(err) => {
                                    log::debug!("accept error: {}", err);
                                    continue;
                                }
                            };
                            tokio::spawn(serve_connection(stream, Arc::clone(&router)));
                        }
                        _ = &mut shutdown_received => break,
                    }
                }
            });
        });
        let addr = addr_rx
            .recv()
            .expect("server thread exited before reporting its address");

        Server {
            trigger_shutdown: Some(trigger_shutdown),
            join_handle: Some(join_handle),
            addr,
            failures: None,
        }
    }

    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get a fully formed url to the servers address.
    ///
    /// If the server is listening on port 1234.
    ///
    /// `server.url("/foo?q=1") == "http://localhost:1234/foo?q=1"`
    pub fn url<T>(&self, path_and_query: T) -> hyper::Uri
    where
        http::uri::PathAndQuery: std::convert::TryFrom<T>,
        <http::uri::PathAndQuery as std::convert::TryFrom<T>>::Error: Into<http::Error>,
    {
        hyper::Uri::builder()
            .scheme("http")
            .authority(format!("{}", &self.addr).as_str())
            .path_and_query(path_and_query)
            .build()
            .expect("invalid path and query")
    }

    /// Panic if any assertion failure has been recorded, then clear the
    /// record leaving the server running in a clean state.
    ///
    /// Does nothing for a server started with
    /// [run_with_report](#method.run_with_report).
    pub fn verify_and_clear(&mut self) {
        let failures = match &self.failures {
            Some(failures) => failures,
            None => return,
        };
        if std::thread::panicking() {
            // If the test is already panicking don't double panic on drop.
            failures.take();
            return;
        }
        let recorded = failures.take();
        if !recorded.is_empty() {
            panic!(
                "{} request(s) failed assertions:\n{}",
                recorded.len(),
                recorded.join("\n")
            );
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // drop the trigger_shutdown channel to tell the server to shutdown.
        // Then wait for the shutdown to complete.
        self.trigger_shutdown = None;
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
        self.verify_and_clear();
    }
}

async fn serve_connection(stream: tokio::net::TcpStream, router: Arc<Router>) {
    let service = service_fn({
        let router = Arc::clone(&router);
        move |req: http::Request<Incoming>| {
            let router = Arc::clone(&router);
            async move {
                // read the full body into memory prior to handing it to the
                // router, so assertions see a replayable byte body.
                let (head, body) = req.into_parts();
                let body = body.collect().await?.to_bytes();
                let req = http::Request::from_parts(head, body);
                log::debug!("received request: {:?}", req);
                let resp = router.handle(&req);
                log::debug!("sending response: {:?}", resp);
                Ok::<_, hyper::Error>(resp.map(Full::new))
            }
        }
    });
    if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        // a failed response write is a reported failure, never a crash.
        router.fail(format!("error serving connection: {}", err));
    }
}
