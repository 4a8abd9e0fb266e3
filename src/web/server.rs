use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::router::{empty, panic_message, HttpResponse, Router};
use crate::error::{Error, Result};
use crate::manager::ProcessService;

enum State {
    Stopped,
    Running {
        local_addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        accept_loop: JoinHandle<()>,
    },
}

/// Serves a [`Router`] over HTTP/1.1, one connection at a time.
pub struct HttpServer<S> {
    router: Arc<Router<S>>,
    bind_address: String,
    request_timeout: Duration,
    state: State,
}

impl<S: ProcessService + 'static> HttpServer<S> {
    pub fn new(router: Router<S>, bind_address: impl Into<String>, request_timeout: Duration) -> Self {
        HttpServer {
            router: Arc::new(router),
            bind_address: bind_address.into(),
            request_timeout,
            state: State::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Running { local_addr, .. } => Some(*local_addr),
            State::Stopped => None,
        }
    }

    /// Binds and spawns the accept loop. Starting a running server is a no-op.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let State::Running { local_addr, .. } = &self.state {
            return Ok(*local_addr);
        }

        let listener = match TcpListener::bind(&self.bind_address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.router
                    .activity_log()
                    .log_error(&format!("HTTP server error: {}", source));
                return Err(Error::Bind { address: self.bind_address.clone(), source });
            }
        };
        let local_addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let accept_loop = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.router),
            self.request_timeout,
            shutdown_rx,
        ));
        info!(%local_addr, "HTTP server listening");

        self.state = State::Running { local_addr, shutdown, accept_loop };
        Ok(local_addr)
    }

    /// Ends the accept loop and waits for it; a request already being served finishes first.
    pub async fn stop(&mut self) {
        let State::Running { shutdown, accept_loop, local_addr } =
            std::mem::replace(&mut self.state, State::Stopped)
        else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = accept_loop.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        info!(%local_addr, "HTTP server stopped");
    }
}

async fn accept_loop<S: ProcessService + 'static>(
    listener: TcpListener,
    router: Arc<Router<S>>,
    request_timeout: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        // Shutdown wins over a connection already waiting in the backlog
        let (stream, peer) = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let conn_router = Arc::clone(&router);
        let service = service_fn(move |req| handle(Arc::clone(&conn_router), req));
        //No keep-alive: the next connection is only accepted once this one is answered
        let connection = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service);

        match tokio::time::timeout(request_timeout, connection).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%peer, error = %e, "connection error"),
            Err(_) => warn!(%peer, "connection timed out"),
        }
    }
    debug!("accept loop stopped");
}

// procfs reads and setpriority block, so the router runs off the async workers
async fn handle<S: ProcessService + 'static>(
    router: Arc<Router<S>>,
    req: Request<Incoming>,
) -> std::result::Result<HttpResponse, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let worker = Arc::clone(&router);

    match tokio::task::spawn_blocking(move || worker.respond(&method, &uri)).await {
        Ok(response) => Ok(response),
        Err(e) => {
            let message = if e.is_panic() {
                panic_message(e.into_panic().as_ref())
            } else {
                e.to_string()
            };
            router
                .activity_log()
                .log_error(&format!("Error handling request: {message}"));
            Ok(empty(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}
