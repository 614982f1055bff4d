//! A standalone HTTP/1.1 server for a [`GraphQLHttp`] handler.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use graphql_http_core::Engine;

use crate::handler::GraphQLHttp;
use crate::response::not_found;

/// Errors that stop the server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[from] io::Error),
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// The path served by the handler.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            path: "/graphql".to_string(),
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// Binds `config.host:config.port` and serves the handler until accepting
/// fails.
///
/// # Errors
///
/// Fails when the address cannot be bound or a connection cannot be
/// accepted.
pub async fn serve<E: Engine>(handler: GraphQLHttp<E>, config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{}:{}", config.host, config.port),
            source,
        })?;
    serve_listener(handler, listener, config.path).await
}

/// Serves the handler on an already bound listener.
///
/// Requests whose path equals `path` go to the handler; anything else is a
/// 404. Each connection runs on its own task.
///
/// # Errors
///
/// Fails when a connection cannot be accepted.
pub async fn serve_listener<E: Engine>(
    handler: GraphQLHttp<E>,
    listener: TcpListener,
    path: impl Into<String>,
) -> Result<(), ServerError> {
    let handler = Arc::new(handler);
    let path: Arc<str> = path.into().into();

    let addr = listener.local_addr()?;
    info!("Listening on http://{}{}", addr, path);

    loop {
        let (stream, remote) = listener.accept().await?;
        debug!(%remote, "accepted connection");

        let io = TokioIo::new(stream);
        let handler = Arc::clone(&handler);
        let path = Arc::clone(&path);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                let path = Arc::clone(&path);
                async move {
                    let response = if req.uri().path() == &*path {
                        handler.handle(req).await
                    } else {
                        not_found()
                    };
                    Ok::<_, Infallible>(response)
                }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                if !err.is_incomplete_message() {
                    error!("Connection error: {:?}", err);
                }
            }
        });
    }
}
