use crate::api::routes;
use crate::config::SharedConfig;
use crate::error::Error;
use crate::record::SharedSink;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub sink: SharedSink,
}

/// The API routes. Serve with `into_make_service_with_connect_info::<SocketAddr>()`, the
/// handlers need the peer address.
pub fn router(config: SharedConfig, sink: SharedSink) -> Router {
    routes::new(AppState { config, sink })
}

/// Bind the API listener from `config`.
///
/// # Errors
///
/// Returns [`Error::HttpServer`] if the address can't be bound.
pub fn new(
    config: SharedConfig,
    sink: SharedSink,
) -> Result<impl Future<Output = hyper::Result<()>>, Error> {
    let server = axum::Server::try_bind(&config.api_bind_addr)?;
    Ok(server.serve(router(config, sink).into_make_service_with_connect_info::<SocketAddr>()))
}
