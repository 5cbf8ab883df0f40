use crate::api::api_error::APIError;
use crate::api::model::{CaptureData, Envelope, LoginData, LoginRequest};
use crate::api::server::AppState;
use crate::config::Config;
use crate::error::Error;
use crate::exchange::{self, CredentialAttempt, PROBE_NOT_EXECUTED};
use crate::record::{Interaction, ProbeOutcome};
use axum::error_handling::HandleErrorLayer;
use axum::extract::{ConnectInfo, OriginalUri, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{BoxError, Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/httplog/*payload", any(http_log))
        .route("/users/login", get(login))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(state.config.api_timeout),
        )
        .with_state(state)
}

/// Render middleware failures, timeouts included, as an error envelope.
#[allow(clippy::unused_async)]
async fn handle_middleware_error(err: BoxError) -> APIError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("request timed out");
        return Error::RequestTimeout.into();
    }
    anyhow::anyhow!(err).into()
}

/// The address the request is attributed to.
fn client_ip(config: &Config, headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    config
        .client_ip_header
        .as_deref()
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

async fn http_log(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Envelope<CaptureData>>, APIError> {
    let ip = client_ip(&state.config, &headers, peer);
    let interaction = Interaction::Http {
        path: uri.path().to_string(),
    };
    let stored = state.sink.record(interaction, ip).await?;
    Ok(Json(Envelope::success(CaptureData {
        ip: stored.ip,
        location: stored.location,
    })))
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    WithRejection(Query(params), _): WithRejection<Query<LoginRequest>, APIError>,
) -> Result<Json<Envelope<LoginData>>, APIError> {
    params.validate()?;
    let ip = client_ip(&state.config, &headers, peer);
    // No probe is made for a source that can't be located.
    let location = state.sink.locate(ip).await?;
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let exchange_config = &state.config.exchange;
    let attempt = CredentialAttempt::new(
        &params.username,
        &params.password,
        user_agent,
        exchange_config.insecure,
        exchange_config.proxy_url.clone(),
    );
    let status = match exchange::validate(&exchange_config.endpoint, &attempt).await {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(
                username = %params.username,
                status = PROBE_NOT_EXECUTED,
                "autodiscover probe failed: {err}"
            );
            return Err(Error::ProbeNotExecuted(Box::new(err)).into());
        }
    };

    let interaction = Interaction::CredentialProbe(ProbeOutcome {
        username: params.username.clone(),
        password: params.password,
        status: status.as_u16(),
    });
    let stored = state.sink.record_located(interaction, ip, location).await?;
    Ok(Json(Envelope::success(LoginData {
        status: i32::from(status.as_u16()),
        username: params.username,
        ip: stored.ip,
        location: stored.location,
    })))
}
