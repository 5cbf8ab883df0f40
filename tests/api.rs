use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::routing::any;
use axum::Router;
use oobcrab::error::Error;
use oobcrab::geo::{DynGeolocator, FixedGeolocator, Geolocator};
use oobcrab::notify::{Format, MessagingBackend, Notifier, SendError};
use oobcrab::record::Kind;
use oobcrab::record_store::{DynRecordStore, InMemoryRecordStore, RecordStore};
use oobcrab::{Config, Sink};
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt;

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<String>>>);

#[async_trait::async_trait]
impl MessagingBackend for Outbox {
    async fn send(&self, text: &str, _format: Format) -> Result<(), SendError> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    app: Router,
    store: Arc<RwLock<InMemoryRecordStore>>,
    outbox: Outbox,
}

fn harness(endpoint: &str) -> Harness {
    harness_with(
        endpoint,
        Arc::new(FixedGeolocator::new("Lab")),
        Duration::ZERO,
        |_| {},
    )
}

fn harness_with(
    endpoint: &str,
    geolocator: DynGeolocator,
    notify_interval: Duration,
    configure: impl FnOnce(&mut Config),
) -> Harness {
    let mut config = Config::try_from_str(&format!(
        r#"{{
            "domain": "oob.example.com",
            "api_bind_addr": "127.0.0.1:0",
            "notify": {{ "bot_token": "t", "chat_id": "1" }},
            "exchange": {{ "endpoint": "{endpoint}" }}
        }}"#
    ))
    .unwrap();
    configure(&mut config);

    let store = Arc::new(RwLock::new(InMemoryRecordStore::default()));
    let dyn_store: DynRecordStore = store.clone();
    let outbox = Outbox::default();
    let notifier = Notifier::new(Box::new(outbox.clone()), notify_interval);
    let sink = Sink::new(geolocator, dyn_store, Arc::new(notifier));
    Harness {
        app: oobcrab::api::router(Arc::new(config), Arc::new(sink)),
        store,
        outbox,
    }
}

struct RateLimited;

#[async_trait::async_trait]
impl Geolocator for RateLimited {
    async fn geolocate(&self, ip: IpAddr) -> Result<String, Error> {
        Err(Error::Geolocation(ip, "rate limited".to_string()))
    }
}

fn peer() -> SocketAddr {
    "192.0.2.7:50123".parse().unwrap()
}

async fn call(
    app: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer()));

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Serve an autodiscover stand-in that rejects every request with Basic auth, counting the
/// requests it sees.
async fn rejecting_autodiscover() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = Router::new().route(
        "/autodiscover/autodiscover.xml",
        any(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::UNAUTHORIZED,
                [("www-authenticate", "Basic realm=\"autodiscover\"")],
            )
        }),
    );
    let server =
        axum::Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    (format!("http://{addr}/autodiscover/autodiscover.xml"), hits)
}

/// An endpoint nothing listens on.
fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/autodiscover/autodiscover.xml")
}

#[tokio::test]
async fn healthcheck() {
    let h = harness("http://127.0.0.1:1/");
    let (status, body) = call(h.app, "GET", "/healthcheck", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": "healthy"}));
}

#[tokio::test]
async fn http_log_records_the_path() {
    let h = harness("http://127.0.0.1:1/");
    let (status, body) = call(h.app, "POST", "/httplog/c2VjcmV0/x?y=z", &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"code": 200, "success": true, "data": {"ip": "192.0.2.7", "location": "Lab"}})
    );
    let store = h.store.read().await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].kind, Kind::Http);
    assert_eq!(store.records()[0].record, "/httplog/c2VjcmV0/x");
    assert_eq!(h.outbox.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn http_log_trusts_configured_client_ip_header() {
    let h = harness_with(
        "http://127.0.0.1:1/",
        Arc::new(FixedGeolocator::new("Lab")),
        Duration::ZERO,
        |config| config.client_ip_header = Some("X-Real-IP".to_string()),
    );
    let (_, body) = call(h.app, "GET", "/httplog/a", &[("x-real-ip", "198.51.100.20")]).await;
    assert_eq!(body["data"]["ip"], "198.51.100.20");
}

#[tokio::test]
async fn login_rejects_invalid_parameters() {
    let h = harness("http://127.0.0.1:1/");
    for uri in [
        "/users/login",
        "/users/login?username=al-ice&password=hunter22",
        "/users/login?username=alice&password=short",
    ] {
        let (status, body) = call(h.app.clone(), "GET", uri, &[]).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["code"], 400, "{uri}");
        assert_eq!(body["success"], false, "{uri}");
    }
    assert!(h.store.read().await.is_empty());
}

#[tokio::test]
async fn login_reports_probe_status() {
    let (endpoint, hits) = rejecting_autodiscover().await;
    let h = harness(&endpoint);

    let (status, body) = call(
        h.app,
        "GET",
        "/users/login?username=alice&password=hunter22",
        &[("user-agent", "Microsoft Office/16.0")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "code": 200,
            "success": true,
            "data": {"status": 401, "username": "alice", "ip": "192.0.2.7", "location": "Lab"}
        })
    );
    let store = h.store.read().await;
    let record = &store.records()[0];
    assert_eq!(record.kind, Kind::CredentialProbe);
    assert_eq!(record.record, "alice:hunter22:401");
    assert_eq!(record.probe.as_ref().map(|p| p.status), Some(401));
    assert!(hits.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn login_probe_not_executed() {
    let h = harness(&closed_endpoint());

    let (status, body) = call(
        h.app,
        "GET",
        "/users/login?username=alice&password=hunter22",
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 401);
    assert_eq!(body["success"], false);
    assert!(body["data"]
        .as_str()
        .unwrap()
        .starts_with("autodiscover probe did not execute"));
    assert!(h.store.read().await.is_empty());
    assert!(h.outbox.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn login_never_reaches_autodiscover_for_unlocatable_source() {
    let (endpoint, hits) = rejecting_autodiscover().await;
    let h = harness_with(&endpoint, Arc::new(RateLimited), Duration::ZERO, |_| {});

    let (status, body) = call(
        h.app,
        "GET",
        "/users/login?username=alice&password=hunter22",
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], "failed to geolocate 192.0.2.7: rate limited");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(h.store.read().await.is_empty());
    assert!(h.outbox.0.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_requests_get_a_timeout_envelope() {
    let h = harness_with(
        "http://127.0.0.1:1/",
        Arc::new(FixedGeolocator::new("Lab")),
        Duration::from_secs(2),
        |config| config.api_timeout = Duration::from_secs(1),
    );

    let (status, body) = call(h.app, "GET", "/httplog/abc", &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"code": 408, "success": false, "data": "request timed out"})
    );
    // Recorded and sent before the post-send interval outlived the timeout.
    assert_eq!(h.store.read().await.len(), 1);
    assert_eq!(h.outbox.0.lock().unwrap().len(), 1);
}
