//! End-to-end tests against local axum servers through the hyper transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Redirect;
use axum::routing::{get, post};
use fetch_pipeline::{
    Client, ClientBuilder, FetchError, HyperTransportBuilder, RedirectMode, RequestInit,
    RetryConfig, json,
};
use http::{HeaderName, HeaderValue};

async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    Ok(format!("http://{addr}/"))
}

async fn echo_headers(headers: HeaderMap) -> axum::Json<serde_json::Value> {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    axum::Json(serde_json::json!({
        "x-foo": value("x-foo"),
        "x-baz": value("x-baz"),
        "content-type": value("content-type"),
    }))
}

async fn echo_method(method: Method, body: String) -> String {
    format!("{method}:{body}")
}

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "try again")
    } else {
        (StatusCode::OK, "ok")
    }
}

fn app(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/echo-headers", get(echo_headers).post(echo_headers))
        .route("/echo-method", get(echo_method).post(echo_method))
        .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/flaky", get(flaky))
        .route("/target", get(|| async { "landed" }))
        .route("/redirect", get(|| async { Redirect::to("/target") }))
        .route("/submit", post(|| async { Redirect::to("/echo-method") }))
        .route("/forward", post(|| async { Redirect::temporary("/echo-method") }))
        .route("/loop", get(|| async { Redirect::to("/loop") }))
        .with_state(hits)
}

async fn client() -> anyhow::Result<(Client, Arc<AtomicUsize>)> {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = serve(app(hits.clone())).await?;
    let client = Client::new()?;
    client.configure_base_url(base_url)?;
    Ok((client, hits))
}

#[tokio::test]
async fn test_base_url_and_default_headers() -> anyhow::Result<()> {
    let (client, _) = client().await?;
    client.configure(|config| {
        config.with_defaults(RequestInit::new().header(
            HeaderName::from_static("x-foo"),
            HeaderValue::from_static("bar"),
        ))
    })?;

    let response = client
        .fetch_with(
            "echo-headers",
            RequestInit::new().header(
                HeaderName::from_static("x-baz"),
                HeaderValue::from_static("bat"),
            ),
        )
        .await?;

    assert!(response.ok());
    assert!(response.url().ends_with("/echo-headers"));
    let body: serde_json::Value = response.json()?;
    assert_eq!(body["x-foo"], "bar");
    assert_eq!(body["x-baz"], "bat");
    Ok(())
}

#[tokio::test]
async fn test_error_status_is_a_normal_response_by_default() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client.get("fail", None).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.ok());
    Ok(())
}

#[tokio::test]
async fn test_standard_configuration_rejects_error_status() -> anyhow::Result<()> {
    let (client, _) = client().await?;
    client.configure(|config| config.use_standard_configuration())?;

    let err = client.get("fail", None).await.unwrap_err();
    let response = err.response().expect("rejected response is kept");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(client.active_request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_json_body_is_sent_as_json() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client
        .post("echo-headers", Some(json(&serde_json::json!({ "a": 1 }))?), None)
        .await?;

    let body: serde_json::Value = response.json()?;
    assert_eq!(body["content-type"], "application/json");
    Ok(())
}

#[tokio::test]
async fn test_retry_recovers_from_flaky_endpoint() -> anyhow::Result<()> {
    let (client, hits) = client().await?;
    client.configure(|config| {
        config
            .reject_error_responses()
            .with_retry(RetryConfig::new().interval(Duration::from_millis(10)))
    })?;

    let response = client.get("flaky", None).await?;
    assert_eq!(response.text()?, "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_retry_gives_up_after_max_retries() -> anyhow::Result<()> {
    let (client, hits) = client().await?;
    client.configure(|config| {
        config.reject_error_responses().with_retry(
            RetryConfig::new()
                .max_retries(1)
                .interval(Duration::from_millis(10)),
        )
    })?;

    let err = client.get("flaky", None).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_redirect_is_followed() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client.get("redirect", None).await?;
    assert!(response.redirected());
    assert!(response.url().ends_with("/target"));
    assert_eq!(response.text()?, "landed");
    Ok(())
}

#[tokio::test]
async fn test_see_other_after_post_becomes_get() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client.post("submit", Some("payload".into()), None).await?;
    assert_eq!(response.text()?, "GET:");
    Ok(())
}

#[tokio::test]
async fn test_temporary_redirect_keeps_method_and_body() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client.post("forward", Some("payload".into()), None).await?;
    assert_eq!(response.text()?, "POST:payload");
    Ok(())
}

#[tokio::test]
async fn test_manual_redirect_returns_redirect_response() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let response = client
        .get("redirect", Some(RequestInit::new().redirect(RedirectMode::Manual)))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(!response.redirected());
    assert_eq!(response.headers().get("location").unwrap(), "/target");
    Ok(())
}

#[tokio::test]
async fn test_redirect_mode_error_fails() -> anyhow::Result<()> {
    let (client, _) = client().await?;

    let err = client
        .get("redirect", Some(RequestInit::new().redirect(RedirectMode::Error)))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    Ok(())
}

#[tokio::test]
async fn test_redirect_limit() -> anyhow::Result<()> {
    let base_url = serve(app(Arc::new(AtomicUsize::new(0)))).await?;
    let client = ClientBuilder::new()
        .hyper_transport(HyperTransportBuilder::new().max_redirects(3))
        .build()?;
    client.configure_base_url(base_url)?;

    let err = client.get("loop", None).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(msg) if msg.contains("too many redirects")));
    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = Client::new()?;
    let err = client.fetch(format!("http://{addr}/")).await.unwrap_err();
    assert!(err.is_transport());
    assert!(!client.is_requesting());
    Ok(())
}
