//! End-to-end tests: real router over TCP, read as an SSE client would.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail, ensure};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use pulse_gateway::app_state::AppState;
use pulse_gateway::config::GatewayConfig;
use pulse_gateway::domain::{Channel, Event};
use pulse_gateway::server::build_app;

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();
        let state = AppState::new(&GatewayConfig::default(), shutdown.clone());
        let app = build_app(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await;
        });
        Ok(Self {
            addr,
            state,
            shutdown,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn subscribe(&self, path: &str) -> anyhow::Result<FrameReader> {
        let response = reqwest::get(self.url(path)).await?;
        ensure!(
            response.status() == reqwest::StatusCode::OK,
            "subscribe returned {}",
            response.status()
        );
        Ok(FrameReader {
            response,
            buf: String::new(),
        })
    }

    async fn wait_for_subscribers(&self, channel: &str, expected: usize) -> anyhow::Result<()> {
        let channel = Channel::from(channel);
        let registry = self.state.registry();
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.subscriber_count(&channel) != expected {
                // Writing to a dropped client is what surfaces the disconnect.
                self.state
                    .publisher
                    .publish(&channel, &Event::new("ping", Value::Null));
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .context("subscriber count did not settle")
    }
}

/// Reads `data:` frames off an SSE response body.
struct FrameReader {
    response: reqwest::Response,
    buf: String,
}

impl FrameReader {
    /// Returns the raw text of the next complete frame, keep-alives included.
    async fn next_raw(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            if let Some(end) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..end + 2).collect();
                return Ok(Some(frame));
            }
            match self.response.chunk().await? {
                Some(chunk) => self.buf.push_str(std::str::from_utf8(&chunk)?),
                None => return Ok(None),
            }
        }
    }

    /// Returns the JSON body of the next data frame.
    async fn next_event(&mut self) -> anyhow::Result<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.read_event())
            .await
            .context("timed out waiting for event")?
    }

    async fn read_event(&mut self) -> anyhow::Result<Value> {
        while let Some(frame) = self.next_raw().await? {
            if let Some(data) = frame.strip_prefix("data: ") {
                return Ok(serde_json::from_str(data.trim_end())?);
            }
        }
        bail!("stream ended")
    }

    /// Returns `true` if no data frame arrives within `wait`.
    async fn stays_quiet(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.next_event()).await.is_err()
    }
}

#[tokio::test]
async fn docs_subscribe_publish_disconnect() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut reader = server.subscribe("/events/docs").await?;

    let handshake = reader.next_event().await?;
    assert_eq!(handshake.get("type"), Some(&json!("connected")));
    assert!(handshake.get("timestamp").is_some());

    let report = server.state.publisher.publish(
        &Channel::from("docs"),
        &Event::new("updated", json!({"documentId": "42"})),
    );
    assert_eq!(report.delivered, 1);

    let update = reader.next_event().await?;
    assert_eq!(update.get("type"), Some(&json!("updated")));
    assert_eq!(update.get("documentId"), Some(&json!("42")));

    drop(reader);
    server.wait_for_subscribers("docs", 0).await?;
    assert_eq!(server.state.registry().channel_count(), 0);
    Ok(())
}

#[tokio::test]
async fn wire_frames_are_data_prefixed_json() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let response = reqwest::get(server.url("/events/webex")).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut reader = FrameReader {
        response,
        buf: String::new(),
    };
    let Some(frame) = reader.next_raw().await? else {
        bail!("no frame");
    };
    assert!(frame.starts_with("data: {"));
    assert!(frame.ends_with("}\n\n"));
    Ok(())
}

#[tokio::test]
async fn mapping_publish_reaches_only_matching_group() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut group_a = server.subscribe("/events/mapping?groupId=groupA").await?;
    let mut group_b = server.subscribe("/events/mapping?groupId=groupB").await?;
    group_a.next_event().await?;
    group_b.next_event().await?;

    let response = reqwest::Client::new()
        .post(server.url("/api/v1/channels/mapping/events?groupId=groupA"))
        .json(&json!({"type": "update"}))
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: Value = response.json().await?;
    assert_eq!(body.pointer("/report/delivered"), Some(&json!(1)));
    assert_eq!(body.pointer("/report/pruned"), Some(&json!(0)));
    assert_eq!(body.get("scope"), Some(&json!("groupA")));

    let received = group_a.next_event().await?;
    assert_eq!(received.get("type"), Some(&json!("update")));
    assert!(group_b.stays_quiet(Duration::from_millis(200)).await);
    assert_eq!(
        server
            .state
            .registry()
            .subscriber_count(&Channel::from("mapping")),
        2
    );
    Ok(())
}

#[tokio::test]
async fn global_publish_also_reaches_wildcard_subscribers() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut everyone = server.subscribe("/events/all").await?;
    let mut contacts = server.subscribe("/events/contacts").await?;
    everyone.next_event().await?;
    contacts.next_event().await?;

    let response = reqwest::Client::new()
        .post(server.url("/api/v1/channels/contacts/events?global=true"))
        .json(&json!({"type": "contact_added", "contactId": 5}))
        .send()
        .await?;
    let body: Value = response.json().await?;
    assert_eq!(body.pointer("/report/delivered"), Some(&json!(2)));

    assert_eq!(contacts.next_event().await?.get("contactId"), Some(&json!(5)));
    assert_eq!(everyone.next_event().await?.get("contactId"), Some(&json!(5)));
    Ok(())
}

#[tokio::test]
async fn shutdown_ends_open_streams() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut reader = server.subscribe("/events/docs").await?;
    reader.next_event().await?;

    server.shutdown.cancel();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match reader.next_raw().await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "stream stayed open after shutdown");
    server.wait_for_subscribers("docs", 0).await?;
    Ok(())
}

#[tokio::test]
async fn channel_diagnostics_report_live_counts() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut a = server.subscribe("/events/docs").await?;
    let mut b = server.subscribe("/events/docs").await?;
    a.next_event().await?;
    b.next_event().await?;

    let body: Value = reqwest::get(server.url("/api/v1/channels"))
        .await?
        .json()
        .await?;
    assert_eq!(body.get("channel_count"), Some(&json!(1)));
    assert_eq!(body.get("total_subscribers"), Some(&json!(2)));
    assert_eq!(body.pointer("/channels/0/channel"), Some(&json!("docs")));
    Ok(())
}

#[tokio::test]
async fn subscribe_without_required_scope_is_rejected() -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = AppState::new(&GatewayConfig::default(), shutdown);
    let app = build_app(state.clone());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/events/mapping").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(Request::builder().uri("/events/nope").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(state.registry().total_subscribers(), 0);
    Ok(())
}

#[tokio::test]
async fn publish_rejects_event_without_type() -> anyhow::Result<()> {
    let state = AppState::new(&GatewayConfig::default(), CancellationToken::new());
    let app = build_app(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/channels/docs/events")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"documentId":"42"}"#))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
