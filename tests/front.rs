//! End-to-end: browser → front server → HttpTransport → mock relay.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use relay_proxy::config::{RelayConfig, RelayNodeConfig};
use relay_proxy::cookies::CookieJar;
use relay_proxy::{FrontServer, Relay};

mod common;
use common::start_mock_relay;

async fn start_front(relay_addr: std::net::SocketAddr, max_retry: u32) -> (String, Arc<Relay>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let front_addr = listener.local_addr().unwrap();

    let mut config = RelayConfig::default();
    config.front.public_origin = format!("http://{front_addr}");
    config.relay.scheme = "http".into();
    config.relay.timeout_secs = 5;
    config.protocol.max_retry = max_retry;
    config.relay.nodes.push(RelayNodeConfig {
        name: "local".into(),
        host: relay_addr.to_string(),
        weight: 1,
    });

    let relay = Arc::new(Relay::from_config(&config).unwrap());
    let server = FrontServer::new(&config.front, relay.clone());
    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            })
            .await;
    });

    (format!("http://{front_addr}/-----"), relay)
}

#[tokio::test]
async fn test_relayed_get_through_front() {
    let (relay_addr, seen) = start_mock_relay(|_, _| {
        (
            200,
            vec![
                ("--s".into(), "203".into()),
                ("access-control-allow-origin".into(), "*".into()),
                ("--content-type".into(), "text/plain".into()),
                ("0-set-cookie".into(), "sid=1; Path=/".into()),
                ("1-set-cookie".into(), "secret=2; Path=/; HttpOnly".into()),
            ],
            "hello".into(),
        )
    })
    .await;
    let (front, relay) = start_front(relay_addr, 5).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{front}https://www.example.com/index.html"))
        .header("sec-fetch-mode", "navigate")
        .header("sec-fetch-dest", "document")
        .header("x-custom", "yes")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 203);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert!(res.headers().get("access-control-allow-origin").is_none());
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let req = &seen[0];
    assert_eq!(req.path, "/http");
    assert_eq!(req.header("--url"), Some("https://www.example.com/index.html"));
    assert_eq!(req.header("--mode"), Some("navigate"));
    assert_eq!(req.header("--type"), Some("document"));
    assert_eq!(req.header("--level"), Some("1"));
    assert!(req.header("--ext").unwrap().contains("x-custom"));

    // Only the script-visible cookie reached the jar.
    let jar = relay.cookies().jar();
    let target = url::Url::parse("https://www.example.com/").unwrap();
    assert_eq!(jar.concat(&target), "sid=1");
}

#[tokio::test]
async fn test_post_body_and_failover_through_front() {
    let (relay_addr, seen) = start_mock_relay(|_, i| {
        if i == 0 {
            (200, vec![("--switched".into(), "1".into()), ("--raw-info".into(), "r1".into())], String::new())
        } else {
            (200, vec![("--s".into(), "201".into())], "created".into())
        }
    })
    .await;
    let (front, _) = start_front(relay_addr, 5).await;

    let res = reqwest::Client::new()
        .post(format!("{front}https://api.example.com/items"))
        .header("content-type", "application/json")
        .body(r#"{"name":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[1].body, br#"{"name":"x"}"#);
    assert_eq!(seen[1].header("--level"), Some("2"));
    assert_eq!(seen[1].header("--raw-info"), Some("r1"));
}

#[tokio::test]
async fn test_exhausted_relay_returns_bad_gateway() {
    let (relay_addr, seen) = start_mock_relay(|_, _| (500, vec![("--error".into(), "down".into())], String::new())).await;
    let (front, _) = start_front(relay_addr, 2).await;

    let res = reqwest::get(format!("{front}https://www.example.com/")).await.unwrap();
    assert_eq!(res.status().as_u16(), 502);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_proxied_path_is_bad_request() {
    let (relay_addr, _) = start_mock_relay(|_, _| (200, Vec::new(), String::new())).await;
    let (front, _) = start_front(relay_addr, 1).await;
    let root = front.trim_end_matches("/-----");

    let res = reqwest::get(format!("{root}/favicon.ico")).await.unwrap();
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn test_data_url_served_without_relay() {
    let (relay_addr, seen) = start_mock_relay(|_, _| (200, Vec::new(), String::new())).await;
    let (front, _) = start_front(relay_addr, 1).await;

    let res = reqwest::get(format!("{front}data:text/plain,hi%21")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.text().await.unwrap(), "hi!");
    assert!(seen.lock().unwrap().is_empty());
}
