//! End-to-end tests of the edge filter through a real listener.

use reqwest::StatusCode;

mod common;

use common::{client, gateway_config, signed_headers, start_gateway, start_mock_upstream, UpstreamReply};

#[tokio::test]
async fn test_signed_request_forwarded_and_replay_rejected() {
    let upstream = start_mock_upstream(UpstreamReply::ok("hello world")).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let path = "/api/greet?name=world";
    let headers = signed_headers(path, "nonce-a");

    let res = client()
        .get(format!("http://{}{}", addr, path))
        .headers(headers.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello world");
    assert_eq!(upstream.hits(), 1);

    let forwarded = upstream.last_request().unwrap().to_lowercase();
    assert!(forwarded.starts_with("get /api/greet?name=world"));
    assert!(forwarded.contains("accesskey: test-access-key"));
    assert!(!forwarded.contains("\r\nsign:"));

    let replay = client()
        .get(format!("http://{}{}", addr, path))
        .headers(headers)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::FORBIDDEN);
    assert!(replay.text().await.unwrap().is_empty());
    assert_eq!(upstream.hits(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_auth_named_query_params_do_not_break_signature() {
    let upstream = start_mock_upstream(UpstreamReply::ok("ok")).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let path = "/api/items?nonce=1&page=2";
    let res = client()
        .get(format!("http://{}{}", addr, path))
        .headers(signed_headers(path, "nonce-q"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(upstream.hits(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unlisted_source_rejected() {
    let upstream = start_mock_upstream(UpstreamReply::ok("secret data")).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["10.0.0.0/8"])).await;

    let res = client()
        .get(format!("http://{}/api/greet", addr))
        .headers(signed_headers("/api/greet", "nonce-b"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(upstream.hits(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_sign_header_rejected() {
    let upstream = start_mock_upstream(UpstreamReply::ok("ok")).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let mut headers = signed_headers("/api/greet", "nonce-c");
    headers.remove("sign");

    let res = client()
        .get(format!("http://{}/api/greet", addr))
        .headers(headers)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(upstream.hits(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_large_streamed_body_is_preserved() {
    let payload: Vec<u8> = (0..512 * 1024u32).map(|n| (n % 253) as u8).collect();
    let reply = UpstreamReply {
        status: 200,
        chunks: payload.chunks(8 * 1024).map(|c| c.to_vec()).collect(),
    };
    let upstream = start_mock_upstream(reply).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let res = client()
        .get(format!("http://{}/download", addr))
        .headers(signed_headers("/download", "nonce-d"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.bytes().await.unwrap();
    assert_eq!(body.len(), payload.len());
    assert_eq!(body.as_ref(), payload.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_and_body_pass_through() {
    let reply = UpstreamReply {
        status: 503,
        chunks: vec![b"{\"error\":\"maintenance\"}".to_vec()],
    };
    let upstream = start_mock_upstream(reply).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let res = client()
        .post(format!("http://{}/api/orders", addr))
        .headers(signed_headers("/api/orders", "nonce-e"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "{\"error\":\"maintenance\"}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind then drop to get a port nothing listens on.
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (addr, shutdown) = start_gateway(gateway_config(closed, &["127.0.0.1"])).await;

    let res = client()
        .get(format!("http://{}/api/greet", addr))
        .headers(signed_headers("/api/greet", "nonce-f"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_identical_nonce_accepted_once() {
    let upstream = start_mock_upstream(UpstreamReply::ok("once")).await;
    let (addr, shutdown) = start_gateway(gateway_config(upstream.addr, &["127.0.0.1"])).await;

    let headers = signed_headers("/api/pay", "nonce-shared");
    let url = format!("http://{}/api/pay", addr);

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let (url, headers) = (url.clone(), headers.clone());
        tasks.push(tokio::spawn(async move {
            client().get(url).headers(headers).send().await.unwrap().status()
        }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::FORBIDDEN).count(), 1);
    assert_eq!(upstream.hits(), 1);

    shutdown.trigger();
}
