use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use negotiate_http::wire::Status;
use negotiate_http::{
    Client, ClientNegotiator, ClientOptions, ConnectOptions, Credentials, Gateway,
    HttpNegotiateError, Server, ServerNegotiator, ServerOptions,
};
use negotiator::{Negotiator, NegotiatorError};
use tokio::time::timeout;

async fn start_broker() -> (SocketAddr, Arc<Negotiator>) {
    let negotiator = Arc::new(Negotiator::new(3, Duration::from_secs(10)).expect("valid config"));
    let credentials = Credentials::new(
        HashMap::from([(0x42, "hunter2".to_string())]),
        HashMap::from([(1, "s3cret".to_string()), (2, "t0psecret".to_string())]),
    );
    let mut gateway = Gateway::new(credentials);
    negotiator.hook_to_api(&mut gateway);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, gateway.into_router())
            .await
            .expect("serve");
    });
    (addr, negotiator)
}

fn plain_http(addr: SocketAddr) -> ConnectOptions {
    ConnectOptions {
        server_addr: addr.to_string(),
        insecure_plain_http: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn offer_and_answer_cross_the_wire() {
    let (addr, _negotiator) = start_broker().await;
    let client = Arc::new(
        Client::new(ClientOptions {
            user_id: 0x42,
            password: "hunter2".into(),
            connect: plain_http(addr),
        })
        .expect("client"),
    );
    let server = Server::new(ServerOptions {
        group_id: 2,
        secret: "t0psecret".into(),
        connect: plain_http(addr),
        wait_after_pending: Some(Duration::from_millis(10)),
        ..Default::default()
    })
    .expect("server");

    let (offer_tx, mut offer_rx) = tokio::sync::mpsc::unbounded_channel();
    server.set_next_offer_handler(Arc::new(move |offer_id, sdp| {
        offer_tx
            .send((offer_id, sdp))
            .map_err(|_| anyhow::anyhow!("test receiver gone"))
    }));

    // The registration call blocks at the gateway until the server's
    // poll loop takes the offer.
    let registration = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.register_offer(b"\x01\x02", &[1, 2]).await })
    };
    let (offer_id, sdp) = timeout(Duration::from_secs(10), offer_rx.recv())
        .await
        .expect("handler fires")
        .expect("channel open");
    assert_eq!(sdp, Bytes::from_static(b"\x01\x02"));
    let registered_id = registration
        .await
        .expect("registrant task")
        .expect("offer id");
    assert_eq!(registered_id, offer_id);

    let pending = client.lookup_answer(offer_id).await;
    assert!(matches!(
        pending,
        Err(HttpNegotiateError::Negotiator(NegotiatorError::AnswerPending))
    ));

    server
        .register_answer(offer_id, b"\xaa")
        .await
        .expect("answer accepted");

    let answer = client.lookup_answer(offer_id).await.expect("answer");
    assert_eq!(answer, Bytes::from_static(b"\xaa"));
    // Lookups are idempotent.
    let again = client.lookup_answer(offer_id).await.expect("answer");
    assert_eq!(again, Bytes::from_static(b"\xaa"));

    let repeated = server.register_answer(offer_id, b"\xbb").await;
    assert!(matches!(
        repeated,
        Err(HttpNegotiateError::Rejected {
            status: Status::Error,
            ..
        })
    ));
}

#[tokio::test]
async fn wrong_password_is_indistinguishable_from_missing() {
    let (addr, _negotiator) = start_broker().await;
    let client = Client::new(ClientOptions {
        user_id: 0x42,
        password: "wrong".into(),
        connect: plain_http(addr),
    })
    .expect("client");

    let result = client.register_offer(b"\x01", &[1]).await;
    assert!(matches!(
        result,
        Err(HttpNegotiateError::InvalidResponseFormat)
    ));
}

#[tokio::test]
async fn wrong_group_secret_is_indistinguishable_from_missing() {
    let (addr, _negotiator) = start_broker().await;
    let server = Server::new(ServerOptions {
        group_id: 1,
        secret: "wrong".into(),
        connect: plain_http(addr),
        ..Default::default()
    })
    .expect("server");

    let result = server.register_answer(1, b"\xaa").await;
    assert!(matches!(
        result,
        Err(HttpNegotiateError::InvalidResponseFormat)
    ));
}

#[tokio::test]
async fn rejected_groups_surface_the_broker_reference() {
    let (addr, _negotiator) = start_broker().await;
    let client = Client::new(ClientOptions {
        user_id: 0x42,
        password: "hunter2".into(),
        connect: plain_http(addr),
    })
    .expect("client");

    match client.register_offer(b"\x01", &[99]).await {
        Err(HttpNegotiateError::Rejected {
            status: Status::Error,
            reference,
        }) => assert_eq!(reference, "bad group ID"),
        other => panic!("expected a rejected offer, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_bodies_collapse_to_a_bare_404() {
    let (addr, _negotiator) = start_broker().await;
    let http = reqwest::Client::new();

    // Not JSON at all.
    let response = http
        .post(format!("http://{addr}/negotiate/offer/new"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.expect("body").is_empty());

    // Wrong field types.
    let response = http
        .post(format!("http://{addr}/negotiate/offer/next"))
        .json(&serde_json::json!({ "gid": 1, "secret": 5 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.expect("body").is_empty());

    // Missing fields.
    let response = http
        .post(format!("http://{addr}/negotiate/answer/lookup"))
        .json(&serde_json::json!({ "offer_id": "ab" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.expect("body").is_empty());

    // No JSON content-type at all.
    let response = http
        .post(format!("http://{addr}/negotiate/answer/new"))
        .body("{}")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.expect("body").is_empty());
}

#[tokio::test]
async fn empty_poll_reports_pending_on_the_wire() {
    let (addr, _negotiator) = start_broker().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/negotiate/offer/next"))
        .json(&serde_json::json!({ "gid": "1", "secret": "s3cret" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body, serde_json::json!({ "status": "pending" }));
}

#[tokio::test]
async fn health_endpoint_answers() {
    let (addr, _negotiator) = start_broker().await;
    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}
