//! Reconnect stress tests

use super::Outcomes;
use crate::support::{Mode, TestServer};
use memcache_reconnect::{
    ConnectionConfig, ReconnectConfig, ReconnectPolicy, ReconnectingClient, Request,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A server that drops every connection after a few answers while many
/// tasks keep sending. Every request must resolve with a success or one of
/// the connection-level errors, and the client must keep coming back.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_churning_server() {
    let server = TestServer::start(Mode::CloseAfter(50)).await;
    let client = ReconnectingClient::tcp(
        ConnectionConfig::builder()
            .address(server.address())
            .request_timeout(Duration::from_secs(2))
            .build(),
        ReconnectConfig::builder()
            .policy(ReconnectPolicy::fixed(Duration::from_millis(5)))
            .build(),
    )
    .unwrap();
    client.connected().await.unwrap();

    let outcomes = Arc::new(Outcomes::default());
    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();
    for _ in 0..32 {
        let client = client.clone();
        let outcomes = Arc::clone(&outcomes);
        let stop = Arc::clone(&stop);
        handles.push(tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                let outcome = client.send(Request::get("k")).await;
                outcomes.record(&outcome);
                if outcome.is_err() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }));
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        handle.await.unwrap();
    }

    println!(
        "{} connections, outcomes: {}",
        server.accepted(),
        outcomes.report()
    );
    let accounted = outcomes.get("ok")
        + outcomes.get("not_connected")
        + outcomes.get("closed")
        + outcomes.get("protocol");
    assert_eq!(accounted, outcomes.total());
    assert!(server.accepted() > 10);
    assert!(outcomes.get("ok") > 0);

    client.shutdown();
    client.disconnected().await;
}

/// Many clients racing shutdown against their first connect.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_shutdown_during_connect() {
    let server = TestServer::start(Mode::Serve).await;

    for _ in 0..500 {
        let client = ReconnectingClient::tcp(
            ConnectionConfig::builder().address(server.address()).build(),
            ReconnectConfig::default(),
        )
        .unwrap();
        client.shutdown();
        tokio::time::timeout(Duration::from_secs(5), client.disconnected())
            .await
            .expect("disconnected hung");
        assert!(client.connected().await.is_err());
    }

    // Give late connects time to close.
    tokio::time::sleep(Duration::from_millis(500)).await;
}
