//! Connection metrics regression tests

use super::helpers::*;
use crate::support::{Mode, TestServer};
use memcache_reconnect::{ConnectionConfig, RawConnection, Request};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn request_outcome_metrics() {
    init_recorder();

    let server = TestServer::start(Mode::Serve).await;
    let conn = RawConnection::connect(
        ConnectionConfig::builder()
            .address(server.address())
            .name("outcome_conn")
            .build(),
    )
    .await
    .unwrap();

    conn.send(Request::set("k", "v")).await.unwrap();
    conn.send(Request::get("k")).await.unwrap();

    assert_counter_exists("memcache_requests_total");
    assert_metric_has_label("memcache_requests_total", "client", "outcome_conn");
    assert_metric_has_label("memcache_requests_total", "outcome", "ok");

    assert_gauge_exists("memcache_outstanding_requests");
    assert_metric_has_label("memcache_outstanding_requests", "client", "outcome_conn");

    conn.shutdown();
    server.stop().await;
}

#[tokio::test]
#[serial]
async fn rejection_and_timeout_metrics() {
    init_recorder();

    let server = TestServer::start(Mode::Silent).await;
    let conn = RawConnection::connect(
        ConnectionConfig::builder()
            .address(server.address())
            .name("rejecting_conn")
            .outstanding_request_limit(1)
            .request_timeout(Duration::from_millis(50))
            .build(),
    )
    .await
    .unwrap();

    let first = conn.send(Request::get("a"));
    let second = conn.send(Request::get("b"));
    assert!(second.await.unwrap_err().is_overloaded());
    assert!(first.await.unwrap_err().is_timeout());

    assert_counter_exists("memcache_requests_rejected_total");
    assert_eq!(
        counter_value("memcache_requests_rejected_total", "rejecting_conn"),
        1
    );
    assert_metric_has_label("memcache_requests_total", "outcome", "timeout");
    assert_metric_has_label("memcache_requests_total", "client", "rejecting_conn");

    conn.shutdown();
    server.stop().await;
}

#[tokio::test]
#[serial]
async fn drained_requests_count_as_closed() {
    init_recorder();

    let server = TestServer::start(Mode::Silent).await;
    let conn = RawConnection::connect(
        ConnectionConfig::builder()
            .address(server.address())
            .name("draining_conn")
            .build(),
    )
    .await
    .unwrap();

    let pending = conn.send(Request::get("a"));
    conn.shutdown();
    assert!(pending.await.unwrap_err().is_closed());

    assert_metric_has_label("memcache_requests_total", "outcome", "closed");
    assert_metric_has_label("memcache_requests_total", "client", "draining_conn");

    server.stop().await;
}
