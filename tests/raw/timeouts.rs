use super::connect;
use crate::support::{Mode, TestServer};
use memcache_reconnect::{MemcacheError, Request};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[tokio::test]
async fn silent_server_times_out_without_disconnect() {
    let server = TestServer::start(Mode::Silent).await;
    let conn = connect(server.address(), |b| {
        b.request_timeout(Duration::from_millis(1000))
    })
    .await;

    let started = Instant::now();
    let outcome = conn.send(Request::get("never")).await;
    let elapsed = started.elapsed();

    assert_eq!(
        outcome,
        Err(MemcacheError::Timeout {
            timeout: Duration::from_millis(1000)
        })
    );
    assert!(elapsed >= Duration::from_millis(950), "timed out early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2000), "timed out late: {:?}", elapsed);
    assert!(conn.is_connected());
    assert_eq!(conn.outstanding_requests(), 0);
}

#[tokio::test]
async fn outstanding_requests_track_admissions_and_timeouts() {
    let server = TestServer::start(Mode::Silent).await;
    let timeouts = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&timeouts);
    let conn = connect(server.address(), move |b| {
        b.request_timeout(Duration::from_millis(100))
            .on_request_timeout(move |_| {
                t.fetch_add(1, Ordering::SeqCst);
            })
    })
    .await;

    let pending: Vec<_> = (0..5).map(|i| conn.send(Request::get(format!("k{}", i)))).collect();
    assert_eq!(conn.outstanding_requests(), 5);

    for outcome in futures::future::join_all(pending).await {
        assert!(outcome.unwrap_err().is_timeout());
    }
    assert_eq!(conn.outstanding_requests(), 0);
    assert_eq!(timeouts.load(Ordering::SeqCst), 5);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn consecutive_timeouts_escalate_to_teardown() {
    let server = TestServer::start(Mode::Silent).await;
    let conn = connect(server.address(), |b| {
        b.request_timeout(Duration::from_millis(50))
            .max_consecutive_timeouts(Some(3))
    })
    .await;

    for i in 0..3 {
        let outcome = conn.send(Request::get(format!("k{}", i))).await;
        assert!(outcome.unwrap_err().is_timeout());
    }

    conn.closed().await;
    assert!(!conn.is_connected());
    assert!(conn.send(Request::get("after")).await.unwrap_err().is_closed());
}
