//! Raw connection stress tests

use super::Outcomes;
use crate::support::{Mode, TestServer};
use memcache_reconnect::{ConnectionConfig, RawConnection, Request};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_pipelined_volume() {
    let server = TestServer::start(Mode::Serve).await;
    let conn = RawConnection::connect(
        ConnectionConfig::builder()
            .address(server.address())
            .outstanding_request_limit(10_000)
            .request_timeout(Duration::from_secs(30))
            .build(),
    )
    .await
    .unwrap();

    let outcomes = Arc::new(Outcomes::default());
    let start = Instant::now();
    let mut handles = Vec::new();
    for worker in 0..16 {
        let conn = conn.clone();
        let outcomes = Arc::clone(&outcomes);
        handles.push(tokio::spawn(async move {
            for i in 0..10_000 {
                let key = format!("w{}:{}", worker, i % 100);
                let outcome = if i % 4 == 0 {
                    conn.send(Request::set(key, "payload")).await
                } else {
                    conn.send(Request::get(key)).await
                };
                outcomes.record(&outcome);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!(
        "160k requests in {:?}: {}",
        start.elapsed(),
        outcomes.report()
    );
    assert_eq!(outcomes.get("ok"), 160_000);
    assert_eq!(conn.outstanding_requests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_ceiling_under_contention() {
    let server = TestServer::start(Mode::Silent).await;
    let limit = 100;
    let conn = RawConnection::connect(
        ConnectionConfig::builder()
            .address(server.address())
            .outstanding_request_limit(limit)
            .request_timeout(Duration::from_millis(200))
            .max_consecutive_timeouts(None)
            .build(),
    )
    .await
    .unwrap();

    let outcomes = Arc::new(Outcomes::default());
    let mut handles = Vec::new();
    for _ in 0..1_000 {
        let conn = conn.clone();
        let outcomes = Arc::clone(&outcomes);
        handles.push(tokio::spawn(async move {
            let outcome = conn.send(Request::get("k")).await;
            assert!(conn.outstanding_requests() <= 100);
            outcomes.record(&outcome);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!("ceiling outcomes: {}", outcomes.report());
    assert_eq!(outcomes.total(), 1_000);
    assert_eq!(outcomes.get("timeout") + outcomes.get("overloaded"), 1_000);
    assert!(outcomes.get("timeout") >= limit);
    assert!(conn.is_connected());
}
