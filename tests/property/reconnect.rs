//! Property tests for the reconnect loop.
//!
//! Invariants tested:
//! - After K consecutive connect failures the K-th wait is backoff(K-1)
//! - A successful connect resets the count

use futures::FutureExt;
use futures::future::BoxFuture;
use memcache_reconnect::{
    ConnectError, ConnectionConfig, RawConnection, ReconnectConfig, ReconnectPolicy,
    ReconnectingClient, Scheduler,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;

fn policy() -> impl Strategy<Value = (String, ReconnectPolicy)> {
    prop_oneof![
        (1u64..500).prop_map(|ms| (
            format!("fixed {}ms", ms),
            ReconnectPolicy::fixed(Duration::from_millis(ms))
        )),
        (1u64..100, 1u64..30).prop_map(|(ms, cap)| (
            format!("exponential {}ms cap {}s", ms, cap),
            ReconnectPolicy::exponential(Duration::from_millis(ms), Duration::from_secs(cap))
        )),
        Just(("default".to_string(), ReconnectPolicy::default())),
    ]
}

/// Fails the first `failures` attempts, then hands out in-memory connections.
fn flaky(
    failures: usize,
    attempts: Arc<AtomicUsize>,
    servers: Arc<Mutex<Vec<DuplexStream>>>,
) -> impl Fn() -> BoxFuture<'static, Result<RawConnection, ConnectError>> + Send + Sync + 'static {
    move || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        let servers = Arc::clone(&servers);
        async move {
            if attempt < failures {
                return Err(ConnectError::Failed("refused".to_string()));
            }
            let (client, server) = tokio::io::duplex(1024);
            servers.lock().unwrap().push(server);
            Ok(RawConnection::from_stream(
                client,
                "flaky",
                Arc::new(ConnectionConfig::default()),
                Scheduler::current()?,
            ))
        }
        .boxed()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn kth_wait_matches_policy(failures in 0usize..10, (label, policy) in policy()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let scheduled = Arc::new(Mutex::new(Vec::new()));
            let s = Arc::clone(&scheduled);
            let config = ReconnectConfig::builder()
                .policy(policy.clone())
                .on_reconnect_scheduled(move |attempt, delay| s.lock().unwrap().push((attempt, delay)))
                .build();

            let attempts = Arc::new(AtomicUsize::new(0));
            let servers = Arc::new(Mutex::new(Vec::new()));
            let client = ReconnectingClient::new(
                flaky(failures, Arc::clone(&attempts), Arc::clone(&servers)),
                config,
            )
            .unwrap();
            client.connected().await.unwrap();

            let expected: Vec<_> = (0..failures).map(|k| (k, policy.backoff(k))).collect();
            prop_assert_eq!(&*scheduled.lock().unwrap(), &expected, "policy {}", label);
            prop_assert_eq!(attempts.load(Ordering::SeqCst), failures + 1);
            prop_assert_eq!(client.reconnect_count(), 0);

            client.shutdown();
            Ok(())
        })?;
    }
}
