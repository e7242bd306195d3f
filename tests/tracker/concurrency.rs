use memcache_reconnect::{Correlation, MemcacheError, Request, Response, Tracker};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Admitters, resolvers and one drain race; every admitted request must
/// still resolve exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drain_races_admit_and_resolve() {
    let tracker = Arc::new(Tracker::new(64, Correlation::ById));
    let admitted = Arc::new(AtomicUsize::new(0));
    let refused = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let tracker = Arc::clone(&tracker);
        let admitted = Arc::clone(&admitted);
        let refused = Arc::clone(&refused);
        handles.push(tokio::spawn(async move {
            let mut outcomes = Vec::new();
            for i in 0..200 {
                match tracker.admit(Request::get(format!("w{}-{}", worker, i))) {
                    Ok(pending) => {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        if i % 2 == 0 {
                            tracker.resolve(pending.id(), Ok(Response::Miss));
                        }
                        outcomes.push(pending);
                    }
                    Err(err) => {
                        assert!(err.is_overloaded() || err.is_closed(), "unexpected {:?}", err);
                        refused.fetch_add(1, Ordering::SeqCst);
                    }
                }
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            outcomes
        }));
    }

    tokio::task::yield_now().await;
    tracker.drain_all(MemcacheError::closed("shutdown"));

    let mut resolved = 0;
    for handle in handles {
        for pending in handle.await.unwrap() {
            match pending.await {
                Ok(Response::Miss) => {}
                Err(MemcacheError::Closed { .. }) => {}
                other => panic!("unexpected outcome {:?}", other),
            }
            resolved += 1;
        }
    }

    assert_eq!(resolved, admitted.load(Ordering::SeqCst));
    assert_eq!(resolved + refused.load(Ordering::SeqCst), 8 * 200);
    assert!(tracker.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_resolve_completes_once() {
    let tracker = Arc::new(Tracker::new(1024, Correlation::ById));
    let pending: Vec<_> = (0..512)
        .map(|i| tracker.admit(Request::get(format!("k{}", i))).unwrap())
        .collect();
    let ids: Arc<Vec<u32>> = Arc::new(pending.iter().map(|p| p.id()).collect());
    let wins = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for n in 0..4u64 {
        let tracker = Arc::clone(&tracker);
        let ids = Arc::clone(&ids);
        let wins = Arc::clone(&wins);
        handles.push(tokio::spawn(async move {
            for id in ids.iter() {
                if tracker.resolve(*id, Ok(Response::Numeric(n))) {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 512);
    for p in pending {
        assert!(matches!(p.await, Ok(Response::Numeric(_))));
    }
}
