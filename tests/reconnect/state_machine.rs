use super::{ScriptedConnector, Step};
use memcache_reconnect::{
    ClientState, MemcacheError, ReconnectConfig, ReconnectEvent, ReconnectPolicy,
    ReconnectingClient, Request, Response,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

fn policy() -> ReconnectPolicy {
    ReconnectPolicy::exponential(Duration::from_millis(10), Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn kth_failure_waits_backoff_of_k_minus_one() {
    let scheduled = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&scheduled);
    let config = ReconnectConfig::builder()
        .policy(policy())
        .on_reconnect_scheduled(move |attempt, delay| s.lock().unwrap().push((attempt, delay)))
        .build();

    let connector = ScriptedConnector::new(vec![Step::Fail; 4], Step::Succeed);
    let client = ReconnectingClient::new(connector.clone(), config).unwrap();
    client.connected().await.unwrap();

    assert_eq!(connector.attempts(), 5);
    let expected: Vec<_> = (0..4).map(|k| (k, policy().backoff(k))).collect();
    assert_eq!(*scheduled.lock().unwrap(), expected);
    assert_eq!(client.reconnect_count(), 0);

    // After a success the next wait starts over.
    scheduled.lock().unwrap().clear();
    connector.drop_server(0);
    client.disconnected().await;
    client.connected().await.unwrap();
    assert_eq!(*scheduled.lock().unwrap(), vec![(0, policy().backoff(0))]);
    assert_eq!(connector.attempts(), 6);
}

#[tokio::test(start_paused = true)]
async fn count_increments_when_retry_fires() {
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::fixed(Duration::from_secs(1)))
        .build();
    let connector = ScriptedConnector::new(vec![], Step::Fail);
    let client = ReconnectingClient::new(connector.clone(), config).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.state(), ClientState::Backoff);
    assert_eq!(client.reconnect_count(), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.reconnect_count(), 1);
    assert_eq!(connector.attempts(), 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.reconnect_count(), 2);
    client.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_racing_connect_closes_the_new_connection() {
    let gate = Arc::new(Notify::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&events);
    let config = ReconnectConfig::builder()
        .on_event(move |event: &ReconnectEvent| {
            let name = match event {
                ReconnectEvent::Connected { .. } => "connected",
                ReconnectEvent::ConnectFailed { .. } => "connect_failed",
                ReconnectEvent::Disconnected { .. } => "disconnected",
                ReconnectEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
                ReconnectEvent::ShutdownRequested { .. } => "shutdown_requested",
            };
            e.lock().unwrap().push(name);
        })
        .build();

    let connector = ScriptedConnector::new(vec![Step::GatedSucceed(Arc::clone(&gate))], Step::Succeed);
    let client = ReconnectingClient::new(connector.clone(), config).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(client.state(), ClientState::ConnectingFresh);

    client.shutdown();
    gate.notify_one();
    client.disconnected().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let connection = connector.connection(0);
    assert!(!connection.is_connected());
    assert!(connection.take_disconnect_listener().is_none());
    assert!(!client.is_connected());
    assert_eq!(connector.attempts(), 1);
    assert_eq!(*events.lock().unwrap(), vec!["shutdown_requested"]);
    assert!(client.connected().await.unwrap_err().is_closed());
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_every_in_flight_request() {
    let connector = ScriptedConnector::new(vec![], Step::Succeed);
    let client = ReconnectingClient::new(connector.clone(), ReconnectConfig::default()).unwrap();
    client.connected().await.unwrap();

    let in_flight: Vec<_> = (0..25).map(|i| client.send(Request::get(format!("k{}", i)))).collect();
    client.shutdown();
    client.disconnected().await;

    for outcome in futures::future::join_all(in_flight).await {
        assert!(matches!(outcome, Err(MemcacheError::Closed { .. })));
    }
    assert_eq!(client.state(), ClientState::ShuttingDown);
    assert!(client.send(Request::get("after")).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_in_flight_closed_then_new_requests_not_connected() {
    let disconnected = Arc::new(Notify::new());
    let d = Arc::clone(&disconnected);
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::fixed(Duration::from_secs(5)))
        .on_disconnected(move || d.notify_one())
        .build();
    let connector = ScriptedConnector::new(vec![], Step::Succeed);
    let client = ReconnectingClient::new(connector.clone(), config).unwrap();
    client.connected().await.unwrap();

    let in_flight = client.send(Request::get("k"));
    connector.drop_server(0);
    disconnected.notified().await;

    assert!(in_flight.await.unwrap_err().is_closed());
    assert_eq!(client.send(Request::get("k")).await, Err(MemcacheError::NotConnected));
    assert_eq!(client.num_total_connections(), 0);
    assert_eq!(client.num_active_connections(), 0);

    client.connected().await.unwrap();
    let mut server = connector.take_server(1);
    let response = client.send(Request::delete("k"));
    tokio::time::sleep(Duration::from_millis(1)).await;
    server.write_all(b"NOT_FOUND\r\n").await.unwrap();
    assert_eq!(response.await, Ok(Response::NotFound));
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let requested = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&requested);
    let config = ReconnectConfig::builder()
        .on_event(move |event: &ReconnectEvent| {
            if matches!(event, ReconnectEvent::ShutdownRequested { .. }) {
                r.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();
    let connector = ScriptedConnector::new(vec![], Step::Succeed);
    let client = ReconnectingClient::new(connector, config).unwrap();
    client.connected().await.unwrap();

    client.shutdown();
    client.clone().shutdown();
    client.shutdown();
    client.disconnected().await;

    assert_eq!(requested.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ClientState::ShuttingDown);
}
