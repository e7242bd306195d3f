use super::connect;
use crate::support::{Mode, TestServer};
use futures::future::join_all;
use memcache_reconnect::{Request, Response, Value};

#[tokio::test]
async fn set_then_get() {
    let server = TestServer::start(Mode::Serve).await;
    let conn = connect(server.address(), |b| b).await;

    assert_eq!(
        conn.send(Request::store(memcache_reconnect::StoreMode::Set, "user:1", "alice", 7, 0))
            .await,
        Ok(Response::Stored)
    );
    assert_eq!(
        conn.send(Request::get("user:1")).await,
        Ok(Response::Hit(Value::new("alice", 7)))
    );
    assert_eq!(conn.send(Request::get("user:2")).await, Ok(Response::Miss));
    assert_eq!(conn.send(Request::add("user:1", "bob")).await, Ok(Response::NotStored));
    assert_eq!(conn.send(Request::delete("user:1")).await, Ok(Response::Deleted));
    assert_eq!(conn.send(Request::delete("user:1")).await, Ok(Response::NotFound));
    assert_eq!(
        conn.send(Request::version()).await,
        Ok(Response::Version("1.6.21".to_string()))
    );
    assert_eq!(conn.outstanding_requests(), 0);
}

#[tokio::test]
async fn pipelined_requests_resolve_to_their_own_responses() {
    let server = TestServer::start(Mode::Serve).await;
    let conn = connect(server.address(), |b| b).await;

    let stores: Vec<_> = (0..100)
        .map(|i| conn.send(Request::set(format!("k{}", i), format!("v{}", i))))
        .collect();
    for outcome in join_all(stores).await {
        assert_eq!(outcome, Ok(Response::Stored));
    }

    let gets: Vec<_> = (0..100).map(|i| conn.send(Request::get(format!("k{}", i)))).collect();
    for (i, outcome) in join_all(gets).await.into_iter().enumerate() {
        assert_eq!(outcome, Ok(Response::Hit(Value::new(format!("v{}", i), 0))));
    }
}

#[tokio::test]
async fn incr_returns_numeric() {
    let server = TestServer::start(Mode::Serve).await;
    let conn = connect(server.address(), |b| b).await;

    assert_eq!(conn.send(Request::incr("hits", 1)).await, Ok(Response::NotFound));
    conn.send(Request::set("hits", "41")).await.unwrap();
    assert_eq!(conn.send(Request::incr("hits", 1)).await, Ok(Response::Numeric(42)));
}
