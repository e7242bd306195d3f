//! Reconnecting client tests.
//!
//! Test organization:
//! - state_machine.rs: counting, shutdown races and drains with a scripted connector
//! - logging.rs: no reconnect chatter once shut down
//! - integration.rs: real sockets against the embedded server

mod state_machine;

use futures::FutureExt;
use futures::future::BoxFuture;
use memcache_reconnect::{
    ConnectError, ConnectionConfig, Connector, RawConnection, Scheduler,
};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;
use tokio::sync::Notify;

/// What the next connect attempt does.
#[derive(Clone)]
pub enum Step {
    Fail,
    Succeed,
    /// Waits for the gate, then succeeds.
    GatedSucceed(Arc<Notify>),
    /// Waits for the gate, then fails.
    GatedFail(Arc<Notify>),
}

struct Script {
    steps: Mutex<VecDeque<Step>>,
    otherwise: Step,
    attempts: AtomicUsize,
    servers: Mutex<Vec<DuplexStream>>,
    connections: Mutex<Vec<RawConnection>>,
}

/// Connector that plays back a list of steps over in-memory streams.
#[derive(Clone)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    /// Plays `steps`, then repeats `otherwise` forever.
    pub fn new(steps: impl IntoIterator<Item = Step>, otherwise: Step) -> Self {
        Self {
            script: Arc::new(Script {
                steps: Mutex::new(steps.into_iter().collect()),
                otherwise,
                attempts: AtomicUsize::new(0),
                servers: Mutex::new(Vec::new()),
                connections: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn attempts(&self) -> usize {
        self.script.attempts.load(Ordering::SeqCst)
    }

    /// Server end of the n-th successful connection.
    pub fn take_server(&self, n: usize) -> DuplexStream {
        let mut servers = self.script.servers.lock().unwrap();
        let (client, placeholder) = tokio::io::duplex(1);
        drop(client);
        std::mem::replace(&mut servers[n], placeholder)
    }

    /// Closes the server end of the n-th successful connection.
    pub fn drop_server(&self, n: usize) {
        drop(self.take_server(n));
    }

    /// The n-th connection handed out.
    pub fn connection(&self, n: usize) -> RawConnection {
        self.script.connections.lock().unwrap()[n].clone()
    }
}

async fn establish(script: Arc<Script>) -> Result<RawConnection, ConnectError> {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let connection = RawConnection::from_stream(
        client,
        "scripted",
        Arc::new(ConnectionConfig::default()),
        Scheduler::current()?,
    );
    script.servers.lock().unwrap().push(server);
    script.connections.lock().unwrap().push(connection.clone());
    Ok(connection)
}

fn refused() -> ConnectError {
    ConnectError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
}

impl Connector for ScriptedConnector {
    type Connection = RawConnection;

    fn connect(&self) -> BoxFuture<'static, Result<RawConnection, ConnectError>> {
        let script = Arc::clone(&self.script);
        script.attempts.fetch_add(1, Ordering::SeqCst);
        let step = script
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| script.otherwise.clone());

        async move {
            match step {
                Step::Fail => Err(refused()),
                Step::Succeed => establish(script).await,
                Step::GatedSucceed(gate) => {
                    gate.notified().await;
                    establish(script).await
                }
                Step::GatedFail(gate) => {
                    gate.notified().await;
                    Err(refused())
                }
            }
        }
        .boxed()
    }
}
