/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! ZeroMQ transport (pure Rust implementation).
//!
//! - Sends go through one dedicated sender thread. It keeps a queue and a
//!   task per remote endpoint, each owning a PUSH socket, so `send` never
//!   blocks the calling actor and a dead peer only delays its own queue.
//! - Connects and sends are bounded by the connect timeout; a peer that does
//!   not answer in time is reported to the `fail` continuation.
//! - Each `listen` starts a receiver thread with a bound PULL socket that
//!   forwards every frame to the receptionist.
//!
//! Both threads run a current-thread tokio runtime. Uses the `zeromq` crate
//! for wire-compatible ZMQ messaging.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use zeromq::{PullSocket, PushSocket, Socket, SocketRecv, SocketSend};

use super::{Continuations, Delivery, ListenRequest, Transport};
use crate::address::Address;
use crate::error::{Error, Result};
use crate::Message;

pub const SCHEME: &str = "tcp";

/// How long a connect or a send may take before the peer counts as unreachable.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Queued request for the sender thread.
struct SendRequest {
    endpoint: String,
    outbound: Outbound,
}

/// One message waiting in an endpoint queue.
struct Outbound {
    data: Vec<u8>,
    reports: Continuations,
}

/// Sends and receives domain traffic over ZMQ PUSH/PULL sockets.
pub struct ZmqTransport {
    send_tx: UnboundedSender<SendRequest>,
    listeners: Mutex<Vec<ListenerHandle>>,
}

impl ZmqTransport {
    /// Create the transport and its sender thread.
    pub fn new() -> Result<Self> {
        ZmqTransport::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let (send_tx, mut send_rx) = mpsc::unbounded_channel::<SendRequest>();
        let rt = current_thread_runtime()?;

        thread::Builder::new()
            .name("zmq-sender".to_string())
            .spawn(move || {
                rt.block_on(async move {
                    let mut queues: HashMap<String, UnboundedSender<Outbound>> = HashMap::new();

                    while let Some(SendRequest { endpoint, outbound }) = send_rx.recv().await {
                        let queue = queues.entry(endpoint.clone()).or_insert_with(|| {
                            let (queue_tx, queue_rx) = mpsc::unbounded_channel();
                            tokio::spawn(endpoint_loop(endpoint, queue_rx, connect_timeout));
                            queue_tx
                        });
                        if let Err(rejected) = queue.send(outbound) {
                            let reports = rejected.0.reports;
                            reports.failed(&Error::Transport("endpoint queue closed".to_string()));
                        }
                    }
                });
                debug!("zmq sender thread exiting");
            })?;

        Ok(ZmqTransport {
            send_tx,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Stop every listener started by this transport.
    pub fn stop(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for mut listener in listeners {
            listener.stop();
        }
    }
}

impl Transport for ZmqTransport {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn send(&self, delivery: Delivery) {
        let (reports, data) = Continuations::split(delivery);
        let endpoint = match connect_endpoint(&reports.address) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                reports.failed(&e);
                return;
            }
        };

        // Queue to sender thread (non-blocking!)
        let request = SendRequest {
            endpoint,
            outbound: Outbound { data, reports },
        };
        if let Err(rejected) = self.send_tx.send(request) {
            let reports = rejected.0.outbound.reports;
            reports.failed(&Error::Transport("sender thread stopped".to_string()));
        }
    }

    fn listen(&self, request: ListenRequest) {
        let endpoint = bind_endpoint(&request.host, request.port);
        let address = format!("{}://{}:{}", SCHEME, request.host, request.port);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let thread_request = request.clone();
        let thread_address = address.clone();

        let spawned = thread::Builder::new()
            .name(format!("zmq-recv-{}", request.port))
            .spawn(move || {
                let request = thread_request;
                let rt = match current_thread_runtime() {
                    Ok(rt) => rt,
                    Err(e) => {
                        request.failed(&thread_address, &e);
                        return;
                    }
                };

                rt.block_on(async {
                    let mut socket = PullSocket::new();
                    if let Err(e) = socket.bind(&endpoint).await {
                        request.failed(&thread_address, &Error::Transport(e.to_string()));
                        return;
                    }
                    info!(address = %thread_address, "zmq listener bound");
                    request.bound();

                    while running_clone.load(Ordering::SeqCst) {
                        // Use tokio timeout to periodically check running flag
                        let recv_result =
                            tokio::time::timeout(Duration::from_millis(100), socket.recv()).await;

                        match recv_result {
                            Ok(Ok(msg)) => {
                                let data = msg.get(0).map(|b| b.to_vec()).unwrap_or_default();
                                request.receptionist.send(Message::Bytes(data));
                            }
                            Ok(Err(e)) => {
                                warn!(address = %thread_address, error = %e, "zmq listener socket error");
                                break;
                            }
                            Err(_) => continue,
                        }
                    }
                });
            });

        match spawned {
            Ok(thread) => self.listeners.lock().push(ListenerHandle {
                running,
                thread: Some(thread),
            }),
            Err(e) => request.failed(&address, &Error::Io(e)),
        }
    }
}

impl Drop for ZmqTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle for controlling a running listener.
struct ListenerHandle {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Deliver one endpoint's queue in order.
///
/// The socket is dropped after any failure and reconnected for the next
/// message, so a peer that comes back is picked up again.
async fn endpoint_loop(
    endpoint: String,
    mut queue: UnboundedReceiver<Outbound>,
    connect_timeout: Duration,
) {
    let mut socket: Option<PushSocket> = None;

    while let Some(Outbound { data, reports }) = queue.recv().await {
        if socket.is_none() {
            match connect(&endpoint, connect_timeout).await {
                Ok(connected) => socket = Some(connected),
                Err(e) => {
                    debug!(%endpoint, error = %e, "zmq connect failed");
                    reports.failed(&e);
                    continue;
                }
            }
        }

        let Some(active) = socket.as_mut() else {
            continue;
        };
        let sent = tokio::time::timeout(connect_timeout, active.send(data.into())).await;
        match sent {
            Ok(Ok(())) => reports.succeeded(),
            Ok(Err(e)) => {
                socket = None;
                reports.failed(&Error::Transport(e.to_string()));
            }
            Err(_) => {
                socket = None;
                reports.failed(&Error::Unreachable(endpoint.clone()));
            }
        }
    }
}

async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<PushSocket> {
    let mut socket = PushSocket::new();
    let connected = tokio::time::timeout(connect_timeout, socket.connect(endpoint)).await;
    match connected {
        Ok(Ok(())) => {
            // Small delay to let connection establish
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(socket)
        }
        Ok(Err(e)) => Err(Error::Transport(e.to_string())),
        Err(_) => Err(Error::Unreachable(endpoint.to_string())),
    }
}

fn current_thread_runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

/// `tcp://host:port/token` -> `tcp://host:port` for connecting.
fn connect_endpoint(address: &str) -> Result<String> {
    let address = Address::parse(address)?;
    if address.scheme() != SCHEME {
        return Err(Error::UnsupportedScheme {
            scheme: address.scheme().to_string(),
            expected: SCHEME.to_string(),
        });
    }
    let host = match address.host() {
        "*" | "0.0.0.0" => "localhost",
        host => host,
    };
    Ok(format!("{}://{}:{}", SCHEME, host, address.port()))
}

/// Endpoint for the PULL socket to bind.
fn bind_endpoint(host: &str, port: u16) -> String {
    let host = match host {
        "*" => "0.0.0.0",
        "localhost" => "127.0.0.1",
        host => host,
    };
    format!("{}://{}:{}", SCHEME, host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = ZmqTransport::new().unwrap();
        assert_eq!(transport.scheme(), "tcp");
        transport.stop();
    }

    #[test]
    fn test_connect_endpoint_strips_token() {
        assert_eq!(
            connect_endpoint("tcp://localhost:5001/abc").unwrap(),
            "tcp://localhost:5001"
        );
        assert_eq!(connect_endpoint("tcp://*:5001").unwrap(), "tcp://localhost:5001");
        assert!(matches!(
            connect_endpoint("udp://localhost:5001"),
            Err(Error::UnsupportedScheme { .. })
        ));
        assert!(connect_endpoint("tcp://localhost").is_err());
    }

    #[test]
    fn test_bind_endpoint() {
        assert_eq!(bind_endpoint("*", 5001), "tcp://0.0.0.0:5001");
        assert_eq!(bind_endpoint("localhost", 5002), "tcp://127.0.0.1:5002");
        assert_eq!(bind_endpoint("10.0.0.7", 5003), "tcp://10.0.0.7:5003");
    }

    mod loopback {
        use super::*;
        use crate::capability::Capability;
        use crate::config::SponsorConfig;
        use crate::messages::{DeliveryFailure, DeliveryReceipt, Listening};
        use crate::sponsor::Sponsor;
        use std::time::Instant;

        fn sponsor(name: &str) -> Sponsor {
            Sponsor::new(SponsorConfig::named(name).with_workers(1)).unwrap()
        }

        fn recorder(sponsor: &Sponsor) -> (Capability, Arc<Mutex<Vec<Message>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let sink = log.clone();
            let cap = sponsor.create_fn(move |msg, _ctx| sink.lock().push(msg));
            (cap, log)
        }

        fn wait_for(cond: impl Fn() -> bool, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                if cond() {
                    return true;
                }
                thread::sleep(Duration::from_millis(10));
            }
            cond()
        }

        #[test]
        fn test_listen_ack_and_send() {
            let sponsor = sponsor("zmq-send");
            let transport = ZmqTransport::new().unwrap();
            let (receptionist, inbound) = recorder(&sponsor);
            let (ok, acks) = recorder(&sponsor);

            transport.listen(
                ListenRequest::new("127.0.0.1", 47811, receptionist).with_ok(Some(ok.clone())),
            );
            assert!(wait_for(|| !acks.lock().is_empty(), Duration::from_secs(5)));
            assert_eq!(
                Listening::parse(&acks.lock()[0]),
                Some(Listening::new("127.0.0.1", 47811))
            );

            transport.send(
                Delivery::new("tcp://127.0.0.1:47811/token", b"over tcp".to_vec()).with_ok(Some(ok)),
            );
            assert!(wait_for(|| !inbound.lock().is_empty(), Duration::from_secs(5)));
            assert_eq!(inbound.lock()[0], Message::Bytes(b"over tcp".to_vec()));

            assert!(wait_for(|| acks.lock().len() == 2, Duration::from_secs(5)));
            assert_eq!(
                DeliveryReceipt::parse(&acks.lock()[1]),
                Some(DeliveryReceipt::new("tcp://127.0.0.1:47811/token"))
            );

            transport.stop();
            sponsor.shutdown();
        }

        #[test]
        fn test_bind_conflict_reaches_fail() {
            let sponsor = sponsor("zmq-conflict");
            let transport = ZmqTransport::new().unwrap();
            let (receptionist, _) = recorder(&sponsor);
            let (ok, acks) = recorder(&sponsor);
            let (fail, failures) = recorder(&sponsor);

            transport.listen(
                ListenRequest::new("127.0.0.1", 47812, receptionist.clone()).with_ok(Some(ok)),
            );
            assert!(wait_for(|| !acks.lock().is_empty(), Duration::from_secs(5)));

            transport.listen(ListenRequest::new("127.0.0.1", 47812, receptionist).with_fail(Some(fail)));
            assert!(wait_for(|| !failures.lock().is_empty(), Duration::from_secs(5)));

            let failure = DeliveryFailure::parse(&failures.lock()[0]).unwrap();
            assert_eq!(failure.address, "tcp://127.0.0.1:47812");

            transport.stop();
            sponsor.shutdown();
        }

        #[test]
        fn test_unreachable_peer_fails_without_blocking_others() {
            let sponsor = sponsor("zmq-unreachable");
            let transport = ZmqTransport::with_connect_timeout(Duration::from_millis(300)).unwrap();
            let (receptionist, inbound) = recorder(&sponsor);
            let (ok, acks) = recorder(&sponsor);
            let (fail, failures) = recorder(&sponsor);

            transport.listen(ListenRequest::new("127.0.0.1", 47813, receptionist).with_ok(Some(ok)));
            assert!(wait_for(|| !acks.lock().is_empty(), Duration::from_secs(5)));

            // nothing listens on 47899
            transport.send(Delivery::new("tcp://127.0.0.1:47899/x", b"lost".to_vec()).with_fail(Some(fail)));
            transport.send(Delivery::new("tcp://127.0.0.1:47813/y", b"live".to_vec()));

            assert!(wait_for(|| !inbound.lock().is_empty(), Duration::from_secs(5)));
            assert_eq!(inbound.lock()[0], Message::Bytes(b"live".to_vec()));

            assert!(wait_for(|| !failures.lock().is_empty(), Duration::from_secs(5)));
            let failure = DeliveryFailure::parse(&failures.lock()[0]).unwrap();
            assert_eq!(failure.address, "tcp://127.0.0.1:47899/x");

            transport.stop();
            sponsor.shutdown();
        }
    }
}
