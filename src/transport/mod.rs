/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Byte transports between domains.
//!
//! A transport knows nothing about actors beyond capabilities for
//! continuations: it moves opaque bytes to `scheme://host:port[/path]` and
//! hands inbound bytes to a receptionist as `Message::Bytes`. Outcomes are
//! reported to the optional `ok` / `fail` capabilities, never returned.
//!
//! - `MemoryTransport` - in-process routing table, for tests and co-located
//!   domains
//! - `ZmqTransport` - ZeroMQ PUSH/PULL over `tcp://`

pub mod memory;
pub mod zmq;

pub use memory::MemoryTransport;
pub use zmq::ZmqTransport;

use tracing::debug;

use crate::capability::Capability;
use crate::error::Error;
use crate::messages::{DeliveryFailure, DeliveryReceipt, Listening};

/// One outbound send.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub address: String,
    pub content: Vec<u8>,
    pub ok: Option<Capability>,
    pub fail: Option<Capability>,
}

impl Delivery {
    pub fn new(address: &str, content: Vec<u8>) -> Self {
        Delivery {
            address: address.to_string(),
            content,
            ok: None,
            fail: None,
        }
    }

    pub fn with_ok(mut self, ok: Option<Capability>) -> Self {
        self.ok = ok;
        self
    }

    pub fn with_fail(mut self, fail: Option<Capability>) -> Self {
        self.fail = fail;
        self
    }
}

/// Reports for a delivery once its content has been handed off.
#[derive(Debug, Clone)]
pub(crate) struct Continuations {
    pub address: String,
    pub ok: Option<Capability>,
    pub fail: Option<Capability>,
}

impl Continuations {
    pub fn split(delivery: Delivery) -> (Continuations, Vec<u8>) {
        let Delivery {
            address,
            content,
            ok,
            fail,
        } = delivery;
        (Continuations { address, ok, fail }, content)
    }

    pub fn succeeded(&self) {
        if let Some(ok) = &self.ok {
            ok.send(DeliveryReceipt::new(&self.address));
        }
    }

    pub fn failed(&self, error: &Error) {
        report_failure(&self.address, self.fail.as_ref(), error);
    }
}

/// Request to bind an inbound endpoint.
#[derive(Debug, Clone)]
pub struct ListenRequest {
    pub host: String,
    pub port: u16,
    /// Receives every inbound delivery as `Message::Bytes`
    pub receptionist: Capability,
    /// Receives `Listening { host, port }` once bound
    pub ok: Option<Capability>,
    /// Receives `DeliveryFailure` if the bind fails
    pub fail: Option<Capability>,
}

impl ListenRequest {
    pub fn new(host: &str, port: u16, receptionist: Capability) -> Self {
        ListenRequest {
            host: host.to_string(),
            port,
            receptionist,
            ok: None,
            fail: None,
        }
    }

    pub fn with_ok(mut self, ok: Option<Capability>) -> Self {
        self.ok = ok;
        self
    }

    pub fn with_fail(mut self, fail: Option<Capability>) -> Self {
        self.fail = fail;
        self
    }

    pub(crate) fn bound(&self) {
        if let Some(ok) = &self.ok {
            ok.send(Listening::new(&self.host, self.port));
        }
    }

    pub(crate) fn failed(&self, address: &str, error: &Error) {
        report_failure(address, self.fail.as_ref(), error);
    }
}

/// Moves bytes between domains.
///
/// Both operations must return promptly: implementations queue work or
/// finish it without blocking on the network.
pub trait Transport: Send + Sync + 'static {
    /// Scheme of the addresses this transport serves (`mem`, `tcp`, ...).
    fn scheme(&self) -> &str;

    fn send(&self, delivery: Delivery);

    fn listen(&self, request: ListenRequest);
}

pub(crate) fn report_failure(address: &str, fail: Option<&Capability>, error: &Error) {
    match fail {
        Some(fail) => fail.send(DeliveryFailure::from_error(address, error)),
        None => debug!(%address, %error, "failure dropped, no fail continuation"),
    }
}
