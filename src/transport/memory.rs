/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! In-process transport.
//!
//! Listeners register their receptionist under `host:port` in a shared
//! routing table; a send looks the target up and enqueues the raw bytes.
//! Clones share the table, so every domain in a process can use one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{Continuations, Delivery, ListenRequest, Transport};
use crate::address::Address;
use crate::capability::Capability;
use crate::error::Error;
use crate::Message;

pub const DEFAULT_SCHEME: &str = "mem";

#[derive(Clone)]
pub struct MemoryTransport {
    scheme: String,
    routes: Arc<RwLock<HashMap<String, Capability>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport::with_scheme(DEFAULT_SCHEME)
    }

    /// Serve addresses with a different scheme, e.g. to stand in for `udp`.
    pub fn with_scheme(scheme: &str) -> Self {
        MemoryTransport {
            scheme: scheme.to_string(),
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Remove a listener. Returns true if one was bound.
    pub fn unbind(&self, host: &str, port: u16) -> bool {
        self.routes.write().remove(&format!("{}:{}", host, port)).is_some()
    }

    pub fn is_bound(&self, host: &str, port: u16) -> bool {
        self.routes.read().contains_key(&format!("{}:{}", host, port))
    }

    fn route(&self, address: &str) -> Result<Capability, Error> {
        let address = Address::parse(address)?;
        if address.scheme() != self.scheme {
            return Err(Error::UnsupportedScheme {
                scheme: address.scheme().to_string(),
                expected: self.scheme.clone(),
            });
        }
        self.routes
            .read()
            .get(&address.authority())
            .cloned()
            .ok_or_else(|| Error::Unreachable(address.base()))
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn send(&self, delivery: Delivery) {
        let (reports, content) = Continuations::split(delivery);
        match self.route(&reports.address) {
            Ok(receptionist) => {
                trace!(address = %reports.address, bytes = content.len(), "memory delivery");
                receptionist.send(Message::Bytes(content));
                reports.succeeded();
            }
            Err(e) => {
                debug!(address = %reports.address, error = %e, "memory delivery failed");
                reports.failed(&e);
            }
        }
    }

    fn listen(&self, request: ListenRequest) {
        let key = format!("{}:{}", request.host, request.port);
        let address = format!("{}://{}", self.scheme, key);
        {
            let mut routes = self.routes.write();
            if routes.contains_key(&key) {
                drop(routes);
                request.failed(&address, &Error::AddressInUse(address.clone()));
                return;
            }
            routes.insert(key, request.receptionist.clone());
        }
        debug!(%address, "memory listener bound");
        request.bound();
    }
}
