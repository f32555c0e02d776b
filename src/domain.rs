/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Domain - one address space reachable over a transport.
//!
//! A domain owns a sponsor, a transport and a receptionist, plus the marshal
//! tables that translate between local capabilities and remote addresses:
//!
//! - `local_to_remote` exports a local capability under `base/token`
//! - `remote_to_local` returns the exported capability itself for our own
//!   addresses, or a proxy actor that forwards every message over the
//!   transport
//! - the receptionist decodes inbound bytes and re-sends the message to the
//!   exported capability named by the token
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use ocap_actors::{Domain, MemoryTransport, Message, Sponsor};
//!
//! let sponsor = Sponsor::manual("demo");
//! let domain = Domain::new("mem://demo:1", sponsor.clone(), Arc::new(MemoryTransport::new())).unwrap();
//! let actor = domain.create_fn(|_msg: Message, _ctx| {});
//! let address = domain.local_to_remote(&actor);
//! assert_eq!(domain.remote_to_local(&address), actor);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::actor::{Behavior, Context};
use crate::address::Address;
use crate::capability::{ActorId, Capability};
use crate::config::DomainConfig;
use crate::error::{Error, Result};
use crate::serialization::{self, CapabilityCodec, WireEnvelope};
use crate::sponsor::Sponsor;
use crate::transport::{self, Delivery, ListenRequest, Transport};
use crate::Message;

#[derive(Default)]
struct MarshalTables {
    /// token -> exported local capability
    exports: HashMap<String, Capability>,
    /// exported capability -> its full address
    export_addresses: HashMap<ActorId, String>,
    /// remote address -> proxy standing for it
    proxies: HashMap<String, Capability>,
    /// proxy -> the remote address it forwards to
    proxy_addresses: HashMap<ActorId, String>,
}

struct DomainInner {
    base: Address,
    sponsor: Sponsor,
    transport: Arc<dyn Transport>,
    receptionist: Capability,
    short_circuit_local: bool,
    on_failure: RwLock<Option<Capability>>,
    on_delivery: RwLock<Option<Capability>>,
    tables: Mutex<MarshalTables>,
    me: Weak<DomainInner>,
}

/// A sponsor exposed to other domains over a transport.
///
/// Cloning a `Domain` yields another handle to the same tables.
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Domain {
    /// Create a domain serving `base` (`scheme://host:port`).
    ///
    /// Fails if the base does not parse, carries a path, or uses a scheme
    /// the transport does not serve. Call `listen` to start receiving.
    pub fn new(base: &str, sponsor: Sponsor, transport: Arc<dyn Transport>) -> Result<Self> {
        Domain::with_config(DomainConfig::new(base), sponsor, transport)
    }

    pub fn with_config(
        config: DomainConfig,
        sponsor: Sponsor,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let base = Address::parse(&config.base)?;
        if base.path().is_some() {
            return Err(Error::BaseWithPath(config.base));
        }
        if base.scheme() != transport.scheme() {
            return Err(Error::UnsupportedScheme {
                scheme: base.scheme().to_string(),
                expected: transport.scheme().to_string(),
            });
        }

        let inner = Arc::new_cyclic(|me: &Weak<DomainInner>| {
            let receptionist = sponsor.create(Receptionist { domain: me.clone() });
            DomainInner {
                base,
                sponsor,
                transport,
                receptionist,
                short_circuit_local: config.short_circuit_local,
                on_failure: RwLock::new(None),
                on_delivery: RwLock::new(None),
                tables: Mutex::new(MarshalTables::default()),
                me: me.clone(),
            }
        });

        info!(
            base = %inner.base,
            sponsor = %inner.sponsor.name(),
            receptionist = %inner.receptionist.id(),
            "domain created"
        );
        Ok(Domain { inner })
    }

    /// The `scheme://host:port` this domain serves.
    pub fn base(&self) -> String {
        self.inner.base.to_string()
    }

    pub fn sponsor(&self) -> &Sponsor {
        &self.inner.sponsor
    }

    /// The single inbound gateway. Transports hand it `Message::Bytes`.
    pub fn receptionist(&self) -> Capability {
        self.inner.receptionist.clone()
    }

    pub fn create<B: Behavior>(&self, behavior: B) -> Capability {
        self.inner.sponsor.create(behavior)
    }

    pub fn create_fn<F>(&self, f: F) -> Capability
    where
        F: FnMut(Message, &mut Context) + Send + 'static,
    {
        self.inner.sponsor.create_fn(f)
    }

    /// Default `fail` continuation for every proxy send of this domain.
    pub fn on_failure(&self, fail: Capability) {
        *self.inner.on_failure.write() = Some(fail);
    }

    /// Default `ok` continuation; receives a `DeliveryReceipt` per send.
    pub fn on_delivery(&self, ok: Capability) {
        *self.inner.on_delivery.write() = Some(ok);
    }

    /// Bind the base host and port to the receptionist.
    ///
    /// `ok` receives `Listening { host, port }`, `fail` a `DeliveryFailure`.
    pub fn listen(&self, ok: Option<Capability>, fail: Option<Capability>) {
        let request = ListenRequest::new(
            self.inner.base.host(),
            self.inner.base.port(),
            self.inner.receptionist.clone(),
        )
        .with_ok(ok)
        .with_fail(fail);
        self.inner.transport.listen(request);
    }

    /// Export a capability and return the address other domains can use.
    ///
    /// The same capability always yields the same address. A proxy yields
    /// the remote address it forwards to.
    pub fn local_to_remote(&self, capability: &Capability) -> String {
        self.inner.local_to_remote(capability)
    }

    /// Turn an address back into something this domain can send to.
    pub fn remote_to_local(&self, address: &str) -> Capability {
        self.inner.remote_to_local(address)
    }
}

impl CapabilityCodec for Domain {
    fn marshal(&self, capability: &Capability) -> String {
        self.inner.local_to_remote(capability)
    }

    fn unmarshal(&self, address: &str) -> Capability {
        self.inner.remote_to_local(address)
    }
}

impl DomainInner {
    fn local_to_remote(&self, capability: &Capability) -> String {
        let mut tables = self.tables.lock();
        if let Some(address) = tables.proxy_addresses.get(&capability.id()) {
            return address.clone();
        }
        if let Some(address) = tables.export_addresses.get(&capability.id()) {
            return address.clone();
        }

        let token = Uuid::new_v4().simple().to_string();
        let address = self.base.with_path(&token).to_string();
        tables.exports.insert(token, capability.clone());
        tables.export_addresses.insert(capability.id(), address.clone());
        debug!(base = %self.base, actor = %capability.id(), %address, "capability exported");
        address
    }

    fn remote_to_local(&self, address: &str) -> Capability {
        if self.short_circuit_local {
            if let Ok(exported) = self.exported(address) {
                return exported;
            }
        }

        let mut tables = self.tables.lock();
        if let Some(proxy) = tables.proxies.get(address) {
            return proxy.clone();
        }
        let proxy = self.sponsor.create(Proxy {
            address: address.to_string(),
            domain: self.me.clone(),
        });
        tables.proxies.insert(address.to_string(), proxy.clone());
        tables.proxy_addresses.insert(proxy.id(), address.to_string());
        debug!(base = %self.base, %address, proxy = %proxy.id(), "proxy created");
        proxy
    }

    /// Look up a capability this domain exported.
    fn exported(&self, address: &str) -> Result<Capability> {
        let parsed = Address::parse(address)?;
        if parsed.base() != self.base.base() {
            return Err(Error::UnknownAddress(address.to_string()));
        }
        parsed
            .path()
            .and_then(|token| self.tables.lock().exports.get(token).cloned())
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))
    }

    /// Encode a message for `address` and hand it to the transport.
    ///
    /// The delivery's `ok` is the domain's `on_delivery` receipt target, not
    /// the receptionist. The way back is the envelope's `from` base plus the
    /// capabilities marshaled inside the message.
    fn forward(&self, address: &str, message: &Message) {
        let ok = self.on_delivery.read().clone();
        let fail = self.on_failure.read().clone();
        let envelope = WireEnvelope {
            to: address.to_string(),
            from: self.base.to_string(),
            message: serialization::encode_value(message, self),
        };

        match serialization::to_bytes(&envelope) {
            Ok(content) => {
                trace!(from = %self.base, to = %address, bytes = content.len(), "proxy send");
                self.transport
                    .send(Delivery::new(address, content).with_ok(ok).with_fail(fail));
            }
            Err(e) => transport::report_failure(address, fail.as_ref(), &e),
        }
    }

    /// Decode one inbound delivery and pass it to its target.
    fn accept(&self, bytes: &[u8]) -> Result<()> {
        let envelope = serialization::from_bytes(bytes)?;
        let target = self.exported(&envelope.to)?;
        let message = serialization::decode_value(envelope.message, self);
        trace!(base = %self.base, from = %envelope.from, actor = %target.id(), "inbound delivery");
        target.send(message);
        Ok(())
    }
}

impl CapabilityCodec for DomainInner {
    fn marshal(&self, capability: &Capability) -> String {
        self.local_to_remote(capability)
    }

    fn unmarshal(&self, address: &str) -> Capability {
        self.remote_to_local(address)
    }
}

/// Stands for a capability in another domain.
struct Proxy {
    address: String,
    domain: Weak<DomainInner>,
}

impl Behavior for Proxy {
    fn receive(&mut self, message: Message, _ctx: &mut Context) {
        match self.domain.upgrade() {
            Some(domain) => domain.forward(&self.address, &message),
            None => debug!(address = %self.address, "domain dropped, proxy message discarded"),
        }
    }
}

struct Receptionist {
    domain: Weak<DomainInner>,
}

impl Behavior for Receptionist {
    fn receive(&mut self, message: Message, _ctx: &mut Context) {
        let Some(domain) = self.domain.upgrade() else {
            return;
        };
        let Some(bytes) = message.as_bytes() else {
            warn!(base = %domain.base, "receptionist got a non-byte message, dropped");
            return;
        };
        if let Err(e) = domain.accept(bytes) {
            warn!(base = %domain.base, error = %e, "inbound delivery dropped");
        }
    }
}
