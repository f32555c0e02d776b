/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! # ocap-actors - Capability-Secured Actor Runtime
//!
//! Actors that can only be reached through unforgeable capabilities, and
//! domains that carry those capabilities between address spaces.
//!
//! ## Features
//!
//! - **Capabilities**: The only way to send to an actor; no lookup by name
//! - **Asynchronous Sends**: `send` enqueues and returns, never runs the receiver
//! - **Become**: A behavior may replace itself, starting with the next message
//! - **Sponsors**: Worker pool scheduler with per-actor FIFO and mutual exclusion
//! - **Domains**: Export capabilities as addresses, receive proxies back
//!
//! ## Quick Start
//!
//! ### 1. Create Actors
//!
//! ```rust
//! use ocap_actors::{Behavior, Context, Message, Sponsor};
//!
//! struct Counter { count: i64 }
//!
//! impl Behavior for Counter {
//!     fn receive(&mut self, msg: Message, ctx: &mut Context) {
//!         self.count += msg.as_int().unwrap_or(1);
//!         if let Some(customer) = msg.get("customer").and_then(Message::as_capability) {
//!             customer.send(self.count);
//!         }
//!     }
//! }
//!
//! let sponsor = Sponsor::manual("quick-start");
//! let counter = sponsor.create(Counter { count: 0 });
//! counter.send(5);
//! sponsor.run_pending();
//! ```
//!
//! ### 2. Become
//!
//! ```rust
//! use ocap_actors::{Message, Sponsor};
//!
//! let sponsor = Sponsor::manual("become");
//! let once = sponsor.create_fn(|msg: Message, ctx| {
//!     println!("first: {:?}", msg);
//!     ctx.become_ignore();
//! });
//! once.send("seen");
//! once.send("discarded");
//! sponsor.run_pending();
//! ```
//!
//! ### 3. Cross Domains
//!
//! ```rust
//! use std::sync::Arc;
//! use ocap_actors::{Domain, MemoryTransport, Message, Sponsor};
//!
//! let sponsor = Sponsor::manual("domains");
//! let transport = MemoryTransport::new();
//! let alpha = Domain::new("mem://alpha:1", sponsor.clone(), Arc::new(transport.clone())).unwrap();
//! let beta = Domain::new("mem://beta:2", sponsor.clone(), Arc::new(transport)).unwrap();
//! beta.listen(None, None);
//!
//! let printer = beta.create_fn(|msg: Message, _ctx| println!("{:?}", msg));
//! let address = beta.local_to_remote(&printer);
//! alpha.remote_to_local(&address).send("over the wire");
//! sponsor.run_pending();
//! ```

pub mod actor;
pub mod address;
pub mod capability;
pub mod config;
pub mod domain;
pub mod error;
pub mod idioms;
pub mod message;
pub mod messages;
pub mod serialization;
pub mod sponsor;
pub mod timer;
pub mod transport;

// Re-export commonly used types
pub use actor::{Behavior, Context};
pub use address::Address;
pub use capability::{ActorId, Capability};
pub use config::{DomainConfig, SponsorConfig, ThreadConfig};
pub use domain::Domain;
pub use error::{Error, Result};
pub use idioms::{Forward, Ignore, Label, OneShot, Race, Revocable, Tag};
pub use message::Message;
pub use messages::{DeliveryFailure, DeliveryReceipt, Listening};
pub use serialization::{CapabilityCodec, WireEnvelope, WireValue};
pub use sponsor::Sponsor;
pub use timer::Timer;
pub use transport::{Delivery, ListenRequest, MemoryTransport, Transport, ZmqTransport};
