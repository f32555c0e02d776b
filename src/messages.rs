/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Built-in messages sent by transports and domains.
//!
//! These travel to the `ok` / `fail` continuations a caller supplies:
//! - `Listening` when a listener is bound
//! - `DeliveryReceipt` when a transport accepted a send
//! - `DeliveryFailure` when a send or a bind could not be carried out

use crate::error::Error;
use crate::Message;

/// Sent to a listen `ok` continuation once the endpoint is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listening {
    pub host: String,
    pub port: u16,
}

impl Listening {
    pub fn new(host: &str, port: u16) -> Self {
        Listening {
            host: host.to_string(),
            port,
        }
    }

    pub fn parse(message: &Message) -> Option<Self> {
        let host = message.get("host")?.as_text()?;
        let port = message.get("port")?.as_int()?;
        Some(Listening::new(host, u16::try_from(port).ok()?))
    }
}

impl From<Listening> for Message {
    fn from(l: Listening) -> Self {
        Message::map([("host", Message::from(l.host)), ("port", Message::from(l.port))])
    }
}

/// Sent to a send `ok` continuation once the transport handed the bytes on.
///
/// This is not an end-to-end acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub address: String,
}

impl DeliveryReceipt {
    pub fn new(address: &str) -> Self {
        DeliveryReceipt {
            address: address.to_string(),
        }
    }

    pub fn parse(message: &Message) -> Option<Self> {
        Some(DeliveryReceipt::new(message.get("address")?.as_text()?))
    }
}

impl From<DeliveryReceipt> for Message {
    fn from(r: DeliveryReceipt) -> Self {
        Message::map([("address", r.address)])
    }
}

/// Sent to a `fail` continuation when a send or a bind failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// The address the operation targeted
    pub address: String,
    /// Human-readable reason
    pub reason: String,
}

impl DeliveryFailure {
    pub fn new(address: &str, reason: &str) -> Self {
        DeliveryFailure {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn from_error(address: &str, error: &Error) -> Self {
        DeliveryFailure::new(address, &error.to_string())
    }

    pub fn parse(message: &Message) -> Option<Self> {
        let address = message.get("address")?.as_text()?;
        let reason = message.get("reason")?.as_text()?;
        Some(DeliveryFailure::new(address, reason))
    }
}

impl From<DeliveryFailure> for Message {
    fn from(f: DeliveryFailure) -> Self {
        Message::map([("address", f.address), ("reason", f.reason)])
    }
}
