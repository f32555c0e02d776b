/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Capabilities: the only way to address an actor.
//!
//! A `Capability` pairs an actor identity with the mailbox that accepts
//! messages for it. Nothing outside this crate can mint one; they come from
//! `Sponsor::create` (or `Capability::ignore`) and are passed around by value.
//! Equality and hashing use the identity only.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::message::Message;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub(crate) fn next() -> Self {
        ActorId(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Accepts messages on behalf of a capability.
///
/// Implementations must return promptly and must never run a behavior on
/// the caller's stack.
pub(crate) trait Mailbox: Send + Sync {
    fn enqueue(self: Arc<Self>, message: Message);
}

/// Mailbox that drops everything.
struct Discard;

impl Mailbox for Discard {
    fn enqueue(self: Arc<Self>, _message: Message) {}
}

/// Unforgeable reference authorizing sends to one actor.
#[derive(Clone)]
pub struct Capability {
    id: ActorId,
    mailbox: Arc<dyn Mailbox>,
}

impl Capability {
    pub(crate) fn new(id: ActorId, mailbox: Arc<dyn Mailbox>) -> Self {
        Capability { id, mailbox }
    }

    /// A capability whose every message is discarded without scheduling.
    pub fn ignore() -> Self {
        Capability::new(ActorId::next(), Arc::new(Discard))
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Send a message (async, fire-and-forget).
    ///
    /// The message is queued and the call returns immediately. Nothing is
    /// reported back to the sender, even if the actor's sponsor is gone.
    pub fn send(&self, message: impl Into<Message>) {
        Arc::clone(&self.mailbox).enqueue(message.into());
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.id)
    }
}
