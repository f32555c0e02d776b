/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Reusable actor behaviors.
//!
//! Small building blocks from the actor-idioms literature: discard, forward,
//! forward once, label, tag, revocable proxy and race. Each one is a plain
//! `Behavior` value, so they compose with `Sponsor::create` and
//! `Context::set_behavior` like any user behavior.

use tracing::trace;

use crate::actor::{Behavior, Context};
use crate::capability::Capability;
use crate::Message;

/// Accepts and discards every message. Terminal: an actor that becomes
/// `Ignore` never reacts again.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

impl Behavior for Ignore {
    fn receive(&mut self, _message: Message, _ctx: &mut Context) {}
}

/// Forwards every message to the subject.
pub struct Forward {
    subject: Capability,
}

impl Forward {
    pub fn new(subject: Capability) -> Self {
        Forward { subject }
    }
}

impl Behavior for Forward {
    fn receive(&mut self, message: Message, _ctx: &mut Context) {
        self.subject.send(message);
    }
}

/// Forwards the first message only, then ignores everything.
pub struct OneShot {
    subject: Capability,
}

impl OneShot {
    pub fn new(subject: Capability) -> Self {
        OneShot { subject }
    }
}

impl Behavior for OneShot {
    fn receive(&mut self, message: Message, ctx: &mut Context) {
        self.subject.send(message);
        ctx.become_ignore();
    }
}

/// Forwards `{label, message}` to the subject.
pub struct Label {
    subject: Capability,
    label: Message,
}

impl Label {
    pub fn new(subject: Capability, label: impl Into<Message>) -> Self {
        Label {
            subject,
            label: label.into(),
        }
    }
}

impl Behavior for Label {
    fn receive(&mut self, message: Message, _ctx: &mut Context) {
        self.subject.send(Message::map([
            ("label", self.label.clone()),
            ("message", message),
        ]));
    }
}

/// Forwards `{tag, message}` where `tag` is this actor's own capability.
///
/// The tag cannot be forged, so the subject can tell which of its tags a
/// message came through.
pub struct Tag {
    subject: Capability,
}

impl Tag {
    pub fn new(subject: Capability) -> Self {
        Tag { subject }
    }
}

impl Behavior for Tag {
    fn receive(&mut self, message: Message, ctx: &mut Context) {
        self.subject.send(Message::map([
            ("tag", Message::from(ctx.self_ref())),
            ("message", message),
        ]));
    }
}

/// Forwards to the subject until the revoke sentinel arrives, then ignores
/// everything.
///
/// By default the sentinel is the subject capability itself: only someone
/// who already holds the subject can revoke the proxy.
pub struct Revocable {
    subject: Capability,
    sentinel: Message,
}

impl Revocable {
    pub fn new(subject: Capability) -> Self {
        let sentinel = Message::from(&subject);
        Revocable { subject, sentinel }
    }

    pub fn with_sentinel(subject: Capability, sentinel: impl Into<Message>) -> Self {
        Revocable {
            subject,
            sentinel: sentinel.into(),
        }
    }
}

impl Behavior for Revocable {
    fn receive(&mut self, message: Message, ctx: &mut Context) {
        if message == self.sentinel {
            trace!(proxy = %ctx.self_ref().id(), "revoked");
            ctx.become_ignore();
        } else {
            self.subject.send(message);
        }
    }
}

/// Sends each request to every service; only the first reply reaches the
/// customer.
///
/// Requests are maps carrying a `customer` capability. The customer is
/// swapped for a fresh `OneShot` in front of it, so later replies are
/// dropped. Requests without a customer are ignored.
pub struct Race {
    services: Vec<Capability>,
}

impl Race {
    pub fn new(services: Vec<Capability>) -> Self {
        Race { services }
    }
}

impl Behavior for Race {
    fn receive(&mut self, message: Message, ctx: &mut Context) {
        let customer = match message.get("customer").and_then(Message::as_capability) {
            Some(customer) => customer.clone(),
            None => {
                trace!("race request without customer dropped");
                return;
            }
        };

        let one_shot = ctx.create(OneShot::new(customer));
        let request = message.with("customer", one_shot);
        for service in &self.services {
            service.send(request.clone());
        }
    }
}
