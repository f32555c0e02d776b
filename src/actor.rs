/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Behavior trait, invocation context, and the per-actor cell.
//!
//! An actor is its current behavior plus the state that behavior owns. The
//! sponsor invokes the behavior once per delivered message with a fresh
//! `Context`; the behavior can create actors, send through any capability it
//! holds, and name the behavior that will handle the next message.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::capability::{ActorId, Capability, Mailbox};
use crate::idioms::Ignore;
use crate::sponsor::{Sponsor, SponsorCore};
use crate::Message;

/// Trait for all actor behaviors.
///
/// State lives in `self`: each actor owns exactly one behavior value, and
/// only that actor's invocations ever touch it.
///
/// # Example
/// ```
/// use ocap_actors::{Behavior, Context, Message};
///
/// struct Counter {
///     count: i64,
/// }
///
/// impl Behavior for Counter {
///     fn receive(&mut self, message: Message, _ctx: &mut Context) {
///         self.count += message.as_int().unwrap_or(0);
///     }
/// }
/// ```
pub trait Behavior: Send + 'static {
    fn receive(&mut self, message: Message, ctx: &mut Context);
}

impl<F> Behavior for F
where
    F: FnMut(Message, &mut Context) + Send + 'static,
{
    fn receive(&mut self, message: Message, ctx: &mut Context) {
        self(message, ctx)
    }
}

/// Context handed to a behavior for one invocation.
pub struct Context {
    self_ref: Capability,
    sponsor: Sponsor,
    next: Option<Box<dyn Behavior>>,
}

impl Context {
    pub(crate) fn new(self_ref: Capability, sponsor: Sponsor) -> Self {
        Context {
            self_ref,
            sponsor,
            next: None,
        }
    }

    /// This actor's own capability.
    pub fn self_ref(&self) -> Capability {
        self.self_ref.clone()
    }

    /// The sponsor that runs this actor.
    pub fn sponsor(&self) -> &Sponsor {
        &self.sponsor
    }

    pub fn create<B: Behavior>(&self, behavior: B) -> Capability {
        self.sponsor.create(behavior)
    }

    pub fn create_fn<F>(&self, f: F) -> Capability
    where
        F: FnMut(Message, &mut Context) + Send + 'static,
    {
        self.sponsor.create_fn(f)
    }

    /// Replace this actor's behavior, starting with the next message.
    ///
    /// The current message keeps running under the behavior it was
    /// dequeued with. Calling this twice keeps the last one.
    pub fn set_behavior<B: Behavior>(&mut self, behavior: B) {
        self.next = Some(Box::new(behavior));
    }

    pub fn become_fn<F>(&mut self, f: F)
    where
        F: FnMut(Message, &mut Context) + Send + 'static,
    {
        self.set_behavior(f);
    }

    /// Become the terminal behavior: every later message is discarded.
    pub fn become_ignore(&mut self) {
        self.set_behavior(Ignore);
    }

    pub(crate) fn take_next(&mut self) -> Option<Box<dyn Behavior>> {
        self.next.take()
    }
}

struct MailboxState {
    queue: VecDeque<Message>,
    /// True while the cell sits in the ready queue or is being dispatched.
    scheduled: bool,
}

/// One actor: its mailbox and its current behavior.
pub(crate) struct ActorCell {
    id: ActorId,
    mailbox: Mutex<MailboxState>,
    behavior: Mutex<Box<dyn Behavior>>,
    core: Weak<SponsorCore>,
}

impl ActorCell {
    pub(crate) fn new(id: ActorId, behavior: Box<dyn Behavior>, core: Weak<SponsorCore>) -> Self {
        ActorCell {
            id,
            mailbox: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                scheduled: false,
            }),
            behavior: Mutex::new(behavior),
            core,
        }
    }

    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    /// Run the oldest queued message under the current behavior.
    ///
    /// Only the holder of the scheduled flag calls this, so invocations of
    /// one actor never overlap. Returns true if messages remain queued, in
    /// which case the caller must put the cell back in the ready queue.
    pub(crate) fn dispatch_one(self: &Arc<Self>, sponsor: &Sponsor) -> bool {
        let message = self.mailbox.lock().queue.pop_front();

        if let Some(message) = message {
            let self_ref = Capability::new(self.id, Arc::clone(self) as Arc<dyn Mailbox>);
            let mut ctx = Context::new(self_ref, sponsor.clone());
            let mut behavior = self.behavior.lock();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                behavior.receive(message, &mut ctx);
            }));

            match outcome {
                Ok(()) => {
                    if let Some(next) = ctx.take_next() {
                        trace!(actor = %self.id, "behavior replaced");
                        *behavior = next;
                    }
                }
                Err(payload) => {
                    error!(
                        sponsor = sponsor.name(),
                        actor = %self.id,
                        panic = panic_message(payload.as_ref()),
                        "behavior panicked; message dropped"
                    );
                }
            }
        }

        let mut mailbox = self.mailbox.lock();
        if mailbox.queue.is_empty() {
            mailbox.scheduled = false;
            false
        } else {
            true
        }
    }
}

impl Mailbox for ActorCell {
    fn enqueue(self: Arc<Self>, message: Message) {
        let core = match self.core.upgrade() {
            Some(core) => core,
            None => {
                trace!(actor = %self.id, "sponsor gone; message dropped");
                return;
            }
        };

        if !core.note_enqueued() {
            trace!(actor = %self.id, "sponsor shut down; message dropped");
            return;
        }

        let schedule = {
            let mut mailbox = self.mailbox.lock();
            mailbox.queue.push_back(message);
            !std::mem::replace(&mut mailbox.scheduled, true)
        };

        if schedule {
            core.schedule(self);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: i64,
        seen: Arc<Mutex<Vec<(i64, i64)>>>,
    }

    impl Behavior for Counter {
        fn receive(&mut self, message: Message, _ctx: &mut Context) {
            let start = self.count;
            self.count += message.as_int().unwrap_or(0);
            self.seen.lock().push((start, self.count));
        }
    }

    #[test]
    fn test_context_behavior_slot() {
        let sponsor = Sponsor::manual("ctx");
        let me = sponsor.create(Ignore);
        let mut ctx = Context::new(me.clone(), sponsor.clone());

        assert_eq!(ctx.self_ref(), me);
        assert!(ctx.take_next().is_none());

        ctx.become_ignore();
        ctx.become_fn(|_msg, _ctx| {});
        assert!(ctx.take_next().is_some());
        assert!(ctx.take_next().is_none());
    }

    #[test]
    fn test_struct_behavior_owns_state() {
        let sponsor = Sponsor::manual("counter");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let counter = sponsor.create(Counter {
            count: 1337,
            seen: seen.clone(),
        });

        counter.send(0);
        counter.send(-1);
        counter.send(-1336);
        sponsor.run_pending();

        assert_eq!(*seen.lock(), vec![(1337, 1337), (1337, 1336), (1336, 0)]);
    }

    #[test]
    fn test_panicking_behavior_is_isolated() {
        let sponsor = Sponsor::manual("panics");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let fragile = sponsor.create_fn(move |msg: Message, ctx: &mut Context| {
            if msg.as_text() == Some("boom") {
                ctx.become_ignore();
                panic!("boom");
            }
            log.lock().push(msg);
        });

        fragile.send("before");
        fragile.send("boom");
        fragile.send("after");
        sponsor.run_pending();

        // the replacement requested by the panicking turn is discarded
        assert_eq!(*seen.lock(), vec![Message::from("before"), Message::from("after")]);
        assert_eq!(sponsor.pending(), 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
