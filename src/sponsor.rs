/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Sponsor - actor factory and scheduler.
//!
//! Every actor has its own FIFO mailbox. The sponsor keeps one shared ready
//! queue of actors that have mail; N worker threads (or the caller, for a
//! manual sponsor) pop an actor, run one message, and requeue it if more
//! mail is waiting. An actor is in the ready queue at most once, so its
//! invocations never overlap and its messages keep their send order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::actor::{ActorCell, Behavior, Context};
use crate::capability::{ActorId, Capability};
use crate::config::{SponsorConfig, ThreadConfig};
use crate::error::Result;
use crate::Message;

struct SchedulerState {
    ready: VecDeque<Arc<ActorCell>>,
    /// Messages enqueued and not yet finished
    pending: usize,
    shutdown: bool,
}

pub(crate) struct SponsorCore {
    name: String,
    worker_count: usize,
    state: Mutex<SchedulerState>,
    work: Condvar,
    idle: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SponsorCore {
    /// Count a new message. Returns false once the sponsor is shut down.
    pub(crate) fn note_enqueued(&self) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        state.pending += 1;
        true
    }

    pub(crate) fn schedule(&self, cell: Arc<ActorCell>) {
        let mut state = self.state.lock();
        state.ready.push_back(cell);
        self.work.notify_one();
    }

    fn next_ready(&self, block: bool) -> Option<Arc<ActorCell>> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(cell) = state.ready.pop_front() {
                return Some(cell);
            }
            if !block {
                return None;
            }
            self.work.wait(&mut state);
        }
    }

    fn finish(&self, cell: Arc<ActorCell>, more: bool) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if more && !state.shutdown {
            state.ready.push_back(cell);
            self.work.notify_one();
        }
        if state.pending == 0 {
            self.idle.notify_all();
            if self.worker_count == 0 {
                // a manual sponsor may be parked in wait_idle on `work`
                self.work.notify_all();
            }
        }
    }
}

/// Creates actors and runs their deliveries.
///
/// Cloning a `Sponsor` yields another handle to the same scheduler.
///
/// # Example
/// ```
/// use ocap_actors::{Message, Sponsor};
///
/// let sponsor = Sponsor::manual("demo");
/// let printer = sponsor.create_fn(|msg: Message, _ctx| println!("{:?}", msg));
/// printer.send("print me");
/// sponsor.run_pending();
/// ```
#[derive(Clone)]
pub struct Sponsor {
    core: Arc<SponsorCore>,
}

impl Sponsor {
    /// Start a sponsor with `config.workers` worker threads.
    pub fn new(config: SponsorConfig) -> Result<Self> {
        let sponsor = Sponsor::build(&config.name, config.workers);

        for index in 0..config.workers {
            let worker = sponsor.clone();
            let thread_name = format!("{}-worker-{}", config.name, index);
            let handle = spawn_with_config(thread_name, config.thread.clone(), move || {
                worker.worker_loop();
            });
            match handle {
                Ok(handle) => sponsor.core.workers.lock().push(handle),
                Err(e) => {
                    sponsor.shutdown();
                    return Err(e.into());
                }
            }
        }

        info!(sponsor = %config.name, workers = config.workers, "sponsor started");
        Ok(sponsor)
    }

    /// A sponsor without worker threads; the owner drives it with `run_pending`.
    pub fn manual(name: &str) -> Self {
        Sponsor::build(name, 0)
    }

    fn build(name: &str, worker_count: usize) -> Self {
        Sponsor {
            core: Arc::new(SponsorCore {
                name: name.to_string(),
                worker_count,
                state: Mutex::new(SchedulerState {
                    ready: VecDeque::new(),
                    pending: 0,
                    shutdown: false,
                }),
                work: Condvar::new(),
                idle: Condvar::new(),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn worker_count(&self) -> usize {
        self.core.worker_count
    }

    /// Create an actor and return the capability to send to it.
    ///
    /// The actor is fully constructed before this returns, so no message can
    /// reach it early.
    pub fn create<B: Behavior>(&self, behavior: B) -> Capability {
        let id = ActorId::next();
        let cell = Arc::new(ActorCell::new(id, Box::new(behavior), Arc::downgrade(&self.core)));
        debug!(sponsor = %self.core.name, actor = %cell.id(), "actor created");
        Capability::new(id, cell)
    }

    pub fn create_fn<F>(&self, f: F) -> Capability
    where
        F: FnMut(Message, &mut Context) + Send + 'static,
    {
        self.create(f)
    }

    /// Messages enqueued and not yet fully processed.
    pub fn pending(&self) -> usize {
        self.core.state.lock().pending
    }

    /// Run deliveries on the calling thread until nothing is runnable.
    ///
    /// Returns the number of messages processed. Safe to call alongside
    /// worker threads.
    pub fn run_pending(&self) -> usize {
        let mut processed = 0;
        while let Some(cell) = self.core.next_ready(false) {
            self.dispatch(cell);
            processed += 1;
        }
        processed
    }

    /// Block until no delivery is queued or running, or until `timeout`.
    ///
    /// A manual sponsor is driven on the calling thread while waiting.
    /// Returns true if the sponsor went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if self.core.worker_count == 0 {
            loop {
                self.run_pending();
                let mut state = self.core.state.lock();
                if state.pending == 0 {
                    return true;
                }
                if state.ready.is_empty()
                    && self.core.work.wait_until(&mut state, deadline).timed_out()
                {
                    return state.pending == 0;
                }
            }
        }

        let mut state = self.core.state.lock();
        while state.pending > 0 {
            if self.core.idle.wait_until(&mut state, deadline).timed_out() {
                return state.pending == 0;
            }
        }
        true
    }

    /// Stop the workers. Queued and later messages are dropped.
    pub fn shutdown(&self) {
        {
            let mut state = self.core.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.ready.clear();
            state.pending = 0;
            self.core.work.notify_all();
            self.core.idle.notify_all();
        }

        let workers = std::mem::take(&mut *self.core.workers.lock());
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(sponsor = %self.core.name, "worker thread panicked");
            }
        }
        info!(sponsor = %self.core.name, "sponsor stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.state.lock().shutdown
    }

    fn worker_loop(&self) {
        debug!(sponsor = %self.core.name, "worker started");
        while let Some(cell) = self.core.next_ready(true) {
            self.dispatch(cell);
        }
        debug!(sponsor = %self.core.name, "worker exiting");
    }

    fn dispatch(&self, cell: Arc<ActorCell>) {
        let more = cell.dispatch_one(self);
        self.core.finish(cell, more);
    }
}

/// Spawn a worker thread with the given configuration
fn spawn_with_config<F>(name: String, config: ThreadConfig, f: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(move || {
        // Set CPU affinity if specified
        if !config.affinity.is_empty() {
            set_affinity(&config.affinity);
        }

        // Set thread priority if specified
        if config.priority > 0 {
            set_priority(config.priority, config.sched_policy);
        }

        f();
    })
}

/// Set CPU affinity for the current thread
fn set_affinity(cores: &[usize]) {
    #[cfg(target_os = "linux")]
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        for &core in cores {
            libc::CPU_SET(core, &mut cpuset);
        }
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpuset) != 0 {
            warn!(?cores, "failed to set worker affinity");
        }
    }
    #[cfg(not(target_os = "linux"))]
    debug!(?cores, "cpu affinity not supported on this platform");
}

/// Set thread priority
fn set_priority(priority: i32, policy: i32) {
    #[cfg(target_os = "linux")]
    unsafe {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        if libc::sched_setscheduler(0, policy, &param) != 0 {
            warn!(priority, policy, "failed to set worker priority");
        }
    }
    #[cfg(not(target_os = "linux"))]
    debug!(priority, policy, "thread priority not supported on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn recorder(sponsor: &Sponsor) -> (Capability, Arc<Mutex<Vec<Message>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let cap = sponsor.create_fn(move |msg, _ctx| sink.lock().push(msg));
        (cap, log)
    }

    #[test]
    fn test_send_never_runs_behavior_synchronously() {
        let sponsor = Sponsor::manual("async");
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let actor = sponsor.create_fn(move |_msg, _ctx| flag.store(true, Ordering::SeqCst));

        actor.send(1);
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(sponsor.pending(), 1);

        assert_eq!(sponsor.run_pending(), 1);
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(sponsor.pending(), 0);
    }

    #[test]
    fn test_send_inside_behavior_is_deferred() {
        let sponsor = Sponsor::manual("nested");
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = order.clone();
        let second = sponsor.create_fn(move |_msg, _ctx| log.lock().push("second"));
        let log = order.clone();
        let first = sponsor.create_fn(move |_msg, _ctx| {
            second.send(());
            log.lock().push("first finished");
        });

        first.send(());
        sponsor.run_pending();
        assert_eq!(*order.lock(), vec!["first finished", "second"]);
    }

    #[test]
    fn test_fifo_per_sender_target_pair() {
        let sponsor = Sponsor::new(SponsorConfig::named("fifo").with_workers(4)).unwrap();
        let (target, log) = recorder(&sponsor);

        for i in 0..500i64 {
            target.send(i);
        }
        assert!(sponsor.wait_idle(Duration::from_secs(10)));

        let expected: Vec<Message> = (0..500i64).map(Message::from).collect();
        assert_eq!(*log.lock(), expected);
        sponsor.shutdown();
    }

    #[test]
    fn test_no_actor_runs_concurrently_with_itself() {
        let sponsor = Sponsor::new(SponsorConfig::named("exclusive").with_workers(8)).unwrap();
        let violations = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicUsize::new(0));

        let mut actors = Vec::new();
        for _ in 0..4 {
            let busy = Arc::new(AtomicBool::new(false));
            let violations = violations.clone();
            let processed = processed.clone();
            actors.push(sponsor.create_fn(move |_msg, _ctx| {
                if busy.swap(true, Ordering::SeqCst) {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                thread::yield_now();
                processed.fetch_add(1, Ordering::SeqCst);
                busy.store(false, Ordering::SeqCst);
            }));
        }

        let senders: Vec<_> = (0..4)
            .map(|_| {
                let actors = actors.clone();
                thread::spawn(move || {
                    for i in 0..250i64 {
                        for actor in &actors {
                            actor.send(i);
                        }
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }

        assert!(sponsor.wait_idle(Duration::from_secs(10)));
        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(processed.load(Ordering::SeqCst), 4 * 4 * 250);
        sponsor.shutdown();
    }

    #[test]
    fn test_become_applies_from_next_message() {
        fn say_red(_msg: Message, ctx: &mut Context) {
            SAID.lock().unwrap().push("red");
            ctx.become_fn(say_black);
        }
        fn say_black(_msg: Message, ctx: &mut Context) {
            SAID.lock().unwrap().push("black");
            ctx.become_fn(say_red);
        }
        static SAID: std::sync::Mutex<Vec<&'static str>> = std::sync::Mutex::new(Vec::new());

        let sponsor = Sponsor::manual("say");
        let say = sponsor.create_fn(say_red);
        for _ in 0..3 {
            say.send(());
        }
        sponsor.run_pending();
        assert_eq!(*SAID.lock().unwrap(), vec!["red", "black", "red"]);
    }

    #[test]
    fn test_flipper_shares_state_between_behaviors() {
        struct Flipper {
            state: &'static str,
            up: bool,
            log: Arc<Mutex<Vec<String>>>,
        }

        impl Behavior for Flipper {
            fn receive(&mut self, _msg: Message, ctx: &mut Context) {
                let next = if self.up { "down" } else { "up" };
                self.log.lock().push(format!("{} -> {}", self.state, next));
                ctx.set_behavior(Flipper {
                    state: next,
                    up: !self.up,
                    log: self.log.clone(),
                });
            }
        }

        let sponsor = Sponsor::manual("flipper");
        let log = Arc::new(Mutex::new(Vec::new()));
        let flipper = sponsor.create(Flipper {
            state: "neither",
            up: true,
            log: log.clone(),
        });
        flipper.send(());
        flipper.send(());
        flipper.send(());
        sponsor.run_pending();

        assert_eq!(*log.lock(), vec!["neither -> down", "down -> up", "up -> down"]);
    }

    #[test]
    fn test_context_exposes_self_and_sponsor() {
        let sponsor = Sponsor::manual("self");
        let (sink, log) = recorder(&sponsor);

        let show_self = sponsor.create_fn(move |_msg, ctx: &mut Context| {
            let child = ctx.create_fn(|_m, _c| {});
            sink.send(Message::map([
                ("self", Message::from(ctx.self_ref())),
                ("sponsor", Message::from(ctx.sponsor().name())),
                ("child", Message::from(child)),
            ]));
        });

        show_self.send(());
        sponsor.run_pending();

        let log = log.lock();
        assert_eq!(log[0].get("self").and_then(Message::as_capability), Some(&show_self));
        assert_eq!(log[0].get("sponsor").and_then(Message::as_text), Some("self"));
        assert_ne!(log[0].get("child").and_then(Message::as_capability), Some(&show_self));
    }

    #[test]
    fn test_ping_pong_terminates() {
        let sponsor = Sponsor::manual("ping-pong");
        let rallies = Arc::new(AtomicUsize::new(0));

        let counter = rallies.clone();
        let ping = sponsor.create_fn(move |msg: Message, ctx: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(pong) = msg.as_capability() {
                pong.send(ctx.self_ref());
            }
        });

        let mut remaining = 2;
        let pong = sponsor.create_fn(move |msg: Message, ctx: &mut Context| {
            if remaining == 0 {
                return;
            }
            remaining -= 1;
            if let Some(ping) = msg.as_capability() {
                ping.send(ctx.self_ref());
            }
        });

        ping.send(pong);
        sponsor.run_pending();
        assert_eq!(rallies.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_shutdown_drops_later_sends() {
        let sponsor = Sponsor::new(SponsorConfig::named("stop").with_workers(2)).unwrap();
        let (sink, log) = recorder(&sponsor);
        sink.send(1);
        assert!(sponsor.wait_idle(Duration::from_secs(5)));

        sponsor.shutdown();
        assert!(sponsor.is_shutdown());
        sink.send(2);
        assert_eq!(sponsor.pending(), 0);
        assert_eq!(*log.lock(), vec![Message::Int(1)]);

        // idempotent
        sponsor.shutdown();
    }

    #[test]
    fn test_wait_idle_drives_manual_sponsor() {
        let sponsor = Sponsor::manual("manual");
        let (sink, log) = recorder(&sponsor);
        sink.send("a");
        assert!(sponsor.wait_idle(Duration::from_millis(10)));
        assert_eq!(log.lock().len(), 1);
        assert_eq!(sponsor.worker_count(), 0);
    }
}
