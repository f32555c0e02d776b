/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Timer utilities for scheduling delayed and periodic messages.
//!
//! Behaviors must not block, so work that "takes a while" is modeled as a
//! message that arrives later. A timer sends a message to a capability after
//! a delay, from its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::capability::Capability;
use crate::Message;

/// A timer that sends a message to a capability.
///
/// Dropping the timer cancels it. Call `detach` to let it fire on its own.
///
/// # Example
/// ```
/// use ocap_actors::{Message, Sponsor, Timer};
/// use std::time::Duration;
///
/// let sponsor = Sponsor::manual("timers");
/// let actor = sponsor.create_fn(|_msg: Message, _ctx| {});
///
/// // One-shot timer, fire and forget
/// Timer::once(actor.clone(), Duration::from_millis(5), Message::from("wake up")).detach();
///
/// // Periodic timer, cancelled when done
/// let tick = Timer::periodic(actor, Duration::from_millis(100), Message::from("tick"));
/// tick.cancel();
/// ```
pub struct Timer {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Timer {
    /// Create a one-shot timer.
    ///
    /// Sends `message` to `target` after the specified delay.
    pub fn once(target: Capability, delay: Duration, message: Message) -> Self {
        Timer::spawn(move |running| {
            if sleep_while_running(running, delay) {
                target.send(message);
            }
            running.store(false, Ordering::SeqCst);
        })
    }

    /// Create a periodic timer.
    ///
    /// Sends a copy of `message` at the specified interval until cancelled.
    pub fn periodic(target: Capability, interval: Duration, message: Message) -> Self {
        Timer::spawn(move |running| {
            while sleep_while_running(running, interval) {
                target.send(message.clone());
            }
        })
    }

    fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("actor-timer".to_string())
            .spawn(move || body(&running_clone));

        match handle {
            Ok(handle) => Timer {
                handle: Some(handle),
                running,
            },
            Err(e) => {
                warn!(error = %e, "failed to spawn timer thread; timer will not fire");
                running.store(false, Ordering::SeqCst);
                Timer {
                    handle: None,
                    running,
                }
            }
        }
    }

    /// Cancel the timer.
    ///
    /// Returns without waiting for the timer thread, so a send that was
    /// already under way can still arrive. Dropping the timer joins the
    /// thread; nothing is sent after the drop returns.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Check if the timer is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Let the timer run without a handle; it can no longer be cancelled.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.running.store(false, Ordering::SeqCst);
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns true if the full
/// duration elapsed while still running.
fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
    false
}
