use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Mutex + condvar + signaled flag, the synchronization primitive the
/// driver blocks on between sending a request and observing its response
/// arrive on a reactor worker thread.
pub struct Waiter {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn reset(&self) {
        *self.signaled.lock().expect("waiter mutex poisoned") = false;
    }

    pub fn signal(&self) {
        *self.signaled.lock().expect("waiter mutex poisoned") = true;
        self.condvar.notify_all();
    }

    /// Blocks up to `timeout`; returns whether the flag was observed set.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.signaled.lock().expect("waiter mutex poisoned");
        let (guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |signaled| !*signaled)
            .expect("waiter mutex poisoned");
        drop(guard);
        !result.timed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_times_out_when_never_signaled() {
        let waiter = Waiter::new();
        assert!(!waiter.wait(Duration::from_millis(20)));
    }

    #[test]
    fn wait_returns_true_once_signaled_from_another_thread() {
        let waiter = std::sync::Arc::new(Waiter::new());
        let w = waiter.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            w.signal();
        });
        assert!(waiter.wait(Duration::from_secs(2)));
    }

    #[test]
    fn reset_clears_a_prior_signal() {
        let waiter = Waiter::new();
        waiter.signal();
        waiter.reset();
        assert!(!waiter.wait(Duration::from_millis(20)));
    }
}
