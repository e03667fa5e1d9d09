use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// One-shot startup barrier. Once marked it stays marked.
#[derive(Clone, Default)]
pub struct Ready {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Ready {
    pub fn new() -> Self {
        Ready::default()
    }

    pub fn mark(&self) {
        let (flag, cond) = &*self.inner;
        let mut ready = flag.lock().unwrap_or_else(|e| e.into_inner());
        if !*ready {
            *ready = true;
            cond.notify_all();
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until marked or `timeout` passes. Returns whether it was marked.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut ready = flag.lock().unwrap_or_else(|e| e.into_inner());

        while !*ready {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            ready = match cond.wait_timeout(ready, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn times_out_when_never_marked() {
        let ready = Ready::new();
        assert!(!ready.wait_timeout(Duration::from_millis(20)));
        assert!(!ready.is_ready());
    }

    #[test]
    fn wakes_waiter_from_another_thread() {
        let ready = Ready::new();
        let marker = ready.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            marker.mark();
        });
        assert!(ready.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn stays_marked() {
        let ready = Ready::new();
        ready.mark();
        ready.mark();
        assert!(ready.wait_timeout(Duration::ZERO));
        assert!(ready.is_ready());
    }
}
