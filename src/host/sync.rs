//! The host's advisory lock and its cleanup stack.

use std::sync::{Condvar, Mutex};

/// A lock taken and released by separate calls, for critical sections
/// that span a callback into a script.
#[derive(Default)]
pub struct AdvisoryLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl AdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        while *held {
            held = self.released.wait(held).unwrap_or_else(|p| p.into_inner());
        }
        *held = true;
    }

    pub fn try_lock(&self) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        if *held {
            false
        } else {
            *held = true;
            true
        }
    }

    pub fn unlock(&self) {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        *held = false;
        self.released.notify_one();
    }

    /// Holds the lock until the guard is dropped.
    pub fn guard(&self) -> AdvisoryGuard<'_> {
        self.lock();
        AdvisoryGuard(self)
    }
}

pub struct AdvisoryGuard<'a>(&'a AdvisoryLock);

impl Drop for AdvisoryGuard<'_> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Functions run in reverse registration order when a script context ends.
#[derive(Default)]
pub struct CleanupStack {
    stack: Mutex<Vec<Cleanup>>,
}

impl CleanupStack {
    pub fn push(&self, f: Cleanup) {
        self.stack.lock().unwrap_or_else(|p| p.into_inner()).push(f);
    }

    pub fn len(&self) -> usize {
        self.stack.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs and forgets every registered function, last in first out.
    /// Functions registered while running are run too.
    pub fn run(&self) {
        loop {
            let next = self.stack.lock().unwrap_or_else(|p| p.into_inner()).pop();
            match next {
                Some(f) => f(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn cleanup_runs_lifo() {
        let order = Arc::new(Mutex::new(vec![]));
        let stack = CleanupStack::default();
        for i in 0..3 {
            let order = order.clone();
            stack.push(Box::new(move || order.lock().unwrap().push(i)));
        }
        stack.run();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(stack.is_empty());
    }

    #[test]
    fn lock_excludes_other_threads() {
        let lock = Arc::new(AdvisoryLock::new());
        lock.lock();
        assert!(!lock.try_lock());
        let other = {
            let lock = lock.clone();
            thread::spawn(move || {
                let _g = lock.guard();
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!other.is_finished());
        lock.unlock();
        other.join().unwrap();
        assert!(lock.try_lock());
    }
}
