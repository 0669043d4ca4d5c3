use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts the tasks a dispatcher or pipeline currently has running.
///
/// Every spawned task holds a [`TaskGuard`]; the count returns to zero once
/// all of them have exited, whichever path they exited by.
#[derive(Clone, Debug, Default)]
pub struct TaskGauge {
    active: Arc<AtomicUsize>,
}

impl TaskGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more running task.
    pub fn enter(&self) -> TaskGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Decrements its [`TaskGauge`] exactly once when dropped, including during
/// a panic unwind.
#[derive(Debug)]
pub struct TaskGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_balance_the_count() {
        let gauge = TaskGauge::new();
        let a = gauge.enter();
        let b = gauge.enter();
        assert_eq!(gauge.active(), 2);

        drop(a);
        assert_eq!(gauge.active(), 1);
        drop(b);
        assert_eq!(gauge.active(), 0);
    }

    #[test]
    fn panicking_holder_still_releases() {
        let gauge = TaskGauge::new();
        let guard = gauge.enter();

        let result = std::thread::spawn(move || {
            let _guard = guard;
            panic!("worker blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(gauge.active(), 0);
    }
}
