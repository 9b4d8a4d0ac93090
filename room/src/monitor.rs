use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Reachability tracker for transports that poll or periodically refresh.
///
/// Two states, optimistic start. Every failed cycle doubles the retry
/// interval; every successful cycle resets it to the base value. The
/// monitor only supplies the delay: the refresh loops read it and schedule
/// their own next attempt.
#[derive(Debug)]
pub struct ConnectionMonitor {
    connected: AtomicBool,
    base: Duration,
    cap: Option<Duration>,
    current: Mutex<Duration>,
}

impl ConnectionMonitor {
    pub fn new(base: Duration) -> Self {
        Self {
            connected: AtomicBool::new(true),
            base,
            cap: None,
            current: Mutex::new(base),
        }
    }

    /// Doubling is unbounded by default; a cap bounds it for integrators
    /// that cannot tolerate arbitrarily long gaps.
    pub fn with_cap(base: Duration, cap: Duration) -> Self {
        Self {
            connected: AtomicBool::new(true),
            base,
            cap: Some(cap),
            current: Mutex::new(base),
        }
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Delay before the next scheduled refresh attempt.
    pub fn retry_interval(&self) -> Duration {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or(self.base)
    }

    pub fn record_success(&self) -> Duration {
        self.connected.store(true, Ordering::SeqCst);
        if let Ok(mut current) = self.current.lock() {
            *current = self.base;
        }
        self.base
    }

    pub fn record_failure(&self) -> Duration {
        self.connected.store(false, Ordering::SeqCst);
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(_) => return self.base,
        };
        let mut next = *current * 2;
        if let Some(cap) = self.cap {
            next = next.min(cap);
        }
        *current = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_connected_at_base_interval() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(monitor.connected());
        assert_eq!(monitor.retry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn failure_strictly_doubles_the_prior_interval() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert_eq!(monitor.record_failure(), Duration::from_secs(2));
        assert_eq!(monitor.record_failure(), Duration::from_secs(4));
        assert_eq!(monitor.record_failure(), Duration::from_secs(8));
        assert!(!monitor.connected());
    }

    #[test]
    fn success_resets_to_base_regardless_of_streak() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        for _ in 0..5 {
            monitor.record_failure();
        }
        assert_eq!(monitor.record_success(), Duration::from_secs(1));
        assert!(monitor.connected());
        assert_eq!(monitor.retry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn cap_bounds_the_doubling() {
        let monitor =
            ConnectionMonitor::with_cap(Duration::from_secs(1), Duration::from_secs(5));
        for _ in 0..10 {
            monitor.record_failure();
        }
        assert_eq!(monitor.retry_interval(), Duration::from_secs(5));
    }
}
